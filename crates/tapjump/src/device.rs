//! Device interaction: screenshots and touch input.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use image::GrayImage;
use tapjump_core::{Position, Resolution};

#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("could not decode screenshot: {0}")]
    Decode(#[from] image::ImageError),

    #[error("unrecognized screen size report: {0:?}")]
    Resolution(String),
}

/// Blocking access to the device running the game.
pub trait Device {
    /// Screen size. Queried once per session.
    fn resolution(&mut self) -> Result<Resolution, DeviceError>;

    /// Full-resolution screenshot converted to grayscale.
    fn capture(&mut self) -> Result<GrayImage, DeviceError>;

    fn tap(&mut self, at: Position) -> Result<(), DeviceError>;

    /// Press and hold at `at` for `duration_ms`.
    fn long_tap(&mut self, at: Position, duration_ms: u32) -> Result<(), DeviceError>;

    /// Block for `duration`. Scripted devices may skip the sleep.
    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Android device driven through the `adb` command-line tool.
#[derive(Clone, Debug)]
pub struct AdbDevice {
    adb: PathBuf,
    serial: Option<String>,
}

impl AdbDevice {
    /// Use `adb` from `PATH`; `serial` selects a device when several are attached.
    pub fn new(serial: Option<String>) -> Self {
        Self {
            adb: PathBuf::from("adb"),
            serial,
        }
    }

    pub fn with_adb_path(mut self, adb: impl Into<PathBuf>) -> Self {
        self.adb = adb.into();
        self
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let mut cmd = Command::new(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.args(args);

        let program = self.adb.display().to_string();
        log::trace!("{program} {}", args.join(" "));
        let output = cmd
            .output()
            .map_err(|source| DeviceError::Spawn { program, source })?;
        if !output.status.success() {
            return Err(DeviceError::Command {
                command: format!("adb {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl Device for AdbDevice {
    fn resolution(&mut self) -> Result<Resolution, DeviceError> {
        let out = self.run(&["shell", "wm", "size"])?;
        let text = String::from_utf8_lossy(&out);
        parse_wm_size(&text).ok_or_else(|| DeviceError::Resolution(text.trim().to_string()))
    }

    fn capture(&mut self) -> Result<GrayImage, DeviceError> {
        let png = self.run(&["exec-out", "screencap", "-p"])?;
        Ok(image::load_from_memory(&png)?.to_luma8())
    }

    fn tap(&mut self, at: Position) -> Result<(), DeviceError> {
        let (x, y) = (at.x.to_string(), at.y.to_string());
        self.run(&["shell", "input", "tap", &x, &y]).map(drop)
    }

    fn long_tap(&mut self, at: Position, duration_ms: u32) -> Result<(), DeviceError> {
        let (x, y, ms) = (at.x.to_string(), at.y.to_string(), duration_ms.to_string());
        // A zero-length swipe is a long press.
        self.run(&["shell", "input", "swipe", &x, &y, &x, &y, &ms])
            .map(drop)
    }
}

/// Parse `adb shell wm size` output. An override size wins over the
/// physical one, since that is what screenshots are rendered at.
pub fn parse_wm_size(output: &str) -> Option<Resolution> {
    let parse_line = |prefix: &str| {
        output.lines().find_map(|line| {
            let (w, h) = line.trim().strip_prefix(prefix)?.trim().split_once('x')?;
            Some(Resolution::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
        })
    };
    parse_line("Override size:").or_else(|| parse_line("Physical size:"))
}
