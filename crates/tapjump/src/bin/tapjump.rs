//! Command-line entry point: load a session config, connect to the device
//! over adb and play.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use tapjump::{
    AdbDevice, CalibrationSample, ConfigError, PolynomialPredictor, PredictorError, SampleLog,
    Session, SessionConfig, SessionError,
};

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Predictor(#[from] PredictorError),

    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Sample {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Parser, Debug)]
#[command(name = "tapjump", version)]
#[command(about = "Autopilot for isometric jump games over adb")]
struct Cli {
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Emit JSON log lines through a tracing subscriber.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play on a connected device.
    Run {
        /// Session config (JSON). Relative asset paths resolve against its directory.
        #[arg(long)]
        config: PathBuf,
        /// Device serial passed to `adb -s`.
        #[arg(long)]
        serial: Option<String>,
        /// Path to the adb executable.
        #[arg(long, default_value = "adb")]
        adb: PathBuf,
        /// Press the start button before the first jump.
        #[arg(long)]
        start: bool,
        /// Leave the leaderboard and start another game first.
        #[arg(long, conflicts_with = "start")]
        restart: bool,
        /// Stop after this many jumps.
        #[arg(long)]
        max_jumps: Option<u64>,
    },
    /// Fit press-duration coefficients from a JSON-lines sample log.
    Fit {
        #[arg(long)]
        samples: PathBuf,
        #[arg(long, default_value_t = 6)]
        degree: usize,
        /// Only use jumps that landed on the board center.
        #[arg(long)]
        centered_only: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Command::Run {
            config,
            serial,
            adb,
            start,
            restart,
            max_jumps,
        } => run(&config, serial, adb, start, restart, max_jumps),
        Command::Fit {
            samples,
            degree,
            centered_only,
        } => fit(&samples, degree, centered_only),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    if cli.json_log {
        tapjump::core::init_tracing(true);
        // No-op when the subscriber already bridged `log`.
        let _ = tracing_log::LogTracer::init();
        return;
    }
    if let Err(err) = tapjump::core::init_with_level(cli.log_level.into()) {
        eprintln!("logger already installed: {err}");
    }
}

fn run(
    config_path: &Path,
    serial: Option<String>,
    adb: PathBuf,
    start: bool,
    restart: bool,
    max_jumps: Option<u64>,
) -> Result<(), CliError> {
    let cfg = SessionConfig::from_json_file(config_path)?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let locators = cfg.load_locators(base_dir)?;
    let predictor = cfg.predictor.build().map_err(ConfigError::from)?;
    log::info!(
        "predictor: degree {} polynomial, scale {}",
        predictor.degree(),
        predictor.scale
    );

    let device = AdbDevice::new(serial).with_adb_path(adb);
    let mut session = Session::new(device, locators, predictor)?
        .with_pacing(cfg.pacing)
        .with_failure_policy(cfg.failures);
    if let Some(path) = &cfg.samples_path {
        let path = base_dir.join(path);
        let log = SampleLog::append_to(&path).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?;
        session = session.with_sample_log(log);
    }

    if restart {
        session.another_game()?;
    } else if start {
        session.start_game()?;
    }

    let summary = session.run(max_jumps)?;
    log::info!(
        "done: {} jumps, {} skipped iterations, {} calibration samples",
        summary.jumps,
        summary.skipped,
        summary.samples
    );
    Ok(())
}

fn fit(path: &Path, degree: usize, centered_only: bool) -> Result<(), CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let sample: CalibrationSample =
            serde_json::from_str(line).map_err(|source| CliError::Sample {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })?;
        if centered_only && !sample.landed_on_center {
            continue;
        }
        points.push((sample.actual_distance, f64::from(sample.duration_ms)));
    }
    log::info!("fitting degree {degree} over {} samples", points.len());

    let predictor = PolynomialPredictor::fit(&points, degree)?;
    let json = serde_json::json!({
        "kind": "polynomial",
        "coefficients": predictor.coefficients,
        "scale": predictor.scale,
    });
    println!("{json}");
    Ok(())
}
