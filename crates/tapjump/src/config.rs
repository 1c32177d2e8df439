//! Session configuration, loaded from JSON.
//!
//! Only the asset paths are required; every tunable has a default matching
//! the stock 1080x1920 calibration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tapjump_vision::{LocatorParams, MarkerTemplates, PieceLocator, TargetLocator};

use crate::predictor::{PolynomialPredictor, PredictorError};
use crate::session::Locators;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to load template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Predictor(#[from] PredictorError),
}

/// Template images, each captured at the session resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetPaths {
    pub piece: PathBuf,
    pub marker_dark: PathBuf,
    pub marker_light: PathBuf,
}

/// How press durations are predicted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictorConfig {
    /// Fixed coefficients, ascending power order.
    Polynomial {
        coefficients: Vec<f64>,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    /// Fit a polynomial at startup from `[distance, duration_ms]` pairs.
    Fit {
        samples: Vec<[f64; 2]>,
        #[serde(default = "default_degree")]
        degree: usize,
    },
}

fn default_scale() -> f64 {
    1.0
}

fn default_degree() -> usize {
    6
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self::Polynomial {
            coefficients: vec![0.0, 1.35],
            scale: 1.0,
        }
    }
}

impl PredictorConfig {
    pub fn build(&self) -> Result<PolynomialPredictor, PredictorError> {
        match self {
            Self::Polynomial {
                coefficients,
                scale,
            } => PolynomialPredictor::with_scale(coefficients.clone(), *scale),
            Self::Fit { samples, degree } => {
                let pairs: Vec<(f64, f64)> = samples.iter().map(|&[d, t]| (d, t)).collect();
                PolynomialPredictor::fit(&pairs, *degree)
            }
        }
    }
}

/// Delay after a jump before the next frame is trusted.
///
/// `duration_ms / ms_divisor + base_secs` seconds: long presses mean long
/// flights and longer landing animations.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingParams {
    pub base_secs: f64,
    pub ms_divisor: f64,
}

impl Default for PacingParams {
    fn default() -> Self {
        Self {
            base_secs: 1.1,
            ms_divisor: 5000.0,
        }
    }
}

impl PacingParams {
    pub fn delay_after(&self, duration_ms: u32) -> Duration {
        let extra = if self.ms_divisor > 0.0 {
            f64::from(duration_ms) / self.ms_divisor
        } else {
            0.0
        };
        Duration::from_secs_f64((self.base_secs + extra).max(0.0))
    }
}

/// What to do when the piece or target cannot be located.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    /// Failed iterations tolerated in a row before the run stops.
    /// `0` stops at the first failure.
    pub max_consecutive_failures: u32,
    pub retry_delay_secs: f64,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 0,
            retry_delay_secs: 1.0,
        }
    }
}

impl FailurePolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs.max(0.0))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    pub assets: AssetPaths,
    #[serde(default)]
    pub locators: LocatorParams,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub pacing: PacingParams,
    #[serde(default)]
    pub failures: FailurePolicy,
    /// Calibration samples are appended here as JSON lines.
    #[serde(default)]
    pub samples_path: Option<PathBuf>,
}

impl SessionConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load templates and build the locators. Relative asset paths resolve
    /// against `base_dir`.
    pub fn load_locators(&self, base_dir: &Path) -> Result<Locators, ConfigError> {
        let params = &self.locators;
        let piece = load_template(&base_dir.join(&self.assets.piece))?;
        let markers = MarkerTemplates {
            dark: load_template(&base_dir.join(&self.assets.marker_dark))?,
            light: load_template(&base_dir.join(&self.assets.marker_light))?,
        };
        Ok(Locators {
            piece: PieceLocator::new(piece, params.piece),
            target: TargetLocator::new(markers, params.marker, params.edges),
            signature: params.signature,
        })
    }
}

fn load_template(path: &Path) -> Result<GrayImage, ConfigError> {
    let img = image::open(path).map_err(|source| ConfigError::Template {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!(
        "loaded template {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(img.to_luma8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::DurationPredictor;
    use image::Luma;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: SessionConfig = serde_json::from_str(
            r#"{ "assets": { "piece": "piece.png", "marker_dark": "d.png", "marker_light": "l.png" } }"#,
        )
        .expect("parse");
        assert_eq!(cfg.locators.piece.offset, [38, 186]);
        assert_eq!(cfg.failures.max_consecutive_failures, 0);
        assert_eq!(cfg.predictor, PredictorConfig::default());
        assert!(cfg.samples_path.is_none());
    }

    #[test]
    fn pacing_follows_press_length() {
        let pacing = PacingParams::default();
        assert!((pacing.delay_after(0).as_secs_f64() - 1.1).abs() < 1e-6);
        assert!((pacing.delay_after(500).as_secs_f64() - 1.2).abs() < 1e-6);
        assert!((pacing.delay_after(2500).as_secs_f64() - 1.6).abs() < 1e-6);
    }

    #[test]
    fn fit_predictor_from_config() {
        let cfg: PredictorConfig = serde_json::from_str(
            r#"{ "kind": "fit", "degree": 1, "samples": [[100, 150], [200, 290], [300, 430]] }"#,
        )
        .expect("parse");
        let predictor = cfg.build().expect("fit");
        assert!((predictor.predict(250.0) - 360.0).abs() < 1e-6);
    }

    #[test]
    fn loads_templates_relative_to_base_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["piece.png", "dark.png", "light.png"] {
            image::GrayImage::from_pixel(6, 4, Luma([128]))
                .save(dir.path().join(name))
                .expect("write template");
        }
        let cfg: SessionConfig = serde_json::from_str(
            r#"{ "assets": { "piece": "piece.png", "marker_dark": "dark.png", "marker_light": "light.png" } }"#,
        )
        .expect("parse");
        let locators = cfg.load_locators(dir.path()).expect("locators");
        assert_eq!(locators.piece.template().dimensions(), (6, 4));

        let err = cfg.load_locators(&dir.path().join("missing")).err().expect("missing dir");
        assert!(matches!(err, ConfigError::Template { .. }));
    }

    #[test]
    fn unreadable_config_reports_path() {
        let err = SessionConfig::from_json_file(Path::new("/nonexistent/tapjump.json"))
            .expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/tapjump.json"));
    }
}
