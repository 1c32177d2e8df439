//! Autopilot for isometric jump games.
//!
//! Each iteration captures a frame, locates the piece and the target board,
//! turns the oblique distance between them into a press duration and presses
//! the screen. Before predicting, it checks where the previous jump actually
//! landed and turns the miss into a [`CalibrationSample`].
//!
//! ## Crates
//! - [`core`]: geometry (`oblique_distance`, `JumpDirection`), resolution and
//!   logger installation.
//! - [`vision`]: template matching and the piece, target and start locators.
//! - this crate: evaluator, predictor, device access, configuration and the
//!   [`Session`] control loop.
//!
//! ```no_run
//! use std::path::Path;
//! use tapjump::{AdbDevice, Session, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = SessionConfig::from_json_file(Path::new("tapjump.json"))?;
//! let locators = cfg.load_locators(Path::new("."))?;
//! let predictor = cfg.predictor.build()?;
//! let mut session = Session::new(AdbDevice::new(None), locators, predictor)?
//!     .with_pacing(cfg.pacing)
//!     .with_failure_policy(cfg.failures);
//! session.run(Some(10))?;
//! # Ok(())
//! # }
//! ```

pub use tapjump_core as core;
pub use tapjump_vision as vision;

pub mod config;
pub mod device;
pub mod evaluator;
pub mod predictor;
pub mod samples;
pub mod session;

pub use config::{ConfigError, FailurePolicy, PacingParams, PredictorConfig, SessionConfig};
pub use device::{AdbDevice, Device, DeviceError};
pub use evaluator::{evaluate_previous, CalibrationSample, JumpOutcome, JumpPrediction};
pub use predictor::{press_millis, DurationPredictor, PolynomialPredictor, PredictorError};
pub use samples::SampleLog;
pub use session::{IterationReport, Locators, RunSummary, Session, SessionError, Stage};
pub use tapjump_core::{JumpDirection, Position, Resolution};
