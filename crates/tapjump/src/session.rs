//! The per-frame control loop.
//!
//! Each iteration runs strictly in order:
//! capture, locate piece, locate target, locate start, extract signature,
//! evaluate previous jump, predict, execute, pace.
//!
//! Only two values cross iteration boundaries: the previous jump and the
//! previous target's signature. Both are taken at the start of an iteration
//! and replaced only when it completes, so a failed iteration leaves nothing
//! stale behind.

use std::time::Duration;

use image::GrayImage;
use serde::Serialize;
use tapjump_core::{oblique_distance, Position, Resolution};
use tapjump_vision::{
    locate_start, LocateError, PieceLocator, PieceState, SignatureParams, TargetLocator,
    TargetSignature, TargetState,
};

use crate::config::{FailurePolicy, PacingParams};
use crate::device::{Device, DeviceError};
use crate::evaluator::{evaluate_previous, CalibrationSample, JumpPrediction};
use crate::predictor::{press_millis, DurationPredictor};
use crate::samples::SampleLog;

/// Stages of one iteration, in execution order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Capture,
    LocatePiece,
    LocateTarget,
    LocateStart,
    ExtractSignature,
    EvaluatePrevious,
    Predict,
    Execute,
    Pace,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("iteration {iteration} failed at {stage:?}: {source}")]
    Locate {
        iteration: u64,
        stage: Stage,
        #[source]
        source: LocateError,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("frame is {got_width}x{got_height} but the session runs at {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
}

/// Locators and signature settings used by a session.
pub struct Locators {
    pub piece: PieceLocator,
    pub target: TargetLocator,
    pub signature: SignatureParams,
}

/// Everything observed and decided in one iteration.
#[derive(Clone, Debug, Serialize)]
pub struct IterationReport {
    pub iteration: u64,
    pub piece: PieceState,
    pub target: TargetState,
    pub start: Option<Position>,
    pub sample: Option<CalibrationSample>,
    pub jump: JumpPrediction,
    pub pause: Duration,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunSummary {
    pub jumps: u64,
    /// Iterations abandoned under the failure policy.
    pub skipped: u64,
    pub samples: u64,
}

pub struct Session<D, P> {
    device: D,
    predictor: P,
    locators: Locators,
    resolution: Resolution,
    pacing: PacingParams,
    failures: FailurePolicy,
    sample_log: Option<SampleLog>,
    iterations: u64,
    previous: Option<JumpPrediction>,
    signature: Option<TargetSignature>,
}

impl<D: Device, P: DurationPredictor> Session<D, P> {
    /// Start a session. The device resolution is read once here.
    pub fn new(mut device: D, locators: Locators, predictor: P) -> Result<Self, SessionError> {
        let resolution = device.resolution()?;
        log::info!(
            "session resolution {}x{}",
            resolution.width,
            resolution.height
        );
        Ok(Self {
            device,
            predictor,
            locators,
            resolution,
            pacing: PacingParams::default(),
            failures: FailurePolicy::default(),
            sample_log: None,
            iterations: 0,
            previous: None,
            signature: None,
        })
    }

    pub fn with_pacing(mut self, pacing: PacingParams) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_failure_policy(mut self, failures: FailurePolicy) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_sample_log(mut self, log: SampleLog) -> Self {
        self.sample_log = Some(log);
        self
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Prediction carried into the next iteration, if any.
    pub fn previous_jump(&self) -> Option<&JumpPrediction> {
        self.previous.as_ref()
    }

    /// Drop carried state, e.g. after a new game starts.
    pub fn reset(&mut self) {
        self.previous = None;
        self.signature = None;
    }

    /// Press the start button on the title screen.
    pub fn start_game(&mut self) -> Result<(), SessionError> {
        self.device.tap(self.resolution.relative(0.5, 0.67))?;
        self.enter_new_game();
        Ok(())
    }

    /// Leave the leaderboard and start another round.
    pub fn another_game(&mut self) -> Result<(), SessionError> {
        self.device.tap(self.resolution.relative(0.07, 0.87))?;
        self.device.tap(self.resolution.relative(0.62, 0.79))?;
        self.enter_new_game();
        Ok(())
    }

    fn enter_new_game(&mut self) {
        log::info!("new game");
        self.reset();
        // Let the board settle before the first capture.
        self.device.wait(self.pacing.delay_after(0));
    }

    /// Run one iteration end to end, including the pacing delay.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
    pub fn step(&mut self) -> Result<IterationReport, SessionError> {
        let previous = self.previous.take();
        let previous_signature = self.signature.take();
        self.iterations += 1;
        let iteration = self.iterations;
        let stage = |stage: Stage| {
            log::trace!("iteration {iteration}: {stage:?}");
            stage
        };

        stage(Stage::Capture);
        let frame = self.device.capture()?;
        self.check_frame(&frame)?;

        let at = stage(Stage::LocatePiece);
        let piece = self
            .locators
            .piece
            .locate(&frame)
            .map_err(|source| locate_failed(iteration, at, source))?;

        let at = stage(Stage::LocateTarget);
        let target = self
            .locators
            .target
            .locate(&frame, &piece, self.locators.piece.offset())
            .map_err(|source| locate_failed(iteration, at, source))?;

        stage(Stage::LocateStart);
        let start = match locate_start(
            &frame,
            previous_signature.as_ref(),
            piece.position,
            &self.locators.signature,
        ) {
            Ok(start) => Some(start),
            Err(reason) => {
                log::debug!("start board unresolved: {reason}");
                None
            }
        };
        drop(previous_signature);

        stage(Stage::ExtractSignature);
        let signature = TargetSignature::extract(&frame, &target, &self.locators.signature);
        if signature.is_none() {
            log::warn!("target too flat to crop a signature");
        }

        stage(Stage::EvaluatePrevious);
        let sample = evaluate_previous(
            previous.as_ref(),
            start,
            piece.position,
            target.on_center(),
        );
        if let Some(sample) = &sample {
            self.report_sample(sample);
        }

        stage(Stage::Predict);
        let distance = oblique_distance(piece.position, target.center, piece.direction);
        let duration_ms = press_millis(self.predictor.predict(distance));
        let jump = JumpPrediction {
            distance,
            duration_ms,
            direction: piece.direction,
        };

        stage(Stage::Execute);
        log::info!(
            "jump {iteration}: {:?} {distance:.1} px -> press {duration_ms} ms",
            jump.direction
        );
        self.device.long_tap(self.resolution.center(), duration_ms)?;
        self.previous = Some(jump);
        self.signature = signature;

        stage(Stage::Pace);
        let pause = self.pacing.delay_after(duration_ms);
        self.device.wait(pause);

        Ok(IterationReport {
            iteration,
            piece,
            target,
            start,
            sample,
            jump,
            pause,
        })
    }

    /// Iterate until `max_jumps` jumps were made (forever with `None`) or an
    /// error ends the run.
    ///
    /// Locate failures are tolerated up to the failure policy's limit of
    /// consecutive failures; device errors always end the run.
    pub fn run(&mut self, max_jumps: Option<u64>) -> Result<RunSummary, SessionError> {
        let mut summary = RunSummary::default();
        let mut consecutive = 0u32;
        while max_jumps.is_none_or(|max| summary.jumps < max) {
            match self.step() {
                Ok(report) => {
                    consecutive = 0;
                    summary.jumps += 1;
                    summary.samples += u64::from(report.sample.is_some());
                }
                Err(err @ SessionError::Locate { .. })
                    if consecutive < self.failures.max_consecutive_failures =>
                {
                    consecutive += 1;
                    summary.skipped += 1;
                    log::error!(
                        "{err}; skipping ({consecutive}/{})",
                        self.failures.max_consecutive_failures
                    );
                    self.device.wait(self.failures.retry_delay());
                }
                Err(err) => {
                    log::error!("{err}");
                    return Err(err);
                }
            }
        }
        Ok(summary)
    }

    fn check_frame(&self, frame: &GrayImage) -> Result<(), SessionError> {
        let (got_width, got_height) = frame.dimensions();
        if (got_width, got_height) != (self.resolution.width, self.resolution.height) {
            return Err(SessionError::FrameSize {
                width: self.resolution.width,
                height: self.resolution.height,
                got_width,
                got_height,
            });
        }
        Ok(())
    }

    fn report_sample(&mut self, sample: &CalibrationSample) {
        log::info!(
            "last jump: {:?}, covered {:.1} px with {} ms (on center: {})",
            sample.outcome,
            sample.actual_distance,
            sample.duration_ms,
            sample.landed_on_center
        );
        if let Some(log) = &mut self.sample_log {
            if let Err(err) = log.record(sample) {
                log::warn!("could not append to {}: {err}", log.path().display());
            }
        }
    }
}

fn locate_failed(iteration: u64, stage: Stage, source: LocateError) -> SessionError {
    SessionError::Locate {
        iteration,
        stage,
        source,
    }
}
