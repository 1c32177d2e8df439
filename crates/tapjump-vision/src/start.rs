use image::GrayImage;
use tapjump_core::Position;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::template::best_match;
use crate::{SignatureParams, TargetSignature};

/// Why the start board could not be resolved. Never fatal: the iteration
/// continues without a calibration sample.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq)]
pub enum StartReferenceUnavailable {
    #[error("no target signature from the previous iteration")]
    NoSignature,

    #[error("previous target not matched (best score {best_score:?})")]
    NotMatched { best_score: Option<f32> },

    #[error("matched start is ({dx}, {dy}) px from the piece, outside the sanity bound")]
    OutOfBounds { dx: i32, dy: i32 },
}

/// Find the center of the board the piece jumped from.
///
/// The previous iteration's target signature is matched against the current
/// frame. A match is only trusted when it lands closer than
/// `max_start_offset` to the piece on both axes.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn locate_start(
    frame: &GrayImage,
    signature: Option<&TargetSignature>,
    piece: Position,
    params: &SignatureParams,
) -> Result<Position, StartReferenceUnavailable> {
    let signature = signature.ok_or(StartReferenceUnavailable::NoSignature)?;

    let best = best_match(frame, signature.image());
    let found = best
        .filter(|m| m.score >= params.threshold)
        .ok_or(StartReferenceUnavailable::NotMatched {
            best_score: best.map(|m| m.score),
        })?;

    let start = signature.center_from_match(found.position);
    let (dx, dy) = (start.x - piece.x, start.y - piece.y);
    if dx.abs() >= params.max_start_offset || dy.abs() >= params.max_start_offset {
        return Err(StartReferenceUnavailable::OutOfBounds { dx, dy });
    }

    log::debug!(
        "start board at ({}, {}) score {:.3}",
        start.x,
        start.y,
        found.score
    );
    Ok(start)
}
