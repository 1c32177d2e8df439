//! Reconciles last iteration's jump with where the piece actually landed.

use serde::{Deserialize, Serialize};
use tapjump_core::{oblique_distance, signed_oblique_offset, JumpDirection, Position};

/// What was decided for a jump. Carried to the next iteration only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JumpPrediction {
    /// Oblique distance from piece to target center.
    pub distance: f64,
    pub duration_ms: u32,
    pub direction: JumpDirection,
}

/// Where the piece landed relative to the start board's center.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JumpOutcome {
    /// Piece below the reference line: the jump fell short.
    Short,
    /// Piece above the reference line: the jump went too far.
    Long,
    Exact,
}

/// Distance the last press actually covered.
///
/// Reported only; applying it to the predictor happens offline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub actual_distance: f64,
    pub duration_ms: u32,
    pub landed_on_center: bool,
    pub outcome: JumpOutcome,
    /// Oblique offset between the piece and the start board's center.
    pub miss: f64,
}

/// Evaluate the previous jump.
///
/// `start` is the resolved center of the board the piece jumped to last time,
/// `piece` the piece's current contact point. Returns `None` without a
/// previous prediction or a start position.
///
/// The piece is classified against the line through `start` with slope
/// `±1/√3` (sign from the previous direction). Below it the jump was short
/// and the press covered `distance - miss`; above it the jump was long and
/// covered `distance + miss`.
pub fn evaluate_previous(
    previous: Option<&JumpPrediction>,
    start: Option<Position>,
    piece: Position,
    landed_on_center: bool,
) -> Option<CalibrationSample> {
    let previous = previous?;
    let start = start?;

    let miss = oblique_distance(start, piece, previous.direction);
    let offset = signed_oblique_offset(start, piece, previous.direction);
    let (outcome, actual_distance) = if offset > 0.0 {
        (JumpOutcome::Short, previous.distance - miss)
    } else if offset < 0.0 {
        (JumpOutcome::Long, previous.distance + miss)
    } else {
        (JumpOutcome::Exact, previous.distance)
    };

    Some(CalibrationSample {
        actual_distance,
        duration_ms: previous.duration_ms,
        landed_on_center,
        outcome,
        miss,
    })
}
