//! Distances measured along the board's fixed isometric axis.
//!
//! Boards are laid out on a ±30° grid. The useful distance between the piece
//! and a board is the vertical gap between the two lines of slope `±1/√3`
//! through each point, not the Euclidean one.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate. Origin top-left, `x` right, `y` down.
pub type Position = Point2<i32>;

/// `√3`, the width-to-height ratio of a board silhouette (`tan 60°`).
pub const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Horizontal direction of a jump.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JumpDirection {
    Right,
    Left,
}

impl JumpDirection {
    /// Direction implied by the piece column.
    ///
    /// The next board always spawns on the far side of the vertical midline,
    /// so a piece left of `width / 2` jumps right.
    pub fn from_piece_x(x: i32, width: u32) -> Self {
        if i64::from(x) < i64::from(width / 2) {
            Self::Right
        } else {
            Self::Left
        }
    }

    #[inline]
    pub fn is_right(self) -> bool {
        matches!(self, Self::Right)
    }

    /// Signed horizontal unit: `+1` for right, `-1` for left.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Right => 1.0,
            Self::Left => -1.0,
        }
    }

    /// Slope `dy/dx` of the reference line through a board center.
    #[inline]
    pub fn slope(self) -> f64 {
        self.sign() / SQRT_3
    }

    /// Projection vector `(-slope, 1)`.
    ///
    /// Its dot product with a displacement is the vertical offset of the
    /// displacement from the direction's reference line.
    #[inline]
    pub fn projection_axis(self) -> Vector2<f64> {
        Vector2::new(-self.slope(), 1.0)
    }
}

/// Signed offset of `to` relative to the reference line through `from`.
///
/// Positive when `to` lies below the line (larger `y`), negative above it.
#[inline]
pub fn signed_oblique_offset(from: Position, to: Position, direction: JumpDirection) -> f64 {
    let delta: Vector2<f64> = (to - from).cast::<f64>();
    direction.projection_axis().dot(&delta)
}

/// Oblique distance between `a` and `b` for the given jump direction.
///
/// Equals `|Δy − Δx/√3|` for right jumps and `|Δy + Δx/√3|` for left jumps,
/// with `Δ = a − b`. Symmetric in `a` and `b`.
#[inline]
pub fn oblique_distance(a: Position, b: Position, direction: JumpDirection) -> f64 {
    signed_oblique_offset(b, a, direction).abs()
}
