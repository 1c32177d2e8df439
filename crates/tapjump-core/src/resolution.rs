use serde::{Deserialize, Serialize};

use crate::Position;

/// Screen size in pixels, fixed for the whole session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Screen center, where jumps are pressed.
    pub fn center(&self) -> Position {
        Position::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    /// Point at the given fraction of width and height.
    ///
    /// Used for resolution-independent button locations.
    pub fn relative(&self, fx: f64, fy: f64) -> Position {
        Position::new(
            (f64::from(self.width) * fx) as i32,
            (f64::from(self.height) * fy) as i32,
        )
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < self.width && (p.y as u32) < self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_points_truncate_like_pixel_indices() {
        let res = Resolution::new(1080, 1920);
        assert_eq!(res.center(), Position::new(540, 960));
        assert_eq!(res.relative(0.5, 0.67), Position::new(540, 1286));
        assert_eq!(res.relative(0.07, 0.87), Position::new(75, 1670));
    }

    #[test]
    fn contains_checks_both_axes() {
        let res = Resolution::new(10, 20);
        assert!(res.contains(Position::new(0, 0)));
        assert!(res.contains(Position::new(9, 19)));
        assert!(!res.contains(Position::new(10, 5)));
        assert!(!res.contains(Position::new(3, -1)));
    }
}
