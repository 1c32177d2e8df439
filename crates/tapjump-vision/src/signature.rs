use image::imageops::crop_imm;
use image::GrayImage;
use nalgebra::Vector2;
use tapjump_core::{Position, SQRT_3};

use crate::{SignatureParams, TargetState};

/// Crop of a resolved target board, used next iteration to find the same
/// board again once the piece has landed on it.
///
/// Produced once per iteration and handed to the next one by value.
#[derive(Clone, Debug)]
pub struct TargetSignature {
    image: GrayImage,
    /// Board center relative to the crop's top-left corner.
    anchor: Vector2<i32>,
}

impl TargetSignature {
    /// Crop the lower half of the target board plus `extra_depth` rows below.
    ///
    /// The silhouette has a fixed 30° half-angle, so the half width is
    /// `half_height * √3`. The crop is clipped to the frame; `None` when the
    /// target has no height or the clipped crop is empty.
    pub fn extract(frame: &GrayImage, target: &TargetState, params: &SignatureParams) -> Option<Self> {
        let half_height = target.half_height();
        if half_height <= 0 {
            return None;
        }
        let half_width = (f64::from(half_height) * SQRT_3).round() as i32;
        let depth = half_height.saturating_add(i32::try_from(params.extra_depth).unwrap_or(i32::MAX));

        let (w, h) = (frame.width() as i32, frame.height() as i32);
        let c = target.center;
        let x0 = (c.x - half_width).clamp(0, w);
        let x1 = (c.x + half_width).clamp(0, w);
        let y0 = c.y.clamp(0, h);
        let y1 = c.y.saturating_add(depth).clamp(0, h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let image = crop_imm(frame, x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32).to_image();
        Some(Self {
            image,
            anchor: Vector2::new(c.x - x0, c.y - y0),
        })
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn anchor(&self) -> Vector2<i32> {
        self.anchor
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Board center for a match whose top-left corner is `top_left`.
    pub fn center_from_match(&self, top_left: Position) -> Position {
        top_left + self.anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::testutil::noise;

    fn target(center: Position, top_y: i32) -> TargetState {
        TargetState {
            center,
            top_vertex: Position::new(center.x, top_y),
            marker_score: None,
        }
    }

    #[test]
    fn crop_spans_sqrt3_half_width_and_extra_depth() {
        let frame = noise(400, 400, 1, 0, 255);
        let sig = TargetSignature::extract(
            &frame,
            &target(Position::new(200, 150), 120),
            &SignatureParams::default(),
        )
        .expect("signature");
        // half height 30 -> half width round(51.96) = 52
        assert_eq!(sig.width(), 104);
        assert_eq!(sig.height(), 130);
        assert_eq!(sig.anchor(), Vector2::new(52, 0));
        assert_eq!(sig.image().get_pixel(0, 0), frame.get_pixel(148, 150));
        assert_eq!(
            sig.center_from_match(Position::new(148, 150)),
            Position::new(200, 150)
        );
    }

    #[test]
    fn crop_is_clipped_and_anchor_follows() {
        let frame = noise(100, 80, 2, 0, 255);
        let sig = TargetSignature::extract(
            &frame,
            &target(Position::new(5, 50), 40),
            &SignatureParams::default(),
        )
        .expect("signature");
        assert_eq!(sig.width(), 22);
        assert_eq!(sig.height(), 30);
        assert_eq!(sig.anchor(), Vector2::new(5, 0));
    }

    #[test]
    fn degenerate_target_has_no_signature() {
        let frame = noise(50, 50, 3, 0, 255);
        let params = SignatureParams::default();
        assert!(TargetSignature::extract(&frame, &target(Position::new(20, 20), 20), &params).is_none());
        assert!(TargetSignature::extract(&frame, &target(Position::new(20, 20), 25), &params).is_none());
    }
}
