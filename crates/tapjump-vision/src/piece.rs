use image::GrayImage;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tapjump_core::{JumpDirection, Position, Resolution};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::template::{self, match_above};
use crate::{Landmark, LocateError, PieceParams};

/// Piece as seen in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceState {
    /// Contact point of the piece on its board.
    pub position: Position,
    pub direction: JumpDirection,
    /// Correlation score of the template match.
    pub score: f32,
}

impl PieceState {
    /// Derive the contact point and jump direction from a template match.
    pub fn from_match(
        match_position: Position,
        offset: Vector2<i32>,
        frame_width: u32,
        score: f32,
    ) -> Self {
        let position = match_position + offset;
        Self {
            position,
            direction: JumpDirection::from_piece_x(position.x, frame_width),
            score,
        }
    }
}

/// Template-matching piece locator.
///
/// The template must be captured at the session resolution; no scaling is
/// attempted.
pub struct PieceLocator {
    template: GrayImage,
    params: PieceParams,
}

impl PieceLocator {
    pub fn new(template: GrayImage, params: PieceParams) -> Self {
        Self { template, params }
    }

    pub fn template(&self) -> &GrayImage {
        &self.template
    }

    /// Offset from the template's top-left corner to the contact point.
    pub fn offset(&self) -> Vector2<i32> {
        self.params.offset()
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(width = frame.width(), height = frame.height()))
    )]
    pub fn locate(&self, frame: &GrayImage) -> Result<PieceState, LocateError> {
        if !template::fits(frame, &self.template) {
            return Err(LocateError::TemplateTooLarge {
                template_width: self.template.width(),
                template_height: self.template.height(),
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }

        let found = match_above(frame, &self.template, self.params.threshold)
            .ok_or_else(|| LocateError::not_found(Landmark::Piece))?;
        let piece = PieceState::from_match(found.position, self.offset(), frame.width(), found.score);
        if !Resolution::new(frame.width(), frame.height()).contains(piece.position) {
            log::debug!(
                "piece contact point ({}, {}) falls outside the frame",
                piece.position.x,
                piece.position.y
            );
            return Err(LocateError::not_found(Landmark::Piece));
        }
        log::debug!(
            "piece at ({}, {}) score {:.3}, jumping {:?}",
            piece.position.x,
            piece.position.y,
            piece.score,
            piece.direction
        );
        Ok(piece)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::testutil::{noise, paste};
    use image::Luma;

    #[test]
    fn contact_point_and_direction_from_match() {
        let piece = PieceState::from_match(
            Position::new(300, 800),
            Vector2::new(38, 186),
            1080,
            0.93,
        );
        assert_eq!(piece.position, Position::new(338, 986));
        assert_eq!(piece.direction, JumpDirection::Right);

        let piece = PieceState::from_match(Position::new(600, 800), Vector2::new(38, 186), 1080, 0.9);
        assert_eq!(piece.position, Position::new(638, 986));
        assert_eq!(piece.direction, JumpDirection::Left);
    }

    #[test]
    fn locates_piece_in_frame() {
        let sprite = noise(8, 16, 21, 10, 250);
        let mut frame = GrayImage::from_pixel(120, 90, Luma([70]));
        paste(&mut frame, &sprite, 84, 40);

        let locator = PieceLocator::new(
            sprite,
            PieceParams {
                offset: [4, 16],
                ..PieceParams::default()
            },
        );
        let piece = locator.locate(&frame).expect("piece");
        assert_eq!(piece.position, Position::new(88, 56));
        assert_eq!(piece.direction, JumpDirection::Left);
        assert!(piece.score > 0.99);
    }

    #[test]
    fn contact_point_below_frame_is_not_found() {
        let sprite = noise(8, 16, 21, 10, 250);
        let mut frame = GrayImage::from_pixel(120, 90, Luma([70]));
        paste(&mut frame, &sprite, 84, 70);

        let locator = PieceLocator::new(
            sprite,
            PieceParams {
                offset: [4, 40],
                ..PieceParams::default()
            },
        );
        let err = locator.locate(&frame).expect_err("contact point at y = 110");
        assert!(matches!(
            err,
            LocateError::PositionNotFound {
                landmark: Landmark::Piece
            }
        ));
    }

    #[test]
    fn missing_piece_is_position_not_found() {
        let frame = GrayImage::from_pixel(64, 64, Luma([70]));
        let locator = PieceLocator::new(noise(8, 16, 21, 10, 250), PieceParams::default());
        let err = locator.locate(&frame).expect_err("no piece");
        assert!(matches!(
            err,
            LocateError::PositionNotFound {
                landmark: Landmark::Piece
            }
        ));
    }

    #[test]
    fn oversized_template_is_reported() {
        let frame = GrayImage::from_pixel(10, 10, Luma([70]));
        let locator = PieceLocator::new(noise(12, 4, 1, 0, 255), PieceParams::default());
        assert!(matches!(
            locator.locate(&frame),
            Err(LocateError::TemplateTooLarge { .. })
        ));
    }
}
