//! Target board localization.
//!
//! Two phases, both always run:
//! 1. Marker match: when the piece landed on a board's center last time, a
//!    small dot appears there. Matching either dot variant gives the center
//!    directly.
//! 2. Vertex scan: blur, Canny, clear the piece sprite, then scan the middle
//!    third of the frame top-down. The first row with an edge is the board's
//!    top vertex; its mean edge column is the board's center column. Without a
//!    marker, the bottom vertex is the first edge found in that column (or the
//!    one left of it) at least `bottom_skip` rows further down, and the center
//!    row is the midpoint of the two vertices.

use std::ops::Range;

use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tapjump_core::{Position, Resolution};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::template::match_above;
use crate::{EdgeScanParams, Landmark, LocateError, MarkerParams, PieceState};

/// Target board as seen in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub center: Position,
    pub top_vertex: Position,
    /// Score of the landed-marker match, when the fast path resolved the center.
    pub marker_score: Option<f32>,
}

impl TargetState {
    /// `true` when the center came from a landed marker, i.e. the previous
    /// jump hit a board's center.
    pub fn on_center(&self) -> bool {
        self.marker_score.is_some()
    }

    /// Vertical distance from the top vertex to the center.
    pub fn half_height(&self) -> i32 {
        self.center.y - self.top_vertex.y
    }
}

/// Marker templates. The dot is drawn dark or light depending on the board.
#[derive(Clone, Debug)]
pub struct MarkerTemplates {
    pub dark: GrayImage,
    pub light: GrayImage,
}

pub struct TargetLocator {
    markers: MarkerTemplates,
    marker: MarkerParams,
    edges: EdgeScanParams,
}

impl TargetLocator {
    pub fn new(markers: MarkerTemplates, marker: MarkerParams, edges: EdgeScanParams) -> Self {
        Self {
            markers,
            marker,
            edges,
        }
    }

    /// Locate the target board.
    ///
    /// `piece_offset` is the piece template's contact-point offset; together
    /// with the piece position it bounds the sprite that gets cleared from the
    /// edge map.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(width = frame.width(), height = frame.height()))
    )]
    pub fn locate(
        &self,
        frame: &GrayImage,
        piece: &PieceState,
        piece_offset: Vector2<i32>,
    ) -> Result<TargetState, LocateError> {
        let marker = self.match_marker(frame);
        let edges = self.edge_map(frame, piece.position, piece_offset);

        let rows = scan_window(frame.height());
        let top_vertex = find_top_vertex(&edges, rows.clone())
            .ok_or_else(|| LocateError::not_found(Landmark::TargetTopVertex))?;

        if let Some((center, score)) = marker {
            if (center.x - top_vertex.x).abs() > self.edges.agreement_tolerance {
                log::warn!(
                    "marker center x {} disagrees with top vertex x {}",
                    center.x,
                    top_vertex.x
                );
            }
            log::debug!(
                "target center ({}, {}) from marker (score {score:.3}), top vertex ({}, {})",
                center.x,
                center.y,
                top_vertex.x,
                top_vertex.y
            );
            return Ok(TargetState {
                center,
                top_vertex,
                marker_score: Some(score),
            });
        }

        let bottom = find_bottom_row(&edges, top_vertex, self.edges.bottom_skip, rows.end)
            .ok_or_else(|| LocateError::not_found(Landmark::TargetBottomVertex))?;
        let center = Position::new(top_vertex.x, (top_vertex.y + bottom as i32) / 2);
        log::debug!(
            "target center ({}, {}) from vertices {} / {bottom}",
            center.x,
            center.y,
            top_vertex.y
        );
        Ok(TargetState {
            center,
            top_vertex,
            marker_score: None,
        })
    }

    /// Fast path: board center from the landed marker, with its score.
    ///
    /// The dark variant wins when both match. A center that falls outside
    /// the frame counts as no marker.
    pub fn match_marker(&self, frame: &GrayImage) -> Option<(Position, f32)> {
        let offset = self.marker.offset();
        let bounds = Resolution::new(frame.width(), frame.height());
        [&self.markers.dark, &self.markers.light]
            .into_iter()
            .find_map(|tpl| match_above(frame, tpl, self.marker.threshold))
            .map(|m| (m.position + offset, m.score))
            .filter(|&(center, _)| {
                let inside = bounds.contains(center);
                if !inside {
                    log::debug!("marker center ({}, {}) outside the frame", center.x, center.y);
                }
                inside
            })
    }

    /// Canny edge map with the piece sprite cleared.
    pub fn edge_map(
        &self,
        frame: &GrayImage,
        piece: Position,
        piece_offset: Vector2<i32>,
    ) -> GrayImage {
        let mut edges = if self.edges.blur_sigma > 0.0 {
            let blurred = gaussian_blur_f32(frame, self.edges.blur_sigma);
            canny(&blurred, self.edges.canny_low, self.edges.canny_high)
        } else {
            canny(frame, self.edges.canny_low, self.edges.canny_high)
        };
        mask_piece(&mut edges, piece, piece_offset, self.edges.mask_padding);
        edges
    }
}

/// Rows searched for target vertices: the middle third of the frame.
///
/// The upper third holds the score and overlay buttons.
pub fn scan_window(height: u32) -> Range<u32> {
    let third = height / 3;
    third..third * 2
}

/// Clear the piece sprite from an edge map.
///
/// The cleared box spans `offset.y` rows above the contact point and
/// `offset.x` columns either side of it, grown by `padding`.
pub fn mask_piece(edges: &mut GrayImage, piece: Position, offset: Vector2<i32>, padding: i32) {
    let (w, h) = (edges.width() as i32, edges.height() as i32);
    let y0 = (piece.y - offset.y - padding).clamp(0, h);
    let y1 = (piece.y + padding).clamp(0, h);
    let x0 = (piece.x - offset.x - padding).clamp(0, w);
    let x1 = (piece.x + offset.x + padding).clamp(0, w);
    for y in y0..y1 {
        for x in x0..x1 {
            edges.put_pixel(x as u32, y as u32, Luma([0]));
        }
    }
}

/// First row in `rows` holding an edge pixel, at the mean column of that
/// row's edge pixels rounded half to even.
pub fn find_top_vertex(edges: &GrayImage, rows: Range<u32>) -> Option<Position> {
    let width = edges.width() as usize;
    let raw = edges.as_raw();
    rows.take_while(|&y| y < edges.height()).find_map(|y| {
        let row = &raw[y as usize * width..(y as usize + 1) * width];
        let (count, sum) = row
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0)
            .fold((0u64, 0u64), |(n, s), (x, _)| (n + 1, s + x as u64));
        (count > 0).then(|| {
            let x = (sum as f64 / count as f64).round_ties_even() as i32;
            Position::new(x, y as i32)
        })
    })
}

/// First row at or below `top.y + skip` (and before `row_end`) with an edge in
/// column `top.x` or `top.x - 1`.
pub fn find_bottom_row(edges: &GrayImage, top: Position, skip: u32, row_end: u32) -> Option<u32> {
    let x = u32::try_from(top.x).ok().filter(|&x| x < edges.width())?;
    let start = (top.y.max(0) as u32).saturating_add(skip);
    let end = row_end.min(edges.height());
    (start..end).find(|&y| {
        edges.get_pixel(x, y).0[0] != 0 || (x > 0 && edges.get_pixel(x - 1, y).0[0] != 0)
    })
}
