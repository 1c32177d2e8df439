use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Piece template matching.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceParams {
    /// Minimum correlation score to accept a match.
    pub threshold: f32,
    /// Offset from the template's top-left corner to the piece's contact
    /// point on the board. Calibrated for one resolution.
    pub offset: [i32; 2],
}

impl Default for PieceParams {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            offset: [38, 186],
        }
    }
}

impl PieceParams {
    pub fn offset(&self) -> Vector2<i32> {
        Vector2::new(self.offset[0], self.offset[1])
    }
}

/// Landed-marker (center dot) template matching.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerParams {
    pub threshold: f32,
    /// Offset from the marker template's top-left corner to the board center.
    pub offset: [i32; 2],
}

impl Default for MarkerParams {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            offset: [19, 15],
        }
    }
}

impl MarkerParams {
    pub fn offset(&self) -> Vector2<i32> {
        Vector2::new(self.offset[0], self.offset[1])
    }
}

/// Edge-based vertex scan.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeScanParams {
    /// Gaussian sigma applied before Canny (1.1 matches a 5x5 kernel).
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Extra pixels cleared around the piece sprite.
    pub mask_padding: i32,
    /// Rows skipped below the top vertex before looking for the bottom one.
    /// Keeps concentric rings on round boards from ending the scan early.
    pub bottom_skip: u32,
    /// Allowed horizontal disagreement between a marker match and the top
    /// vertex before a warning is logged.
    pub agreement_tolerance: i32,
}

impl Default for EdgeScanParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 1.0,
            canny_high: 10.0,
            mask_padding: 2,
            bottom_skip: 40,
            agreement_tolerance: 10,
        }
    }
}

/// Target signature crop and start reference matching.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureParams {
    pub threshold: f32,
    /// Rows kept below the board's bottom vertex.
    pub extra_depth: u32,
    /// A start position must be closer than this to the piece on both axes.
    pub max_start_offset: i32,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            extra_depth: 100,
            max_start_offset: 100,
        }
    }
}

/// All locator settings, as loaded from a session config.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorParams {
    pub piece: PieceParams,
    pub marker: MarkerParams,
    pub edges: EdgeScanParams,
    pub signature: SignatureParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params: LocatorParams =
            serde_json::from_str(r#"{ "piece": { "offset": [40, 190] }, "edges": { "bottom_skip": 32 } }"#)
                .expect("parse params");
        assert_eq!(params.piece.offset, [40, 190]);
        assert_eq!(params.piece.threshold, 0.7);
        assert_eq!(params.edges.bottom_skip, 32);
        assert_eq!(params.edges.mask_padding, 2);
        assert_eq!(params.marker.offset, [19, 15]);
        assert_eq!(params.signature.max_start_offset, 100);
    }
}
