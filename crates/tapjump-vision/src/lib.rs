//! Perception for the tapjump autopilot.
//!
//! Every stage works on a grayscale frame (`image::GrayImage`):
//! - [`PieceLocator`]: template match for the piece, plus jump direction.
//! - [`TargetLocator`]: landed-marker match (fast path) and an edge scan for
//!   the target board's top and bottom vertices.
//! - [`locate_start`]: finds last iteration's target, now the start board, by
//!   matching its [`TargetSignature`].
//! - [`TargetSignature::extract`]: crops the resolved target for the next
//!   iteration.

mod error;
mod params;
mod piece;
mod signature;
mod start;
mod target;
pub mod template;

pub use error::{Landmark, LocateError};
pub use params::{EdgeScanParams, LocatorParams, MarkerParams, PieceParams, SignatureParams};
pub use piece::{PieceLocator, PieceState};
pub use signature::TargetSignature;
pub use start::{locate_start, StartReferenceUnavailable};
pub use target::{
    find_bottom_row, find_top_vertex, mask_piece, scan_window, MarkerTemplates, TargetLocator,
    TargetState,
};
pub use template::TemplateMatch;
