//! Core types and geometry for the tapjump autopilot.
//!
//! This crate is purely geometric. It knows nothing about images, devices or
//! predictors; the vision and control crates build on top of it.

mod geometry;
mod logger;
mod resolution;

pub use geometry::{oblique_distance, signed_oblique_offset, JumpDirection, Position, SQRT_3};
pub use resolution::Resolution;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
