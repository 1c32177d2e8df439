use std::fmt;

use serde::{Deserialize, Serialize};

/// Landmark a locator failed to resolve.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Landmark {
    Piece,
    TargetTopVertex,
    TargetBottomVertex,
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Piece => "piece",
            Self::TargetTopVertex => "target top vertex",
            Self::TargetBottomVertex => "target bottom vertex",
        };
        f.write_str(name)
    }
}

/// Errors that abort the current iteration.
#[derive(thiserror::Error, Debug)]
pub enum LocateError {
    #[error("{landmark} position not found")]
    PositionNotFound { landmark: Landmark },

    #[error(
        "template {template_width}x{template_height} does not fit in frame {frame_width}x{frame_height}"
    )]
    TemplateTooLarge {
        template_width: u32,
        template_height: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

impl LocateError {
    pub(crate) fn not_found(landmark: Landmark) -> Self {
        Self::PositionNotFound { landmark }
    }
}
