//! Error types for the surface layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// The DOM point lies entirely outside any property and no search
    /// direction yields a hit. Callers treat this as a null selection.
    #[error("Coordinate not found: DOM point lies outside any property")]
    CoordinateNotFound,

    #[error("No element with data-path '{0}'")]
    PathNotFound(String),

    #[error("Offset {offset} out of range for property '{path}' (length {len})")]
    OffsetOutOfRange {
        path: String,
        offset: usize,
        len: usize,
    },

    #[error("DOM node does not belong to this surface")]
    UnknownNode,
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;
