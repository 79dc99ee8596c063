use thiserror::Error;

/// Conditions raised by this crate itself.
///
/// Everything is returned through `anyhow::Result`; use
/// [`anyhow::Error::downcast_ref`] to tell the kinds apart.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DimRedError {
    /// An operation needs a result that has not been computed yet.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("shape mismatch: expected {expected} rows for `{slot}`, got {actual}")]
    ShapeMismatch {
        slot: String,
        expected: usize,
        actual: usize,
    },

    #[error("decomposition failed: {0}")]
    Decomposition(String),
}
