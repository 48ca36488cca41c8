use thiserror::Error;

/// Errors returned by positional operations on an [`EditTree`](crate::EditTree).
///
/// Every operation validates its arguments before touching the tree, so a returned error
/// always means the tree is unchanged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EditTreeError {
    #[error("index {index} out of bounds for tree of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("range of {length} elements starting at {start} out of bounds for tree of length {len}")]
    RangeOutOfBounds {
        start: usize,
        length: usize,
        len: usize,
    },
}

pub type Result<T, E = EditTreeError> = core::result::Result<T, E>;
