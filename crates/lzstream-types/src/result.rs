//! Result type alias for lzstream operations

use crate::Error;

/// Result type alias for lzstream operations
pub type Result<T> = std::result::Result<T, Error>;
