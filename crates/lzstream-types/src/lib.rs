//! Core type system and error handling for lzstream
//!
//! This crate provides the foundational types shared by the lzstream crates:
//!
//! - **Error handling**: the configuration / codec / resource error taxonomy
//! - **Core types**: filter identifiers, codec statuses, check kinds and [`Chunk`]
//! - **Options**: [`FilterSpec`] and its [`OptionBlock`] variants
//! - **Configuration**: validated values such as [`BufferSize`] and [`Preset`]
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use lzstream_types::{FilterId, FilterSpec, OptionBlock, DeltaOptions, Result};
//!
//! fn delta_then_lzma2() -> Result<Vec<FilterSpec>> {
//!     let delta = DeltaOptions::new(4)?;
//!     Ok(vec![
//!         FilterSpec::new(FilterId::Delta).with_options(OptionBlock::Delta(delta)),
//!         FilterSpec::new(FilterId::Lzma2),
//!     ])
//! }
//! # assert_eq!(delta_then_lzma2().unwrap().len(), 2);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod options;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::BufferSize;
pub use error::{Error, ErrorKind};
pub use options::{DeltaOptions, FilterSpec, LzmaOptions, OptionBlock, Preset};
pub use result::Result;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_conversion() {
        let error: Error = CodecErrorKind::MemLimit.into();
        assert_eq!(error.kind(), ErrorKind::Codec);
        assert!(error.to_string().contains("LZMA_MEMLIMIT_ERROR"));
    }

    #[test]
    fn test_filter_spec_resolves_through_name_table() {
        for id in FilterId::all() {
            assert_eq!(FilterSpec::new(id).filter_id(), id);
        }
    }
}
