//! Filter chains and codec engines for lzstream
//!
//! This crate sits between the stream engine and liblzma. It includes:
//!
//! - **Filter chain builder**: validates caller-supplied [`FilterSpec`]s and
//!   materializes them into an owned, terminated [`FilterChain`]
//! - **Codec boundary**: the [`CodecEngine`] / [`CodecBackend`] traits the
//!   stream engine drives, plus [`CodecConfig`] naming every entry point
//! - **liblzma backend**: [`LzmaBackend`], the default implementation, and
//!   [`LibrarySupport`] for checks, match finders and modes the build offers
//!
//! # Examples
//!
//! ```rust
//! use lzstream_codec::{build, CodecBackend, CodecConfig, LzmaBackend, StepStatus};
//! use lzstream_types::{Action, Check, FilterSpec, Preset};
//!
//! let chain = build(&[FilterSpec::lzma2(Preset::DEFAULT)])?;
//! let mut encoder = LzmaBackend::new()
//!     .init(&CodecConfig::StreamEncoder { chain, check: Check::Crc64 })
//!     .expect("encoder");
//!
//! let mut out = vec![0u8; 4096];
//! let outcome = encoder.step(b"hello", &mut out, Action::Finish).expect("step");
//! assert_eq!(outcome.consumed, 5);
//! # let _ = StepStatus::End;
//! # Ok::<(), lzstream_types::Error>(())
//! ```
//!
//! [`FilterSpec`]: lzstream_types::FilterSpec

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod filters;
pub mod lzma;


// Re-export main types
pub use engine::{
    CodecBackend, CodecConfig, CodecEngine, StepOutcome, StepStatus, MEMLIMIT_UNLIMITED,
};
pub use filters::{build, FilterChain, FilterChainBuilder, FilterEntry};
pub use lzma::{LibrarySupport, LzmaBackend, LzmaEngine};
