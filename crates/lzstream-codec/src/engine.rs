//! Codec engine boundary
//!
//! A [`CodecBackend`] creates [`CodecEngine`]s from a [`CodecConfig`]. An engine
//! is a stateful, single-threaded primitive: each [`CodecEngine::step`] consumes
//! part of the input, fills part of the output and reports whether the stream
//! has ended. Dropping the engine releases its state.

use lzstream_types::{Action, Check, CodecErrorKind, DecoderFlags, LzmaOptions, Preset};

use crate::filters::FilterChain;

/// Memory limit meaning "no limit"
pub const MEMLIMIT_UNLIMITED: u64 = u64::MAX;

/// Which codec entry point to initialize, with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecConfig {
    /// Raw encoder driven only by a filter chain, no container framing
    RawEncoder(FilterChain),
    /// Raw decoder driven only by a filter chain
    RawDecoder(FilterChain),
    /// `.xz` encoder from a preset
    EasyEncoder {
        /// Compression preset
        preset: Preset,
        /// Integrity check
        check: Check,
    },
    /// `.xz` encoder from a filter chain
    StreamEncoder {
        /// Filter chain
        chain: FilterChain,
        /// Integrity check
        check: Check,
    },
    /// Legacy `.lzma` encoder
    AloneEncoder(LzmaOptions),
    /// `.xz` decoder
    StreamDecoder {
        /// Memory usage limit
        memlimit: u64,
        /// Decoder flags
        flags: DecoderFlags,
    },
    /// Decoder detecting `.xz` or `.lzma`
    AutoDecoder {
        /// Memory usage limit
        memlimit: u64,
        /// Decoder flags
        flags: DecoderFlags,
    },
    /// Legacy `.lzma` decoder
    AloneDecoder {
        /// Memory usage limit
        memlimit: u64,
    },
}

impl CodecConfig {
    /// Short name of the entry point, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RawEncoder(_) => "raw-encoder",
            Self::RawDecoder(_) => "raw-decoder",
            Self::EasyEncoder { .. } => "easy-encoder",
            Self::StreamEncoder { .. } => "stream-encoder",
            Self::AloneEncoder(_) => "alone-encoder",
            Self::StreamDecoder { .. } => "stream-decoder",
            Self::AutoDecoder { .. } => "auto-decoder",
            Self::AloneDecoder { .. } => "alone-decoder",
        }
    }

    /// Whether this configuration decodes
    pub fn is_decoder(&self) -> bool {
        matches!(
            self,
            Self::RawDecoder(_)
                | Self::StreamDecoder { .. }
                | Self::AutoDecoder { .. }
                | Self::AloneDecoder { .. }
        )
    }
}

/// Non-error result of a codec step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Progress was made; call again
    Ok,
    /// The stream is complete
    End,
}

/// What a single codec step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Input bytes consumed
    pub consumed: usize,
    /// Output bytes written
    pub produced: usize,
    /// Step status
    pub status: StepStatus,
}

/// A configured, stateful codec instance
pub trait CodecEngine: Send {
    /// Run one coding step
    fn step(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        action: Action,
    ) -> Result<StepOutcome, CodecErrorKind>;

    /// Bytes consumed since initialization
    fn total_in(&self) -> u64;

    /// Bytes produced since initialization
    fn total_out(&self) -> u64;

    /// Current memory usage, when the engine can report it
    fn memusage(&self) -> Option<u64> {
        None
    }

    /// Current memory usage limit
    fn memlimit(&self) -> u64;

    /// Change the memory usage limit
    fn set_memlimit(&mut self, limit: u64) -> Result<(), CodecErrorKind>;

    /// Replace the active filter chain
    fn update_filters(&mut self, _chain: &FilterChain) -> Result<(), CodecErrorKind> {
        Err(CodecErrorKind::Options)
    }
}

/// Factory for codec engines
pub trait CodecBackend: Send + Sync {
    /// Initialize a new engine
    fn init(&self, config: &CodecConfig) -> Result<Box<dyn CodecEngine>, CodecErrorKind>;
}
