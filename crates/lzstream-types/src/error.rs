//! Error types and handling for lzstream
//!
//! Errors fall into three families. Configuration errors are raised synchronously
//! by the call that triggered them and are never queued. Codec errors only occur
//! while a stream is being driven and are delivered through the stream's result
//! handler. Resource errors surface when asynchronous mode cannot be started.

use crate::types::CodecErrorKind;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Bad filter chain, unsupported options, missing or invalid argument,
    /// or an operation that is not valid in the stream's current lifecycle state
    Config,
    /// Failure reported by the codec engine while coding
    Codec,
    /// Failure to acquire a runtime resource such as a worker thread
    Resource,
}

/// Main error type for lzstream operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// A caller-supplied filter resolved to the unknown sentinel
    #[error("Unknown filter: {name}")]
    UnknownFilter {
        /// The filter name as supplied by the caller
        name: String,
    },

    /// Options were supplied for a filter that does not accept any
    #[error("Filter {filter} does not accept options")]
    UnsupportedOptions {
        /// Canonical name of the offending filter
        filter: String,
    },

    /// An argument was present but out of range or malformed
    #[error("Invalid argument `{argument}`: {message}")]
    InvalidArgument {
        /// Name of the argument
        argument: String,
        /// What was wrong with it
        message: String,
    },

    /// A required argument was not supplied
    #[error("Missing required argument `{argument}`")]
    MissingArgument {
        /// Name of the argument
        argument: String,
    },

    /// The stream already has a codec configured and must be reset first
    #[error("Stream already has a codec configured; reset it before initializing again")]
    AlreadyConfigured,

    /// The stream has no codec configured
    #[error("Stream has no codec configured")]
    NotConfigured,

    /// Input was supplied after the stream reached its end
    #[error("Stream has already ended")]
    StreamEnded,

    /// Codec engine failure
    #[error("LZMA coding error: {kind}")]
    Codec {
        /// The codec status that caused the failure
        kind: CodecErrorKind,
    },

    /// Runtime resource failure
    #[error("Resource error: {message}")]
    Resource {
        /// Error message describing the resource failure
        message: String,
    },

    /// Generic configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },
}

impl Error {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownFilter { .. }
            | Self::UnsupportedOptions { .. }
            | Self::InvalidArgument { .. }
            | Self::MissingArgument { .. }
            | Self::AlreadyConfigured
            | Self::NotConfigured
            | Self::StreamEnded
            | Self::Config { .. } => ErrorKind::Config,
            Self::Codec { .. } => ErrorKind::Codec,
            Self::Resource { .. } => ErrorKind::Resource,
        }
    }

    /// Check if this error is recoverable
    ///
    /// A codec error resets the stream, and a resource error leaves it usable
    /// in synchronous mode, so both can be recovered from on the same object.
    /// Configuration errors need the caller to change its input.
    pub fn is_recoverable(&self) -> bool {
        match self.kind() {
            ErrorKind::Codec | ErrorKind::Resource => true,
            ErrorKind::Config => false,
        }
    }

    /// The codec status behind this error, if it is a codec error
    pub fn codec_kind(&self) -> Option<CodecErrorKind> {
        match self {
            Self::Codec { kind } => Some(*kind),
            _ => None,
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<A: Into<String>, M: Into<String>>(argument: A, message: M) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create a new missing argument error
    pub fn missing_argument<A: Into<String>>(argument: A) -> Self {
        Self::MissingArgument {
            argument: argument.into(),
        }
    }

    /// Create a new resource error
    pub fn resource<S: Into<String>>(message: S) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }
}

impl From<CodecErrorKind> for Error {
    fn from(kind: CodecErrorKind) -> Self {
        Self::Codec { kind }
    }
}
