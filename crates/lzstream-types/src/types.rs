//! Core data types for lzstream
//!
//! Filter identifiers, codec status values, integrity check kinds and the
//! [`Chunk`] buffer that moves through a stream's queues.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Deref};

use bytes::Bytes;

/// Identifier of a codec filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FilterId {
    /// x86 branch/call/jump converter
    X86,
    /// PowerPC branch converter
    PowerPc,
    /// IA-64 branch converter
    Ia64,
    /// ARM branch converter
    Arm,
    /// ARM-Thumb branch converter
    ArmThumb,
    /// SPARC branch converter
    Sparc,
    /// Delta filter
    Delta,
    /// Legacy LZMA
    Lzma1,
    /// LZMA2
    Lzma2,
    /// Sentinel for unknown names; only valid as a chain terminator
    Unknown,
}

/// Static name table, queried by exact string match.
const FILTER_NAMES: [(&str, FilterId); 9] = [
    ("LZMA_FILTER_X86", FilterId::X86),
    ("LZMA_FILTER_POWERPC", FilterId::PowerPc),
    ("LZMA_FILTER_IA64", FilterId::Ia64),
    ("LZMA_FILTER_ARM", FilterId::Arm),
    ("LZMA_FILTER_ARMTHUMB", FilterId::ArmThumb),
    ("LZMA_FILTER_SPARC", FilterId::Sparc),
    ("LZMA_FILTER_DELTA", FilterId::Delta),
    ("LZMA_FILTER_LZMA1", FilterId::Lzma1),
    ("LZMA_FILTER_LZMA2", FilterId::Lzma2),
];

const FILTER_SHORT_NAMES: [(&str, FilterId); 9] = [
    ("x86", FilterId::X86),
    ("powerpc", FilterId::PowerPc),
    ("ia64", FilterId::Ia64),
    ("arm", FilterId::Arm),
    ("armthumb", FilterId::ArmThumb),
    ("sparc", FilterId::Sparc),
    ("delta", FilterId::Delta),
    ("lzma1", FilterId::Lzma1),
    ("lzma2", FilterId::Lzma2),
];

impl FilterId {
    /// Name used for the unknown sentinel
    pub const UNKNOWN_NAME: &'static str = "LZMA_VLI_UNKNOWN";

    /// Resolve a canonical `LZMA_FILTER_*` name; anything else is [`FilterId::Unknown`]
    pub fn from_name(name: &str) -> Self {
        FILTER_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map_or(Self::Unknown, |(_, id)| *id)
    }

    /// Resolve either a canonical name or a lowercase short name such as `lzma2`
    pub fn from_name_or_alias(name: &str) -> Self {
        match Self::from_name(name) {
            Self::Unknown => FILTER_SHORT_NAMES
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
                .map_or(Self::Unknown, |(_, id)| *id),
            id => id,
        }
    }

    /// Canonical name of this filter
    pub fn name(self) -> &'static str {
        FILTER_NAMES
            .iter()
            .find(|(_, id)| *id == self)
            .map_or(Self::UNKNOWN_NAME, |(name, _)| name)
    }

    /// The liblzma filter id (a variable-length integer)
    pub fn vli(self) -> u64 {
        match self {
            Self::X86 => 0x04,
            Self::PowerPc => 0x05,
            Self::Ia64 => 0x06,
            Self::Arm => 0x07,
            Self::ArmThumb => 0x08,
            Self::Sparc => 0x09,
            Self::Delta => 0x03,
            Self::Lzma1 => 0x4000_0000_0000_0001,
            Self::Lzma2 => 0x21,
            Self::Unknown => u64::MAX,
        }
    }

    /// Whether a filter of this id may carry an option block
    pub fn accepts_options(self) -> bool {
        matches!(self, Self::Delta | Self::Lzma1 | Self::Lzma2)
    }

    /// Whether this is one of the two LZMA stages
    pub fn is_lzma(self) -> bool {
        matches!(self, Self::Lzma1 | Self::Lzma2)
    }

    /// All known (non-sentinel) filters
    pub fn all() -> impl Iterator<Item = FilterId> {
        FILTER_NAMES.iter().map(|(_, id)| *id)
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coding action passed to each codec step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume input and produce output as it becomes available
    Run,
    /// No more input will follow; flush everything and end the stream
    Finish,
}

/// Failure statuses a codec step or initializer can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CodecErrorKind {
    /// Cannot allocate memory
    Mem,
    /// Memory usage limit was reached
    MemLimit,
    /// File format not recognized
    Format,
    /// Invalid or unsupported options
    Options,
    /// Data is corrupt
    Data,
    /// Programming error in the codec usage
    Program,
    /// No progress is possible
    Buf,
    /// Integrity check type is not supported
    UnsupportedCheck,
    /// Input stream has no integrity check
    NoCheck,
    /// Integrity check type is now available
    GetCheck,
}

impl CodecErrorKind {
    /// The liblzma status name
    pub fn name(self) -> &'static str {
        match self {
            Self::Mem => "LZMA_MEM_ERROR",
            Self::MemLimit => "LZMA_MEMLIMIT_ERROR",
            Self::Format => "LZMA_FORMAT_ERROR",
            Self::Options => "LZMA_OPTIONS_ERROR",
            Self::Data => "LZMA_DATA_ERROR",
            Self::Program => "LZMA_PROG_ERROR",
            Self::Buf => "LZMA_BUF_ERROR",
            Self::UnsupportedCheck => "LZMA_UNSUPPORTED_CHECK",
            Self::NoCheck => "LZMA_NO_CHECK",
            Self::GetCheck => "LZMA_GET_CHECK",
        }
    }
}

impl fmt::Display for CodecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the most recent codec step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecStatus {
    /// Progress was made, more may follow
    #[default]
    Ok,
    /// The stream is complete
    End,
    /// The step failed
    Error(CodecErrorKind),
}

impl CodecStatus {
    /// Whether this status ends the stream, cleanly or not
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ok)
    }
}

/// Integrity check stored in `.xz` containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Check {
    /// No check
    None,
    /// CRC32
    Crc32,
    /// CRC64
    #[default]
    Crc64,
    /// SHA-256
    Sha256,
}

impl Check {
    /// Size of the stored check value in bytes
    pub fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Crc32 => 4,
            Self::Crc64 => 8,
            Self::Sha256 => 32,
        }
    }
}

/// LZMA compression mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// Fast mode, used with hash chain match finders
    #[default]
    Fast,
    /// Normal mode, used with binary tree match finders
    Normal,
}

/// LZMA match finder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MatchFinder {
    /// Hash chain, 2- and 3-byte hashing
    Hc3,
    /// Hash chain, 2-, 3- and 4-byte hashing
    #[default]
    Hc4,
    /// Binary tree, 2-byte hashing
    Bt2,
    /// Binary tree, 2- and 3-byte hashing
    Bt3,
    /// Binary tree, 2-, 3- and 4-byte hashing
    Bt4,
}

/// Decoder behaviour flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecoderFlags(u32);

impl DecoderFlags {
    /// Report `NoCheck` when the input has no integrity check
    pub const TELL_NO_CHECK: Self = Self(0x01);
    /// Report `UnsupportedCheck` when the check cannot be verified
    pub const TELL_UNSUPPORTED_CHECK: Self = Self(0x02);
    /// Report `GetCheck` once the check type is known
    pub const TELL_ANY_CHECK: Self = Self(0x04);
    /// Decode concatenated streams
    pub const CONCATENATED: Self = Self(0x08);
    /// Do not verify integrity checks
    pub const IGNORE_CHECK: Self = Self(0x10);

    /// No flags
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw liblzma bits, dropping unknown ones
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & 0x1f)
    }

    /// Raw liblzma bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DecoderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DecoderFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// An owned, immutable run of bytes moving through a stream's queues
///
/// Converting from a `Vec<u8>` takes ownership of the allocation without
/// copying, and a chunk is moved, never shared, once it is enqueued.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Chunk(Bytes);

impl Chunk {
    /// Create a chunk from anything convertible into [`Bytes`]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Copy a borrowed slice into a new chunk
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(data))
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chunk holds no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the underlying buffer
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Chunk {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<Bytes> for Chunk {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl From<&'static [u8]> for Chunk {
    fn from(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk({} bytes)", self.0.len())
    }
}
