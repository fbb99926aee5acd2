//! Configuration management for lzstream
//!
//! This crate loads stream, encoder, decoder and logging settings from layered
//! sources (built-in defaults, YAML/TOML/JSON files, environment variables),
//! validates them, and turns encoder/decoder sections into the
//! [`CodecConfig`] a stream is initialized with.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: filter chains and log levels are checked at load time
//! - **Environment overrides**: `LZSTREAM__ENCODER__PRESET=9` and friends
//! - **Logging**: [`logging::init_logging`] installs a `tracing` subscriber
//!
//! # Examples
//!
//! ```rust,no_run
//! use lzstream_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("lzstream.yaml")
//!     .add_env_prefix("LZSTREAM")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Buffer size: {}", config.stream.buffer_size.get());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use lzstream_codec::{CodecConfig, FilterChain, FilterChainBuilder, MEMLIMIT_UNLIMITED};
use lzstream_types::{
    BufferSize, Check, DecoderFlags, Error, FilterId, FilterSpec, LzmaOptions, Preset, Result,
};
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod error;
pub mod loader;
pub mod logging;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use logging::init_logging;

/// Main configuration structure for lzstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Stream engine settings
    #[serde(default)]
    pub stream: StreamConfig,
    /// Encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Decoder settings
    #[serde(default)]
    pub decoder: DecoderConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Stream engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Output staging buffer size per drive iteration
    pub buffer_size: BufferSize,
    /// Drive the codec on a background worker thread
    pub async_mode: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: BufferSize::default(),
            async_mode: false,
        }
    }
}

/// Container written by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// `.xz`
    #[default]
    Xz,
    /// Legacy `.lzma`
    Alone,
    /// No container, filter chain only
    Raw,
}

/// Container accepted by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderContainer {
    /// Detect `.xz` or `.lzma`
    #[default]
    Auto,
    /// `.xz` only
    Xz,
    /// Legacy `.lzma` only
    Alone,
    /// No container, filter chain only
    Raw,
}

/// Encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Output container
    pub container: Container,
    /// Compression preset level
    pub preset: Preset,
    /// Use the extreme variant of the preset
    pub extreme: bool,
    /// Integrity check for `.xz` output
    pub check: Check,
    /// Filter chain; empty means "derive from the preset"
    pub filters: Vec<FilterSpec>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            container: Container::Xz,
            preset: Preset::DEFAULT,
            extreme: false,
            check: Check::Crc64,
            filters: Vec::new(),
        }
    }
}

impl EncoderConfig {
    fn effective_preset(&self) -> Preset {
        if self.extreme {
            self.preset.extreme()
        } else {
            self.preset
        }
    }

    /// The codec entry point and arguments these settings describe
    pub fn to_codec_config(&self) -> Result<CodecConfig> {
        match self.container {
            Container::Xz if self.filters.is_empty() => Ok(CodecConfig::EasyEncoder {
                preset: self.effective_preset(),
                check: self.check,
            }),
            Container::Xz => Ok(CodecConfig::StreamEncoder {
                chain: build_chain(&self.filters)?,
                check: self.check,
            }),
            Container::Alone => Ok(CodecConfig::AloneEncoder(LzmaOptions::with_preset(
                self.effective_preset(),
            ))),
            Container::Raw if self.filters.is_empty() => {
                Err(Error::missing_argument("encoder.filters"))
            }
            Container::Raw => Ok(CodecConfig::RawEncoder(build_chain(&self.filters)?)),
        }
    }
}

/// Decoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Accepted container
    pub container: DecoderContainer,
    /// Memory usage limit in bytes, unlimited when absent
    pub memlimit: Option<u64>,
    /// Decode concatenated `.xz` streams
    pub concatenated: bool,
    /// Report inputs without an integrity check
    pub tell_no_check: bool,
    /// Report unsupported integrity checks
    pub tell_unsupported_check: bool,
    /// Report the integrity check type once known
    pub tell_any_check: bool,
    /// Skip integrity check verification
    pub ignore_check: bool,
    /// Filter chain for raw decoding
    pub filters: Vec<FilterSpec>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            container: DecoderContainer::Auto,
            memlimit: None,
            concatenated: false,
            tell_no_check: false,
            tell_unsupported_check: false,
            tell_any_check: false,
            ignore_check: false,
            filters: Vec::new(),
        }
    }
}

impl DecoderConfig {
    /// Decoder flags selected by the boolean settings
    pub fn flags(&self) -> DecoderFlags {
        let mut flags = DecoderFlags::empty();
        for (enabled, flag) in [
            (self.concatenated, DecoderFlags::CONCATENATED),
            (self.tell_no_check, DecoderFlags::TELL_NO_CHECK),
            (self.tell_unsupported_check, DecoderFlags::TELL_UNSUPPORTED_CHECK),
            (self.tell_any_check, DecoderFlags::TELL_ANY_CHECK),
            (self.ignore_check, DecoderFlags::IGNORE_CHECK),
        ] {
            if enabled {
                flags |= flag;
            }
        }
        flags
    }

    /// The codec entry point and arguments these settings describe
    pub fn to_codec_config(&self) -> Result<CodecConfig> {
        let memlimit = self.memlimit.unwrap_or(MEMLIMIT_UNLIMITED);
        match self.container {
            DecoderContainer::Auto => Ok(CodecConfig::AutoDecoder {
                memlimit,
                flags: self.flags(),
            }),
            DecoderContainer::Xz => Ok(CodecConfig::StreamDecoder {
                memlimit,
                flags: self.flags(),
            }),
            DecoderContainer::Alone => Ok(CodecConfig::AloneDecoder { memlimit }),
            DecoderContainer::Raw if self.filters.is_empty() => {
                Err(Error::missing_argument("decoder.filters"))
            }
            DecoderContainer::Raw => Ok(CodecConfig::RawDecoder(build_chain(&self.filters)?)),
        }
    }
}

/// Build a chain from configuration entries, accepting short names like `lzma2`
pub fn build_chain(specs: &[FilterSpec]) -> Result<FilterChain> {
    let normalized: Vec<FilterSpec> = specs
        .iter()
        .map(|spec| match FilterId::from_name_or_alias(&spec.id) {
            FilterId::Unknown => spec.clone(),
            id => FilterSpec {
                id: id.name().to_string(),
                options: spec.options,
            },
        })
        .collect();
    FilterChainBuilder::new().build(&normalized)
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzstream_types::{OptionBlock, DeltaOptions};

    #[test]
    fn test_default_encoder_is_easy_encoder() {
        let config = EncoderConfig::default().to_codec_config().unwrap();
        assert_eq!(
            config,
            CodecConfig::EasyEncoder {
                preset: Preset::DEFAULT,
                check: Check::Crc64
            }
        );
    }

    #[test]
    fn test_extreme_preset() {
        let encoder = EncoderConfig {
            extreme: true,
            ..EncoderConfig::default()
        };
        match encoder.to_codec_config().unwrap() {
            CodecConfig::EasyEncoder { preset, .. } => assert!(preset.is_extreme()),
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn test_short_filter_names() {
        let encoder = EncoderConfig {
            filters: vec![
                FilterSpec::named("delta").with_options(OptionBlock::Delta(DeltaOptions { distance: 2 })),
                FilterSpec::named("lzma2"),
            ],
            ..EncoderConfig::default()
        };
        match encoder.to_codec_config().unwrap() {
            CodecConfig::StreamEncoder { chain, .. } => {
                assert_eq!(chain.stages()[0].id(), FilterId::Delta);
                assert_eq!(chain.stages()[1].id(), FilterId::Lzma2);
            }
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn test_unknown_filter_keeps_name() {
        let encoder = EncoderConfig {
            filters: vec![FilterSpec::named("brotli")],
            ..EncoderConfig::default()
        };
        assert_eq!(
            encoder.to_codec_config().unwrap_err(),
            Error::UnknownFilter {
                name: "brotli".to_string()
            }
        );
    }

    #[test]
    fn test_raw_requires_filters() {
        let encoder = EncoderConfig {
            container: Container::Raw,
            ..EncoderConfig::default()
        };
        assert!(matches!(
            encoder.to_codec_config(),
            Err(Error::MissingArgument { .. })
        ));

        let decoder = DecoderConfig {
            container: DecoderContainer::Raw,
            ..DecoderConfig::default()
        };
        assert!(matches!(
            decoder.to_codec_config(),
            Err(Error::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_decoder_flags_and_memlimit() {
        let decoder = DecoderConfig {
            container: DecoderContainer::Xz,
            memlimit: Some(1 << 20),
            concatenated: true,
            ignore_check: true,
            ..DecoderConfig::default()
        };
        assert_eq!(
            decoder.to_codec_config().unwrap(),
            CodecConfig::StreamDecoder {
                memlimit: 1 << 20,
                flags: DecoderFlags::CONCATENATED | DecoderFlags::IGNORE_CHECK,
            }
        );

        let unlimited = DecoderConfig::default().to_codec_config().unwrap();
        assert_eq!(
            unlimited,
            CodecConfig::AutoDecoder {
                memlimit: u64::MAX,
                flags: DecoderFlags::empty(),
            }
        );
    }
}
