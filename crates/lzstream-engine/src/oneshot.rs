//! One-shot helpers built on the synchronous path

use std::sync::{Arc, Mutex, PoisonError};

use lzstream_codec::CodecConfig;
use lzstream_types::{Chunk, CodecErrorKind, Error, Result};

use crate::coordinator::Coordinator;
use crate::delivery::Delivery;

/// Encode `input` as a single stream
pub fn encode_all(config: CodecConfig, input: &[u8]) -> Result<Vec<u8>> {
    if config.is_decoder() {
        return Err(Error::invalid_argument(
            "config",
            format!("{} does not encode", config.name()),
        ));
    }
    run(config, input)
}

/// Decode a single stream from `input`
///
/// Input past the end of the stream is ignored. Input that ends before the
/// stream does is reported as a codec error.
pub fn decode_all(config: CodecConfig, input: &[u8]) -> Result<Vec<u8>> {
    if !config.is_decoder() {
        return Err(Error::invalid_argument(
            "config",
            format!("{} does not decode", config.name()),
        ));
    }
    run(config, input)
}

fn run(config: CodecConfig, input: &[u8]) -> Result<Vec<u8>> {
    let output = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&output);
    let coordinator = Coordinator::builder()
        .handler(move |delivery| {
            if let Delivery::Data(chunk) = delivery {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk);
            }
        })
        .build();

    coordinator.init(config)?;
    if !input.is_empty() {
        coordinator.code(Some(Chunk::copy_from_slice(input)), false)?;
    }
    coordinator.code(None, false)?;
    if !coordinator.is_finished() {
        return Err(CodecErrorKind::Buf.into());
    }
    drop(coordinator);

    let mut output = output.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(std::mem::take(&mut *output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzstream_codec::{build, MEMLIMIT_UNLIMITED};
    use lzstream_types::{Check, DecoderFlags, FilterSpec, LzmaOptions, Preset};
    use proptest::prelude::*;
    use rstest::rstest;

    fn auto_decoder() -> CodecConfig {
        CodecConfig::AutoDecoder {
            memlimit: MEMLIMIT_UNLIMITED,
            flags: DecoderFlags::empty(),
        }
    }

    #[rstest]
    #[case(CodecConfig::EasyEncoder { preset: Preset::DEFAULT, check: Check::Crc64 }, auto_decoder())]
    #[case(CodecConfig::AloneEncoder(LzmaOptions::with_preset(Preset::DEFAULT)), CodecConfig::AloneDecoder { memlimit: MEMLIMIT_UNLIMITED })]
    #[case(
        CodecConfig::StreamEncoder {
            chain: build(&[FilterSpec::delta(4), FilterSpec::lzma2(Preset::new(3).unwrap())]).unwrap(),
            check: Check::Sha256,
        },
        CodecConfig::StreamDecoder { memlimit: MEMLIMIT_UNLIMITED, flags: DecoderFlags::empty() }
    )]
    #[case(
        CodecConfig::RawEncoder(build(&[FilterSpec::lzma2(Preset::new(1).unwrap())]).unwrap()),
        CodecConfig::RawDecoder(build(&[FilterSpec::lzma2(Preset::new(1).unwrap())]).unwrap())
    )]
    fn test_round_trip(#[case] encoder: CodecConfig, #[case] decoder: CodecConfig) {
        let text = b"lorem ipsum dolor sit amet, consectetur adipiscing elit ".repeat(64);
        let compressed = encode_all(encoder, &text).unwrap();
        assert_eq!(decode_all(decoder, &compressed).unwrap(), text);
    }

    #[test]
    fn test_empty_input() {
        let compressed = encode_all(
            CodecConfig::EasyEncoder {
                preset: Preset::DEFAULT,
                check: Check::Crc32,
            },
            b"",
        )
        .unwrap();
        assert!(!compressed.is_empty());
        assert!(decode_all(auto_decoder(), &compressed).unwrap().is_empty());
    }

    #[test]
    fn test_check_reporting_decoder() {
        let text = b"tell me the check ".repeat(64);
        let compressed = encode_all(
            CodecConfig::EasyEncoder {
                preset: Preset::new(1).unwrap(),
                check: Check::Sha256,
            },
            &text,
        )
        .unwrap();
        let decoder = CodecConfig::StreamDecoder {
            memlimit: MEMLIMIT_UNLIMITED,
            flags: DecoderFlags::TELL_ANY_CHECK,
        };
        assert_eq!(decode_all(decoder, &compressed).unwrap(), text);
    }

    #[test]
    fn test_wrong_direction_is_rejected() {
        assert!(matches!(
            encode_all(auto_decoder(), b"abc"),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            decode_all(
                CodecConfig::EasyEncoder {
                    preset: Preset::DEFAULT,
                    check: Check::Crc64
                },
                b"abc"
            ),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_truncated_input_fails() {
        let compressed = encode_all(
            CodecConfig::EasyEncoder {
                preset: Preset::DEFAULT,
                check: Check::Crc64,
            },
            &b"truncate me ".repeat(100),
        )
        .unwrap();
        let error = decode_all(auto_decoder(), &compressed[..compressed.len() / 2]).unwrap_err();
        assert!(matches!(
            error.codec_kind(),
            Some(CodecErrorKind::Buf | CodecErrorKind::Data)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096), level in 0u32..=3) {
            let compressed = encode_all(
                CodecConfig::EasyEncoder { preset: Preset::new(level).unwrap(), check: Check::Crc32 },
                &data,
            ).unwrap();
            prop_assert_eq!(decode_all(auto_decoder(), &compressed).unwrap(), data);
        }
    }
}
