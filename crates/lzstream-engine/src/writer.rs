//! [`std::io::Write`] adapter over a synchronous stream

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use lzstream_codec::CodecConfig;
use lzstream_types::{BufferSize, Chunk, Error, ErrorKind};

use crate::coordinator::{Coordinator, CoordinatorBuilder};
use crate::delivery::Delivery;

struct Sink<W> {
    inner: Option<W>,
    error: Option<io::Error>,
}

impl<W: Write> Sink<W> {
    fn accept(&mut self, delivery: Delivery) {
        if self.error.is_some() {
            return;
        }
        if let (Delivery::Data(chunk), Some(inner)) = (delivery, self.inner.as_mut()) {
            if let Err(e) = inner.write_all(&chunk) {
                self.error = Some(e);
            }
        }
    }
}

/// Codes everything written to it and writes the result to an inner writer
///
/// ```rust
/// use lzstream_engine::CodingWriter;
/// use lzstream_codec::CodecConfig;
/// use lzstream_types::{Check, Preset};
/// use std::io::Write;
///
/// let mut writer = CodingWriter::new(
///     Vec::new(),
///     CodecConfig::EasyEncoder { preset: Preset::DEFAULT, check: Check::Crc32 },
/// )?;
/// writer.write_all(b"some text")?;
/// let compressed = writer.finish()?;
/// assert!(compressed.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]));
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct CodingWriter<W: Write + Send + 'static> {
    coordinator: Coordinator,
    sink: Arc<Mutex<Sink<W>>>,
}

impl<W: Write + Send + 'static> CodingWriter<W> {
    /// Wrap `inner` with a stream configured by `config`
    pub fn new(inner: W, config: CodecConfig) -> io::Result<Self> {
        Self::with_buffer_size(inner, config, BufferSize::default())
    }

    /// Wrap `inner`, staging at most `buffer_size` bytes of output per write
    pub fn with_buffer_size(
        inner: W,
        config: CodecConfig,
        buffer_size: BufferSize,
    ) -> io::Result<Self> {
        let sink = Arc::new(Mutex::new(Sink {
            inner: Some(inner),
            error: None,
        }));
        let handler_sink = Arc::clone(&sink);
        let coordinator = CoordinatorBuilder::new()
            .buffer_size(buffer_size)
            .handler(move |delivery| {
                handler_sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .accept(delivery);
            })
            .build();
        coordinator.init(config).map_err(to_io_error)?;

        Ok(Self { coordinator, sink })
    }

    /// The stream doing the coding
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// End the stream, flush what is left and return the inner writer
    pub fn finish(self) -> io::Result<W> {
        self.coordinator.code(None, false).map_err(to_io_error)?;
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = sink.error.take() {
            return Err(e);
        }
        let mut inner = sink
            .inner
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already finished"))?;
        inner.flush()?;
        Ok(inner)
    }

    fn take_error(&self) -> io::Result<()> {
        match self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .error
            .take()
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<W: Write + Send + 'static> Write for CodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.coordinator
            .code(Some(Chunk::copy_from_slice(buf)), false)
            .map_err(to_io_error)?;
        self.take_error()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.take_error()?;
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

fn to_io_error(error: Error) -> io::Error {
    let kind = match error.kind() {
        ErrorKind::Codec => io::ErrorKind::InvalidData,
        ErrorKind::Config => io::ErrorKind::InvalidInput,
        ErrorKind::Resource => io::ErrorKind::Other,
    };
    io::Error::new(kind, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oneshot::decode_all;
    use lzstream_codec::MEMLIMIT_UNLIMITED;
    use lzstream_types::{Check, DecoderFlags, Preset};

    #[test]
    fn test_writer_round_trip() {
        let text = b"The quick brown fox jumps over the lazy dog. ".repeat(200);
        let mut writer = CodingWriter::with_buffer_size(
            Vec::new(),
            CodecConfig::EasyEncoder {
                preset: Preset::new(1).unwrap(),
                check: Check::Crc64,
            },
            BufferSize::new(64).unwrap(),
        )
        .unwrap();
        for piece in text.chunks(333) {
            writer.write_all(piece).unwrap();
        }
        writer.flush().unwrap();
        let compressed = writer.finish().unwrap();
        assert!(compressed.len() < text.len());

        let restored = decode_all(
            CodecConfig::AutoDecoder {
                memlimit: MEMLIMIT_UNLIMITED,
                flags: DecoderFlags::empty(),
            },
            &compressed,
        )
        .unwrap();
        assert_eq!(restored, text);
    }

    #[test]
    fn test_writer_reports_corrupt_input() {
        let mut writer = CodingWriter::new(
            Vec::new(),
            CodecConfig::StreamDecoder {
                memlimit: MEMLIMIT_UNLIMITED,
                flags: DecoderFlags::empty(),
            },
        )
        .unwrap();
        let error = writer.write_all(b"definitely not xz data").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[derive(Debug)]
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_inner_write_error_surfaces() {
        let writer = CodingWriter::new(
            FailingWriter,
            CodecConfig::EasyEncoder {
                preset: Preset::new(0).unwrap(),
                check: Check::None,
            },
        )
        .unwrap();
        let error = writer.finish().unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
    }
}
