//! liblzma-backed codec engine

use liblzma::stream::{self, Filters, Status, Stream};
use lzstream_types::{
    Action, Check, CodecErrorKind, LzmaOptions, MatchFinder, Mode, OptionBlock, Preset,
};
use tracing::{debug, trace};

use crate::engine::{CodecBackend, CodecConfig, CodecEngine, StepOutcome, StepStatus};
use crate::filters::{resolve_lzma_options, FilterChain, FilterEntry};

/// Map a liblzma error to its status kind
pub fn map_error(error: stream::Error) -> CodecErrorKind {
    match error {
        stream::Error::Data => CodecErrorKind::Data,
        stream::Error::Options => CodecErrorKind::Options,
        stream::Error::Format => CodecErrorKind::Format,
        stream::Error::MemLimit => CodecErrorKind::MemLimit,
        stream::Error::Mem => CodecErrorKind::Mem,
        stream::Error::Program => CodecErrorKind::Program,
        stream::Error::NoCheck => CodecErrorKind::NoCheck,
        stream::Error::UnsupportedCheck => CodecErrorKind::UnsupportedCheck,
    }
}

/// Map a successful liblzma status
///
/// `GetCheck` only tells that the check type is now known, so coding goes on.
pub fn map_status(status: Status) -> Result<StepStatus, CodecErrorKind> {
    match status {
        Status::Ok | Status::GetCheck => Ok(StepStatus::Ok),
        Status::StreamEnd => Ok(StepStatus::End),
        Status::MemNeeded => Err(CodecErrorKind::Buf),
    }
}

fn to_action(action: Action) -> stream::Action {
    match action {
        Action::Run => stream::Action::Run,
        Action::Finish => stream::Action::Finish,
    }
}

fn to_check(check: Check) -> stream::Check {
    match check {
        Check::None => stream::Check::None,
        Check::Crc32 => stream::Check::Crc32,
        Check::Crc64 => stream::Check::Crc64,
        Check::Sha256 => stream::Check::Sha256,
    }
}

fn to_mode(mode: Mode) -> stream::Mode {
    match mode {
        Mode::Fast => stream::Mode::Fast,
        Mode::Normal => stream::Mode::Normal,
    }
}

fn to_match_finder(match_finder: MatchFinder) -> stream::MatchFinder {
    match match_finder {
        MatchFinder::Hc3 => stream::MatchFinder::HashChain3,
        MatchFinder::Hc4 => stream::MatchFinder::HashChain4,
        MatchFinder::Bt2 => stream::MatchFinder::BinaryTree2,
        MatchFinder::Bt3 => stream::MatchFinder::BinaryTree3,
        MatchFinder::Bt4 => stream::MatchFinder::BinaryTree4,
    }
}

/// Features whose availability depends on how liblzma was built
///
/// ```rust
/// use lzstream_codec::LibrarySupport;
/// use lzstream_types::Check;
///
/// assert!(Check::Crc32.is_supported());
/// ```
pub trait LibrarySupport: Copy {
    /// Whether the linked liblzma supports this value
    fn is_supported(self) -> bool;
}

impl LibrarySupport for Check {
    fn is_supported(self) -> bool {
        to_check(self).is_supported()
    }
}

impl LibrarySupport for MatchFinder {
    fn is_supported(self) -> bool {
        to_match_finder(self).is_supported()
    }
}

impl LibrarySupport for Mode {
    /// liblzma's safe bindings have no mode query, so this opens a raw
    /// encoder with the smallest dictionary in this mode
    fn is_supported(self) -> bool {
        let Ok(mut options) = stream::LzmaOptions::new_preset(0) else {
            return false;
        };
        options.dict_size(4096).mode(to_mode(self));
        let mut filters = Filters::new();
        filters.lzma2(&options);
        Stream::new_raw_encoder(&filters).is_ok()
    }
}

/// Materialize LZMA options
///
/// A preset is applied after the explicit fields and so replaces them. Without
/// one, unset fields take the library defaults.
pub fn to_lzma_options(options: &LzmaOptions) -> Result<stream::LzmaOptions, CodecErrorKind> {
    if let Some(preset) = options.preset {
        return stream::LzmaOptions::new_preset(preset.raw()).map_err(map_error);
    }

    let options = resolve_lzma_options(Some(*options));
    let mut native =
        stream::LzmaOptions::new_preset(Preset::DEFAULT.raw()).map_err(map_error)?;

    if let Some(dict_size) = options.dict_size {
        native.dict_size(dict_size);
    }
    if let Some(lc) = options.lc {
        native.literal_context_bits(lc);
    }
    if let Some(lp) = options.lp {
        native.literal_position_bits(lp);
    }
    if let Some(pb) = options.pb {
        native.position_bits(pb);
    }
    if let Some(mode) = options.mode {
        native.mode(to_mode(mode));
    }
    if let Some(nice_len) = options.nice_len {
        native.nice_len(nice_len);
    }
    if let Some(match_finder) = options.match_finder {
        native.match_finder(to_match_finder(match_finder));
    }
    if let Some(depth) = options.depth {
        native.depth(depth);
    }

    Ok(native)
}

fn push_filter(filters: &mut Filters, entry: &FilterEntry) -> Result<(), CodecErrorKind> {
    use lzstream_types::FilterId;

    match (entry.id(), entry.options()) {
        (FilterId::Lzma1, Some(OptionBlock::Lzma(options))) => {
            filters.lzma1(&to_lzma_options(options)?);
        }
        (FilterId::Lzma2, Some(OptionBlock::Lzma(options))) => {
            filters.lzma2(&to_lzma_options(options)?);
        }
        (FilterId::Delta, Some(OptionBlock::Delta(options))) => {
            filters
                .delta_properties(&[options.property_byte()])
                .map_err(map_error)?;
        }
        (FilterId::X86, None) => {
            filters.x86();
        }
        (FilterId::PowerPc, None) => {
            filters.powerpc();
        }
        (FilterId::Ia64, None) => {
            filters.ia64();
        }
        (FilterId::Arm, None) => {
            filters.arm();
        }
        (FilterId::ArmThumb, None) => {
            filters.arm_thumb();
        }
        (FilterId::Sparc, None) => {
            filters.sparc();
        }
        _ => return Err(CodecErrorKind::Options),
    }
    Ok(())
}

/// Convert a validated chain into liblzma's filter list
pub fn to_filters(chain: &FilterChain) -> Result<Filters, CodecErrorKind> {
    let mut filters = Filters::new();
    for entry in chain.stages() {
        push_filter(&mut filters, entry)?;
    }
    Ok(filters)
}

fn open_stream(config: &CodecConfig) -> Result<Stream, CodecErrorKind> {
    let stream = match config {
        CodecConfig::RawEncoder(chain) => Stream::new_raw_encoder(&to_filters(chain)?),
        CodecConfig::RawDecoder(chain) => Stream::new_raw_decoder(&to_filters(chain)?),
        CodecConfig::EasyEncoder { preset, check } => {
            Stream::new_easy_encoder(preset.raw(), to_check(*check))
        }
        CodecConfig::StreamEncoder { chain, check } => {
            Stream::new_stream_encoder(&to_filters(chain)?, to_check(*check))
        }
        CodecConfig::AloneEncoder(options) => {
            Stream::new_lzma_encoder(&to_lzma_options(options)?)
        }
        CodecConfig::StreamDecoder { memlimit, flags } => {
            Stream::new_stream_decoder(*memlimit, flags.bits())
        }
        CodecConfig::AutoDecoder { memlimit, flags } => {
            Stream::new_auto_decoder(*memlimit, flags.bits())
        }
        CodecConfig::AloneDecoder { memlimit } => Stream::new_lzma_decoder(*memlimit),
    };
    stream.map_err(map_error)
}

/// Codec backend using the liblzma library
#[derive(Debug, Default, Clone, Copy)]
pub struct LzmaBackend;

impl LzmaBackend {
    /// Create a new backend
    pub fn new() -> Self {
        Self
    }
}

impl CodecBackend for LzmaBackend {
    fn init(&self, config: &CodecConfig) -> Result<Box<dyn CodecEngine>, CodecErrorKind> {
        let stream = open_stream(config)?;
        debug!("Initialized liblzma {}", config.name());
        Ok(Box::new(LzmaEngine {
            stream,
            config: config.clone(),
        }))
    }
}

/// A liblzma stream together with the configuration it was opened with
pub struct LzmaEngine {
    stream: Stream,
    config: CodecConfig,
}

impl CodecEngine for LzmaEngine {
    fn step(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        action: Action,
    ) -> Result<StepOutcome, CodecErrorKind> {
        let before_in = self.stream.total_in();
        let before_out = self.stream.total_out();

        let result = self.stream.process(input, output, to_action(action));

        let consumed = (self.stream.total_in() - before_in) as usize;
        let produced = (self.stream.total_out() - before_out) as usize;
        let status = result.map_err(map_error).and_then(map_status)?;
        trace!(consumed, produced, ?status, "liblzma step");

        Ok(StepOutcome {
            consumed,
            produced,
            status,
        })
    }

    fn total_in(&self) -> u64 {
        self.stream.total_in()
    }

    fn total_out(&self) -> u64 {
        self.stream.total_out()
    }

    fn memlimit(&self) -> u64 {
        self.stream.memlimit()
    }

    fn set_memlimit(&mut self, limit: u64) -> Result<(), CodecErrorKind> {
        self.stream.set_memlimit(limit).map_err(map_error)
    }

    /// Reopens raw and `.xz` encoders with the new chain as long as no input
    /// has been consumed; liblzma's safe bindings have no in-place update.
    fn update_filters(&mut self, chain: &FilterChain) -> Result<(), CodecErrorKind> {
        if self.stream.total_in() != 0 {
            return Err(CodecErrorKind::Options);
        }

        let config = match &self.config {
            CodecConfig::RawEncoder(_) => CodecConfig::RawEncoder(chain.clone()),
            CodecConfig::StreamEncoder { check, .. } => CodecConfig::StreamEncoder {
                chain: chain.clone(),
                check: *check,
            },
            _ => return Err(CodecErrorKind::Options),
        };

        self.stream = open_stream(&config)?;
        self.config = config;
        debug!("Replaced filter chain ({} stage(s))", chain.len());
        Ok(())
    }
}
