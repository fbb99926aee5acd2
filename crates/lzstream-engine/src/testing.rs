//! Scripted codec backend for coordinator tests

use lzstream_codec::{
    CodecBackend, CodecConfig, CodecEngine, StepOutcome, StepStatus, MEMLIMIT_UNLIMITED,
};
use lzstream_types::{Action, CodecErrorKind};

/// How a [`CopyEngine`] misbehaves
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Script {
    /// Fail every step once this many bytes have been consumed
    pub fail_at: Option<(u64, CodecErrorKind)>,
    /// End the stream once this many bytes have been consumed
    pub end_at: Option<u64>,
    /// Fail initialization
    pub init_error: Option<CodecErrorKind>,
    /// Reported memory usage
    pub memusage: u64,
}

#[derive(Debug)]
pub(crate) struct ScriptedBackend {
    script: Script,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Script) -> Self {
        Self { script }
    }
}

impl CodecBackend for ScriptedBackend {
    fn init(&self, _config: &CodecConfig) -> Result<Box<dyn CodecEngine>, CodecErrorKind> {
        if let Some(kind) = self.script.init_error {
            return Err(kind);
        }
        Ok(Box::new(CopyEngine {
            script: self.script,
            total_in: 0,
            total_out: 0,
            memlimit: MEMLIMIT_UNLIMITED,
        }))
    }
}

/// Identity codec: copies input to output, ending on finish
struct CopyEngine {
    script: Script,
    total_in: u64,
    total_out: u64,
    memlimit: u64,
}

impl CodecEngine for CopyEngine {
    fn step(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        action: Action,
    ) -> Result<StepOutcome, CodecErrorKind> {
        let mut limit = input.len().min(output.len());
        if let Some((at, kind)) = self.script.fail_at {
            if self.total_in >= at {
                return Err(kind);
            }
            limit = limit.min((at - self.total_in) as usize);
        }
        if let Some(end) = self.script.end_at {
            limit = limit.min(end.saturating_sub(self.total_in) as usize);
        }

        output[..limit].copy_from_slice(&input[..limit]);
        self.total_in += limit as u64;
        self.total_out += limit as u64;

        let ended = match self.script.end_at {
            Some(end) => self.total_in >= end,
            None => action == Action::Finish && limit == input.len(),
        };
        Ok(StepOutcome {
            consumed: limit,
            produced: limit,
            status: if ended { StepStatus::End } else { StepStatus::Ok },
        })
    }

    fn total_in(&self) -> u64 {
        self.total_in
    }

    fn total_out(&self) -> u64 {
        self.total_out
    }

    fn memusage(&self) -> Option<u64> {
        Some(self.script.memusage)
    }

    fn memlimit(&self) -> u64 {
        self.memlimit
    }

    fn set_memlimit(&mut self, limit: u64) -> Result<(), CodecErrorKind> {
        if limit < self.script.memusage {
            return Err(CodecErrorKind::MemLimit);
        }
        self.memlimit = limit;
        Ok(())
    }
}
