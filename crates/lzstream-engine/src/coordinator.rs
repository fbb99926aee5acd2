//! Chunked stream coordinator
//!
//! A [`Coordinator`] owns one codec instance together with its input queue,
//! its pending deliveries and the flags that let the same stream be coded
//! synchronously on the caller's thread or asynchronously on a worker thread.
//! Once a stream has gone asynchronous it stays asynchronous until it is reset.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, ThreadId};

use lzstream_codec::{CodecBackend, CodecConfig, CodecEngine, FilterChain, LzmaBackend};
use lzstream_config::StreamConfig;
use lzstream_types::{
    BufferSize, Check, Chunk, CodecErrorKind, CodecStatus, DecoderFlags, Error, LzmaOptions,
    Preset, Result,
};
use tracing::{debug, warn};

use crate::delivery::{hand_over, BufferHandler, Delivery, LoopHandle};
use crate::drive::{drive, worker_main, DriveMode};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Everything guarded by a stream's lock
pub(crate) struct State {
    pub(crate) codec: Option<Box<dyn CodecEngine>>,
    pub(crate) buffer_size: BufferSize,
    pub(crate) input_queue: VecDeque<Chunk>,
    /// Chunk the codec is reading from and how far it got
    pub(crate) current: Option<(Chunk, usize)>,
    /// Events produced but not yet handed to the handler
    pub(crate) pending: VecDeque<Delivery>,
    pub(crate) should_finish: bool,
    pub(crate) finished: bool,
    pub(crate) last_status: CodecStatus,
    /// Failure of an asynchronous step, kept until checked
    pub(crate) error: Option<CodecErrorKind>,
    pub(crate) is_async: bool,
    pub(crate) has_running_worker: bool,
    pub(crate) has_pending_callbacks: bool,
    pub(crate) has_running_callbacks: bool,
    pub(crate) callback_thread: Option<ThreadId>,
    pub(crate) is_shutting_down: bool,
}

impl State {
    fn new(buffer_size: BufferSize) -> Self {
        Self {
            codec: None,
            buffer_size,
            input_queue: VecDeque::new(),
            current: None,
            pending: VecDeque::new(),
            should_finish: false,
            finished: false,
            last_status: CodecStatus::Ok,
            error: None,
            is_async: false,
            has_running_worker: false,
            has_pending_callbacks: false,
            has_running_callbacks: false,
            callback_thread: None,
            is_shutting_down: false,
        }
    }

    pub(crate) fn has_buffered_input(&self) -> bool {
        self.current.is_some()
    }

    /// Forget the current stream. The worker must already be stopped.
    fn clear_stream(&mut self) {
        self.codec = None;
        self.input_queue.clear();
        self.current = None;
        self.pending.clear();
        self.should_finish = false;
        self.finished = false;
        self.last_status = CodecStatus::Ok;
        self.error = None;
        self.is_async = false;
        self.has_pending_callbacks = false;
    }
}

/// State shared between a coordinator, its worker and its delivery loop
pub(crate) struct Shared {
    pub(crate) id: u64,
    state: Mutex<State>,
    pub(crate) input_cond: Condvar,
    pub(crate) lifespan_cond: Condvar,
    handler: Mutex<Option<BufferHandler>>,
    backend: Arc<dyn CodecBackend>,
    pub(crate) delivery_loop: Option<LoopHandle>,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand every pending event to the handler on the current thread
    ///
    /// If the handler is already running, the thread running it picks the
    /// events up before letting go.
    fn dispatch(&self) {
        loop {
            let mut handler = match self.handler.try_lock() {
                Ok(handler) => handler,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let batch: Vec<Delivery> = self.lock_state().pending.drain(..).collect();
                if batch.is_empty() {
                    break;
                }
                hand_over(&mut handler, batch);
            }
            drop(handler);
            if self.lock_state().pending.is_empty() {
                return;
            }
        }
    }

    /// Dispatch in response to a wake-up posted by the worker
    ///
    /// Returns `false` without running the handler once the stream is being
    /// torn down.
    pub(crate) fn dispatch_posted(&self) -> bool {
        {
            let mut state = self.lock_state();
            state.has_pending_callbacks = false;
            if state.is_shutting_down {
                return false;
            }
            state.has_running_callbacks = true;
            state.callback_thread = Some(thread::current().id());
        }

        self.dispatch();

        let mut state = self.lock_state();
        state.has_running_callbacks = false;
        state.callback_thread = None;
        drop(state);
        self.lifespan_cond.notify_all();
        true
    }

    /// Ask a running worker to stop and wait until it has
    fn stop_worker<'a>(&'a self, mut state: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        if state.has_running_worker {
            debug!("Stopping worker of stream {}", self.id);
            state.is_shutting_down = true;
            self.input_cond.notify_all();
            while state.has_running_worker {
                state = self
                    .lifespan_cond
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            state.is_shutting_down = false;
        }
        state
    }
}

/// A stream coding chunks through one codec instance
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use lzstream_engine::{Coordinator, Delivery};
/// use lzstream_types::{Check, Chunk, Preset};
///
/// let output = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&output);
/// let encoder = Coordinator::builder()
///     .handler(move |delivery| {
///         if let Delivery::Data(chunk) = delivery {
///             sink.lock().unwrap().extend_from_slice(&chunk);
///         }
///     })
///     .build();
///
/// encoder.init_easy_encoder(Preset::DEFAULT, Check::Crc64)?;
/// encoder.code(Some(Chunk::from(b"hello".to_vec())), false)?;
/// encoder.code(None, false)?;
///
/// assert!(encoder.is_finished());
/// assert_eq!(encoder.total_in(), 5);
/// assert!(!output.lock().unwrap().is_empty());
/// # Ok::<(), lzstream_types::Error>(())
/// ```
pub struct Coordinator {
    shared: Arc<Shared>,
    async_by_default: bool,
}

impl Coordinator {
    /// Create a coordinator on the liblzma backend with default settings
    pub fn new() -> Self {
        CoordinatorBuilder::new().build()
    }

    /// Start building a coordinator
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Stream identifier used in log output
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Replace the buffer handler
    ///
    /// Must not be called from within the handler itself.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnMut(Delivery) + Send + 'static,
    {
        let mut slot = self
            .shared
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Box::new(handler));
    }

    /// Configure the codec for a new stream
    ///
    /// Fails with [`Error::AlreadyConfigured`] while a stream is configured,
    /// including one that has ended; call [`Coordinator::reset`] first. A
    /// stream that failed while coding has already been reset.
    pub fn init(&self, config: CodecConfig) -> Result<()> {
        let mut state = self.shared.lock_state();
        if state.codec.is_some() {
            return Err(Error::AlreadyConfigured);
        }
        state = self.shared.stop_worker(state);
        state.clear_stream();

        let codec = self.shared.backend.init(&config).map_err(|kind| {
            warn!("Stream {} failed to initialize {}: {}", self.shared.id, config.name(), kind);
            Error::from(kind)
        })?;
        state.codec = Some(codec);
        debug!("Stream {} initialized as {}", self.shared.id, config.name());
        Ok(())
    }

    /// Raw encoder driven by a filter chain, without container framing
    pub fn init_raw_encoder(&self, chain: FilterChain) -> Result<()> {
        if chain.is_empty() {
            return Err(Error::missing_argument("filters"));
        }
        self.init(CodecConfig::RawEncoder(chain))
    }

    /// Raw decoder driven by a filter chain, without container framing
    pub fn init_raw_decoder(&self, chain: FilterChain) -> Result<()> {
        if chain.is_empty() {
            return Err(Error::missing_argument("filters"));
        }
        self.init(CodecConfig::RawDecoder(chain))
    }

    /// `.xz` encoder from a preset
    pub fn init_easy_encoder(&self, preset: Preset, check: Check) -> Result<()> {
        self.init(CodecConfig::EasyEncoder { preset, check })
    }

    /// `.xz` encoder from a filter chain
    pub fn init_stream_encoder(&self, chain: FilterChain, check: Check) -> Result<()> {
        self.init(CodecConfig::StreamEncoder { chain, check })
    }

    /// Legacy `.lzma` encoder
    pub fn init_alone_encoder(&self, options: LzmaOptions) -> Result<()> {
        self.init(CodecConfig::AloneEncoder(options))
    }

    /// `.xz` decoder
    pub fn init_stream_decoder(&self, memlimit: u64, flags: DecoderFlags) -> Result<()> {
        self.init(CodecConfig::StreamDecoder { memlimit, flags })
    }

    /// Decoder accepting `.xz` or `.lzma`
    pub fn init_auto_decoder(&self, memlimit: u64, flags: DecoderFlags) -> Result<()> {
        self.init(CodecConfig::AutoDecoder { memlimit, flags })
    }

    /// Legacy `.lzma` decoder
    pub fn init_alone_decoder(&self, memlimit: u64) -> Result<()> {
        self.init(CodecConfig::AloneDecoder { memlimit })
    }

    /// Swap the active filter chain
    pub fn update_filters(&self, chain: &FilterChain) -> Result<()> {
        let mut state = self.shared.lock_state();
        let codec = state.codec.as_mut().ok_or(Error::NotConfigured)?;
        codec.update_filters(chain).map_err(Error::from)
    }

    /// Change the codec's memory usage limit
    ///
    /// A limit below current usage is reported by the codec as
    /// [`CodecErrorKind::MemLimit`].
    pub fn set_memlimit(&self, limit: u64) -> Result<()> {
        let mut state = self.shared.lock_state();
        let codec = state.codec.as_mut().ok_or(Error::NotConfigured)?;
        codec.set_memlimit(limit).map_err(Error::from)
    }

    /// Current memory usage limit
    pub fn memlimit(&self) -> Result<u64> {
        let state = self.shared.lock_state();
        state
            .codec
            .as_ref()
            .map(|codec| codec.memlimit())
            .ok_or(Error::NotConfigured)
    }

    /// Current memory usage
    ///
    /// `Ok(None)` when the codec engine cannot report it, which is the case
    /// for the liblzma backend.
    pub fn memusage(&self) -> Result<Option<u64>> {
        let state = self.shared.lock_state();
        state
            .codec
            .as_ref()
            .map(|codec| codec.memusage())
            .ok_or(Error::NotConfigured)
    }

    /// Feed a chunk, or finish the stream with `None` or an empty chunk
    ///
    /// Synchronous calls drive the codec on this thread and hand every result
    /// to the handler before returning. A codec failure is delivered and also
    /// returned. Asynchronous calls, and every call once the stream has gone
    /// asynchronous, queue the input for the worker and return at once.
    pub fn code(&self, input: Option<Chunk>, async_mode: bool) -> Result<()> {
        let input = input.filter(|chunk| !chunk.is_empty());
        let mut state = self.shared.lock_state();

        if state.finished {
            return match input {
                None => Ok(()),
                Some(_) => Err(Error::StreamEnded),
            };
        }
        if state.codec.is_none() {
            return Err(match state.last_status {
                CodecStatus::Error(kind) => Error::from(kind),
                _ => Error::NotConfigured,
            });
        }
        if state.should_finish && input.is_some() {
            return Err(Error::StreamEnded);
        }

        let go_async = async_mode || state.is_async;
        if go_async && !state.has_running_worker {
            self.spawn_worker(&mut state)?;
        }

        match input {
            Some(chunk) => state.input_queue.push_back(chunk),
            None => state.should_finish = true,
        }

        if go_async {
            drop(state);
            self.shared.input_cond.notify_all();
            return Ok(());
        }

        let state = drive(&self.shared, state, DriveMode::Sync);
        let failure = match state.last_status {
            CodecStatus::Error(kind) if state.codec.is_none() => Some(kind),
            _ => None,
        };
        drop(state);

        self.shared.dispatch();
        failure.map_or(Ok(()), |kind| Err(Error::from(kind)))
    }

    /// [`Coordinator::code`] in the mode chosen when the coordinator was built
    pub fn feed(&self, input: Option<Chunk>) -> Result<()> {
        self.code(input, self.async_by_default)
    }

    fn spawn_worker(&self, state: &mut State) -> Result<()> {
        if self.shared.delivery_loop.is_none() {
            return Err(Error::resource(
                "asynchronous coding needs a delivery loop",
            ));
        }

        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("lzstream-worker-{}", self.shared.id))
            .spawn(move || worker_main(shared))
            .map_err(|e| Error::resource(format!("failed to start coding worker: {}", e)))?;

        state.has_running_worker = true;
        state.is_async = true;
        Ok(())
    }

    /// Bytes consumed since the codec was initialized
    pub fn total_in(&self) -> u64 {
        let state = self.shared.lock_state();
        state.codec.as_ref().map_or(0, |codec| codec.total_in())
    }

    /// Bytes produced since the codec was initialized
    pub fn total_out(&self) -> u64 {
        let state = self.shared.lock_state();
        state.codec.as_ref().map_or(0, |codec| codec.total_out())
    }

    /// Return and clear the failure of an asynchronous step, if any
    pub fn check_and_clear_error(&self) -> Result<()> {
        match self.shared.lock_state().error.take() {
            Some(kind) => Err(Error::from(kind)),
            None => Ok(()),
        }
    }

    /// Stop any worker, release the codec and forget queued input and results
    pub fn reset(&self) {
        let state = self.shared.lock_state();
        let mut state = self.shared.stop_worker(state);
        state.clear_stream();
        debug!("Stream {} reset", self.shared.id);
    }

    /// Whether the stream has reached its end
    pub fn is_finished(&self) -> bool {
        self.shared.lock_state().finished
    }

    /// Whether the stream is being coded on a worker thread
    pub fn is_async(&self) -> bool {
        self.shared.lock_state().is_async
    }

    /// Status of the most recent codec step
    pub fn last_status(&self) -> CodecStatus {
        self.shared.lock_state().last_status
    }

    /// Output staging buffer size
    pub fn buffer_size(&self) -> BufferSize {
        self.shared.lock_state().buffer_size
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Coordinator")
            .field("id", &self.shared.id)
            .field("configured", &state.codec.is_some())
            .field("is_async", &state.is_async)
            .field("finished", &state.finished)
            .field("last_status", &state.last_status)
            .finish_non_exhaustive()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        state.is_shutting_down = true;
        self.shared.input_cond.notify_all();

        let on_callback_thread = state.callback_thread == Some(thread::current().id());
        while state.has_running_worker || (state.has_running_callbacks && !on_callback_thread) {
            state = self
                .shared
                .lifespan_cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.codec = None;
        state.input_queue.clear();
        state.current = None;
        state.pending.clear();
        debug!("Stream {} dropped", self.shared.id);
    }
}

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder {
    buffer_size: BufferSize,
    backend: Option<Arc<dyn CodecBackend>>,
    delivery_loop: Option<LoopHandle>,
    handler: Option<BufferHandler>,
    async_by_default: bool,
}

impl CoordinatorBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            buffer_size: BufferSize::default(),
            backend: None,
            delivery_loop: None,
            handler: None,
            async_by_default: false,
        }
    }

    /// Create a builder from stream configuration
    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new()
            .buffer_size(config.buffer_size)
            .async_by_default(config.async_mode)
    }

    /// Set the output staging buffer size
    pub fn buffer_size(mut self, buffer_size: BufferSize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Use a codec backend other than liblzma
    pub fn backend(mut self, backend: Arc<dyn CodecBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach a delivery loop, required for asynchronous coding
    pub fn delivery_loop(mut self, handle: LoopHandle) -> Self {
        self.delivery_loop = Some(handle);
        self
    }

    /// Register the buffer handler
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(Delivery) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Mode used by [`Coordinator::feed`]
    pub fn async_by_default(mut self, async_mode: bool) -> Self {
        self.async_by_default = async_mode;
        self
    }

    /// Build the coordinator
    pub fn build(self) -> Coordinator {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(LzmaBackend::new()));

        Coordinator {
            shared: Arc::new(Shared {
                id,
                state: Mutex::new(State::new(self.buffer_size)),
                input_cond: Condvar::new(),
                lifespan_cond: Condvar::new(),
                handler: Mutex::new(self.handler),
                backend,
                delivery_loop: self.delivery_loop,
            }),
            async_by_default: self.async_by_default,
        }
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
