//! Result delivery
//!
//! A stream hands its results to a single registered handler as a sequence of
//! [`Delivery`] events. Synchronous coding invokes the handler on the calling
//! thread before `code()` returns. Asynchronous coding never calls the handler
//! from the worker: the worker posts a wake-up to a [`DeliveryLoop`], and the
//! handler runs when the owner of that loop drains it.

use std::sync::Weak;

use lzstream_types::{Chunk, CodecErrorKind};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{trace, warn};

use crate::coordinator::Shared;

/// One event handed to a stream's buffer handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A chunk of coded output, at most `buffer_size` bytes long
    Data(Chunk),
    /// All input queued so far has been consumed
    ChunkBoundary,
    /// The stream ended cleanly; no further events follow
    End,
    /// The codec failed; the stream has been reset
    Failed(CodecErrorKind),
}

impl Delivery {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Failed(_))
    }
}

/// Callback receiving a stream's deliveries in production order
pub type BufferHandler = Box<dyn FnMut(Delivery) + Send>;

/// A stream with results waiting to be handed to its handler
pub(crate) type Wakeup = Weak<Shared>;

/// Sending side of a [`DeliveryLoop`], held by every stream attached to it
#[derive(Debug, Clone)]
pub struct LoopHandle {
    tx: UnboundedSender<Wakeup>,
}

impl LoopHandle {
    pub(crate) fn post(&self, stream: Wakeup) -> bool {
        self.tx.send(stream).is_ok()
    }
}

/// The caller's execution context for asynchronous deliveries
///
/// Every stream attached through [`LoopHandle`] posts at most one outstanding
/// wake-up. Draining the loop invokes each woken stream's handler with that
/// stream's pending events as one batch.
#[derive(Debug)]
pub struct DeliveryLoop {
    tx: UnboundedSender<Wakeup>,
    rx: UnboundedReceiver<Wakeup>,
}

impl DeliveryLoop {
    /// Create an empty loop
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Handle to attach streams with
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            tx: self.tx.clone(),
        }
    }

    /// Dispatch every wake-up already posted, without blocking
    ///
    /// Returns the number of streams whose handler ran.
    pub fn run_pending(&mut self) -> usize {
        let mut dispatched = 0;
        loop {
            match self.rx.try_recv() {
                Ok(stream) => dispatched += usize::from(dispatch(&stream)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        dispatched
    }

    /// Block until at least one wake-up arrives, then dispatch everything posted
    ///
    /// Must not be called from within an asynchronous runtime; use
    /// [`DeliveryLoop::recv`] there.
    pub fn wait(&mut self) -> usize {
        match self.rx.blocking_recv() {
            Some(stream) => usize::from(dispatch(&stream)) + self.run_pending(),
            None => 0,
        }
    }

    /// Wait for at least one wake-up, then dispatch everything posted
    pub async fn recv(&mut self) -> usize {
        match self.rx.recv().await {
            Some(stream) => usize::from(dispatch(&stream)) + self.run_pending(),
            None => 0,
        }
    }
}

impl Default for DeliveryLoop {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(stream: &Wakeup) -> bool {
    match stream.upgrade() {
        Some(shared) => {
            let dispatched = shared.dispatch_posted();
            if !dispatched {
                trace!("Skipping wake-up for stream {} being torn down", shared.id);
            }
            dispatched
        }
        None => {
            trace!("Skipping wake-up for a dropped stream");
            false
        }
    }
}

/// Hand events to a handler, or log them when none is registered
pub(crate) fn hand_over(handler: &mut Option<BufferHandler>, batch: Vec<Delivery>) {
    match handler.as_mut() {
        Some(handler) => batch.into_iter().for_each(|delivery| handler(delivery)),
        None => {
            for delivery in batch {
                warn!("No buffer handler registered, dropping {:?}", delivery);
            }
        }
    }
}
