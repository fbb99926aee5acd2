//! The drive cycle shared by synchronous and asynchronous coding

use std::sync::{Arc, MutexGuard, PoisonError};

use bytes::BytesMut;
use lzstream_codec::StepStatus;
use lzstream_types::{Action, Chunk, CodecErrorKind, CodecStatus};
use tracing::{debug, trace, warn};

use crate::coordinator::{Shared, State};
use crate::delivery::Delivery;

/// Where a drive cycle runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DriveMode {
    /// On the caller's thread; returns when queued input runs out
    Sync,
    /// On the stream's worker thread; waits for more input
    Async,
}

/// Run the codec against queued input until it runs dry, ends or fails
///
/// The state lock is held for every queue mutation and codec step and is only
/// released while an asynchronous cycle waits for input.
pub(crate) fn drive<'a>(
    shared: &'a Arc<Shared>,
    mut state: MutexGuard<'a, State>,
    mode: DriveMode,
) -> MutexGuard<'a, State> {
    let buffer_size = state.buffer_size.get();
    let mut outbuf = BytesMut::zeroed(buffer_size);
    let mut action = Action::Run;
    let mut consumed_input = false;
    let mut output_full = false;
    let mut stalled = false;

    loop {
        if state.is_shutting_down {
            break;
        }
        if !state.has_buffered_input() && !output_full {
            if state.input_queue.is_empty() {
                if consumed_input {
                    state.pending.push_back(Delivery::ChunkBoundary);
                    consumed_input = false;
                    if mode == DriveMode::Async {
                        deliver(shared, &mut state, mode);
                    }
                }
                if mode == DriveMode::Async {
                    while state.input_queue.is_empty()
                        && !state.should_finish
                        && !state.is_shutting_down
                    {
                        state = shared
                            .input_cond
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                }
                if state.is_shutting_down {
                    break;
                }
                if action == Action::Finish {
                    if stalled {
                        fail(&mut state, CodecErrorKind::Buf);
                        deliver(shared, &mut state, mode);
                        break;
                    }
                } else if state.input_queue.is_empty() {
                    if state.should_finish {
                        action = Action::Finish;
                    } else {
                        break;
                    }
                }
            }
            if action == Action::Run {
                state.current = state.input_queue.pop_front().map(|chunk| (chunk, 0));
                consumed_input |= state.current.is_some();
            }
        }

        let result = {
            let State { codec, current, .. } = &mut *state;
            let Some(codec) = codec.as_mut() else {
                break;
            };
            let input = current
                .as_ref()
                .map_or(&[][..], |(chunk, offset)| &chunk[*offset..]);
            codec.step(input, &mut outbuf[..], action)
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(kind) => {
                fail(&mut state, kind);
                deliver(shared, &mut state, mode);
                break;
            }
        };

        trace!(
            "Stream {} step: consumed {} produced {} status {:?}",
            shared.id,
            outcome.consumed,
            outcome.produced,
            outcome.status
        );

        if let Some((chunk, offset)) = state.current.as_mut() {
            *offset += outcome.consumed;
            if *offset >= chunk.len() {
                state.current = None;
            }
        }
        if outcome.produced > 0 {
            let produced = outbuf.split_to(outcome.produced).freeze();
            outbuf.resize(buffer_size, 0);
            state.pending.push_back(Delivery::Data(Chunk::from(produced)));
        }
        output_full = outcome.produced == buffer_size;
        stalled = outcome.consumed == 0 && outcome.produced == 0;

        match outcome.status {
            StepStatus::Ok => {
                state.last_status = CodecStatus::Ok;
                if output_full || !state.has_buffered_input() {
                    deliver(shared, &mut state, mode);
                }
            }
            StepStatus::End => {
                end(&mut state, shared.id);
                deliver(shared, &mut state, mode);
                break;
            }
        }
    }

    deliver(shared, &mut state, mode);
    state
}

fn fail(state: &mut State, kind: CodecErrorKind) {
    warn!("Codec step failed: {}", kind);
    state.last_status = CodecStatus::Error(kind);
    state.codec = None;
    state.current = None;
    state.input_queue.clear();
    state.should_finish = false;
    state.pending.push_back(Delivery::Failed(kind));
    if state.is_async {
        state.error = Some(kind);
    }
}

fn end(state: &mut State, id: u64) {
    let discarded = state.input_queue.iter().map(Chunk::len).sum::<usize>()
        + state
            .current
            .take()
            .map_or(0, |(chunk, offset)| chunk.len() - offset);
    if discarded > 0 {
        debug!("Stream {} ended with {} bytes of input left over", id, discarded);
    }
    state.input_queue.clear();
    state.last_status = CodecStatus::End;
    state.finished = true;
    state.pending.push_back(Delivery::End);
}

/// Make pending events available to the handler
///
/// Synchronous cycles leave them for the caller to dispatch once the cycle
/// returns. Asynchronous cycles wake the delivery loop, at most once until it
/// has drained this stream.
fn deliver(shared: &Arc<Shared>, state: &mut State, mode: DriveMode) {
    if mode == DriveMode::Sync || state.pending.is_empty() || state.has_pending_callbacks {
        return;
    }
    let Some(delivery_loop) = shared.delivery_loop.as_ref() else {
        return;
    };
    if delivery_loop.post(Arc::downgrade(shared)) {
        state.has_pending_callbacks = true;
    } else {
        warn!("Delivery loop for stream {} is gone; results stay queued", shared.id);
    }
}

/// Body of a stream's worker thread
pub(crate) fn worker_main(shared: Arc<Shared>) {
    let _guard = WorkerGuard(&shared);
    debug!("Stream {} worker started", shared.id);
    let state = drive(&shared, shared.lock_state(), DriveMode::Async);
    debug!("Stream {} worker stopped: {:?}", shared.id, state.last_status);
}

/// Clears the running-worker flag once the worker is done, including on unwind
struct WorkerGuard<'a>(&'a Shared);

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock_state();
        state.has_running_worker = false;
        drop(state);
        self.0.lifespan_cond.notify_all();
    }
}
