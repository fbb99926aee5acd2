//! Chunked stream coordinator for lzstream
//!
//! This crate turns a single-threaded, buffer-in/buffer-out codec into a
//! streaming API that accepts input in chunks and hands coded output back in
//! bounded chunks, either synchronously on the caller's thread or from a
//! background worker thread.
//!
//! # Features
//!
//! - **Coordinator**: one codec instance with its input queue and lifecycle flags
//! - **Drive cycle**: the same algorithm for synchronous and asynchronous coding
//! - **Result delivery**: ordered [`Delivery`] events through a registered handler
//! - **Delivery loop**: asynchronous results run on the caller's own thread
//! - **Adapters**: [`CodingWriter`] and the [`encode_all`] / [`decode_all`] helpers
//!
//! # Examples
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use lzstream_engine::{Coordinator, Delivery, DeliveryLoop};
//! use lzstream_types::{Check, Chunk, Preset};
//!
//! let mut delivery_loop = DeliveryLoop::new();
//! let done = Arc::new(Mutex::new(false));
//! let flag = Arc::clone(&done);
//!
//! let encoder = Coordinator::builder()
//!     .delivery_loop(delivery_loop.handle())
//!     .handler(move |delivery| {
//!         if delivery == Delivery::End {
//!             *flag.lock().unwrap() = true;
//!         }
//!     })
//!     .build();
//!
//! encoder.init_easy_encoder(Preset::DEFAULT, Check::Crc64)?;
//! encoder.code(Some(Chunk::from(vec![b'a'; 1 << 16])), true)?;
//! encoder.code(None, true)?;
//!
//! while !*done.lock().unwrap() {
//!     delivery_loop.wait();
//! }
//! assert_eq!(encoder.total_in(), 1 << 16);
//! # Ok::<(), lzstream_types::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod coordinator;
pub mod delivery;
mod drive;
pub mod oneshot;
pub mod writer;

#[cfg(test)]
mod testing;

pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use delivery::{BufferHandler, Delivery, DeliveryLoop, LoopHandle};
pub use oneshot::{decode_all, encode_all};
pub use writer::CodingWriter;
