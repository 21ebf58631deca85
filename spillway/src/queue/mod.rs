//! Single-writer, single-reader FIFO queues connecting pipeline stages.
//!
//! A queue is created with [`BoundedQueue::new`] and immediately split into
//! its two halves:
//!
//! - [`QueueWriter`]: owned by the upstream stage. `enqueue` suspends while
//!   the queue is full; `close` is one-shot and also runs when the writer is
//!   dropped.
//! - [`QueueReader`]: owned by the downstream stage. `dequeue` suspends while
//!   the queue is empty and open and yields `None` once it is closed and
//!   drained.
//!
//! # Close Cascade
//!
//! ```text
//! Producer ──close──► primary queue ──EOS──► Consumer ──close──► error queue ──EOS──► Escalator
//! ```
//!
//! Each stage owns the writer of the queue below it, so a stage that
//! finishes, fails or is cancelled always releases its downstream queue.
//!
//! # Example
//!
//! ```
//! use spillway::queue::{BoundedQueue, QueueCapacity};
//!
//! # tokio_test_block_on(async {
//! let (mut writer, mut reader) = BoundedQueue::new(QueueCapacity::Bounded(2)).split();
//! writer.enqueue(1u64).await.unwrap();
//! writer.close();
//!
//! assert_eq!(reader.dequeue().await, Some(1));
//! assert_eq!(reader.dequeue().await, None);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod bounded;
mod error;

pub use bounded::{BoundedQueue, QueueCapacity, QueueReader, QueueStats, QueueWriter};
pub use error::QueueError;
