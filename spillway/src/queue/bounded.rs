//! Tokio-backed queue halves with explicit close tracking.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::error::QueueError;

/// Queue capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueCapacity {
    /// At most this many items are held; writers suspend when full.
    Bounded(usize),
    /// No limit; `enqueue` never suspends.
    Unbounded,
}

impl QueueCapacity {
    /// Maps a configured size to a capacity, treating 0 as unbounded.
    pub fn from_size(size: usize) -> Self {
        if size == 0 {
            Self::Unbounded
        } else {
            Self::Bounded(size)
        }
    }

    /// Returns the configured size, with 0 meaning unbounded.
    pub fn as_size(&self) -> usize {
        match self {
            Self::Bounded(n) => *n,
            Self::Unbounded => 0,
        }
    }

    /// Returns the bound, or `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Bounded(n) => Some(*n),
            Self::Unbounded => None,
        }
    }
}

impl Default for QueueCapacity {
    fn default() -> Self {
        Self::Bounded(crate::pipeline::DEFAULT_QUEUE_CAPACITY)
    }
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "bounded({})", n),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// State shared between the two halves and any stats handles.
#[derive(Debug)]
struct QueueShared {
    capacity: QueueCapacity,
    closed: AtomicBool,
    close_count: AtomicU64,
    end_of_stream: AtomicBool,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    peak_len: AtomicUsize,
}

impl QueueShared {
    fn new(capacity: QueueCapacity) -> Self {
        Self {
            capacity,
            closed: AtomicBool::new(false),
            close_count: AtomicU64::new(0),
            end_of_stream: AtomicBool::new(false),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            peak_len: AtomicUsize::new(0),
        }
    }

    fn pending(&self) -> usize {
        let enqueued = self.enqueued.load(Ordering::Acquire);
        let dequeued = self.dequeued.load(Ordering::Acquire);
        enqueued.saturating_sub(dequeued) as usize
    }
}

enum Tx<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

enum Rx<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

/// A FIFO queue between two pipeline stages.
///
/// The queue itself is only a constructor; split it into its writer and
/// reader halves and hand each to the stage that owns it.
pub struct BoundedQueue<T> {
    writer: QueueWriter<T>,
    reader: QueueReader<T>,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is `QueueCapacity::Bounded(0)`.
    pub fn new(capacity: QueueCapacity) -> Self {
        let shared = Arc::new(QueueShared::new(capacity));
        let (tx, rx) = match capacity {
            QueueCapacity::Bounded(n) => {
                assert!(n > 0, "bounded queue capacity must be greater than 0");
                let (tx, rx) = mpsc::channel(n);
                (Tx::Bounded(tx), Rx::Bounded(rx))
            }
            QueueCapacity::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Tx::Unbounded(tx), Rx::Unbounded(rx))
            }
        };

        Self {
            writer: QueueWriter {
                tx: Some(tx),
                shared: Arc::clone(&shared),
            },
            reader: QueueReader { rx, shared },
        }
    }

    /// Returns a stats handle for this queue.
    pub fn stats(&self) -> QueueStats {
        self.writer.stats()
    }

    /// Splits the queue into its writer and reader halves.
    pub fn split(self) -> (QueueWriter<T>, QueueReader<T>) {
        (self.writer, self.reader)
    }
}

/// Writing half of a queue.
///
/// Exactly one writer exists per queue. Dropping it closes the queue.
pub struct QueueWriter<T> {
    tx: Option<Tx<T>>,
    shared: Arc<QueueShared>,
}

impl<T> QueueWriter<T> {
    /// Appends an item, suspending while the queue is full.
    ///
    /// Fails with [`QueueError::Closed`] after [`close`](Self::close) and with
    /// [`QueueError::ReaderGone`] if the reader has been dropped.
    pub async fn enqueue(&self, item: T) -> Result<(), QueueError> {
        match self.tx.as_ref().ok_or(QueueError::Closed)? {
            Tx::Bounded(tx) => tx.send(item).await.map_err(|_| QueueError::ReaderGone)?,
            Tx::Unbounded(tx) => tx.send(item).map_err(|_| QueueError::ReaderGone)?,
        }
        self.record_enqueue();
        Ok(())
    }

    /// Appends an item without suspending.
    ///
    /// Returns [`QueueError::Full`] when the queue is at capacity.
    pub fn try_enqueue(&self, item: T) -> Result<(), QueueError> {
        match self.tx.as_ref().ok_or(QueueError::Closed)? {
            Tx::Bounded(tx) => match tx.try_send(item) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    return Err(QueueError::Full {
                        capacity: tx.max_capacity(),
                    })
                }
                Err(TrySendError::Closed(_)) => return Err(QueueError::ReaderGone),
            },
            Tx::Unbounded(tx) => tx.send(item).map_err(|_| QueueError::ReaderGone)?,
        }
        self.record_enqueue();
        Ok(())
    }

    /// Closes the queue for writing.
    ///
    /// Items already queued stay available to the reader. Returns `true` if
    /// this call closed the queue and `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        match self.tx.take() {
            Some(tx) => {
                drop(tx);
                self.shared.closed.store(true, Ordering::Release);
                self.shared.close_count.fetch_add(1, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    /// Returns true once the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Returns the queue capacity.
    pub fn capacity(&self) -> QueueCapacity {
        self.shared.capacity
    }

    /// Returns the number of items currently held.
    pub fn len(&self) -> usize {
        self.shared.pending()
    }

    /// Returns true if no items are currently held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a stats handle for this queue.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            shared: Arc::clone(&self.shared),
        }
    }

    fn record_enqueue(&self) {
        self.shared.enqueued.fetch_add(1, Ordering::AcqRel);
        let used = match &self.tx {
            Some(Tx::Bounded(tx)) => tx.max_capacity() - tx.capacity(),
            _ => self.shared.pending(),
        };
        self.shared.peak_len.fetch_max(used, Ordering::AcqRel);
    }
}

impl<T> Drop for QueueWriter<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for QueueWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueWriter")
            .field("capacity", &self.shared.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Reading half of a queue.
pub struct QueueReader<T> {
    rx: Rx<T>,
    shared: Arc<QueueShared>,
}

impl<T> QueueReader<T> {
    /// Removes the oldest item, suspending while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and every item has been
    /// delivered.
    pub async fn dequeue(&mut self) -> Option<T> {
        let item = match &mut self.rx {
            Rx::Bounded(rx) => rx.recv().await,
            Rx::Unbounded(rx) => rx.recv().await,
        };

        match item {
            Some(item) => {
                self.shared.dequeued.fetch_add(1, Ordering::AcqRel);
                Some(item)
            }
            None => {
                self.shared.end_of_stream.store(true, Ordering::Release);
                None
            }
        }
    }

    /// Returns the number of items waiting to be dequeued.
    pub fn len(&self) -> usize {
        match &self.rx {
            Rx::Bounded(rx) => rx.len(),
            Rx::Unbounded(rx) => rx.len(),
        }
    }

    /// Returns true if no items are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once the writer has closed the queue.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Returns a stats handle for this queue.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for QueueReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReader")
            .field("capacity", &self.shared.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Read-only view of a queue's counters, usable after both halves are gone.
#[derive(Clone)]
pub struct QueueStats {
    shared: Arc<QueueShared>,
}

impl QueueStats {
    /// Returns the queue capacity.
    pub fn capacity(&self) -> QueueCapacity {
        self.shared.capacity
    }

    /// Returns true once the writer has closed the queue.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of times the queue transitioned to closed. Never more than 1.
    pub fn close_count(&self) -> u64 {
        self.shared.close_count.load(Ordering::Acquire)
    }

    /// Returns true once the reader has observed end-of-stream.
    pub fn is_drained(&self) -> bool {
        self.shared.end_of_stream.load(Ordering::Acquire)
    }

    /// Total items accepted by the writer.
    pub fn enqueued(&self) -> u64 {
        self.shared.enqueued.load(Ordering::Acquire)
    }

    /// Total items delivered to the reader.
    pub fn dequeued(&self) -> u64 {
        self.shared.dequeued.load(Ordering::Acquire)
    }

    /// Highest number of items held at once.
    pub fn peak_len(&self) -> usize {
        self.shared.peak_len.load(Ordering::Acquire)
    }
}

impl fmt::Debug for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueStats")
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .field("close_count", &self.close_count())
            .field("drained", &self.is_drained())
            .field("enqueued", &self.enqueued())
            .field("dequeued", &self.dequeued())
            .field("peak_len", &self.peak_len())
            .finish()
    }
}
