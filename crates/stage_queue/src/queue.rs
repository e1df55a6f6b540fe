//! StageQueue - bounded MPMC queue between two pipeline stages

use std::fmt;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TryRecvError};
use contracts::Envelope;
use metrics::gauge;
use tracing::{debug, trace};

use crate::error::{QueueError, Result};
use crate::metrics::QueueMetrics;

/// Bounded multi-producer/multi-consumer queue with explicit end-of-stream.
///
/// Every clone is a handle to the same queue. `put` waits while the queue is
/// full, `get` waits until an item or end-of-stream is available. After
/// `close`, items already buffered are still handed out, then every `get`
/// returns `Envelope::EndOfStream`.
pub struct StageQueue<T> {
    name: Arc<str>,
    tx: Sender<T>,
    rx: Receiver<T>,
    metrics: Arc<QueueMetrics>,
}

impl<T> Clone for StageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T> fmt::Debug for StageQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> StageQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Errors
    /// `ZeroCapacity` when `capacity == 0`
    pub fn bounded(name: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity {
                queue: name.to_string(),
            });
        }
        let (tx, rx) = bounded(capacity);
        debug!(queue = %name, capacity, "stage queue created");

        Ok(Self {
            name: Arc::from(name),
            tx,
            rx,
            metrics: Arc::new(QueueMetrics::new()),
        })
    }

    /// Append an item, waiting while the queue is full
    ///
    /// # Errors
    /// `Closed` if the queue was closed before the item could be accepted.
    /// The item is dropped in that case.
    pub async fn put(&self, item: T) -> Result<()> {
        if self.tx.is_full() {
            self.metrics.record_blocked();
            trace!(queue = %self.name, "queue full, waiting for space");
        }
        match self.tx.send(item).await {
            Ok(()) => {
                self.on_enqueued();
                Ok(())
            }
            Err(_) => Err(self.rejected()),
        }
    }

    /// Blocking variant of [`put`](Self::put) for OS-thread producers
    pub fn put_blocking(&self, item: T) -> Result<()> {
        if self.tx.is_full() {
            self.metrics.record_blocked();
        }
        match self.tx.send_blocking(item) {
            Ok(()) => {
                self.on_enqueued();
                Ok(())
            }
            Err(_) => Err(self.rejected()),
        }
    }

    /// Take the next item, waiting until one arrives or the queue is closed
    /// and drained
    pub async fn get(&self) -> Envelope<T> {
        let received = self.rx.recv().await.ok();
        self.on_received(received)
    }

    /// Blocking variant of [`get`](Self::get) for OS-thread consumers
    pub fn get_blocking(&self) -> Envelope<T> {
        let received = self.rx.recv_blocking().ok();
        self.on_received(received)
    }

    /// Take the next item without waiting
    ///
    /// Returns `None` when the queue is open but currently empty.
    pub fn try_get(&self) -> Option<Envelope<T>> {
        match self.rx.try_recv() {
            Ok(item) => Some(self.on_received(Some(item))),
            Err(TryRecvError::Closed) => Some(Envelope::EndOfStream),
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Close the queue
    ///
    /// Idempotent. Returns true only for the call that actually closed it.
    /// Buffered items are not lost.
    pub fn close(&self) -> bool {
        let closed_now = self.tx.close();
        if closed_now {
            debug!(
                queue = %self.name,
                buffered = self.len(),
                "stage queue closed"
            );
        }
        closed_now
    }

    /// Check if `close` has been called
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of buffered items
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    /// Queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<QueueMetrics> {
        Arc::clone(&self.metrics)
    }

    fn on_enqueued(&self) {
        self.metrics.record_enqueued();
        gauge!("fetchpipe_queue_depth", "queue" => self.name.to_string()).set(self.len() as f64);
    }

    fn on_received(&self, received: Option<T>) -> Envelope<T> {
        match received {
            Some(item) => {
                self.metrics.record_dequeued();
                gauge!("fetchpipe_queue_depth", "queue" => self.name.to_string())
                    .set(self.len() as f64);
                Envelope::Item(item)
            }
            None => Envelope::EndOfStream,
        }
    }

    fn rejected(&self) -> QueueError {
        self.metrics.record_rejected();
        QueueError::Closed {
            queue: self.name.to_string(),
        }
    }
}
