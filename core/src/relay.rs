//! Console relay - bounded, non-blocking queue of incidental device output
//!
//! Producers (a connection's background reader) call [`ConsoleRelay::offer`],
//! which never blocks: when the queue is full the chunk is shed. Consumers
//! (an interactive console) take chunks with [`ConsoleRelay::drain`] or
//! [`ConsoleRelay::recv`].

use crate::limits::RELAY_CAPACITY;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

/// Shared handle to the console relay queue
#[derive(Debug, Clone)]
pub struct ConsoleRelay {
    tx: mpsc::Sender<Bytes>,
    rx: Arc<Mutex<mpsc::Receiver<Bytes>>>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for ConsoleRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleRelay {
    /// Create a relay with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(RELAY_CAPACITY)
    }

    /// Create a relay holding at most `capacity` chunks
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Bytes>(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            dropped: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Offer a chunk without blocking
    ///
    /// Non-text bytes are stripped first. Returns `false` if the queue is full
    /// and the chunk was discarded.
    pub fn offer(&self, chunk: &[u8]) -> bool {
        let text = strip_non_text(chunk);
        if text.is_empty() {
            return true;
        }

        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) | Err(mpsc::error::TrySendError::Closed(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!("Console relay full, dropped chunk (total dropped: {})", total);
                false
            }
        }
    }

    /// Take the oldest queued chunk, `None` if the queue is empty or another
    /// consumer currently holds it
    pub fn drain(&self) -> Option<Bytes> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Wait for the next chunk
    pub async fn recv(&self) -> Option<Bytes> {
        self.rx.lock().await.recv().await
    }

    /// Chunks shed because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Remove everything except printable ASCII, newline, carriage return and tab
pub fn strip_non_text(data: &[u8]) -> Bytes {
    data.iter()
        .copied()
        .filter(|&b| matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7e))
        .collect::<Vec<u8>>()
        .into()
}
