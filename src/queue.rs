//! Fixed-capacity FIFO buffering raw records from producer to dispatcher.

use std::time::Duration;

use tokio::sync::mpsc;

/// Multi-producer, multi-consumer bounded queue. `put` blocks while the
/// queue is at capacity; `poll` blocks up to a timeout and returns `None`
/// when no record arrives, which the orchestrator treats as one idleness
/// observation.
pub struct BoundedRecordQueue {
    sender: mpsc::Sender<String>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<String>>,
}

impl BoundedRecordQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { sender, receiver: tokio::sync::Mutex::new(receiver) }
    }

    /// A cloneable handle producers use to enqueue records.
    pub fn producer(&self) -> mpsc::Sender<String> {
        self.sender.clone()
    }

    /// Waits up to `timeout` for the next record. Returns `None` on timeout
    /// or once every producer handle has been dropped and the queue drained.
    pub async fn poll(&self, timeout: Duration) -> Option<String> {
        let mut receiver = self.receiver.lock().await;
        tokio::time::timeout(timeout, receiver.recv()).await.ok().flatten()
    }
}
