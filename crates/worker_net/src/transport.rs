//! The transport seam between a connection and the runtime.
//!
//! A [`Transport`] publishes framed messages and hands back raw op batches.
//! [`MemoryTransport`] is the in-process implementation: its paired
//! [`MemoryBackend`] plays the runtime, pushing batches and inspecting what
//! the worker sent.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::codec::{Frame, decode};
use crate::error::NetError;

/// Moves bytes between a worker and the runtime.
pub trait Transport: Send {
    /// Publish `payload` on `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] once the other side is gone, or the
    /// transport's own failure.
    fn send(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), NetError>;

    /// Wait up to `timeout` for the next op batch. `Ok(None)` means nothing
    /// arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] once the other side is gone.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, NetError>;

    /// Flush and stop. Later calls fail with [`NetError::Closed`].
    fn close(&mut self) {}
}

// ── In-memory ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Shared {
    sent: Vec<Frame>,
    closed: bool,
}

fn lock(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The worker's end of an in-memory link.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: Receiver<Vec<u8>>,
    shared: Arc<Mutex<Shared>>,
}

/// The runtime's end of an in-memory link. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inbound: Sender<Vec<u8>>,
    shared: Arc<Mutex<Shared>>,
}

/// Create a connected transport and backend.
#[must_use]
pub fn memory_pair() -> (MemoryTransport, MemoryBackend) {
    let (tx, rx) = mpsc::channel();
    let shared = Arc::new(Mutex::new(Shared::default()));
    (
        MemoryTransport {
            inbound: rx,
            shared: Arc::clone(&shared),
        },
        MemoryBackend {
            inbound: tx,
            shared,
        },
    )
}

impl Transport for MemoryTransport {
    fn send(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), NetError> {
        let mut shared = lock(&self.shared);
        if shared.closed {
            return Err(NetError::Closed);
        }
        debug!(subject, bytes = payload.len(), "memory send");
        shared.sent.push(Frame {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, NetError> {
        // Batches queued before a close are still delivered.
        match self.inbound.try_recv() {
            Ok(batch) => return Ok(Some(batch)),
            Err(mpsc::TryRecvError::Disconnected) => return Err(NetError::Closed),
            Err(mpsc::TryRecvError::Empty) => {}
        }
        if lock(&self.shared).closed {
            return Err(NetError::Closed);
        }
        match self.inbound.recv_timeout(timeout) {
            Ok(batch) => Ok(Some(batch)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(NetError::Closed),
        }
    }

    fn close(&mut self) {
        lock(&self.shared).closed = true;
    }
}

impl MemoryBackend {
    /// Queue an encoded op batch for the worker's next poll.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the transport was dropped.
    pub fn push_batch(&self, batch: Vec<u8>) -> Result<(), NetError> {
        self.inbound.send(batch).map_err(|_| NetError::Closed)
    }

    /// Frames sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Frame> {
        lock(&self.shared).sent.clone()
    }

    /// Remove and return the frames sent so far.
    #[must_use]
    pub fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut lock(&self.shared).sent)
    }

    /// Decode every sent payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Decode`] for the first payload that is not a `T`.
    pub fn decode_sent<T: for<'de> Deserialize<'de>>(&self) -> Result<Vec<T>, NetError> {
        lock(&self.shared)
            .sent
            .iter()
            .map(|frame| decode(&frame.payload))
            .collect()
    }

    /// Refuse further sends; polls fail once queued batches are drained.
    pub fn close(&self) {
        lock(&self.shared).closed = true;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_times_out_empty() {
        let (mut transport, _backend) = memory_pair();
        assert!(transport.poll(Duration::from_millis(1)).unwrap().is_none());
    }

    #[test]
    fn test_batches_arrive_in_order() {
        let (mut transport, backend) = memory_pair();
        backend.push_batch(vec![1]).unwrap();
        backend.push_batch(vec![2]).unwrap();
        assert_eq!(transport.poll(Duration::ZERO).unwrap(), Some(vec![1]));
        assert_eq!(transport.poll(Duration::ZERO).unwrap(), Some(vec![2]));
    }

    #[test]
    fn test_sent_frames_are_recorded() {
        let (mut transport, backend) = memory_pair();
        transport.send("worker.w.log", vec![9]).unwrap();
        assert_eq!(backend.sent().len(), 1);
        let frames = backend.take_sent();
        assert_eq!(frames[0].subject, "worker.w.log");
        assert!(backend.sent().is_empty());
    }

    #[test]
    fn test_close_drains_then_fails() {
        let (mut transport, backend) = memory_pair();
        backend.push_batch(vec![7]).unwrap();
        backend.close();
        assert!(matches!(transport.send("s", Vec::new()), Err(NetError::Closed)));
        assert_eq!(transport.poll(Duration::ZERO).unwrap(), Some(vec![7]));
        assert!(matches!(transport.poll(Duration::ZERO), Err(NetError::Closed)));
    }

    #[test]
    fn test_dropped_backend_closes_poll() {
        let (mut transport, backend) = memory_pair();
        drop(backend);
        assert!(matches!(
            transport.poll(Duration::from_millis(1)),
            Err(NetError::Closed)
        ));
    }
}
