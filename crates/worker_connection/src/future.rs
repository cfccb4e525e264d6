//! Deferred results.
//!
//! A [`Future`] is fed by a producer thread. Waiting is blocking; there is
//! no cancellation, and dropping the future only discards the result.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::FutureError;

#[derive(Debug)]
enum State<T> {
    Pending(Receiver<T>),
    Ready(T),
    Abandoned,
}

/// A value that becomes available later.
#[derive(Debug)]
#[must_use]
pub struct Future<T> {
    state: State<T>,
}

impl<T: Send + 'static> Future<T> {
    /// Run `producer` on its own thread and resolve with its result.
    pub fn spawn(producer: impl FnOnce() -> T + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("worker-future".to_string())
            .spawn(move || {
                // The receiver may already be gone.
                let _ = tx.send(producer());
            });
        match spawned {
            Ok(_) => Self::pending(rx),
            Err(e) => {
                warn!(error = %e, "failed to spawn future producer");
                Self {
                    state: State::Abandoned,
                }
            }
        }
    }
}

impl<T> Future<T> {
    /// A future resolved by whoever holds the sending side of `receiver`.
    pub fn pending(receiver: Receiver<T>) -> Self {
        Self {
            state: State::Pending(receiver),
        }
    }

    /// A future that is already resolved.
    pub fn ready(value: T) -> Self {
        Self {
            state: State::Ready(value),
        }
    }

    /// Returns `true` once a value has been received.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    fn wait(&mut self, timeout: Option<Duration>) {
        let State::Pending(receiver) = &self.state else {
            return;
        };
        let received = match timeout {
            Some(timeout) => receiver.recv_timeout(timeout),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(value) => self.state = State::Ready(value),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.state = State::Abandoned,
        }
    }

    /// Block until the value is available. Later calls return the cached
    /// value immediately.
    ///
    /// # Errors
    ///
    /// Returns [`FutureError::Abandoned`] if the producer went away.
    pub fn get(&mut self) -> Result<&T, FutureError> {
        self.wait(None);
        match &self.state {
            State::Ready(value) => Ok(value),
            State::Pending(_) | State::Abandoned => Err(FutureError::Abandoned),
        }
    }

    /// Wait at most `timeout_millis` for the value. `Ok(None)` means it is
    /// not ready yet.
    ///
    /// # Errors
    ///
    /// Returns [`FutureError::Abandoned`] if the producer went away.
    pub fn try_get(&mut self, timeout_millis: u32) -> Result<Option<&T>, FutureError> {
        self.wait(Some(Duration::from_millis(u64::from(timeout_millis))));
        match &self.state {
            State::Ready(value) => Ok(Some(value)),
            State::Pending(_) => Ok(None),
            State::Abandoned => Err(FutureError::Abandoned),
        }
    }

    /// Block until the value is available and take it.
    ///
    /// # Errors
    ///
    /// Returns [`FutureError::Abandoned`] if the producer went away.
    pub fn into_inner(mut self) -> Result<T, FutureError> {
        self.wait(None);
        match self.state {
            State::Ready(value) => Ok(value),
            State::Pending(_) | State::Abandoned => Err(FutureError::Abandoned),
        }
    }
}
