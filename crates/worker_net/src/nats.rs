//! NATS-backed [`Transport`].
//!
//! The connection's API is synchronous, so [`NatsTransport`] owns a small
//! tokio runtime and blocks on it. Inbound op batches are forwarded from the
//! subscription into a channel that [`Transport::poll`] drains.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use futures::StreamExt;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::subjects;
use crate::transport::Transport;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// A worker's link to the runtime over NATS.
#[derive(Debug)]
pub struct NatsTransport {
    runtime: Runtime,
    client: async_nats::Client,
    inbound: Receiver<Vec<u8>>,
    closed: bool,
}

impl NatsTransport {
    /// Connect to `url` and subscribe to `worker_id`'s op subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Runtime`] if the runtime cannot start,
    /// [`NetError::Connect`] or [`NetError::Subscribe`] if NATS refuses.
    pub fn connect(url: &str, worker_id: &str) -> Result<Self, NetError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("worker-net")
            .enable_all()
            .build()?;

        info!(url, "connecting to NATS");
        let client = runtime.block_on(async_nats::connect(url))?;
        info!("NATS connection established");

        let subject = subjects::ops(worker_id);
        let mut subscriber = runtime.block_on(client.subscribe(subject.clone()))?;
        let (tx, rx) = mpsc::channel();
        runtime.spawn(async move {
            while let Some(message) = subscriber.next().await {
                if tx.send(message.payload.to_vec()).is_err() {
                    break;
                }
            }
            debug!("op subscription ended");
        });
        info!(subject, "subscribed to op batches");

        Ok(Self {
            runtime,
            client,
            inbound: rx,
            closed: false,
        })
    }

    /// Returns a reference to the underlying `async-nats` client.
    #[must_use]
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

impl Transport for NatsTransport {
    fn send(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), NetError> {
        if self.closed {
            return Err(NetError::Closed);
        }
        self.runtime
            .block_on(self.client.publish(subject.to_string(), payload.into()))?;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, NetError> {
        if self.closed {
            return Err(NetError::Closed);
        }
        match self.inbound.recv_timeout(timeout) {
            Ok(batch) => Ok(Some(batch)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(NetError::Closed),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.runtime.block_on(self.client.flush()) {
            warn!(error = %e, "failed to flush NATS on close");
        }
        info!("NATS transport closed");
    }
}

impl Drop for NatsTransport {
    fn drop(&mut self) {
        self.close();
    }
}
