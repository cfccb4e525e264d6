//! NATS subject hierarchy.
//!
//! All worker subjects are prefixed with `worker.`:
//!
//! ```text
//! worker.connect                 handshakes, worker -> runtime
//! worker.<id>.ops                op batches, runtime -> worker
//! worker.<id>.<message>          everything else, worker -> runtime
//! ```

use worker_interop::WorkerMessage;

/// Root prefix for all worker subjects.
pub const PREFIX: &str = "worker";

/// Handshakes from connecting workers.
pub const CONNECT: &str = "worker.connect";

/// Replace characters NATS treats specially in a subject token.
#[must_use]
pub fn token(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// `worker.<id>.ops`
#[must_use]
pub fn ops(worker_id: &str) -> String {
    format!("{PREFIX}.{}.ops", token(worker_id))
}

/// `worker.<id>.<suffix>`
#[must_use]
pub fn outbound(worker_id: &str, suffix: &str) -> String {
    format!("{PREFIX}.{}.{suffix}", token(worker_id))
}

/// The subject `message` is published on.
#[must_use]
pub fn for_message(worker_id: &str, message: &WorkerMessage<'_>) -> String {
    match message {
        WorkerMessage::Handshake { .. } => CONNECT.to_string(),
        other => outbound(worker_id, other.subject_suffix()),
    }
}
