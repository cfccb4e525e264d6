//! Worker configuration.
//!
//! Values come from the environment and may be overridden with the `with_*`
//! builders:
//!
//! | Variable      | Default                  |
//! |---------------|--------------------------|
//! | `NATS_URL`    | `nats://localhost:4222`  |
//! | `WORKER_TYPE` | `RustWorker`             |
//! | `WORKER_ID`   | `<worker type>-<uuid>`   |

use uuid::Uuid;
use worker_net::{DEFAULT_NATS_URL, NATS_URL_ENV};

/// The environment variable naming the worker type.
pub const WORKER_TYPE_ENV: &str = "WORKER_TYPE";

/// The environment variable naming the worker id.
pub const WORKER_ID_ENV: &str = "WORKER_ID";

/// Worker type used when none is configured.
pub const DEFAULT_WORKER_TYPE: &str = "RustWorker";

/// Where and as whom a worker connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub nats_url: String,
    pub worker_type: String,
    /// `None` until resolved; see [`WorkerConfig::worker_id`].
    pub worker_id: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            nats_url: DEFAULT_NATS_URL.to_string(),
            worker_type: DEFAULT_WORKER_TYPE.to_string(),
            worker_id: None,
        }
    }
}

impl WorkerConfig {
    /// Read the configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            nats_url: lookup(NATS_URL_ENV).unwrap_or(defaults.nats_url),
            worker_type: lookup(WORKER_TYPE_ENV).unwrap_or(defaults.worker_type),
            worker_id: lookup(WORKER_ID_ENV).filter(|id| !id.is_empty()),
        }
    }

    #[must_use]
    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = url.into();
        self
    }

    /// Build the NATS URL from a host and port.
    #[must_use]
    pub fn with_host_port(self, host: &str, port: u16) -> Self {
        self.with_nats_url(format!("nats://{host}:{port}"))
    }

    #[must_use]
    pub fn with_worker_type(mut self, worker_type: impl Into<String>) -> Self {
        self.worker_type = worker_type.into();
        self
    }

    #[must_use]
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    /// The configured worker id, or a fresh `<worker type>-<uuid>`.
    #[must_use]
    pub fn worker_id(&self) -> String {
        self.worker_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.worker_type, Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults_without_environment() {
        let config = WorkerConfig::from_lookup(|_| None);
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert!(config.worker_id().starts_with("RustWorker-"));
    }

    #[test]
    fn test_environment_values() {
        let env: HashMap<&str, &str> = [
            ("NATS_URL", "nats://nats:4222"),
            ("WORKER_TYPE", "physics"),
            ("WORKER_ID", "physics-0"),
        ]
        .into_iter()
        .collect();
        let config = WorkerConfig::from_lookup(|key| env.get(key).map(ToString::to_string));
        assert_eq!(config.nats_url, "nats://nats:4222");
        assert_eq!(config.worker_type, "physics");
        assert_eq!(config.worker_id(), "physics-0");
    }

    #[test]
    fn test_builder_overrides() {
        let config = WorkerConfig::default()
            .with_host_port("10.0.0.2", 7777)
            .with_worker_type("client")
            .with_worker_id("client-9");
        assert_eq!(config.nats_url, "nats://10.0.0.2:7777");
        assert_eq!(config.worker_type, "client");
        assert_eq!(config.worker_id(), "client-9");
    }

    #[test]
    fn test_generated_ids_differ() {
        let config = WorkerConfig::default();
        assert_ne!(config.worker_id(), config.worker_id());
    }
}
