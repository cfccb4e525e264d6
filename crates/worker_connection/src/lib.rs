//! # worker_connection
//!
//! A worker's connection to the runtime.
//!
//! This crate provides:
//!
//! - [`Connection`]: handshake, op polling and every request a worker sends.
//! - [`Future`]: a blocking deferred result, used by
//!   [`Connection::connect_async`] and [`Connection::connect_url_async`].
//! - [`WorkerConfig`]: where and as whom to connect, read from the
//!   environment.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use worker_connection::{Connection, WorkerConfig};
//! use worker_interop::ConnectionParameters;
//!
//! let config = WorkerConfig::from_env();
//! let params = ConnectionParameters::new(config.worker_type.clone());
//! let mut connection = Connection::connect_url_async(&config.nats_url, &config.worker_id(), params)
//!     .into_inner()
//!     .unwrap()
//!     .unwrap();
//! while connection.is_connected() {
//!     let ops = connection.get_op_list(100).unwrap();
//!     for op in ops.iter() {
//!         println!("{:?}", op.unwrap().kind());
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod future;

pub use config::WorkerConfig;
pub use connection::Connection;
pub use error::{ConnectionError, FutureError};
pub use future::Future;
