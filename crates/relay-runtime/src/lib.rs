//! # Relay Runtime Library
//!
//! Exposes the runtime modules for testing. The entry point is the
//! `main.rs` binary.
//!
//! - `config` - environment configuration
//! - `feed` - JSON-lines bridge on stdin/stdout
//! - `handlers` - supervising loops for the ingestion and validation paths
//! - `listener` - Postgres `LISTEN` source of change notifications
//! - `runtime` - service wiring and graceful shutdown

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod feed;
pub mod handlers;
pub mod listener;
pub mod runtime;

pub use config::{ConfigError, RelayConfig};
pub use feed::{FeedMessage, FeedRouter, PublishedForwarder};
pub use handlers::{NotificationHandler, ValidationHandler};
pub use listener::PostgresListener;
pub use runtime::{LiveRelayService, RelayRuntime};

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
