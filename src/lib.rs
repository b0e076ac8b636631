//! Thin publish/consume queue-manager wrapper over
//! [`lapin`](https://docs.rs/lapin/latest/lapin/).
//!
//! A manager owns one broker connection and one named queue. Construct
//! it, `connect` to a host, optionally `start_consuming` with a
//! callback, then `publish` JSON bodies with a routing key.
//!
//! # Examples
//! Fire-and-forget publishing with [`AsyncManager`]. Readiness may lag
//! behind `connect`; publishes that arrive early are buffered, not
//! failed:
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> lapin_queue::Result<()> {
//! use lapin_queue::AsyncManager;
//!
//! let manager = AsyncManager::named("jobs");
//! manager.connect("amqp://127.0.0.1:5672/%2f").await?;
//! manager.publish(&serde_json::json!({"message": "Hello, world!"}), "jobs").await?;
//! # Ok(()) }
//! ```
//!
//! Consuming with a callback. Zero- and one-argument callbacks both
//! work; see [`OnMessage`]:
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> lapin_queue::Result<()> {
//! use lapin_queue::SyncManager;
//!
//! let manager = SyncManager::named("jobs");
//! // ready as soon as connect returns
//! manager.connect("amqp://127.0.0.1:5672/%2f").await?;
//! manager.start_consuming(|body: serde_json::Value| {
//!     println!("got {body}");
//! })?;
//! # Ok(()) }
//! ```
//!
//! Two managers built with the same explicit queue name rendezvous on
//! one broker-side queue, so one can publish what the other consumes.
//! Managers built without a name each get their own exclusive,
//! broker-generated queue.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
// clippy lints
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![warn(
    clippy::self_named_module_files,
    clippy::perf,
    clippy::missing_panics_doc,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::enum_variant_names
)]

mod connection;
mod errors;
mod handler;
mod manager;
mod message;
/// Manager configuration options
mod options;
mod serializer;
mod state;

#[cfg(feature = "clap")]
/// Clap based command-line argument builder
mod cli;

pub use connection::Opener;
pub use errors::{Error, Result};
pub use handler::OnMessage;
pub use manager::{AsyncManager, SyncManager};
pub use message::Message;
pub use options::{AmqpPlainAuth, QueueOptions};
pub use serializer::to_json;
pub use state::ManagerState;

#[cfg(feature = "clap")]
pub use cli::QueueArgs;

// Re-export lapin for compatability
pub use lapin;
