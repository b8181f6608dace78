// Public fallible APIs in this crate share one concrete error contract (`SyncError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod baseline;
pub mod config;
pub mod differ;
pub mod error;
pub mod extract;
pub mod models;
pub mod mutator;
pub mod reconcile;
pub(crate) mod request_log;
pub mod scoring;
pub mod slack;
pub mod source;
pub mod state;

pub use config::AppConfig;
pub use error::{Result, SyncError};
pub use reconcile::{CancelHandle, Reconciler};
pub use request_log::RequestLog;
pub use slack::{MessageLog, SlackClient};
pub use state::{ScoreStore, SqliteScoreStore};
