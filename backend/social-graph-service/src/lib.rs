//! Social graph consistency and privacy-gated visibility engine.
//!
//! Keeps the two-sided follow relation symmetric under concurrent writes,
//! decides what each viewer may see, and composes feeds and story trays from
//! the graph.
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod repository;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::{configure, AppState};
pub use repository::{InMemorySocialStore, PostgresSocialStore, SocialStore};
