//! engine-core: Shared infrastructure for the posting engine.
pub mod config;
pub mod error;
pub mod observability;

pub use anyhow;
pub use serde;
pub use tracing;
