//! Brainy Data
//!
//! The embeddable vector-and-graph database façade: one async library, no
//! transport and no routing layered on top. Embedding applications link
//! this crate directly and call [`BrainyData`] methods in-process.

pub mod config;
pub mod facade;
pub mod tracing_setup;

pub use config::BrainyConfig;
pub use facade::{
    AddInput, BackupBundle, BrainyData, DeleteOptions, SearchHit, SearchOptions,
};
pub use tracing_setup::init_tracing;
