//! Core library for the NewsBalancer news bias analysis service.
//!
//! This crate contains all business logic: configuration management, the
//! error taxonomy, SQLite storage, the LLM scoring service, the composite
//! score calculator, the progress registry, the ensemble orchestrator, and
//! the RSS collector. The HTTP surface lives in `newsbalancer-server`.

pub mod collector;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod llm;
pub mod progress;
pub mod scoring;
pub mod storage;

pub use error::*;

/// Returns the version of the newsbalancer-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
