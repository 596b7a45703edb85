//! Engine crate for the MovieLens analytics pipeline.
//!
//! Ties the data loader, the analytic views and the result writer into a
//! single run, and owns the run-level configuration.

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::{AnalyticsEngine, EngineReport};
pub use error::{EngineError, Result};
