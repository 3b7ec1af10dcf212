//! # Watu Kobu Common Library
//!
//! Shared code for the Kobu debt-collection service:
//! - Database schema, models and queries
//! - Case assignment by collector workload
//! - Evidence heuristics for visit and payment reports
//! - Dashboard aggregates, money and date formatting
//! - Letters and CSV exports
//! - Event bus and SSE streaming
//! - Configuration loading

pub mod assignment;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod documents;
pub mod error;
pub mod events;
pub mod evidence;
pub mod filter;
pub mod format;
pub mod sse;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use events::{EventBus, KobuEvent};
