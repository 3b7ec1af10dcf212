//! HTTP API handlers for kobu-server

pub mod assets;
pub mod collectors;
pub mod dashboard;
pub mod documents;
pub mod error;
pub mod health;
pub mod reports;
pub mod role;
pub mod sse;

pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use role::{identify_caller, Caller, Role};
pub use sse::event_stream;
