//! service-core: Shared HTTP infrastructure for the booking backend.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod utils;

pub use axum;
pub use tokio;
pub use tower;
pub use tower_http;
pub use tracing;
pub use validator;
