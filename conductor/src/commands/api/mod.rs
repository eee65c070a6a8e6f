//! REST API Server for Conductor

pub mod server;
pub mod routes;
pub mod error;

pub use server::{build_app, start_server};
pub use routes::{AppState, PlanRequest};
pub use error::{ApiError, ErrorResponse};
