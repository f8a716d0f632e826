//! HTTP service for starting, polling and streaming generations.

mod api;
mod error;
mod handlers;
mod server;

pub use api::{CommandResponse, GenerateQuery, GenerateResponse};
pub use error::{ApiError, ServerError};
pub use handlers::AppState;
pub use server::{sweep_loop, GenerationServer};
