//! Axum HTTP API server for the PawGuard detection backend.
//!
//! This crate provides:
//! - The `/detect` request pipeline (decode, detect, embed, compose)
//! - Health and service metadata endpoints
//! - Request logging, request ids, CORS, and body size limits

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
