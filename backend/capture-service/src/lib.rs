//! Capture Service
//!
//! Persists multi-channel fundus captures: one record per channel image with
//! an inline thumbnail, a color composite synthesized by an external service,
//! and recorded videos.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
