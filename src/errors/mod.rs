//! Application-level error types shared by the HTTP handlers.

pub mod app_error;

pub use app_error::{AppError, AppResult};
