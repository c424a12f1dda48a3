//! Core types for EMBPM
//!
//! This module holds the error type shared by every layer of the resolver and the
//! helpers that turn it into user-facing output.
//!
//! - [`EmbpmError`] - Enumerated error kinds with context fields
//! - [`ErrorContext`] - User-friendly wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any `anyhow::Error` for CLI display

pub mod error;

pub use error::{EmbpmError, ErrorContext, create_error_context, user_friendly_error};
