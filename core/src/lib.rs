//! Buildseal Core - Foundational Types
//!
//! This crate provides the error taxonomy and the immutable completion
//! configuration shared by the runtime and the CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::CompletionConfig;
pub use error::{CompletionError, Result};

/// Buildseal version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
