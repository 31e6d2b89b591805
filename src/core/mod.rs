//! Core Module
//!
//! Shared building blocks:
//! - Progress record types and their wire form
//! - Error types and classification
//! - The process context handed to every component
//! - Utility functions

pub mod context;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use context::RecoveryContext;
pub use error::{Classify, ErrorClass, RecoveryError, Result};
