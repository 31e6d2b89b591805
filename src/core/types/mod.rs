//! Core data types
//!
//! This module defines the values exchanged between the update monitor and
//! the display thread.

pub mod progress;

// Re-export commonly used types
pub use progress::{
    ProgressRecord, RecordError, UpdateSource, UpdateStatus, INFO_CAPACITY, RECORD_SIZE,
};
