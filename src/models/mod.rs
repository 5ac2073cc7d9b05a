//! Data models for dbctx.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod record;
pub mod value;

// Re-export commonly used types
pub use connection::{DatabaseType, PlaceholderStyle};
pub use record::Record;
pub use value::Value;
