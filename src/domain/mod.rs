//! Core domain types
//!
//! Pure types with no I/O dependencies: frequencies, band plans, capability
//! flags, mirrored radio state, the error taxonomy and run configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
