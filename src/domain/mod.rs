//! Domain model for pprofscope
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via small closed enums
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

pub use errors::{ProfileError, RulesError};
pub use types::{ProfileKind, Severity};
