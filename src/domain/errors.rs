//! Structured error types for pprofscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Profile decode errors are per-file skips in the grouper; rules errors are
//! surfaced as a warning by the driver so a run without rules still produces
//! a metrics-only report.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while decoding a single profile file.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode profile protobuf: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("string table index {0} out of range")]
    StringIndex(i64),

    #[error("sample references unknown location id {0}")]
    DanglingLocation(u64),

    #[error("line references unknown function id {0}")]
    DanglingFunction(u64),
}

/// Errors produced while loading and validating a rules document.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("rules file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rules file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("rule {rule}: missing {field}")]
    MissingField { rule: String, field: &'static str },

    #[error("cross_analysis_rule {rule}: missing {field}")]
    CrossMissingField { rule: String, field: &'static str },

    #[error("cross_analysis_rule {rule}: need at least 2 conditions for cross analysis")]
    TooFewConditions { rule: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_the_field() {
        let err = RulesError::MissingField { rule: "mem-growth".to_string(), field: "condition" };
        assert_eq!(err.to_string(), "rule mem-growth: missing condition");
    }

    #[test]
    fn test_too_few_conditions_display() {
        let err = RulesError::TooFewConditions { rule: "leak-correlation".to_string() };
        assert!(err.to_string().contains("at least 2 conditions"));
    }
}
