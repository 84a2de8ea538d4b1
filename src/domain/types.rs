//! Domain types shared across the analysis pipeline
//!
//! These enums replace the stringly-typed tags of ad-hoc profile tooling and
//! make function signatures expressive: a `ProfileKind` cannot be confused
//! with a rule id, and a `Severity` is always one of four known levels.

use std::fmt;

/// Semantic type of a profile, detected from its sample-type table.
///
/// Variants are declared in ascending name order so that sorting by
/// `as_str()` and sorting by the enum agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileKind {
    /// Blocking profile (contentions / delay sample types)
    Block,
    /// CPU profile (samples/count + cpu/nanoseconds, or a declared duration)
    Cpu,
    /// Goroutine snapshot profile
    Goroutine,
    /// Heap profile (alloc/inuse objects and space)
    Heap,
    /// Mutex contention profile
    Mutex,
    /// Anything we could not recognize; still grouped and reported
    Unknown,
}

impl ProfileKind {
    /// Stable lowercase tag used for group ordering, rule matching, and
    /// report headings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::Block => "block",
            ProfileKind::Cpu => "cpu",
            ProfileKind::Goroutine => "goroutine",
            ProfileKind::Heap => "heap",
            ProfileKind::Mutex => "mutex",
            ProfileKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized severity of a finding.
///
/// Rule files may spell severities in English or Chinese (the rule format is
/// shared with an ecosystem that uses both); `normalize` folds them into
/// these four levels, defaulting to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Fold a free-form severity string into one of the four levels.
    #[must_use]
    pub fn normalize(raw: &str) -> Severity {
        match raw.to_lowercase().as_str() {
            "critical" | "严重" => Severity::Critical,
            "high" | "高" => Severity::High,
            "low" | "低" => Severity::Low,
            _ => Severity::Medium,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_kind_sorts_by_name() {
        let mut kinds = vec![
            ProfileKind::Unknown,
            ProfileKind::Heap,
            ProfileKind::Cpu,
            ProfileKind::Block,
            ProfileKind::Goroutine,
        ];
        kinds.sort();
        let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        let mut sorted_names = names.clone();
        sorted_names.sort_unstable();
        assert_eq!(names, sorted_names);
    }

    #[test]
    fn test_severity_normalize_known_levels() {
        assert_eq!(Severity::normalize("critical"), Severity::Critical);
        assert_eq!(Severity::normalize("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::normalize("严重"), Severity::Critical);
        assert_eq!(Severity::normalize("high"), Severity::High);
        assert_eq!(Severity::normalize("高"), Severity::High);
        assert_eq!(Severity::normalize("low"), Severity::Low);
        assert_eq!(Severity::normalize("低"), Severity::Low);
        assert_eq!(Severity::normalize("medium"), Severity::Medium);
    }

    #[test]
    fn test_severity_normalize_defaults_to_medium() {
        assert_eq!(Severity::normalize(""), Severity::Medium);
        assert_eq!(Severity::normalize("urgent"), Severity::Medium);
    }
}
