//! Problem locator: from a finding to the code responsible for it.
//!
//! The locator mines the profiles behind a finding for hot call chains,
//! classifies every stack frame by provenance (runtime, standard library,
//! third-party, business code), aggregates identical paths, and names the
//! root-cause frame the operator should inspect first.
//!
//! ## Data Flow
//!
//! ```text
//! Finding
//!     │
//!     ├──► ContextGenerator ──► PathAnalyzer ──► Extractor ──► Classifier
//!     │                              │
//!     │                              └──► HotPath (chain + root cause)
//!     │
//!     └──► ProblemContext (explanation, impact, commands, suggestions)
//! ```

pub mod analyzer;
pub mod classifier;
pub mod commands;
pub mod context;
pub mod extractor;

pub use analyzer::PathAnalyzer;
pub use classifier::Classifier;
pub use commands::CommandGenerator;
pub use context::ContextGenerator;
pub use extractor::Extractor;

use std::collections::HashMap;
use std::fmt;

use crate::domain::{ProfileKind, Severity};

/// Provenance of a stack frame.
///
/// The classification drives root-cause selection and how frames are
/// rendered in reports: business code is highlighted, everything else is
/// context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodeCategory {
    /// Go runtime (`runtime`, `runtime/...`)
    Runtime,
    /// Standard library, including `golang.org/x/...`
    Stdlib,
    /// Third-party dependencies (hosting-domain or configured prefixes)
    ThirdParty,
    /// The user's own code (main package, local packages, module prefix)
    Business,
    /// Could not determine origin
    #[default]
    Unknown,
}

impl CodeCategory {
    /// Stable lowercase tag used in report output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CodeCategory::Runtime => "runtime",
            CodeCategory::Stdlib => "stdlib",
            CodeCategory::ThirdParty => "third_party",
            CodeCategory::Business => "business",
            CodeCategory::Unknown => "unknown",
        }
    }

    /// Human wording used in explanation prose.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            CodeCategory::Runtime => "the Go runtime",
            CodeCategory::Stdlib => "the standard library",
            CodeCategory::ThirdParty => "a third-party library",
            CodeCategory::Business => "business code",
            CodeCategory::Unknown => "unidentified code",
        }
    }

    /// Returns true if this frame is user-owned code.
    #[must_use]
    pub fn is_business(self) -> bool {
        matches!(self, CodeCategory::Business)
    }
}

impl fmt::Display for CodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stack frame enriched with provenance and cost attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    /// Fully qualified function name, e.g. `github.com/acme/app/worker.Run`.
    pub function_name: String,
    /// Function or method name only, e.g. `(*Pool).Get`.
    pub short_name: String,
    /// Package path, e.g. `github.com/acme/app/worker`.
    pub package_name: String,
    /// Source file path from the profile, or `"unknown"`.
    pub file_path: String,
    /// Source line, 0 when unavailable.
    pub line_number: i64,
    /// Provenance classification.
    pub category: CodeCategory,
    /// Self cost and its share of the profile total.
    pub flat: i64,
    pub flat_pct: f64,
    /// Cumulative cost and its share of the profile total.
    pub cum: i64,
    pub cum_pct: f64,
}

impl StackFrame {
    /// Sentinel frame for locations with no resolvable function.
    #[must_use]
    pub fn unresolved() -> StackFrame {
        StackFrame {
            function_name: "unknown".to_string(),
            short_name: "unknown".to_string(),
            package_name: String::new(),
            file_path: "unknown".to_string(),
            line_number: 0,
            category: CodeCategory::Unknown,
            flat: 0,
            flat_pct: 0.0,
            cum: 0,
            cum_pct: 0.0,
        }
    }

    /// `file:line` location string, or `"unknown"` when no file is known.
    #[must_use]
    pub fn location(&self) -> String {
        if self.file_path.is_empty() || self.file_path == "unknown" {
            return "unknown".to_string();
        }
        if self.line_number <= 0 {
            return self.file_path.clone();
        }
        format!("{}:{}", self.file_path, self.line_number)
    }
}

/// A call chain ordered entry-first, leaf-last, with category bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct CallChain {
    pub frames: Vec<StackFrame>,
    /// Total value attributed to this chain (summed across aggregation).
    pub total_value: i64,
    /// Share of the containing profile's total, in percent.
    pub total_pct: f64,
    /// Number of original samples aggregated into this chain.
    pub sample_count: usize,
    /// Frames per category; values sum to `frames.len()`.
    pub category_breakdown: HashMap<CodeCategory, usize>,
    /// Indices where the category changes from the previous frame,
    /// strictly ascending.
    pub boundary_points: Vec<usize>,
}

impl CallChain {
    /// Returns true if any frame is business code.
    #[must_use]
    pub fn has_business_code(&self) -> bool {
        self.frames.iter().any(|frame| frame.category.is_business())
    }

    /// Run-length summary of category segments, e.g.
    /// `"2 business → 1 stdlib → 3 runtime"`.
    #[must_use]
    pub fn segment_summary(&self) -> String {
        if self.frames.is_empty() {
            return "empty call chain".to_string();
        }

        let mut segments: Vec<(CodeCategory, usize)> = Vec::new();
        for frame in &self.frames {
            match segments.last_mut() {
                Some((category, count)) if *category == frame.category => *count += 1,
                _ => segments.push((frame.category, 1)),
            }
        }

        segments
            .iter()
            .map(|(category, count)| format!("{count} {category}"))
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

/// A ranked call chain with its business frames and root cause identified.
#[derive(Debug, Clone)]
pub struct HotPath {
    pub chain: CallChain,
    /// Ascending indices of all business-category frames.
    pub business_frames: Vec<usize>,
    /// Index of the deepest business frame; `None` when the chain carries no
    /// business code at all.
    pub root_cause_index: Option<usize>,
    /// The profile type this path was mined from.
    pub profile_kind: ProfileKind,
}

impl HotPath {
    /// The deepest business frame, if any.
    #[must_use]
    pub fn root_cause(&self) -> Option<&StackFrame> {
        self.root_cause_index.and_then(|index| self.chain.frames.get(index))
    }
}

/// A ready-to-run `go tool pprof` invocation with guidance.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableCmd {
    pub command: String,
    pub description: String,
    pub output_hint: String,
}

/// Whether a suggestion is an immediate check or a longer-term practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    Immediate,
    LongTerm,
}

/// One actionable suggestion attached to a problem context.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub content: String,
}

/// A finding enriched with everything the operator needs to act on it.
#[derive(Debug, Clone)]
pub struct ProblemContext {
    pub title: String,
    pub severity: Severity,
    pub explanation: String,
    pub impact: String,
    pub hot_paths: Vec<HotPath>,
    pub commands: Vec<ExecutableCmd>,
    pub suggestions: Vec<Suggestion>,
}

/// Configuration shared by the classifier and the path analyzer.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// The user's module path, used to recognize business code. Detected
    /// from `go.mod` when not set explicitly.
    pub module_name: Option<String>,
    /// Extra package prefixes to treat as third-party.
    pub third_party_prefixes: Vec<String>,
    /// Frames kept per hot path, clamped to `[1, 100]`.
    pub max_stack_depth: usize,
    /// Hot paths kept per analysis, clamped to `[1, 50]`.
    pub max_hot_paths: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            module_name: None,
            third_party_prefixes: Vec::new(),
            max_stack_depth: 10,
            max_hot_paths: 5,
        }
    }
}

impl LocatorConfig {
    /// Clamp limits into their supported ranges, treating 0 as "use default".
    #[must_use]
    pub fn clamped(mut self) -> LocatorConfig {
        if self.max_stack_depth == 0 {
            self.max_stack_depth = 10;
        }
        if self.max_hot_paths == 0 {
            self.max_hot_paths = 5;
        }
        self.max_stack_depth = self.max_stack_depth.clamp(1, 100);
        self.max_hot_paths = self.max_hot_paths.clamp(1, 50);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(category: CodeCategory) -> StackFrame {
        StackFrame { category, ..StackFrame::unresolved() }
    }

    #[test]
    fn test_location_formats() {
        let mut f = StackFrame::unresolved();
        assert_eq!(f.location(), "unknown");

        f.file_path = "worker.go".to_string();
        assert_eq!(f.location(), "worker.go");

        f.line_number = 17;
        assert_eq!(f.location(), "worker.go:17");
    }

    #[test]
    fn test_segment_summary_groups_runs() {
        let chain = CallChain {
            frames: vec![
                frame(CodeCategory::Business),
                frame(CodeCategory::Business),
                frame(CodeCategory::Stdlib),
                frame(CodeCategory::Runtime),
                frame(CodeCategory::Runtime),
                frame(CodeCategory::Runtime),
            ],
            ..CallChain::default()
        };
        assert_eq!(chain.segment_summary(), "2 business → 1 stdlib → 3 runtime");
    }

    #[test]
    fn test_segment_summary_empty() {
        assert_eq!(CallChain::default().segment_summary(), "empty call chain");
    }

    #[test]
    fn test_config_clamping() {
        let config = LocatorConfig {
            max_stack_depth: 500,
            max_hot_paths: 0,
            ..LocatorConfig::default()
        }
        .clamped();
        assert_eq!(config.max_stack_depth, 100);
        assert_eq!(config.max_hot_paths, 5);

        let config =
            LocatorConfig { max_stack_depth: 0, max_hot_paths: 99, ..LocatorConfig::default() }
                .clamped();
        assert_eq!(config.max_stack_depth, 10);
        assert_eq!(config.max_hot_paths, 50);
    }

    #[test]
    fn test_root_cause_lookup() {
        let path = HotPath {
            chain: CallChain {
                frames: vec![frame(CodeCategory::Business), frame(CodeCategory::Runtime)],
                ..CallChain::default()
            },
            business_frames: vec![0],
            root_cause_index: Some(0),
            profile_kind: ProfileKind::Cpu,
        };
        assert!(path.root_cause().is_some());
        assert_eq!(path.root_cause().unwrap().category, CodeCategory::Business);
    }
}
