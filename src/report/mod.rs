//! Report rendering for the diagnostic result.
//!
//! The pipeline hands the renderer one [`DiagnosticReport`]; the text
//! renderer writes it to any `io::Write`, the HTML renderer produces a
//! standalone document. Shared formatting helpers live here.

pub mod html;
pub mod text;

use std::collections::HashMap;

use crate::analysis::{GroupTrends, ProfileGroup};
use crate::domain::ProfileKind;
use crate::locator::ProblemContext;
use crate::rules::Finding;

/// Everything one run produced, ready for rendering.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    pub groups: Vec<ProfileGroup>,
    pub trends: HashMap<ProfileKind, GroupTrends>,
    pub findings: Vec<Finding>,
    /// Problem contexts keyed by rule id.
    pub contexts: HashMap<String, ProblemContext>,
}

impl DiagnosticReport {
    /// Context attached to a finding, if one was generated.
    #[must_use]
    pub fn context_for(&self, finding: &Finding) -> Option<&ProblemContext> {
        self.contexts.get(&finding.rule_id)
    }
}

/// Trends with R² at or below this are noise and stay out of reports.
pub(crate) const REPORT_MIN_R2: f64 = 0.7;

/// Format a file size with an auto-selected unit.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Format a time span in human units.
#[must_use]
pub fn format_span(span: chrono::Duration) -> String {
    let seconds = span.num_milliseconds() as f64 / 1000.0;
    if seconds < 60.0 {
        return format!("{seconds:.1} seconds");
    }
    let minutes = seconds / 60.0;
    if minutes < 60.0 {
        return format!("{minutes:.1} minutes");
    }
    format!("{:.1} hours", minutes / 60.0)
}

/// Shorten a function name from the left, keeping the most specific part.
#[must_use]
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }
    let tail = &name[name.len() - (max_len - 3)..];
    format!("...{tail}")
}
