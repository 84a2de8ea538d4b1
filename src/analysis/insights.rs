//! Heap-specific insights derived from a single profile's metrics.
//!
//! Insights point at suspicious numbers without prescribing fixes; the
//! suggestions attached to findings handle that. A healthy heap profile
//! yields no insights at all.

use super::metrics::{format_bytes, ProfileMetrics};

/// Reclaim rate below which the heap is considered leaking outright.
const GC_RECLAIM_CRITICAL_PCT: f64 = 50.0;
/// Reclaim rate below which long-lived objects deserve a look.
const GC_RECLAIM_WARNING_PCT: f64 = 80.0;
/// In-use memory above this many MB is flagged.
const INUSE_WARNING_MB: f64 = 1024.0;
/// Cumulative allocation above this many GB is flagged as churn.
const ALLOC_CHURN_GB: f64 = 10.0;
/// A single function holding more than this share of in-use memory is
/// called out.
const DOMINANT_FUNCTION_PCT: f64 = 10.0;

/// Severity of a heap insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightLevel {
    Info,
    Warning,
    Critical,
}

impl InsightLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InsightLevel::Info => "info",
            InsightLevel::Warning => "warning",
            InsightLevel::Critical => "critical",
        }
    }
}

/// One observation about a heap profile.
#[derive(Debug, Clone)]
pub struct HeapInsight {
    pub level: InsightLevel,
    pub title: String,
    pub description: String,
}

/// Inspect heap metrics and emit zero or more insights.
#[must_use]
pub fn analyze_heap_insights(metrics: &ProfileMetrics) -> Vec<HeapInsight> {
    let mut insights = Vec::new();

    // GC reclaim rate: how much of what was allocated has been freed again.
    if metrics.alloc_space > 0 {
        let gc_rate = (metrics.alloc_space - metrics.inuse_space) as f64
            / metrics.alloc_space as f64
            * 100.0;

        if gc_rate < GC_RECLAIM_CRITICAL_PCT {
            insights.push(HeapInsight {
                level: InsightLevel::Critical,
                title: "GC reclaim rate too low".to_string(),
                description: format!(
                    "Only {gc_rate:.1}% of allocated memory has been reclaimed; a large share \
                     of the heap never gets freed, which points at a memory leak"
                ),
            });
        } else if gc_rate < GC_RECLAIM_WARNING_PCT {
            insights.push(HeapInsight {
                level: InsightLevel::Warning,
                title: "GC reclaim rate on the low side".to_string(),
                description: format!(
                    "GC reclaim rate is {gc_rate:.1}%; check for long-lived objects that \
                     keep references alive"
                ),
            });
        }
    }

    // Absolute in-use memory.
    let inuse_mb = metrics.inuse_space as f64 / 1024.0 / 1024.0;
    if inuse_mb > INUSE_WARNING_MB {
        insights.push(HeapInsight {
            level: InsightLevel::Warning,
            title: "High in-use memory".to_string(),
            description: format!("The profile shows {inuse_mb:.0} MB of memory in use"),
        });
    }

    // Cumulative allocation churn, attributed to the top allocator.
    if let Some(top_alloc) = metrics.top_alloc_functions.first() {
        let alloc_gb = metrics.alloc_space as f64 / 1024.0 / 1024.0 / 1024.0;
        if alloc_gb > ALLOC_CHURN_GB {
            insights.push(HeapInsight {
                level: InsightLevel::Warning,
                title: "Heavy allocation churn".to_string(),
                description: format!(
                    "{alloc_gb:.1} GB allocated in total; top allocation site: {} ({:.1}%)",
                    truncate_function_name(&top_alloc.name),
                    top_alloc.flat_pct
                ),
            });
        }
    }

    // A dominant in-use function that is neither runtime nor library code.
    if let Some(top) = metrics.top_functions.first() {
        if !top.name.contains("runtime.")
            && !top.name.contains("runtime/")
            && !looks_like_library(&top.name)
            && top.flat_pct > DOMINANT_FUNCTION_PCT
        {
            insights.push(HeapInsight {
                level: InsightLevel::Info,
                title: "Dominant in-use allocation site".to_string(),
                description: format!(
                    "{} holds {:.1}% of in-use memory ({})",
                    truncate_function_name(&top.name),
                    top.flat_pct,
                    format_bytes(top.flat)
                ),
            });
        }
    }

    insights
}

/// Crude library check by name fragments; the insights layer has no
/// classifier at hand and only needs to avoid praising `encoding/json`.
fn looks_like_library(function_name: &str) -> bool {
    const LIBRARY_FRAGMENTS: &[&str] = &[
        "encoding/",
        "database/sql",
        "net/",
        "io/",
        "bufio",
        "bytes",
        "strings",
        "fmt",
        "log",
        "sync",
        "time",
        "crypto/",
        "hash/",
    ];
    const HOSTING_FRAGMENTS: &[&str] =
        &["github.com/", "google.golang.org/", "go.uber.org/", "gopkg.in/"];

    LIBRARY_FRAGMENTS.iter().any(|fragment| function_name.contains(fragment))
        || HOSTING_FRAGMENTS.iter().any(|fragment| function_name.contains(fragment))
}

/// Shorten very long function names, keeping the trailing package segments.
fn truncate_function_name(name: &str) -> String {
    const MAX_LEN: usize = 60;
    if name.len() <= MAX_LEN {
        return name.to_string();
    }
    let parts: Vec<&str> = name.split('/').collect();
    if parts.len() > 2 {
        return format!("...{}", parts[parts.len() - 2..].join("/"));
    }
    format!("{}...", &name[..MAX_LEN - 3])
}
