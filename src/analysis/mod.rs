//! Profile grouping, metric extraction, trend analysis, and heap insights.
//!
//! This is the front half of the pipeline: decoded profiles come in, typed
//! groups with per-file metrics come out, and per-group time series are
//! fitted for drift. Everything here is pure computation over in-memory
//! structures; the only I/O is the file reads inside [`grouping`].

pub mod grouping;
pub mod insights;
pub mod metrics;
pub mod trends;

pub use grouping::{detect_profile_kind, group_profiles, ProfileFile, ProfileGroup};
pub use insights::{analyze_heap_insights, HeapInsight, InsightLevel};
pub use metrics::{extract_metrics, format_bytes, FunctionStat, ProfileMetrics};
pub use trends::{calculate_trends, linear_regression, GroupTrends, TrendDirection, TrendMetrics};
