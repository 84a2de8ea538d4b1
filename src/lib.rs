//! # pprofscope - offline time-series diagnostics for pprof profiles
//!
//! pprofscope ingests a collection of pprof profiles (CPU, heap, goroutine)
//! captured over time from one program and produces a prioritized,
//! human-readable diagnosis: which code is responsible, whether resource
//! usage is trending, whether independent signals correlate (heap and
//! goroutine counts growing together), and what to inspect next.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     profile files on disk                     │
//! └──────────────────────────┬────────────────────────────────────┘
//!                            │ decode (pprof)
//!                            ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Grouper    │──▶│TrendAnalyzer │──▶│  RuleEngine  │
//! │ (analysis)   │   │ (analysis)   │   │   (rules)    │
//! └──────┬───────┘   └──────────────┘   └──────┬───────┘
//!        │                                     │ findings
//!        │                                     ▼
//!        │                            ┌──────────────────┐
//!        └───────────────────────────▶│     Locator      │
//!                 profiles            │ (hot paths, root │
//!                                     │  cause, context) │
//!                                     └────────┬─────────┘
//!                                              ▼
//!                                     ┌──────────────────┐
//!                                     │     Reporter     │
//!                                     │  (text / html)   │
//!                                     └──────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`pprof`]: the parser boundary; decodes the protobuf container
//!   (gzipped or raw) into a string-resolved in-memory profile
//! - [`analysis`]: grouping by detected type, per-file metric extraction,
//!   linear trend fitting, heap insights
//! - [`rules`]: declarative single-type and cross-type rules evaluated
//!   against groups and trends, with evidence templating and deduplication
//! - [`locator`]: frame classification (runtime / stdlib / third-party /
//!   business), hot-path mining, root-cause selection, problem contexts
//! - [`report`]: text and standalone-HTML renderers for the final result
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: shared enums and error types
//!
//! ## Processing Model
//!
//! A run is single-threaded and request-scoped: inputs are processed
//! sequentially, every stage's output is an immutable snapshot for the next
//! stage, and nothing outlives the emitted report. Output ordering is fully
//! deterministic: groups sort by type name, files by timestamp, findings by
//! rule order with cross-analysis findings taking precedence in
//! deduplication, hot paths by aggregated value.
//!
//! Diagnostics are best-effort: unreadable files are skipped with a log
//! line, a missing rules file degrades the run to metrics-only output, and
//! groups below the trend floor simply carry no trend.

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod locator;
pub mod pprof;
pub mod report;
pub mod rules;
