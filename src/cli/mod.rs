//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::locator::LocatorConfig;

/// Output format of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Html,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Html => f.write_str("html"),
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pprofscope",
    version,
    about = "Offline time-series diagnostics for pprof profiles",
    after_help = "Examples:\n  \
        pprofscope ./profiles/\n  \
        pprofscope --format html --output report.html ./profiles/\n  \
        pprofscope --rules custom_rules.yaml ./profiles/\n  \
        pprofscope --module github.com/acme/app --stack-depth 15 ./profiles/"
)]
pub struct Args {
    /// Profile file or directory to analyze (.pprof / .profile)
    pub input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Output file path (html only; defaults to report.html)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Rules file path
    #[arg(long, default_value = "assets/default_rules.yaml")]
    pub rules: PathBuf,

    /// Module path of the analyzed program (detected from go.mod when omitted)
    #[arg(long)]
    pub module: Option<String>,

    /// Extra third-party package prefixes, comma separated
    #[arg(long = "third-party-prefixes", value_delimiter = ',')]
    pub third_party_prefixes: Vec<String>,

    /// Maximum call stack depth per hot path (clamped to 1..=100)
    #[arg(long = "stack-depth", default_value_t = 10)]
    pub stack_depth: usize,

    /// Maximum number of hot paths per finding (clamped to 1..=50)
    #[arg(long = "hot-paths", default_value_t = 5)]
    pub hot_paths: usize,
}

impl Args {
    /// Build the locator configuration, falling back to `go.mod` detection
    /// in the working directory when no module was given.
    #[must_use]
    pub fn locator_config(&self) -> LocatorConfig {
        let module_name = self.module.clone().or_else(|| {
            crate::locator::classifier::detect_module_name(std::path::Path::new(".")).ok()
        });

        LocatorConfig {
            module_name,
            third_party_prefixes: self
                .third_party_prefixes
                .iter()
                .map(|prefix| prefix.trim().to_string())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
            max_stack_depth: self.stack_depth,
            max_hot_paths: self.hot_paths,
        }
        .clamped()
    }
}
