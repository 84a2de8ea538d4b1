//! Problem-context generation: turning a finding into an actionable story.
//!
//! The generator picks the profile type a finding refers to, mines those
//! profiles for hot paths, and assembles explanation prose, an impact
//! estimate, helper commands, and classified suggestions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{
    CodeCategory, CommandGenerator, HotPath, PathAnalyzer, ProblemContext, Suggestion,
    SuggestionKind,
};
use crate::domain::{ProfileKind, Severity};
use crate::pprof::Profile;
use crate::rules::Finding;

/// Builds a [`ProblemContext`] per finding from the profiles at hand.
pub struct ContextGenerator {
    analyzer: PathAnalyzer,
}

impl ContextGenerator {
    #[must_use]
    pub fn new(analyzer: PathAnalyzer) -> ContextGenerator {
        ContextGenerator { analyzer }
    }

    /// Generate the full context for one finding.
    ///
    /// All profiles of the finding's type are analyzed together; with a
    /// single profile this degrades to plain single-profile analysis.
    #[must_use]
    pub fn generate_context(
        &self,
        finding: &Finding,
        profiles: &HashMap<ProfileKind, Vec<Arc<Profile>>>,
        profile_paths: &HashMap<ProfileKind, Vec<PathBuf>>,
    ) -> ProblemContext {
        let kind = profile_kind_for(finding);

        let hot_paths = profiles
            .get(&kind)
            .map(|list| self.analyzer.analyze_multiple_profiles(list, kind))
            .unwrap_or_default();

        let paths: &[PathBuf] =
            profile_paths.get(&kind).map(Vec::as_slice).unwrap_or_default();

        ProblemContext {
            title: finding.title.clone(),
            severity: Severity::normalize(&finding.severity),
            explanation: generate_explanation(finding, &hot_paths),
            impact: generate_impact(&hot_paths, kind),
            commands: CommandGenerator::new().generate(paths, kind, &hot_paths),
            suggestions: generate_suggestions(finding, &hot_paths),
            hot_paths,
        }
    }
}

/// Decide which profile type a finding is about from its title and rule id.
#[must_use]
pub fn profile_kind_for(finding: &Finding) -> ProfileKind {
    let title = finding.title.to_lowercase();
    let rule_id = finding.rule_id.to_lowercase();

    if title.contains("cpu") || rule_id.contains("cpu") {
        return ProfileKind::Cpu;
    }
    if title.contains("内存")
        || title.contains("memory")
        || title.contains("heap")
        || rule_id.contains("heap")
        || rule_id.contains("memory")
    {
        return ProfileKind::Heap;
    }
    if title.contains("goroutine") || rule_id.contains("goroutine") || title.contains("协程") {
        return ProfileKind::Goroutine;
    }

    ProfileKind::Cpu
}

/// Plain-language explanation of the finding, extended with what the hot
/// paths reveal about the responsible code.
#[must_use]
pub fn generate_explanation(finding: &Finding, hot_paths: &[HotPath]) -> String {
    let mut text = basic_explanation(finding);
    let Some(top) = hot_paths.first() else {
        return text;
    };

    if let Some(root_cause) = top.root_cause() {
        text.push_str(&format!(
            " Most of the cost sits in the business function {} ({})",
            root_cause.short_name,
            root_cause.location()
        ));
        // Name what the business code hands off to next.
        if let Some(index) = top.root_cause_index {
            if let Some(callee) = top.chain.frames[index + 1..]
                .iter()
                .find(|frame| !frame.category.is_business())
            {
                text.push_str(&format!(
                    ", which calls into {} ({})",
                    callee.category.description(),
                    callee.short_name
                ));
            }
        }
        text.push('.');
    } else if !top.chain.has_business_code() {
        text.push_str(" No business code appears directly in this hot path; ");
        let breakdown = &top.chain.category_breakdown;
        let runtime = breakdown.get(&CodeCategory::Runtime).copied().unwrap_or(0);
        if runtime > 0 && runtime == top.chain.frames.len() {
            text.push_str(
                "it is entirely Go runtime code, usually garbage collection or memory \
                 management overhead.",
            );
        } else if breakdown.get(&CodeCategory::ThirdParty).copied().unwrap_or(0) > 0 {
            text.push_str(
                "it is dominated by third-party library calls, most likely triggered \
                 indirectly by business code.",
            );
        } else if breakdown.get(&CodeCategory::Stdlib).copied().unwrap_or(0) > 0 {
            text.push_str(
                "it is dominated by standard library calls, most likely triggered \
                 indirectly by business code.",
            );
        } else {
            text.push_str("it is probably runtime overhead triggered indirectly by business code.");
        }
    }

    text
}

fn basic_explanation(finding: &Finding) -> String {
    let title = finding.title.to_lowercase();

    if title.contains("内存") || title.contains("memory") || title.contains("heap") {
        return memory_explanation(&title);
    }
    if title.contains("cpu") {
        return cpu_explanation(&title);
    }
    if title.contains("goroutine") || title.contains("协程") {
        return goroutine_explanation(&title);
    }

    format!(
        "Detected a performance problem: {}. Review the related code and profiles.",
        finding.title
    )
}

fn memory_explanation(title: &str) -> String {
    if title.contains("泄漏")
        || title.contains("leak")
        || title.contains("增长")
        || title.contains("growth")
    {
        return "The program's memory usage keeps growing over time. This usually points at \
                a memory leak: objects are allocated but never released. Common causes are \
                unclosed resources (files, connections), slices or maps that only ever grow, \
                and caches without an expiry policy."
            .to_string();
    }
    if title.contains("分配") || title.contains("alloc") {
        return "The program allocates memory at a high rate. Frequent allocation raises \
                garbage collector pressure and costs throughput. Check whether objects can \
                be reused, pooled, or allocated less often."
            .to_string();
    }
    "Detected a memory related problem. Inspect the heap profile with pprof to find the \
     dominant allocation sites."
        .to_string()
}

fn cpu_explanation(title: &str) -> String {
    if title.contains("热点")
        || title.contains("hotspot")
        || title.contains("高")
        || title.contains("high")
    {
        return "The program has CPU hotspots: a few functions burn a large share of CPU \
                time. Typical causes are inefficient algorithms, repeated work that could \
                be cached, and tight loops that do more than they need to."
            .to_string();
    }
    "Detected a CPU performance problem. Analyze the CPU profile to find the functions \
     that consume the most time and consider cheaper algorithms or less redundant work."
        .to_string()
}

fn goroutine_explanation(title: &str) -> String {
    if title.contains("泄漏")
        || title.contains("leak")
        || title.contains("增长")
        || title.contains("growth")
    {
        return "The goroutine count keeps growing. This usually points at a goroutine \
                leak: goroutines are started but never exit. Common causes are blocked \
                channel operations, network calls without timeouts, and loops that spawn \
                workers without a shutdown path."
            .to_string();
    }
    if title.contains("阻塞") || title.contains("block") {
        return "Goroutines are blocking. Some goroutines are stuck waiting on channels, \
                locks, or I/O. Check for deadlocks and contended resources."
            .to_string();
    }
    "Detected a goroutine related problem. Inspect the goroutine profile to see where \
     goroutines are parked and why."
        .to_string()
}

/// Short impact estimate: the top path's share, the combined share of all
/// returned paths, and the root cause location if one exists.
#[must_use]
pub fn generate_impact(hot_paths: &[HotPath], kind: ProfileKind) -> String {
    let Some(top) = hot_paths.first() else {
        return "Unable to assess impact: no hot paths were found".to_string();
    };

    let top_pct = top.chain.total_pct;
    let total_pct: f64 = hot_paths.iter().map(|p| p.chain.total_pct).sum();

    let mut text = match kind {
        ProfileKind::Cpu => {
            format!("The top hot path accounts for {top_pct:.1}% of sampled CPU time")
        }
        ProfileKind::Heap => {
            format!("The top hot path accounts for {top_pct:.1}% of sampled memory")
        }
        ProfileKind::Goroutine => {
            format!("The top hot path accounts for {top_pct:.1}% of goroutines")
        }
        _ => format!("The top hot path accounts for {top_pct:.1}% of the total"),
    };

    if hot_paths.len() > 1 {
        text.push_str(&format!(
            ", and the top {} paths together account for {total_pct:.1}%",
            hot_paths.len()
        ));
    }

    if let Some(root_cause) = top.root_cause() {
        text.push_str(&format!(
            ". Root cause located at {} ({})",
            root_cause.short_name,
            root_cause.location()
        ));
    }

    text
}

/// Immediate and long-term suggestions: the rule's own advice, a pointer at
/// the root cause, fallbacks for business-free paths, and one durable
/// practice per profile type.
#[must_use]
pub fn generate_suggestions(finding: &Finding, hot_paths: &[HotPath]) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = finding
        .suggestions
        .iter()
        .map(|content| Suggestion { kind: SuggestionKind::Immediate, content: content.clone() })
        .collect();

    if let Some(top) = hot_paths.first() {
        if let Some(root_cause) = top.root_cause() {
            suggestions.push(Suggestion {
                kind: SuggestionKind::Immediate,
                content: format!("Check the code around {}", root_cause.location()),
            });
        } else if !top.chain.has_business_code() {
            suggestions.extend(no_business_code_suggestions(top.profile_kind));
        }
        suggestions.extend(long_term_suggestions(top.profile_kind));
    }

    if suggestions.is_empty() {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Immediate,
            content: "Analyze the profile in more depth with go tool pprof".to_string(),
        });
    }

    suggestions
}

fn no_business_code_suggestions(kind: ProfileKind) -> Vec<Suggestion> {
    let lines: &[&str] = match kind {
        ProfileKind::Heap => &[
            "No business code shows up in the hot path; the usual causes are:",
            "1. A global map or slice that keeps growing (inspect global state)",
            "2. A cache without an expiry policy (inspect cache implementations)",
            "3. A leaking connection or object pool (inspect resource management)",
            "Run go tool pprof -alloc_objects to see where the objects come from",
        ],
        ProfileKind::Goroutine => &[
            "No business code shows up in the hot path; goroutines are likely parked \
             inside runtime calls",
            "Check for channels that are never closed and selects that can wait forever",
        ],
        ProfileKind::Cpu => &[
            "CPU time is dominated by the runtime, often a sign of garbage collector pressure",
            "Reduce allocation churn or reuse objects with sync.Pool",
        ],
        _ => &[],
    };

    lines
        .iter()
        .map(|content| Suggestion {
            kind: SuggestionKind::Immediate,
            content: (*content).to_string(),
        })
        .collect()
}

fn long_term_suggestions(kind: ProfileKind) -> Vec<Suggestion> {
    let content = match kind {
        ProfileKind::Cpu => "Add CPU usage alerting and review CPU profiles regularly",
        ProfileKind::Heap => {
            "Add memory usage alerting, review heap profiles regularly, and consider object \
             pooling to cut allocations"
        }
        ProfileKind::Goroutine => {
            "Track goroutine counts in your monitoring and make sure every goroutine has a \
             way to exit"
        }
        _ => return Vec::new(),
    };
    vec![Suggestion { kind: SuggestionKind::LongTerm, content: content.to_string() }]
}
