//! Rule loading, validation, evaluation, and finding deduplication.
//!
//! # Condition vocabulary
//!
//! Single-type conditions:
//! - `cpu_profile_exists` - the group is a CPU group with at least one file
//! - `trends.heap_inuse.slope` - heap trend with R² > 0.85 and slope > 10
//! - `trends.goroutine_count.slope` - goroutine trend with R² > 0.9 and
//!   slope > 1
//!
//! Cross-analysis per-type conditions combine direction keywords
//! (`increasing`, `decreasing`) with slope comparisons (`slope > 0`,
//! `slope < 0`, `slope <= 0`); slope claims are gated on R² ≥ 0.7. The CPU
//! entry only checks presence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::analysis::{GroupTrends, ProfileGroup, TrendDirection, TrendMetrics};
use crate::domain::{ProfileKind, RulesError};

use super::{Action, CrossAnalysisRule, Finding, Rule, RulesConfig};

/// R² below which a trend is too noisy to base a cross condition on.
const CROSS_MIN_R2: f64 = 0.7;
/// Single-type heap rule gates.
const HEAP_MIN_R2: f64 = 0.85;
const HEAP_MIN_SLOPE: f64 = 10.0;
/// Single-type goroutine rule gates.
const GOROUTINE_MIN_R2: f64 = 0.9;
const GOROUTINE_MIN_SLOPE: f64 = 1.0;
/// Files needed before trend-based conditions may fire.
const MIN_TREND_FILES: usize = 3;

/// Title keyword domains used to deduplicate overlapping findings.
const KEYWORD_PATTERNS: &[(&str, &[&str])] = &[
    ("memory_leak", &["内存增长", "内存泄漏", "memory leak", "memory growth"]),
    ("goroutine_leak", &["goroutine", "协程泄漏", "协程增长"]),
    ("cpu_hotspot", &["cpu", "热点函数", "cpu hotspot"]),
];

/// The loaded and validated rule set.
#[derive(Debug)]
pub struct Engine {
    rules: Vec<Rule>,
    cross_rules: Vec<CrossAnalysisRule>,
}

impl Engine {
    /// Load a rules document from disk. Missing files and schema violations
    /// are fatal to the loader; the driver degrades them to a warning.
    pub fn load(path: &Path) -> Result<Engine, RulesError> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RulesError::NotFound(path.to_path_buf())
            } else {
                RulesError::Io(err)
            }
        })?;
        Engine::from_str(&data)
    }

    /// Parse and validate a rules document.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(data: &str) -> Result<Engine, RulesError> {
        let config: RulesConfig = serde_yaml::from_str(data)?;
        validate(&config)?;
        Ok(Engine { rules: config.rules, cross_rules: config.cross_analysis_rules })
    }

    /// Evaluate every rule against the groups and trends, returning the
    /// deduplicated findings: cross-analysis findings first, then the
    /// surviving single-type findings, each in evaluation order.
    #[must_use]
    pub fn evaluate(
        &self,
        groups: &[ProfileGroup],
        trends: &HashMap<ProfileKind, GroupTrends>,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        for group in groups {
            let group_trends = trends.get(&group.kind);
            for rule in &self.rules {
                if !rule.profile_types.iter().any(|t| t == group.kind.as_str()) {
                    continue;
                }
                if !evaluate_condition(&rule.condition, group, group_trends) {
                    continue;
                }
                for action in &rule.actions {
                    findings.push(Finding {
                        rule_id: rule.id.clone(),
                        rule_name: rule.name.clone(),
                        severity: action.severity.clone(),
                        title: action.title.clone(),
                        evidence: build_evidence(action, group_trends, group),
                        suggestions: action.suggestions.clone(),
                        is_cross_analysis: false,
                    });
                }
            }
        }

        findings.extend(self.evaluate_cross_rules(groups, trends));

        deduplicate_findings(findings)
    }

    fn evaluate_cross_rules(
        &self,
        groups: &[ProfileGroup],
        trends: &HashMap<ProfileKind, GroupTrends>,
    ) -> Vec<Finding> {
        let group_map: HashMap<&str, &ProfileGroup> =
            groups.iter().map(|g| (g.kind.as_str(), g)).collect();
        let trends_map: HashMap<&str, &GroupTrends> =
            trends.iter().map(|(kind, t)| (kind.as_str(), t)).collect();

        let mut findings = Vec::new();

        for rule in &self.cross_rules {
            // Every referenced type must be present in groups and trends.
            if !rule
                .conditions
                .keys()
                .all(|t| group_map.contains_key(t.as_str()) && trends_map.contains_key(t.as_str()))
            {
                continue;
            }

            let mut matched: Vec<Option<TrendDirection>> = Vec::new();
            let all_met = rule.conditions.iter().all(|(profile_type, condition)| {
                evaluate_cross_condition(
                    condition,
                    profile_type,
                    group_map[profile_type.as_str()],
                    trends_map[profile_type.as_str()],
                    &mut matched,
                )
            });
            if !all_met {
                continue;
            }

            if !rule.correlation.is_empty() && !check_correlation(&rule.correlation, &matched) {
                continue;
            }

            for action in &rule.actions {
                findings.push(Finding {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    severity: action.severity.clone(),
                    title: action.title.clone(),
                    evidence: build_cross_evidence(action, &trends_map, &group_map),
                    suggestions: action.suggestions.clone(),
                    is_cross_analysis: true,
                });
            }
        }

        findings
    }
}

fn validate(config: &RulesConfig) -> Result<(), RulesError> {
    for (index, rule) in config.rules.iter().enumerate() {
        if rule.id.is_empty() {
            return Err(RulesError::MissingField { rule: index.to_string(), field: "id" });
        }
        if rule.name.is_empty() {
            return Err(RulesError::MissingField { rule: rule.id.clone(), field: "name" });
        }
        if rule.profile_types.is_empty() {
            return Err(RulesError::MissingField { rule: rule.id.clone(), field: "profile_types" });
        }
        if rule.condition.is_empty() {
            return Err(RulesError::MissingField { rule: rule.id.clone(), field: "condition" });
        }
        if rule.actions.is_empty() {
            return Err(RulesError::MissingField { rule: rule.id.clone(), field: "actions" });
        }
    }

    for (index, rule) in config.cross_analysis_rules.iter().enumerate() {
        if rule.id.is_empty() {
            return Err(RulesError::CrossMissingField { rule: index.to_string(), field: "id" });
        }
        if rule.name.is_empty() {
            return Err(RulesError::CrossMissingField { rule: rule.id.clone(), field: "name" });
        }
        if rule.conditions.len() < 2 {
            return Err(RulesError::TooFewConditions { rule: rule.id.clone() });
        }
        if rule.actions.is_empty() {
            return Err(RulesError::CrossMissingField { rule: rule.id.clone(), field: "actions" });
        }
    }

    Ok(())
}

/// Evaluate a single-type condition against one group.
fn evaluate_condition(
    condition: &str,
    group: &ProfileGroup,
    trends: Option<&GroupTrends>,
) -> bool {
    if condition == "cpu_profile_exists" && group.kind == ProfileKind::Cpu {
        return !group.files.is_empty();
    }

    let Some(trends) = trends else {
        return false;
    };

    if let Some(heap) = &trends.heap_inuse {
        if heap.r2 > HEAP_MIN_R2
            && heap.slope > HEAP_MIN_SLOPE
            && condition.contains("heap_inuse")
            && condition.contains("slope")
            && group.files.len() >= MIN_TREND_FILES
        {
            return true;
        }
    }

    if let Some(goroutine) = &trends.goroutine_count {
        if goroutine.r2 > GOROUTINE_MIN_R2
            && goroutine.slope > GOROUTINE_MIN_SLOPE
            && condition.contains("goroutine_count")
            && condition.contains("slope")
            && group.files.len() >= MIN_TREND_FILES
        {
            return true;
        }
    }

    false
}

/// Evaluate one per-type condition of a cross rule, recording the matched
/// trend direction (`None` stands for the CPU presence sentinel).
fn evaluate_cross_condition(
    condition: &str,
    profile_type: &str,
    group: &ProfileGroup,
    trends: &GroupTrends,
    matched: &mut Vec<Option<TrendDirection>>,
) -> bool {
    if group.files.len() < MIN_TREND_FILES {
        return false;
    }

    match profile_type {
        "heap" => {
            if let Some(trend) = &trends.heap_inuse {
                if evaluate_trend_condition(condition, trend) {
                    matched.push(Some(trend.direction));
                    return true;
                }
            }
        }
        "goroutine" => {
            if let Some(trend) = &trends.goroutine_count {
                if evaluate_trend_condition(condition, trend) {
                    matched.push(Some(trend.direction));
                    return true;
                }
            }
        }
        "cpu" => {
            // CPU carries no trend; the condition can only claim presence.
            if !group.files.is_empty() {
                matched.push(None);
                return condition.contains("cpu");
            }
        }
        _ => {}
    }

    false
}

/// Match a trend against the condition's keyword fragments.
fn evaluate_trend_condition(condition: &str, trend: &TrendMetrics) -> bool {
    if condition.contains("increasing") && trend.direction != TrendDirection::Increasing {
        return false;
    }
    if condition.contains("decreasing") && trend.direction != TrendDirection::Decreasing {
        return false;
    }

    if condition.contains("slope > 0") && (trend.slope <= 0.0 || trend.r2 < CROSS_MIN_R2) {
        return false;
    }
    if condition.contains("slope <= 0") && trend.slope > 0.0 && trend.r2 > CROSS_MIN_R2 {
        return false;
    }
    if condition.contains("slope < 0") && trend.slope >= 0.0 {
        return false;
    }

    // A bare `slope` mention without a comparison just demands a clean fit.
    if condition.contains("slope")
        && !condition.contains("slope >")
        && !condition.contains("slope <")
        && !condition.contains("slope =")
        && trend.r2 < CROSS_MIN_R2
    {
        return false;
    }

    true
}

/// Check the correlation clause against the matched trend directions.
/// `None` entries are the CPU presence sentinel and carry no direction.
fn check_correlation(correlation: &str, matched: &[Option<TrendDirection>]) -> bool {
    match correlation {
        "same_direction" => {
            let mut direction: Option<TrendDirection> = None;
            for trend in matched.iter().flatten() {
                match direction {
                    None => direction = Some(*trend),
                    Some(existing) if existing != *trend => return false,
                    Some(_) => {}
                }
            }
            direction.is_some()
        }
        "both_increasing" => matched
            .iter()
            .all(|trend| matches!(trend, None | Some(TrendDirection::Increasing))),
        "time_correlated" => matched.len() >= 2,
        // Unknown correlation tokens pass; the conditions already matched.
        _ => true,
    }
}

/// Resolve a single-type action's evidence templates for one group.
fn build_evidence(
    action: &Action,
    trends: Option<&GroupTrends>,
    group: &ProfileGroup,
) -> BTreeMap<String, String> {
    let Some(trends) = trends else {
        return BTreeMap::new();
    };

    let duration_minutes = group_duration_minutes(group);
    let file_count = group.files.len();

    let mut evidence = BTreeMap::new();
    for (key, template) in &action.evidence_template {
        let mut value = template.clone();

        if let Some(heap) = &trends.heap_inuse {
            let rate = memory_rate_mb_per_minute(heap.slope, file_count, duration_minutes);
            value = value.replace("{{.slope}}", &format_memory_rate(rate));
            value = value.replace("{{.r2}}", &format!("{:.2}", heap.r2));
            value = value.replace("{{.direction}}", heap.direction.as_str());
        }

        if let Some(goroutine) = &trends.goroutine_count {
            let rate = per_minute_rate(goroutine.slope, file_count, duration_minutes);
            value = value.replace("{{.goroutine_slope}}", &format!("{rate:.2}"));
            value = value.replace("{{.goroutine_r2}}", &format!("{:.2}", goroutine.r2));
            value = value.replace("{{.goroutine_direction}}", goroutine.direction.as_str());
        }

        if let Some((first, last)) = group.time_span() {
            let span = last - first;
            value = value.replace("{{.duration}}", &format_span(span));
            value = value.replace("{{.start_time}}", &first.to_rfc3339());
            value = value.replace("{{.end_time}}", &last.to_rfc3339());
        }

        value = value.replace("{{.file_count}}", &file_count.to_string());
        evidence.insert(key.clone(), value);
    }
    evidence
}

/// Resolve a cross-analysis action's evidence templates; variables carry
/// explicit `heap_`/`goroutine_` prefixes here.
fn build_cross_evidence(
    action: &Action,
    trends: &HashMap<&str, &GroupTrends>,
    groups: &HashMap<&str, &ProfileGroup>,
) -> BTreeMap<String, String> {
    let mut evidence = BTreeMap::new();

    for (key, template) in &action.evidence_template {
        let mut value = template.clone();

        if let (Some(trend), Some(group)) = (
            trends.get("heap").and_then(|t| t.heap_inuse.as_ref()),
            groups.get("heap"),
        ) {
            let rate = memory_rate_mb_per_minute(
                trend.slope,
                group.files.len(),
                group_duration_minutes(group),
            );
            value = value.replace("{{.heap_slope}}", &format_memory_rate(rate));
            value = value.replace("{{.heap_r2}}", &format!("{:.2}", trend.r2));
            value = value.replace("{{.heap_direction}}", trend.direction.as_str());
        }

        if let (Some(trend), Some(group)) = (
            trends.get("goroutine").and_then(|t| t.goroutine_count.as_ref()),
            groups.get("goroutine"),
        ) {
            let rate =
                per_minute_rate(trend.slope, group.files.len(), group_duration_minutes(group));
            value = value.replace("{{.goroutine_slope}}", &format!("{rate:.2}"));
            value = value.replace("{{.goroutine_r2}}", &format!("{:.2}", trend.r2));
            value = value.replace("{{.goroutine_direction}}", trend.direction.as_str());
        }

        evidence.insert(key.clone(), value);
    }

    evidence
}

/// Observed span of a group in minutes; a non-positive span substitutes one
/// minute so rate math never divides by zero.
fn group_duration_minutes(group: &ProfileGroup) -> f64 {
    let Some((first, last)) = group.time_span() else {
        return 0.0;
    };
    let minutes = (last - first).num_milliseconds() as f64 / 60_000.0;
    if minutes <= 0.0 {
        1.0
    } else {
        minutes
    }
}

/// Normalize a per-sample slope to a per-minute rate using the group's
/// interval count (`n - 1`).
fn per_minute_rate(slope: f64, file_count: usize, duration_minutes: f64) -> f64 {
    if duration_minutes <= 0.0 || file_count < 2 {
        return 0.0;
    }
    let total_change = slope * (file_count - 1) as f64;
    total_change / duration_minutes
}

/// Per-minute heap slope converted from bytes to MB.
fn memory_rate_mb_per_minute(slope: f64, file_count: usize, duration_minutes: f64) -> f64 {
    per_minute_rate(slope, file_count, duration_minutes) / (1024.0 * 1024.0)
}

/// Format a memory growth rate in MB/min with an auto-selected unit.
/// Negative rates print as a bare number.
fn format_memory_rate(mb_per_minute: f64) -> String {
    if mb_per_minute < 0.0 {
        return format!("{mb_per_minute:.2}");
    }
    if mb_per_minute < 1.0 {
        return format!("{:.2} KB", mb_per_minute * 1024.0);
    }
    if mb_per_minute < 1024.0 {
        return format!("{mb_per_minute:.2} MB");
    }
    format!("{:.2} GB", mb_per_minute / 1024.0)
}

/// Format a time span for evidence strings.
fn format_span(span: chrono::Duration) -> String {
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

/// Remove overlapping findings.
///
/// Cross-analysis findings take precedence: a cross finding covering a
/// keyword domain suppresses single-type findings with the same keyword.
/// Exact duplicates by `(rule id, title)` never survive either way.
fn deduplicate_findings(findings: Vec<Finding>) -> Vec<Finding> {
    if findings.len() <= 1 {
        return findings;
    }

    let (cross, single): (Vec<Finding>, Vec<Finding>) =
        findings.into_iter().partition(|f| f.is_cross_analysis);

    let mut seen: HashSet<String> = HashSet::new();
    let mut seen_keywords: HashSet<&'static str> = HashSet::new();
    let mut result = Vec::new();

    for finding in cross {
        let key = format!("{}:{}", finding.rule_id, finding.title);
        if !seen.insert(key) {
            continue;
        }
        for keyword in all_title_keywords(&finding.title) {
            seen_keywords.insert(keyword);
        }
        result.push(finding);
    }

    for finding in single {
        let key = format!("{}:{}", finding.rule_id, finding.title);
        if seen.contains(&key) {
            continue;
        }
        let keyword = title_keyword(&finding.title);
        if let Some(keyword) = keyword {
            if seen_keywords.contains(keyword) {
                continue;
            }
        }
        seen.insert(key);
        if let Some(keyword) = keyword {
            seen_keywords.insert(keyword);
        }
        result.push(finding);
    }

    result
}

/// First keyword domain matching the title, if any.
fn title_keyword(title: &str) -> Option<&'static str> {
    let lower = title.to_lowercase();
    KEYWORD_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(&p.to_lowercase())))
        .map(|(keyword, _)| *keyword)
}

/// All keyword domains matching the title (cross findings may span several).
fn all_title_keywords(title: &str) -> Vec<&'static str> {
    let lower = title.to_lowercase();
    KEYWORD_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| lower.contains(&p.to_lowercase())))
        .map(|(keyword, _)| *keyword)
        .collect()
}
