//! Text report rendering.
//!
//! Writes the full diagnosis to any writer: per-group file metrics and heap
//! insights, trend lines, then the findings enriched with their problem
//! contexts (explanation, impact, hot paths with category markers, helper
//! commands, suggestions).

use std::io::{self, Write};

use crate::analysis::{
    analyze_heap_insights, format_bytes, GroupTrends, ProfileGroup, ProfileMetrics,
};
use crate::domain::ProfileKind;
use crate::locator::{
    CodeCategory, ExecutableCmd, HotPath, ProblemContext, Suggestion, SuggestionKind,
};
use crate::rules::Finding;

use super::{format_size, format_span, truncate_name, DiagnosticReport, REPORT_MIN_R2};

const RULE_LINE: &str = "═══════════════════════════════════════════════════════════";
const GROUP_LINE: &str = "───────────────────────────────────────────────────────────";

/// Render the full report as text.
pub fn render<W: Write>(w: &mut W, report: &DiagnosticReport) -> io::Result<()> {
    if report.groups.is_empty() {
        writeln!(w, "No analyzable profile files were found")?;
        return Ok(());
    }

    writeln!(w, "\n{RULE_LINE}")?;
    writeln!(w, "                    pprofscope analysis report")?;
    writeln!(w, "{RULE_LINE}")?;

    for group in &report.groups {
        if group.files.is_empty() {
            continue;
        }
        render_group(w, group, report.trends.get(&group.kind))?;
    }

    let (single, cross): (Vec<&Finding>, Vec<&Finding>) =
        report.findings.iter().partition(|f| !f.is_cross_analysis);

    if !single.is_empty() {
        writeln!(w, "\n{RULE_LINE}")?;
        writeln!(w, "                        🔍 Findings")?;
        writeln!(w, "{RULE_LINE}")?;
        for (i, finding) in single.iter().enumerate() {
            render_finding(w, i + 1, finding, report.context_for(finding))?;
        }
    }

    if !cross.is_empty() {
        writeln!(w, "\n{RULE_LINE}")?;
        writeln!(w, "                  🔗 Cross-analysis findings")?;
        writeln!(w, "{RULE_LINE}")?;
        for (i, finding) in cross.iter().enumerate() {
            render_finding(w, i + 1, finding, report.context_for(finding))?;
        }
    }

    writeln!(w, "\n{RULE_LINE}")?;
    Ok(())
}

fn render_group<W: Write>(
    w: &mut W,
    group: &ProfileGroup,
    trends: Option<&GroupTrends>,
) -> io::Result<()> {
    writeln!(w, "\n📁 {} analysis ({} files):", group.kind, group.files.len())?;
    writeln!(w, "{GROUP_LINE}")?;

    for (i, file) in group.files.iter().enumerate() {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.path.display().to_string());
        writeln!(w, "  {}. {name}", i + 1)?;
        writeln!(w, "     ├─ time: {}", file.time.to_rfc3339())?;
        writeln!(w, "     ├─ size: {}", format_size(file.size))?;
        render_metrics(w, &file.metrics, group.kind)?;
    }

    if let Some((first, last)) = group.time_span() {
        writeln!(
            w,
            "\n  📊 time range: {} → {}",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(w, "  ⏱️  span: {}", format_span(last - first))?;
    }

    if let Some(trends) = trends {
        render_trends(w, trends)?;
    }

    if group.kind == ProfileKind::Heap {
        if let Some(latest) = group.files.last() {
            render_insights(w, &latest.metrics)?;
        }
    }

    Ok(())
}

fn render_metrics<W: Write>(
    w: &mut W,
    metrics: &ProfileMetrics,
    kind: ProfileKind,
) -> io::Result<()> {
    match kind {
        ProfileKind::Cpu => {
            if !metrics.cpu_time.is_zero() {
                writeln!(w, "     ├─ cpu time: {:?}", metrics.cpu_time)?;
            }
            if !metrics.duration.is_zero() {
                writeln!(w, "     ├─ sampled over: {:?}", metrics.duration)?;
            }
            writeln!(w, "     ├─ samples: {}", metrics.total_samples)?;
            render_top_functions(w, metrics, "top hot functions")?;
        }
        ProfileKind::Heap => {
            writeln!(
                w,
                "     ├─ allocated: {} ({} objects)",
                format_bytes(metrics.alloc_space),
                metrics.alloc_objects
            )?;
            writeln!(
                w,
                "     ├─ in use: {} ({} objects)",
                format_bytes(metrics.inuse_space),
                metrics.inuse_objects
            )?;
            render_top_functions(w, metrics, "top allocation sites")?;
        }
        ProfileKind::Goroutine => {
            writeln!(w, "     ├─ goroutines: {}", metrics.goroutine_count)?;
            render_top_functions(w, metrics, "top parked locations")?;
        }
        _ => {
            writeln!(w, "     ├─ samples: {}", metrics.total_samples)?;
            writeln!(w, "     ├─ functions: {}", metrics.function_count)?;
        }
    }
    writeln!(w, "     └─")?;
    Ok(())
}

fn render_top_functions<W: Write>(
    w: &mut W,
    metrics: &ProfileMetrics,
    label: &str,
) -> io::Result<()> {
    if metrics.top_functions.is_empty() {
        return Ok(());
    }
    writeln!(w, "     ├─ {label}:")?;
    for (i, function) in metrics.top_functions.iter().take(5).enumerate() {
        writeln!(
            w,
            "     │  {}. {} ({:.1}%)",
            i + 1,
            truncate_name(&function.name, 50),
            function.flat_pct
        )?;
    }
    Ok(())
}

fn render_trends<W: Write>(w: &mut W, trends: &GroupTrends) -> io::Result<()> {
    let mut printed = false;

    if let Some(heap) = &trends.heap_inuse {
        if heap.r2 > REPORT_MIN_R2 {
            writeln!(w, "\n  📈 trends:")?;
            printed = true;
            writeln!(
                w,
                "     {} heap in-use: slope={:.2}, R²={:.2} ({})",
                direction_icon(heap.direction.as_str()),
                heap.slope,
                heap.r2,
                heap.direction
            )?;
        }
    }

    if let Some(goroutine) = &trends.goroutine_count {
        if goroutine.r2 > REPORT_MIN_R2 {
            if !printed {
                writeln!(w, "\n  📈 trends:")?;
            }
            writeln!(
                w,
                "     {} goroutines: slope={:.2}, R²={:.2} ({})",
                direction_icon(goroutine.direction.as_str()),
                goroutine.slope,
                goroutine.r2,
                goroutine.direction
            )?;
        }
    }

    Ok(())
}

fn render_insights<W: Write>(w: &mut W, metrics: &ProfileMetrics) -> io::Result<()> {
    let insights = analyze_heap_insights(metrics);
    if insights.is_empty() {
        return Ok(());
    }
    writeln!(w, "\n  💡 heap insights:")?;
    for insight in &insights {
        writeln!(w, "     [{}] {}", insight.level.as_str(), insight.title)?;
        writeln!(w, "         {}", insight.description)?;
    }
    Ok(())
}

fn render_finding<W: Write>(
    w: &mut W,
    index: usize,
    finding: &Finding,
    context: Option<&ProblemContext>,
) -> io::Result<()> {
    writeln!(w, "\n{index}. {} {}", severity_icon(&finding.severity), finding.title)?;
    writeln!(w, "   rule: {} ({})", finding.rule_name, finding.rule_id)?;
    writeln!(w, "   severity: {}", finding.severity)?;

    let Some(context) = context else {
        if !finding.evidence.is_empty() {
            writeln!(w, "   evidence:")?;
            for (key, value) in &finding.evidence {
                writeln!(w, "     - {key}: {value}")?;
            }
        }
        if !finding.suggestions.is_empty() {
            writeln!(w, "   suggestions:")?;
            for suggestion in &finding.suggestions {
                writeln!(w, "     • {suggestion}")?;
            }
        }
        return Ok(());
    };

    if !context.explanation.is_empty() {
        writeln!(w, "\n   📝 what is happening:")?;
        writeln!(w, "      {}", context.explanation)?;
    }

    if !context.impact.is_empty() {
        writeln!(w, "\n   📊 impact:")?;
        writeln!(w, "      {}", context.impact)?;
    }

    if !finding.evidence.is_empty() {
        writeln!(w, "\n   🧾 evidence:")?;
        for (key, value) in &finding.evidence {
            writeln!(w, "      - {key}: {value}")?;
        }
    }

    if !context.hot_paths.is_empty() {
        render_hot_paths(w, &context.hot_paths)?;
    }

    if !context.commands.is_empty() {
        render_commands(w, &context.commands)?;
    }

    if !context.suggestions.is_empty() {
        render_suggestions(w, &context.suggestions)?;
    }

    Ok(())
}

fn render_hot_paths<W: Write>(w: &mut W, hot_paths: &[HotPath]) -> io::Result<()> {
    writeln!(w, "\n   🔥 hot call chains:")?;
    for (i, path) in hot_paths.iter().enumerate() {
        writeln!(w, "\n   ─── hot path #{} ({:.1}%) ───", i + 1, path.chain.total_pct)?;
        writeln!(w, "      chain: {}", path.chain.segment_summary())?;

        let mut last_category: Option<CodeCategory> = None;
        for (index, frame) in path.chain.frames.iter().enumerate() {
            if index > 0 && last_category != Some(frame.category) {
                writeln!(w, "      ─────────────────────────────")?;
            }

            let marker = if Some(index) == path.root_cause_index {
                " ← root cause"
            } else if path.business_frames.contains(&index) {
                " ← attention"
            } else {
                ""
            };

            writeln!(
                w,
                "      {} [{}] {}{marker}",
                category_icon(frame.category),
                frame.category,
                frame.short_name
            )?;
            writeln!(w, "             └─ {}", frame.location())?;

            last_category = Some(frame.category);
        }

        if !path.chain.has_business_code() {
            writeln!(
                w,
                "\n      ⚠️  no business code in this path: likely runtime/GC work or an \
                 indirect call"
            )?;
        }
    }
    Ok(())
}

fn render_commands<W: Write>(w: &mut W, commands: &[ExecutableCmd]) -> io::Result<()> {
    writeln!(w, "\n   💻 debugging commands:")?;
    for (i, cmd) in commands.iter().enumerate() {
        writeln!(w, "\n      {}. {}", i + 1, cmd.description)?;
        writeln!(w, "         $ {}", cmd.command)?;
        if !cmd.output_hint.is_empty() {
            writeln!(w, "         note: {}", cmd.output_hint)?;
        }
    }
    Ok(())
}

fn render_suggestions<W: Write>(w: &mut W, suggestions: &[Suggestion]) -> io::Result<()> {
    let (immediate, long_term): (Vec<&Suggestion>, Vec<&Suggestion>) =
        suggestions.iter().partition(|s| s.kind == SuggestionKind::Immediate);

    writeln!(w, "\n   💡 suggestions:")?;
    if !immediate.is_empty() {
        writeln!(w, "      [now]")?;
        for suggestion in immediate {
            writeln!(w, "        • {}", suggestion.content)?;
        }
    }
    if !long_term.is_empty() {
        writeln!(w, "      [long term]")?;
        for suggestion in long_term {
            writeln!(w, "        • {}", suggestion.content)?;
        }
    }
    Ok(())
}

fn severity_icon(severity: &str) -> &'static str {
    match severity.to_lowercase().as_str() {
        "critical" => "🔥",
        "high" => "🔴",
        "medium" => "🟡",
        "low" => "🟢",
        _ => "⚪",
    }
}

fn direction_icon(direction: &str) -> &'static str {
    match direction {
        "increasing" => "📈",
        "decreasing" => "📉",
        _ => "➡️",
    }
}

fn category_icon(category: CodeCategory) -> &'static str {
    match category {
        CodeCategory::Runtime => "⚙️",
        CodeCategory::Stdlib => "📚",
        CodeCategory::ThirdParty => "📦",
        CodeCategory::Business => "💼",
        CodeCategory::Unknown => "❓",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ProfileFile;
    use crate::pprof::Profile;
    use chrono::DateTime;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn render_to_string(report: &DiagnosticReport) -> String {
        let mut buf = Vec::new();
        render(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn heap_report() -> DiagnosticReport {
        let files = (0..3)
            .map(|i| ProfileFile {
                path: PathBuf::from(format!("heap{i}.pprof")),
                time: DateTime::from_timestamp(1_700_000_000 + 60 * i, 0).unwrap(),
                size: 2048,
                profile: Arc::new(Profile::default()),
                metrics: ProfileMetrics {
                    inuse_space: (100 + 100 * i) * 1024 * 1024,
                    alloc_space: 1024 * 1024 * 1024,
                    ..ProfileMetrics::default()
                },
            })
            .collect();
        let group = ProfileGroup { kind: ProfileKind::Heap, files };
        let mut trends = std::collections::HashMap::new();
        trends.insert(ProfileKind::Heap, crate::analysis::calculate_trends(&group).unwrap());
        DiagnosticReport { groups: vec![group], trends, ..DiagnosticReport::default() }
    }

    #[test]
    fn test_empty_report() {
        let text = render_to_string(&DiagnosticReport::default());
        assert!(text.contains("No analyzable profile files"));
    }

    #[test]
    fn test_group_section_lists_files_and_span() {
        let text = render_to_string(&heap_report());
        assert!(text.contains("heap analysis (3 files)"), "{text}");
        assert!(text.contains("heap0.pprof"));
        assert!(text.contains("heap2.pprof"));
        assert!(text.contains("span: 2.0 minutes"), "{text}");
    }

    #[test]
    fn test_trend_line_rendered_for_clean_fit() {
        let text = render_to_string(&heap_report());
        assert!(text.contains("heap in-use"), "{text}");
        assert!(text.contains("increasing"), "{text}");
    }

    #[test]
    fn test_finding_without_context_shows_evidence() {
        let mut report = heap_report();
        let mut evidence = std::collections::BTreeMap::new();
        evidence.insert("rate".to_string(), "100.00 MB/min".to_string());
        report.findings.push(Finding {
            rule_id: "memory-growth".to_string(),
            rule_name: "Heap memory growth".to_string(),
            severity: "high".to_string(),
            title: "Sustained memory growth".to_string(),
            evidence,
            suggestions: vec!["Check caches".to_string()],
            is_cross_analysis: false,
        });

        let text = render_to_string(&report);
        assert!(text.contains("Sustained memory growth"));
        assert!(text.contains("rate: 100.00 MB/min"));
        assert!(text.contains("Check caches"));
    }
}
