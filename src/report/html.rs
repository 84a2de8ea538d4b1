//! Standalone HTML report rendering.
//!
//! Produces a single self-contained document: no external assets, styles
//! inlined, and the per-group trend series embedded as JSON for the inline
//! chart script. Serialization of the chart payload goes through serde so
//! the JS side never sees hand-escaped strings.

use std::io::{self, Write};

use serde::Serialize;

use crate::analysis::{analyze_heap_insights, format_bytes, ProfileGroup};
use crate::domain::ProfileKind;
use crate::locator::{ProblemContext, SuggestionKind};
use crate::rules::Finding;

use super::{format_size, format_span, truncate_name, DiagnosticReport, REPORT_MIN_R2};

/// One point of an embedded trend chart.
#[derive(Debug, Serialize)]
struct ChartPoint {
    label: String,
    value: f64,
}

/// Chart payload for one group, embedded as JSON.
#[derive(Debug, Serialize)]
struct ChartSeries {
    group: String,
    unit: String,
    direction: String,
    points: Vec<ChartPoint>,
}

/// Render the report as a standalone HTML document.
pub fn render<W: Write>(w: &mut W, report: &DiagnosticReport) -> io::Result<()> {
    writeln!(w, "<!DOCTYPE html>")?;
    writeln!(w, "<html lang=\"en\">")?;
    writeln!(w, "<head>")?;
    writeln!(w, "<meta charset=\"utf-8\">")?;
    writeln!(w, "<title>pprofscope report</title>")?;
    writeln!(w, "<style>{STYLE}</style>")?;
    writeln!(w, "</head>")?;
    writeln!(w, "<body>")?;
    writeln!(w, "<h1>pprofscope analysis report</h1>")?;

    if report.groups.is_empty() {
        writeln!(w, "<p class=\"empty\">No analyzable profile files were found.</p>")?;
        writeln!(w, "</body></html>")?;
        return Ok(());
    }

    render_summary(w, report)?;
    for group in &report.groups {
        render_group(w, report, group)?;
    }
    render_findings(w, report)?;
    render_chart_script(w, report)?;

    writeln!(w, "</body></html>")?;
    Ok(())
}

fn render_summary<W: Write>(w: &mut W, report: &DiagnosticReport) -> io::Result<()> {
    let file_count: usize = report.groups.iter().map(|g| g.files.len()).sum();
    writeln!(w, "<section class=\"summary\">")?;
    writeln!(w, "<div class=\"card\"><b>{}</b><span>profile groups</span></div>", report.groups.len())?;
    writeln!(w, "<div class=\"card\"><b>{file_count}</b><span>files analyzed</span></div>")?;
    writeln!(
        w,
        "<div class=\"card\"><b>{}</b><span>findings</span></div>",
        report.findings.len()
    )?;
    writeln!(w, "</section>")?;
    Ok(())
}

fn render_group<W: Write>(
    w: &mut W,
    report: &DiagnosticReport,
    group: &ProfileGroup,
) -> io::Result<()> {
    writeln!(w, "<section class=\"group\">")?;
    writeln!(w, "<h2>{} profiles ({})</h2>", group.kind, group.files.len())?;

    writeln!(w, "<table>")?;
    writeln!(w, "<tr><th>file</th><th>time</th><th>size</th><th>key metrics</th></tr>")?;
    for file in &group.files {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.path.display().to_string());
        writeln!(
            w,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&name),
            file.time.format("%Y-%m-%d %H:%M:%S"),
            format_size(file.size),
            metrics_cell(group.kind, file)
        )?;
    }
    writeln!(w, "</table>")?;

    if let Some((first, last)) = group.time_span() {
        writeln!(
            w,
            "<p class=\"span\">time range {} → {} ({})</p>",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S"),
            format_span(last - first)
        )?;
    }

    if let Some(trends) = report.trends.get(&group.kind) {
        let mut lines = Vec::new();
        if let Some(heap) = &trends.heap_inuse {
            if heap.r2 > REPORT_MIN_R2 {
                lines.push(format!(
                    "heap in-use: slope {:.2}, R² {:.2}, {}",
                    heap.slope, heap.r2, heap.direction
                ));
            }
        }
        if let Some(goroutine) = &trends.goroutine_count {
            if goroutine.r2 > REPORT_MIN_R2 {
                lines.push(format!(
                    "goroutines: slope {:.2}, R² {:.2}, {}",
                    goroutine.slope, goroutine.r2, goroutine.direction
                ));
            }
        }
        if !lines.is_empty() {
            writeln!(w, "<p class=\"trend\">{}</p>", escape(&lines.join(" · ")))?;
            writeln!(
                w,
                "<div class=\"chart\" data-group=\"{}\"><svg viewBox=\"0 0 600 120\"></svg></div>",
                group.kind
            )?;
        }
    }

    if group.kind == ProfileKind::Heap {
        if let Some(latest) = group.files.last() {
            let insights = analyze_heap_insights(&latest.metrics);
            if !insights.is_empty() {
                writeln!(w, "<ul class=\"insights\">")?;
                for insight in &insights {
                    writeln!(
                        w,
                        "<li class=\"{}\"><b>{}</b> {}</li>",
                        insight.level.as_str(),
                        escape(&insight.title),
                        escape(&insight.description)
                    )?;
                }
                writeln!(w, "</ul>")?;
            }
        }
    }

    writeln!(w, "</section>")?;
    Ok(())
}

fn metrics_cell(kind: ProfileKind, file: &crate::analysis::ProfileFile) -> String {
    let m = &file.metrics;
    match kind {
        ProfileKind::Cpu => format!(
            "cpu {:?}, {} samples",
            m.cpu_time, m.total_samples
        ),
        ProfileKind::Heap => format!(
            "alloc {}, in use {}",
            format_bytes(m.alloc_space),
            format_bytes(m.inuse_space)
        ),
        ProfileKind::Goroutine => format!("{} goroutines", m.goroutine_count),
        _ => format!("{} samples", m.total_samples),
    }
}

fn render_findings<W: Write>(w: &mut W, report: &DiagnosticReport) -> io::Result<()> {
    if report.findings.is_empty() {
        writeln!(w, "<section><h2>Findings</h2><p class=\"empty\">No findings.</p></section>")?;
        return Ok(());
    }

    writeln!(w, "<section><h2>Findings</h2>")?;
    for finding in &report.findings {
        render_finding(w, finding, report.context_for(finding))?;
    }
    writeln!(w, "</section>")?;
    Ok(())
}

fn render_finding<W: Write>(
    w: &mut W,
    finding: &Finding,
    context: Option<&ProblemContext>,
) -> io::Result<()> {
    let severity_class = match context {
        Some(context) => context.severity.as_str().to_string(),
        None => finding.severity.to_lowercase(),
    };
    writeln!(w, "<article class=\"finding {}\">", escape(&severity_class))?;
    writeln!(
        w,
        "<h3>{}{}</h3>",
        escape(&finding.title),
        if finding.is_cross_analysis { " <em>(cross-analysis)</em>" } else { "" }
    )?;
    writeln!(
        w,
        "<p class=\"meta\">rule {} · severity {}</p>",
        escape(&finding.rule_id),
        escape(&finding.severity)
    )?;

    if !finding.evidence.is_empty() {
        writeln!(w, "<dl>")?;
        for (key, value) in &finding.evidence {
            writeln!(w, "<dt>{}</dt><dd>{}</dd>", escape(key), escape(value))?;
        }
        writeln!(w, "</dl>")?;
    }

    if let Some(context) = context {
        writeln!(w, "<p>{}</p>", escape(&context.explanation))?;
        writeln!(w, "<p><b>Impact:</b> {}</p>", escape(&context.impact))?;

        for (i, path) in context.hot_paths.iter().enumerate() {
            writeln!(
                w,
                "<details{}><summary>hot path #{} ({:.1}%) · {}</summary><ol>",
                if i == 0 { " open" } else { "" },
                i + 1,
                path.chain.total_pct,
                escape(&path.chain.segment_summary())
            )?;
            for (index, frame) in path.chain.frames.iter().enumerate() {
                let marker = if Some(index) == path.root_cause_index {
                    " class=\"root-cause\""
                } else if frame.category.is_business() {
                    " class=\"business\""
                } else {
                    ""
                };
                writeln!(
                    w,
                    "<li{marker}><code>{}</code> <small>[{}] {}</small></li>",
                    escape(&truncate_name(&frame.function_name, 80)),
                    frame.category,
                    escape(&frame.location())
                )?;
            }
            writeln!(w, "</ol></details>")?;
        }

        if !context.commands.is_empty() {
            writeln!(w, "<h4>Debugging commands</h4><ul class=\"commands\">")?;
            for cmd in &context.commands {
                writeln!(
                    w,
                    "<li><code>{}</code><br><small>{} · {}</small></li>",
                    escape(&cmd.command),
                    escape(&cmd.description),
                    escape(&cmd.output_hint)
                )?;
            }
            writeln!(w, "</ul>")?;
        }

        if !context.suggestions.is_empty() {
            writeln!(w, "<h4>Suggestions</h4><ul class=\"suggestions\">")?;
            for suggestion in &context.suggestions {
                let tag = match suggestion.kind {
                    SuggestionKind::Immediate => "now",
                    SuggestionKind::LongTerm => "long term",
                };
                writeln!(w, "<li><b>[{tag}]</b> {}</li>", escape(&suggestion.content))?;
            }
            writeln!(w, "</ul>")?;
        }
    } else if !finding.suggestions.is_empty() {
        writeln!(w, "<ul class=\"suggestions\">")?;
        for suggestion in &finding.suggestions {
            writeln!(w, "<li>{}</li>", escape(suggestion))?;
        }
        writeln!(w, "</ul>")?;
    }

    writeln!(w, "</article>")?;
    Ok(())
}

/// Embed the trend series as JSON and draw simple polyline charts.
fn render_chart_script<W: Write>(w: &mut W, report: &DiagnosticReport) -> io::Result<()> {
    let mut series = Vec::new();

    for group in &report.groups {
        let Some(trends) = report.trends.get(&group.kind) else {
            continue;
        };
        match group.kind {
            ProfileKind::Heap => {
                if let Some(heap) = &trends.heap_inuse {
                    series.push(ChartSeries {
                        group: group.kind.as_str().to_string(),
                        unit: "MB".to_string(),
                        direction: heap.direction.as_str().to_string(),
                        points: group
                            .files
                            .iter()
                            .map(|f| ChartPoint {
                                label: f.time.format("%H:%M:%S").to_string(),
                                value: f.metrics.inuse_space as f64 / 1024.0 / 1024.0,
                            })
                            .collect(),
                    });
                }
            }
            ProfileKind::Goroutine => {
                if let Some(goroutine) = &trends.goroutine_count {
                    series.push(ChartSeries {
                        group: group.kind.as_str().to_string(),
                        unit: "goroutines".to_string(),
                        direction: goroutine.direction.as_str().to_string(),
                        points: group
                            .files
                            .iter()
                            .map(|f| ChartPoint {
                                label: f.time.format("%H:%M:%S").to_string(),
                                value: f.metrics.goroutine_count as f64,
                            })
                            .collect(),
                    });
                }
            }
            _ => {}
        }
    }

    if series.is_empty() {
        return Ok(());
    }

    let payload = serde_json::to_string(&series)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    writeln!(w, "<script>const TREND_SERIES = {payload};")?;
    writeln!(w, "{CHART_SCRIPT}</script>")?;
    Ok(())
}

/// Minimal HTML escaping for text interpolated into markup.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = "\
body{font-family:-apple-system,Segoe UI,sans-serif;margin:2rem auto;max-width:960px;\
color:#212529;background:#f8f9fa}\
h1{border-bottom:2px solid #dee2e6;padding-bottom:.5rem}\
.summary{display:flex;gap:1rem;margin:1rem 0}\
.card{background:#fff;border:1px solid #dee2e6;border-radius:6px;padding:1rem;flex:1;\
text-align:center}\
.card b{display:block;font-size:1.6rem}\
section.group,article.finding{background:#fff;border:1px solid #dee2e6;border-radius:6px;\
padding:1rem;margin:1rem 0}\
table{border-collapse:collapse;width:100%}\
td,th{border:1px solid #dee2e6;padding:.4rem .6rem;text-align:left;font-size:.9rem}\
article.critical{border-left:4px solid #dc3545}\
article.high{border-left:4px solid #fd7e14}\
article.medium{border-left:4px solid #ffc107}\
article.low{border-left:4px solid #28a745}\
.meta{color:#6c757d;font-size:.85rem}\
li.root-cause{background:#fff3cd}\
li.business{background:#e7f1ff}\
ul.insights li.critical{color:#dc3545}\
ul.insights li.warning{color:#b8860b}\
.chart svg{width:100%;height:120px;background:#fdfdfe;border:1px solid #e9ecef}\
.chart polyline{fill:none;stroke:#0d6efd;stroke-width:2}\
.empty{color:#6c757d}";

const CHART_SCRIPT: &str = "\
for (const s of TREND_SERIES) {\n\
  const holder = document.querySelector(`.chart[data-group=\"${s.group}\"] svg`);\n\
  if (!holder || s.points.length < 2) continue;\n\
  const values = s.points.map(p => p.value);\n\
  const min = Math.min(...values), max = Math.max(...values);\n\
  const range = max - min || 1;\n\
  const step = 580 / (s.points.length - 1);\n\
  const coords = s.points\n\
    .map((p, i) => `${10 + i * step},${110 - ((p.value - min) / range) * 100}`)\n\
    .join(' ');\n\
  const line = document.createElementNS('http://www.w3.org/2000/svg', 'polyline');\n\
  line.setAttribute('points', coords);\n\
  holder.appendChild(line);\n\
}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ProfileFile, ProfileMetrics};
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
    fn test_document_shape() {
        let html = render_to_string(&heap_report());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
        assert!(html.contains("heap profiles (3)"));
    }

    #[test]
    fn test_chart_payload_embedded() {
        let html = render_to_string(&heap_report());
        assert!(html.contains("TREND_SERIES"), "{html}");
        assert!(html.contains("\"unit\":\"MB\""), "{html}");
        assert!(html.contains("\"direction\":\"increasing\""));
    }

    #[test]
    fn test_empty_report() {
        let html = render_to_string(&DiagnosticReport::default());
        assert!(html.contains("No analyzable profile files"));
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
