//! Driver: discover profiles, run the pipeline, render the report.
//!
//! Exit code 0 on success, 1 on input/IO failure. A broken rules file is
//! deliberately not fatal: the run logs a warning and still produces the
//! metrics-only part of the report.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use pprofscope::analysis::{calculate_trends, grouping::collect_profile_paths, group_profiles};
use pprofscope::cli::{Args, ReportFormat};
use pprofscope::domain::ProfileKind;
use pprofscope::locator::{Classifier, ContextGenerator, Extractor, PathAnalyzer, ProblemContext};
use pprofscope::pprof::Profile;
use pprofscope::report::{html, text, DiagnosticReport};
use pprofscope::rules::{Engine, Finding};

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let paths = collect_profile_paths(&args.input)
        .with_context(|| format!("failed to read input path {}", args.input.display()))?;
    if paths.is_empty() {
        bail!("no valid profile files found under {}", args.input.display());
    }
    info!("analyzing {} profile files", paths.len());

    let groups = group_profiles(&paths);

    let mut trends = HashMap::new();
    for group in &groups {
        if let Some(group_trends) = calculate_trends(group) {
            trends.insert(group.kind, group_trends);
        }
    }

    let findings = match Engine::load(&args.rules) {
        Ok(engine) => engine.evaluate(&groups, &trends),
        Err(err) => {
            warn!("rules not loaded: {err}; continuing with metrics-only output");
            Vec::new()
        }
    };

    let contexts = generate_contexts(&args, &findings, &groups);

    let report = DiagnosticReport { groups, trends, findings, contexts };

    match args.format {
        ReportFormat::Text => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            text::render(&mut out, &report)?;
        }
        ReportFormat::Html => {
            let output = args.output.clone().unwrap_or_else(|| PathBuf::from("report.html"));
            let file = File::create(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            let mut writer = BufWriter::new(file);
            html::render(&mut writer, &report)?;
            writer.flush()?;
            println!("✅ HTML report written to {}", output.display());
        }
    }

    Ok(())
}

/// Build one problem context per finding, keyed by rule id.
fn generate_contexts(
    args: &Args,
    findings: &[Finding],
    groups: &[pprofscope::analysis::ProfileGroup],
) -> HashMap<String, ProblemContext> {
    if findings.is_empty() {
        return HashMap::new();
    }

    let config = args.locator_config();
    let classifier = Classifier::new(&config);
    let analyzer = PathAnalyzer::new(Extractor::new(classifier), config);
    let generator = ContextGenerator::new(analyzer);

    // Profiles and their paths per type, for context mining.
    let mut profiles: HashMap<ProfileKind, Vec<Arc<Profile>>> = HashMap::new();
    let mut profile_paths: HashMap<ProfileKind, Vec<PathBuf>> = HashMap::new();
    for group in groups {
        for file in &group.files {
            profiles.entry(group.kind).or_default().push(Arc::clone(&file.profile));
            profile_paths.entry(group.kind).or_default().push(file.path.clone());
        }
    }

    findings
        .iter()
        .map(|finding| {
            let context = generator.generate_context(finding, &profiles, &profile_paths);
            (finding.rule_id.clone(), context)
        })
        .collect()
}
