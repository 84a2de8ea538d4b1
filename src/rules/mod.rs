//! Declarative rules evaluated against groups and trends.
//!
//! Rules come from a YAML document with two sections: single-type `rules`
//! and `cross_analysis_rules` correlating several profile types. Conditions
//! are a small closed vocabulary of keyword fragments, not an expression
//! language; see [`engine`] for the matcher.

pub mod engine;

pub use engine::Engine;

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// A single-type rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_types: Vec<String>,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A rule correlating conditions across several profile types.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrossAnalysisRule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Per-profile-type conditions; at least two are required.
    #[serde(default)]
    pub conditions: HashMap<String, String>,
    /// Optional correlation between the matched trends:
    /// `same_direction`, `both_increasing`, or `time_correlated`.
    #[serde(default)]
    pub correlation: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// What to report when a rule matches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub title: String,
    /// Template strings with `{{.var}}` placeholders, resolved per group.
    #[serde(default)]
    pub evidence_template: BTreeMap<String, String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Top-level shape of a rules document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub cross_analysis_rules: Vec<CrossAnalysisRule>,
}

/// A rule match, ready for rendering and context generation.
#[derive(Debug, Clone, Default)]
pub struct Finding {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: String,
    pub title: String,
    /// Evidence templates with their placeholders resolved.
    pub evidence: BTreeMap<String, String>,
    pub suggestions: Vec<String>,
    pub is_cross_analysis: bool,
}
