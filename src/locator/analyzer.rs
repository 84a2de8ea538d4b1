//! Hot-path analysis over decoded profiles.
//!
//! One call chain is built per sample, chains with the same aggregation key
//! are merged, and the heaviest survivors become [`HotPath`] values with
//! their business frames and root cause identified.
//!
//! # Aggregation Strategy
//!
//! Chains that share the same business-code spine collapse together even
//! when their runtime tails differ; chains with no business code at all
//! aggregate by their first five frames to bound fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use super::extractor::preferred_value_index;
use super::{CallChain, CodeCategory, Extractor, HotPath, LocatorConfig, StackFrame};
use crate::domain::ProfileKind;
use crate::pprof::Profile;

/// Frames used for the `system:` aggregation key of chains without any
/// business code.
const SYSTEM_KEY_FRAMES: usize = 5;

/// Mines profiles for their heaviest call chains.
pub struct PathAnalyzer {
    extractor: Extractor,
    config: LocatorConfig,
}

impl PathAnalyzer {
    /// Create an analyzer; limits in `config` are clamped to their
    /// supported ranges.
    #[must_use]
    pub fn new(extractor: Extractor, config: LocatorConfig) -> PathAnalyzer {
        PathAnalyzer { extractor, config: config.clamped() }
    }

    /// Top hot paths of a single profile, heaviest first.
    ///
    /// Returns an empty list when the profile has no samples or its total
    /// value at the chosen column is zero.
    #[must_use]
    pub fn analyze_hot_paths(&self, profile: &Profile, kind: ProfileKind) -> Vec<HotPath> {
        if profile.samples.is_empty() {
            return Vec::new();
        }

        let (value_index, use_cum) = choose_value_index(profile, kind);

        let total_value: i64 = profile
            .samples
            .iter()
            .map(|s| s.values.get(value_index).copied().unwrap_or(0))
            .sum();
        if total_value == 0 {
            return Vec::new();
        }

        let chains: Vec<CallChain> = profile
            .samples
            .iter()
            .map(|sample| {
                if use_cum {
                    self.extractor.extract_call_chain_cum(sample, total_value)
                } else {
                    self.extractor.extract_call_chain(sample, value_index, total_value)
                }
            })
            .filter(|chain| !chain.frames.is_empty())
            .collect();

        self.rank_and_package(self.aggregate_call_chains(chains), kind)
    }

    /// Top hot paths across every profile of one type; percentages are
    /// recomputed against the grand total.
    #[must_use]
    pub fn analyze_multiple_profiles(
        &self,
        profiles: &[Arc<Profile>],
        kind: ProfileKind,
    ) -> Vec<HotPath> {
        match profiles {
            [] => return Vec::new(),
            [single] => return self.analyze_hot_paths(single, kind),
            _ => {}
        }

        let (value_index, use_cum) = choose_value_index(&profiles[0], kind);

        let mut all_chains = Vec::new();
        let mut grand_total: i64 = 0;

        for profile in profiles {
            if profile.samples.is_empty() {
                continue;
            }
            let profile_total: i64 = profile
                .samples
                .iter()
                .map(|s| s.values.get(value_index).copied().unwrap_or(0))
                .sum();
            if profile_total == 0 {
                continue;
            }
            grand_total += profile_total;

            for sample in &profile.samples {
                let chain = if use_cum {
                    self.extractor.extract_call_chain_cum(sample, profile_total)
                } else {
                    self.extractor.extract_call_chain(sample, value_index, profile_total)
                };
                if !chain.frames.is_empty() {
                    all_chains.push(chain);
                }
            }
        }

        if all_chains.is_empty() {
            return Vec::new();
        }

        let mut aggregated = self.aggregate_call_chains(all_chains);
        if grand_total > 0 {
            for chain in &mut aggregated {
                chain.total_pct = chain.total_value as f64 / grand_total as f64 * 100.0;
            }
        }

        self.rank_and_package(aggregated, kind)
    }

    /// Merge chains that share an aggregation key, keeping the first-seen
    /// chain as the representative and summing value, percentage, and
    /// sample count.
    #[must_use]
    pub fn aggregate_call_chains(&self, chains: Vec<CallChain>) -> Vec<CallChain> {
        let mut by_key: HashMap<String, usize> = HashMap::new();
        let mut aggregated: Vec<CallChain> = Vec::new();

        for chain in chains {
            let key = chain_key(&chain.frames);
            match by_key.get(&key) {
                Some(&index) => {
                    let existing = &mut aggregated[index];
                    existing.total_value += chain.total_value;
                    existing.total_pct += chain.total_pct;
                    existing.sample_count += chain.sample_count;
                }
                None => {
                    by_key.insert(key, aggregated.len());
                    aggregated.push(chain);
                }
            }
        }

        aggregated
    }

    fn rank_and_package(&self, mut chains: Vec<CallChain>, kind: ProfileKind) -> Vec<HotPath> {
        // Stable sort keeps first-seen order among equal totals.
        chains.sort_by(|a, b| b.total_value.cmp(&a.total_value));
        chains.truncate(self.config.max_hot_paths);
        chains.into_iter().map(|chain| self.into_hot_path(chain, kind)).collect()
    }

    fn into_hot_path(&self, mut chain: CallChain, kind: ProfileKind) -> HotPath {
        if chain.frames.len() > self.config.max_stack_depth {
            chain.frames.truncate(self.config.max_stack_depth);
            chain.boundary_points = find_boundary_points(&chain.frames);
            chain.category_breakdown = category_breakdown(&chain.frames);
        }

        let business_frames = find_business_frames(&chain.frames);
        let root_cause_index = business_frames.last().copied();

        HotPath { chain, business_frames, root_cause_index, profile_kind: kind }
    }
}

/// Pick the value column and whether to read cumulative values.
///
/// With multiple columns, the one typed `cpu` or measured in nanoseconds
/// wins and the cumulative column is used for chains. A single-column CPU
/// profile whose samples still carry two values also uses the second.
fn choose_value_index(profile: &Profile, kind: ProfileKind) -> (usize, bool) {
    if profile.sample_types.len() > 1 {
        let index = preferred_value_index(profile);
        let st = &profile.sample_types[index];
        if st.kind == "cpu" || st.unit == "nanoseconds" {
            return (index, true);
        }
        (0, false)
    } else if kind == ProfileKind::Cpu
        && profile.samples.first().is_some_and(|s| s.values.len() > 1)
    {
        (1, true)
    } else {
        (0, false)
    }
}

/// Aggregation key of a chain: its business spine when one exists, else its
/// first frames.
fn chain_key(frames: &[StackFrame]) -> String {
    if frames.is_empty() {
        return String::new();
    }

    let business: Vec<&str> = frames
        .iter()
        .filter(|frame| frame.category.is_business())
        .map(|frame| frame.function_name.as_str())
        .collect();

    if !business.is_empty() {
        return format!("business:{}", business.join("|"));
    }

    let head: Vec<&str> = frames
        .iter()
        .take(SYSTEM_KEY_FRAMES)
        .map(|frame| frame.function_name.as_str())
        .collect();
    format!("system:{}", head.join("|"))
}

/// Indices where the category differs from the previous frame, strictly
/// ascending, starting from index 1.
#[must_use]
pub fn find_boundary_points(frames: &[StackFrame]) -> Vec<usize> {
    if frames.len() <= 1 {
        return Vec::new();
    }
    (1..frames.len()).filter(|&i| frames[i].category != frames[i - 1].category).collect()
}

/// Ascending indices of all business-category frames.
#[must_use]
pub fn find_business_frames(frames: &[StackFrame]) -> Vec<usize> {
    frames
        .iter()
        .enumerate()
        .filter(|(_, frame)| frame.category.is_business())
        .map(|(i, _)| i)
        .collect()
}

fn category_breakdown(frames: &[StackFrame]) -> HashMap<CodeCategory, usize> {
    let mut breakdown = HashMap::new();
    for frame in frames {
        *breakdown.entry(frame.category).or_insert(0) += 1;
    }
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Classifier;
    use crate::pprof::{FunctionInfo, Line, Location, Sample, SampleType};

    fn analyzer(config: LocatorConfig) -> PathAnalyzer {
        PathAnalyzer::new(Extractor::new(Classifier::new(&config)), config)
    }

    /// Config that recognizes `app/...` packages as business code.
    fn app_config() -> LocatorConfig {
        LocatorConfig { module_name: Some("app".to_string()), ..LocatorConfig::default() }
    }

    fn location(name: &str, file: &str, line: i64) -> Arc<Location> {
        Arc::new(Location {
            lines: vec![Line {
                function: Some(Arc::new(FunctionInfo {
                    id: 1,
                    name: name.to_string(),
                    filename: file.to_string(),
                })),
                line,
            }],
        })
    }

    /// CPU profile with `[samples, cpu-nanoseconds]` columns; each entry is
    /// (leaf-first stack, nanoseconds).
    fn cpu_profile(stacks: &[(&[&str], i64)]) -> Profile {
        Profile {
            sample_types: vec![
                SampleType { kind: "samples".to_string(), unit: "count".to_string() },
                SampleType { kind: "cpu".to_string(), unit: "nanoseconds".to_string() },
            ],
            samples: stacks
                .iter()
                .map(|(stack, nanos)| Sample {
                    values: vec![1, *nanos],
                    locations: stack.iter().map(|name| location(name, "src.go", 1)).collect(),
                })
                .collect(),
            duration_nanos: 1_000_000_000,
            ..Profile::default()
        }
    }

    #[test]
    fn test_hot_path_with_business_root_cause() {
        // Leaf-first: mallocgc ← json.Marshal ← handler.H
        let profile = cpu_profile(&[(
            &["runtime.mallocgc", "encoding/json.Marshal", "app/handler.H"],
            1000,
        )]);

        let paths = analyzer(app_config()).analyze_hot_paths(&profile, ProfileKind::Cpu);

        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert_eq!(path.chain.frames.len(), 3);
        assert_eq!(path.business_frames, vec![0]);
        assert_eq!(path.root_cause_index, Some(0));
        assert_eq!(path.chain.boundary_points, vec![1, 2]);
        assert_eq!(path.root_cause().unwrap().short_name, "H");
    }

    #[test]
    fn test_runtime_only_chain_has_no_root_cause() {
        let profile = cpu_profile(&[(&["runtime.mallocgc", "runtime.gcBgMarkWorker"], 500)]);

        let paths =
            analyzer(LocatorConfig::default()).analyze_hot_paths(&profile, ProfileKind::Cpu);

        assert_eq!(paths.len(), 1);
        assert!(paths[0].business_frames.is_empty());
        assert_eq!(paths[0].root_cause_index, None);
        assert!(!paths[0].chain.has_business_code());
    }

    #[test]
    fn test_aggregation_merges_same_business_spine() {
        // Same business caller, different runtime tails: one aggregate.
        let profile = cpu_profile(&[
            (&["runtime.mallocgc", "app/handler.H"], 600),
            (&["runtime.memmove", "app/handler.H"], 400),
        ]);

        let paths = analyzer(app_config()).analyze_hot_paths(&profile, ProfileKind::Cpu);

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].chain.total_value, 1000);
        assert_eq!(paths[0].chain.sample_count, 2);
        assert!((paths[0].chain.total_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregation_keys() {
        let a = analyzer(app_config());
        let profile = cpu_profile(&[(&["runtime.mallocgc", "app/handler.H"], 10)]);
        let chains: Vec<CallChain> = profile
            .samples
            .iter()
            .map(|s| a.extractor.extract_call_chain_cum(s, 10))
            .collect();
        assert!(chain_key(&chains[0].frames).starts_with("business:"));

        let system = cpu_profile(&[(&["runtime.mallocgc", "runtime.gcBgMarkWorker"], 10)]);
        let chains: Vec<CallChain> = system
            .samples
            .iter()
            .map(|s| a.extractor.extract_call_chain_cum(s, 10))
            .collect();
        assert!(chain_key(&chains[0].frames).starts_with("system:"));
    }

    #[test]
    fn test_max_hot_paths_respected() {
        let stacks: Vec<(Vec<String>, i64)> = (0..10)
            .map(|i| (vec![format!("app/pkg.Func{i}")], 100 - i))
            .collect();
        let profile = Profile {
            sample_types: vec![
                SampleType { kind: "samples".to_string(), unit: "count".to_string() },
                SampleType { kind: "cpu".to_string(), unit: "nanoseconds".to_string() },
            ],
            samples: stacks
                .iter()
                .map(|(stack, nanos)| Sample {
                    values: vec![1, *nanos],
                    locations: stack.iter().map(|name| location(name, "src.go", 1)).collect(),
                })
                .collect(),
            ..Profile::default()
        };

        let config = LocatorConfig { max_hot_paths: 3, ..LocatorConfig::default() };
        let paths = analyzer(config).analyze_hot_paths(&profile, ProfileKind::Cpu);
        assert_eq!(paths.len(), 3);
        // Heaviest first.
        assert!(paths[0].chain.total_value >= paths[1].chain.total_value);
        assert!(paths[1].chain.total_value >= paths[2].chain.total_value);
    }

    #[test]
    fn test_max_stack_depth_truncates_and_recomputes() {
        let deep: Vec<String> = (0..8).map(|i| format!("runtime.f{i}")).collect();
        let mut stack: Vec<&str> = deep.iter().map(String::as_str).collect();
        stack.push("app/pkg.Entry");
        let profile = cpu_profile(&[(&stack, 100)]);

        let config = LocatorConfig { max_stack_depth: 4, ..LocatorConfig::default() };
        let paths = analyzer(config).analyze_hot_paths(&profile, ProfileKind::Cpu);

        assert_eq!(paths.len(), 1);
        let chain = &paths[0].chain;
        assert_eq!(chain.frames.len(), 4);
        let breakdown_total: usize = chain.category_breakdown.values().sum();
        assert_eq!(breakdown_total, 4);
        for window in chain.boundary_points.windows(2) {
            assert!(window[0] < window[1]);
        }
        for &point in &chain.boundary_points {
            assert!(point < chain.frames.len());
            assert_ne!(chain.frames[point].category, chain.frames[point - 1].category);
        }
    }

    #[test]
    fn test_empty_profile_yields_no_paths() {
        let profile = Profile::default();
        let paths =
            analyzer(LocatorConfig::default()).analyze_hot_paths(&profile, ProfileKind::Cpu);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_zero_total_yields_no_paths() {
        let profile = cpu_profile(&[(&["app/pkg.F"], 0)]);
        let paths =
            analyzer(LocatorConfig::default()).analyze_hot_paths(&profile, ProfileKind::Cpu);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_multiple_profiles_recompute_percentages() {
        let first = Arc::new(cpu_profile(&[(&["runtime.mallocgc", "app/handler.H"], 300)]));
        let second = Arc::new(cpu_profile(&[(&["runtime.mallocgc", "app/handler.H"], 100)]));

        let paths =
            analyzer(app_config()).analyze_multiple_profiles(&[first, second], ProfileKind::Cpu);

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].chain.total_value, 400);
        // 400 of a grand total of 400.
        assert!((paths[0].chain.total_pct - 100.0).abs() < 1e-9);
        assert_eq!(paths[0].chain.sample_count, 2);
    }

    #[test]
    fn test_find_business_frames_identity() {
        let a = analyzer(app_config());
        let profile = cpu_profile(&[(
            &["runtime.mallocgc", "app/pkg.Inner", "encoding/json.Marshal", "app/pkg.Outer"],
            50,
        )]);
        let paths = a.analyze_hot_paths(&profile, ProfileKind::Cpu);
        let path = &paths[0];

        let expected: Vec<usize> = path
            .chain
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.category.is_business())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(path.business_frames, expected);
        assert_eq!(path.root_cause_index, expected.last().copied());
    }
}
