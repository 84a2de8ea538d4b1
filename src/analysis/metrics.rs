//! Scalar metrics extracted from a single decoded profile.
//!
//! Besides the generic counters, each profile type contributes its own
//! fields: CPU time for CPU profiles, the four canonical heap columns for
//! heap profiles, and the goroutine count for goroutine snapshots. Two
//! ranked function lists round the picture out: the top functions by self
//! cost, and (for heap profiles) the top allocators by cumulative cost.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::ProfileKind;
use crate::pprof::Profile;

/// How many ranked functions to keep per profile.
const TOP_FUNCTIONS: usize = 10;

/// Scalar summary of one profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileMetrics {
    pub total_samples: usize,
    /// Sum of every sample's first value column.
    pub total_value: i64,
    /// Declared sampling duration, zero when not recorded.
    pub duration: Duration,
    pub location_count: usize,
    pub function_count: usize,

    /// CPU profiles: total sampled CPU time.
    pub cpu_time: Duration,

    /// Heap profiles: the four canonical columns, in bytes and objects.
    pub alloc_objects: i64,
    pub alloc_space: i64,
    pub inuse_objects: i64,
    pub inuse_space: i64,

    /// Goroutine profiles: total goroutine count.
    pub goroutine_count: i64,

    /// Top functions by self (flat) cost.
    pub top_functions: Vec<FunctionStat>,
    /// Heap only: top functions by cumulative allocation.
    pub top_alloc_functions: Vec<FunctionStat>,
}

/// Cost attribution of one function within a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionStat {
    pub name: String,
    /// Self cost and its share of the profile total.
    pub flat: i64,
    pub flat_pct: f64,
    /// Cumulative cost (self plus callees) and its share.
    pub cum: i64,
    pub cum_pct: f64,
}

/// Extract the scalar metrics of a profile.
#[must_use]
pub fn extract_metrics(profile: &Profile, kind: ProfileKind) -> ProfileMetrics {
    let mut metrics = ProfileMetrics {
        location_count: profile.location_count,
        function_count: profile.function_count,
        ..ProfileMetrics::default()
    };

    if profile.duration_nanos > 0 {
        metrics.duration = Duration::from_nanos(profile.duration_nanos as u64);
    }

    for sample in &profile.samples {
        metrics.total_samples += 1;
        if let Some(&value) = sample.values.first() {
            metrics.total_value += value;
        }
    }

    match kind {
        ProfileKind::Cpu => {
            let index = cpu_value_index(profile);
            metrics.cpu_time = extract_cpu_time(profile, index);
            metrics.top_functions = top_functions_by_flat(profile, TOP_FUNCTIONS, index);
        }
        ProfileKind::Heap => {
            let heap = extract_heap_columns(profile);
            metrics.alloc_objects = heap.alloc_objects;
            metrics.alloc_space = heap.alloc_space;
            metrics.inuse_objects = heap.inuse_objects;
            metrics.inuse_space = heap.inuse_space;
            metrics.top_functions = top_functions_by_flat(profile, TOP_FUNCTIONS, 1);
            metrics.top_alloc_functions = top_alloc_functions(profile, TOP_FUNCTIONS);
        }
        ProfileKind::Goroutine => {
            metrics.goroutine_count = column_sum(profile, 0);
            metrics.top_functions = top_functions_by_flat(profile, TOP_FUNCTIONS, 0);
        }
        _ => {
            metrics.top_functions = top_functions_by_flat(profile, TOP_FUNCTIONS, 0);
        }
    }

    metrics
}

/// Index of the `cpu/nanoseconds` column, falling back to column 1 when the
/// profile has several columns and none is explicitly typed.
fn cpu_value_index(profile: &Profile) -> usize {
    for (i, st) in profile.sample_types.iter().enumerate() {
        if st.kind == "cpu" && st.unit == "nanoseconds" {
            return i;
        }
    }
    if profile.sample_types.len() > 1 {
        1
    } else {
        0
    }
}

fn extract_cpu_time(profile: &Profile, value_index: usize) -> Duration {
    let total: i64 = profile
        .samples
        .iter()
        .filter_map(|sample| sample.values.get(value_index))
        .sum();
    Duration::from_nanos(total.max(0) as u64)
}

#[derive(Default)]
struct HeapColumns {
    alloc_objects: i64,
    alloc_space: i64,
    inuse_objects: i64,
    inuse_space: i64,
}

fn extract_heap_columns(profile: &Profile) -> HeapColumns {
    let mut indices: HashMap<&str, usize> = HashMap::new();
    for (i, st) in profile.sample_types.iter().enumerate() {
        indices.insert(st.kind.as_str(), i);
    }

    let mut columns = HeapColumns::default();
    for sample in &profile.samples {
        let mut add = |name: &str, target: &mut i64| {
            if let Some(&index) = indices.get(name) {
                if let Some(&value) = sample.values.get(index) {
                    *target += value;
                }
            }
        };
        add("alloc_objects", &mut columns.alloc_objects);
        add("alloc_space", &mut columns.alloc_space);
        add("inuse_objects", &mut columns.inuse_objects);
        add("inuse_space", &mut columns.inuse_space);
    }
    columns
}

fn column_sum(profile: &Profile, value_index: usize) -> i64 {
    profile.samples.iter().filter_map(|sample| sample.values.get(value_index)).sum()
}

/// Per-function flat/cum aggregation over every sample's call stack.
///
/// A function accumulates cum for every stack it appears in; only the leaf
/// location (index 0 of the leaf-first list) contributes to flat.
fn aggregate_functions(
    profile: &Profile,
    value_index: usize,
) -> (HashMap<u64, i64>, HashMap<u64, i64>, HashMap<u64, String>, i64) {
    let mut flat: HashMap<u64, i64> = HashMap::new();
    let mut cum: HashMap<u64, i64> = HashMap::new();
    let mut names: HashMap<u64, String> = HashMap::new();
    let mut total: i64 = 0;

    for sample in &profile.samples {
        let Some(&value) = sample.values.get(value_index) else {
            continue;
        };
        total += value;

        for (i, location) in sample.locations.iter().enumerate() {
            for line in &location.lines {
                let Some(function) = &line.function else {
                    continue;
                };
                names.entry(function.id).or_insert_with(|| function.name.clone());
                *cum.entry(function.id).or_insert(0) += value;
                if i == 0 {
                    *flat.entry(function.id).or_insert(0) += value;
                }
            }
        }
    }

    (flat, cum, names, total)
}

fn build_stat(
    id: u64,
    flat: i64,
    cum: i64,
    names: &HashMap<u64, String>,
    total: i64,
) -> FunctionStat {
    let name = match names.get(&id) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => "<unknown>".to_string(),
    };
    let (flat_pct, cum_pct) = if total > 0 {
        (flat as f64 / total as f64 * 100.0, cum as f64 / total as f64 * 100.0)
    } else {
        (0.0, 0.0)
    };
    FunctionStat { name, flat, flat_pct, cum, cum_pct }
}

/// Top `n` functions ranked by flat cost at `value_index`.
fn top_functions_by_flat(profile: &Profile, n: usize, value_index: usize) -> Vec<FunctionStat> {
    if profile.samples.is_empty() {
        return Vec::new();
    }
    let (flat, cum, names, total) = aggregate_functions(profile, value_index);

    let mut stats: Vec<FunctionStat> = flat
        .iter()
        .map(|(&id, &f)| build_stat(id, f, cum.get(&id).copied().unwrap_or(0), &names, total))
        .collect();

    // Name as tie-breaker keeps the ranking deterministic.
    stats.sort_by(|a, b| b.flat.cmp(&a.flat).then_with(|| a.name.cmp(&b.name)));
    stats.truncate(n);
    stats
}

/// Top `n` functions ranked by cumulative cost on the `alloc_space` column.
fn top_alloc_functions(profile: &Profile, n: usize) -> Vec<FunctionStat> {
    if profile.samples.is_empty() {
        return Vec::new();
    }
    let value_index = profile
        .sample_types
        .iter()
        .position(|st| st.kind == "alloc_space")
        .unwrap_or(1);
    let (flat, cum, names, total) = aggregate_functions(profile, value_index);

    let mut stats: Vec<FunctionStat> = cum
        .iter()
        .map(|(&id, &c)| build_stat(id, flat.get(&id).copied().unwrap_or(0), c, &names, total))
        .collect();

    stats.sort_by(|a, b| b.cum.cmp(&a.cum).then_with(|| a.name.cmp(&b.name)));
    stats.truncate(n);
    stats
}

/// Format a byte count with an auto-selected KB/MB/GB unit.
#[must_use]
pub fn format_bytes(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pprof::{FunctionInfo, Line, Location, Sample, SampleType};
    use std::sync::Arc;

    fn location(id: u64, name: &str) -> Arc<Location> {
        Arc::new(Location {
            lines: vec![Line {
                function: Some(Arc::new(FunctionInfo {
                    id,
                    name: name.to_string(),
                    filename: "src.go".to_string(),
                })),
                line: 1,
            }],
        })
    }

    fn sample_type(kind: &str, unit: &str) -> SampleType {
        SampleType { kind: kind.to_string(), unit: unit.to_string() }
    }

    fn heap_profile() -> Profile {
        // Columns: alloc_objects, alloc_space, inuse_objects, inuse_space.
        Profile {
            sample_types: vec![
                sample_type("alloc_objects", "count"),
                sample_type("alloc_space", "bytes"),
                sample_type("inuse_objects", "count"),
                sample_type("inuse_space", "bytes"),
            ],
            samples: vec![
                Sample {
                    values: vec![10, 1000, 5, 400],
                    // Leaf-first: cache.Fill is the allocation site,
                    // main.run the caller.
                    locations: vec![location(1, "app/cache.Fill"), location(2, "main.run")],
                },
                Sample {
                    values: vec![4, 600, 2, 200],
                    locations: vec![location(3, "app/log.Write"), location(2, "main.run")],
                },
            ],
            location_count: 3,
            function_count: 3,
            ..Profile::default()
        }
    }

    #[test]
    fn test_heap_columns_summed_by_name() {
        let metrics = extract_metrics(&heap_profile(), ProfileKind::Heap);
        assert_eq!(metrics.alloc_objects, 14);
        assert_eq!(metrics.alloc_space, 1600);
        assert_eq!(metrics.inuse_objects, 7);
        assert_eq!(metrics.inuse_space, 600);
        assert_eq!(metrics.total_samples, 2);
        assert_eq!(metrics.total_value, 14);
    }

    #[test]
    fn test_heap_top_functions_ranked_by_flat() {
        let metrics = extract_metrics(&heap_profile(), ProfileKind::Heap);
        // Flat on the alloc_space column: Fill 1000, Write 600; run has no
        // leaf samples so it carries no flat entry.
        assert_eq!(metrics.top_functions.len(), 2);
        assert_eq!(metrics.top_functions[0].name, "app/cache.Fill");
        assert_eq!(metrics.top_functions[0].flat, 1000);
        assert_eq!(metrics.top_functions[1].name, "app/log.Write");
        assert!((metrics.top_functions[0].flat_pct - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_heap_top_alloc_functions_ranked_by_cum() {
        let metrics = extract_metrics(&heap_profile(), ProfileKind::Heap);
        // Cum on alloc_space: run 1600, Fill 1000, Write 600.
        assert_eq!(metrics.top_alloc_functions[0].name, "main.run");
        assert_eq!(metrics.top_alloc_functions[0].cum, 1600);
        assert!((metrics.top_alloc_functions[0].cum_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cpu_metrics_use_nanosecond_column() {
        let profile = Profile {
            sample_types: vec![sample_type("samples", "count"), sample_type("cpu", "nanoseconds")],
            samples: vec![
                Sample { values: vec![1, 3_000_000], locations: vec![location(1, "main.hot")] },
                Sample { values: vec![1, 7_000_000], locations: vec![location(1, "main.hot")] },
            ],
            duration_nanos: 1_000_000_000,
            ..Profile::default()
        };

        let metrics = extract_metrics(&profile, ProfileKind::Cpu);
        assert_eq!(metrics.cpu_time, Duration::from_millis(10));
        assert_eq!(metrics.duration, Duration::from_secs(1));
        assert_eq!(metrics.top_functions[0].name, "main.hot");
        assert_eq!(metrics.top_functions[0].flat, 10_000_000);
    }

    #[test]
    fn test_goroutine_count_from_first_column() {
        let profile = Profile {
            sample_types: vec![sample_type("goroutine", "count")],
            samples: vec![
                Sample { values: vec![25], locations: vec![location(1, "runtime.gopark")] },
                Sample { values: vec![5], locations: vec![location(2, "main.worker")] },
            ],
            ..Profile::default()
        };

        let metrics = extract_metrics(&profile, ProfileKind::Goroutine);
        assert_eq!(metrics.goroutine_count, 30);
        assert_eq!(metrics.top_functions[0].name, "runtime.gopark");
    }

    #[test]
    fn test_missing_value_column_treated_as_zero() {
        let profile = Profile {
            sample_types: vec![sample_type("samples", "count"), sample_type("cpu", "nanoseconds")],
            samples: vec![Sample { values: vec![1], locations: vec![location(1, "main.f")] }],
            ..Profile::default()
        };
        let metrics = extract_metrics(&profile, ProfileKind::Cpu);
        assert_eq!(metrics.cpu_time, Duration::ZERO);
        assert!(metrics.top_functions.is_empty());
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
    }
}
