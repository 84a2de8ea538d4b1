//! Loading, type detection, and grouping of profile files.
//!
//! Unreadable or undecodable files are skipped with a warning; a run never
//! fails because one snapshot is broken. Groups come out sorted by type
//! name, files within a group sorted ascending by timestamp, so downstream
//! output is deterministic regardless of input order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};

use super::metrics::{extract_metrics, ProfileMetrics};
use crate::domain::ProfileKind;
use crate::pprof::{self, Profile};

/// One loaded profile file. Created at load time, immutable afterwards.
#[derive(Debug, Clone)]
pub struct ProfileFile {
    pub path: PathBuf,
    /// From profile metadata when present, else filesystem mtime.
    pub time: DateTime<Utc>,
    /// File size in bytes.
    pub size: u64,
    pub profile: Arc<Profile>,
    pub metrics: ProfileMetrics,
}

/// All loaded files of one profile type, ordered ascending by timestamp.
#[derive(Debug, Clone)]
pub struct ProfileGroup {
    pub kind: ProfileKind,
    pub files: Vec<ProfileFile>,
}

impl ProfileGroup {
    /// Observed time span of the group, `None` with fewer than two files.
    #[must_use]
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.files.first(), self.files.last()) {
            (Some(first), Some(last)) if self.files.len() > 1 => Some((first.time, last.time)),
            _ => None,
        }
    }
}

/// Load every path, detect types, and build sorted groups.
///
/// Per-file failures are logged and skipped; the result covers whatever
/// could be loaded.
#[must_use]
pub fn group_profiles(paths: &[PathBuf]) -> Vec<ProfileGroup> {
    let mut buckets: HashMap<ProfileKind, Vec<ProfileFile>> = HashMap::new();

    for path in paths {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("skipping {}: {err}", path.display());
                continue;
            }
        };

        let profile = match pprof::load_profile(path) {
            Ok(profile) => profile,
            Err(err) => {
                warn!("skipping {}: {err}", path.display());
                continue;
            }
        };

        let kind = detect_profile_kind(&profile);
        let time = match pprof::profile_time(&profile) {
            Some(time) => time,
            None => {
                let mtime = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
                info!(
                    "{}: no metadata timestamp, falling back to mtime {}",
                    path.display(),
                    mtime.to_rfc3339()
                );
                mtime
            }
        };

        let metrics = extract_metrics(&profile, kind);
        buckets.entry(kind).or_default().push(ProfileFile {
            path: path.clone(),
            time,
            size: metadata.len(),
            profile: Arc::new(profile),
            metrics,
        });
    }

    into_sorted_groups(buckets)
}

/// Sort files within each bucket by time and the groups by type name.
pub(crate) fn into_sorted_groups(
    buckets: HashMap<ProfileKind, Vec<ProfileFile>>,
) -> Vec<ProfileGroup> {
    let mut groups: Vec<ProfileGroup> = buckets
        .into_iter()
        .map(|(kind, mut files)| {
            files.sort_by_key(|file| file.time);
            ProfileGroup { kind, files }
        })
        .collect();
    groups.sort_by_key(|group| group.kind.as_str());
    groups
}

/// Detect a profile's type from its sample-type table.
///
/// Entries are inspected in order; a declared non-zero duration also marks
/// a CPU profile when no entry matched.
#[must_use]
pub fn detect_profile_kind(profile: &Profile) -> ProfileKind {
    for st in &profile.sample_types {
        let kind = st.kind.to_lowercase();
        let unit = st.unit.to_lowercase();

        if (kind == "cpu" || kind == "samples") && (unit == "nanoseconds" || unit == "count") {
            return ProfileKind::Cpu;
        }
        if matches!(kind.as_str(), "alloc_objects" | "alloc_space" | "inuse_objects" | "inuse_space")
        {
            return ProfileKind::Heap;
        }
        if kind == "goroutine" || unit == "goroutine" {
            return ProfileKind::Goroutine;
        }
        if kind == "contentions" || kind == "delay" {
            return ProfileKind::Block;
        }
    }

    if profile.duration_nanos > 0 {
        return ProfileKind::Cpu;
    }

    ProfileKind::Unknown
}

/// Collect `.pprof`/`.profile` files under a path. A matching file is
/// returned directly; a directory is walked recursively; unknown
/// extensions are skipped silently.
pub fn collect_profile_paths(input: &Path) -> std::io::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(input)?;

    if metadata.is_dir() {
        let mut paths = Vec::new();
        walk(input, &mut paths)?;
        paths.sort();
        return Ok(paths);
    }

    if is_profile_file(input) {
        return Ok(vec![input.to_path_buf()]);
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        "path is not a directory or a .pprof/.profile file",
    ))
}

fn walk(dir: &Path, paths: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, paths)?;
        } else if is_profile_file(&path) {
            paths.push(path);
        }
    }
    Ok(())
}

fn is_profile_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("pprof") | Some("profile")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pprof::SampleType;

    fn profile_with_types(types: &[(&str, &str)]) -> Profile {
        Profile {
            sample_types: types
                .iter()
                .map(|(kind, unit)| SampleType { kind: (*kind).to_string(), unit: (*unit).to_string() })
                .collect(),
            ..Profile::default()
        }
    }

    #[test]
    fn test_detect_cpu_profile() {
        let p = profile_with_types(&[("samples", "count"), ("cpu", "nanoseconds")]);
        assert_eq!(detect_profile_kind(&p), ProfileKind::Cpu);
    }

    #[test]
    fn test_detect_cpu_by_duration() {
        let mut p = profile_with_types(&[]);
        p.duration_nanos = 30_000_000_000;
        assert_eq!(detect_profile_kind(&p), ProfileKind::Cpu);
    }

    #[test]
    fn test_detect_heap_profile() {
        let p = profile_with_types(&[
            ("alloc_objects", "count"),
            ("alloc_space", "bytes"),
            ("inuse_objects", "count"),
            ("inuse_space", "bytes"),
        ]);
        assert_eq!(detect_profile_kind(&p), ProfileKind::Heap);
    }

    #[test]
    fn test_detect_goroutine_profile() {
        let p = profile_with_types(&[("goroutine", "count")]);
        assert_eq!(detect_profile_kind(&p), ProfileKind::Goroutine);
    }

    #[test]
    fn test_detect_block_profile() {
        let p = profile_with_types(&[("contentions", "count"), ("delay", "nanoseconds")]);
        assert_eq!(detect_profile_kind(&p), ProfileKind::Block);
    }

    #[test]
    fn test_detect_unknown_profile() {
        let p = profile_with_types(&[("mystery", "units")]);
        assert_eq!(detect_profile_kind(&p), ProfileKind::Unknown);
    }

    #[test]
    fn test_groups_sorted_by_kind_and_time() {
        let file = |seconds: i64| ProfileFile {
            path: PathBuf::from(format!("p{seconds}.pprof")),
            time: DateTime::from_timestamp(seconds, 0).unwrap(),
            size: 0,
            profile: Arc::new(Profile::default()),
            metrics: ProfileMetrics::default(),
        };

        let mut buckets: HashMap<ProfileKind, Vec<ProfileFile>> = HashMap::new();
        buckets.insert(ProfileKind::Heap, vec![file(300), file(100), file(200)]);
        buckets.insert(ProfileKind::Cpu, vec![file(50)]);

        let groups = into_sorted_groups(buckets);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, ProfileKind::Cpu);
        assert_eq!(groups[1].kind, ProfileKind::Heap);

        let times: Vec<i64> = groups[1].files.iter().map(|f| f.time.timestamp()).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_is_profile_file() {
        assert!(is_profile_file(Path::new("a.pprof")));
        assert!(is_profile_file(Path::new("dir/b.profile")));
        assert!(!is_profile_file(Path::new("notes.txt")));
        assert!(!is_profile_file(Path::new("pprof")));
    }

    #[test]
    fn test_group_profiles_skips_missing_files() {
        let groups = group_profiles(&[PathBuf::from("/nonexistent/file.pprof")]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_time_span() {
        let file = |seconds: i64| ProfileFile {
            path: PathBuf::from("x.pprof"),
            time: DateTime::from_timestamp(seconds, 0).unwrap(),
            size: 0,
            profile: Arc::new(Profile::default()),
            metrics: ProfileMetrics::default(),
        };

        let group = ProfileGroup { kind: ProfileKind::Heap, files: vec![file(10), file(70)] };
        let (first, last) = group.time_span().unwrap();
        assert_eq!(first.timestamp(), 10);
        assert_eq!(last.timestamp(), 70);

        let single = ProfileGroup { kind: ProfileKind::Heap, files: vec![file(10)] };
        assert!(single.time_span().is_none());
    }
}
