//! Parser boundary: decoded, string-resolved pprof profiles.
//!
//! The rest of the crate never touches the protobuf wire format. This module
//! decodes a `.pprof`/`.profile` file (gzip-compressed or raw) into a
//! [`Profile`] whose string table is already resolved: sample types carry
//! their type/unit strings, locations carry their line entries, and lines
//! reference shared [`FunctionInfo`] records.
//!
//! Location lists inside a sample are leaf-first, as stored on the wire; the
//! call-chain extractor reverses them into entry-first order.

pub mod proto;

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use log::debug;
use prost::Message;

use crate::domain::ProfileError;

/// A decoded profile with its string table resolved away.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    /// Wall-clock duration covered by the profile, if declared.
    pub duration_nanos: i64,
    /// Collection timestamp in nanoseconds since the Unix epoch; 0 if the
    /// producer did not record one.
    pub time_nanos: i64,
    /// One entry per column of every sample's value vector, in order.
    pub sample_types: Vec<SampleType>,
    /// Sampled call stacks.
    pub samples: Vec<Sample>,
    /// Number of distinct locations in the source profile.
    pub location_count: usize,
    /// Number of distinct functions in the source profile.
    pub function_count: usize,
}

/// Resolved `{type, unit}` descriptor of one value column.
#[derive(Debug, Clone, Default)]
pub struct SampleType {
    pub kind: String,
    pub unit: String,
}

/// One sample: a value vector plus its call stack, leaf-first.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub values: Vec<i64>,
    pub locations: Vec<Arc<Location>>,
}

/// A code address with one line entry per inlining level. The innermost
/// (most deeply inlined) call comes first, matching the wire order.
#[derive(Debug, Clone, Default)]
pub struct Location {
    pub lines: Vec<Line>,
}

/// A source line attributed to a location.
#[derive(Debug, Clone, Default)]
pub struct Line {
    pub function: Option<Arc<FunctionInfo>>,
    pub line: i64,
}

/// A function referenced from one or more lines.
#[derive(Debug, Clone, Default)]
pub struct FunctionInfo {
    pub id: u64,
    pub name: String,
    pub filename: String,
}

/// Collection timestamp from the profile metadata, if present.
#[must_use]
pub fn profile_time(profile: &Profile) -> Option<DateTime<Utc>> {
    if profile.time_nanos > 0 {
        Some(DateTime::from_timestamp_nanos(profile.time_nanos))
    } else {
        None
    }
}

/// Load and decode a pprof file. Transparently gunzips when the file starts
/// with the gzip magic bytes.
pub fn load_profile(path: &Path) -> Result<Profile, ProfileError> {
    let raw = fs::read(path)?;
    let bytes = if raw.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut decompressed = Vec::with_capacity(raw.len() * 4);
        decoder.read_to_end(&mut decompressed)?;
        decompressed
    } else {
        raw
    };

    let wire = proto::Profile::decode(&bytes[..])?;
    debug!(
        "decoded {}: {} sample types, {} samples, {} locations",
        path.display(),
        wire.sample_type.len(),
        wire.sample.len(),
        wire.location.len()
    );
    resolve(wire)
}

/// Resolve string-table indices and id references into the decoded model.
fn resolve(wire: proto::Profile) -> Result<Profile, ProfileError> {
    let strings = wire.string_table;
    let lookup = |index: i64| -> Result<String, ProfileError> {
        let i = usize::try_from(index).map_err(|_| ProfileError::StringIndex(index))?;
        strings.get(i).cloned().ok_or(ProfileError::StringIndex(index))
    };

    let mut functions = std::collections::HashMap::with_capacity(wire.function.len());
    for function in &wire.function {
        let info = Arc::new(FunctionInfo {
            id: function.id,
            name: lookup(function.name)?,
            filename: lookup(function.filename)?,
        });
        functions.insert(function.id, info);
    }

    let mut locations = std::collections::HashMap::with_capacity(wire.location.len());
    for location in &wire.location {
        let mut lines = Vec::with_capacity(location.line.len());
        for line in &location.line {
            let function = if line.function_id == 0 {
                None
            } else {
                Some(Arc::clone(
                    functions
                        .get(&line.function_id)
                        .ok_or(ProfileError::DanglingFunction(line.function_id))?,
                ))
            };
            lines.push(Line { function, line: line.line });
        }
        locations.insert(location.id, Arc::new(Location { lines }));
    }

    let mut sample_types = Vec::with_capacity(wire.sample_type.len());
    for st in &wire.sample_type {
        sample_types.push(SampleType { kind: lookup(st.r#type)?, unit: lookup(st.unit)? });
    }

    let mut samples = Vec::with_capacity(wire.sample.len());
    for sample in &wire.sample {
        let mut resolved = Vec::with_capacity(sample.location_id.len());
        for id in &sample.location_id {
            resolved.push(Arc::clone(
                locations.get(id).ok_or(ProfileError::DanglingLocation(*id))?,
            ));
        }
        samples.push(Sample { values: sample.value.clone(), locations: resolved });
    }

    Ok(Profile {
        duration_nanos: wire.duration_nanos,
        time_nanos: wire.time_nanos,
        sample_types,
        samples,
        location_count: wire.location.len(),
        function_count: wire.function.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an encodable wire profile with one sample type and one sample.
    fn wire_fixture() -> proto::Profile {
        proto::Profile {
            string_table: vec![
                String::new(),
                "cpu".to_string(),
                "nanoseconds".to_string(),
                "main.work".to_string(),
                "main.go".to_string(),
            ],
            sample_type: vec![proto::ValueType { r#type: 1, unit: 2 }],
            function: vec![proto::Function { id: 7, name: 3, system_name: 3, filename: 4 }],
            location: vec![proto::Location {
                id: 11,
                mapping_id: 0,
                address: 0x1000,
                line: vec![proto::Line { function_id: 7, line: 42 }],
            }],
            sample: vec![proto::Sample { location_id: vec![11], value: vec![500] }],
            time_nanos: 1_700_000_000_000_000_000,
            duration_nanos: 10_000_000_000,
            period_type: None,
            period: 0,
            mapping: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_strings_and_references() {
        let profile = resolve(wire_fixture()).unwrap();

        assert_eq!(profile.sample_types.len(), 1);
        assert_eq!(profile.sample_types[0].kind, "cpu");
        assert_eq!(profile.sample_types[0].unit, "nanoseconds");

        assert_eq!(profile.samples.len(), 1);
        let sample = &profile.samples[0];
        assert_eq!(sample.values, vec![500]);
        assert_eq!(sample.locations.len(), 1);

        let line = &sample.locations[0].lines[0];
        let function = line.function.as_ref().unwrap();
        assert_eq!(function.name, "main.work");
        assert_eq!(function.filename, "main.go");
        assert_eq!(line.line, 42);

        assert_eq!(profile.location_count, 1);
        assert_eq!(profile.function_count, 1);
    }

    #[test]
    fn test_resolve_rejects_dangling_location() {
        let mut wire = wire_fixture();
        wire.sample[0].location_id = vec![99];
        match resolve(wire) {
            Err(ProfileError::DanglingLocation(99)) => {}
            other => panic!("expected DanglingLocation, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_rejects_bad_string_index() {
        let mut wire = wire_fixture();
        wire.sample_type[0].unit = 40;
        assert!(matches!(resolve(wire), Err(ProfileError::StringIndex(40))));
    }

    #[test]
    fn test_profile_time_prefers_metadata() {
        let profile = resolve(wire_fixture()).unwrap();
        let time = profile_time(&profile).unwrap();
        assert_eq!(time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_profile_time_absent_when_zero() {
        let mut wire = wire_fixture();
        wire.time_nanos = 0;
        let profile = resolve(wire).unwrap();
        assert!(profile_time(&profile).is_none());
    }

    #[test]
    fn test_decode_roundtrip_through_bytes() {
        let wire = wire_fixture();
        let mut buf = Vec::new();
        wire.encode(&mut buf).unwrap();
        let decoded = proto::Profile::decode(&buf[..]).unwrap();
        assert_eq!(decoded.sample.len(), 1);
        assert_eq!(decoded.string_table[1], "cpu");
    }
}
