//! Call-chain extraction from decoded profile samples.
//!
//! Profiles store call stacks leaf-first; the extractor reverses them so
//! chains read entry-first, leaf-last, the order a human reads a stack.
//! Inlined functions inside a single location are emitted outer-to-inner.

use super::{CallChain, Classifier, CodeCategory, StackFrame};
use crate::pprof::{Line, Location, Profile, Sample};

/// Extract the package path from a fully qualified function name.
///
/// The package boundary is the first `.` after the last `/`, which copes
/// with method receivers: `pkg.(*Type).Method` → `pkg`.
///
/// ```
/// use pprofscope::locator::extractor::extract_package_name;
/// assert_eq!(extract_package_name("github.com/acme/app/db.(*Pool).Get"), "github.com/acme/app/db");
/// assert_eq!(extract_package_name("runtime.mallocgc"), "runtime");
/// assert_eq!(extract_package_name("main.main"), "main");
/// ```
#[must_use]
pub fn extract_package_name(function_name: &str) -> &str {
    if function_name.is_empty() {
        return function_name;
    }
    let search_start = function_name.rfind('/').map_or(0, |i| i + 1);
    match function_name[search_start..].find('.') {
        Some(dot) => &function_name[..search_start + dot],
        None => function_name,
    }
}

/// Extract the function/method part of a fully qualified function name.
///
/// ```
/// use pprofscope::locator::extractor::extract_short_name;
/// assert_eq!(extract_short_name("github.com/acme/app/db.(*Pool).Get"), "(*Pool).Get");
/// assert_eq!(extract_short_name("runtime.mallocgc"), "mallocgc");
/// ```
#[must_use]
pub fn extract_short_name(function_name: &str) -> &str {
    if function_name.is_empty() {
        return function_name;
    }
    let search_start = function_name.rfind('/').map_or(0, |i| i + 1);
    match function_name[search_start..].find('.') {
        Some(dot) => &function_name[search_start + dot + 1..],
        None => function_name,
    }
}

/// Turns samples into classified call chains.
pub struct Extractor {
    classifier: Classifier,
}

impl Extractor {
    #[must_use]
    pub fn new(classifier: Classifier) -> Extractor {
        Extractor { classifier }
    }

    /// Build a frame from a location line. Falls back to the location's
    /// first line entry when `line` is not given, and to the unresolved
    /// sentinel when no function is attached.
    #[must_use]
    pub fn extract_stack_frame(&self, location: &Location, line: Option<&Line>) -> StackFrame {
        let Some(line) = line.or_else(|| location.lines.first()) else {
            return StackFrame::unresolved();
        };
        let Some(function) = line.function.as_ref() else {
            return StackFrame::unresolved();
        };

        let mut frame = StackFrame::unresolved();
        if !function.name.is_empty() {
            frame.function_name = function.name.clone();
            frame.short_name = extract_short_name(&function.name).to_string();
            frame.package_name = extract_package_name(&function.name).to_string();
        }
        if !function.filename.is_empty() {
            frame.file_path = function.filename.clone();
        }
        if line.line > 0 {
            frame.line_number = line.line;
        }
        frame.category = self.classifier.classify(&frame.package_name);
        frame
    }

    /// Extract the full call chain of a sample, entry-first.
    ///
    /// The sample value is read from `values[value_index]`, 0 when the index
    /// is out of bounds; the percentage is against `total_value` (0 when the
    /// total is not positive).
    #[must_use]
    pub fn extract_call_chain(
        &self,
        sample: &Sample,
        value_index: usize,
        total_value: i64,
    ) -> CallChain {
        let mut chain = CallChain { sample_count: 1, ..CallChain::default() };

        chain.total_value = sample.values.get(value_index).copied().unwrap_or(0);
        if total_value > 0 {
            chain.total_pct = chain.total_value as f64 / total_value as f64 * 100.0;
        }

        // Locations are leaf-first on the wire; walk them in reverse so the
        // chain reads entry → leaf. Within a location, line entries are
        // innermost-first, so those are reversed too.
        let mut prev_category: Option<CodeCategory> = None;
        for location in sample.locations.iter().rev() {
            for line in location.lines.iter().rev() {
                let frame = self.extract_stack_frame(location, Some(line));

                *chain.category_breakdown.entry(frame.category).or_insert(0) += 1;

                let index = chain.frames.len();
                if index > 0 && prev_category != Some(frame.category) {
                    chain.boundary_points.push(index);
                }
                prev_category = Some(frame.category);

                chain.frames.push(frame);
            }
        }

        chain
    }

    /// Extract a call chain using the cumulative value column.
    ///
    /// CPU profiles carry `[samples, cpu-nanoseconds]`; the nanosecond column
    /// reflects business impact better than raw sample counts. Falls back to
    /// column 0 when the sample has a single column.
    #[must_use]
    pub fn extract_call_chain_cum(&self, sample: &Sample, total_value: i64) -> CallChain {
        let cum_index = if sample.values.len() > 1 { 1 } else { 0 };
        self.extract_call_chain(sample, cum_index, total_value)
    }
}

/// Index of the value column best suited for chain analysis: the column
/// typed `cpu` or measured in `nanoseconds`, else column 0.
#[must_use]
pub fn preferred_value_index(profile: &Profile) -> usize {
    for (i, st) in profile.sample_types.iter().enumerate() {
        if st.kind == "cpu" || st.unit == "nanoseconds" {
            return i;
        }
    }
    0
}
