//! Ready-to-run `go tool pprof` command lines for a problem context.
//!
//! Every command carries a description and a hint for reading its output,
//! so the operator can follow the diagnosis without knowing pprof flags by
//! heart.

use std::path::PathBuf;

use super::{ExecutableCmd, HotPath};
use crate::domain::ProfileKind;

/// Function-name fragments that indicate a goroutine is parked on a
/// blocking primitive.
const BLOCKING_PATTERNS: &[&str] =
    &["chansend", "chanrecv", "select", "semacquire", "Lock", "RLock", "Wait", "Sleep"];

/// Builds pprof command lines tailored to a profile type and its hot paths.
#[derive(Debug, Default)]
pub struct CommandGenerator;

impl CommandGenerator {
    #[must_use]
    pub fn new() -> CommandGenerator {
        CommandGenerator
    }

    /// Generate the command set for one finding.
    ///
    /// The first supplied path is the primary analysis target; with two or
    /// more paths a diff command against the last one is appended. Without
    /// any path a `./<type>.pprof` placeholder is used.
    #[must_use]
    pub fn generate(
        &self,
        profile_paths: &[PathBuf],
        kind: ProfileKind,
        hot_paths: &[HotPath],
    ) -> Vec<ExecutableCmd> {
        let primary = profile_paths
            .first()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("./{}.pprof", kind.as_str()));

        let mut commands = vec![self.top_command(&primary)];

        match kind {
            ProfileKind::Heap => {
                commands.push(self.alloc_space_command(&primary));
                commands.push(self.inuse_space_command(&primary));
            }
            ProfileKind::Goroutine => {
                // Focus on the first blocking root cause, if any.
                for path in hot_paths {
                    if let Some(root_cause) = path.root_cause() {
                        if is_blocking_function(&root_cause.function_name) {
                            commands.push(self.focus_command(&primary, &root_cause.short_name));
                            break;
                        }
                    }
                }
            }
            _ => {}
        }

        if let Some(root_cause) = hot_paths.first().and_then(HotPath::root_cause) {
            let short = short_function_name(&root_cause.short_name);
            if !contains_focus_command(&commands, short) {
                commands.push(self.focus_command(&primary, &root_cause.short_name));
            }
            commands.push(self.list_command(&primary, &root_cause.short_name));
        }

        if profile_paths.len() >= 2 {
            let base = profile_paths[0].display().to_string();
            let target = profile_paths[profile_paths.len() - 1].display().to_string();
            commands.push(self.diff_command(&base, &target));
        }

        commands.push(self.web_command(&primary));
        commands
    }

    fn top_command(&self, profile_path: &str) -> ExecutableCmd {
        ExecutableCmd {
            command: format!("go tool pprof -top {profile_path}"),
            description: "List the functions consuming the most resources".to_string(),
            output_hint: "The flat column is the function's own cost; cum includes everything \
                          it calls"
                .to_string(),
        }
    }

    fn focus_command(&self, profile_path: &str, function_name: &str) -> ExecutableCmd {
        let short = short_function_name(function_name);
        ExecutableCmd {
            command: format!("go tool pprof -focus={short} {profile_path}"),
            description: format!("Show only call paths that go through {short}"),
            output_hint: "Restricting the graph to one function makes its calling context \
                          easy to follow"
                .to_string(),
        }
    }

    fn list_command(&self, profile_path: &str, function_name: &str) -> ExecutableCmd {
        let short = short_function_name(function_name);
        ExecutableCmd {
            command: format!("go tool pprof -list={short} {profile_path}"),
            description: format!("Annotate the source of {short} line by line"),
            output_hint: "Each source line shows its own cost, pinpointing the expensive \
                          statements"
                .to_string(),
        }
    }

    fn alloc_space_command(&self, profile_path: &str) -> ExecutableCmd {
        ExecutableCmd {
            command: format!("go tool pprof -alloc_space {profile_path}"),
            description: "Rank functions by cumulative allocation".to_string(),
            output_hint: "High alloc_space with low inuse_space means churn; high both ways \
                          means retained memory"
                .to_string(),
        }
    }

    fn inuse_space_command(&self, profile_path: &str) -> ExecutableCmd {
        ExecutableCmd {
            command: format!("go tool pprof -inuse_space {profile_path}"),
            description: "Rank functions by memory still in use".to_string(),
            output_hint: "Functions that dominate inuse_space hold on to memory; candidates \
                          for a leak"
                .to_string(),
        }
    }

    fn diff_command(&self, base_path: &str, target_path: &str) -> ExecutableCmd {
        ExecutableCmd {
            command: format!("go tool pprof -base={base_path} {target_path}"),
            description: "Diff the newest profile against the oldest".to_string(),
            output_hint: "Positive values grew between the two snapshots; negative values \
                          shrank"
                .to_string(),
        }
    }

    fn web_command(&self, profile_path: &str) -> ExecutableCmd {
        ExecutableCmd {
            command: format!("go tool pprof -http=:8080 {profile_path}"),
            description: "Open the interactive flame graph and call graph in a browser"
                .to_string(),
            output_hint: "The web UI supports flame graphs, call graphs, and source views"
                .to_string(),
        }
    }
}

/// Returns true if the function name looks like a blocking primitive.
#[must_use]
pub fn is_blocking_function(function_name: &str) -> bool {
    BLOCKING_PATTERNS.iter().any(|pattern| function_name.contains(pattern))
}

fn contains_focus_command(commands: &[ExecutableCmd], short_name: &str) -> bool {
    let needle = format!("-focus={short_name}");
    commands.iter().any(|cmd| cmd.command.contains(&needle))
}

/// Shorten a function name to the part `go tool pprof -focus` matches on.
///
/// Method receivers are stripped (`(*Pool).Get` → `Get`), but anonymous
/// functions keep their parent prefix (`createWorker.func1` stays intact)
/// because the bare `func1` would match everything.
#[must_use]
pub fn short_function_name(function_name: &str) -> &str {
    if function_name.is_empty() {
        return function_name;
    }
    if is_anonymous_function(function_name) {
        return anonymous_short_name(function_name);
    }

    // Last '.' outside parentheses separates the method name.
    let bytes = function_name.as_bytes();
    let mut depth = 0i32;
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => depth -= 1,
            b'.' if depth == 0 => {
                if i + 1 < function_name.len() {
                    return &function_name[i + 1..];
                }
                return function_name;
            }
            _ => {}
        }
    }
    function_name
}

/// Anonymous functions end in `.func<digits>` chains or bare `.<digits>`
/// suffixes.
fn is_anonymous_function(function_name: &str) -> bool {
    if function_name.contains(".func") {
        return true;
    }
    let bytes = function_name.as_bytes();
    if bytes.last().is_some_and(u8::is_ascii_digit) {
        for &c in bytes.iter().rev() {
            if c == b'.' {
                return true;
            }
            if !c.is_ascii_digit() {
                break;
            }
        }
    }
    false
}

/// Keep the parent function prefix of an anonymous function so the name
/// stays selective in `-focus`.
fn anonymous_short_name(function_name: &str) -> &str {
    let Some(func_index) = function_name.find(".func") else {
        return after_package(function_name);
    };

    let bytes = function_name.as_bytes();
    let mut depth = 0i32;
    let mut start = 0;
    for i in (0..func_index).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => depth -= 1,
            b'.' if depth == 0 => {
                let prefix = &function_name[..i];
                if prefix.contains('/') || prefix == "main" || prefix == "runtime" {
                    start = i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if start >= function_name.len() {
        function_name
    } else {
        &function_name[start..]
    }
}

/// Strip everything up to and including the package qualifier.
fn after_package(function_name: &str) -> &str {
    if let Some(slash) = function_name.rfind('/') {
        let rest = &function_name[slash + 1..];
        match rest.find('.') {
            Some(dot) => &rest[dot + 1..],
            None => rest,
        }
    } else {
        match function_name.find('.') {
            Some(dot) => &function_name[dot + 1..],
            None => function_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{CallChain, CodeCategory, StackFrame};

    fn business_path(function_name: &str) -> HotPath {
        let frame = StackFrame {
            function_name: function_name.to_string(),
            short_name: crate::locator::extractor::extract_short_name(function_name).to_string(),
            category: CodeCategory::Business,
            ..StackFrame::unresolved()
        };
        HotPath {
            chain: CallChain { frames: vec![frame], ..CallChain::default() },
            business_frames: vec![0],
            root_cause_index: Some(0),
            profile_kind: ProfileKind::Cpu,
        }
    }

    #[test]
    fn test_short_function_name_plain() {
        assert_eq!(short_function_name("handleRequest"), "handleRequest");
        assert_eq!(short_function_name("main.handleRequest"), "handleRequest");
    }

    #[test]
    fn test_short_function_name_method_receiver() {
        assert_eq!(short_function_name("(*Type).Method"), "Method");
        assert_eq!(short_function_name("pkg.(*Server).handle"), "handle");
    }

    #[test]
    fn test_short_function_name_anonymous_keeps_parent() {
        assert_eq!(short_function_name("createWorker.func1"), "createWorker.func1");
        assert_eq!(short_function_name("main.createWorker.func1"), "createWorker.func1");
        assert_eq!(short_function_name("main.init.0.func1.1"), "init.0.func1.1");
        assert_eq!(
            short_function_name("github.com/acme/app.(*Server).handle.func2"),
            "handle.func2"
        );
    }

    #[test]
    fn test_is_blocking_function() {
        assert!(is_blocking_function("runtime.chansend1"));
        assert!(is_blocking_function("sync.(*Mutex).Lock"));
        assert!(is_blocking_function("sync.(*WaitGroup).Wait"));
        assert!(is_blocking_function("time.Sleep"));
        assert!(!is_blocking_function("main.compute"));
    }

    #[test]
    fn test_commands_always_start_with_pprof() {
        let paths = vec![PathBuf::from("heap1.pprof")];
        let commands = CommandGenerator::new().generate(
            &paths,
            ProfileKind::Heap,
            &[business_path("main.buildCache")],
        );
        for cmd in &commands {
            assert!(cmd.command.starts_with("go tool pprof"), "bad command: {}", cmd.command);
            assert!(cmd.command.contains("heap1.pprof"));
            assert!(!cmd.description.is_empty());
            assert!(!cmd.output_hint.is_empty());
        }
    }

    #[test]
    fn test_heap_commands_include_alloc_and_inuse() {
        let paths = vec![PathBuf::from("heap1.pprof")];
        let commands = CommandGenerator::new().generate(&paths, ProfileKind::Heap, &[]);
        assert!(commands.iter().any(|c| c.command.contains("-alloc_space")));
        assert!(commands.iter().any(|c| c.command.contains("-inuse_space")));
    }

    #[test]
    fn test_root_cause_adds_focus_and_list() {
        let paths = vec![PathBuf::from("cpu.pprof")];
        let commands = CommandGenerator::new().generate(
            &paths,
            ProfileKind::Cpu,
            &[business_path("app/handler.H")],
        );
        assert!(commands.iter().any(|c| c.command.contains("-focus=H")));
        assert!(commands.iter().any(|c| c.command.contains("-list=H")));
    }

    #[test]
    fn test_goroutine_blocking_focus_not_duplicated() {
        let paths = vec![PathBuf::from("goroutine.pprof")];
        let commands = CommandGenerator::new().generate(
            &paths,
            ProfileKind::Goroutine,
            &[business_path("main.waitForever.Wait")],
        );
        let focus_count =
            commands.iter().filter(|c| c.command.contains("-focus=")).count();
        assert_eq!(focus_count, 1, "duplicate focus commands: {commands:?}");
    }

    #[test]
    fn test_diff_command_with_two_paths() {
        let paths = vec![PathBuf::from("heap1.pprof"), PathBuf::from("heap3.pprof")];
        let commands = CommandGenerator::new().generate(&paths, ProfileKind::Heap, &[]);
        let diff = commands.iter().find(|c| c.command.contains("-base=")).unwrap();
        assert!(diff.command.contains("-base=heap1.pprof"));
        assert!(diff.command.ends_with("heap3.pprof"));
    }

    #[test]
    fn test_placeholder_path_when_none_supplied() {
        let commands = CommandGenerator::new().generate(&[], ProfileKind::Cpu, &[]);
        assert!(commands.iter().all(|c| c.command.contains("./cpu.pprof")));
    }
}
