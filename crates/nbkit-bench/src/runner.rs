//! Benchmark runner: registers a command matrix and executes one entry.
//!
//! Execution of entry `i`:
//!
//! 1. validate `i` against the registry size;
//! 2. fingerprint the environment facts found in the forwarded arguments and
//!    establish the matching [`ResultDirectory`];
//! 3. render the entry's command against its tag and that directory;
//! 4. append the forwarded arguments, print the command, run it and return
//!    its exit status.
//!
//! Steps 2-4 never happen for an invalid index or for `--info`.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser};
use thiserror::Error;

use crate::grid::ParameterGrid;
use crate::registry::{Command, CommandRegistry, Tag};
use crate::resultdir::{EnvironmentFacts, ResultDirectory};
use crate::template::{CommandTemplate, TemplateError};

/// Width of the printed command block.
const WRAP_WIDTH: usize = 80;
const WRAP_INDENT: &str = "    ";

/// Errors from executing a registered command.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error("input test index {index} must be in [0, {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Cannot prepare result directory under {}: {source}", base.display())]
    ResultDir {
        base: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Command {index}: {source}")]
    Template {
        index: usize,
        #[source]
        source: TemplateError,
    },

    #[error("Command {0} is empty")]
    EmptyCommand(usize),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write report: {0}")]
    Report(#[source] io::Error),
}

/// Arguments accepted by [`BenchmarkRunner::execute`].
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteArgs {
    /// Print out the registered commands and exit.
    #[arg(short, long)]
    pub info: bool,

    /// The integer number of the test to run.
    #[arg(allow_negative_numbers = true, required_unless_present = "info")]
    pub testno: Option<i64>,

    /// Arguments forwarded to the benchmark command (`--py`, `--tag`, ...).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub passthrough: Vec<String>,
}

impl ExecuteArgs {
    /// `-i/--info` given anywhere on the line, forwarded section included.
    pub fn wants_info(&self) -> bool {
        self.info || self.passthrough.iter().any(|a| a == "-i" || a == "--info")
    }
}

/// Command line of the `nbkit-bench` binary.
#[derive(Parser, Debug)]
#[command(name = "nbkit-bench")]
#[command(about = "Run one of a set of registered benchmark commands")]
#[command(
    long_about = "Run one of a set of registered benchmark commands.\n\n\
                  Arguments after the test number are passed to the benchmark command;\n\
                  --py and --tag also select the result directory."
)]
#[command(version)]
pub struct BenchCli {
    /// Benchmark matrix file.
    #[arg(short, long, default_value = "bench.toml")]
    pub matrix: PathBuf,

    #[command(flatten)]
    pub exec: ExecuteArgs,
}

/// Registers benchmark commands and runs them reproducibly.
#[derive(Debug, Clone)]
pub struct BenchmarkRunner {
    test_path: String,
    result_dir: PathBuf,
    template: CommandTemplate,
    host_env: Option<String>,
    registry: CommandRegistry,
}

impl BenchmarkRunner {
    /// Runner for the test module at `test_path`, storing results under
    /// `result_dir`.
    pub fn new(test_path: &str, result_dir: impl Into<PathBuf>) -> Self {
        Self {
            test_path: test_path.into(),
            result_dir: result_dir.into(),
            template: CommandTemplate::benchmark_default(),
            host_env: Some("NERSC_HOST".into()),
            registry: CommandRegistry::new(),
        }
    }

    /// Template used by [`add_commands`](Self::add_commands).
    pub fn with_template(mut self, template: CommandTemplate) -> Self {
        self.template = template;
        self
    }

    /// Environment variable holding the host name; `None` records no host.
    pub fn with_host_env(mut self, host_env: Option<String>) -> Self {
        self.host_env = host_env;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    pub fn register(&mut self, command: Command, tag: Tag) -> usize {
        self.registry.register(command, tag)
    }

    /// Register one templated command per combination of test name, core
    /// count and (if any) sample. Returns the number of commands added.
    pub fn add_commands<S, T>(&mut self, testnames: &[S], ncores: &[u32], samples: &[T]) -> usize
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        if testnames.is_empty() || ncores.is_empty() {
            return 0;
        }
        let grid = ParameterGrid::new()
            .with("testname", testnames.iter().map(|s| s.as_ref()))
            .with("ncores", ncores.iter().copied())
            .with("sample", samples.iter().map(|s| s.as_ref()));

        let before = self.registry.len();
        grid.for_each(|combo| {
            let mut tag = Tag::new();
            for key in ["testname", "ncores", "sample"] {
                if let Some(value) = combo.get(key) {
                    tag.insert(key.to_string(), value.clone());
                }
            }
            self.registry
                .register(Command::Deferred(self.template.clone()), tag);
        });
        let added = self.registry.len() - before;
        log::debug!("registered {} command(s) for {}", added, self.test_path);
        added
    }

    /// Placeholder values for rendering entry `tag` into `result_dir`.
    fn template_vars(&self, tag: &Tag, result_dir: &Path) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> =
            tag.iter().map(|(k, v)| (k.clone(), v.to_string())).collect();
        vars.insert("test_path".into(), self.test_path.clone());
        vars.insert("result_dir".into(), result_dir.display().to_string());

        if let Some(testname) = tag.get("testname") {
            vars.insert("bench_name".into(), format!("{}::{}", self.test_path, testname));
        }
        if let Some(ncores) = tag.get("ncores") {
            let dir = match tag.get("sample") {
                Some(sample) => result_dir.join(sample.to_string()).join(ncores.to_string()),
                None => result_dir.join(ncores.to_string()),
            };
            vars.insert("bench_dir".into(), dir.display().to_string());
        }
        vars
    }

    /// Argument vector of entry `index` with results going to `result_dir`.
    pub fn materialize(&self, index: usize, result_dir: &Path) -> Result<Vec<String>, BenchError> {
        let entry = self.registry.get(index).ok_or(BenchError::IndexOutOfRange {
            index: index as i64,
            len: self.registry.len(),
        })?;
        let argv = match &entry.command {
            Command::Literal(argv) => argv.clone(),
            Command::Deferred(template) => template
                .render(&self.template_vars(&entry.tag, result_dir))
                .map_err(|source| BenchError::Template { index, source })?,
        };
        if argv.first().map_or(true, String::is_empty) {
            return Err(BenchError::EmptyCommand(index));
        }
        Ok(argv)
    }

    fn validate_index(&self, testno: i64) -> Result<usize, BenchError> {
        let len = self.registry.len();
        usize::try_from(testno)
            .ok()
            .filter(|&i| i < len)
            .ok_or(BenchError::IndexOutOfRange { index: testno, len })
    }

    /// Parse `args` (program name first) and execute, reporting to stdout.
    pub fn execute_from<I, A>(&self, args: I) -> Result<i32, BenchError>
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString> + Clone,
    {
        let cli = BenchCli::try_parse_from(args)?;
        self.execute(&cli.exec, &mut io::stdout())
    }

    /// Run the selected entry and return its exit status.
    ///
    /// With `--info` the registered commands are listed instead and nothing
    /// is created or spawned.
    pub fn execute(&self, args: &ExecuteArgs, out: &mut dyn Write) -> Result<i32, BenchError> {
        if args.wants_info() {
            self.registry.write_info(out).map_err(BenchError::Report)?;
            return Ok(0);
        }

        let index = self.validate_index(args.testno.unwrap_or(-1))?;

        let host = self
            .host_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        let facts = EnvironmentFacts::from_args(&args.passthrough, host);
        let dir = ResultDirectory::establish(&self.result_dir, &facts).map_err(|source| {
            BenchError::ResultDir {
                base: self.result_dir.clone(),
                source,
            }
        })?;

        let mut argv = self.materialize(index, &dir.path)?;
        argv.extend(args.passthrough.iter().cloned());

        writeln!(out, "executing:\n{}", wrap_command(&argv)).map_err(BenchError::Report)?;
        out.flush().map_err(BenchError::Report)?;

        log::info!("running command {} in {}", index, dir.path.display());
        let status = process::Command::new(&argv[0])
            .args(&argv[1..])
            .status()
            .map_err(|source| BenchError::Spawn {
                program: argv[0].clone(),
                source,
            })?;
        if !status.success() {
            log::warn!("command {} exited with {}", index, status);
        }
        Ok(status.code().unwrap_or(1))
    }
}

/// Single-quote `arg` when it would not read back as one word.
fn quote_arg(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && !arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"' || c == '\\');
    if plain {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}

/// Greedy wrap of `argv` at 80 columns with a 4-space indent.
///
/// Each argument is one word (quoted when needed). Words longer than a
/// full line are broken across lines.
pub fn wrap_command(argv: &[String]) -> String {
    let indent = WRAP_INDENT.chars().count();
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::from(WRAP_INDENT);
    let mut len = indent;

    for word in argv.iter().map(|a| quote_arg(a)) {
        let mut rest: &str = &word;
        while !rest.is_empty() {
            let sep = usize::from(len > indent);
            let room = WRAP_WIDTH.saturating_sub(len + sep);
            let width = rest.chars().count();
            if width <= room {
                if sep == 1 {
                    line.push(' ');
                }
                line.push_str(rest);
                len += sep + width;
                break;
            }
            if sep == 1 && (width <= WRAP_WIDTH - indent || room == 0) {
                lines.push(std::mem::replace(&mut line, String::from(WRAP_INDENT)));
                len = indent;
                continue;
            }
            let split = rest.char_indices().nth(room).map_or(rest.len(), |(i, _)| i);
            if sep == 1 {
                line.push(' ');
            }
            line.push_str(&rest[..split]);
            lines.push(std::mem::replace(&mut line, String::from(WRAP_INDENT)));
            len = indent;
            rest = &rest[split..];
        }
    }
    if len > indent {
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridValue;

    fn runner(dir: &Path) -> BenchmarkRunner {
        BenchmarkRunner::new("benchmarks/test_fft.py", dir).with_host_env(None)
    }

    #[test]
    fn test_add_commands_with_samples() {
        let mut r = runner(Path::new("results"));
        let added = r.add_commands(&["a", "b"], &[4], &["s1"]);
        assert_eq!(added, 2);

        let argv = r.materialize(0, Path::new("results/abc")).unwrap();
        let joined = argv.join(" ");
        assert!(joined.contains("benchmarks/test_fft.py::a"));
        assert!(joined.contains("s1/4"), "{joined}");
        assert!(joined.ends_with("--sample s1"));

        let tag = &r.registry().get(1).unwrap().tag;
        assert_eq!(tag.keys().collect::<Vec<_>>(), vec!["testname", "ncores", "sample"]);
        assert_eq!(tag["testname"], GridValue::from("b"));
    }

    #[test]
    fn test_add_commands_without_samples() {
        let mut r = runner(Path::new("results"));
        assert_eq!(r.add_commands(&["a"], &[1, 2], &[] as &[&str]), 2);
        let argv = r.materialize(1, Path::new("results/abc")).unwrap();
        assert_eq!(argv[4], Path::new("results/abc").join("2").display().to_string());
        assert!(!argv.contains(&"--sample".to_string()));
        assert!(!r.registry().get(1).unwrap().tag.contains_key("sample"));
    }

    #[test]
    fn test_empty_required_lists_register_nothing() {
        let mut r = runner(Path::new("results"));
        assert_eq!(r.add_commands(&[] as &[&str], &[1], &["s"]), 0);
        assert_eq!(r.add_commands(&["a"], &[], &["s"]), 0);
        assert!(r.registry().is_empty());
    }

    #[test]
    fn test_literal_commands_are_used_verbatim() {
        let mut r = runner(Path::new("results"));
        r.register(Command::Literal(vec!["echo".into(), "{not_a_field}".into()]), Tag::new());
        assert_eq!(r.materialize(0, Path::new("x")).unwrap(), vec!["echo", "{not_a_field}"]);
    }

    #[test]
    fn test_wants_info_anywhere() {
        let args = ExecuteArgs {
            info: false,
            testno: Some(0),
            passthrough: vec!["--py".into(), "3.6".into(), "-i".into()],
        };
        assert!(args.wants_info());
    }

    #[test]
    fn test_wrap_command() {
        let argv: Vec<String> = (0..30).map(|i| format!("arg{i:02}")).collect();
        let wrapped = wrap_command(&argv);
        for line in wrapped.lines() {
            assert!(line.starts_with(WRAP_INDENT));
            assert!(line.len() <= WRAP_WIDTH);
        }
        assert_eq!(wrapped.split_whitespace().count(), 30);
        assert_eq!(wrap_command(&["python".into()]), "    python");
    }

    #[test]
    fn test_wrap_command_quotes_arguments_with_spaces() {
        let argv: Vec<String> = vec!["sh".into(), "-c".into(), "mkdir -p out".into(), "it's".into()];
        assert_eq!(wrap_command(&argv), r#"    sh -c 'mkdir -p out' 'it'\''s'"#);
    }

    #[test]
    fn test_wrap_command_breaks_long_words() {
        let long = "x".repeat(200);
        let wrapped = wrap_command(&["run".into(), long.clone()]);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert!(lines.len() >= 3);
        for line in &lines {
            assert!(line.starts_with(WRAP_INDENT));
            assert!(line.chars().count() <= WRAP_WIDTH, "{line}");
        }
        let rejoined: String = lines.iter().map(|l| l.trim_start()).collect::<Vec<_>>().join(" ");
        assert_eq!(rejoined.replace(' ', ""), format!("run{long}"));
    }

    fn parse(argv: &[&str]) -> BenchCli {
        BenchCli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_unknown_arguments_are_forwarded_verbatim() {
        let cli = parse(&["nbkit-bench", "-m", "b.toml", "3", "--py", "3.6", "--tag=v1", "-n", "4"]);
        assert_eq!(cli.matrix, PathBuf::from("b.toml"));
        assert_eq!(cli.exec.testno, Some(3));
        assert!(!cli.exec.wants_info());
        assert_eq!(cli.exec.passthrough, vec!["--py", "3.6", "--tag=v1", "-n", "4"]);

        let facts = EnvironmentFacts::from_args(&cli.exec.passthrough, None);
        assert_eq!(facts.python_version.as_deref(), Some("3.6"));
        assert_eq!(facts.git_tag.as_deref(), Some("v1"));
        assert_eq!(facts.host, None);
    }

    #[test]
    fn test_info_after_index_and_defaults() {
        let cli = parse(&["nbkit-bench", "0", "-i"]);
        assert_eq!(cli.exec.testno, Some(0));
        assert!(cli.exec.wants_info());

        let cli = parse(&["nbkit-bench", "--info"]);
        assert!(cli.exec.info && cli.exec.testno.is_none());
        assert_eq!(cli.matrix, PathBuf::from("bench.toml"));

        let cli = parse(&["nbkit-bench", "-1"]);
        assert_eq!(cli.exec.testno, Some(-1));
    }
}
