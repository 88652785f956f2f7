//! Rank-aware command-line dispatch.
//!
//! Every rank of a group runs the same control flow: arguments are parsed
//! and validated identically everywhere, so all ranks reach the same exit
//! status at the same point. Only the primary rank writes help, listings,
//! version and usage errors; the others stay silent through their
//! [`Console`].

use std::fs;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use thiserror::Error;

use nbkit_core::{Category, Console, GroupTopology, PluginError, Registry, RegistryError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Cannot read configuration file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no output destination: pass -o/--output or set 'output' in the configuration")]
    MissingOutput,

    #[error("Failed to write to the console: {0}")]
    Console(#[source] std::io::Error),
}

/// How a dispatch ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Help, listing, version or usage error: terminate with this status.
    Exit(i32),
    /// The algorithm ran and its result was saved to `output`.
    Completed { output: String },
}

#[derive(Parser, Debug)]
#[command(name = "nbkit")]
#[command(about = "Run an algorithm from a configuration file")]
#[command(
    long_about = "Run an algorithm from a configuration file.\n\n\
                  Pass an algorithm name with -h to see its parameters."
)]
#[command(version, disable_help_flag = true)]
pub struct Cli {
    /// The output file name, overriding `output` in the configuration.
    #[arg(short, long)]
    pub output: Option<String>,

    /// The name of the algorithm to run.
    #[arg(value_name = "ALGORITHM_NAME")]
    pub algorithm_name: Option<String>,

    /// Print help, or the algorithm's parameters when a name is given.
    #[arg(short = 'h', long, action = ArgAction::SetTrue)]
    pub help: bool,

    /// Plugin manifest, or a directory of `*.toml` manifests, to load.
    #[arg(short = 'X', value_name = "PATH", action = ArgAction::Append)]
    pub extensions: Vec<PathBuf>,

    /// Configuration file, or the configuration text itself.
    #[arg(short, long, value_name = "CONFIG")]
    pub config: Option<String>,

    /// List the data sources, or describe the named ones.
    #[arg(long, num_args = 0.., value_name = "NAME")]
    pub list_datasources: Option<Vec<String>>,

    /// List the algorithms, or describe the named ones.
    #[arg(long, num_args = 0.., value_name = "NAME")]
    pub list_algorithms: Option<Vec<String>>,

    /// List the transfer functions, or describe the named ones.
    #[arg(long, num_args = 0.., value_name = "NAME")]
    pub list_transfers: Option<Vec<String>>,

    /// List the painters, or describe the named ones.
    #[arg(long, num_args = 0.., value_name = "NAME")]
    pub list_painters: Option<Vec<String>>,
}

impl Cli {
    fn listed(&self, category: Category) -> Option<&[String]> {
        match category {
            Category::DataSource => self.list_datasources.as_deref(),
            Category::Algorithm => self.list_algorithms.as_deref(),
            Category::Transfer => self.list_transfers.as_deref(),
            Category::Painter => self.list_painters.as_deref(),
        }
    }

    /// The first listing flag given, with its names.
    fn listing(&self) -> Option<(Category, &[String])> {
        Category::ALL
            .into_iter()
            .find_map(|category| self.listed(category).map(|names| (category, names)))
    }
}

/// Registered names of `category` with their summaries.
pub fn format_listing(registry: &Registry, category: Category) -> String {
    let entries: Vec<_> = registry.entries(category).collect();
    let mut text = format!("{}:", category.plural());
    if entries.is_empty() {
        text.push_str("\n  (none)");
    }
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for entry in entries {
        text.push_str(&format!("\n  {:<width$}  {}", entry.name, entry.summary));
    }
    text
}

/// Configuration text from `source`: the file's contents if it names an
/// existing path, otherwise `source` itself.
pub fn config_source(source: &str) -> Result<String, DispatchError> {
    let path = Path::new(source);
    if path.is_file() {
        fs::read_to_string(path).map_err(|e| DispatchError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })
    } else {
        Ok(source.to_string())
    }
}

/// Render a clap error (or help/version request) on the primary rank and
/// return the status every rank exits with.
fn report(err: clap::Error, console: &mut Console<'_>) -> Result<Outcome, DispatchError> {
    let text = err.render().to_string();
    if err.use_stderr() {
        console.eprint(&text).map_err(DispatchError::Console)?;
    } else {
        console.println(text.trim_end()).map_err(DispatchError::Console)?;
    }
    Ok(Outcome::Exit(err.exit_code()))
}

fn usage_error(kind: ErrorKind, message: impl std::fmt::Display) -> clap::Error {
    Cli::command().error(kind, message)
}

/// Parse `args` (program name first) and run the selected algorithm.
///
/// Manifests named with `-X` are loaded into `registry` before any name is
/// resolved.
pub fn dispatch<I, A>(
    args: I,
    registry: &mut Registry,
    topology: &GroupTopology,
    console: &mut Console<'_>,
) -> Result<Outcome, DispatchError>
where
    I: IntoIterator<Item = A>,
    A: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => return report(err, console),
    };

    for path in &cli.extensions {
        registry.load_path(path)?;
    }

    if let Some((category, names)) = cli.listing() {
        let mut text = Vec::new();
        if names.is_empty() {
            text.push(format_listing(registry, category));
        }
        for name in names {
            match registry.format_help(category, name) {
                Ok(help) => text.push(help.trim_end().to_string()),
                Err(err) => return report(usage_error(ErrorKind::InvalidValue, err), console),
            }
        }
        console.println(&text.join("\n\n")).map_err(DispatchError::Console)?;
        return Ok(Outcome::Exit(0));
    }

    if cli.help {
        let help = match &cli.algorithm_name {
            Some(name) => match registry.format_help(Category::Algorithm, name) {
                Ok(help) => help,
                Err(err) => return report(usage_error(ErrorKind::InvalidValue, err), console),
            },
            None => Cli::command().render_help().to_string(),
        };
        console.println(help.trim_end()).map_err(DispatchError::Console)?;
        return Ok(Outcome::Exit(0));
    }

    let Some(name) = cli.algorithm_name else {
        return report(
            usage_error(
                ErrorKind::MissingRequiredArgument,
                "the following required arguments were not provided: <ALGORITHM_NAME>",
            ),
            console,
        );
    };
    if let Err(err) = registry.lookup(Category::Algorithm, &name) {
        return report(usage_error(ErrorKind::InvalidValue, err), console);
    }
    let Some(config) = cli.config else {
        return report(
            usage_error(
                ErrorKind::MissingRequiredArgument,
                "the following required arguments were not provided: --config <CONFIG>",
            ),
            console,
        );
    };

    let text = config_source(&config)?;
    let (params, extra) = registry.parse_known_yaml(&name, &text)?;
    if !extra.is_empty() {
        log::debug!(
            "extra configuration fields: {}",
            extra.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>().join(", ")
        );
    }
    let output = cli
        .output
        .or_else(|| extra.get_str("output").map(str::to_string))
        .ok_or(DispatchError::MissingOutput)?;

    let algorithm = registry.instantiate(&name, &params, topology)?;
    log::info!("running {} on {} rank(s)", name, topology.size);
    let result = algorithm.run()?;
    algorithm.save(&output, &result)?;
    Ok(Outcome::Completed { output })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_flag_without_names() {
        let cli = Cli::try_parse_from(["nbkit", "--list-algorithms"]).unwrap();
        assert_eq!(cli.listing(), Some((Category::Algorithm, &[][..])));
        let cli = Cli::try_parse_from(["nbkit", "--list-painters", "A", "B"]).unwrap();
        let (category, names) = cli.listing().unwrap();
        assert_eq!(category, Category::Painter);
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_repeated_extensions() {
        let cli = Cli::try_parse_from(["nbkit", "-X", "a.toml", "-X", "plugins", "-c", "x: 1", "Describe"])
            .unwrap();
        assert_eq!(cli.extensions, vec![PathBuf::from("a.toml"), PathBuf::from("plugins")]);
        assert_eq!(cli.algorithm_name.as_deref(), Some("Describe"));
        assert_eq!(cli.config.as_deref(), Some("x: 1"));
    }

    #[test]
    fn test_format_listing() {
        let registry = Registry::with_builtins();
        let text = format_listing(&registry, Category::Algorithm);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Algorithms:");
        assert!(lines[1].starts_with("  Describe   "));
        assert!(lines[2].starts_with("  Histogram  "));
        assert_eq!(format_listing(&registry, Category::Painter), "Painters:\n  (none)");
    }

    #[test]
    fn test_config_source_prefers_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.yaml");
        fs::write(&path, "bins: 3\n").unwrap();
        assert_eq!(config_source(path.to_str().unwrap()).unwrap(), "bins: 3\n");
        assert_eq!(config_source("bins: 4").unwrap(), "bins: 4");
    }
}
