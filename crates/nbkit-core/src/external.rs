//! Algorithms implemented by external executables.
//!
//! The executable receives its validated parameters as a JSON object on
//! stdin and writes its result to stdout, as JSON if it can. Anything that
//! does not parse as JSON is kept verbatim as a JSON string.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::Value;

use crate::algorithms::write_json;
use crate::params::Params;
use crate::plugin::{Algorithm, AlgorithmResult, PluginError};
use crate::topology::Role;

/// Program and fixed arguments of an external plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    /// Build from an argv list. A relative program path containing a
    /// separator is resolved against `base`, the manifest's directory.
    pub fn from_argv(argv: &[String], base: &Path) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.is_empty() {
            return None;
        }
        let program_path = Path::new(program);
        let program = if program_path.is_relative() && program_path.components().count() > 1 {
            base.join(program_path).display().to_string()
        } else {
            program.clone()
        };
        Some(Self {
            program,
            args: args.to_vec(),
        })
    }
}

/// A runnable external algorithm instance.
pub struct ExternalAlgorithm {
    name: String,
    command: ExternalCommand,
    params: Params,
    role: Role,
}

impl ExternalAlgorithm {
    pub fn new(name: &str, command: ExternalCommand, params: Params, role: Role) -> Self {
        Self {
            name: name.into(),
            command,
            params,
            role,
        }
    }

    fn failure(&self, message: String) -> PluginError {
        PluginError::External {
            name: self.name.clone(),
            message,
        }
    }
}

impl Algorithm for ExternalAlgorithm {
    fn run(&self) -> Result<AlgorithmResult, PluginError> {
        log::info!("running external plugin '{}': {}", self.name, self.command.program);

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(format!("cannot start '{}': {}", self.command.program, e)))?;

        let input = serde_json::to_vec(&self.params.to_json())
            .map_err(|e| self.failure(format!("cannot encode parameters: {}", e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A plugin may exit without reading its parameters.
            match stdin.write_all(&input) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(self.failure(format!("cannot write parameters: {}", e)));
                }
                _ => {}
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.failure(format!("wait failed: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!("{} ({})", output.status, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(serde_json::from_str(&stdout).unwrap_or_else(|_| Value::String(stdout.trim().to_string())))
    }

    fn save(&self, output: &str, result: &AlgorithmResult) -> Result<(), PluginError> {
        if !self.role.is_primary() {
            return Ok(());
        }
        write_json(output, result)?;
        log::info!("result of '{}' written to {}", self.name, output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_program_is_left_for_path_lookup() {
        let cmd = ExternalCommand::from_argv(&["python".into(), "a.py".into()], Path::new("/plugins")).unwrap();
        assert_eq!(cmd.program, "python");
        assert_eq!(cmd.args, vec!["a.py".to_string()]);
    }

    #[test]
    fn test_empty_argv_is_rejected() {
        assert!(ExternalCommand::from_argv(&[], Path::new(".")).is_none());
        assert!(ExternalCommand::from_argv(&[String::new()], Path::new(".")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_parses_json_stdout() {
        let cmd = ExternalCommand {
            program: "sh".into(),
            args: vec!["-c".into(), "cat >/dev/null; echo '{\"power\": [1, 2]}'".into()],
        };
        let alg = ExternalAlgorithm::new("Echo", cmd, Params::default(), Role::Primary);
        let result = alg.run().unwrap();
        assert_eq!(result["power"][1], 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_failure() {
        let cmd = ExternalCommand {
            program: "sh".into(),
            args: vec!["-c".into(), "echo broken >&2; exit 3".into()],
        };
        let alg = ExternalAlgorithm::new("Broken", cmd, Params::default(), Role::Primary);
        let err = alg.run().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_save_skipped_on_suppressed_rank() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("result.json");
        let cmd = ExternalCommand { program: "true".into(), args: vec![] };
        let alg = ExternalAlgorithm::new("X", cmd, Params::default(), Role::Suppressed);
        alg.save(out.to_str().unwrap(), &Value::Null).unwrap();
        assert!(!out.exists());
    }
}
