//! Content-addressed result directories.
//!
//! Results for a benchmark matrix live under `<base>/<id>`, where `<id>` is
//! the [`fingerprint`](crate::fingerprint::fingerprint) of the
//! [`EnvironmentFacts`] the run was made with. Runs with identical facts
//! share a directory; any difference in host, interpreter version or source
//! revision gets a fresh one.
//!
//! The facts are recorded once in `<base>/<id>/config.json`. The record is
//! opened with create-new semantics: the first writer wins and later or
//! concurrent runs leave it untouched.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::fingerprint::{fingerprint, ordered_json};

/// File name of the environment record inside a result directory.
pub const RECORD_FILE: &str = "config.json";

/// Facts identifying the environment a benchmark runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFacts {
    pub host: Option<String>,
    pub python_version: Option<String>,
    pub git_tag: Option<String>,
}

impl EnvironmentFacts {
    /// Extract `--py` and `--tag` from forwarded benchmark arguments.
    ///
    /// Both `--py 3.6` and `--py=3.6` are accepted; the last occurrence wins.
    pub fn from_args(args: &[String], host: Option<String>) -> Self {
        let mut facts = Self {
            host,
            ..Self::default()
        };

        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value.to_string())),
                None => (arg.as_str(), None),
            };
            let slot = match flag {
                "--py" => &mut facts.python_version,
                "--tag" => &mut facts.git_tag,
                _ => continue,
            };
            let value = match inline {
                Some(v) => Some(v),
                None => iter.next_if(|next| !next.starts_with("--")).cloned(),
            };
            if value.is_some() {
                *slot = value;
            }
        }
        facts
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "host": self.host,
            "python_version": self.python_version,
            "git_tag": self.git_tag,
        })
    }

    /// Record text: `host`, `python_version`, `git_tag` in that order.
    pub fn to_record(&self) -> String {
        let host = json!(self.host);
        let python_version = json!(self.python_version);
        let git_tag = json!(self.git_tag);
        ordered_json(&[
            ("host", &host),
            ("python_version", &python_version),
            ("git_tag", &git_tag),
        ])
    }

    /// Short identifier of these facts.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.to_json())
    }
}

/// A fingerprinted result directory that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDirectory {
    pub id: String,
    pub path: PathBuf,
    /// Whether this call wrote the environment record.
    pub wrote_record: bool,
}

impl ResultDirectory {
    /// Create (or reuse) `<base>/<id>` and record `facts` if not yet recorded.
    pub fn establish(base: &Path, facts: &EnvironmentFacts) -> io::Result<Self> {
        let id = facts.fingerprint();
        let path = base.join(&id);
        fs::create_dir_all(&path)?;
        let wrote_record = write_record_once(&path.join(RECORD_FILE), facts)?;

        if wrote_record {
            log::info!("new result directory {} for {}", path.display(), facts.to_json());
        } else {
            log::debug!("reusing result directory {}", path.display());
        }
        Ok(Self { id, path, wrote_record })
    }

    pub fn record_path(&self) -> PathBuf {
        self.path.join(RECORD_FILE)
    }
}

/// Write `facts` to `path` unless the file already exists.
fn write_record_once(path: &Path, facts: &EnvironmentFacts) -> io::Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    file.write_all(facts.to_record().as_bytes())?;
    file.sync_all()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_facts_from_args() {
        let facts = EnvironmentFacts::from_args(
            &args(&["--py", "3.6", "--tag=v0.3.1", "--extra", "1"]),
            Some("cori".into()),
        );
        assert_eq!(facts.host.as_deref(), Some("cori"));
        assert_eq!(facts.python_version.as_deref(), Some("3.6"));
        assert_eq!(facts.git_tag.as_deref(), Some("v0.3.1"));
    }

    #[test]
    fn test_missing_facts_are_null() {
        let facts = EnvironmentFacts::from_args(&args(&["--py", "--tag"]), None);
        assert_eq!(facts, EnvironmentFacts::default());
        assert_eq!(
            facts.to_json(),
            json!({"host": null, "python_version": null, "git_tag": null})
        );
    }

    #[test]
    fn test_fingerprint_matches_mapping_fingerprint() {
        let facts = EnvironmentFacts {
            host: Some("x".into()),
            python_version: Some("3.6".into()),
            git_tag: Some("v1".into()),
        };
        assert_eq!(facts.fingerprint(), "bf58c7f9d0");
    }

    #[test]
    fn test_record_is_written_once() {
        let base = tempfile::tempdir().unwrap();
        let facts = EnvironmentFacts::from_args(&args(&["--py", "3.6"]), None);

        let first = ResultDirectory::establish(base.path(), &facts).unwrap();
        assert!(first.wrote_record);
        let original = fs::read_to_string(first.record_path()).unwrap();

        // Tamper with the record; a second run must not restore or rewrite it.
        fs::write(first.record_path(), "{\"edited\": true}").unwrap();
        let second = ResultDirectory::establish(base.path(), &facts).unwrap();
        assert!(!second.wrote_record);
        assert_eq!(second.path, first.path);
        assert_eq!(fs::read_to_string(second.record_path()).unwrap(), "{\"edited\": true}");

        let parsed: EnvironmentFacts = serde_json::from_str(&original).unwrap();
        assert_eq!(parsed, facts);
    }

    #[test]
    fn test_record_layout() {
        let facts = EnvironmentFacts {
            host: Some("cori".into()),
            python_version: Some("3.6".into()),
            git_tag: None,
        };
        assert_eq!(
            facts.to_record(),
            r#"{"host": "cori", "python_version": "3.6", "git_tag": null}"#
        );

        let base = tempfile::tempdir().unwrap();
        let dir = ResultDirectory::establish(base.path(), &facts).unwrap();
        assert_eq!(fs::read_to_string(dir.record_path()).unwrap(), facts.to_record());
    }

    #[test]
    fn test_different_facts_get_different_directories() {
        let base = tempfile::tempdir().unwrap();
        let a = ResultDirectory::establish(base.path(), &EnvironmentFacts::from_args(&args(&["--tag", "v1"]), None)).unwrap();
        let b = ResultDirectory::establish(base.path(), &EnvironmentFacts::from_args(&args(&["--tag", "v2"]), None)).unwrap();
        assert_ne!(a.path, b.path);
        assert!(a.record_path().exists() && b.record_path().exists());
    }
}
