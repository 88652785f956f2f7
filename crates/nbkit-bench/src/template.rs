//! Deferred command templates.
//!
//! A template is a program plus argument templates. Arguments are plain
//! strings with `{name}` placeholders, or optional `{ flag, value }` groups
//! that are emitted only when every placeholder in `value` is known. The
//! rendered command is an argument vector, never a shell string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while rendering a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown placeholder '{{{name}}}' in '{template}'")]
    UnknownPlaceholder { name: String, template: String },

    #[error("Unbalanced brace in '{0}'")]
    Unbalanced(String),
}

/// One argument of a [`CommandTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgTemplate {
    Plain(String),
    Optional { flag: String, value: String },
}

impl From<&str> for ArgTemplate {
    fn from(s: &str) -> Self {
        ArgTemplate::Plain(s.to_string())
    }
}

/// Program and argument templates rendered against a tag at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<ArgTemplate>,
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self::benchmark_default()
    }
}

impl CommandTemplate {
    /// `python ../benchmark.py {bench_name} --bench-dir {bench_dir} -n {ncores} [--sample {sample}]`
    pub fn benchmark_default() -> Self {
        Self {
            program: "python".into(),
            args: vec![
                "../benchmark.py".into(),
                "{bench_name}".into(),
                "--bench-dir".into(),
                "{bench_dir}".into(),
                "-n".into(),
                "{ncores}".into(),
                ArgTemplate::Optional {
                    flag: "--sample".into(),
                    value: "{sample}".into(),
                },
            ],
        }
    }

    /// Render to an argument vector (program first).
    pub fn render(&self, vars: &BTreeMap<String, String>) -> Result<Vec<String>, TemplateError> {
        let mut argv = vec![substitute(&self.program, vars)?];
        for arg in &self.args {
            match arg {
                ArgTemplate::Plain(t) => argv.push(substitute(t, vars)?),
                ArgTemplate::Optional { flag, value } => match substitute(value, vars) {
                    Ok(value) => {
                        argv.push(substitute(flag, vars)?);
                        argv.push(value);
                    }
                    Err(TemplateError::UnknownPlaceholder { .. }) => {}
                    Err(e) => return Err(e),
                },
            }
        }
        Ok(argv)
    }
}

/// Replace `{name}` fields in `template`; `{{` and `}}` are literal braces.
pub fn substitute(template: &str, vars: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(TemplateError::Unbalanced(template.into())),
                        Some(ch) => name.push(ch),
                    }
                }
                let value = vars.get(&name).ok_or_else(|| TemplateError::UnknownPlaceholder {
                    name: name.clone(),
                    template: template.into(),
                })?;
                out.push_str(value);
            }
            '}' => return Err(TemplateError::Unbalanced(template.into())),
            _ => out.push(c),
        }
    }
    Ok(out)
}
