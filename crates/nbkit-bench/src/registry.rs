//! Index-addressed registry of benchmark commands.

use std::io::{self, Write};

use indexmap::IndexMap;

use crate::grid::GridValue;
use crate::template::CommandTemplate;

/// Key/value description of a registered command, in insertion order.
pub type Tag = IndexMap<String, GridValue>;

/// Render a tag as `'key' = value` pairs joined by `, `.
pub fn format_tag(tag: &Tag) -> String {
    tag.iter()
        .map(|(k, v)| format!("'{}' = {}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A command as registered: ready to run, or rendered from its tag later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Literal(Vec<String>),
    Deferred(CommandTemplate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: Command,
    pub tag: Tag,
}

/// Append-only list of commands; the index is the only address.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `command` with `tag`; returns its index.
    pub fn register(&mut self, command: Command, tag: Tag) -> usize {
        self.entries.push(CommandEntry { command, tag });
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&CommandEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.iter()
    }

    /// Print every index with its tag.
    pub fn write_info(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Registered commands")?;
        writeln!(out, "{}", "-".repeat(19))?;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.tag.is_empty() {
                writeln!(out, "{}:", i)?;
            } else {
                writeln!(out, "{}: {}", i, format_tag(&entry.tag))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
