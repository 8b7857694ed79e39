//! Plugin manifest parsing.
//!
//! The manifest is a small INI subset listing the modules a host should
//! load, in order:
//!
//! ```text
//! ; comments start with ';' or '#'
//! [PLUGINS]
//! logger=logger
//! heartbeat=./plugins/libheartbeat.so
//! ```
//!
//! Only the `[PLUGINS]` section is consulted; keys are labels, values are
//! module names or paths handed to the loader.

use crate::error::{Error, Result};
use std::path::Path;
use winnow::Parser;
use winnow::ascii::space0;
use winnow::combinator::{delimited, separated_pair};
use winnow::error::ContextError;
use winnow::token::{rest, take_till};

type WResult<T> = std::result::Result<T, ContextError>;

/// Section of the manifest naming modules to load.
pub const PLUGIN_SECTION: &str = "PLUGINS";

/// One module entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// The entry's label (the INI key).
    pub key: String,
    /// Module name or path handed to the loader.
    pub module: String,
}

/// A parsed plugin manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Module entries from the `[PLUGINS]` section, in file order.
    pub modules: Vec<ManifestEntry>,
}

impl Manifest {
    /// Parse manifest text, keeping the `[PLUGINS]` section.
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_section(input, PLUGIN_SECTION)
    }

    /// Parse manifest text, keeping an arbitrary section.
    pub fn parse_section(input: &str, section: &str) -> Result<Self> {
        let mut modules = Vec::new();
        let mut in_section = false;

        for (line_no, raw_line) in input.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Ok(name) = section_header.parse(line) {
                in_section = name == section;
                continue;
            }

            if !in_section {
                continue;
            }

            let (key, module) = key_value.parse(line).map_err(|_| {
                Error::Manifest(format!("line {}: expected key=value", line_no + 1))
            })?;
            if module.is_empty() {
                return Err(Error::Manifest(format!(
                    "line {}: empty module value",
                    line_no + 1
                )));
            }
            modules.push(ManifestEntry { key, module });
        }

        Ok(Self { modules })
    }

    /// Read and parse a manifest file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::parse(&input)
    }
}

fn section_header(input: &mut &str) -> WResult<String> {
    delimited('[', take_till(1.., ']'), ']')
        .map(|name: &str| name.trim().to_string())
        .parse_next(input)
}

fn key_value(input: &mut &str) -> WResult<(String, String)> {
    separated_pair(take_till(1.., '='), ('=', space0), rest)
        .map(|(key, value): (&str, &str)| (key.trim().to_string(), value.trim().to_string()))
        .parse_next(input)
}
