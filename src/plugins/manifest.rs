//! Manifest reader for grafthost
//!
//! Unit descriptors are small INI-style documents. The section parser here
//! is shared with the unit loader, which reads unit code in the same
//! format. Parsing is line-based: `[section]` headers, `key = value`
//! entries, `#`/`;` comments. Repeated keys are preserved in order, which
//! the loader relies on for directive lists.

use crate::error::{HostError, Result};

use super::types::{EntryPointRef, Manifest};

/// One `[section]` with its entries in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    /// First value for a key, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for a repeated key, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse an INI-style document into its sections, in file order.
///
/// Content before the first section header and lines without `=` are
/// ignored rather than rejected; descriptor strictness lives in
/// `read_manifest`, not in the parser.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push(Section {
                name: name.trim().to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if let Some(section) = sections.last_mut() {
                section
                    .entries
                    .push((key.trim().to_string(), value.trim().to_string()));
            }
        }
    }

    sections
}

/// Parse a unit descriptor.
///
/// Requires a `[general]` section with non-empty `name`, `description`,
/// and `code` keys; `code` must split into module path and symbol name.
/// Any violation is a `Manifest` error — a malformed descriptor is never
/// silently skipped.
pub fn read_manifest(text: &str) -> Result<Manifest> {
    let sections = parse_sections(text);
    let general = sections
        .iter()
        .find(|s| s.name == "general")
        .ok_or_else(|| HostError::Manifest("missing [general] section".to_string()))?;

    let name = required_key(general, "name")?;
    let description = required_key(general, "description")?;
    let code = required_key(general, "code")?;

    let entry_point = EntryPointRef::parse(code).ok_or_else(|| {
        HostError::Manifest(format!(
            "code '{code}' cannot be split into module path and symbol name"
        ))
    })?;

    Ok(Manifest {
        name: name.to_string(),
        description: description.to_string(),
        entry_point,
    })
}

fn required_key<'a>(section: &'a Section, key: &str) -> Result<&'a str> {
    match section.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(HostError::Manifest(format!(
            "key '{key}' in [general] is empty"
        ))),
        None => Err(HostError::Manifest(format!(
            "missing key '{key}' in [general]"
        ))),
    }
}

impl Manifest {
    /// Re-serialize the descriptor. Reading the result back yields an
    /// identical manifest.
    pub fn to_descriptor(&self) -> String {
        format!(
            "[general]\nname={}\ndescription={}\ncode={}\n",
            self.name,
            self.description,
            self.entry_point.to_code()
        )
    }
}
