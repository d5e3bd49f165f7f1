//! Flat `name=value` reports written by the on-device test app.

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

/// Parsed report: field name -> raw value.
///
/// Values are kept verbatim (only names are trimmed); the typed accessors
/// trim before parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    fields: HashMap<String, String>,
}

impl Report {
    /// Parse report text. Never fails; empty input yields an empty report.
    ///
    /// Each non-empty line is split at the first `=`. A line without `=`
    /// becomes a field with an empty value. Later duplicates win.
    pub fn parse(text: &str) -> Self {
        let mut fields = HashMap::new();
        // `lines()` strips both `\n` and `\r\n` endings.
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line.split_once('=').unwrap_or((line, ""));
            fields.insert(name.trim().to_owned(), value.to_owned());
        }
        Self { fields }
    }

    /// Parse a report saved on the local filesystem.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field value parsed as a float. `None` if absent, `Some(Err)` if unparsable.
    pub fn get_f64(&self, name: &str) -> Option<std::result::Result<f64, String>> {
        self.parse_field(name)
    }

    /// Field value parsed as an integer. `None` if absent, `Some(Err)` if unparsable.
    pub fn get_i64(&self, name: &str) -> Option<std::result::Result<i64, String>> {
        self.parse_field(name)
    }

    fn parse_field<T: std::str::FromStr>(
        &self,
        name: &str,
    ) -> Option<std::result::Result<T, String>> {
        let raw = self.get(name)?;
        Some(raw.trim().parse::<T>().map_err(|_| raw.to_owned()))
    }

    /// Fields sorted by name.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}
