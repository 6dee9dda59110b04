use crate::field::FieldValue;
use crate::validation::{MessageCode, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CvEntry {
    key: String,
    aliases: Vec<String>,
}

/// Controlled vocabulary: a fixed ordered list of canonical keys, each with
/// optional alternative spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvProcessor {
    entries: Vec<CvEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvMatch<'a> {
    Exact,
    Corrected(&'a str),
    NoMatch,
}

impl CvProcessor {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: keys
                .into_iter()
                .map(|key| CvEntry {
                    key: key.into(),
                    aliases: Vec::new(),
                })
                .collect(),
        }
    }

    /// Registers alternative spellings for `key`, adding the key if it is new.
    pub fn with_aliases<I, S>(mut self, key: &str, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases = aliases.into_iter().map(Into::into);
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.aliases.extend(aliases),
            None => self.entries.push(CvEntry {
                key: key.to_string(),
                aliases: aliases.collect(),
            }),
        }
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn lookup(&self, input: &str) -> CvMatch<'_> {
        if self.entries.iter().any(|entry| entry.key == input) {
            return CvMatch::Exact;
        }
        let folded = fold(input);
        if folded.is_empty() {
            return CvMatch::NoMatch;
        }
        if let Some(entry) = self.entries.iter().find(|entry| fold(&entry.key) == folded) {
            return CvMatch::Corrected(&entry.key);
        }
        self.entries
            .iter()
            .find(|entry| entry.aliases.iter().any(|alias| fold(alias) == folded))
            .map(|entry| CvMatch::Corrected(&entry.key))
            .unwrap_or(CvMatch::NoMatch)
    }

    pub fn apply(&self, value: FieldValue, result: &mut ValidationResult) -> FieldValue {
        match self.lookup(value.value()) {
            CvMatch::Exact => value,
            CvMatch::Corrected(key) => {
                result.info(
                    MessageCode::ValueCorrected,
                    format!(
                        "Value corrected for field {}: \"{}\" to \"{key}\"",
                        value.field(),
                        value.value()
                    ),
                );
                let key = key.to_string();
                value.with_value(key)
            }
            CvMatch::NoMatch => {
                result.error(
                    MessageCode::InvalidValue,
                    format!(
                        "Invalid value for field {}: \"{}\". Valid values are: {}",
                        value.field(),
                        value.value(),
                        self.keys().collect::<Vec<_>>().join(", ")
                    ),
                );
                value
            }
        }
    }
}

/// Lower-cases and drops every non-alphanumeric character.
fn fold(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
