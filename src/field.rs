use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::lookup::ResolvedReference;
use crate::processors::ValueProcessor;
use crate::validation::{Origin, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldKind {
    Meta,
    File,
}

/// Inclusive occurrence bounds. `max == usize::MAX` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountLimits {
    pub min: usize,
    pub max: usize,
}

impl CountLimits {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub const fn unbounded(min: usize) -> Self {
        Self {
            min,
            max: usize::MAX,
        }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && count <= self.max
    }

    /// Whether both bounds admit at least one common count.
    pub fn overlaps(&self, other: &CountLimits) -> bool {
        self.min.max(other.min) <= self.max.min(other.max)
    }
}

impl fmt::Display for CountLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max == usize::MAX {
            write!(f, "{}+", self.min)
        } else if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    name: String,
    synonyms: Vec<String>,
    kind: FieldKind,
    limits: CountLimits,
    row_limits: CountLimits,
    description: Option<String>,
    processors: Vec<ValueProcessor>,
    attributes: Vec<FieldDefinition>,
}

impl FieldDefinition {
    pub fn meta(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Meta)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::File)
    }

    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            synonyms: Vec::new(),
            kind,
            limits: CountLimits::new(0, 1),
            row_limits: CountLimits::new(0, 1),
            description: None,
            processors: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn required(self) -> Self {
        self.count(1, 1)
    }

    pub fn count(mut self, min: usize, max: usize) -> Self {
        self.limits = CountLimits::new(min, max);
        self.row_limits = CountLimits::new(min, max);
        self
    }

    /// Limits for one row of a multi-submission spreadsheet, when they differ
    /// from the per-manifest limits.
    pub fn row_count(mut self, min: usize, max: usize) -> Self {
        self.row_limits = CountLimits::new(min, max);
        self
    }

    pub fn synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonyms.push(synonym.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn processor(mut self, processor: impl Into<ValueProcessor>) -> Self {
        self.processors.push(processor.into());
        self
    }

    pub fn attribute(mut self, attribute: FieldDefinition) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn limits(&self) -> CountLimits {
        self.limits
    }

    pub fn row_limits(&self) -> CountLimits {
        self.row_limits
    }

    pub fn is_required(&self) -> bool {
        self.limits.min > 0
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn processors(&self) -> &[ValueProcessor] {
        &self.processors
    }

    pub fn attributes(&self) -> &[FieldDefinition] {
        &self.attributes
    }

    pub fn attribute_definition(&self, name: &str) -> Option<&FieldDefinition> {
        self.attributes.iter().find(|def| def.matches_name(name))
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self
                .synonyms
                .iter()
                .any(|synonym| synonym.eq_ignore_ascii_case(name))
    }

    /// Runs the processor chain as a fold; each processor sees the output of
    /// the previous one.
    pub fn process(&self, value: FieldValue, result: &mut ValidationResult) -> FieldValue {
        self.processors
            .iter()
            .fold(value, |value, processor| processor.apply(value, result))
    }
}

/// One occurrence of a field (or of a file attribute) in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    field: String,
    raw: String,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<Utf8PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<FieldValue>,
    origins: Vec<Origin>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    references: Vec<ResolvedReference>,
    valid: bool,
}

impl FieldValue {
    pub fn new(field: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            field: field.into(),
            value: raw.clone(),
            raw,
            file: None,
            attributes: Vec::new(),
            origins: Vec::new(),
            references: Vec::new(),
            valid: true,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origins.push(origin);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_file(mut self, file: Utf8PathBuf) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_attribute(mut self, attribute: FieldValue) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_references(mut self, references: Vec<ResolvedReference>) -> Self {
        self.references = references;
        self
    }

    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn file(&self) -> Option<&Utf8Path> {
        self.file.as_deref()
    }

    pub fn attributes(&self) -> &[FieldValue] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.field.eq_ignore_ascii_case(name))
            .map(FieldValue::value)
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn references(&self) -> &[ResolvedReference] {
        &self.references
    }

    /// False when processing this occurrence raised an error.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{CvProcessor, FileSuffixProcessor};

    #[test]
    fn limits_display_and_overlap() {
        assert_eq!(CountLimits::new(1, 1).to_string(), "1");
        assert_eq!(CountLimits::new(0, 2).to_string(), "0-2");
        assert_eq!(CountLimits::unbounded(1).to_string(), "1+");
        assert!(CountLimits::new(0, 1).overlaps(&CountLimits::new(1, 3)));
        assert!(!CountLimits::new(0, 0).overlaps(&CountLimits::new(1, 3)));
    }

    #[test]
    fn synonyms_match_case_insensitively() {
        let def = FieldDefinition::meta("NAME").synonym("ASSEMBLYNAME");
        assert!(def.matches_name("name"));
        assert!(def.matches_name("AssemblyName"));
        assert!(!def.matches_name("NAMES"));
    }

    #[test]
    fn later_processors_see_rewritten_value() {
        let def = FieldDefinition::meta("FORMAT")
            .processor(CvProcessor::new(["fasta.gz"]).with_aliases("fasta.gz", ["fa.gz"]))
            .processor(FileSuffixProcessor::new([".gz"]));
        let mut result = ValidationResult::new();
        let value = def.process(FieldValue::new("FORMAT", "FA.GZ"), &mut result);
        assert_eq!(value.value(), "fasta.gz");
        assert_eq!(value.raw(), "FA.GZ");
        assert!(result.is_valid());
        assert_eq!(result.info_count(), 1);
    }
}
