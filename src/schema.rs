use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::KiraError;
use crate::field::{CountLimits, FieldDefinition, FieldKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileGroupEntry {
    pub field: String,
    pub limits: CountLimits,
}

/// One acceptable combination of file fields and their counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileGroupTemplate {
    name: String,
    entries: Vec<FileGroupEntry>,
}

impl FileGroupTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn file(mut self, field: impl Into<String>, min: usize, max: usize) -> Self {
        self.entries.push(FileGroupEntry {
            field: field.into(),
            limits: CountLimits::new(min, max),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[FileGroupEntry] {
        &self.entries
    }

    pub fn names_field(&self, field: &str) -> bool {
        self.entries.iter().any(|entry| entry.field == field)
    }

    /// Allowed counts for `field`; fields the template does not name must be absent.
    pub fn limits_for(&self, field: &str) -> CountLimits {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.limits)
            .unwrap_or(CountLimits::new(0, 0))
    }

    /// True when no combination of file counts satisfies both templates.
    pub fn is_exclusive_with(&self, other: &FileGroupTemplate) -> bool {
        self.entries
            .iter()
            .chain(other.entries.iter())
            .any(|entry| {
                !self
                    .limits_for(&entry.field)
                    .overlaps(&other.limits_for(&entry.field))
            })
    }
}

impl fmt::Display for FileGroupTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .entries
            .iter()
            .map(|entry| format!("{}={}", entry.field, entry.limits))
            .collect::<Vec<_>>();
        write!(f, "{} [{}]", self.name, entries.join(", "))
    }
}

/// Immutable description of every field a manifest may contain and of the
/// file combinations that make up a submittable unit.
#[derive(Debug, Clone)]
pub struct ManifestSchema {
    fields: Vec<FieldDefinition>,
    file_groups: Vec<FileGroupTemplate>,
    info_field: Option<String>,
}

impl ManifestSchema {
    pub fn builder() -> ManifestSchemaBuilder {
        ManifestSchemaBuilder::default()
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Case-insensitive lookup by name or synonym.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|def| def.matches_name(name))
    }

    pub fn file_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields
            .iter()
            .filter(|def| def.kind() == FieldKind::File)
    }

    pub fn file_groups(&self) -> &[FileGroupTemplate] {
        &self.file_groups
    }

    pub fn info_field(&self) -> Option<&str> {
        self.info_field.as_deref()
    }

    pub fn is_info_field(&self, def: &FieldDefinition) -> bool {
        self.info_field.as_deref() == Some(def.name())
    }
}

#[derive(Debug, Default)]
pub struct ManifestSchemaBuilder {
    fields: Vec<FieldDefinition>,
    file_groups: Vec<FileGroupTemplate>,
    info_field: Option<String>,
}

impl ManifestSchemaBuilder {
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn file_group(mut self, group: FileGroupTemplate) -> Self {
        self.file_groups.push(group);
        self
    }

    /// Declares the field naming a secondary file whose lines are merged into
    /// the manifest.
    pub fn info_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.push(
            FieldDefinition::meta(name.clone())
                .count(0, 1)
                .description("File with additional manifest fields"),
        );
        self.info_field = Some(name);
        self
    }

    pub fn build(self) -> Result<ManifestSchema, KiraError> {
        check_fields(&self.fields)?;
        check_file_groups(&self.fields, &self.file_groups)?;
        Ok(ManifestSchema {
            fields: self.fields,
            file_groups: self.file_groups,
            info_field: self.info_field,
        })
    }
}

fn check_fields(fields: &[FieldDefinition]) -> Result<(), KiraError> {
    let mut names = HashSet::new();
    for def in fields {
        check_limits(def)?;
        for name in std::iter::once(def.name()).chain(def.synonyms().iter().map(String::as_str)) {
            if !names.insert(name.to_ascii_uppercase()) {
                return Err(KiraError::InvalidSchema(format!(
                    "field name or synonym declared twice: {name}"
                )));
            }
        }
        if !def.attributes().is_empty() && def.kind() != FieldKind::File {
            return Err(KiraError::InvalidSchema(format!(
                "attributes are only allowed on file fields: {}",
                def.name()
            )));
        }
        let mut attribute_names = HashSet::new();
        for attribute in def.attributes() {
            check_limits(attribute)?;
            if attribute.kind() != FieldKind::Meta {
                return Err(KiraError::InvalidSchema(format!(
                    "attribute {} of field {} must be a meta field",
                    attribute.name(),
                    def.name()
                )));
            }
            if !attribute_names.insert(attribute.name().to_ascii_uppercase()) {
                return Err(KiraError::InvalidSchema(format!(
                    "attribute declared twice on field {}: {}",
                    def.name(),
                    attribute.name()
                )));
            }
        }
    }
    Ok(())
}

fn check_limits(def: &FieldDefinition) -> Result<(), KiraError> {
    for limits in [def.limits(), def.row_limits()] {
        if limits.max == 0 || limits.min > limits.max {
            return Err(KiraError::InvalidSchema(format!(
                "invalid count limits {}..{} for field {}",
                limits.min,
                limits.max,
                def.name()
            )));
        }
    }
    Ok(())
}

fn check_file_groups(
    fields: &[FieldDefinition],
    groups: &[FileGroupTemplate],
) -> Result<(), KiraError> {
    let mut group_names = HashSet::new();
    for group in groups {
        if !group_names.insert(group.name()) {
            return Err(KiraError::InvalidSchema(format!(
                "file group declared twice: {}",
                group.name()
            )));
        }
        let mut seen = HashSet::new();
        for entry in group.entries() {
            let known = fields
                .iter()
                .any(|def| def.kind() == FieldKind::File && def.name() == entry.field);
            if !known {
                return Err(KiraError::InvalidSchema(format!(
                    "file group {} refers to unknown file field {}",
                    group.name(),
                    entry.field
                )));
            }
            if !seen.insert(entry.field.as_str()) {
                return Err(KiraError::InvalidSchema(format!(
                    "file group {} names field {} twice",
                    group.name(),
                    entry.field
                )));
            }
            if entry.limits.min > entry.limits.max {
                return Err(KiraError::InvalidSchema(format!(
                    "file group {} has invalid limits for {}",
                    group.name(),
                    entry.field
                )));
            }
        }
    }

    for (index, group) in groups.iter().enumerate() {
        for other in &groups[index + 1..] {
            if !group.is_exclusive_with(other) {
                return Err(KiraError::InvalidSchema(format!(
                    "file groups {} and {} accept the same files",
                    group.name(),
                    other.name()
                )));
            }
        }
    }
    Ok(())
}
