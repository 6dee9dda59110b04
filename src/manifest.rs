use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::field::{CountLimits, FieldDefinition, FieldKind, FieldValue};
use crate::file_group::{FileCounts, match_file_group};
use crate::fs_util;
use crate::lookup::ResolvedReference;
use crate::schema::ManifestSchema;
use crate::validation::{MessageCode, Origin, ValidationMessage, ValidationResult};

static FIELD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)(?:\s+(.*))?$").expect("field line pattern"));
static COMMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#|;|//)").expect("comment line pattern"));

/// A file attached to the manifest that survived validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionFile {
    pub field: String,
    pub path: Utf8PathBuf,
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ManifestReaderResult {
    fields: Vec<FieldValue>,
    file_group: Option<String>,
}

impl ManifestReaderResult {
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn values<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a FieldValue> + use<'a, 'n> {
        self.fields
            .iter()
            .filter(move |value| value.field().eq_ignore_ascii_case(name))
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values(name).next().map(FieldValue::value)
    }

    pub fn count(&self, name: &str) -> usize {
        self.values(name).count()
    }

    pub fn references(&self, name: &str) -> Vec<&ResolvedReference> {
        self.values(name)
            .flat_map(|value| value.references().iter())
            .collect()
    }

    /// Valid files in manifest order.
    pub fn submission_files(&self) -> Vec<SubmissionFile> {
        self.fields
            .iter()
            .filter(|value| value.is_valid())
            .filter_map(|value| {
                value.file().map(|path| SubmissionFile {
                    field: value.field().to_string(),
                    path: path.to_path_buf(),
                    attributes: value
                        .attributes()
                        .iter()
                        .map(|attribute| {
                            (attribute.field().to_string(), attribute.value().to_string())
                        })
                        .collect(),
                })
            })
            .collect()
    }

    pub fn files(&self, name: &str) -> Vec<SubmissionFile> {
        self.submission_files()
            .into_iter()
            .filter(|file| file.field.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Valid file count for every file field of `schema`, zero included.
    pub fn file_counts(&self, schema: &ManifestSchema) -> FileCounts {
        schema
            .file_fields()
            .map(|def| {
                let count = self
                    .values(def.name())
                    .filter(|value| value.is_valid() && value.file().is_some())
                    .count();
                (def.name().to_string(), count)
            })
            .collect()
    }

    pub fn file_group(&self) -> Option<&str> {
        self.file_group.as_deref()
    }
}

#[derive(Debug, Clone)]
struct RawEntry {
    name: String,
    value: String,
    attributes: Vec<(String, String)>,
    origins: Vec<Origin>,
}

impl RawEntry {
    fn new(name: &str, value: &str, origins: Vec<Origin>) -> Self {
        Self {
            name: name.to_string(),
            value: value.trim().to_string(),
            attributes: Vec::new(),
            origins,
        }
    }

    fn message(&self, message: ValidationMessage) -> ValidationMessage {
        self.origins
            .iter()
            .cloned()
            .fold(message, ValidationMessage::with_origin)
    }
}

/// Which count limits apply to an entry: the whole-manifest limits, or the
/// per-row limits of one entry in a multi-entry manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryScope {
    Manifest,
    Row,
}

impl EntryScope {
    fn limits(self, def: &FieldDefinition) -> CountLimits {
        match self {
            EntryScope::Manifest => def.limits(),
            EntryScope::Row => def.row_limits(),
        }
    }
}

pub struct ManifestReader<'a> {
    schema: &'a ManifestSchema,
    input_dir: Utf8PathBuf,
    run_processors: bool,
}

impl<'a> ManifestReader<'a> {
    /// File values and the info file are resolved relative to `input_dir`.
    pub fn new(schema: &'a ManifestSchema, input_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            schema,
            input_dir: input_dir.into(),
            run_processors: true,
        }
    }

    /// Reads structure only: fields, cardinality, files and file groups.
    /// Value processors are skipped, so no remote lookups are made and
    /// values stay as written.
    pub fn structure_only(mut self) -> Self {
        self.run_processors = false;
        self
    }

    pub fn input_dir(&self) -> &Utf8Path {
        &self.input_dir
    }

    /// Reads and validates a manifest file. Returns `None` only when the file
    /// itself cannot be read.
    pub fn read_file(
        &self,
        path: &Utf8Path,
        result: &mut ValidationResult,
    ) -> Option<ManifestReaderResult> {
        let text = read_manifest_text(path, result)?;
        let mut scope = ValidationResult::with_origin(Origin::file(path));
        let manifest = self.parse_str(&text, &mut scope);
        result.merge(scope);
        Some(manifest)
    }

    /// Like [`ManifestReader::read_file`], for manifests that may declare
    /// several entries.
    pub fn read_entries(
        &self,
        path: &Utf8Path,
        result: &mut ValidationResult,
    ) -> Option<Vec<ManifestReaderResult>> {
        let text = read_manifest_text(path, result)?;
        let mut scope = ValidationResult::with_origin(Origin::file(path));
        let manifests = self.parse_entries(&text, &mut scope);
        result.merge(scope);
        Some(manifests)
    }

    /// Parses a single-entry manifest (line format, or a JSON object).
    pub fn parse_str(&self, text: &str, result: &mut ValidationResult) -> ManifestReaderResult {
        let entries = tokenize(text, result);
        self.parse_entry(entries, EntryScope::Manifest, result)
    }

    /// Parses a manifest that is either a single entry or a JSON array of
    /// entries. Array entries are validated independently against the row
    /// limits of each field and carry an `entry` origin (1-based).
    pub fn parse_entries(
        &self,
        text: &str,
        result: &mut ValidationResult,
    ) -> Vec<ManifestReaderResult> {
        match tokenize_entries(text, result) {
            ManifestEntries::Single(entries) => {
                vec![self.parse_entry(entries, EntryScope::Manifest, result)]
            }
            ManifestEntries::Multiple(rows) => rows
                .into_iter()
                .enumerate()
                .map(|(index, entries)| {
                    let mut scope = ValidationResult::with_origin(Origin::new("entry", index + 1));
                    let manifest = self.parse_entry(entries, EntryScope::Row, &mut scope);
                    result.merge(scope);
                    manifest
                })
                .collect(),
        }
    }

    fn parse_entry(
        &self,
        mut entries: Vec<RawEntry>,
        scope: EntryScope,
        result: &mut ValidationResult,
    ) -> ManifestReaderResult {
        if let Some(info) = self.info_entry(&entries) {
            let mut info_scope = ValidationResult::new();
            entries.extend(self.read_info(&info, &mut info_scope));
            result.merge(info_scope);
        }

        let mut manifest = self.assemble(entries, scope, result);
        if !self.schema.file_groups().is_empty() {
            let counts = manifest.file_counts(self.schema);
            manifest.file_group = match_file_group(self.schema.file_groups(), &counts, result)
                .map(|group| group.name().to_string());
        }
        manifest
    }

    fn info_entry(&self, entries: &[RawEntry]) -> Option<RawEntry> {
        let info_field = self.schema.info_field()?;
        entries
            .iter()
            .find(|entry| {
                self.schema
                    .field(&entry.name)
                    .is_some_and(|def| def.name() == info_field)
                    && !entry.value.is_empty()
            })
            .cloned()
    }

    fn read_info(&self, info: &RawEntry, result: &mut ValidationResult) -> Vec<RawEntry> {
        let path = self.resolve_path(&info.value);
        match fs_util::read_text(&path) {
            Ok(text) => {
                let mut scope = ValidationResult::with_origin(Origin::file(&path));
                let entries = tokenize(&text, &mut scope)
                    .into_iter()
                    .map(|mut entry| {
                        entry.origins.insert(0, Origin::file(&path));
                        entry
                    })
                    .collect();
                result.merge(scope);
                entries
            }
            Err(err) => {
                result.add(info.message(
                    ValidationMessage::error(
                        MessageCode::InfoRead,
                        format!("Error reading info file {path}"),
                    )
                    .with_cause(err.to_string()),
                ));
                Vec::new()
            }
        }
    }

    fn assemble(
        &self,
        entries: Vec<RawEntry>,
        scope: EntryScope,
        result: &mut ValidationResult,
    ) -> ManifestReaderResult {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut fields = Vec::new();

        for entry in entries {
            let Some(def) = self.schema.field(&entry.name) else {
                result.add(entry.message(ValidationMessage::error(
                    MessageCode::UnknownField,
                    format!("Unknown field: {}", entry.name),
                )));
                continue;
            };
            if entry.value.is_empty() {
                result.add(entry.message(ValidationMessage::error(
                    MessageCode::MissingValue,
                    format!("Missing value for field: {}", def.name()),
                )));
                continue;
            }
            let limits = scope.limits(def);
            let count = counts.entry(def.name()).or_insert(0);
            *count += 1;
            if *count > limits.max {
                result.add(entry.message(ValidationMessage::error(
                    MessageCode::TooManyFields,
                    format!(
                        "Too many fields: {} may appear at most {} time(s)",
                        def.name(),
                        limits.max
                    ),
                )));
                continue;
            }
            fields.push(self.process_entry(def, entry, result));
        }

        for def in self.schema.fields() {
            let found = counts.get(def.name()).copied().unwrap_or(0);
            for _ in found..scope.limits(def).min {
                result.error(
                    MessageCode::MissingMandatoryField,
                    format!("Missing mandatory field: {}", def.name()),
                );
            }
        }

        ManifestReaderResult {
            fields,
            file_group: None,
        }
    }

    fn process_entry(
        &self,
        def: &FieldDefinition,
        entry: RawEntry,
        result: &mut ValidationResult,
    ) -> FieldValue {
        let mut scope = ValidationResult::with_origins(entry.origins.clone());
        let initial = entry
            .origins
            .iter()
            .cloned()
            .fold(FieldValue::new(def.name(), entry.value.as_str()), FieldValue::with_origin);
        let mut value = if self.run_processors {
            def.process(initial, &mut scope)
        } else {
            initial
        };
        if def.kind() == FieldKind::File {
            value = self.resolve_file(def, value, &mut scope);
        }
        let valid = scope.is_valid();
        value = self.process_attributes(def, value, &entry.attributes, &mut scope);
        if !valid {
            value = value.invalidated();
        }
        result.merge(scope);
        value
    }

    fn resolve_file(
        &self,
        def: &FieldDefinition,
        value: FieldValue,
        result: &mut ValidationResult,
    ) -> FieldValue {
        let path = self.resolve_path(value.value());
        if path.as_std_path().is_file() {
            value.with_file(path)
        } else {
            result.error(
                MessageCode::InvalidFileField,
                format!(
                    "Invalid file field {}: \"{}\" is not an existing regular file",
                    def.name(),
                    value.value()
                ),
            );
            value
        }
    }

    fn process_attributes(
        &self,
        def: &FieldDefinition,
        mut value: FieldValue,
        attributes: &[(String, String)],
        result: &mut ValidationResult,
    ) -> FieldValue {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (name, raw) in attributes {
            let origin = Origin::new("attribute", name);
            let Some(attribute) = def.attribute_definition(name) else {
                result.add(
                    ValidationMessage::error(
                        MessageCode::UnknownAttribute,
                        format!("Unknown attribute {name} for field {}", def.name()),
                    )
                    .with_origin(origin),
                );
                continue;
            };
            let count = counts.entry(attribute.name()).or_insert(0);
            *count += 1;
            if *count > attribute.limits().max {
                result.add(
                    ValidationMessage::error(
                        MessageCode::TooManyAttributes,
                        format!(
                            "Too many attributes: {} may appear at most {} time(s) for field {}",
                            attribute.name(),
                            attribute.limits().max,
                            def.name()
                        ),
                    )
                    .with_origin(origin),
                );
                continue;
            }
            let raw_value = FieldValue::new(attribute.name(), raw.trim()).with_origin(origin.clone());
            if self.run_processors {
                let mut scope = ValidationResult::with_origin(origin);
                value = value.with_attribute(attribute.process(raw_value, &mut scope));
                result.merge(scope);
            } else {
                value = value.with_attribute(raw_value);
            }
        }

        for attribute in def.attributes() {
            let found = counts.get(attribute.name()).copied().unwrap_or(0);
            for _ in found..attribute.limits().min {
                result.error(
                    MessageCode::MissingMandatoryAttribute,
                    format!(
                        "Missing mandatory attribute {} for field {}",
                        attribute.name(),
                        def.name()
                    ),
                );
            }
        }
        value
    }

    fn resolve_path(&self, value: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.input_dir.join(path)
        }
    }
}

fn read_manifest_text(path: &Utf8Path, result: &mut ValidationResult) -> Option<String> {
    match fs_util::read_text(path) {
        Ok(text) => Some(text),
        Err(err) => {
            result.add(
                ValidationMessage::error(
                    MessageCode::ManifestRead,
                    format!("Error reading manifest file {path}"),
                )
                .with_cause(err.to_string())
                .with_origin(Origin::file(path)),
            );
            None
        }
    }
}

enum ManifestEntries {
    Single(Vec<RawEntry>),
    Multiple(Vec<Vec<RawEntry>>),
}

fn tokenize(text: &str, result: &mut ValidationResult) -> Vec<RawEntry> {
    match tokenize_entries(text, result) {
        ManifestEntries::Single(entries) => entries,
        ManifestEntries::Multiple(rows) => {
            result.error(
                MessageCode::ManifestRead,
                format!(
                    "Invalid JSON manifest: expected a single object of fields, found {} entries",
                    rows.len()
                ),
            );
            Vec::new()
        }
    }
}

fn tokenize_entries(text: &str, result: &mut ValidationResult) -> ManifestEntries {
    let text = text.trim_start_matches('\u{feff}');
    let head = text.trim_start();
    if head.starts_with('{') {
        ManifestEntries::Single(
            parse_json::<JsonObject>(text, result)
                .map(json_entries)
                .unwrap_or_default(),
        )
    } else if head.starts_with('[') {
        let rows = parse_json::<Vec<JsonObject>>(text, result).unwrap_or_default();
        if rows.is_empty() {
            result.error(MessageCode::ManifestRead, "Invalid JSON manifest: no entries");
        }
        ManifestEntries::Multiple(rows.into_iter().map(json_entries).collect())
    } else {
        ManifestEntries::Single(tokenize_lines(text))
    }
}

fn tokenize_lines(text: &str) -> Vec<RawEntry> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() || COMMENT_LINE.is_match(line) {
                return None;
            }
            let captures = FIELD_LINE.captures(line)?;
            let name = captures.get(1)?.as_str();
            let value = captures.get(2).map(|value| value.as_str()).unwrap_or("");
            Some(RawEntry::new(name, value, vec![Origin::line(index + 1)]))
        })
        .collect()
}

fn parse_json<T: DeserializeOwned>(text: &str, result: &mut ValidationResult) -> Option<T> {
    match serde_json::from_str(text) {
        Ok(document) => Some(document),
        Err(err) => {
            result.add(
                ValidationMessage::error(MessageCode::ManifestRead, "Invalid JSON manifest")
                    .with_cause(err.to_string())
                    .with_origin(Origin::line(err.line())),
            );
            None
        }
    }
}

/// Top-level JSON object whose members keep document order, repeated keys
/// included.
struct JsonObject(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for JsonObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = JsonObject;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of manifest fields")
            }

            fn visit_map<A>(self, mut map: A) -> Result<JsonObject, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut members = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(member) = map.next_entry::<String, serde_json::Value>()? {
                    members.push(member);
                }
                Ok(JsonObject(members))
            }
        }

        deserializer.deserialize_map(MembersVisitor)
    }
}

fn json_entries(object: JsonObject) -> Vec<RawEntry> {
    let mut entries = Vec::new();
    for (name, value) in &object.0 {
        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let origins = vec![Origin::field(name), Origin::new("index", index)];
                    entries.push(json_entry(name, item, origins));
                }
            }
            other => entries.push(json_entry(name, other, vec![Origin::field(name)])),
        }
    }
    entries
}

fn json_entry(name: &str, value: &Value, origins: Vec<Origin>) -> RawEntry {
    match value {
        Value::Object(object) => {
            let mut entry = RawEntry::new(
                name,
                &object.get("value").map(json_scalar).unwrap_or_default(),
                origins,
            );
            if let Some(Value::Object(attributes)) = object.get("attributes") {
                for (key, value) in attributes {
                    match value {
                        Value::Array(items) => entry
                            .attributes
                            .extend(items.iter().map(|item| (key.clone(), json_scalar(item)))),
                        other => entry.attributes.push((key.clone(), json_scalar(other))),
                    }
                }
            }
            entry
        }
        other => RawEntry::new(name, &json_scalar(other), origins),
    }
}

fn json_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}
