use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// Stable identifier of what a message is about, independent of its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCode {
    ManifestRead,
    InfoRead,
    UnknownField,
    TooManyFields,
    MissingMandatoryField,
    MissingValue,
    InvalidFileField,
    InvalidFileSuffix,
    InvalidValue,
    ValueCorrected,
    UnknownAttribute,
    TooManyAttributes,
    MissingMandatoryAttribute,
    ReferenceLookup,
    NoDataFiles,
    InvalidFileGroup,
    AmbiguousFileGroup,
    BundleVersion,
    BundleManifestChanged,
    BundleXmlMissing,
    BundleXmlChanged,
    BundleUploadChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub name: String,
    pub value: String,
}

impl Origin {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }

    pub fn line(number: usize) -> Self {
        Self::new("line", number)
    }

    pub fn file(path: impl fmt::Display) -> Self {
        Self::new("file", path)
    }

    pub fn field(name: &str) -> Self {
        Self::new("field", name)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationMessage {
    severity: Severity,
    code: MessageCode,
    text: String,
    origins: Vec<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
    authentication: bool,
}

impl ValidationMessage {
    pub fn error(code: MessageCode, text: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, text)
    }

    pub fn info(code: MessageCode, text: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, text)
    }

    fn new(severity: Severity, code: MessageCode, text: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            text: text.into(),
            origins: Vec::new(),
            cause: None,
            authentication: false,
        }
    }

    /// Appends an origin as the innermost context.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origins.push(origin);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_authentication(mut self) -> Self {
        self.authentication = true;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> MessageCode {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn is_authentication(&self) -> bool {
        self.authentication
    }

    fn prefixed(mut self, outer: &[Origin]) -> Self {
        if !outer.is_empty() {
            let mut origins = outer.to_vec();
            origins.append(&mut self.origins);
            self.origins = origins;
        }
        self
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.text)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        if !self.origins.is_empty() {
            let origins = self
                .origins
                .iter()
                .map(|origin| origin.to_string())
                .collect::<Vec<_>>();
            write!(f, " [{}]", origins.join(", "))?;
        }
        Ok(())
    }
}

/// Flat accumulator of validation messages.
///
/// Nested scopes are separate results created with [`ValidationResult::with_origin`]
/// and folded back into the outer one with [`ValidationResult::merge`]; the outer
/// origins are prefixed at merge time so every message ends up with its full
/// outer-to-inner origin chain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    #[serde(skip)]
    origins: Vec<Origin>,
    messages: Vec<ValidationMessage>,
    errors: usize,
    infos: usize,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(origin: Origin) -> Self {
        Self {
            origins: vec![origin],
            ..Self::default()
        }
    }

    pub fn with_origins(origins: Vec<Origin>) -> Self {
        Self {
            origins,
            ..Self::default()
        }
    }

    pub fn add(&mut self, message: ValidationMessage) {
        let message = message.prefixed(&self.origins);
        tracing::debug!(code = ?message.code(), "{message}");
        match message.severity() {
            Severity::Error => self.errors += 1,
            Severity::Info => self.infos += 1,
        }
        self.messages.push(message);
    }

    pub fn error(&mut self, code: MessageCode, text: impl Into<String>) {
        self.add(ValidationMessage::error(code, text));
    }

    pub fn info(&mut self, code: MessageCode, text: impl Into<String>) {
        self.add(ValidationMessage::info(code, text));
    }

    /// Folds a nested scope into this one.
    pub fn merge(&mut self, child: ValidationResult) {
        for message in child.messages {
            self.add(message);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Error => self.errors,
            Severity::Info => self.infos,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn info_count(&self) -> usize {
        self.infos
    }

    pub fn count_code(&self, code: MessageCode) -> usize {
        self.messages
            .iter()
            .filter(|message| message.code() == code)
            .count()
    }

    pub fn messages(&self) -> &[ValidationMessage] {
        &self.messages
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.messages
            .iter()
            .filter(|message| message.severity() == Severity::Error)
    }

    pub fn has_authentication_error(&self) -> bool {
        self.errors().any(ValidationMessage::is_authentication)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_severity() {
        let mut result = ValidationResult::new();
        assert!(result.is_valid());
        result.info(MessageCode::ValueCorrected, "corrected");
        assert!(result.is_valid());
        result.error(MessageCode::UnknownField, "unknown");
        assert!(!result.is_valid());
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.info_count(), 1);
        assert_eq!(result.count(Severity::Error), 1);
        assert_eq!(result.count_code(MessageCode::UnknownField), 1);
    }

    #[test]
    fn merge_prefixes_outer_origins() {
        let mut outer = ValidationResult::with_origin(Origin::file("manifest.txt"));
        let mut inner = ValidationResult::with_origin(Origin::line(3));
        inner.add(
            ValidationMessage::error(MessageCode::UnknownField, "Unknown field: FOO")
                .with_origin(Origin::field("FOO")),
        );
        outer.merge(inner);

        let message = &outer.messages()[0];
        let names = message
            .origins()
            .iter()
            .map(|origin| origin.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["file", "line", "field"]);
        assert_eq!(
            message.to_string(),
            "ERROR: Unknown field: FOO [file: manifest.txt, line: 3, field: FOO]"
        );
        assert_eq!(outer.error_count(), 1);
    }

    #[test]
    fn authentication_flag_is_visible() {
        let mut result = ValidationResult::new();
        result.add(
            ValidationMessage::error(MessageCode::ReferenceLookup, "lookup failed")
                .with_authentication(),
        );
        assert!(result.has_authentication_error());
    }
}
