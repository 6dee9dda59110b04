use crate::field::FieldValue;
use crate::validation::{MessageCode, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSuffixProcessor {
    suffixes: Vec<String>,
}

impl FileSuffixProcessor {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.suffixes.is_empty()
            || self
                .suffixes
                .iter()
                .any(|suffix| value.ends_with(suffix.as_str()))
    }

    pub fn apply(&self, value: FieldValue, result: &mut ValidationResult) -> FieldValue {
        if !self.accepts(value.value()) {
            result.error(
                MessageCode::InvalidFileSuffix,
                format!(
                    "Invalid file suffix for field {}: \"{}\". Valid file suffixes are: {}",
                    value.field(),
                    value.value(),
                    self.suffixes.join(", ")
                ),
            );
        }
        value
    }
}
