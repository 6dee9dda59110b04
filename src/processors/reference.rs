use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::field::FieldValue;
use crate::lookup::{LookupErrorKind, MetadataLookup, ReferenceKind, ResolvedReference};
use crate::validation::{MessageCode, Origin, ValidationMessage, ValidationResult};

/// Replaces study, sample, run or analysis references with the identifiers the
/// archive knows them by.
#[derive(Clone)]
pub struct ReferenceProcessor {
    kind: ReferenceKind,
    lookup: Arc<dyn MetadataLookup>,
}

impl fmt::Debug for ReferenceProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceProcessor")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ReferenceProcessor {
    pub fn new(kind: ReferenceKind, lookup: Arc<dyn MetadataLookup>) -> Self {
        Self { kind, lookup }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Resolves every distinct token. All tokens are attempted even after a
    /// failure; any failure discards the successfully resolved ones.
    pub fn resolve(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Vec<ResolvedReference>, Vec<ValidationMessage>> {
        let tokens = split_tokens(value);
        if tokens.is_empty() {
            return Err(vec![ValidationMessage::error(
                MessageCode::ReferenceLookup,
                format!("No {} reference given for field {field}", self.kind),
            )]);
        }

        let mut resolved = Vec::with_capacity(tokens.len());
        let mut failures = Vec::new();
        for token in tokens {
            match self.lookup.resolve(self.kind, token) {
                Ok(reference) => resolved.push(reference),
                Err(err) => {
                    let message = match err.kind {
                        LookupErrorKind::Auth => ValidationMessage::error(
                            MessageCode::ReferenceLookup,
                            format!(
                                "Authentication failed while looking up {} \"{token}\" for field {field}",
                                self.kind
                            ),
                        )
                        .with_authentication(),
                        LookupErrorKind::NotFound => ValidationMessage::error(
                            MessageCode::ReferenceLookup,
                            format!("Unknown {} \"{token}\" for field {field}", self.kind),
                        ),
                        LookupErrorKind::System => ValidationMessage::error(
                            MessageCode::ReferenceLookup,
                            format!(
                                "Could not look up {} \"{token}\" for field {field}",
                                self.kind
                            ),
                        ),
                    };
                    failures.push(
                        message
                            .with_cause(err.message)
                            .with_origin(Origin::new(self.kind.as_str(), token)),
                    );
                }
            }
        }

        if failures.is_empty() {
            Ok(resolved)
        } else {
            Err(failures)
        }
    }

    pub fn apply(&self, value: FieldValue, result: &mut ValidationResult) -> FieldValue {
        match self.resolve(value.field(), value.value()) {
            Ok(references) => {
                let canonical = canonical_ids(&references).join(", ");
                value.with_value(canonical).with_references(references)
            }
            Err(messages) => {
                for message in messages {
                    result.add(message);
                }
                value
            }
        }
    }
}

/// Comma-separated, trimmed, non-empty, first occurrence wins.
pub fn split_tokens(value: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter(|token| seen.insert(*token))
        .collect()
}

fn canonical_ids(references: &[ResolvedReference]) -> Vec<&str> {
    let mut seen = HashSet::new();
    references
        .iter()
        .map(|reference| reference.canonical_id.as_str())
        .filter(|id| seen.insert(*id))
        .collect()
}
