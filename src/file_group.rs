use std::collections::BTreeMap;

use crate::schema::FileGroupTemplate;
use crate::validation::{MessageCode, ValidationResult};

/// Realized number of valid files per file field.
pub type FileCounts = BTreeMap<String, usize>;

/// A template matches when every named field is within bounds and no file
/// field outside the template has files.
pub fn template_matches(template: &FileGroupTemplate, counts: &FileCounts) -> bool {
    let named_within_bounds = template.entries().iter().all(|entry| {
        entry
            .limits
            .contains(counts.get(&entry.field).copied().unwrap_or(0))
    });
    let nothing_outside = counts
        .iter()
        .all(|(field, count)| *count == 0 || template.names_field(field));
    named_within_bounds && nothing_outside
}

pub fn matching_templates<'a>(
    templates: &'a [FileGroupTemplate],
    counts: &FileCounts,
) -> Vec<&'a FileGroupTemplate> {
    templates
        .iter()
        .filter(|template| template_matches(template, counts))
        .collect()
}

/// Picks the single template satisfied by `counts`, reporting an error when
/// none or more than one matches.
pub fn match_file_group<'a>(
    templates: &'a [FileGroupTemplate],
    counts: &FileCounts,
    result: &mut ValidationResult,
) -> Option<&'a FileGroupTemplate> {
    let matches = matching_templates(templates, counts);
    match matches.as_slice() {
        [single] => {
            tracing::debug!(group = single.name(), "file group matched");
            Some(*single)
        }
        [] => {
            let total: usize = counts.values().sum();
            let available = describe(templates);
            if total == 0 {
                result.error(
                    MessageCode::NoDataFiles,
                    format!("No data files supplied. Expected file groups: {available}"),
                );
            } else {
                result.error(
                    MessageCode::InvalidFileGroup,
                    format!(
                        "Invalid file group: {}. Expected file groups: {available}",
                        describe_counts(counts)
                    ),
                );
            }
            None
        }
        several => {
            result.error(
                MessageCode::AmbiguousFileGroup,
                format!(
                    "Ambiguous file group: {} matches {}",
                    describe_counts(counts),
                    several
                        .iter()
                        .map(|template| template.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            );
            None
        }
    }
}

fn describe(templates: &[FileGroupTemplate]) -> String {
    templates
        .iter()
        .map(|template| template.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_counts(counts: &FileCounts) -> String {
    counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(field, count)| format!("{field}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> Vec<FileGroupTemplate> {
        vec![
            FileGroupTemplate::new("a").file("A", 1, 1),
            FileGroupTemplate::new("b").file("B", 1, 2),
        ]
    }

    fn counts(pairs: &[(&str, usize)]) -> FileCounts {
        let mut counts = FileCounts::from([("A".to_string(), 0), ("B".to_string(), 0)]);
        for (field, count) in pairs {
            counts.insert(field.to_string(), *count);
        }
        counts
    }

    #[test]
    fn accepted_shapes_match_without_errors() {
        let templates = templates();
        for (input, expected) in [
            (counts(&[("A", 1)]), "a"),
            (counts(&[("B", 1)]), "b"),
            (counts(&[("B", 2)]), "b"),
        ] {
            let mut result = ValidationResult::new();
            let matched = match_file_group(&templates, &input, &mut result).unwrap();
            assert_eq!(matched.name(), expected);
            assert!(result.is_empty());
        }
    }

    #[test]
    fn mixed_and_overfull_are_invalid_groups() {
        let templates = templates();
        for input in [counts(&[("A", 1), ("B", 1)]), counts(&[("B", 3)])] {
            let mut result = ValidationResult::new();
            assert!(match_file_group(&templates, &input, &mut result).is_none());
            assert_eq!(result.error_count(), 1);
            assert_eq!(result.count_code(MessageCode::InvalidFileGroup), 1);
        }
    }

    #[test]
    fn no_files_reports_available_groups() {
        let templates = templates();
        let mut result = ValidationResult::new();
        assert!(match_file_group(&templates, &counts(&[]), &mut result).is_none());
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.count_code(MessageCode::NoDataFiles), 1);
        assert!(result.messages()[0].text().contains("a [A=1]; b [B=1-2]"));
    }

    #[test]
    fn ambiguity_is_never_silently_resolved() {
        let templates = vec![
            FileGroupTemplate::new("one").file("A", 1, 1),
            FileGroupTemplate::new("any").file("A", 0, 1),
        ];
        let mut result = ValidationResult::new();
        assert!(match_file_group(&templates, &counts(&[("A", 1)]), &mut result).is_none());
        assert_eq!(result.count_code(MessageCode::AmbiguousFileGroup), 1);
    }
}
