//! Value processors applied, in declaration order, to every occurrence of a field.

mod cv;
mod reference;
mod suffix;

pub use cv::{CvMatch, CvProcessor};
pub use reference::{ReferenceProcessor, split_tokens};
pub use suffix::FileSuffixProcessor;

use crate::field::FieldValue;
use crate::validation::ValidationResult;

#[derive(Debug, Clone)]
pub enum ValueProcessor {
    ControlledVocabulary(CvProcessor),
    FileSuffix(FileSuffixProcessor),
    Reference(ReferenceProcessor),
}

impl ValueProcessor {
    pub fn apply(&self, value: FieldValue, result: &mut ValidationResult) -> FieldValue {
        match self {
            ValueProcessor::ControlledVocabulary(processor) => processor.apply(value, result),
            ValueProcessor::FileSuffix(processor) => processor.apply(value, result),
            ValueProcessor::Reference(processor) => processor.apply(value, result),
        }
    }
}

impl From<CvProcessor> for ValueProcessor {
    fn from(value: CvProcessor) -> Self {
        ValueProcessor::ControlledVocabulary(value)
    }
}

impl From<FileSuffixProcessor> for ValueProcessor {
    fn from(value: FileSuffixProcessor) -> Self {
        ValueProcessor::FileSuffix(value)
    }
}

impl From<ReferenceProcessor> for ValueProcessor {
    fn from(value: ReferenceProcessor) -> Self {
        ValueProcessor::Reference(value)
    }
}
