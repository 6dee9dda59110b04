use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("missing config file kira-submit.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid manifest schema: {0}")]
    InvalidSchema(String),

    #[error("unknown submission context: {0}")]
    UnknownContext(String),

    #[error("reference lookup request failed: {0}")]
    LookupHttp(String),

    #[error("authentication failed: {0}")]
    #[diagnostic(help("check the lookup username and KIRA_SUBMIT_PASSWORD"))]
    Authentication(String),

    #[error("manifest validation failed with {errors} error(s)")]
    #[diagnostic(help("see the validation report for details"))]
    ValidationFailed { errors: usize },

    #[error("failed to serialize submission bundle: {0}")]
    BundleSerialization(String),

    #[error("failed to generate submission xml: {0}")]
    XmlGeneration(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
