use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::fs_util;

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionXmlFileType {
    Analysis,
    Experiment,
    Run,
    Submission,
}

impl SubmissionXmlFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionXmlFileType::Analysis => "ANALYSIS",
            SubmissionXmlFileType::Experiment => "EXPERIMENT",
            SubmissionXmlFileType::Run => "RUN",
            SubmissionXmlFileType::Submission => "SUBMISSION",
        }
    }

    /// `analysis.xml`, `run.xml`, ...
    pub fn file_name(&self) -> String {
        format!("{}.xml", self.as_str().to_ascii_lowercase())
    }
}

impl fmt::Display for SubmissionXmlFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionXmlFile {
    pub file_type: SubmissionXmlFileType,
    pub file: Utf8PathBuf,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(skip)]
    pub content: String,
}

impl SubmissionXmlFile {
    /// An XML payload destined for `submit_dir`, not yet stamped with its digest.
    pub fn new(
        file_type: SubmissionXmlFileType,
        submit_dir: &Utf8Path,
        content: impl Into<String>,
    ) -> Self {
        Self {
            file_type,
            file: submit_dir.join(file_type.file_name()),
            md5: None,
            content: content.into(),
        }
    }

    /// Records the digest of the current content. Later calls keep the first digest.
    pub fn stamp_md5(&mut self) -> &str {
        self.md5
            .get_or_insert_with(|| fs_util::md5_hex(self.content.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub path: Utf8PathBuf,
    pub size: u64,
}

impl UploadFile {
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> Result<Self, KiraError> {
        let path = path.into();
        let metadata = fs::metadata(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        Ok(Self {
            path,
            size: metadata.len(),
        })
    }
}

/// Everything a submission needs once validation succeeded: the generated
/// XML documents and the files to upload with the sizes seen at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionBundle {
    pub version: String,
    pub submit_dir: Utf8PathBuf,
    pub upload_dir: String,
    pub upload_files: Vec<UploadFile>,
    pub xml_files: Vec<SubmissionXmlFile>,
    pub manifest_md5: String,
}

impl SubmissionBundle {
    pub fn new(
        submit_dir: impl Into<Utf8PathBuf>,
        upload_dir: impl Into<String>,
        upload_files: impl IntoIterator<Item = Utf8PathBuf>,
        xml_files: Vec<SubmissionXmlFile>,
        manifest_md5: impl Into<String>,
    ) -> Result<Self, KiraError> {
        let upload_files = upload_files
            .into_iter()
            .map(UploadFile::from_path)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            version: TOOL_VERSION.to_string(),
            submit_dir: submit_dir.into(),
            upload_dir: upload_dir.into(),
            upload_files,
            xml_files,
            manifest_md5: manifest_md5.into(),
        })
    }

    pub fn xml_file(&self, file_type: SubmissionXmlFileType) -> Option<&SubmissionXmlFile> {
        self.xml_files
            .iter()
            .find(|xml| xml.file_type == file_type)
    }

    pub fn upload_size(&self) -> u64 {
        self.upload_files.iter().map(|file| file.size).sum()
    }
}
