use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bundle::{SubmissionBundle, TOOL_VERSION};
use crate::error::KiraError;
use crate::fs_util;
use crate::validation::{MessageCode, Origin, ValidationMessage, ValidationResult};

pub const BUNDLE_FILE_NAME: &str = "submission-bundle.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    bundle: &'a SubmissionBundle,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    bundle: serde_json::Value,
}

/// Persists a submission bundle in its submit directory and hands it back
/// only while nothing it depends on has changed.
#[derive(Debug, Clone)]
pub struct BundleCache {
    submit_dir: Utf8PathBuf,
}

impl BundleCache {
    pub fn new(submit_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            submit_dir: submit_dir.into(),
        }
    }

    pub fn submit_dir(&self) -> &Utf8Path {
        &self.submit_dir
    }

    pub fn bundle_path(&self) -> Utf8PathBuf {
        self.submit_dir.join(BUNDLE_FILE_NAME)
    }

    /// Stamps XML digests, writes every XML file and then the bundle itself.
    pub fn write(&self, mut bundle: SubmissionBundle) -> Result<SubmissionBundle, KiraError> {
        for xml in &mut bundle.xml_files {
            xml.stamp_md5();
            fs_util::write_bytes_atomic(&xml.file, xml.content.as_bytes())?;
        }
        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION,
            bundle: &bundle,
        };
        let content = serde_json::to_vec_pretty(&envelope)
            .map_err(|err| KiraError::BundleSerialization(err.to_string()))?;
        let path = self.bundle_path();
        fs_util::write_bytes_atomic(&path, &content)?;
        info!(path = %path, xml_files = bundle.xml_files.len(), "submission bundle written");
        Ok(bundle)
    }

    /// Deserializes the stored bundle without checking it against anything.
    pub fn load(&self) -> Option<SubmissionBundle> {
        let path = self.bundle_path();
        let content = match fs::read(path.as_std_path()) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %path, error = %err, "no submission bundle");
                return None;
            }
        };
        let envelope: Envelope = match serde_json::from_slice(&content) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(path = %path, error = %err, "unreadable submission bundle");
                return None;
            }
        };
        if envelope.format_version != FORMAT_VERSION {
            warn!(
                path = %path,
                format_version = envelope.format_version,
                "unsupported submission bundle format"
            );
            return None;
        }
        match serde_json::from_value(envelope.bundle) {
            Ok(bundle) => Some(bundle),
            Err(err) => {
                warn!(path = %path, error = %err, "unreadable submission bundle");
                None
            }
        }
    }

    pub fn read(&self, expected_manifest_md5: Option<&str>) -> Option<SubmissionBundle> {
        self.read_checked(expected_manifest_md5, &mut ValidationResult::new())
    }

    /// Like [`BundleCache::read`], recording why a stored bundle is stale as
    /// INFO messages in `result`.
    pub fn read_checked(
        &self,
        expected_manifest_md5: Option<&str>,
        result: &mut ValidationResult,
    ) -> Option<SubmissionBundle> {
        let mut bundle = self.load()?;
        if let Some(expected) = expected_manifest_md5
            && !bundle.manifest_md5.eq_ignore_ascii_case(expected)
        {
            info!(path = %self.bundle_path(), "manifest changed since bundle was written");
            result.info(
                MessageCode::BundleManifestChanged,
                "Manifest file has changed since the submission bundle was written",
            );
            return None;
        }

        let findings = check_staleness(&bundle);
        if !findings.is_empty() {
            info!(
                path = %self.bundle_path(),
                findings = findings.info_count(),
                "submission bundle is stale"
            );
            result.merge(findings);
            return None;
        }

        for xml in &mut bundle.xml_files {
            match fs::read_to_string(xml.file.as_std_path()) {
                Ok(content) => xml.content = content,
                Err(err) => {
                    warn!(path = %xml.file, error = %err, "submission xml vanished");
                    return None;
                }
            }
        }
        info!(path = %self.bundle_path(), "reusing submission bundle");
        Some(bundle)
    }
}

/// INFO findings for everything that changed since `bundle` was written.
pub fn check_staleness(bundle: &SubmissionBundle) -> ValidationResult {
    let mut result = ValidationResult::new();
    if bundle.version != TOOL_VERSION {
        result.info(
            MessageCode::BundleVersion,
            format!(
                "Submission bundle was written by version {} (current {TOOL_VERSION})",
                bundle.version
            ),
        );
    }

    for xml in &bundle.xml_files {
        let origin = Origin::file(&xml.file);
        match fs_util::md5_file(&xml.file) {
            Err(_) => result.add(
                ValidationMessage::info(
                    MessageCode::BundleXmlMissing,
                    format!("Submission {} XML file is missing", xml.file_type),
                )
                .with_origin(origin),
            ),
            Ok(md5) if xml.md5.as_deref() != Some(md5.as_str()) => result.add(
                ValidationMessage::info(
                    MessageCode::BundleXmlChanged,
                    format!("Submission {} XML file has changed", xml.file_type),
                )
                .with_origin(origin),
            ),
            Ok(_) => {}
        }
    }

    for upload in &bundle.upload_files {
        let origin = Origin::file(&upload.path);
        let finding = match fs::metadata(upload.path.as_std_path()) {
            Err(_) => Some("is missing".to_string()),
            Ok(metadata) if metadata.is_dir() => Some("is a directory".to_string()),
            Ok(metadata) if metadata.len() != upload.size => Some(format!(
                "size changed from {} to {} bytes",
                upload.size,
                metadata.len()
            )),
            Ok(_) => None,
        };
        if let Some(finding) = finding {
            result.add(
                ValidationMessage::info(
                    MessageCode::BundleUploadChanged,
                    format!("Upload file {finding}"),
                )
                .with_origin(origin),
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{SubmissionXmlFile, SubmissionXmlFileType};

    fn bundle(dir: &Utf8Path) -> SubmissionBundle {
        let data = dir.join("data.fasta");
        fs::write(data.as_std_path(), b">x\nACGT\n").unwrap();
        let submit = dir.join("submit");
        SubmissionBundle::new(
            submit.clone(),
            "genome/x",
            [data],
            vec![SubmissionXmlFile::new(
                SubmissionXmlFileType::Analysis,
                &submit,
                "<ANALYSIS_SET/>",
            )],
            "d41d8cd98f00b204e9800998ecf8427e",
        )
        .unwrap()
    }

    #[test]
    fn unknown_format_version_is_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let cache = BundleCache::new(dir.clone());
        fs_util::write_bytes_atomic(
            &cache.bundle_path(),
            br#"{"format_version": 99, "bundle": {}}"#,
        )
        .unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn garbage_is_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let cache = BundleCache::new(dir);
        fs_util::write_bytes_atomic(&cache.bundle_path(), b"not json").unwrap();
        assert!(cache.read(None).is_none());
    }

    #[test]
    fn version_mismatch_is_stale() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut stored = bundle(&dir);
        stored.version = "0.0.0-old".to_string();
        let cache = BundleCache::new(dir.join("submit"));
        cache.write(stored).unwrap();

        let mut result = ValidationResult::new();
        assert!(cache.read_checked(None, &mut result).is_none());
        assert_eq!(result.count_code(MessageCode::BundleVersion), 1);
        assert!(result.is_valid());
    }

    #[test]
    fn written_xml_matches_stamped_md5() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let cache = BundleCache::new(dir.join("submit"));
        let written = cache.write(bundle(&dir)).unwrap();
        let xml = &written.xml_files[0];
        assert_eq!(
            xml.md5.as_deref(),
            Some(fs_util::md5_file(&xml.file).unwrap().as_str())
        );
        assert!(check_staleness(&written).is_empty());
    }
}
