use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::bundle::{SubmissionBundle, SubmissionXmlFile};
use crate::bundle_cache::BundleCache;
use crate::contexts::Context;
use crate::error::KiraError;
use crate::fs_util;
use crate::layout::SubmissionLayout;
use crate::manifest::{ManifestReader, ManifestReaderResult};
use crate::report::ValidationReport;
use crate::schema::ManifestSchema;
use crate::validation::{ValidationMessage, ValidationResult};

pub const REPORT_FILE_NAME: &str = "kira-submit.report";
pub const NAME_FIELD: &str = "NAME";

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateResult {
    pub context: Context,
    pub valid: bool,
    pub cached: bool,
    pub errors: usize,
    pub infos: usize,
    pub file_group: Option<String>,
    pub submit_dir: Option<Utf8PathBuf>,
    pub report: Utf8PathBuf,
    pub bundle: Option<SubmissionBundle>,
    pub validation: ValidationResult,
}

impl ValidateResult {
    pub fn has_authentication_error(&self) -> bool {
        self.validation.has_authentication_error()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub context: Context,
    pub reusable: bool,
    pub submit_dir: Option<Utf8PathBuf>,
    pub bundle_path: Option<Utf8PathBuf>,
    pub findings: Vec<ValidationMessage>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Produces the submission XML documents for a validated manifest.
pub trait SubmissionXmlGenerator {
    fn generate(
        &self,
        manifest: &ManifestReaderResult,
        layout: &SubmissionLayout,
    ) -> Result<Vec<SubmissionXmlFile>, KiraError>;
}

/// Generator for callers that only need the upload plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopXmlGenerator;

impl SubmissionXmlGenerator for NopXmlGenerator {
    fn generate(
        &self,
        _manifest: &ManifestReaderResult,
        _layout: &SubmissionLayout,
    ) -> Result<Vec<SubmissionXmlFile>, KiraError> {
        Ok(Vec::new())
    }
}

pub struct App<G: SubmissionXmlGenerator> {
    context: Context,
    schema: ManifestSchema,
    input_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
    generator: G,
}

impl<G: SubmissionXmlGenerator> App<G> {
    pub fn new(
        context: Context,
        schema: ManifestSchema,
        input_dir: impl Into<Utf8PathBuf>,
        output_dir: impl Into<Utf8PathBuf>,
        generator: G,
    ) -> Self {
        Self {
            context,
            schema,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            generator,
        }
    }

    pub fn schema(&self) -> &ManifestSchema {
        &self.schema
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }

    /// Validates `manifest` and, when it is valid, produces the submission
    /// bundle or reuses the one persisted by an earlier run. The report is
    /// written in every case.
    pub fn validate(
        &self,
        manifest: &Utf8Path,
        options: ValidateOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ValidateResult, KiraError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Read; manifest {manifest}"),
            elapsed: None,
        });
        let manifest_md5 = fs_util::md5_file(manifest).ok();

        let mut validation = ValidationResult::new();
        let parsed = ManifestReader::new(&self.schema, self.input_dir.clone())
            .read_file(manifest, &mut validation);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Validate; {} error(s), {} info message(s)",
                validation.error_count(),
                validation.info_count()
            ),
            elapsed: Some(started.elapsed()),
        });

        let layout = parsed.as_ref().and_then(|parsed| self.layout(parsed));
        let mut bundle = None;
        let mut cached = false;
        let mut bundle_error = None;

        if let (Some(parsed), Some(layout), Some(md5), true) = (
            parsed.as_ref(),
            layout.as_ref(),
            manifest_md5.as_deref(),
            validation.is_valid(),
        ) {
            let cache = BundleCache::new(layout.submit_dir());
            if !options.force {
                bundle = cache.read_checked(Some(md5), &mut validation);
                cached = bundle.is_some();
            }
            if bundle.is_none() {
                sink.event(ProgressEvent {
                    message: format!("phase=Bundle; {}", layout.submit_dir()),
                    elapsed: Some(started.elapsed()),
                });
                match self.create_bundle(parsed, layout, &cache, md5) {
                    Ok(created) => bundle = Some(created),
                    Err(err) => bundle_error = Some(err),
                }
            }
        }

        let report = self.write_report(&validation)?;
        if let Some(err) = bundle_error {
            return Err(err);
        }
        sink.event(ProgressEvent {
            message: if cached {
                "phase=Done; reused submission bundle".to_string()
            } else {
                "phase=Done".to_string()
            },
            elapsed: Some(started.elapsed()),
        });

        Ok(ValidateResult {
            context: self.context,
            valid: validation.is_valid(),
            cached,
            errors: validation.error_count(),
            infos: validation.info_count(),
            file_group: parsed
                .as_ref()
                .and_then(|parsed| parsed.file_group().map(str::to_string)),
            submit_dir: layout.as_ref().map(SubmissionLayout::submit_dir),
            report,
            bundle,
            validation,
        })
    }

    /// Reports whether the bundle of a previous run can still be used for
    /// `manifest`, listing what changed when it cannot.
    /// Only the manifest structure is read; value processors and their
    /// remote lookups are skipped.
    pub fn check(&self, manifest: &Utf8Path, sink: &dyn ProgressSink) -> Result<CheckResult, KiraError> {
        sink.event(ProgressEvent {
            message: format!("phase=Check; manifest {manifest}"),
            elapsed: None,
        });
        let manifest_md5 = fs_util::md5_file(manifest)
            .map_err(|err| KiraError::Filesystem(format!("{manifest}: {err}")))?;

        let mut validation = ValidationResult::new();
        let layout = ManifestReader::new(&self.schema, self.input_dir.clone())
            .structure_only()
            .read_file(manifest, &mut validation)
            .and_then(|parsed| self.layout(&parsed));
        let Some(layout) = layout else {
            return Ok(CheckResult {
                context: self.context,
                reusable: false,
                submit_dir: None,
                bundle_path: None,
                findings: validation.errors().cloned().collect(),
            });
        };

        let cache = BundleCache::new(layout.submit_dir());
        let mut findings = ValidationResult::new();
        let reusable = cache
            .read_checked(Some(&manifest_md5), &mut findings)
            .is_some();
        let bundle_path = cache.bundle_path();
        Ok(CheckResult {
            context: self.context,
            reusable,
            submit_dir: Some(layout.submit_dir()),
            bundle_path: bundle_path.as_std_path().exists().then_some(bundle_path),
            findings: findings.messages().to_vec(),
        })
    }

    fn create_bundle(
        &self,
        manifest: &ManifestReaderResult,
        layout: &SubmissionLayout,
        cache: &BundleCache,
        manifest_md5: &str,
    ) -> Result<SubmissionBundle, KiraError> {
        layout.ensure_dirs()?;
        let xml_files = self.generator.generate(manifest, layout)?;
        let created = SubmissionBundle::new(
            layout.submit_dir(),
            layout.upload_dir(),
            manifest.submission_files().into_iter().map(|file| file.path),
            xml_files,
            manifest_md5,
        )?;
        cache.write(created)
    }

    fn layout(&self, manifest: &ManifestReaderResult) -> Option<SubmissionLayout> {
        manifest.value(NAME_FIELD).map(|name| {
            SubmissionLayout::new(self.output_dir.clone(), self.context.as_str(), name)
        })
    }

    fn write_report(&self, validation: &ValidationResult) -> Result<Utf8PathBuf, KiraError> {
        let mut report = ValidationReport::create(&self.report_path())?;
        report.write_result(validation)?;
        report.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDefinition;
    use crate::processors::FileSuffixProcessor;
    use crate::schema::FileGroupTemplate;

    struct Silent;

    impl ProgressSink for Silent {
        fn event(&self, _event: ProgressEvent) {}
    }

    fn schema() -> ManifestSchema {
        ManifestSchema::builder()
            .field(FieldDefinition::meta("NAME").required())
            .field(FieldDefinition::file("FASTA").processor(FileSuffixProcessor::new([".fasta"])))
            .file_group(FileGroupTemplate::new("fasta").file("FASTA", 1, 1))
            .build()
            .unwrap()
    }

    #[test]
    fn invalid_manifest_still_writes_report() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let manifest = dir.join("manifest.txt");
        std::fs::write(manifest.as_std_path(), "NAME x\n").unwrap();

        let app = App::new(Context::Genome, schema(), dir.clone(), dir.join("out"), NopXmlGenerator);
        let result = app.validate(&manifest, ValidateOptions::default(), &Silent).unwrap();
        assert!(!result.valid);
        assert!(result.bundle.is_none());
        let report = std::fs::read_to_string(result.report.as_std_path()).unwrap();
        assert!(report.contains("ERROR: No data files supplied"));
    }

    #[test]
    fn missing_name_has_no_submit_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let manifest = dir.join("manifest.txt");
        std::fs::write(dir.join("a.fasta").as_std_path(), ">a\nAC\n").unwrap();
        std::fs::write(manifest.as_std_path(), "FASTA a.fasta\n").unwrap();

        let app = App::new(Context::Genome, schema(), dir.clone(), dir.join("out"), NopXmlGenerator);
        let result = app.validate(&manifest, ValidateOptions::default(), &Silent).unwrap();
        assert!(!result.valid);
        assert!(result.submit_dir.is_none());
        assert_eq!(result.file_group.as_deref(), Some("fasta"));
    }
}
