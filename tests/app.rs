use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_submit::app::{
    App, ProgressEvent, ProgressSink, SubmissionXmlGenerator, ValidateOptions,
};
use kira_submit::bundle::{SubmissionXmlFile, SubmissionXmlFileType};
use kira_submit::contexts::Context;
use kira_submit::error::KiraError;
use kira_submit::field::FieldDefinition;
use kira_submit::layout::SubmissionLayout;
use kira_submit::lookup::{LookupError, MetadataLookup, ReferenceKind, ResolvedReference};
use kira_submit::manifest::ManifestReaderResult;
use kira_submit::output::JsonOutput;
use kira_submit::processors::{FileSuffixProcessor, ReferenceProcessor};
use kira_submit::schema::{FileGroupTemplate, ManifestSchema};
use kira_submit::validation::MessageCode;

#[derive(Default)]
struct CountingGenerator {
    calls: Mutex<usize>,
}

impl SubmissionXmlGenerator for CountingGenerator {
    fn generate(
        &self,
        manifest: &ManifestReaderResult,
        layout: &SubmissionLayout,
    ) -> Result<Vec<SubmissionXmlFile>, KiraError> {
        *self.calls.lock().unwrap() += 1;
        let name = manifest.value("NAME").unwrap_or_default();
        Ok(vec![SubmissionXmlFile::new(
            SubmissionXmlFileType::Analysis,
            &layout.submit_dir(),
            format!("<ANALYSIS_SET><ANALYSIS alias=\"{name}\"/></ANALYSIS_SET>"),
        )])
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event.message);
    }
}

fn schema() -> ManifestSchema {
    ManifestSchema::builder()
        .field(FieldDefinition::meta("NAME").required())
        .field(FieldDefinition::file("FASTA").processor(FileSuffixProcessor::new([".fasta.gz"])))
        .file_group(FileGroupTemplate::new("fasta").file("FASTA", 1, 1))
        .build()
        .unwrap()
}

fn workspace() -> (tempfile::TempDir, Utf8PathBuf, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    std::fs::write(dir.join("a.fasta.gz").as_std_path(), b"\x1f\x8bcontent").unwrap();
    let manifest = dir.join("manifest.txt");
    std::fs::write(manifest.as_std_path(), "NAME my assembly\nFASTA a.fasta.gz\n").unwrap();
    (temp, dir, manifest)
}

#[test]
fn validate_writes_bundle_then_reuses_it() {
    let (_temp, dir, manifest) = workspace();
    let app = App::new(
        Context::Genome,
        schema(),
        dir.clone(),
        dir.join("out"),
        CountingGenerator::default(),
    );

    let sink = RecordingSink::default();
    let first = app
        .validate(&manifest, ValidateOptions::default(), &sink)
        .unwrap();
    assert!(first.valid);
    assert!(!first.cached);
    assert_eq!(
        first.submit_dir,
        Some(dir.join("out/genome/my_assembly/submit"))
    );
    let bundle = first.bundle.clone().unwrap();
    assert_eq!(bundle.upload_dir, "genome/my_assembly");
    assert_eq!(bundle.upload_files.len(), 1);
    assert!(bundle.xml_files[0].file.as_std_path().exists());
    assert!(first.report.as_std_path().exists());
    assert!(!sink.events.lock().unwrap().is_empty());

    let second = app
        .validate(&manifest, ValidateOptions::default(), &JsonOutput)
        .unwrap();
    assert!(second.valid);
    assert!(second.cached);
    assert_eq!(second.bundle, first.bundle);

    let forced = app
        .validate(&manifest, ValidateOptions { force: true }, &JsonOutput)
        .unwrap();
    assert!(!forced.cached);
    assert_eq!(*app_calls(&app), 2);
}

#[test]
fn check_reports_stale_bundle() {
    let (_temp, dir, manifest) = workspace();
    let app = App::new(
        Context::Genome,
        schema(),
        dir.clone(),
        dir.join("out"),
        CountingGenerator::default(),
    );
    app.validate(&manifest, ValidateOptions::default(), &JsonOutput)
        .unwrap();

    let check = app.check(&manifest, &JsonOutput).unwrap();
    assert!(check.reusable);
    assert!(check.findings.is_empty());

    std::fs::write(dir.join("a.fasta.gz").as_std_path(), b"\x1f\x8bchanged content").unwrap();
    let check = app.check(&manifest, &JsonOutput).unwrap();
    assert!(!check.reusable);
    assert_eq!(check.findings.len(), 1);
    assert_eq!(check.findings[0].code(), MessageCode::BundleUploadChanged);

    let revalidated = app
        .validate(&manifest, ValidateOptions::default(), &JsonOutput)
        .unwrap();
    assert!(!revalidated.cached);
    assert_eq!(revalidated.validation.count_code(MessageCode::BundleUploadChanged), 1);
}

#[test]
fn unreadable_manifest_is_reported_not_raised() {
    let (_temp, dir, _manifest) = workspace();
    let app = App::new(
        Context::Reads,
        schema(),
        dir.clone(),
        dir.join("out"),
        CountingGenerator::default(),
    );
    let result = app
        .validate(&dir.join("missing.txt"), ValidateOptions::default(), &JsonOutput)
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.errors, 1);
    assert_eq!(result.validation.count_code(MessageCode::ManifestRead), 1);
    assert!(result.report.as_std_path().exists());
}

fn app_calls(app: &App<CountingGenerator>) -> std::sync::MutexGuard<'_, usize> {
    app.generator().calls.lock().unwrap()
}

struct FailingGenerator;

impl SubmissionXmlGenerator for FailingGenerator {
    fn generate(
        &self,
        _manifest: &ManifestReaderResult,
        _layout: &SubmissionLayout,
    ) -> Result<Vec<SubmissionXmlFile>, KiraError> {
        Err(KiraError::XmlGeneration("analysis template missing".to_string()))
    }
}

#[test]
fn report_is_written_when_bundle_generation_fails() {
    let (_temp, dir, manifest) = workspace();
    let app = App::new(Context::Genome, schema(), dir.clone(), dir.join("out"), FailingGenerator);

    let result = app.validate(&manifest, ValidateOptions::default(), &JsonOutput);
    assert_matches!(result, Err(KiraError::XmlGeneration(_)));
    assert!(app.report_path().as_std_path().exists());
    assert!(!dir.join("out/genome/my_assembly/submit/submission-bundle.json").as_std_path().exists());
}

#[derive(Default)]
struct CountingLookup {
    calls: Mutex<usize>,
}

impl MetadataLookup for CountingLookup {
    fn resolve(&self, kind: ReferenceKind, id: &str) -> Result<ResolvedReference, LookupError> {
        *self.calls.lock().unwrap() += 1;
        Ok(ResolvedReference::new(kind, id))
    }
}

#[test]
fn check_makes_no_reference_lookups() {
    let (_temp, dir, manifest) = workspace();
    std::fs::write(
        manifest.as_std_path(),
        "NAME my assembly\nSAMPLE ERS000001\nFASTA a.fasta.gz\n",
    )
    .unwrap();
    let lookup = Arc::new(CountingLookup::default());
    let schema = ManifestSchema::builder()
        .field(FieldDefinition::meta("NAME").required())
        .field(
            FieldDefinition::meta("SAMPLE")
                .required()
                .processor(ReferenceProcessor::new(ReferenceKind::Sample, lookup.clone())),
        )
        .field(FieldDefinition::file("FASTA").processor(FileSuffixProcessor::new([".fasta.gz"])))
        .file_group(FileGroupTemplate::new("fasta").file("FASTA", 1, 1))
        .build()
        .unwrap();
    let app = App::new(
        Context::Genome,
        schema,
        dir.clone(),
        dir.join("out"),
        CountingGenerator::default(),
    );

    app.validate(&manifest, ValidateOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(*lookup.calls.lock().unwrap(), 1);

    let check = app.check(&manifest, &JsonOutput).unwrap();
    assert!(check.reusable);
    assert_eq!(check.submit_dir, Some(dir.join("out/genome/my_assembly/submit")));
    assert_eq!(*lookup.calls.lock().unwrap(), 1);
}
