use std::str::FromStr;
use std::sync::Arc;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_submit::contexts::{self, Context};
use kira_submit::error::KiraError;
use kira_submit::lookup::{LookupError, MetadataLookup, ReferenceKind, ResolvedReference};
use kira_submit::manifest::ManifestReader;
use kira_submit::validation::{MessageCode, ValidationResult};

struct AcceptAll;

impl MetadataLookup for AcceptAll {
    fn resolve(&self, kind: ReferenceKind, id: &str) -> Result<ResolvedReference, LookupError> {
        Ok(ResolvedReference::new(kind, id))
    }
}

struct RejectAuth;

impl MetadataLookup for RejectAuth {
    fn resolve(&self, _kind: ReferenceKind, _id: &str) -> Result<ResolvedReference, LookupError> {
        Err(LookupError::auth("401 Unauthorized"))
    }
}

fn input_dir(files: &[&str]) -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    for file in files {
        std::fs::write(dir.join(file).as_std_path(), b"data").unwrap();
    }
    (temp, dir)
}

#[test]
fn context_parses_case_insensitively() {
    assert_eq!(Context::from_str("Genome").unwrap(), Context::Genome);
    assert_eq!(Context::from_str("reads").unwrap(), Context::Reads);
    assert_matches!(Context::from_str("protein"), Err(KiraError::UnknownContext(_)));
}

#[test]
fn builtin_schemas_build() {
    for context in [Context::Genome, Context::Reads] {
        let schema = context.schema(Arc::new(AcceptAll)).unwrap();
        assert!(schema.field("NAME").unwrap().is_required());
        assert_eq!(schema.info_field(), Some(contexts::INFO_FIELD));
        assert!(!schema.file_groups().is_empty());
    }
}

#[test]
fn genome_manifest_with_chromosome_list() {
    let (_temp, dir) = input_dir(&["contigs.fasta.gz", "chromosomes.txt.gz"]);
    let schema = contexts::genome(Arc::new(AcceptAll)).unwrap();
    let text = "\
ASSEMBLYNAME asm1
STUDY PRJEB1
SAMPLE ERS1
COVERAGE 30
PROGRAM SPAdes
PLATFORM Illumina
MOLECULETYPE genomic dna
FASTA contigs.fasta.gz
CHROMOSOME_LIST chromosomes.txt.gz
";
    let mut result = ValidationResult::new();
    let manifest = ManifestReader::new(&schema, dir).parse_str(text, &mut result);
    assert!(result.is_valid(), "{:?}", result.messages());
    assert_eq!(manifest.file_group(), Some("fasta with chromosome list"));
    assert_eq!(manifest.value("MOLECULETYPE"), Some("genomic DNA"));
    assert_eq!(result.count_code(MessageCode::ValueCorrected), 1);
}

#[test]
fn reads_json_manifest_with_read_types() {
    let (_temp, dir) = input_dir(&["r1.fastq.gz", "r2.fastq.gz"]);
    let schema = contexts::reads(Arc::new(AcceptAll)).unwrap();
    let text = r#"{
        "NAME": "run1",
        "STUDY": "PRJEB1",
        "SAMPLE": "ERS1",
        "INSTRUMENT": "Illumina MiSeq",
        "LIBRARY_SOURCE": "GENOMIC",
        "LIBRARY_SELECTION": "RANDOM",
        "LIBRARY_STRATEGY": "WGS",
        "FASTQ": [
            { "value": "r1.fastq.gz", "attributes": { "READ_TYPE": "paired" } },
            { "value": "r2.fastq.gz", "attributes": { "READ_TYPE": "paired" } }
        ]
    }"#;
    let mut result = ValidationResult::new();
    let manifest = ManifestReader::new(&schema, dir).parse_str(text, &mut result);
    assert!(result.is_empty(), "{:?}", result.messages());
    assert_eq!(manifest.file_group(), Some("fastq"));
    let files = manifest.files("FASTQ");
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|file| file.attributes[0].1 == "paired"));
}

#[test]
fn mixed_reads_files_are_rejected() {
    let (_temp, dir) = input_dir(&["a.bam", "b.cram"]);
    let schema = contexts::reads(Arc::new(AcceptAll)).unwrap();
    let text = "NAME r\nSTUDY P\nSAMPLE S\nINSTRUMENT unspecified\nLIBRARY_SOURCE OTHER\n\
LIBRARY_SELECTION other\nLIBRARY_STRATEGY OTHER\nBAM a.bam\nCRAM b.cram\n";
    let mut result = ValidationResult::new();
    let manifest = ManifestReader::new(&schema, dir).parse_str(text, &mut result);
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.count_code(MessageCode::InvalidFileGroup), 1);
    assert!(manifest.file_group().is_none());
}

#[test]
fn lookup_authentication_failure_is_flagged() {
    let (_temp, dir) = input_dir(&["contigs.fasta.gz"]);
    let schema = contexts::genome(Arc::new(RejectAuth)).unwrap();
    let text = "NAME a\nSTUDY PRJEB1\nSAMPLE ERS1\nCOVERAGE 1\nPROGRAM x\nPLATFORM y\n\
FASTA contigs.fasta.gz\n";
    let mut result = ValidationResult::new();
    ManifestReader::new(&schema, dir).parse_str(text, &mut result);
    assert_eq!(result.count_code(MessageCode::ReferenceLookup), 2);
    assert!(result.has_authentication_error());
}
