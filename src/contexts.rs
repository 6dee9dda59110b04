//! Built-in manifest schemas.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::field::FieldDefinition;
use crate::lookup::{MetadataLookup, ReferenceKind};
use crate::processors::{CvProcessor, FileSuffixProcessor, ReferenceProcessor};
use crate::schema::{FileGroupTemplate, ManifestSchema};

pub const INFO_FIELD: &str = "INFO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Genome,
    Reads,
}

impl Context {
    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Genome => "genome",
            Context::Reads => "reads",
        }
    }

    pub fn schema(&self, lookup: Arc<dyn MetadataLookup>) -> Result<ManifestSchema, KiraError> {
        match self {
            Context::Genome => genome(lookup),
            Context::Reads => reads(lookup),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "genome" => Ok(Context::Genome),
            "reads" => Ok(Context::Reads),
            _ => Err(KiraError::UnknownContext(value.to_string())),
        }
    }
}

const PLATFORMS: &[&str] = &[
    "ILLUMINA",
    "OXFORD_NANOPORE",
    "PACBIO_SMRT",
    "ION_TORRENT",
    "LS454",
    "BGISEQ",
    "DNBSEQ",
    "ELEMENT",
    "ULTIMA",
];

fn reference(kind: ReferenceKind, lookup: &Arc<dyn MetadataLookup>) -> ReferenceProcessor {
    ReferenceProcessor::new(kind, Arc::clone(lookup))
}

fn suffixes(list: &[&str]) -> FileSuffixProcessor {
    FileSuffixProcessor::new(list.iter().copied())
}

/// Genome assembly submissions: one sequence file, optionally with AGP and
/// chromosome lists.
pub fn genome(lookup: Arc<dyn MetadataLookup>) -> Result<ManifestSchema, KiraError> {
    let text = [".txt", ".txt.gz"];
    ManifestSchema::builder()
        .field(
            FieldDefinition::meta("NAME")
                .required()
                .synonym("ASSEMBLYNAME")
                .description("Unique assembly name"),
        )
        .field(
            FieldDefinition::meta("STUDY")
                .required()
                .processor(reference(ReferenceKind::Study, &lookup)),
        )
        .field(
            FieldDefinition::meta("SAMPLE")
                .required()
                .processor(reference(ReferenceKind::Sample, &lookup)),
        )
        .field(FieldDefinition::meta("DESCRIPTION"))
        .field(
            FieldDefinition::meta("ASSEMBLY_TYPE").processor(CvProcessor::new([
                "clone or isolate",
                "primary metagenome",
                "binned metagenome",
                "Metagenome-Assembled Genome (MAG)",
                "Environmental Single-Cell Amplified Genome (SAG)",
                "COVID-19 outbreak",
            ])),
        )
        .field(FieldDefinition::meta("COVERAGE").required())
        .field(FieldDefinition::meta("PROGRAM").required())
        .field(FieldDefinition::meta("PLATFORM").required())
        .field(FieldDefinition::meta("MINGAPLENGTH"))
        .field(
            FieldDefinition::meta("MOLECULETYPE").processor(
                CvProcessor::new(["genomic DNA", "genomic RNA", "viral cRNA"])
                    .with_aliases("genomic DNA", ["gDNA"]),
            ),
        )
        .field(
            FieldDefinition::meta("TPA").processor(
                CvProcessor::new(["yes", "no"])
                    .with_aliases("yes", ["true", "y"])
                    .with_aliases("no", ["false", "n"]),
            ),
        )
        .field(FieldDefinition::meta("AUTHORS"))
        .field(FieldDefinition::meta("ADDRESS"))
        .field(
            FieldDefinition::meta("RUN_REF")
                .processor(reference(ReferenceKind::Run, &lookup)),
        )
        .field(
            FieldDefinition::meta("ANALYSIS_REF")
                .processor(reference(ReferenceKind::Analysis, &lookup)),
        )
        .field(FieldDefinition::file("FASTA").processor(suffixes(&[
            ".fasta.gz",
            ".fas.gz",
            ".fsa.gz",
            ".fna.gz",
            ".fa.gz",
        ])))
        .field(FieldDefinition::file("FLATFILE").processor(suffixes(&[".embl.gz", ".dat.gz"])))
        .field(FieldDefinition::file("AGP").processor(suffixes(&[".agp.gz"])))
        .field(FieldDefinition::file("CHROMOSOME_LIST").processor(suffixes(&text)))
        .field(FieldDefinition::file("UNLOCALISED_LIST").processor(suffixes(&text)))
        .file_group(FileGroupTemplate::new("fasta").file("FASTA", 1, 1))
        .file_group(
            FileGroupTemplate::new("fasta with chromosome list")
                .file("FASTA", 1, 1)
                .file("CHROMOSOME_LIST", 1, 1)
                .file("UNLOCALISED_LIST", 0, 1),
        )
        .file_group(
            FileGroupTemplate::new("fasta with agp")
                .file("FASTA", 1, 1)
                .file("AGP", 1, 1),
        )
        .file_group(
            FileGroupTemplate::new("fasta with agp and chromosome list")
                .file("FASTA", 1, 1)
                .file("AGP", 1, 1)
                .file("CHROMOSOME_LIST", 1, 1)
                .file("UNLOCALISED_LIST", 0, 1),
        )
        .file_group(FileGroupTemplate::new("flat file").file("FLATFILE", 1, 1))
        .file_group(
            FileGroupTemplate::new("flat file with chromosome list")
                .file("FLATFILE", 1, 1)
                .file("CHROMOSOME_LIST", 1, 1)
                .file("UNLOCALISED_LIST", 0, 1),
        )
        .info_field(INFO_FIELD)
        .build()
}

/// Raw read submissions: one BAM, one CRAM, or one or two FASTQ files.
pub fn reads(lookup: Arc<dyn MetadataLookup>) -> Result<ManifestSchema, KiraError> {
    ManifestSchema::builder()
        .field(FieldDefinition::meta("NAME").required().description("Unique experiment name"))
        .field(
            FieldDefinition::meta("STUDY")
                .required()
                .processor(reference(ReferenceKind::Study, &lookup)),
        )
        .field(
            FieldDefinition::meta("SAMPLE")
                .required()
                .processor(reference(ReferenceKind::Sample, &lookup)),
        )
        .field(FieldDefinition::meta("DESCRIPTION"))
        .field(FieldDefinition::meta("PLATFORM").processor(CvProcessor::new(PLATFORMS.iter().copied())))
        .field(
            FieldDefinition::meta("INSTRUMENT").required().processor(
                CvProcessor::new([
                    "Illumina NovaSeq 6000",
                    "Illumina NovaSeq X",
                    "Illumina HiSeq 2500",
                    "Illumina MiSeq",
                    "NextSeq 500",
                    "MinION",
                    "GridION",
                    "PromethION",
                    "Sequel",
                    "Sequel II",
                    "Ion Torrent S5",
                    "unspecified",
                ])
                .with_aliases("Illumina NovaSeq 6000", ["NovaSeq 6000"])
                .with_aliases("Illumina MiSeq", ["MiSeq"]),
            ),
        )
        .field(FieldDefinition::meta("INSERT_SIZE"))
        .field(FieldDefinition::meta("LIBRARY_NAME"))
        .field(FieldDefinition::meta("LIBRARY_CONSTRUCTION_PROTOCOL"))
        .field(
            FieldDefinition::meta("LIBRARY_SOURCE").required().processor(CvProcessor::new([
                "GENOMIC",
                "GENOMIC SINGLE CELL",
                "TRANSCRIPTOMIC",
                "TRANSCRIPTOMIC SINGLE CELL",
                "METAGENOMIC",
                "METATRANSCRIPTOMIC",
                "SYNTHETIC",
                "VIRAL RNA",
                "OTHER",
            ])),
        )
        .field(
            FieldDefinition::meta("LIBRARY_SELECTION").required().processor(CvProcessor::new([
                "RANDOM",
                "PCR",
                "RANDOM PCR",
                "RT-PCR",
                "cDNA",
                "PolyA",
                "Hybrid Selection",
                "unspecified",
                "other",
            ])),
        )
        .field(
            FieldDefinition::meta("LIBRARY_STRATEGY").required().processor(CvProcessor::new([
                "WGS",
                "WXS",
                "RNA-Seq",
                "AMPLICON",
                "ChIP-Seq",
                "Bisulfite-Seq",
                "Hi-C",
                "ATAC-seq",
                "OTHER",
            ])),
        )
        .field(FieldDefinition::file("BAM").processor(suffixes(&[".bam"])))
        .field(FieldDefinition::file("CRAM").processor(suffixes(&[".cram"])))
        .field(
            FieldDefinition::file("FASTQ")
                .count(0, 2)
                .processor(suffixes(&[".fastq.gz", ".fq.gz", ".fastq.bz2", ".fq.bz2"]))
                .attribute(
                    FieldDefinition::meta("READ_TYPE").count(0, 4).processor(CvProcessor::new([
                        "single",
                        "paired",
                        "cell_barcode",
                        "umi_barcode",
                        "feature_barcode",
                        "sample_barcode",
                    ])),
                ),
        )
        .file_group(FileGroupTemplate::new("bam").file("BAM", 1, 1))
        .file_group(FileGroupTemplate::new("cram").file("CRAM", 1, 1))
        .file_group(FileGroupTemplate::new("fastq").file("FASTQ", 1, 2))
        .info_field(INFO_FIELD)
        .build()
}
