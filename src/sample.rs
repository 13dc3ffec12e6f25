//! SDRF sample rows
//!
//! A row is built in three stages, each a separate type:
//!
//! 1. [`SampleDraft`] from one `##SAMPLE` header annotation
//! 2. [`ContextSample`] once genome build, spec version and archive name are attached
//! 3. [`SampleRecord`] once the protocol reference and renamed VCF are stamped
//!
//! Only [`SampleRecord`] can be written, and it has no optional fields.

use std::path::Path;

use crate::error::{ArchiveError, Result};
use crate::header::{GenomeBuild, HeaderContext, SampleAnnotation, SampleRole};

/// Placeholder for SDRF columns that are not applicable
const NOT_APPLICABLE: &str = "->";

/// Material is always DNA; RNA samples are not supported
const MATERIAL_TYPE: &str = "DNA";
const INCLUDE_FOR_ANALYSIS: &str = "yes";
const DATA_TYPE: &str = "Mutations";
const DATA_LEVEL: &str = "Level 2";

/// SDRF column labels, in row order
pub const SDRF_COLUMNS: [&str; 21] = [
    "Extract Name",
    "Comment [TCGA Barcode]",
    "Comment [is tumor]",
    "Material Type",
    "Annotation REF",
    "Comment [TCGA Genome Reference]",
    "Protocol REF",
    "Parameter Value [Vendor]",
    "Parameter Value [Catalog Name]",
    "Parameter Value [Catalog Number]",
    "Protocol REF",
    "Comment [Derived Data File REF]",
    "Comment [TCGA CGHub ID]",
    "Comment [TCGA Include for Analysis]",
    "Protocol REF",
    "Derived Data File",
    "Comment [TCGA Spec Version]",
    "Comment [TCGA Include for Analysis]",
    "Comment [TCGA Data Type]",
    "Comment [TCGA Data Level]",
    "Comment [TCGA Archive Name]",
];

/// Patient identifier: the first three dash-separated barcode components.
///
/// `TCGA-00-0000-10A-00A-0000-00` -> `TCGA-00-0000`
pub fn individual_id(barcode: &str) -> String {
    barcode.split('-').take(3).collect::<Vec<_>>().join("-")
}

/// Stage 1: identity fields from the header annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDraft {
    pub uuid: String,
    pub barcode: String,
    pub role: Option<SampleRole>,
    pub derived_from: String,
    pub cghub_id: String,
    /// Software named in the header; not written to the SDRF
    pub software: String,
    pub individual: String,
}

impl SampleDraft {
    pub fn from_annotation(annotation: &SampleAnnotation) -> Self {
        Self {
            uuid: annotation.uuid.clone(),
            barcode: annotation.barcode.clone(),
            role: annotation.role,
            derived_from: annotation.file.clone(),
            cghub_id: annotation.source.clone(),
            software: annotation.software.clone(),
            individual: individual_id(&annotation.barcode),
        }
    }

    /// Attach file-level context
    pub fn with_context(self, context: &HeaderContext, archive: &str) -> ContextSample {
        ContextSample {
            draft: self,
            genome: context.genome,
            spec_version: context.spec_version.clone(),
            archive: archive.to_string(),
        }
    }
}

/// Stage 2: draft plus file-level context. Genome and spec version may
/// still be absent if the header never declared them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSample {
    pub draft: SampleDraft,
    pub genome: Option<GenomeBuild>,
    pub spec_version: Option<String>,
    pub archive: String,
}

impl ContextSample {
    /// Stamp the protocol reference and archive file name, failing if any
    /// column would be empty of a value.
    pub fn complete(self, protocol_ref: &str, data_file: &str, source: &Path) -> Result<SampleRecord> {
        let missing = |field: &'static str| ArchiveError::Completeness {
            sample: self.draft.uuid.clone(),
            path: source.to_path_buf(),
            field,
        };

        let role = self.draft.role.ok_or_else(|| {
            missing("Comment [is tumor] (unsupported sample ID)")
        })?;
        let genome = self.genome.ok_or_else(|| missing("Comment [TCGA Genome Reference]"))?;
        let spec_version = self
            .spec_version
            .clone()
            .ok_or_else(|| missing("Comment [TCGA Spec Version]"))?;

        let draft = self.draft;
        Ok(SampleRecord {
            uuid: draft.uuid,
            barcode: draft.barcode,
            is_tumor: role.is_tumor(),
            genome: genome.label(),
            derived_from: draft.derived_from,
            cghub_id: draft.cghub_id,
            protocol_ref: protocol_ref.to_string(),
            data_file: data_file.to_string(),
            spec_version,
            archive: self.archive,
        })
    }
}

/// Stage 3: a complete SDRF row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub uuid: String,
    pub barcode: String,
    pub is_tumor: &'static str,
    pub genome: &'static str,
    pub derived_from: String,
    pub cghub_id: String,
    pub protocol_ref: String,
    pub data_file: String,
    pub spec_version: String,
    pub archive: String,
}

impl SampleRecord {
    /// Cell values in [`SDRF_COLUMNS`] order
    pub fn cells(&self) -> [&str; 21] {
        [
            self.uuid.as_str(),
            self.barcode.as_str(),
            self.is_tumor,
            MATERIAL_TYPE,
            NOT_APPLICABLE,
            self.genome,
            NOT_APPLICABLE,
            NOT_APPLICABLE,
            NOT_APPLICABLE,
            NOT_APPLICABLE,
            NOT_APPLICABLE,
            self.derived_from.as_str(),
            self.cghub_id.as_str(),
            INCLUDE_FOR_ANALYSIS,
            self.protocol_ref.as_str(),
            self.data_file.as_str(),
            self.spec_version.as_str(),
            INCLUDE_FOR_ANALYSIS,
            DATA_TYPE,
            DATA_LEVEL,
            self.archive.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(id: &str) -> SampleAnnotation {
        SampleAnnotation {
            id: id.to_string(),
            role: SampleRole::from_id(id),
            uuid: "6a71666e-fc7c-4bd8-ae31-31c3322b03e9".to_string(),
            barcode: "TCGA-00-0000-10A-00A-0000-00".to_string(),
            file: "normal.bam".to_string(),
            source: "dbGAP".to_string(),
            software: "pindel".to_string(),
        }
    }

    fn context() -> HeaderContext {
        HeaderContext {
            spec_version: Some("1.0".to_string()),
            genome: Some(GenomeBuild::Hg19),
        }
    }

    #[test]
    fn test_individual_id() {
        assert_eq!(individual_id("TCGA-00-0000-10A-00A-0000-00"), "TCGA-00-0000");
        assert_eq!(individual_id("TCGA-00-0000"), "TCGA-00-0000");
        assert_eq!(
            individual_id(&individual_id("TCGA-AB-1234-01A")),
            "TCGA-AB-1234"
        );
        assert_eq!(individual_id("SAMPLE1"), "SAMPLE1");
    }

    #[test]
    fn test_complete_row() {
        let sample = SampleDraft::from_annotation(&annotation("NORMAL"))
            .with_context(&context(), "archive.Level_2.1.0.0");
        assert_eq!(sample.draft.individual, "TCGA-00-0000");
        let record = sample
            .complete("center1:pindel", "pindel.center1.TCGA-00-0000.vcf", Path::new("pindel.vcf"))
            .unwrap();

        let cells = record.cells();
        assert_eq!(cells.len(), SDRF_COLUMNS.len());
        assert_eq!(cells[0], "6a71666e-fc7c-4bd8-ae31-31c3322b03e9");
        assert_eq!(cells[2], "no");
        assert_eq!(cells[3], "DNA");
        assert_eq!(cells[5], "hg19");
        assert_eq!(cells[11], "normal.bam");
        assert_eq!(cells[12], "dbGAP");
        assert_eq!(cells[14], "center1:pindel");
        assert_eq!(cells[15], "pindel.center1.TCGA-00-0000.vcf");
        assert_eq!(cells[16], "1.0");
        assert_eq!(cells[18], "Mutations");
        assert_eq!(cells[19], "Level 2");
        assert_eq!(cells[20], "archive.Level_2.1.0.0");
    }

    #[test]
    fn test_unknown_role_is_incomplete() {
        let err = SampleDraft::from_annotation(&annotation("METASTATIC"))
            .with_context(&context(), "archive")
            .complete("c:p", "f.vcf", Path::new("p.vcf"))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Completeness { .. }));
    }

    #[test]
    fn test_missing_genome_is_incomplete() {
        let ctx = HeaderContext {
            genome: None,
            ..context()
        };
        let err = SampleDraft::from_annotation(&annotation("PRIMARY"))
            .with_context(&ctx, "archive")
            .complete("c:p", "f.vcf", Path::new("p.vcf"))
            .unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Completeness { field: "Comment [TCGA Genome Reference]", .. }
        ));
    }

    #[test]
    fn test_missing_spec_version_is_incomplete() {
        let ctx = HeaderContext {
            spec_version: None,
            ..context()
        };
        let err = SampleDraft::from_annotation(&annotation("PRIMARY"))
            .with_context(&ctx, "archive")
            .complete("c:p", "f.vcf", Path::new("p.vcf"))
            .unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Completeness { field: "Comment [TCGA Spec Version]", .. }
        ));
    }
}
