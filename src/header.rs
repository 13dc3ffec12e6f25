//! VCF header annotation parsing
//!
//! Reads only the meta-information block of a variant-call file. Three line
//! shapes matter:
//!
//! - `##tcgaversion=1.0` sets the spec version for the samples that follow
//! - `##reference=...` is matched against [`GENOME_PATTERNS`]
//! - `##SAMPLE=<ID=NORMAL,SampleUUID=...,...>` describes one sample
//!
//! Scanning stops at the `#CHROM` column header; genotype records are never read.

use log::debug;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};

const SPEC_VERSION_PREFIX: &str = "##tcgaversion";
const REFERENCE_PREFIX: &str = "##reference";
const SAMPLE_PREFIX: &str = "##SAMPLE=<";

/// Canonical genome build labels used in the SDRF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomeBuild {
    Grch37Lite,
    Grch37,
    Hg19,
    Hg18,
    Ncbi36,
    Ncbi37,
}

impl GenomeBuild {
    pub fn label(self) -> &'static str {
        match self {
            GenomeBuild::Grch37Lite => "GRCh37-lite",
            GenomeBuild::Grch37 => "GRCh37",
            GenomeBuild::Hg19 => "hg19",
            GenomeBuild::Hg18 => "hg18",
            GenomeBuild::Ncbi36 => "36.1",
            GenomeBuild::Ncbi37 => "37",
        }
    }
}

/// Reference aliases, most specific first. First match wins.
pub const GENOME_PATTERNS: &[(&str, GenomeBuild)] = &[
    ("GRCh37-lite", GenomeBuild::Grch37Lite),
    ("GRCh37", GenomeBuild::Grch37),
    ("Homo_sapiens_assembly19", GenomeBuild::Hg19),
    ("hg19", GenomeBuild::Hg19),
    ("hg18", GenomeBuild::Hg18),
    ("NCBI36", GenomeBuild::Ncbi36),
    ("NCBI37", GenomeBuild::Ncbi37),
];

/// Map a `##reference` line to a genome build
pub fn detect_genome(line: &str) -> Option<GenomeBuild> {
    GENOME_PATTERNS
        .iter()
        .find(|(pattern, _)| line.contains(pattern))
        .map(|(_, build)| *build)
}

/// Sample role from the annotation `ID` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRole {
    Normal,
    Primary,
}

impl SampleRole {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "NORMAL" => Some(SampleRole::Normal),
            "PRIMARY" => Some(SampleRole::Primary),
            _ => None,
        }
    }

    /// SDRF `Comment [is tumor]` value
    pub fn is_tumor(self) -> &'static str {
        match self {
            SampleRole::Normal => "no",
            SampleRole::Primary => "yes",
        }
    }
}

/// Key/value attributes of one `##SAMPLE=<...>` line, quotes stripped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderAnnotation {
    values: HashMap<String, String>,
}

impl HeaderAnnotation {
    /// Parse the attribute list between the outer angle brackets.
    ///
    /// Commas inside quotes or nested `<...>` do not split.
    pub fn parse(body: &str) -> std::result::Result<Self, String> {
        let mut values = HashMap::new();
        for item in split_attributes(body)? {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| format!("attribute '{}' has no '='", item))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("attribute '{}' has an empty key", item));
            }
            if values
                .insert(key.to_string(), strip_quotes(value.trim()).to_string())
                .is_some()
            {
                return Err(format!("duplicate attribute '{}'", key));
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> std::result::Result<String, String> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| format!("missing required key '{}'", key))
    }
}

fn split_attributes(body: &str) -> std::result::Result<Vec<&str>, String> {
    let mut items = Vec::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => depth += 1,
            '>' if !in_quotes => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced '>'".to_string())?;
            }
            ',' if !in_quotes && depth == 0 => {
                items.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    if depth != 0 {
        return Err("unbalanced '<'".to_string());
    }
    items.push(&body[start..]);

    Ok(items.into_iter().filter(|s| !s.trim().is_empty()).collect())
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn strip_angle_brackets(value: &str) -> &str {
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
}

/// Typed view of the sample annotation keys this tool consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleAnnotation {
    /// Raw `ID` value
    pub id: String,
    /// `None` when `ID` is neither NORMAL nor PRIMARY
    pub role: Option<SampleRole>,
    pub uuid: String,
    pub barcode: String,
    /// Aligned reads file the calls were derived from
    pub file: String,
    /// Source / accession tag, e.g. dbGaP
    pub source: String,
    pub software: String,
}

impl SampleAnnotation {
    pub fn from_annotation(annotation: &HeaderAnnotation) -> std::result::Result<Self, String> {
        let id = annotation.require("ID")?;
        let software = annotation.require("softwareName")?;
        Ok(Self {
            role: SampleRole::from_id(&id),
            id,
            uuid: annotation.require("SampleUUID")?,
            barcode: annotation.require("SampleTCGABarcode")?,
            file: annotation.require("File")?,
            source: annotation.require("Source")?,
            software: strip_quotes(strip_angle_brackets(&software)).to_string(),
        })
    }
}

/// File-level context active when a sample line was read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderContext {
    pub spec_version: Option<String>,
    pub genome: Option<GenomeBuild>,
}

/// One sample line together with the context in force at that point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSample {
    /// 1-based line number in the source
    pub line: usize,
    pub annotation: SampleAnnotation,
    pub context: HeaderContext,
}

/// Parse header samples from a variant-call file, `.gz` or plain
pub fn read_header(path: &Path) -> Result<Vec<HeaderSample>> {
    let reader = crate::io::open_reader(path)?;
    parse_header(reader, path)
}

/// Parse header samples from any line source
pub fn parse_header<R: BufRead>(reader: R, path: &Path) -> Result<Vec<HeaderSample>> {
    let parse_err = |line: usize, msg: String| ArchiveError::Parse {
        path: PathBuf::from(path),
        line,
        msg,
    };

    let mut context = HeaderContext::default();
    let mut samples = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| ArchiveError::io(path, e))?;
        let line = line.trim_end();

        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with("##") {
            // #CHROM column header, or payload in a header-less file
            break;
        }

        if let Some(rest) = line.strip_prefix(SPEC_VERSION_PREFIX) {
            let value = rest
                .strip_prefix('=')
                .ok_or_else(|| parse_err(line_no, format!("malformed spec version line '{}'", line)))?;
            context.spec_version = Some(value.trim().to_string());
        } else if line.starts_with(REFERENCE_PREFIX) {
            context.genome = detect_genome(line);
            if context.genome.is_none() {
                debug!("{}: unrecognised reference '{}'", path.display(), line);
            }
        } else if line.starts_with("##SAMPLE") {
            let body = line
                .strip_prefix(SAMPLE_PREFIX)
                .and_then(|b| b.strip_suffix('>'))
                .ok_or_else(|| parse_err(line_no, "sample line is not enclosed in <...>".to_string()))?;
            let annotation = HeaderAnnotation::parse(body)
                .and_then(|a| SampleAnnotation::from_annotation(&a))
                .map_err(|msg| parse_err(line_no, msg))?;

            samples.push(HeaderSample {
                line: line_no,
                annotation,
                context: context.clone(),
            });
        }
    }

    Ok(samples)
}

#[cfg(test)]
pub(crate) const NORMAL_LINE: &str = "##SAMPLE=<ID=NORMAL,Description=\"Normal sample\",SampleUUID=6a71666e-fc7c-4bd8-ae31-31c3322b03e9,SampleTCGABarcode=TCGA-00-0000-10A-00A-0000-00,AnalysisUUID=1fa3a6c6-68a1-4e8f-a72f-a5d4a76a3758,File=\"testexome.pair0.normal.bam\",Platform=\"Illumina\",Source=\"dbGAP\",Accession=\"dbGaP\",softwareName=<pindel>,softwareVer=<0.2.5b1>,softwareParam=<>>";

#[cfg(test)]
pub(crate) const PRIMARY_LINE: &str = "##SAMPLE=<ID=PRIMARY,Description=\"Primary Tumor\",SampleUUID=15d1322f-c272-42fa-abe5-d0f0e9cabba5,SampleTCGABarcode=TCGA-00-0000-01A-00A-0000-00,AnalysisUUID=1d20ac06-389b-4105-a74b-f69b72886639,File=\"testexome.pair0.tumour.bam\",Platform=\"Illumina\",Source=\"dbGAP\",Accession=\"dbGaP\",softwareName=<pindel>,softwareVer=<0.2.5b1>,softwareParam=<>>";
