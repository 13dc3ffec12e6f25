//! MAGE-TAB output: IDF and SDRF rendering
//!
//! Both artifacts are rendered to memory first and written in one go, so a
//! failed run never leaves a truncated file behind.

use log::info;
use std::path::Path;

use crate::error::Result;
use crate::registry::{IdfField, ProtocolRegistry};
use crate::sample::{SampleRecord, SDRF_COLUMNS};

/// IDF sections in output order, each followed by a blank line
const DESIGN_SECTION: &[IdfField] = &[
    IdfField::InvestigationTitle,
    IdfField::ExpDesign,
    IdfField::ExpDesignOntology,
    IdfField::ExpDesignFactorName,
    IdfField::ExpDesignFactorType,
];

const PERSON_SECTION: &[IdfField] = &[
    IdfField::PersonLastName,
    IdfField::PersonFirstName,
    IdfField::PersonMidInitial,
    IdfField::PersonEmail,
    IdfField::PersonAddress,
    IdfField::PersonAffiliation,
    IdfField::PersonRole,
];

const PUBLICATION_SECTION: &[IdfField] = &[
    IdfField::PubMedId,
    IdfField::PubAuthors,
    IdfField::PubTitle,
    IdfField::PubStatus,
    IdfField::ExpDescription,
];

const PROTOCOL_SECTION: &[IdfField] = &[
    IdfField::ProtocolNames,
    IdfField::ProtocolTypes,
    IdfField::ProtocolDescriptions,
    IdfField::ProtocolOntologies,
    IdfField::ProtocolParameters,
];

const TERM_SOURCE_SECTION: &[IdfField] = &[
    IdfField::OntologyName,
    IdfField::OntologyFile,
    IdfField::OntologyVersion,
];

/// One IDF row: the label, then the field from every descriptor.
/// Null values render as empty cells.
fn idf_row(registry: &ProtocolRegistry, field: IdfField) -> String {
    let mut row = field.label().to_string();
    for record in registry.records() {
        row.push('\t');
        row.push_str(record.value(field).unwrap_or(""));
    }
    row
}

/// Render the investigation description file
pub fn render_idf(registry: &ProtocolRegistry, sdrf_file_name: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for section in [DESIGN_SECTION, PERSON_SECTION, PUBLICATION_SECTION, PROTOCOL_SECTION] {
        lines.extend(section.iter().map(|&field| idf_row(registry, field)));
        lines.push(String::new());
    }

    lines.push(format!("SDRF Files\t{}", sdrf_file_name));
    lines.push(String::new());

    lines.extend(TERM_SOURCE_SECTION.iter().map(|&field| idf_row(registry, field)));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Render the sample/data relationship file: column labels, then one row
/// per record in the given order.
pub fn render_sdrf(records: &[SampleRecord]) -> String {
    let mut out = SDRF_COLUMNS.join("\t");
    out.push('\n');
    for record in records {
        out.push_str(&record.cells().join("\t"));
        out.push('\n');
    }
    out
}

pub fn write_idf(path: &Path, registry: &ProtocolRegistry, sdrf_file_name: &str) -> Result<()> {
    crate::io::write_text(path, &render_idf(registry, sdrf_file_name))?;
    info!(
        "IDF with {} protocol(s) written to {}",
        registry.len(),
        path.display()
    );
    Ok(())
}

pub fn write_sdrf(path: &Path, records: &[SampleRecord]) -> Result<()> {
    crate::io::write_text(path, &render_sdrf(records))?;
    info!("SDRF with {} row(s) written to {}", records.len(), path.display());
    Ok(())
}
