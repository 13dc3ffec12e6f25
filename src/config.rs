//! Archive layout configuration
//!
//! Encodes the submission naming convention
//! `<domain>_<disease>.<project>.<archive type>.<serial>.<revision>.<series>`.
//! Defaults reproduce the MC3 layout; a YAML file may override any field.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Naming template for the output archive tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveLayout {
    /// Submitting center domain
    pub domain: String,

    /// Project / center name embedded in every archive name
    pub center_project: String,

    pub serial_index: u32,
    pub revision: u32,
    pub series: u32,

    /// Write IDF and SDRF as `.gz`
    pub gzip_metadata: bool,
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        Self {
            domain: "ucsc.edu".to_string(),
            center_project: "Multicenter_mutation_calling_MC3".to_string(),
            serial_index: 1,
            revision: 0,
            series: 0,
            gzip_metadata: false,
        }
    }
}

impl ArchiveLayout {
    /// Load layout overrides from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout file: {}", path.display()))?;

        let layout: ArchiveLayout = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML layout: {}", path.display()))?;

        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() || self.center_project.is_empty() {
            anyhow::bail!("Archive layout requires a non-empty domain and center_project");
        }
        if self.domain.contains('/') || self.center_project.contains('/') {
            anyhow::bail!("Archive layout names must not contain path separators");
        }
        Ok(())
    }

    /// `<domain>_<disease>.<center_project>`
    pub fn base_name(&self, disease: &str) -> String {
        format!("{}_{}.{}", self.domain, disease, self.center_project)
    }

    /// Version triple `<serial>.<revision>.<series>`
    pub fn version(&self) -> String {
        format!("{}.{}.{}", self.serial_index, self.revision, self.series)
    }

    /// Metadata subdirectory holding IDF and SDRF
    pub fn mage_tab_dir(&self, disease: &str) -> String {
        format!("{}.mage-tab.{}", self.base_name(disease), self.version())
    }

    /// Data subdirectory holding renamed VCFs; also the archive name in SDRF rows
    pub fn data_dir(&self, disease: &str) -> String {
        format!("{}.Level_2.{}", self.base_name(disease), self.version())
    }

    pub fn idf_file_name(&self, disease: &str) -> String {
        self.metadata_file_name(disease, "idf")
    }

    pub fn sdrf_file_name(&self, disease: &str) -> String {
        self.metadata_file_name(disease, "sdrf")
    }

    fn metadata_file_name(&self, disease: &str, kind: &str) -> String {
        let name = format!("{}.{}.txt", self.base_name(disease), kind);
        if self.gzip_metadata {
            format!("{}.gz", name)
        } else {
            name
        }
    }
}
