//! Archive assembly
//!
//! Joins variant-call headers with the protocol registry and plans the
//! output archive. Planning never touches the output directory; only
//! [`ArchivePlan::write`] does, so any input problem aborts before a single
//! file is produced.
//!
//! Protocols are matched by file name: `varscan.snp.vcf` belongs to the
//! descriptor `varscan.yml`. The archive copy is renamed to
//! `<stem>.<center>.<patient>.<ext>`, e.g. `pindel.center1.TCGA-00-0000.vcf`.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::ArchiveLayout;
use crate::error::{ArchiveError, Result};
use crate::header;
use crate::output;
use crate::registry::ProtocolRegistry;
use crate::sample::{ContextSample, SampleDraft, SampleRecord};

/// Accepted variant-call extensions, longest first
const VCF_EXTENSIONS: &[&str] = &["vcf.gz", "vcf"];

/// Protocol short name: the file name up to its first `.`
pub fn protocol_short_name(file_name: &str) -> &str {
    file_name
        .split_once('.')
        .map(|(short, _)| short)
        .unwrap_or(file_name)
}

/// Split a variant-call file name into stem and extension
pub fn split_vcf_name(file_name: &str) -> Option<(&str, &'static str)> {
    VCF_EXTENSIONS.iter().find_map(|&ext| {
        file_name
            .strip_suffix(ext)
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|stem| !stem.is_empty())
            .map(|stem| (stem, ext))
    })
}

/// Archive-internal name: `<stem>.<center>.<patient>.<ext>`
pub fn archive_file_name(file_name: &str, center_id: &str, individual: &str) -> Option<String> {
    let (stem, ext) = split_vcf_name(file_name)?;
    Some(format!("{}.{}.{}.{}", stem, center_id, individual, ext))
}

/// A variant-call file to copy into the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileCopy {
    pub source: PathBuf,
    pub archive_name: String,
}

/// Accumulates completed SDRF rows, file by file
pub struct ArchiveAssembler<'a> {
    registry: &'a ProtocolRegistry,
    archive_name: String,
    rows: Vec<SampleRecord>,
    copies: Vec<DataFileCopy>,
    seen_names: HashSet<String>,
}

impl<'a> ArchiveAssembler<'a> {
    /// `archive_name` is stamped on every row (the data directory name)
    pub fn new(registry: &'a ProtocolRegistry, archive_name: impl Into<String>) -> Self {
        Self {
            registry,
            archive_name: archive_name.into(),
            rows: Vec::new(),
            copies: Vec::new(),
            seen_names: HashSet::new(),
        }
    }

    /// Add one variant-call file: parse its header, resolve its protocol,
    /// rename it and complete its sample rows.
    pub fn add_vcf(&mut self, path: &Path) -> Result<()> {
        let input_err = |msg: String| ArchiveError::Input {
            path: path.to_path_buf(),
            msg,
        };

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| input_err("file name is not valid UTF-8".to_string()))?;
        if split_vcf_name(file_name).is_none() {
            return Err(input_err("not a .vcf or .vcf.gz file".to_string()));
        }

        let samples: Vec<ContextSample> = header::read_header(path)?
            .into_iter()
            .map(|s| {
                debug!(
                    "{}:{}: sample {} ({})",
                    path.display(),
                    s.line,
                    s.annotation.barcode,
                    s.annotation.id
                );
                SampleDraft::from_annotation(&s.annotation).with_context(&s.context, &self.archive_name)
            })
            .collect();
        let Some(first) = samples.first() else {
            return Err(input_err("no ##SAMPLE annotation lines in header".to_string()));
        };

        let short_name = protocol_short_name(file_name);
        let protocol = self
            .registry
            .lookup(short_name)
            .ok_or_else(|| ArchiveError::Resolution {
                short_name: short_name.to_string(),
                path: path.to_path_buf(),
            })?;

        let renamed = archive_file_name(file_name, &protocol.center_id, &first.draft.individual)
            .ok_or_else(|| input_err("not a .vcf or .vcf.gz file".to_string()))?;
        if self.seen_names.contains(&renamed) {
            return Err(input_err(format!(
                "archive name {} is already used by another input",
                renamed
            )));
        }

        let mut rows = Vec::with_capacity(samples.len());
        for sample in samples {
            if sample.draft.software != short_name {
                warn!(
                    "{}: header softwareName '{}' differs from protocol '{}' derived from the file name",
                    path.display(),
                    sample.draft.software,
                    short_name
                );
            }
            rows.push(sample.complete(&protocol.protocol_ref, &renamed, path)?);
        }

        info!(
            "{}: {} sample(s), protocol {}, archived as {}",
            file_name,
            rows.len(),
            protocol.protocol_ref,
            renamed
        );

        self.seen_names.insert(renamed.clone());
        self.rows.extend(rows);
        self.copies.push(DataFileCopy {
            source: path.to_path_buf(),
            archive_name: renamed,
        });
        Ok(())
    }

    /// Add every variant-call file in `dir`, in file name order
    pub fn add_vcf_dir(&mut self, dir: &Path) -> Result<usize> {
        let inputs = list_vcfs(dir)?;
        if inputs.is_empty() {
            warn!("No .vcf or .vcf.gz files found in {}", dir.display());
        }
        for path in &inputs {
            self.add_vcf(path)?;
        }
        Ok(inputs.len())
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[SampleRecord] {
        &self.rows
    }

    pub fn finish(self) -> (Vec<SampleRecord>, Vec<DataFileCopy>) {
        (self.rows, self.copies)
    }
}

/// Variant-call files directly under `dir`, sorted by name
pub fn list_vcfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| ArchiveError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ArchiveError::io(dir, e))?.path();
        let is_vcf = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| split_vcf_name(n).is_some());
        if is_vcf && path.is_file() {
            paths.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Everything needed to write one archive, tied to the registry its rows
/// were resolved against
#[derive(Debug, Clone)]
pub struct ArchivePlan<'a> {
    registry: &'a ProtocolRegistry,
    pub disease: String,
    pub layout: ArchiveLayout,
    pub rows: Vec<SampleRecord>,
    pub copies: Vec<DataFileCopy>,
}

impl<'a> ArchivePlan<'a> {
    /// Plan the archive for every variant-call file in `vcf_dir`
    pub fn build(
        registry: &'a ProtocolRegistry,
        vcf_dir: &Path,
        layout: &ArchiveLayout,
        disease: &str,
    ) -> Result<Self> {
        let mut assembler = ArchiveAssembler::new(registry, layout.data_dir(disease));
        let files = assembler.add_vcf_dir(vcf_dir)?;
        let (rows, copies) = assembler.finish();
        info!("Planned {} SDRF row(s) from {} VCF file(s)", rows.len(), files);

        Ok(Self {
            registry,
            disease: disease.to_string(),
            layout: layout.clone(),
            rows,
            copies,
        })
    }

    /// Write `<out_root>/<disease>/` with its mage-tab and data directories.
    ///
    /// An existing run directory is replaced. If writing fails part way the
    /// run directory is removed again.
    pub fn write(&self, out_root: &Path) -> Result<PathBuf> {
        let root = out_root.join(&self.disease);
        recreate_dir(&root)?;

        match self.write_into(&root) {
            Ok(()) => Ok(root),
            Err(e) => {
                warn!("Removing incomplete archive {}", root.display());
                if let Err(rm) = std::fs::remove_dir_all(&root) {
                    warn!("Failed to remove {}: {}", root.display(), rm);
                }
                Err(e)
            }
        }
    }

    fn write_into(&self, root: &Path) -> Result<()> {
        let mage_tab_dir = root.join(self.layout.mage_tab_dir(&self.disease));
        let data_dir = root.join(self.layout.data_dir(&self.disease));
        for dir in [&mage_tab_dir, &data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))?;
        }

        let sdrf_name = self.layout.sdrf_file_name(&self.disease);
        output::write_idf(
            &mage_tab_dir.join(self.layout.idf_file_name(&self.disease)),
            self.registry,
            &sdrf_name,
        )?;
        output::write_sdrf(&mage_tab_dir.join(&sdrf_name), &self.rows)?;

        for copy in &self.copies {
            let target = data_dir.join(&copy.archive_name);
            std::fs::copy(&copy.source, &target).map_err(|e| ArchiveError::io(&copy.source, e))?;
            debug!("Copied {} -> {}", copy.source.display(), target.display());
        }
        info!(
            "Copied {} data file(s) into {}",
            self.copies.len(),
            data_dir.display()
        );
        Ok(())
    }
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        warn!("Overwriting existing output directory {}", dir.display());
        std::fs::remove_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{NORMAL_LINE, PRIMARY_LINE};
    use crate::registry::descriptor_yaml;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        descriptors: PathBuf,
        vcfs: PathBuf,
        out: PathBuf,
    }

    impl Fixture {
        fn new(protocols: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let descriptors = dir.path().join("idf");
            let vcfs = dir.path().join("vcf");
            let out = dir.path().join("out");
            std::fs::create_dir(&descriptors).unwrap();
            std::fs::create_dir(&vcfs).unwrap();
            for (short, protocol) in protocols {
                std::fs::write(descriptors.join(format!("{}.yml", short)), descriptor_yaml(protocol))
                    .unwrap();
            }
            Self {
                _dir: dir,
                descriptors,
                vcfs,
                out,
            }
        }

        fn add_vcf(&self, name: &str, content: &str) -> PathBuf {
            let path = self.vcfs.join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn registry(&self) -> ProtocolRegistry {
            ProtocolRegistry::load(&self.descriptors).unwrap()
        }

        fn run(&self, disease: &str) -> Result<PathBuf> {
            let registry = self.registry();
            let layout = ArchiveLayout::default();
            let plan = ArchivePlan::build(&registry, &self.vcfs, &layout, disease)?;
            plan.write(&self.out)
        }
    }

    fn vcf(reference: &str, samples: &[&str]) -> String {
        let mut text = format!(
            "##fileformat=VCFv4.1\n##tcgaversion=1.0\n##reference={}\n",
            reference
        );
        for sample in samples {
            text.push_str(sample);
            text.push('\n');
        }
        text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNORMAL\tPRIMARY\n");
        text.push_str("1\t100\t.\tA\tT\t.\tPASS\t.\tGT\t0/0\t0/1\n");
        text
    }

    #[test]
    fn test_protocol_short_name() {
        assert_eq!(protocol_short_name("pindel.vcf"), "pindel");
        assert_eq!(protocol_short_name("varscan.snp.vcf"), "varscan");
        assert_eq!(protocol_short_name("radia.vcf.gz"), "radia");
        assert_eq!(protocol_short_name("muse"), "muse");
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("pindel.vcf", "center1", "TCGA-00-0000").as_deref(),
            Some("pindel.center1.TCGA-00-0000.vcf")
        );
        assert_eq!(
            archive_file_name("varscan.snp.vcf", "c2", "TCGA-00-0000").as_deref(),
            Some("varscan.snp.c2.TCGA-00-0000.vcf")
        );
        assert_eq!(
            archive_file_name("radia.vcf.gz", "c3", "TCGA-00-0000").as_deref(),
            Some("radia.c3.TCGA-00-0000.vcf.gz")
        );
        assert_eq!(archive_file_name("notes.txt", "c", "p"), None);
        assert_eq!(archive_file_name(".vcf", "c", "p"), None);
    }

    #[test]
    fn test_end_to_end_pindel() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);
        let content = vcf("file:///refs/hg19.fa", &[NORMAL_LINE, PRIMARY_LINE]);
        fx.add_vcf("pindel.vcf", &content);

        let root = fx.run("BRCA").unwrap();
        assert_eq!(root, fx.out.join("BRCA"));

        let layout = ArchiveLayout::default();
        let mage_tab = root.join(layout.mage_tab_dir("BRCA"));
        let sdrf = std::fs::read_to_string(mage_tab.join(layout.sdrf_file_name("BRCA"))).unwrap();
        let lines: Vec<&str> = sdrf.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Extract Name\t"));

        for (line, is_tumor) in lines[1..].iter().zip(["no", "yes"]) {
            let cells: Vec<&str> = line.split('\t').collect();
            assert_eq!(cells[2], is_tumor);
            assert_eq!(cells[5], "hg19");
            assert_eq!(cells[14], "center1:pindel");
            assert_eq!(cells[15], "pindel.center1.TCGA-00-0000.vcf");
            assert_eq!(cells[16], "1.0");
            assert_eq!(cells[20], layout.data_dir("BRCA"));
        }

        let idf = std::fs::read_to_string(mage_tab.join(layout.idf_file_name("BRCA"))).unwrap();
        assert!(idf.contains("Protocol Name\tcenter1:pindel\n"));
        assert!(idf.contains(&format!("SDRF Files\t{}\n", layout.sdrf_file_name("BRCA"))));

        let copied = root
            .join(layout.data_dir("BRCA"))
            .join("pindel.center1.TCGA-00-0000.vcf");
        assert_eq!(std::fs::read_to_string(copied).unwrap(), content);
    }

    #[test]
    fn test_rows_follow_file_then_header_order() {
        let fx = Fixture::new(&[("pindel", "c1:pindel"), ("muse", "c2:muse")]);
        fx.add_vcf("pindel.vcf", &vcf("hg19", &[NORMAL_LINE, PRIMARY_LINE]));
        fx.add_vcf("muse.vcf", &vcf("GRCh37-lite", &[PRIMARY_LINE, NORMAL_LINE]));
        fx.add_vcf("README.md", "not a vcf");

        let registry = fx.registry();
        let plan =
            ArchivePlan::build(&registry, &fx.vcfs, &ArchiveLayout::default(), "OV").unwrap();

        let summary: Vec<(&str, &str, &str)> = plan
            .rows
            .iter()
            .map(|r| (r.protocol_ref.as_str(), r.is_tumor, r.genome))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("c2:muse", "yes", "GRCh37-lite"),
                ("c2:muse", "no", "GRCh37-lite"),
                ("c1:pindel", "no", "hg19"),
                ("c1:pindel", "yes", "hg19"),
            ]
        );
        assert_eq!(plan.copies.len(), 2);
    }

    #[test]
    fn test_unresolved_protocol_writes_nothing() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);
        fx.add_vcf("pindel.vcf", &vcf("hg19", &[NORMAL_LINE, PRIMARY_LINE]));
        fx.add_vcf("radia.vcf", &vcf("hg19", &[NORMAL_LINE, PRIMARY_LINE]));

        let err = fx.run("BRCA").unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Resolution { ref short_name, .. } if short_name == "radia"
        ));
        assert!(!fx.out.exists());
    }

    #[test]
    fn test_incomplete_row_writes_nothing() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);
        let metastatic = NORMAL_LINE.replace("ID=NORMAL", "ID=METASTATIC");
        fx.add_vcf("pindel.vcf", &vcf("hg19", &[metastatic.as_str(), PRIMARY_LINE]));

        let err = fx.run("BRCA").unwrap_err();
        assert!(matches!(err, ArchiveError::Completeness { .. }));
        assert!(!fx.out.exists());
    }

    #[test]
    fn test_unknown_reference_is_incomplete() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);
        fx.add_vcf("pindel.vcf", &vcf("mm10.fa", &[NORMAL_LINE]));

        let err = fx.run("BRCA").unwrap_err();
        assert!(matches!(err, ArchiveError::Completeness { .. }));
    }

    #[test]
    fn test_vcf_without_samples_is_input_error() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);
        fx.add_vcf("pindel.vcf", &vcf("hg19", &[]));

        let err = fx.run("BRCA").unwrap_err();
        assert!(matches!(err, ArchiveError::Input { .. }));
        assert!(!fx.out.exists());
    }

    #[test]
    fn test_duplicate_archive_name_rejected() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);
        let first = fx.add_vcf("pindel.vcf", &vcf("hg19", &[NORMAL_LINE]));
        let other_dir = fx.vcfs.join("again");
        std::fs::create_dir(&other_dir).unwrap();
        let second = other_dir.join("pindel.vcf");
        std::fs::copy(&first, &second).unwrap();

        let registry = fx.registry();
        let mut assembler = ArchiveAssembler::new(&registry, "archive");
        assembler.add_vcf(&first).unwrap();
        let err = assembler.add_vcf(&second).unwrap_err();
        assert!(matches!(err, ArchiveError::Input { .. }));
        assert_eq!(assembler.rows().len(), 1);
    }

    #[test]
    fn test_failed_write_removes_run_root() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);
        let source = fx.add_vcf("pindel.vcf", &vcf("hg19", &[NORMAL_LINE, PRIMARY_LINE]));

        let registry = fx.registry();
        let plan =
            ArchivePlan::build(&registry, &fx.vcfs, &ArchiveLayout::default(), "BRCA").unwrap();
        std::fs::remove_file(&source).unwrap();

        let err = plan.write(&fx.out).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { ref path, .. } if path == &source));
        assert!(!fx.out.join("BRCA").exists());
    }

    #[test]
    fn test_empty_vcf_dir_writes_header_only_sdrf() {
        let fx = Fixture::new(&[("pindel", "center1:pindel")]);

        let root = fx.run("BRCA").unwrap();
        let layout = ArchiveLayout::default();
        let mage_tab = root.join(layout.mage_tab_dir("BRCA"));

        let sdrf = std::fs::read_to_string(mage_tab.join(layout.sdrf_file_name("BRCA"))).unwrap();
        assert_eq!(sdrf.lines().count(), 1);
        assert!(sdrf.starts_with("Extract Name\t"));

        let idf = std::fs::read_to_string(mage_tab.join(layout.idf_file_name("BRCA"))).unwrap();
        assert!(idf.contains("Protocol Name\tcenter1:pindel\n"));
        assert!(root.join(layout.data_dir("BRCA")).is_dir());
    }

    #[test]
    fn test_gzipped_input_and_rerun_overwrites() {
        let fx = Fixture::new(&[("radia", "center3:radia")]);
        let gz = fx.vcfs.join("radia.vcf.gz");
        crate::io::write_text(&gz, &vcf("GRCh37", &[NORMAL_LINE, PRIMARY_LINE])).unwrap();

        let root = fx.run("LUAD").unwrap();
        let layout = ArchiveLayout::default();
        let stale = root.join("stale.txt");
        std::fs::write(&stale, "left over").unwrap();

        let root = fx.run("LUAD").unwrap();
        assert!(!stale.exists());

        let copied = root
            .join(layout.data_dir("LUAD"))
            .join("radia.center3.TCGA-00-0000.vcf.gz");
        assert_eq!(std::fs::read(copied).unwrap(), std::fs::read(&gz).unwrap());
    }
}
