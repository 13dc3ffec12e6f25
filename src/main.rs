//! vcf2magetab: package somatic mutation calls for DCC submission
//!
//! Takes a directory of VCFs and a directory of per-protocol YAML
//! descriptors and produces a MAGE-TAB archive:
//!
//! ```text
//! <disease>/
//!   <domain>_<disease>.<project>.mage-tab.1.0.0/   IDF + SDRF
//!   <domain>_<disease>.<project>.Level_2.1.0.0/    renamed VCFs
//! ```
//!
//! Each VCF is matched to the descriptor whose file stem equals the VCF name
//! up to its first dot (`varscan.snp.vcf` -> `varscan.yml`).

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

mod archive;
mod config;
mod error;
mod header;
mod io;
mod output;
mod registry;
mod sample;

use crate::archive::ArchivePlan;
use crate::config::ArchiveLayout;
use crate::registry::ProtocolRegistry;

/// Create TCGA Level 2 mutation and MAGE-TAB archives from VCF files
#[derive(Parser, Debug)]
#[command(name = "vcf2magetab")]
#[command(version)]
#[command(about = "Build a MAGE-TAB submission archive from VCF headers and protocol descriptors")]
struct Cli {
    /// Directory containing .vcf / .vcf.gz files (e.g. pindel.vcf, varscan.snp.vcf)
    vcf_dir: PathBuf,

    /// Directory containing one .yml protocol descriptor per caller (e.g. pindel.yml)
    descriptor_dir: PathBuf,

    /// Disease / study code, e.g. BRCA; names the output root
    disease: String,

    /// Parent directory for the archive
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// YAML file overriding the archive naming layout
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Write IDF and SDRF gzip-compressed
    #[arg(long)]
    gzip_metadata: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("vcf2magetab v{}", env!("CARGO_PKG_VERSION"));
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if cli.disease.is_empty() || cli.disease.contains(['/', '\\']) || cli.disease.starts_with('.') {
        anyhow::bail!("Invalid disease code '{}'", cli.disease);
    }

    let mut layout = match &cli.layout {
        Some(path) => ArchiveLayout::from_yaml(path)?,
        None => ArchiveLayout::default(),
    };
    if cli.gzip_metadata {
        layout.gzip_metadata = true;
    }

    info!("Loading protocol descriptors: {}", cli.descriptor_dir.display());
    let registry = ProtocolRegistry::load(&cli.descriptor_dir)
        .context("Protocol descriptor set is invalid")?;

    info!("Reading VCF headers: {}", cli.vcf_dir.display());
    let plan = ArchivePlan::build(&registry, &cli.vcf_dir, &layout, &cli.disease)
        .context("Failed to assemble archive")?;

    let root = plan
        .write(&cli.output_dir)
        .context("Failed to write archive")?;

    info!(
        "Done! {} sample row(s) from {} VCF file(s) written to {}",
        plan.rows.len(),
        plan.copies.len(),
        root.display()
    );
    Ok(())
}
