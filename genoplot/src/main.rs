use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::load_or_write_config;
use crate::helper_functions::project_root;
use crate::pipelines::{
    run_genotype_heatmaps, run_match_summary, run_ndm_report, run_segment_overlay, run_shared_haplotype_detection,
};

mod analysis;
mod cohort;
mod config;
mod data_handling;
mod detection;
mod genotype;
mod helper_functions;
mod interval_join;
mod models;
mod pipelines;
mod position;

fn main() -> Result<()> {
    // Setup logging and project configuration
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the genotype plotting pipelines");

    let project_root = project_root();
    let config = load_or_write_config(&project_root).map_err(|e| anyhow!("reading configuration: {}", e))?;

    // Shared ultra-rare haplotypes from the cohort VCF, feeding the region summaries below
    run_shared_haplotype_detection(&project_root, &config)?;

    // Genotype heatmaps: target gene alone, then every other candidate gene
    run_genotype_heatmaps(&project_root, &config)?;

    // Haplotype segments around the fixed gene region
    run_segment_overlay(&project_root, &config)?;

    // True-match summary and region counts over the shared-region parameter grid
    run_match_summary(&project_root, &config)?;

    // Regions shared by solved and unsolved neonatal diabetes patients
    run_ndm_report(&project_root, &config)?;

    info!("All figures written to {}", config.output_dir.display());
    Ok(())
}
