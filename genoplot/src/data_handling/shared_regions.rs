use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

/// Detection parameters encoded in a shared-region file name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParameters {
    pub cluster_distance: u64,
    pub min_variants: u64,
    pub ultra_rare: f64,
}

/// One shared haplotype region; only the sharing individuals are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedRegion {
    pub chrom: String,
    pub start: String,
    pub end: String,
    pub individuals: Vec<String>,
}

const FILE_PREFIX: &str = "shared_regions_";
/// Runs without the gene filter; the gene-filtered files share the same grid.
pub const NO_GENE_FILTER_SUFFIX: &str = "_no_gene_filter.tsv";
const INDIVIDUALS_FIELD: usize = 5;

static PARAMETER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"dist(\d+)_vars(\d+)_rare(\d+(?:\.\d+)?)").expect("grid parameter pattern is valid")
});

/// `shared_regions_dist1000_vars8_rare0.0001_no_gene_filter.tsv` -> (1000, 8, 0.0001)
pub fn parse_grid_parameters(file_name: &str) -> Option<GridParameters> {
    let caps = PARAMETER_PATTERN.captures(file_name)?;
    Some(GridParameters {
        cluster_distance: caps.get(1)?.as_str().parse().ok()?,
        min_variants: caps.get(2)?.as_str().parse().ok()?,
        ultra_rare: caps.get(3)?.as_str().parse().ok()?,
    })
}

/// `shared_regions_*<suffix>` files in `dir`, sorted by name.
pub fn shared_region_files(dir: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_match = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(suffix))
            .unwrap_or(false);
        if is_match && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read a headerless region TSV (chrom, start, end, n_variants, n_individuals, individuals, ...).
pub fn read_shared_regions(path: &Path) -> Result<Vec<SharedRegion>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;

    let mut regions = Vec::new();
    let mut short_rows = 0usize;
    for result in reader.records() {
        let record = result?;
        let Some(individuals) = record.get(INDIVIDUALS_FIELD) else {
            short_rows += 1;
            continue;
        };
        regions.push(SharedRegion {
            chrom: record.get(0).unwrap_or_default().to_string(),
            start: record.get(1).unwrap_or_default().to_string(),
            end: record.get(2).unwrap_or_default().to_string(),
            individuals: individuals
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        });
    }

    if short_rows > 0 {
        warn!("{}: skipped {} rows with fewer than 6 fields", path.display(), short_rows);
    }
    info!("Read {} shared regions from {}", regions.len(), path.display());
    Ok(regions)
}
