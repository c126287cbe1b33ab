//! Shared ultra-rare haplotype detection.
//!
//! Variants no further apart than the cluster distance form a cluster. Within a
//! cluster, the individuals carrying at least 80% of its variants are taken as
//! the sharing set, and the cluster is cut into blocks where that set is
//! homozygous at every variant ("double") or not ("single"). Blocks passing the
//! length, gene and ultra-rare filters are reported as 11-column TSV rows.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data_handling::shared_regions::NO_GENE_FILTER_SUFFIX;
use crate::models::GeneRecord;

/// Thresholds of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub cluster_distance: u64,
    pub min_individuals: usize,
    pub max_individuals: Option<usize>,
    pub min_variants: usize,
    pub min_segment_length: u64,
    pub max_segment_length: Option<u64>,
    /// Minimum number of ultra-rare variants in a reported block.
    pub min_ultra_rare: usize,
    /// Highest population allele frequency still counted as ultra-rare.
    pub ultra_rare_threshold: f64,
    pub csq_field: String,
    /// Flank added around every gene before the overlap test.
    pub gene_buffer: u64,
    /// Share of a cluster's variants an individual must carry.
    pub carrier_fraction: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        DetectionParams {
            cluster_distance: 2000,
            min_individuals: 2,
            max_individuals: None,
            min_variants: 8,
            min_segment_length: 0,
            max_segment_length: None,
            min_ultra_rare: 1,
            ultra_rare_threshold: 0.0001,
            csq_field: "GnomAD_v4_1_AF_popmax".to_string(),
            gene_buffer: 10_000,
            carrier_fraction: 0.8,
        }
    }
}

impl DetectionParams {
    /// `shared_regions_dist2000_vars8_rare1_no_gene_filter.tsv`
    pub fn output_file_name(&self) -> String {
        format!(
            "shared_regions_dist{}_vars{}_rare{}{}",
            self.cluster_distance, self.min_variants, self.min_ultra_rare, NO_GENE_FILTER_SUFFIX
        )
    }
}

/// What one GT field says about a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCall {
    /// At least one of the first two alleles is non-reference.
    pub carrier: bool,
    /// Every allele is called and they are the same non-reference allele.
    pub hom_alt: bool,
}

impl SampleCall {
    /// Build from allele indices, `None` being a missing allele.
    pub fn from_alleles<I>(alleles: I) -> Self
    where
        I: IntoIterator<Item = Option<usize>>,
    {
        let alleles: Vec<Option<usize>> = alleles.into_iter().collect();
        let carrier = alleles.iter().take(2).any(|a| matches!(a, Some(i) if *i > 0));
        let hom_alt = match alleles.first() {
            Some(Some(first)) if *first > 0 => alleles.iter().all(|a| *a == Some(*first)),
            _ => false,
        };
        SampleCall { carrier, hom_alt }
    }
}

/// One VCF record reduced to what the detector needs.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSite {
    pub chrom: String,
    pub pos: u64,
    /// One call per sample, in header order.
    pub calls: Vec<SampleCall>,
    pub ultra_rare: bool,
}

/// A run of sites on one chromosome plus the positions just outside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub sites: Vec<VariantSite>,
    /// Last position of the previous cluster on the same chromosome.
    pub prev_flank: Option<u64>,
    /// First position of the next cluster on the same chromosome.
    pub next_flank: Option<u64>,
}

/// Groups sites, in file order, into distance clusters.
pub struct ClusterBuilder {
    cluster_distance: u64,
    current: Vec<VariantSite>,
    prev_flank: Option<u64>,
}

impl ClusterBuilder {
    pub fn new(cluster_distance: u64) -> Self {
        ClusterBuilder {
            cluster_distance,
            current: Vec::new(),
            prev_flank: None,
        }
    }

    /// Add the next site; returns the cluster it closes, if any.
    pub fn push(&mut self, site: VariantSite) -> Option<Cluster> {
        let Some(last_pos) = self.current.last().map(|s| s.pos) else {
            self.current.push(site);
            return None;
        };

        if site.chrom != self.current[0].chrom {
            let closed = Cluster {
                sites: std::mem::take(&mut self.current),
                prev_flank: self.prev_flank.take(),
                next_flank: None,
            };
            self.current.push(site);
            return Some(closed);
        }

        if site.pos.saturating_sub(last_pos) <= self.cluster_distance {
            self.current.push(site);
            return None;
        }

        let closed = Cluster {
            sites: std::mem::take(&mut self.current),
            prev_flank: self.prev_flank,
            next_flank: Some(site.pos),
        };
        self.prev_flank = Some(last_pos);
        self.current.push(site);
        Some(closed)
    }

    pub fn finish(self) -> Option<Cluster> {
        if self.current.is_empty() {
            return None;
        }
        Some(Cluster {
            sites: self.current,
            prev_flank: self.prev_flank,
            next_flank: None,
        })
    }
}

/// Sample indices carrying at least `fraction` of the sites (rounded down), sorted.
pub fn shared_individuals(sites: &[VariantSite], fraction: f64) -> Vec<usize> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for site in sites {
        for (idx, call) in site.calls.iter().enumerate() {
            if call.carrier {
                *counts.entry(idx).or_default() += 1;
            }
        }
    }

    let threshold = (fraction * sites.len() as f64) as usize;
    counts
        .into_iter()
        .filter(|(_, n)| *n >= threshold)
        .map(|(idx, _)| idx)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Some sharing individual is not homozygous alternate.
    Single,
    /// Every sharing individual is homozygous alternate.
    Double,
}

impl fmt::Display for BlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockMode::Single => f.write_str("single"),
            BlockMode::Double => f.write_str("double"),
        }
    }
}

/// Inclusive site range inside a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub first: usize,
    pub last: usize,
    pub mode: BlockMode,
}

fn site_mode(site: &VariantSite, shared: &[usize]) -> BlockMode {
    let all_hom = shared
        .iter()
        .all(|&idx| site.calls.get(idx).map(|c| c.hom_alt).unwrap_or(false));
    if all_hom {
        BlockMode::Double
    } else {
        BlockMode::Single
    }
}

/// Split `sites` into maximal runs of the same genotype mode.
pub fn split_blocks(sites: &[VariantSite], shared: &[usize]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<(usize, BlockMode)> = None;

    for (idx, site) in sites.iter().enumerate() {
        let mode = site_mode(site, shared);
        match current {
            None => current = Some((idx, mode)),
            Some((first, open)) if open != mode => {
                blocks.push(Block { first, last: idx - 1, mode: open });
                current = Some((idx, mode));
            }
            Some(_) => {}
        }
    }
    if let Some((first, mode)) = current {
        blocks.push(Block { first, last: sites.len() - 1, mode });
    }
    blocks
}

/// Inclusive overlap with any gene widened by `buffer`; chromosomes compare without `chr`.
pub fn overlaps_gene(chrom: &str, start: u64, end: u64, genes: &[GeneRecord], buffer: u64) -> bool {
    let token = chrom.strip_prefix("chr").unwrap_or(chrom);
    genes.iter().any(|gene| {
        gene.chr.as_str() == token && end >= gene.start.saturating_sub(buffer) && start <= gene.end + buffer
    })
}

/// One reported block.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedRegion {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub n_variants: usize,
    pub individuals: Vec<String>,
    pub mode: BlockMode,
    /// Distance from the start to the nearest site before the block.
    pub err_left: Option<u64>,
    /// Distance from the end to the nearest site after the block.
    pub err_right: Option<u64>,
    pub n_ultra_rare: usize,
}

impl DetectedRegion {
    /// chrom, start, end, n_variants, n_individuals, individuals, mode, err_left, err_right, n_ultra_rare, filter
    pub fn tsv_fields(&self) -> [String; 11] {
        let distance = |d: Option<u64>| d.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string());
        [
            self.chrom.clone(),
            self.start.to_string(),
            self.end.to_string(),
            self.n_variants.to_string(),
            self.individuals.len().to_string(),
            self.individuals.join(","),
            self.mode.to_string(),
            distance(self.err_left),
            distance(self.err_right),
            self.n_ultra_rare.to_string(),
            "ULTRA_RARE".to_string(),
        ]
    }
}

/// Apply the sharing, length, gene and ultra-rare filters to one cluster.
pub fn evaluate_cluster(
    cluster: &Cluster,
    params: &DetectionParams,
    sample_ids: &[String],
    genes: &[GeneRecord],
) -> Vec<DetectedRegion> {
    let sites = &cluster.sites;
    if sites.is_empty() {
        return Vec::new();
    }

    let shared = shared_individuals(sites, params.carrier_fraction);
    if shared.len() < params.min_individuals || params.max_individuals.is_some_and(|max| shared.len() > max) {
        return Vec::new();
    }
    let individuals: Vec<String> = shared.iter().filter_map(|&idx| sample_ids.get(idx).cloned()).collect();

    let mut regions = Vec::new();
    for block in split_blocks(sites, &shared) {
        let block_sites = &sites[block.first..=block.last];
        let start = block_sites[0].pos;
        let end = block_sites[block_sites.len() - 1].pos;
        let length = end.saturating_sub(start);

        if block_sites.len() < params.min_variants
            || length < params.min_segment_length
            || params.max_segment_length.is_some_and(|max| length > max)
        {
            continue;
        }
        if !overlaps_gene(&sites[0].chrom, start, end, genes, params.gene_buffer) {
            continue;
        }
        let n_ultra_rare = block_sites.iter().filter(|s| s.ultra_rare).count();
        if n_ultra_rare < params.min_ultra_rare {
            continue;
        }

        let left_flank = if block.first > 0 {
            Some(sites[block.first - 1].pos)
        } else {
            cluster.prev_flank
        };
        let right_flank = if block.last + 1 < sites.len() {
            Some(sites[block.last + 1].pos)
        } else {
            cluster.next_flank
        };

        regions.push(DetectedRegion {
            chrom: sites[0].chrom.clone(),
            start,
            end,
            n_variants: block_sites.len(),
            individuals: individuals.clone(),
            mode: block.mode,
            err_left: left_flank.map(|p| start.saturating_sub(p)),
            err_right: right_flank.map(|p| p.saturating_sub(end)),
            n_ultra_rare,
        });
    }
    regions
}

/// Stream sites through the clusterer and collect every reported block.
pub fn detect_shared_regions<I, E>(
    sites: I,
    params: &DetectionParams,
    sample_ids: &[String],
    genes: &[GeneRecord],
) -> Result<Vec<DetectedRegion>, E>
where
    I: IntoIterator<Item = Result<VariantSite, E>>,
{
    let mut builder = ClusterBuilder::new(params.cluster_distance);
    let mut regions = Vec::new();
    let mut n_sites = 0usize;
    let mut n_clusters = 0usize;

    for site in sites {
        n_sites += 1;
        if let Some(cluster) = builder.push(site?) {
            n_clusters += 1;
            regions.extend(evaluate_cluster(&cluster, params, sample_ids, genes));
        }
    }
    if let Some(cluster) = builder.finish() {
        n_clusters += 1;
        regions.extend(evaluate_cluster(&cluster, params, sample_ids, genes));
    }

    debug!("{} sites formed {} clusters", n_sites, n_clusters);
    info!(
        "{} shared regions (distance {}, min variants {}, min ultra-rare {})",
        regions.len(),
        params.cluster_distance,
        params.min_variants,
        params.min_ultra_rare
    );
    Ok(regions)
}

/// Headerless tab-separated rows in the layout the region summaries read back.
pub fn write_detected_regions<W: Write>(writer: W, regions: &[DetectedRegion]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);
    for region in regions {
        writer.write_record(region.tsv_fields())?;
    }
    writer.flush()?;
    Ok(())
}
