use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::analysis::heatmap::{build_heatmap_layout, render_heatmap};
use crate::analysis::match_summary::{
    render_match_barplot, sort_summaries, summarise_regions, write_summary_csv, MatchSummary,
};
use crate::analysis::ndm_regions::{most_shared_mixed, ndm_regions, summarise_ndm_regions, write_tsv, RegionStatus};
use crate::analysis::region_counts::{render_region_count_plot, RegionCount};
use crate::analysis::segment_plot::{build_segment_layout, render_segment_plot};
use crate::cohort::CohortGroups;
use crate::config::{GenotypeHeatmapConfig, PipelineConfig, SegmentOverlayConfig};
use crate::data_handling::gene_data::{gene_records, GeneTable};
use crate::data_handling::genotype_calls::{genotype_records, GenotypeTable};
use crate::data_handling::ndm_cohort::read_ndm_cohort;
use crate::data_handling::segment_tables::{
    clean_segment_table, combine_segment_tables, filter_min_length, segments_from_frame, SegmentTable,
};
use crate::data_handling::shared_regions::{
    parse_grid_parameters, read_shared_regions, shared_region_files, GridParameters,
};
use crate::data_handling::variant_sites::VariantSiteReader;
use crate::detection::{detect_shared_regions, write_detected_regions};
use crate::helper_functions::{dataframe_to_csv, ensure_dir};
use crate::interval_join::{join_calls_to_genes, parse_calls, partition_genes};
use crate::models::{Dataset, GeneRecord, GenotypeCall, JoinedVariant};

/// Joined rows for the two heatmaps.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapRows {
    /// Calls inside the target gene itself (no flank).
    pub target: Vec<JoinedVariant>,
    /// Calls within the buffer of any other gene.
    pub others: Vec<JoinedVariant>,
}

pub fn split_heatmap_rows(
    calls: &[GenotypeCall],
    genes: &[GeneRecord],
    target_gene: &str,
    gene_buffer: u64,
) -> HeatmapRows {
    let (target_genes, other_genes) = partition_genes(genes, target_gene);
    if target_genes.is_empty() {
        warn!("Target gene {} is not in the gene table", target_gene);
    }

    let rows = HeatmapRows {
        target: join_calls_to_genes(calls, &target_genes, 0),
        others: join_calls_to_genes(calls, &other_genes, gene_buffer),
    };
    info!(
        "{} rows fall in {}, {} rows near {} other genes",
        rows.target.len(),
        target_gene,
        rows.others.len(),
        other_genes.len()
    );
    rows
}

/// Load, parse and join the genotype and gene tables.
pub fn prepare_heatmap_rows(project_root: &Path, cfg: &GenotypeHeatmapConfig) -> Result<HeatmapRows> {
    let genotype_path = PipelineConfig::resolve(project_root, &cfg.genotype_path);
    let geno = GenotypeTable { path: genotype_path.clone() }
        .load()
        .with_context(|| format!("loading genotype calls from {}", genotype_path.display()))?;
    let records = genotype_records(&geno)?;
    let calls = parse_calls(&records).context("parsing variant positions")?;

    let gene_path = PipelineConfig::resolve(project_root, &cfg.gene_path);
    let gene_df = GeneTable { path: gene_path.clone() }
        .load()
        .with_context(|| format!("loading gene coordinates from {}", gene_path.display()))?;
    let genes = gene_records(&gene_df)?;

    Ok(split_heatmap_rows(&calls, &genes, &cfg.target_gene, cfg.gene_buffer))
}

pub fn run_genotype_heatmaps(project_root: &Path, config: &PipelineConfig) -> Result<()> {
    let cfg = &config.genotypes;
    let rows = prepare_heatmap_rows(project_root, cfg)?;
    ensure_dir(&PipelineConfig::resolve(project_root, &config.output_dir))?;

    let target_layout = build_heatmap_layout(&rows.target, &cfg.sample_order, cfg.target_tick_stride);
    render_heatmap(
        &target_layout,
        &format!("Genotypes in {}", cfg.target_gene),
        &config.output_path(project_root, &cfg.target_output),
        cfg.image_size,
    )
    .map_err(|e| anyhow!("drawing {} heatmap: {}", cfg.target_gene, e))?;

    let other_layout = build_heatmap_layout(&rows.others, &cfg.sample_order, cfg.other_tick_stride);
    render_heatmap(
        &other_layout,
        &format!("Genotypes near candidate genes (excluding {}, ±{} bp)", cfg.target_gene, cfg.gene_buffer),
        &config.output_path(project_root, &cfg.other_output),
        cfg.image_size,
    )
    .map_err(|e| anyhow!("drawing candidate-gene heatmap: {}", e))?;

    Ok(())
}

/// Clean, tag, stack and length-filter the configured segment tables.
pub fn prepare_segments(project_root: &Path, cfg: &SegmentOverlayConfig) -> Result<DataFrame> {
    let mut cleaned = Vec::with_capacity(cfg.inputs.len());
    for (sample, path) in &cfg.inputs {
        let table = SegmentTable {
            sample: sample.clone(),
            path: PipelineConfig::resolve(project_root, path),
        };
        let raw = table
            .load()
            .with_context(|| format!("loading segments for {}", sample))?;
        cleaned.push(clean_segment_table(&raw, sample)?);
    }

    let combined = combine_segment_tables(&cleaned)?;
    let total = combined.height();
    let filtered = filter_min_length(combined, cfg.min_length)?;
    info!(
        "{} of {} segments span at least {} bp",
        filtered.height(),
        total,
        cfg.min_length
    );
    if filtered.height() == 0 {
        warn!("No segments left after the length filter");
    }
    Ok(filtered)
}

pub fn run_segment_overlay(project_root: &Path, config: &PipelineConfig) -> Result<()> {
    let cfg = &config.segments;
    let mut filtered = prepare_segments(project_root, cfg)?;

    ensure_dir(&PipelineConfig::resolve(project_root, &config.output_dir))?;
    dataframe_to_csv(&mut filtered, &config.output_path(project_root, &cfg.combined_output))?;

    let segments = segments_from_frame(&filtered)?;
    if let Some(longest) = segments.iter().max_by_key(|s| s.length()) {
        info!(
            "Longest segment: {} {}:{}-{} ({} bp)",
            longest.sample,
            longest.chr,
            longest.start,
            longest.end,
            longest.length()
        );
    }
    let samples: Vec<String> = cfg.inputs.iter().map(|(s, _)| s.clone()).collect();
    let layout = build_segment_layout(&segments, &samples, &cfg.region);
    render_segment_plot(
        &layout,
        &format!("Shared segments near {} (≥ {} bp)", cfg.region.symbol, cfg.min_length),
        &config.output_path(project_root, &cfg.plot_output),
        cfg.image_size,
    )
    .map_err(|e| anyhow!("drawing segment plot: {}", e))?;

    Ok(())
}

/// One summary per shared-region file ending in `suffix` whose name carries grid parameters.
pub fn collect_match_summaries(dir: &Path, suffix: &str, cohort: &CohortGroups) -> Result<Vec<MatchSummary>> {
    let files = shared_region_files(dir, suffix).with_context(|| format!("listing {}", dir.display()))?;

    let mut summaries = Vec::with_capacity(files.len());
    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(params) = parse_grid_parameters(&file_name) else {
            warn!("Skipping {}: no dist/vars/rare parameters in the name", file_name);
            continue;
        };
        let regions = read_shared_regions(&path).with_context(|| format!("reading {}", path.display()))?;
        summaries.push(summarise_regions(&file_name, params, &regions, cohort));
    }

    sort_summaries(&mut summaries);
    Ok(summaries)
}

pub fn run_match_summary(project_root: &Path, config: &PipelineConfig) -> Result<()> {
    let cfg = &config.shared_regions;
    let dir = PipelineConfig::resolve(project_root, &cfg.input_dir);
    if !dir.is_dir() {
        warn!("Shared-region directory {} not found, skipping match summary", dir.display());
        return Ok(());
    }

    let cohort = CohortGroups::default();
    info!("Classifying shared regions against {} cohort members", cohort.len());
    let summaries = collect_match_summaries(&dir, &cfg.file_suffix, &cohort)?;
    if summaries.is_empty() {
        warn!("No shared-region files ending in {} in {}", cfg.file_suffix, dir.display());
        return Ok(());
    }

    ensure_dir(&PipelineConfig::resolve(project_root, &config.output_dir))?;
    write_summary_csv(&config.output_path(project_root, &cfg.summary_output), &summaries)?;
    render_match_barplot(&summaries, &config.output_path(project_root, &cfg.plot_output), cfg.image_size)
        .map_err(|e| anyhow!("drawing match bar plot: {}", e))?;

    render_region_count_plot(
        &region_counts(&summaries),
        config.detection.params.ultra_rare_threshold,
        &config.output_path(project_root, &cfg.count_plot_output),
        cfg.count_image_size,
    )
    .map_err(|e| anyhow!("drawing region count plot: {}", e))?;

    Ok(())
}

pub fn region_counts(summaries: &[MatchSummary]) -> Vec<RegionCount> {
    summaries
        .iter()
        .map(|s| RegionCount {
            params: GridParameters {
                cluster_distance: s.cluster_distance,
                min_variants: s.min_variants,
                ultra_rare: s.ultra_rare,
            },
            regions: s.total_regions,
        })
        .collect()
}

/// Tag the configured region file by NDM patient status and write the three report tables.
pub fn run_ndm_report(project_root: &Path, config: &PipelineConfig) -> Result<()> {
    let cfg = &config.ndm_report;
    let cohort_path = PipelineConfig::resolve(project_root, &cfg.cohort_file);
    let regions_path = PipelineConfig::resolve(project_root, &cfg.regions_file);
    for path in [&cohort_path, &regions_path] {
        if !path.is_file() {
            warn!("{} not found, skipping NDM report", path.display());
            return Ok(());
        }
    }

    let cohort = read_ndm_cohort(&cohort_path).with_context(|| format!("reading {}", cohort_path.display()))?;
    let regions = read_shared_regions(&regions_path).with_context(|| format!("reading {}", regions_path.display()))?;
    let rows = ndm_regions(&regions, &cohort);
    info!("{} of {} regions are shared by NDM patients", rows.len(), regions.len());

    ensure_dir(&PipelineConfig::resolve(project_root, &config.output_dir))?;
    write_tsv(&config.output_path(project_root, &cfg.regions_output), &rows)?;

    let mixed: Vec<_> = rows.iter().filter(|r| r.status == RegionStatus::Mixed).cloned().collect();
    if !mixed.is_empty() {
        write_tsv(&config.output_path(project_root, &cfg.mixed_output), &mixed)?;
    }

    let summary = summarise_ndm_regions(&rows);
    for row in &summary {
        info!("{}: {} regions, {} patients", row.status.label(), row.n_regions, row.total_patients);
    }
    write_tsv(&config.output_path(project_root, &cfg.summary_output), &summary)?;

    if let Some(region) = most_shared_mixed(&rows) {
        info!("Most shared mixed region: {} ({})", region.region, region.patient_diseases);
    }
    Ok(())
}

/// Scan the cohort VCF for shared ultra-rare haplotypes and write one region file.
pub fn run_shared_haplotype_detection(project_root: &Path, config: &PipelineConfig) -> Result<()> {
    let cfg = &config.detection;
    let vcf_path = PipelineConfig::resolve(project_root, &cfg.vcf_path);
    if !vcf_path.is_file() {
        warn!("VCF {} not found, skipping haplotype detection", vcf_path.display());
        return Ok(());
    }

    let gene_path = PipelineConfig::resolve(project_root, &cfg.gene_path);
    let gene_df = GeneTable { path: gene_path.clone() }
        .load()
        .with_context(|| format!("loading gene coordinates from {}", gene_path.display()))?;
    let genes = gene_records(&gene_df)?;

    let params = &cfg.params;
    let mut reader = VariantSiteReader::open(&vcf_path, &params.csq_field, params.ultra_rare_threshold)?;
    let sample_ids = reader.sample_ids().to_vec();
    let regions = detect_shared_regions(reader.sites(), params, &sample_ids, &genes)?;

    let output_dir = PipelineConfig::resolve(project_root, &cfg.output_dir);
    ensure_dir(&output_dir)?;
    let output_path = output_dir.join(params.output_file_name());
    let file = File::create(&output_path).with_context(|| format!("creating {}", output_path.display()))?;
    write_detected_regions(BufWriter::new(file), &regions)?;
    info!("{} regions written to {}", regions.len(), output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::shared_regions::NO_GENE_FILTER_SUFFIX;
    use crate::genotype::GenotypeClass;
    use crate::models::GenotypeRecord;
    use crate::position::Chromosome;
    use std::fs;
    use std::path::PathBuf;

    fn ficd() -> GeneRecord {
        GeneRecord {
            symbol: "FICD".into(),
            chr: Chromosome::from_name("19").unwrap(),
            start: 100,
            end: 200,
        }
    }

    fn record(position: &str, sample: &str, genotype: &str) -> GenotypeRecord {
        GenotypeRecord {
            position: position.into(),
            sample: sample.into(),
            genotype: genotype.into(),
        }
    }

    #[test]
    fn target_gene_call_only_in_target_heatmap() {
        let genes = vec![
            ficd(),
            GeneRecord {
                symbol: "NARS2".into(),
                chr: Chromosome::from_name("11").unwrap(),
                start: 78_436_360,
                end: 78_574_919,
            },
        ];
        let calls = parse_calls(&[
            record("chr19:150", "WG0153", "0/1"),
            record("chr11:78430000", "WG0718", "1/1"),
            record("chr19:250", "WG0153", "0/0"),
        ])
        .unwrap();

        let rows = split_heatmap_rows(&calls, &genes, "FICD", 10_000);

        assert_eq!(rows.target.len(), 1);
        assert_eq!(rows.target[0].label, "FICD:150");
        assert_eq!(rows.target[0].class, GenotypeClass::Het);
        assert!(rows.others.iter().all(|r| r.locus.pos != 150 && r.gene != "FICD"));

        // NARS2 picks up the flanked call, the chr19 calls go nowhere else
        assert_eq!(rows.others.len(), 1);
        assert_eq!(rows.others[0].label, "NARS2:78430000");
    }

    #[test]
    fn prepares_rows_from_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("geno.csv"),
            "Sample,Genotype,Position\nWG0153,0/1,chr19:150\nWG0154,./.,chr19:160\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("genes.csv"),
            "hgnc_symbol,chromosome_name,start_position,end_position\nFICD,19,100,200\nPAX4,7,127610292,127618000\n",
        )
        .unwrap();

        let cfg = GenotypeHeatmapConfig {
            genotype_path: PathBuf::from("geno.csv"),
            gene_path: PathBuf::from("genes.csv"),
            ..GenotypeHeatmapConfig::default()
        };
        let rows = prepare_heatmap_rows(dir.path(), &cfg).unwrap();
        let labels: Vec<(&str, GenotypeClass)> = rows.target.iter().map(|r| (r.label.as_str(), r.class)).collect();
        assert_eq!(labels, vec![("FICD:150", GenotypeClass::Het), ("FICD:160", GenotypeClass::Missing)]);
        assert!(rows.others.is_empty());
    }

    #[test]
    fn malformed_position_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("geno.csv"), "Position,Sample,Genotype\n19:150,WG0153,0/1\n").unwrap();
        fs::write(
            dir.path().join("genes.csv"),
            "hgnc_symbol,chromosome_name,start_position,end_position\nFICD,19,100,200\n",
        )
        .unwrap();
        let cfg = GenotypeHeatmapConfig {
            genotype_path: PathBuf::from("geno.csv"),
            gene_path: PathBuf::from("genes.csv"),
            ..GenotypeHeatmapConfig::default()
        };
        let err = prepare_heatmap_rows(dir.path(), &cfg).unwrap_err();
        assert!(format!("{err:#}").contains("19:150"));
    }

    #[test]
    fn segments_from_two_samples() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tsv"), "chr11\t100\t700\nchr11\t100\t600\nchr11\t\t\n").unwrap();
        fs::write(dir.path().join("b.tsv"), "chr11\t1000\t2000\n").unwrap();

        let cfg = SegmentOverlayConfig {
            inputs: vec![
                ("WG0718".to_string(), PathBuf::from("a.tsv")),
                ("WG1094".to_string(), PathBuf::from("b.tsv")),
            ],
            min_length: 550,
            ..SegmentOverlayConfig::default()
        };
        let df = prepare_segments(dir.path(), &cfg).unwrap();
        let segments = segments_from_frame(&df).unwrap();
        let kept: Vec<(i64, i64, &str)> = segments.iter().map(|s| (s.start, s.end, s.sample.as_str())).collect();
        assert_eq!(kept, vec![(100, 700, "WG0718"), (1000, 2000, "WG1094")]);
    }

    #[test]
    fn match_summaries_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("shared_regions_dist2000_vars8_rare1_no_gene_filter.tsv"),
            "chr11\t1\t9\t8\t2\tWG0718,WG1094\tsingle\tNone\tNone\t2\tULTRA_RARE\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("shared_regions_dist1000_vars8_rare1_no_gene_filter.tsv"),
            "chr11\t1\t9\t8\t2\tWG0718,WG1094\tsingle\tNone\tNone\t2\tULTRA_RARE\n\
             chr19\t1\t9\t8\t2\tWG0153,WG0718\tsingle\tNone\tNone\t2\tULTRA_RARE\n",
        )
        .unwrap();
        fs::write(dir.path().join("shared_regions_unlabelled_no_gene_filter.tsv"), "").unwrap();

        let summaries = collect_match_summaries(dir.path(), NO_GENE_FILTER_SUFFIX, &CohortGroups::default()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].cluster_distance, 1000);
        assert_eq!((summaries[0].total_regions, summaries[0].true_matches), (2, 1));
        assert_eq!(summaries[1].cluster_distance, 2000);
        assert_eq!(summaries[1].percent_true, 100.0);
    }

    #[test]
    fn gene_filtered_runs_are_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let row = "chr11\t1\t9\t8\t2\tWG0718,WG1094\tsingle\tNone\tNone\t2\tULTRA_RARE\n";
        fs::write(dir.path().join("shared_regions_dist1000_vars8_rare1_no_gene_filter.tsv"), row).unwrap();
        fs::write(
            dir.path().join("shared_regions_dist1000_vars8_rare1_gene_filter.tsv"),
            row.repeat(3),
        )
        .unwrap();

        let summaries = collect_match_summaries(dir.path(), NO_GENE_FILTER_SUFFIX, &CohortGroups::default()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].file_name, "shared_regions_dist1000_vars8_rare1_no_gene_filter.tsv");
        assert_eq!(summaries[0].total_regions, 1);

        let counts = region_counts(&summaries);
        assert_eq!(counts.len(), 1);
        assert_eq!((counts[0].params.cluster_distance, counts[0].regions), (1000, 1));
    }

    #[test]
    fn ndm_report_writes_status_tables() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cohort.txt"), "WG0153\tSolved_NDM_FICD\nWG0718\tUnsolved_NDM\nWG0001\tSolved_MODY\n")
            .unwrap();
        fs::write(
            dir.path().join("regions.tsv"),
            "chr19\t100\t900\t8\t2\tWG0153,WG0718\tsingle\tNone\tNone\t2\tULTRA_RARE\n\
             chr11\t100\t900\t8\t2\tWG0718,WG0001\tsingle\tNone\tNone\t2\tULTRA_RARE\n\
             chr2\t100\t900\t8\t2\tWG0001,WG0002\tsingle\tNone\tNone\t2\tULTRA_RARE\n",
        )
        .unwrap();

        let mut config = PipelineConfig {
            output_dir: PathBuf::from("out"),
            ..PipelineConfig::default()
        };
        config.ndm_report.cohort_file = PathBuf::from("cohort.txt");
        config.ndm_report.regions_file = PathBuf::from("regions.tsv");
        run_ndm_report(dir.path(), &config).unwrap();

        let out = dir.path().join("out");
        let regions = fs::read_to_string(out.join("ndm_shared_regions.tsv")).unwrap();
        assert_eq!(regions.lines().count(), 3);
        assert!(regions.starts_with("Chromosome\tStart\tEnd\tRegion\tN_Patients"));
        let mixed = fs::read_to_string(out.join("mixed_ndm_regions.tsv")).unwrap();
        assert_eq!(mixed.lines().count(), 2);
        assert!(mixed.contains("chr19:100-900"));
        let summary = fs::read_to_string(out.join("ndm_summary.tsv")).unwrap();
        assert_eq!(summary, "Status\tN_Regions\tTotal_Patients\nMixed\t1\t2\nUnsolved NDM\t1\t1\n");
    }

    #[test]
    fn missing_vcf_skips_detection() {
        let dir = tempfile::tempdir().unwrap();
        run_shared_haplotype_detection(dir.path(), &PipelineConfig::default()).unwrap();
        assert!(!dir.path().join("data/shared_regions").exists());
    }

    #[test]
    fn detection_writes_region_file_from_vcf() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("genes.csv"),
            "hgnc_symbol,chromosome_name,start_position,end_position\nNARS2,11,78436360,78574919\n",
        )
        .unwrap();
        let mut vcf = String::from(
            "##fileformat=VCFv4.3\n\
             ##INFO=<ID=CSQ,Number=.,Type=String,Description=\"VEP. Format: Allele|SYMBOL|GnomAD_v4_1_AF_popmax\">\n\
             ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
             ##contig=<ID=chr11>\n\
             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tWG0718\tWG1094\tWG0153\n",
        );
        for i in 0..3u64 {
            vcf.push_str(&format!(
                "chr11\t{}\t.\tA\tG\t.\tPASS\tCSQ=G|NARS2|0.00001\tGT\t0/1\t0/1\t0/0\n",
                78_440_000 + i * 100
            ));
        }
        fs::write(dir.path().join("cohort.vcf"), vcf).unwrap();

        let mut config = PipelineConfig::default();
        config.detection.vcf_path = PathBuf::from("cohort.vcf");
        config.detection.gene_path = PathBuf::from("genes.csv");
        config.detection.output_dir = PathBuf::from("regions");
        config.detection.params.min_variants = 3;
        run_shared_haplotype_detection(dir.path(), &config).unwrap();

        let written = dir.path().join("regions/shared_regions_dist2000_vars3_rare1_no_gene_filter.tsv");
        let regions = read_shared_regions(&written).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, "78440000");
        assert_eq!(regions[0].individuals, vec!["WG0718".to_string(), "WG1094".to_string()]);
    }
}
