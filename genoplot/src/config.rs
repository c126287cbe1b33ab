use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cohort::default_sample_order;
use crate::data_handling::shared_regions::NO_GENE_FILTER_SUFFIX;
use crate::detection::DetectionParams;
use crate::models::GeneRegion;

pub const CONFIG_FILE_NAME: &str = "genoplot_config.json";

/// Run configuration; every path is relative to the project root unless absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub genotypes: GenotypeHeatmapConfig,
    pub segments: SegmentOverlayConfig,
    pub shared_regions: SharedRegionConfig,
    pub ndm_report: NdmReportConfig,
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenotypeHeatmapConfig {
    pub genotype_path: PathBuf,
    pub gene_path: PathBuf,
    pub target_gene: String,
    /// Flank added around every non-target gene.
    pub gene_buffer: u64,
    pub target_tick_stride: usize,
    pub other_tick_stride: usize,
    pub sample_order: Vec<String>,
    pub target_output: String,
    pub other_output: String,
    pub image_size: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOverlayConfig {
    /// (sample label, headerless chr/start/end table)
    pub inputs: Vec<(String, PathBuf)>,
    pub min_length: i64,
    pub region: GeneRegion,
    pub combined_output: String,
    pub plot_output: String,
    pub image_size: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedRegionConfig {
    pub input_dir: PathBuf,
    /// Only files ending in this are summarised.
    pub file_suffix: String,
    pub summary_output: String,
    pub plot_output: String,
    pub image_size: (u32, u32),
    pub count_plot_output: String,
    pub count_image_size: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NdmReportConfig {
    /// Headerless patient/category table.
    pub cohort_file: PathBuf,
    pub regions_file: PathBuf,
    pub regions_output: String,
    pub mixed_output: String,
    pub summary_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub vcf_path: PathBuf,
    pub gene_path: PathBuf,
    /// Region files land here, named after the run parameters.
    pub output_dir: PathBuf,
    pub params: DetectionParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            output_dir: PathBuf::from("figures"),
            genotypes: GenotypeHeatmapConfig::default(),
            segments: SegmentOverlayConfig::default(),
            shared_regions: SharedRegionConfig::default(),
            ndm_report: NdmReportConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl Default for GenotypeHeatmapConfig {
    fn default() -> Self {
        GenotypeHeatmapConfig {
            genotype_path: PathBuf::from("data/genotypes.csv"),
            gene_path: PathBuf::from("data/gene_data.csv"),
            target_gene: "FICD".to_string(),
            gene_buffer: 10_000,
            target_tick_stride: 2,
            other_tick_stride: 10,
            sample_order: default_sample_order(),
            target_output: "genotype_heatmap_FICD.png".to_string(),
            other_output: "genotype_heatmap_other_genes.png".to_string(),
            image_size: (1800, 1000),
        }
    }
}

impl Default for SegmentOverlayConfig {
    fn default() -> Self {
        SegmentOverlayConfig {
            inputs: vec![
                ("WG0718".to_string(), PathBuf::from("data/WG0718_segments.tsv")),
                ("WG1094".to_string(), PathBuf::from("data/WG1094_segments.tsv")),
            ],
            min_length: 550,
            region: GeneRegion {
                symbol: "NARS2".to_string(),
                chr: "chr11".to_string(),
                start: 78_436_360,
                end: 78_574_919,
                flank: 100_000,
            },
            combined_output: "segments_filtered.csv".to_string(),
            plot_output: "NARS2_segments.png".to_string(),
            image_size: (1400, 500),
        }
    }
}

impl Default for SharedRegionConfig {
    fn default() -> Self {
        SharedRegionConfig {
            input_dir: PathBuf::from("data/shared_regions"),
            file_suffix: NO_GENE_FILTER_SUFFIX.to_string(),
            summary_output: "shared_regions_match_summary.csv".to_string(),
            plot_output: "true_match_barplot.png".to_string(),
            image_size: (1000, 600),
            count_plot_output: "neonatal_dm_regions.png".to_string(),
            count_image_size: (1000, 600),
        }
    }
}

impl Default for NdmReportConfig {
    fn default() -> Self {
        NdmReportConfig {
            cohort_file: PathBuf::from("data/new_cohort.txt"),
            regions_file: PathBuf::from("data/unsolved_cohort_1000_8.tsv"),
            regions_output: "ndm_shared_regions.tsv".to_string(),
            mixed_output: "mixed_ndm_regions.tsv".to_string(),
            summary_output: "ndm_summary.tsv".to_string(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            vcf_path: PathBuf::from("data/cohort.vcf.gz"),
            gene_path: PathBuf::from("data/gene_data.csv"),
            output_dir: PathBuf::from("data/shared_regions"),
            params: DetectionParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolve a possibly relative path against the project root.
    pub fn resolve(project_root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_root.join(path)
        }
    }

    pub fn output_path(&self, project_root: &Path, file_name: &str) -> PathBuf {
        Self::resolve(project_root, &self.output_dir).join(file_name)
    }
}

/// Load `genoplot_config.json` from the project root, writing the defaults first if absent.
pub fn load_or_write_config(project_root: &Path) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let config_path = project_root.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        let config = PipelineConfig::default();
        fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
        info!("Wrote default configuration to {}", config_path.display());
        return Ok(config);
    }

    let text = fs::read_to_string(&config_path)?;
    let config: PipelineConfig = serde_json::from_str(&text)?;
    info!("Loaded configuration from {}", config_path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_defaults_then_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let written = load_or_write_config(dir.path()).unwrap();
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        let read = load_or_write_config(dir.path()).unwrap();
        assert_eq!(written, read);
        assert_eq!(read.genotypes.gene_buffer, 10_000);
        assert_eq!(read.segments.min_length, 550);
        assert_eq!(read.shared_regions.file_suffix, "_no_gene_filter.tsv");
        assert_eq!(read.detection.params.cluster_distance, 2000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "genotypes": { "target_gene": "HK1" }, "segments": { "min_length": 1000 } }"#,
        )
        .unwrap();
        let config = load_or_write_config(dir.path()).unwrap();
        assert_eq!(config.genotypes.target_gene, "HK1");
        assert_eq!(config.genotypes.gene_buffer, 10_000);
        assert_eq!(config.segments.min_length, 1000);
        assert_eq!(config.segments.region.symbol, "NARS2");
        assert_eq!(config.output_dir, PathBuf::from("figures"));
        assert_eq!(config.ndm_report.summary_output, "ndm_summary.tsv");
    }

    #[test]
    fn nested_detection_params_fill_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "detection": { "params": { "cluster_distance": 1000, "max_individuals": 5 } } }"#,
        )
        .unwrap();
        let config = load_or_write_config(dir.path()).unwrap();
        let params = &config.detection.params;
        assert_eq!(params.cluster_distance, 1000);
        assert_eq!(params.max_individuals, Some(5));
        assert_eq!(params.min_variants, 8);
        assert_eq!(params.output_file_name(), "shared_regions_dist1000_vars8_rare1_no_gene_filter.tsv");
        assert_eq!(config.detection.vcf_path, PathBuf::from("data/cohort.vcf.gz"));
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let root = Path::new("/srv/project");
        assert_eq!(
            PipelineConfig::resolve(root, Path::new("data/x.csv")),
            PathBuf::from("/srv/project/data/x.csv")
        );
        assert_eq!(
            PipelineConfig::resolve(root, Path::new("/abs/x.csv")),
            PathBuf::from("/abs/x.csv")
        );
        let config = PipelineConfig::default();
        assert_eq!(
            config.output_path(root, "a.png"),
            PathBuf::from("/srv/project/figures/a.png")
        );
    }
}
