//! True-match rate of shared haplotype regions across a detection parameter grid.
//!
//! A region is a *true match* when every individual sharing it was attributed
//! to the same causal-gene group.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::error::Error;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::analysis::is_svg_path;
use crate::cohort::CohortGroups;
use crate::data_handling::shared_regions::{GridParameters, SharedRegion};

// One colour per cluster distance
const DISTANCE_COLOURS: [RGBColor; 6] = [
    RGBColor(230, 25, 75),
    RGBColor(60, 180, 75),
    RGBColor(0, 130, 200),
    RGBColor(245, 130, 48),
    RGBColor(145, 30, 180),
    RGBColor(70, 240, 240),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    TrueMatch,
    NoMatch,
}

pub fn classify_region(individuals: &[String], cohort: &CohortGroups) -> MatchStatus {
    let groups: HashSet<&str> = individuals.iter().map(|id| cohort.group_of(id)).collect();
    if groups.len() == 1 {
        MatchStatus::TrueMatch
    } else {
        MatchStatus::NoMatch
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    pub file_name: String,
    pub cluster_distance: u64,
    pub min_variants: u64,
    pub ultra_rare: f64,
    pub total_regions: usize,
    pub true_matches: usize,
    pub percent_true: f64,
}

pub fn summarise_regions(
    file_name: &str,
    params: GridParameters,
    regions: &[SharedRegion],
    cohort: &CohortGroups,
) -> MatchSummary {
    let total_regions = regions.len();
    let true_matches = regions
        .iter()
        .filter(|r| classify_region(&r.individuals, cohort) == MatchStatus::TrueMatch)
        .count();
    let percent_true = if total_regions > 0 {
        100.0 * true_matches as f64 / total_regions as f64
    } else {
        0.0
    };

    MatchSummary {
        file_name: file_name.to_string(),
        cluster_distance: params.cluster_distance,
        min_variants: params.min_variants,
        ultra_rare: params.ultra_rare,
        total_regions,
        true_matches,
        percent_true,
    }
}

/// Sort by distance, then min variants, then rare threshold.
pub fn sort_summaries(summaries: &mut [MatchSummary]) {
    summaries.sort_by(|a, b| {
        a.cluster_distance
            .cmp(&b.cluster_distance)
            .then(a.min_variants.cmp(&b.min_variants))
            .then(a.ultra_rare.total_cmp(&b.ultra_rare))
    });
}

pub fn write_summary_csv(path: &Path, summaries: &[MatchSummary]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for summary in summaries {
        writer.serialize(summary)?;
    }
    writer.flush()?;
    info!("Match summary for {} files saved to {}", summaries.len(), path.display());
    Ok(())
}

/// Bars grouped by min variants (x) and coloured by cluster distance.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroups {
    pub min_variants: Vec<u64>,
    pub distances: Vec<u64>,
    /// (group index, distance index, mean percent true over rare thresholds)
    pub bars: Vec<(usize, usize, f64)>,
}

pub fn bar_groups(summaries: &[MatchSummary]) -> BarGroups {
    let min_variants: Vec<u64> = summaries.iter().map(|s| s.min_variants).collect::<BTreeSet<_>>().into_iter().collect();
    let distances: Vec<u64> = summaries.iter().map(|s| s.cluster_distance).collect::<BTreeSet<_>>().into_iter().collect();

    let mut sums: BTreeMap<(usize, usize), (f64, usize)> = BTreeMap::new();
    for s in summaries {
        let g = min_variants.binary_search(&s.min_variants).unwrap_or_default();
        let h = distances.binary_search(&s.cluster_distance).unwrap_or_default();
        let entry = sums.entry((g, h)).or_insert((0.0, 0));
        entry.0 += s.percent_true;
        entry.1 += 1;
    }

    let bars = sums
        .into_iter()
        .map(|((g, h), (sum, n))| (g, h, sum / n as f64))
        .collect();

    BarGroups { min_variants, distances, bars }
}

pub fn render_match_barplot(summaries: &[MatchSummary], output_path: &Path, size: (u32, u32)) -> Result<(), Box<dyn Error>> {
    let groups = bar_groups(summaries);
    if is_svg_path(output_path) {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_barplot(&root, &groups)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_barplot(&root, &groups)?;
        root.present()?;
    }
    info!("True-match bar plot saved to {}", output_path.display());
    Ok(())
}

fn draw_barplot<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, groups: &BarGroups) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let n_groups = groups.min_variants.len().max(1);
    let n_hues = groups.distances.len().max(1);
    let bar_width = 0.8 / n_hues as f64;

    let mut chart = ChartBuilder::on(root)
        .caption("Percentage of True Matches by Parameters", ("sans-serif bold", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n_groups as f64 - 0.5), 0.0..100.0)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_groups)
        .x_label_formatter(&|v: &f64| {
            let idx = v.round();
            if (v - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            groups.min_variants.get(idx as usize).map(|n| n.to_string()).unwrap_or_default()
        })
        .x_desc("Min Variants")
        .y_desc("True Matches (%)")
        .axis_desc_style(("sans-serif", 18))
        .label_style(("sans-serif", 14))
        .draw()?;

    for (h, distance) in groups.distances.iter().enumerate() {
        let colour = DISTANCE_COLOURS[h % DISTANCE_COLOURS.len()];
        chart
            .draw_series(groups.bars.iter().filter(|(_, hue, _)| *hue == h).map(|(g, _, pct)| {
                let x0 = *g as f64 - 0.4 + h as f64 * bar_width;
                Rectangle::new([(x0, 0.0), (x0 + bar_width, *pct)], colour.filled())
            }))?
            .label(format!("{distance} bp"))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], colour.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::shared_regions::parse_grid_parameters;
    use crate::cohort::COHORT;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn region(individuals: &[&str]) -> SharedRegion {
        SharedRegion {
            chrom: "chr11".into(),
            start: "1".into(),
            end: "2".into(),
            individuals: ids(individuals),
        }
    }

    #[test]
    fn same_group_is_a_true_match() {
        let cohort = CohortGroups::from_members(&COHORT);
        assert_eq!(classify_region(&ids(&["WG0718", "WG1094", "WG0512"]), &cohort), MatchStatus::TrueMatch);
        assert_eq!(classify_region(&ids(&["WG0718", "WG0153"]), &cohort), MatchStatus::NoMatch);
        // two unknown ids share the UNKNOWN group
        assert_eq!(classify_region(&ids(&["X1", "X2"]), &cohort), MatchStatus::TrueMatch);
        assert_eq!(classify_region(&ids(&["X1", "WG0718"]), &cohort), MatchStatus::NoMatch);
        assert_eq!(classify_region(&[], &cohort), MatchStatus::NoMatch);
    }

    #[test]
    fn summary_counts_and_percent() {
        let cohort = CohortGroups::default();
        let params = parse_grid_parameters("shared_regions_dist1000_vars8_rare0.0001_no_gene_filter.tsv").unwrap();
        let regions = vec![
            region(&["WG0153", "WG0154"]),
            region(&["WG0153", "WG0718"]),
            region(&["WG0091", "WG0094", "WG0347"]),
            region(&["WG0225", "WG0872"]),
        ];
        let summary = summarise_regions("f.tsv", params, &regions, &cohort);
        assert_eq!(summary.total_regions, 4);
        assert_eq!(summary.true_matches, 2);
        assert!((summary.percent_true - 50.0).abs() < 1e-9);
        assert_eq!(summary.cluster_distance, 1000);

        let empty = summarise_regions("e.tsv", params, &[], &cohort);
        assert_eq!(empty.percent_true, 0.0);
    }

    fn summary(dist: u64, vars: u64, rare: f64, pct: f64) -> MatchSummary {
        MatchSummary {
            file_name: format!("d{dist}_v{vars}_r{rare}"),
            cluster_distance: dist,
            min_variants: vars,
            ultra_rare: rare,
            total_regions: 10,
            true_matches: 0,
            percent_true: pct,
        }
    }

    #[test]
    fn summaries_sort_by_grid_parameters() {
        let mut rows = vec![
            summary(2000, 8, 1.0, 0.0),
            summary(1000, 10, 1.0, 0.0),
            summary(1000, 8, 2.0, 0.0),
            summary(1000, 8, 1.0, 0.0),
        ];
        sort_summaries(&mut rows);
        let keys: Vec<(u64, u64, f64)> = rows.iter().map(|s| (s.cluster_distance, s.min_variants, s.ultra_rare)).collect();
        assert_eq!(keys, vec![(1000, 8, 1.0), (1000, 8, 2.0), (1000, 10, 1.0), (2000, 8, 1.0)]);
    }

    #[test]
    fn bars_average_over_rare_thresholds() {
        let rows = vec![
            summary(1000, 8, 1.0, 40.0),
            summary(1000, 8, 2.0, 60.0),
            summary(2000, 8, 1.0, 10.0),
            summary(2000, 12, 1.0, 70.0),
        ];
        let groups = bar_groups(&rows);
        assert_eq!(groups.min_variants, vec![8, 12]);
        assert_eq!(groups.distances, vec![1000, 2000]);
        assert_eq!(groups.bars, vec![(0, 0, 50.0), (0, 1, 10.0), (1, 1, 70.0)]);
    }

    #[test]
    fn summary_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_summary_csv(&path, &[summary(1000, 8, 1.0, 25.0)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("file_name,cluster_distance,min_variants,ultra_rare,total_regions,true_matches,percent_true")
        );
        assert_eq!(lines.next(), Some("d1000_v8_r1,1000,8,1.0,10,0,25.0"));
    }
}
