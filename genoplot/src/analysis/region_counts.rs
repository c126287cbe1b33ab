use std::error::Error;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::analysis::is_svg_path;
use crate::data_handling::shared_regions::GridParameters;

const RARE_COLOURS: [RGBColor; 6] = [
    RGBColor(68, 1, 84),
    RGBColor(59, 82, 139),
    RGBColor(33, 145, 140),
    RGBColor(94, 201, 98),
    RGBColor(253, 231, 37),
    RGBColor(145, 30, 180),
];

/// Number of regions one grid run reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionCount {
    pub params: GridParameters,
    pub regions: usize,
}

/// One line: fixed rare value and min variants, regions by cluster distance.
#[derive(Debug, Clone, PartialEq)]
pub struct CountSeries {
    pub ultra_rare: f64,
    pub min_variants: u64,
    pub points: Vec<(u64, usize)>,
}

/// Group counts into lines ordered by (rare value, min variants), points by distance.
pub fn count_series(counts: &[RegionCount]) -> Vec<CountSeries> {
    let mut sorted = counts.to_vec();
    sorted.sort_by(|a, b| {
        a.params
            .ultra_rare
            .total_cmp(&b.params.ultra_rare)
            .then(a.params.min_variants.cmp(&b.params.min_variants))
            .then(a.params.cluster_distance.cmp(&b.params.cluster_distance))
    });

    let mut series: Vec<CountSeries> = Vec::new();
    for count in sorted {
        let p = count.params;
        match series.last_mut() {
            Some(s) if s.ultra_rare == p.ultra_rare && s.min_variants == p.min_variants => {
                s.points.push((p.cluster_distance, count.regions));
            }
            _ => series.push(CountSeries {
                ultra_rare: p.ultra_rare,
                min_variants: p.min_variants,
                points: vec![(p.cluster_distance, count.regions)],
            }),
        }
    }
    series
}

pub fn render_region_count_plot(
    counts: &[RegionCount],
    af_threshold: f64,
    output_path: &Path,
    size: (u32, u32),
) -> Result<(), Box<dyn Error>> {
    let series = count_series(counts);
    let title = format!("Neonatal Diabetes: Shared Ultra-Rare Regions (AF ≤ {af_threshold})");
    if is_svg_path(output_path) {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_counts(&root, &series, &title)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_counts(&root, &series, &title)?;
        root.present()?;
    }
    info!("Region count plot with {} lines saved to {}", series.len(), output_path.display());
    Ok(())
}

fn draw_counts<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    series: &[CountSeries],
    title: &str,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let points = series.iter().flat_map(|s| s.points.iter());
    let (x_min, x_max) = points
        .clone()
        .fold((u64::MAX, 0u64), |(lo, hi), (d, _)| (lo.min(*d), hi.max(*d)));
    let (x_min, x_max) = if x_min > x_max { (0, 1) } else { (x_min, x_max.max(x_min + 1)) };
    let y_max = points.map(|(_, n)| *n).max().unwrap_or(0).max(1);
    let pad = ((x_max - x_min) / 20).max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif bold", 22))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(
            x_min.saturating_sub(pad) as f64..(x_max + pad) as f64,
            0.0..(y_max as f64 * 1.1),
        )?;

    chart
        .configure_mesh()
        .x_desc("Cluster Distance (bp)")
        .y_desc("Regions Identified")
        .axis_desc_style(("sans-serif", 18))
        .label_style(("sans-serif", 14))
        .draw()?;

    // one colour per rare value
    let mut rare_values: Vec<f64> = series.iter().map(|s| s.ultra_rare).collect();
    rare_values.dedup();

    for line in series {
        let hue = rare_values.iter().position(|r| *r == line.ultra_rare).unwrap_or(0);
        let colour = RARE_COLOURS[hue % RARE_COLOURS.len()];
        let coords: Vec<(f64, f64)> = line.points.iter().map(|(d, n)| (*d as f64, *n as f64)).collect();

        chart
            .draw_series(LineSeries::new(coords.clone(), colour.stroke_width(3)))?
            .label(format!("rare {} / vars {}", line.ultra_rare, line.min_variants))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], colour.stroke_width(3)));
        chart.draw_series(coords.into_iter().map(|c| Circle::new(c, 4, colour.filled())))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 13))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(dist: u64, vars: u64, rare: f64, regions: usize) -> RegionCount {
        RegionCount {
            params: GridParameters {
                cluster_distance: dist,
                min_variants: vars,
                ultra_rare: rare,
            },
            regions,
        }
    }

    #[test]
    fn lines_group_by_rare_and_min_variants() {
        let counts = vec![
            count(2000, 8, 1.0, 30),
            count(1000, 8, 1.0, 20),
            count(1000, 10, 1.0, 12),
            count(1000, 8, 2.0, 5),
        ];
        let series = count_series(&counts);
        assert_eq!(
            series,
            vec![
                CountSeries { ultra_rare: 1.0, min_variants: 8, points: vec![(1000, 20), (2000, 30)] },
                CountSeries { ultra_rare: 1.0, min_variants: 10, points: vec![(1000, 12)] },
                CountSeries { ultra_rare: 2.0, min_variants: 8, points: vec![(1000, 5)] },
            ]
        );
        assert!(count_series(&[]).is_empty());
    }

    #[test]
    fn renders_lines_to_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.svg");
        let counts = vec![count(1000, 8, 1.0, 20), count(2000, 8, 1.0, 30)];
        render_region_count_plot(&counts, 0.0001, &path, (800, 500)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("rare 1 / vars 8"));
        assert!(svg.contains("Cluster Distance (bp)"));

        let empty = dir.path().join("empty.svg");
        render_region_count_plot(&[], 0.0001, &empty, (800, 500)).unwrap();
        assert!(std::fs::read_to_string(&empty).unwrap().contains("Regions Identified"));
    }
}
