//! Per-sample, per-locus genotype tile heatmap.
//!
//! Layout (axes, tiles, tick labels) is worked out by [`build_heatmap_layout`]
//! and drawn by [`render_heatmap`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::FontTransform;
use tracing::{info, warn};

use crate::analysis::is_svg_path;
use crate::genotype::GenotypeClass;
use crate::models::JoinedVariant;

/// Fixed fill per genotype class.
pub fn class_colour(class: GenotypeClass) -> RGBColor {
    match class {
        GenotypeClass::HomRef => RGBColor(44, 123, 182),
        GenotypeClass::Het => RGBColor(253, 174, 97),
        GenotypeClass::HomAlt => RGBColor(215, 25, 28),
        GenotypeClass::Missing => RGBColor(204, 204, 204),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatmapCell {
    /// Column index into `x_labels`.
    pub x: usize,
    /// Row index into `samples`; 0 is the top row.
    pub y: usize,
    pub class: GenotypeClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapLayout {
    pub x_labels: Vec<String>,
    pub samples: Vec<String>,
    pub cells: Vec<HeatmapCell>,
    pub tick_stride: usize,
}

impl HeatmapLayout {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Label for column `idx` if it falls on the tick stride.
    pub fn tick_label(&self, idx: usize) -> Option<&str> {
        let stride = self.tick_stride.max(1);
        if idx % stride == 0 {
            self.x_labels.get(idx).map(String::as_str)
        } else {
            None
        }
    }

    fn tick_label_at(&self, v: f64) -> String {
        let idx = v.round();
        if idx < 0.0 || (v - idx).abs() > 1e-6 {
            return String::new();
        }
        self.tick_label(idx as usize).unwrap_or_default().to_string()
    }

    fn sample_at(&self, v: f64) -> String {
        let idx = v.round();
        if idx < 0.0 || (v - idx).abs() > 1e-6 {
            return String::new();
        }
        // y axis counts upwards, rows are listed top-down
        let n = self.samples.len();
        let idx = idx as usize;
        if idx < n {
            self.samples[n - 1 - idx].clone()
        } else {
            String::new()
        }
    }
}

/// Row order: samples from `custom_order` that are present, in that order,
/// then every other present sample alphabetically.
pub fn order_samples<'a, I>(present: I, custom_order: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: BTreeSet<&str> = present.into_iter().collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(present.len());

    for sample in custom_order {
        if present.contains(sample.as_str()) && placed.insert(sample.as_str()) {
            ordered.push(sample.clone());
        }
    }
    for sample in &present {
        if !placed.contains(sample) {
            ordered.push(sample.to_string());
        }
    }
    ordered
}

/// Columns follow the (position-sorted) row order of `rows`.
pub fn build_heatmap_layout(rows: &[JoinedVariant], sample_order: &[String], tick_stride: usize) -> HeatmapLayout {
    let mut x_labels: Vec<String> = Vec::new();
    let mut x_index: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        if !x_index.contains_key(row.label.as_str()) {
            x_index.insert(row.label.as_str(), x_labels.len());
            x_labels.push(row.label.clone());
        }
    }

    let samples = order_samples(rows.iter().map(|r| r.sample.as_str()), sample_order);
    let y_index: HashMap<&str, usize> = samples.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();

    let cells = rows
        .iter()
        .map(|row| HeatmapCell {
            x: x_index[row.label.as_str()],
            y: y_index[row.sample.as_str()],
            class: row.class,
        })
        .collect();

    HeatmapLayout {
        x_labels,
        samples,
        cells,
        tick_stride: tick_stride.max(1),
    }
}

/// Draw `layout` to `output_path` (`.svg` gives SVG, anything else PNG).
pub fn render_heatmap(
    layout: &HeatmapLayout,
    title: &str,
    output_path: &Path,
    size: (u32, u32),
) -> Result<(), Box<dyn Error>> {
    if layout.is_empty() {
        warn!("No genotype tiles for '{}', drawing empty axes", title);
    }

    if is_svg_path(output_path) {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_heatmap(&root, layout, title)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_heatmap(&root, layout, title)?;
        root.present()?;
    }

    info!(
        "Heatmap '{}' ({} loci x {} samples) saved to {}",
        title,
        layout.x_labels.len(),
        layout.samples.len(),
        output_path.display()
    );
    Ok(())
}

fn draw_heatmap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &HeatmapLayout,
    title: &str,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let (width, _) = root.dim_in_pixel();
    let (plot_area, legend_area) = root.split_horizontally(width as i32 - 160);

    let n_x = layout.x_labels.len().max(1);
    let n_y = layout.samples.len().max(1);

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(title, ("sans-serif bold", 26))
        .margin(15)
        .x_label_area_size(150)
        .y_label_area_size(90)
        .build_cartesian_2d(-0.5..(n_x as f64 - 0.5), -0.5..(n_y as f64 - 0.5))?;

    let x_label_style = TextStyle::from(("sans-serif", 12)).transform(FontTransform::Rotate90);

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_x)
        .y_labels(n_y)
        .x_label_style(x_label_style)
        .y_label_style(("sans-serif", 14))
        .x_label_formatter(&|v: &f64| layout.tick_label_at(*v))
        .y_label_formatter(&|v: &f64| layout.sample_at(*v))
        .x_desc("Variant (gene:position)")
        .y_desc("Sample")
        .axis_desc_style(("sans-serif", 18))
        .draw()?;

    let top = layout.samples.len().saturating_sub(1);
    chart.draw_series(layout.cells.iter().map(|cell| {
        let x = cell.x as f64;
        let y = (top - cell.y) as f64;
        Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], class_colour(cell.class).filled())
    }))?;

    // legend strip on the right
    let label_font = ("sans-serif", 16).into_font().color(&BLACK);
    legend_area.draw(&Text::new("Genotype", (10, 60), ("sans-serif bold", 18).into_font()))?;
    for (i, class) in GenotypeClass::ALL.iter().enumerate() {
        let y = 95 + i as i32 * 30;
        legend_area.draw(&Rectangle::new([(10, y - 9), (28, y + 9)], class_colour(*class).filled()))?;
        legend_area.draw(&Text::new(class.label(), (36, y - 8), label_font.clone()))?;
    }

    Ok(())
}
