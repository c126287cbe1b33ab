use std::error::Error;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{info, warn};

use crate::analysis::is_svg_path;
use crate::models::{GeneRegion, Segment};

const LANE_COLOURS: [RGBColor; 4] = [
    RGBColor(230, 159, 0),
    RGBColor(0, 114, 178),
    RGBColor(0, 158, 115),
    RGBColor(204, 121, 167),
];

/// Half height of a segment bar in lane units.
const BAR_HALF_HEIGHT: f64 = 0.06;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBar {
    pub start: i64,
    pub end: i64,
    pub lane: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlotLayout {
    /// One lane per sample, drawn at y = lane index + 1.
    pub lanes: Vec<String>,
    pub bars: Vec<SegmentBar>,
    pub x_range: (i64, i64),
    pub y_range: (f64, f64),
    pub region: GeneRegion,
}

impl SegmentPlotLayout {
    pub fn lane_offset(lane: usize) -> f64 {
        lane as f64 + 1.0
    }

    fn lane_label_at(&self, v: f64) -> String {
        let idx = v.round();
        if (v - idx).abs() > 1e-6 || idx < 1.0 {
            return String::new();
        }
        self.lanes.get(idx as usize - 1).cloned().unwrap_or_default()
    }
}

fn same_chromosome(a: &str, b: &str) -> bool {
    a.trim_start_matches("chr") == b.trim_start_matches("chr")
}

/// Place each segment in its sample's lane. Segments from other samples or
/// other chromosomes than the gene region are left out.
pub fn build_segment_layout(segments: &[Segment], samples: &[String], region: &GeneRegion) -> SegmentPlotLayout {
    let mut bars = Vec::with_capacity(segments.len());
    let mut skipped = 0usize;

    for segment in segments {
        let lane = samples.iter().position(|s| *s == segment.sample);
        match lane {
            Some(lane) if same_chromosome(&segment.chr, &region.chr) => bars.push(SegmentBar {
                start: segment.start,
                end: segment.end,
                lane,
            }),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(
            "Left out {} segments not on {} or not from {:?}",
            skipped, region.chr, samples
        );
    }

    let lo = bars.iter().map(|b| b.start.min(b.end)).fold(region.flanked_start(), i64::min);
    let hi = bars.iter().map(|b| b.start.max(b.end)).fold(region.flanked_end(), i64::max);
    let pad = ((hi - lo) / 50).max(1);

    SegmentPlotLayout {
        lanes: samples.to_vec(),
        bars,
        x_range: (lo - pad, hi + pad),
        y_range: (0.5, samples.len().max(1) as f64 + 0.5),
        region: region.clone(),
    }
}

pub fn render_segment_plot(
    layout: &SegmentPlotLayout,
    title: &str,
    output_path: &Path,
    size: (u32, u32),
) -> Result<(), Box<dyn Error>> {
    if is_svg_path(output_path) {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_segments(&root, layout, title)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_segments(&root, layout, title)?;
        root.present()?;
    }
    info!("Segment plot with {} bars saved to {}", layout.bars.len(), output_path.display());
    Ok(())
}

fn draw_segments<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &SegmentPlotLayout,
    title: &str,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let (x0, x1) = layout.x_range;
    let (y0, y1) = layout.y_range;
    let region = &layout.region;

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif bold", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(layout.lanes.len() * 2 + 1)
        .x_label_formatter(&|v: &i64| format!("{:.2}", *v as f64 / 1e6))
        .y_label_formatter(&|v: &f64| layout.lane_label_at(*v))
        .x_desc(format!("Position on {} (Mb)", region.chr))
        .y_desc("Sample")
        .axis_desc_style(("sans-serif", 18))
        .label_style(("sans-serif", 14))
        .draw()?;

    // gene region plus flank
    chart.draw_series(std::iter::once(Rectangle::new(
        [(region.flanked_start(), y0), (region.flanked_end(), y1)],
        RGBColor(120, 120, 120).mix(0.15).filled(),
    )))?;

    // exact gene coordinates
    chart.draw_series(std::iter::once(Rectangle::new(
        [(region.start, y0), (region.end, y1)],
        BLACK.stroke_width(2),
    )))?;
    chart.draw_series(std::iter::once(Text::new(
        region.symbol.clone(),
        (region.start, y1 - 0.1),
        ("sans-serif italic", 16).into_font(),
    )))?;

    for (lane, sample) in layout.lanes.iter().enumerate() {
        let colour = LANE_COLOURS[lane % LANE_COLOURS.len()];
        let y = SegmentPlotLayout::lane_offset(lane);
        chart
            .draw_series(layout.bars.iter().filter(|b| b.lane == lane).map(|b| {
                Rectangle::new(
                    [(b.start, y - BAR_HALF_HEIGHT), (b.end, y + BAR_HALF_HEIGHT)],
                    colour.filled(),
                )
            }))?
            .label(sample.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 20, y + 4)], colour.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 14))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}
