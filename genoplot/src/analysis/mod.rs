use std::path::Path;

pub mod heatmap;
pub mod match_summary;
pub mod ndm_regions;
pub mod region_counts;
pub mod segment_plot;

/// Charts go to SVG when the file name asks for it, PNG otherwise.
pub fn is_svg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}
