use std::path::PathBuf;

use polars::df;
use polars::prelude::*;
use tracing::{debug, error, info};

use crate::helper_functions::{parse_coordinate, read_headerless_tsv, string_column_at};
use crate::models::{Dataset, Segment};

/// Raw chr/start/end segment calls for one sample, no header.
pub struct SegmentTable {
    pub sample: String,
    pub path: PathBuf,
}

impl Dataset for SegmentTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading {} segments from {}", self.sample, self.path.display());
        match read_headerless_tsv(&self.path) {
            Ok(df) => Ok(df),
            Err(e) => {
                error!("Failed to read segment table for {}: {}", self.sample, e);
                Err(e)
            }
        }
    }
}

fn segment_frame(chrs: Vec<String>, starts: Vec<i64>, ends: Vec<i64>, samples: Vec<String>) -> PolarsResult<DataFrame> {
    df![
        "chr" => chrs,
        "start" => starts,
        "end" => ends,
        "sample" => samples
    ]
}

pub fn empty_segment_frame() -> PolarsResult<DataFrame> {
    segment_frame(Vec::new(), Vec::new(), Vec::new(), Vec::new())
}

/// Drop rows with a missing or blank cell, rename the first three columns to
/// chr/start/end and tag every row with `sample`.
pub fn clean_segment_table(raw: &DataFrame, sample: &str) -> PolarsResult<DataFrame> {
    if raw.width() < 3 {
        return Err(PolarsError::ShapeMismatch(
            format!("segment table for {sample} has {} columns, expected 3", raw.width()).into(),
        ));
    }
    let chr_col = string_column_at(raw, 0)?;
    let start_col = string_column_at(raw, 1)?;
    let end_col = string_column_at(raw, 2)?;

    let mut chrs = Vec::with_capacity(raw.height());
    let mut starts = Vec::with_capacity(raw.height());
    let mut ends = Vec::with_capacity(raw.height());

    for i in 0..raw.height() {
        let chr = chr_col.get(i).map(str::trim).filter(|c| !c.is_empty());
        let start = start_col.get(i).and_then(parse_coordinate);
        let end = end_col.get(i).and_then(parse_coordinate);
        if let (Some(chr), Some(start), Some(end)) = (chr, start, end) {
            chrs.push(chr.to_string());
            starts.push(start);
            ends.push(end);
        }
    }

    debug!(
        "{}: kept {} of {} segment rows after dropping incomplete ones",
        sample,
        chrs.len(),
        raw.height()
    );
    let samples = vec![sample.to_string(); chrs.len()];
    segment_frame(chrs, starts, ends, samples)
}

/// Stack cleaned tables in the order given.
pub fn combine_segment_tables(tables: &[DataFrame]) -> PolarsResult<DataFrame> {
    let mut combined = empty_segment_frame()?;
    for table in tables {
        combined.vstack_mut(table)?;
    }
    Ok(combined)
}

/// Keep segments spanning at least `min_length` bp.
pub fn filter_min_length(df: DataFrame, min_length: i64) -> PolarsResult<DataFrame> {
    df.lazy()
        .filter((col("end") - col("start")).gt_eq(lit(min_length)))
        .collect()
}

pub fn segments_from_frame(df: &DataFrame) -> PolarsResult<Vec<Segment>> {
    let chrs = df.column("chr")?.str()?;
    let starts = df.column("start")?.i64()?;
    let ends = df.column("end")?.i64()?;
    let samples = df.column("sample")?.str()?;

    let mut segments = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if let (Some(chr), Some(start), Some(end), Some(sample)) =
            (chrs.get(i), starts.get(i), ends.get(i), samples.get(i))
        {
            segments.push(Segment {
                chr: chr.to_string(),
                start,
                end,
                sample: sample.to_string(),
            });
        }
    }
    Ok(segments)
}
