use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::models::polars_err;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
}

/// Read a tab-separated table without header; every column comes back as text.
pub fn read_headerless_tsv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_separator(b'\t'))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)
}

pub fn ensure_dir(dir: &Path) -> PolarsResult<()> {
    fs::create_dir_all(dir).map_err(|e| polars_err(Box::new(e)))
}

/// The column at `idx`, cast to text.
pub fn string_column_at(df: &DataFrame, idx: usize) -> PolarsResult<StringChunked> {
    let column = df
        .get_columns()
        .get(idx)
        .ok_or_else(|| PolarsError::ColumnNotFound(format!("no column at index {idx}").into()))?;
    Ok(column.cast(&DataType::String)?.str()?.clone())
}

/// The named column, cast to text.
pub fn string_column(df: &DataFrame, name: &str) -> PolarsResult<StringChunked> {
    Ok(df.column(name)?.cast(&DataType::String)?.str()?.clone())
}

/// Integer coordinate from a text cell; accepts `100` and `100.0`, rejects blanks.
pub fn parse_coordinate(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if let Ok(v) = cell.parse::<i64>() {
        return Some(v);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}
