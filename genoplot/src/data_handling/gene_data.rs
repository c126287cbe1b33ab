use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, error, info};

use crate::helper_functions::{read_csv, string_column};
use crate::models::{Dataset, GeneRecord};
use crate::position::Chromosome;

pub const GENE_COLUMNS: [&str; 4] = ["hgnc_symbol", "chromosome_name", "start_position", "end_position"];

/// Gene coordinates as exported from BioMart.
pub struct GeneTable {
    pub path: PathBuf,
}

impl Dataset for GeneTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading gene coordinates from {}", self.path.display());
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read gene CSV: {}", e);
                return Err(e);
            }
        };
        df.select(GENE_COLUMNS)
    }
}

/// Gene rows with a usable symbol, chromosome and coordinates; the rest are skipped.
pub fn gene_records(df: &DataFrame) -> PolarsResult<Vec<GeneRecord>> {
    let symbols = string_column(df, "hgnc_symbol")?;
    let chromosomes = string_column(df, "chromosome_name")?;
    let starts = df.column("start_position")?.cast(&DataType::Int64)?;
    let starts = starts.i64()?;
    let ends = df.column("end_position")?.cast(&DataType::Int64)?;
    let ends = ends.i64()?;

    let mut genes = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = (
            symbols.get(i).map(str::trim).filter(|s| !s.is_empty()),
            chromosomes.get(i).and_then(Chromosome::from_name),
            starts.get(i).and_then(|v| u64::try_from(v).ok()),
            ends.get(i).and_then(|v| u64::try_from(v).ok()),
        );
        match row {
            (Some(symbol), Some(chr), Some(start), Some(end)) if start <= end => genes.push(GeneRecord {
                symbol: symbol.to_string(),
                chr,
                start,
                end,
            }),
            _ => debug!("Skipping gene row {} with incomplete coordinates", i),
        }
    }

    info!("Using {} of {} gene rows", genes.len(), df.height());
    Ok(genes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use std::io::Write;

    #[test]
    fn loads_numeric_and_prefixed_chromosomes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ensembl_gene_id,hgnc_symbol,chromosome_name,start_position,end_position").unwrap();
        writeln!(file, "ENSG1,FICD,19,100,200").unwrap();
        writeln!(file, "ENSG2,NARS2,11,78436360,78574919").unwrap();
        file.flush().unwrap();

        let df = GeneTable { path: file.path().to_path_buf() }.load().unwrap();
        let genes = gene_records(&df).unwrap();
        assert_eq!(genes.len(), 2);
        assert_eq!(genes[0].symbol, "FICD");
        assert_eq!(genes[0].chr.as_str(), "19");
        assert_eq!((genes[0].start, genes[0].end), (100, 200));
    }

    #[test]
    fn unusable_rows_are_skipped() {
        let df = df![
            "hgnc_symbol" => &[Some("A"), Some("B"), None, Some("D"), Some("E")],
            "chromosome_name" => &["chr1", "CHR_HSCHR6", "2", "3", "X"],
            "start_position" => &[Some(10i64), Some(10), Some(10), None, Some(50)],
            "end_position" => &[Some(20i64), Some(20), Some(20), Some(20), Some(40)]
        ]
        .unwrap();
        let genes = gene_records(&df).unwrap();
        assert_eq!(genes.len(), 1);
        assert_eq!(genes[0].symbol, "A");
        assert_eq!(genes[0].chr.as_str(), "1");
    }
}
