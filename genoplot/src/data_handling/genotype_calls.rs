use std::path::PathBuf;

use polars::prelude::*;
use tracing::{error, info, warn};

use crate::helper_functions::{read_csv, string_column};
use crate::models::{Dataset, GenotypeRecord};

pub const GENOTYPE_COLUMNS: [&str; 3] = ["Position", "Sample", "Genotype"];

/// Long-format genotype calls; columns may come in any order.
pub struct GenotypeTable {
    pub path: PathBuf,
}

impl Dataset for GenotypeTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading genotype calls from {}", self.path.display());
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read genotype CSV: {}", e);
                return Err(e);
            }
        };

        // Reorder to Position, Sample, Genotype and drop anything else
        let df = df.select(GENOTYPE_COLUMNS)?;
        info!("Loaded {} genotype calls", df.height());
        Ok(df)
    }
}

/// Turn the frame into records. Null genotypes are kept as empty calls (and
/// later classed Missing); rows without a sample id are skipped.
pub fn genotype_records(df: &DataFrame) -> PolarsResult<Vec<GenotypeRecord>> {
    let positions = string_column(df, "Position")?;
    let samples = string_column(df, "Sample")?;
    let genotypes = string_column(df, "Genotype")?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for i in 0..df.height() {
        let Some(sample) = samples.get(i).map(str::trim).filter(|s| !s.is_empty()) else {
            skipped += 1;
            continue;
        };
        records.push(GenotypeRecord {
            position: positions.get(i).unwrap_or("").to_string(),
            sample: sample.to_string(),
            genotype: genotypes.get(i).unwrap_or("").trim().to_string(),
        });
    }

    if skipped > 0 {
        warn!("Skipped {} genotype rows without a sample id", skipped);
    }
    Ok(records)
}
