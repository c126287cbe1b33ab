use std::error::Error;

use polars::prelude::{DataFrame, PolarsError, PolarsResult};
use serde::{Deserialize, Serialize};

use crate::genotype::GenotypeClass;
use crate::position::{Chromosome, Locus};

/// Anything that can be read into a frame from disk.
pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// Wrap a foreign error (plotting, io, parsing) as a polars compute error.
pub fn polars_err(e: Box<dyn Error>) -> PolarsError {
    PolarsError::ComputeError(e.to_string().into())
}

/// One raw row of the genotype table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeRecord {
    pub position: String,
    pub sample: String,
    pub genotype: String,
}

/// A genotype record whose position has been parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeCall {
    pub locus: Locus,
    pub sample: String,
    pub genotype: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub symbol: String,
    pub chr: Chromosome,
    pub start: u64,
    pub end: u64,
}

/// A genotype call matched to the gene it falls in (or near).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedVariant {
    pub locus: Locus,
    pub sample: String,
    pub genotype: String,
    pub class: GenotypeClass,
    pub gene: String,
    /// `gene:position`, used as the heatmap x label.
    pub label: String,
}

/// A haplotype segment reported for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub chr: String,
    pub start: i64,
    pub end: i64,
    pub sample: String,
}

impl Segment {
    pub fn length(&self) -> i64 {
        self.end - self.start
    }
}

/// Fixed gene box drawn behind the segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneRegion {
    pub symbol: String,
    pub chr: String,
    pub start: i64,
    pub end: i64,
    pub flank: i64,
}

impl GeneRegion {
    pub fn flanked_start(&self) -> i64 {
        self.start - self.flank
    }

    pub fn flanked_end(&self) -> i64 {
        self.end + self.flank
    }
}
