use std::io::BufRead;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use noodles::vcf;
use noodles::vcf::variant::record::samples::keys::key;
use noodles::vcf::variant::record_buf::info::field::value::Array as InfoArray;
use noodles::vcf::variant::record_buf::info::field::Value as InfoValue;
use noodles::vcf::variant::record_buf::samples::sample::Value as SampleValue;
use noodles::vcf::variant::RecordBuf;
use tracing::{error, info};

use crate::detection::{SampleCall, VariantSite};

pub const CSQ_KEY: &str = "CSQ";

/// Column of `field` in a VEP `CSQ` description ending in `Format: A|B|C`.
pub fn csq_field_index(description: &str, field: &str) -> Option<usize> {
    let (_, format) = description.split_once("Format: ")?;
    format
        .trim()
        .trim_matches('"')
        .split('|')
        .position(|name| name.trim() == field)
}

/// True when any annotation leaves the frequency blank (`""` or `.`) or puts it at or below `threshold`.
pub fn is_ultra_rare<S: AsRef<str>>(entries: &[S], field_index: usize, threshold: f64) -> bool {
    for entry in entries {
        let Some(value) = entry.as_ref().split('|').nth(field_index) else {
            continue;
        };
        if value.is_empty() || value == "." {
            return true;
        }
        if let Ok(af) = value.parse::<f64>() {
            if af <= threshold {
                return true;
            }
        }
    }
    false
}

fn csq_entries(record: &RecordBuf) -> Vec<String> {
    match record.info().get(CSQ_KEY) {
        Some(Some(InfoValue::String(value))) => value.split(',').map(str::to_string).collect(),
        Some(Some(InfoValue::Array(InfoArray::String(values)))) => values.iter().flatten().cloned().collect(),
        _ => Vec::new(),
    }
}

fn genotype_call(value: Option<Option<&SampleValue>>) -> SampleCall {
    match value {
        Some(Some(SampleValue::Genotype(genotype))) => {
            SampleCall::from_alleles(genotype.as_ref().iter().map(|allele| allele.position()))
        }
        _ => SampleCall::default(),
    }
}

/// A multi-sample VCF (plain or bgzipped) read site by site.
pub struct VariantSiteReader {
    reader: vcf::io::Reader<Box<dyn BufRead>>,
    header: vcf::Header,
    sample_ids: Vec<String>,
    csq_index: usize,
    af_threshold: f64,
}

impl VariantSiteReader {
    /// Open `path` and locate `csq_field` in the `CSQ` header description.
    pub fn open(path: &Path, csq_field: &str, af_threshold: f64) -> Result<Self> {
        let mut reader = vcf::io::reader::Builder::default()
            .build_from_path(path)
            .map_err(|e| {
                error!("Failed to open VCF {}: {}", path.display(), e);
                e
            })
            .with_context(|| format!("Error while opening {path:?}:"))?;
        let header = reader
            .read_header()
            .with_context(|| format!("Error while reading header of {path:?}:"))?;

        let description = header
            .infos()
            .get(CSQ_KEY)
            .map(|info| info.description().to_string())
            .ok_or_else(|| anyhow!("{path:?} has no {CSQ_KEY} INFO header"))?;
        let csq_index = csq_field_index(&description, csq_field)
            .ok_or_else(|| anyhow!("Required {CSQ_KEY} field '{csq_field}' not found in {path:?}"))?;

        let sample_ids: Vec<String> = header.sample_names().iter().cloned().collect();
        info!("Scanning {} with {} samples", path.display(), sample_ids.len());

        Ok(VariantSiteReader {
            reader,
            header,
            sample_ids,
            csq_index,
            af_threshold,
        })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn sites(&mut self) -> impl Iterator<Item = Result<VariantSite>> + '_ {
        let VariantSiteReader {
            reader,
            header,
            sample_ids,
            csq_index,
            af_threshold,
        } = self;
        let n_samples = sample_ids.len();
        let csq_index = *csq_index;
        let af_threshold = *af_threshold;
        let header = &*header;

        reader.records().map(move |result| {
            let record = result.context("Error while reading VCF record:")?;
            let record = RecordBuf::try_from_variant_record(header, &record)
                .context("Error while decoding VCF record:")?;
            site_from_record(&record, n_samples, csq_index, af_threshold)
        })
    }
}

fn site_from_record(record: &RecordBuf, n_samples: usize, csq_index: usize, af_threshold: f64) -> Result<VariantSite> {
    let pos = record
        .variant_start()
        .ok_or_else(|| anyhow!("Missing POS at {}", record.reference_sequence_name()))?;

    let samples = record.samples();
    let calls = (0..n_samples)
        .map(|idx| match samples.get_index(idx) {
            Some(sample) => genotype_call(sample.get(key::GENOTYPE)),
            None => SampleCall::default(),
        })
        .collect();

    Ok(VariantSite {
        chrom: record.reference_sequence_name().to_string(),
        pos: pos.get() as u64,
        calls,
        ultra_rare: is_ultra_rare(&csq_entries(record), csq_index, af_threshold),
    })
}
