//! Shared regions restricted to neonatal diabetes patients, tagged by whether
//! the sharing patients are solved, unsolved or both.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::data_handling::ndm_cohort::{NdmCohort, NdmStatus};
use crate::data_handling::shared_regions::SharedRegion;

/// Variants are in label order so the summary sorts like the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RegionStatus {
    Mixed,
    #[serde(rename = "Solved NDM")]
    Solved,
    #[serde(rename = "Unsolved NDM")]
    Unsolved,
}

impl RegionStatus {
    pub fn label(self) -> &'static str {
        match self {
            RegionStatus::Mixed => "Mixed",
            RegionStatus::Solved => NdmStatus::Solved.label(),
            RegionStatus::Unsolved => NdmStatus::Unsolved.label(),
        }
    }
}

impl From<NdmStatus> for RegionStatus {
    fn from(status: NdmStatus) -> Self {
        match status {
            NdmStatus::Solved => RegionStatus::Solved,
            NdmStatus::Unsolved => RegionStatus::Unsolved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NdmRegion {
    #[serde(rename = "Chromosome")]
    pub chromosome: String,
    #[serde(rename = "Start")]
    pub start: String,
    #[serde(rename = "End")]
    pub end: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "N_Patients")]
    pub n_patients: usize,
    #[serde(rename = "Solved_NDM")]
    pub solved: usize,
    #[serde(rename = "Unsolved_NDM")]
    pub unsolved: usize,
    #[serde(rename = "Patients")]
    pub patients: String,
    #[serde(rename = "Patient_Diseases")]
    pub patient_diseases: String,
    #[serde(rename = "Status")]
    pub status: RegionStatus,
}

/// Keep regions shared by at least one NDM patient; other individuals are dropped from the lists.
pub fn ndm_regions(regions: &[SharedRegion], cohort: &NdmCohort) -> Vec<NdmRegion> {
    regions
        .iter()
        .filter_map(|region| {
            let patients: Vec<(&str, NdmStatus)> = region
                .individuals
                .iter()
                .filter_map(|id| cohort.status_of(id).map(|status| (id.as_str(), status)))
                .collect();
            let first = patients.first()?.1;

            let solved = patients.iter().filter(|(_, s)| *s == NdmStatus::Solved).count();
            let unsolved = patients.len() - solved;
            let status = if solved > 0 && unsolved > 0 {
                RegionStatus::Mixed
            } else {
                RegionStatus::from(first)
            };

            Some(NdmRegion {
                chromosome: region.chrom.clone(),
                start: region.start.clone(),
                end: region.end.clone(),
                region: format!("{}:{}-{}", region.chrom, region.start, region.end),
                n_patients: patients.len(),
                solved,
                unsolved,
                patients: patients.iter().map(|(id, _)| *id).collect::<Vec<_>>().join(", "),
                patient_diseases: patients
                    .iter()
                    .map(|(id, status)| format!("{}({})", id, status.label()))
                    .collect::<Vec<_>>()
                    .join(", "),
                status,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NdmSummaryRow {
    #[serde(rename = "Status")]
    pub status: RegionStatus,
    #[serde(rename = "N_Regions")]
    pub n_regions: usize,
    #[serde(rename = "Total_Patients")]
    pub total_patients: usize,
}

/// Region and patient counts per status.
pub fn summarise_ndm_regions(rows: &[NdmRegion]) -> Vec<NdmSummaryRow> {
    let mut groups: BTreeMap<RegionStatus, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(row.status).or_default();
        entry.0 += 1;
        entry.1 += row.n_patients;
    }
    groups
        .into_iter()
        .map(|(status, (n_regions, total_patients))| NdmSummaryRow {
            status,
            n_regions,
            total_patients,
        })
        .collect()
}

/// The mixed region with the most patients, first one on ties.
pub fn most_shared_mixed(rows: &[NdmRegion]) -> Option<&NdmRegion> {
    rows.iter()
        .filter(|r| r.status == RegionStatus::Mixed)
        .fold(None, |best: Option<&NdmRegion>, row| match best {
            Some(b) if b.n_patients >= row.n_patients => Some(b),
            _ => Some(row),
        })
}

pub fn write_tsv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("{} rows saved to {}", rows.len(), path.display());
    Ok(())
}
