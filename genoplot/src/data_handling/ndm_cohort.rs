use std::collections::HashMap;
use std::path::Path;

use tracing::info;

/// Diagnostic state of a neonatal diabetes (NDM) patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NdmStatus {
    Solved,
    Unsolved,
}

impl NdmStatus {
    pub fn label(self) -> &'static str {
        match self {
            NdmStatus::Solved => "Solved NDM",
            NdmStatus::Unsolved => "Unsolved NDM",
        }
    }

    /// `Solved_NDM...` is solved, any other category mentioning NDM is unsolved.
    pub fn from_category(category: &str) -> Option<Self> {
        if !category.contains("NDM") {
            None
        } else if category.starts_with("Solved_NDM") {
            Some(NdmStatus::Solved)
        } else {
            Some(NdmStatus::Unsolved)
        }
    }
}

/// Patient id -> NDM status, for NDM patients only.
#[derive(Debug, Clone, Default)]
pub struct NdmCohort {
    statuses: HashMap<String, NdmStatus>,
}

impl NdmCohort {
    pub fn from_categories<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let statuses = rows
            .into_iter()
            .filter_map(|(patient, category)| {
                NdmStatus::from_category(category).map(|status| (patient.to_string(), status))
            })
            .collect();
        NdmCohort { statuses }
    }

    pub fn status_of(&self, patient: &str) -> Option<NdmStatus> {
        self.statuses.get(patient).copied()
    }

    pub fn count(&self, status: NdmStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }
}

/// Headerless `patient<TAB>category` file; rows with fewer than two fields are ignored.
pub fn read_ndm_cohort(path: &Path) -> Result<NdmCohort, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if let (Some(patient), Some(category)) = (record.get(0), record.get(1)) {
            rows.push((patient.trim().to_string(), category.trim().to_string()));
        }
    }

    let cohort = NdmCohort::from_categories(rows.iter().map(|(p, c)| (p.as_str(), c.as_str())));
    info!(
        "Found {} NDM patients ({} Solved, {} Unsolved) in {}",
        cohort.len(),
        cohort.count(NdmStatus::Solved),
        cohort.count(NdmStatus::Unsolved),
        path.display()
    );
    Ok(cohort)
}
