use std::collections::HashMap;

/// A solved or candidate patient with the gene group its region is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortMember {
    pub sample: &'static str,
    pub group: &'static str,
}

const fn member(sample: &'static str, group: &'static str) -> CohortMember {
    CohortMember { sample, group }
}

/// Neonatal diabetes discovery cohort, in the order used for heatmap rows.
pub const COHORT: [CohortMember; 30] = [
    member("WG0091", "Chr19_haplotype"),
    member("WG0094", "Chr19_haplotype"),
    member("WG0347", "Chr19_haplotype"),
    member("WG0600", "Chr19_haplotype"),
    member("WG1537", "Chr19_haplotype"),
    member("WG0225", "ZNF808"),
    member("WG0872", "HK1"),
    member("WG0631", "FICD"),
    member("WG0153", "FICD"),
    member("WG0154", "FICD"),
    member("WG0161", "FICD"),
    member("WG1726", "FICD"),
    member("WG0867", "FICD"),
    member("WG1322", "RNU4ATAC"),
    member("WG0596", "RNU6ATAC"),
    member("WG0512", "NARS2"),
    member("WG1068", "PAX4"),
    member("WG0364", "NARS2"),
    member("WG0361", "TARS2"),
    member("WG0513", "ZNF808"),
    member("WG0367", "PDIA6"),
    member("WG1094", "NARS2"),
    member("WG0878", "PAX4"),
    member("WG0158", "TARS2"),
    member("WG1078", "EIF2B1"),
    member("WG0363", "TARS2"),
    member("WG0117", "YIPF5"),
    member("WG1758", "FICD"),
    member("WG0718", "NARS2"),
    member("WG0366", "ZNF808"),
];

pub const UNKNOWN_GROUP: &str = "UNKNOWN";

pub fn default_sample_order() -> Vec<String> {
    COHORT.iter().map(|m| m.sample.to_string()).collect()
}

/// Sample id -> gene group lookup.
#[derive(Debug, Clone)]
pub struct CohortGroups {
    groups: HashMap<String, String>,
}

impl CohortGroups {
    pub fn from_members(members: &[CohortMember]) -> Self {
        let groups = members
            .iter()
            .map(|m| (m.sample.to_string(), m.group.to_string()))
            .collect();
        CohortGroups { groups }
    }

    pub fn group_of(&self, sample: &str) -> &str {
        self.groups.get(sample).map(String::as_str).unwrap_or(UNKNOWN_GROUP)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

impl Default for CohortGroups {
    fn default() -> Self {
        Self::from_members(&COHORT)
    }
}
