pub mod gene_data;
pub mod genotype_calls;
pub mod ndm_cohort;
pub mod segment_tables;
pub mod shared_regions;
pub mod variant_sites;
