use std::fmt;

/// Zygosity class shown as the heatmap fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenotypeClass {
    HomRef,
    Het,
    HomAlt,
    Missing,
}

impl GenotypeClass {
    /// Legend order.
    pub const ALL: [GenotypeClass; 4] = [
        GenotypeClass::HomRef,
        GenotypeClass::Het,
        GenotypeClass::HomAlt,
        GenotypeClass::Missing,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GenotypeClass::HomRef => "Hom_REF",
            GenotypeClass::Het => "Het",
            GenotypeClass::HomAlt => "Hom_ALT",
            GenotypeClass::Missing => "Missing",
        }
    }
}

impl fmt::Display for GenotypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Recode a raw unphased call. Anything outside the four biallelic calls is Missing.
pub fn classify_genotype(raw: &str) -> GenotypeClass {
    match raw {
        "0/0" => GenotypeClass::HomRef,
        "0/1" | "1/0" => GenotypeClass::Het,
        "1/1" => GenotypeClass::HomAlt,
        _ => GenotypeClass::Missing,
    }
}
