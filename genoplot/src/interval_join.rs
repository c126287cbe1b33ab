use tracing::debug;

use crate::genotype::classify_genotype;
use crate::models::{GeneRecord, GenotypeCall, GenotypeRecord, JoinedVariant};
use crate::position::{parse_position, PositionParseError};

/// Parse every record's position, failing on the first malformed token.
pub fn parse_calls(records: &[GenotypeRecord]) -> Result<Vec<GenotypeCall>, PositionParseError> {
    records
        .iter()
        .map(|r| {
            Ok(GenotypeCall {
                locus: parse_position(&r.position)?,
                sample: r.sample.clone(),
                genotype: r.genotype.clone(),
            })
        })
        .collect()
}

/// Split genes into (target gene rows, every other gene) by symbol.
pub fn partition_genes(genes: &[GeneRecord], target_symbol: &str) -> (Vec<GeneRecord>, Vec<GeneRecord>) {
    genes
        .iter()
        .cloned()
        .partition(|g| g.symbol == target_symbol)
}

/// Inclusive overlap test against `[start - buffer, end + buffer]`.
pub fn within_gene(call: &GenotypeCall, gene: &GeneRecord, buffer: u64) -> bool {
    call.locus.chr == gene.chr
        && call.locus.pos >= gene.start.saturating_sub(buffer)
        && call.locus.pos <= gene.end.saturating_add(buffer)
}

/// Inner join of calls to genes on chromosome and buffered interval.
///
/// A call inside several genes yields one row per gene. Rows come back
/// sorted by position; equal positions keep call order, then gene order.
pub fn join_calls_to_genes(calls: &[GenotypeCall], genes: &[GeneRecord], buffer: u64) -> Vec<JoinedVariant> {
    let mut joined = Vec::new();
    let mut unmatched = 0usize;

    for call in calls {
        let mut hit = false;
        for gene in genes.iter().filter(|g| within_gene(call, g, buffer)) {
            hit = true;
            joined.push(JoinedVariant {
                locus: call.locus.clone(),
                sample: call.sample.clone(),
                genotype: call.genotype.clone(),
                class: classify_genotype(&call.genotype),
                gene: gene.symbol.clone(),
                label: format!("{}:{}", gene.symbol, call.locus.pos),
            });
        }
        if !hit {
            unmatched += 1;
        }
    }

    if unmatched > 0 {
        debug!(
            "{} of {} calls fell outside every gene window (buffer {} bp) and were dropped",
            unmatched,
            calls.len(),
            buffer
        );
    }

    joined.sort_by_key(|row| row.locus.pos);
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::GenotypeClass;
    use crate::position::Chromosome;

    fn gene(symbol: &str, chr: &str, start: u64, end: u64) -> GeneRecord {
        GeneRecord {
            symbol: symbol.to_string(),
            chr: Chromosome::from_name(chr).unwrap(),
            start,
            end,
        }
    }

    fn call(position: &str, sample: &str, genotype: &str) -> GenotypeCall {
        GenotypeCall {
            locus: parse_position(position).unwrap(),
            sample: sample.to_string(),
            genotype: genotype.to_string(),
        }
    }

    #[test]
    fn boundaries_are_inclusive() {
        let genes = vec![gene("G", "1", 1_000, 2_000)];
        let calls = vec![
            call("chr1:899", "S1", "0/0"),
            call("chr1:900", "S1", "0/0"),
            call("chr1:2100", "S1", "0/0"),
            call("chr1:2101", "S1", "0/0"),
        ];
        let joined = join_calls_to_genes(&calls, &genes, 100);
        let positions: Vec<u64> = joined.iter().map(|r| r.locus.pos).collect();
        assert_eq!(positions, vec![900, 2100]);
    }

    #[test]
    fn membership_matches_predicate() {
        let genes = vec![gene("A", "2", 500, 800), gene("B", "3", 500, 800)];
        let calls: Vec<GenotypeCall> = (0..40)
            .map(|i| {
                let chr = if i % 2 == 0 { "2" } else { "3" };
                call(&format!("chr{}:{}", chr, 300 + i * 30), "S", "0/1")
            })
            .collect();
        let buffer = 50;
        let joined = join_calls_to_genes(&calls, &genes, buffer);
        for c in &calls {
            let expected = genes.iter().filter(|g| {
                g.chr == c.locus.chr && c.locus.pos + buffer >= g.start && c.locus.pos <= g.end + buffer
            }).count();
            let found = joined.iter().filter(|r| r.locus == c.locus).count();
            assert_eq!(found, expected, "call at {:?}", c.locus);
        }
    }

    #[test]
    fn chromosome_must_match() {
        let genes = vec![gene("G", "19", 100, 200)];
        let joined = join_calls_to_genes(&[call("chr1:150", "S", "0/1")], &genes, 0);
        assert!(joined.is_empty());
    }

    #[test]
    fn buffer_saturates_at_zero() {
        let genes = vec![gene("G", "5", 10, 20)];
        let joined = join_calls_to_genes(&[call("chr5:0", "S", "1/1")], &genes, 10_000);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].class, GenotypeClass::HomAlt);
    }

    #[test]
    fn sorted_by_position_with_stable_ties() {
        let genes = vec![gene("G", "1", 0, 10_000)];
        let calls = vec![
            call("chr1:500", "S2", "0/0"),
            call("chr1:100", "S1", "0/1"),
            call("chr1:500", "S1", "1/1"),
        ];
        let joined = join_calls_to_genes(&calls, &genes, 0);
        let order: Vec<(u64, &str)> = joined.iter().map(|r| (r.locus.pos, r.sample.as_str())).collect();
        assert_eq!(order, vec![(100, "S1"), (500, "S2"), (500, "S1")]);
        assert_eq!(joined[0].label, "G:100");
    }

    #[test]
    fn overlapping_genes_give_one_row_each() {
        let genes = vec![gene("A", "1", 0, 1_000), gene("B", "1", 500, 2_000)];
        let joined = join_calls_to_genes(&[call("chr1:700", "S", "0/1")], &genes, 0);
        let labels: Vec<&str> = joined.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["A:700", "B:700"]);
    }

    #[test]
    fn partition_by_symbol() {
        let genes = vec![gene("FICD", "19", 1, 2), gene("NARS2", "11", 3, 4), gene("PAX4", "7", 5, 6)];
        let (target, others) = partition_genes(&genes, "FICD");
        assert_eq!(target.len(), 1);
        assert_eq!(others.iter().map(|g| g.symbol.as_str()).collect::<Vec<_>>(), vec!["NARS2", "PAX4"]);
    }

    #[test]
    fn parse_calls_surfaces_bad_token() {
        let records = vec![
            GenotypeRecord { position: "chr1:10".into(), sample: "S".into(), genotype: "0/0".into() },
            GenotypeRecord { position: "1_10".into(), sample: "S".into(), genotype: "0/0".into() },
        ];
        let err = parse_calls(&records).unwrap_err();
        assert_eq!(err, PositionParseError::MissingPrefix("1_10".into()));
    }
}
