use std::collections::BTreeMap;

use crate::models::symbols::{Aa, AaPos, Nuc, NucPos};

/// Reconciles a parent's cumulative mutation set with a node's branch-local
/// diff: every position mentioned on the branch overrides the inherited
/// value, every other position keeps whatever it held coming into the
/// branch.
///
/// The root case falls out of the same rule with an empty parent map. This
/// is a pure function of its two arguments; computing cumulative sets
/// tree-wide is a single top-down pass (see
/// [`Tree::accumulate_mutations`](crate::models::tree::Tree::accumulate_mutations)).
pub fn accumulate(
    parent: &BTreeMap<NucPos, Nuc>,
    branch: &BTreeMap<NucPos, Nuc>,
) -> BTreeMap<NucPos, Nuc> {
    let mut cumulative = parent.clone();
    for (&pos, &nuc) in branch {
        cumulative.insert(pos, nuc);
    }
    cumulative
}

/// Gene-partitioned mirror of [accumulate]: the union of both gene key
/// sets, with each gene's positions reconciled by the same later-wins rule.
pub fn accumulate_aa(
    parent: &BTreeMap<String, BTreeMap<AaPos, Aa>>,
    branch: &BTreeMap<String, BTreeMap<AaPos, Aa>>,
) -> BTreeMap<String, BTreeMap<AaPos, Aa>> {
    let mut cumulative = parent.clone();
    for (gene, changes) in branch {
        let gene_cumulative = cumulative.entry(gene.clone()).or_default();
        for (&pos, &aa) in changes {
            gene_cumulative.insert(pos, aa);
        }
    }
    cumulative
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nuc_map(entries: &[(NucPos, Nuc)]) -> BTreeMap<NucPos, Nuc> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_branch_overrides_parent() {
        let parent = nuc_map(&[(10, Nuc::A), (20, Nuc::C)]);
        let branch = nuc_map(&[(20, Nuc::T), (30, Nuc::G)]);

        let cumulative = accumulate(&parent, &branch);

        assert_eq!(
            cumulative,
            nuc_map(&[(10, Nuc::A), (20, Nuc::T), (30, Nuc::G)])
        );
    }

    #[test]
    fn test_empty_parent_yields_branch() {
        let branch = nuc_map(&[(5, Nuc::N)]);
        assert_eq!(accumulate(&BTreeMap::new(), &branch), branch);
    }

    #[test]
    fn test_empty_branch_keeps_parent() {
        let parent = nuc_map(&[(7, Nuc::G)]);
        assert_eq!(accumulate(&parent, &BTreeMap::new()), parent);
    }

    #[test]
    fn test_aa_accumulation_is_per_gene() {
        let mut parent = BTreeMap::new();
        parent.insert("S".to_string(), [(500, Aa::N)].into_iter().collect());
        parent.insert("N".to_string(), [(2, Aa::K)].into_iter().collect());

        let mut branch = BTreeMap::new();
        branch.insert("S".to_string(), [(500, Aa::Y), (17, Aa::F)].into_iter().collect());

        let cumulative = accumulate_aa(&parent, &branch);

        // Gene S: position 500 overridden, 17 added
        assert_eq!(
            cumulative["S"],
            [(17, Aa::F), (500, Aa::Y)].into_iter().collect()
        );
        // Gene N untouched; position 2 in N is unrelated to any position in S
        assert_eq!(cumulative["N"], [(2, Aa::K)].into_iter().collect());
    }
}
