use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::TreeError;
use crate::models::symbols::{Aa, AaPos, Nuc, NucPos};

/// Supplies the ancestral nucleotide at a genome position.
///
/// Consumed only by
/// [`TreeNode::nucleotide_mutations`](crate::models::node::TreeNode::nucleotide_mutations);
/// the tree itself never stores reference symbols per node.
pub trait RefSeq {
    /// The reference symbol at `pos`, or `None` when the position is
    /// outside the reference.
    fn nuc_at(&self, pos: NucPos) -> Option<Nuc>;
}

/// Supplies the ancestral amino acid at a codon position within a named
/// gene. Consumed only by
/// [`TreeNode::aminoacid_mutations`](crate::models::node::TreeNode::aminoacid_mutations).
pub trait RefPeptides {
    fn aa_at(&self, gene: &str, pos: AaPos) -> Option<Aa>;
}

/// In-memory reference sequence, parsed from a plain symbol string.
#[derive(Debug, Clone)]
pub struct SimpleRefSeq {
    seq: Vec<Nuc>,
}

impl SimpleRefSeq {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

impl FromStr for SimpleRefSeq {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let seq = s
            .chars()
            .map(Nuc::try_from)
            .collect::<Result<Vec<Nuc>, TreeError>>()?;
        Ok(SimpleRefSeq { seq })
    }
}

impl RefSeq for SimpleRefSeq {
    fn nuc_at(&self, pos: NucPos) -> Option<Nuc> {
        self.seq.get(pos).copied()
    }
}

/// In-memory per-gene reference peptides.
#[derive(Debug, Clone, Default)]
pub struct SimpleRefPeptides {
    peptides: BTreeMap<String, Vec<Aa>>,
}

impl SimpleRefPeptides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and registers one gene's peptide sequence.
    pub fn add_gene(&mut self, gene: &str, seq: &str) -> Result<(), TreeError> {
        let peptide = seq
            .chars()
            .map(Aa::try_from)
            .collect::<Result<Vec<Aa>, TreeError>>()?;
        self.peptides.insert(gene.to_string(), peptide);
        Ok(())
    }

    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.peptides.keys().map(String::as_str)
    }
}

impl RefPeptides for SimpleRefPeptides {
    fn aa_at(&self, gene: &str, pos: AaPos) -> Option<Aa> {
        self.peptides.get(gene)?.get(pos).copied()
    }
}
