use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display};

use crate::models::symbols::{Aa, AaPos, Nuc, NucPos};

/// One elaborated nucleotide substitution: the ancestral symbol from the
/// reference, the genome position, and the resulting symbol.
///
/// Positions are stored 0-based; [Display] renders the conventional
/// 1-based form, e.g. `A123T` for a change at position 122.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NucSub {
    pub ref_nuc: Nuc,
    pub pos: NucPos,
    pub qry_nuc: Nuc,
}

impl Ord for NucSub {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.pos, self.ref_nuc, self.qry_nuc).cmp(&(other.pos, other.ref_nuc, other.qry_nuc))
    }
}

impl PartialOrd for NucSub {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for NucSub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.ref_nuc, self.pos + 1, self.qry_nuc)
    }
}

/// One elaborated amino-acid substitution within a gene.
///
/// The gene itself is not part of the record; callers keep these grouped
/// under their gene key, each gene with its own codon coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AaSub {
    pub ref_aa: Aa,
    pub pos: AaPos,
    pub qry_aa: Aa,
}

impl Ord for AaSub {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.pos, self.ref_aa, self.qry_aa).cmp(&(other.pos, other.ref_aa, other.qry_aa))
    }
}

impl PartialOrd for AaSub {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for AaSub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.ref_aa, self.pos + 1, self.qry_aa)
    }
}
