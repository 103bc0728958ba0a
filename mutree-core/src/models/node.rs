use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::{Result, TreeError};
use crate::models::substitution::{AaSub, NucSub};
use crate::models::symbols::{Aa, AaPos, Nuc, NucPos};
use crate::models::tree::NodeId;
use crate::reference::{RefPeptides, RefSeq};

/// Node-type tag for nodes that belong to the original reference tree.
pub const NODE_TYPE_REFERENCE: &str = "Reference";

/// Node-type tag for nodes introduced by placement of query sequences.
pub const NODE_TYPE_NEW: &str = "New";

/// One extension attribute: a free-form string value plus a marker for
/// transient working state that must not survive into final output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeAttr {
    pub value: String,
    pub temporary: bool,
}

/// One node of a mutation-annotated reference tree.
///
/// The payload lives in the owning [`Tree`](crate::models::tree::Tree)
/// arena; structural operations (adding children, grafting copies,
/// iteration) go through the tree, everything attribute- and
/// mutation-shaped is read and written here.
///
/// The two nucleotide views are deliberately independent fields:
/// `substitutions` holds only the changes introduced on the branch leading
/// to this node, `mutations` holds the cumulative root-to-node set. Either
/// can be injected directly by a placement step that already knows the
/// result; neither is ever re-derived behind the caller's back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeNode {
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,

    id: Option<u64>,
    name: String,
    node_type: Option<String>,
    clade: Option<String>,
    divergence: Option<f64>,

    substitutions: BTreeMap<NucPos, Nuc>,
    mutations: BTreeMap<NucPos, Nuc>,
    aa_substitutions: BTreeMap<String, BTreeMap<AaPos, Aa>>,
    aa_mutations: BTreeMap<String, BTreeMap<AaPos, Aa>>,

    branch_attr_mutations: BTreeMap<String, Vec<String>>,
    attrs: BTreeMap<String, NodeAttr>,
}

impl TreeNode {
    /// True iff this node has no children. Derived from structure, never
    /// stored.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct children, in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// The owner-assigned id. Uniqueness across a tree is the owner's
    /// responsibility, not enforced here.
    pub fn id(&self) -> Result<u64> {
        self.id
            .ok_or_else(|| TreeError::IdInvalid("never assigned".to_string()))
    }

    pub fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    pub(crate) fn raw_id(&self) -> Option<u64> {
        self.id
    }

    // ------------------------------------------------------------------
    // Nucleotide mutation views
    // ------------------------------------------------------------------

    /// The branch-local diff: only the changes introduced on the branch
    /// terminating at this node.
    pub fn substitutions(&self) -> &BTreeMap<NucPos, Nuc> {
        &self.substitutions
    }

    pub fn set_substitutions(&mut self, substitutions: BTreeMap<NucPos, Nuc>) {
        self.substitutions = substitutions;
    }

    /// The cumulative root-to-node set.
    pub fn mutations(&self) -> &BTreeMap<NucPos, Nuc> {
        &self.mutations
    }

    pub fn set_mutations(&mut self, mutations: BTreeMap<NucPos, Nuc>) {
        self.mutations = mutations;
    }

    /// Clears the cumulative set to empty. Placement seeds the root this
    /// way before driving accumulation top-down.
    pub fn set_nuc_mutations_empty(&mut self) {
        self.mutations.clear();
    }

    /// Elaborates the cumulative map into structured records, ascending by
    /// position, with the ancestral symbol looked up in `ref_seq`.
    ///
    /// A position the reference cannot answer for is a fatal
    /// [`TreeError::MutationPositionInvalid`].
    pub fn nucleotide_mutations(&self, ref_seq: &dyn RefSeq) -> Result<Vec<NucSub>> {
        self.mutations
            .iter()
            .map(|(&pos, &qry_nuc)| {
                let ref_nuc = ref_seq
                    .nuc_at(pos)
                    .ok_or_else(|| TreeError::MutationPositionInvalid(pos.to_string()))?;
                Ok(NucSub {
                    ref_nuc,
                    pos,
                    qry_nuc,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Amino-acid mutation views (per gene)
    // ------------------------------------------------------------------

    pub fn aa_substitutions(&self) -> &BTreeMap<String, BTreeMap<AaPos, Aa>> {
        &self.aa_substitutions
    }

    pub fn set_aa_substitutions(
        &mut self,
        aa_substitutions: BTreeMap<String, BTreeMap<AaPos, Aa>>,
    ) {
        self.aa_substitutions = aa_substitutions;
    }

    pub fn aa_mutations(&self) -> &BTreeMap<String, BTreeMap<AaPos, Aa>> {
        &self.aa_mutations
    }

    pub fn set_aa_mutations(&mut self, aa_mutations: BTreeMap<String, BTreeMap<AaPos, Aa>>) {
        self.aa_mutations = aa_mutations;
    }

    /// Per-gene elaboration of the cumulative amino-acid sets. Gene keys
    /// come out in sorted order, positions ascending within each gene.
    pub fn aminoacid_mutations(
        &self,
        ref_peptides: &dyn RefPeptides,
    ) -> Result<BTreeMap<String, Vec<AaSub>>> {
        self.aa_mutations
            .iter()
            .map(|(gene, changes)| {
                let subs = changes
                    .iter()
                    .map(|(&pos, &qry_aa)| {
                        let ref_aa = ref_peptides.aa_at(gene, pos).ok_or_else(|| {
                            TreeError::MutationPositionInvalid(format!("{gene}:{pos}"))
                        })?;
                        Ok(AaSub {
                            ref_aa,
                            pos,
                            qry_aa,
                        })
                    })
                    .collect::<Result<Vec<AaSub>>>()?;
                Ok((gene.clone(), subs))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Divergence from the root. Absent means "not computed", which is
    /// distinct from zero.
    pub fn divergence(&self) -> Option<f64> {
        self.divergence
    }

    pub fn set_divergence(&mut self, divergence: f64) {
        self.divergence = Some(divergence);
    }

    /// Clade label. Absence is semantically "inherit from the parent", but
    /// that convention belongs to callers; the node neither inherits nor
    /// propagates anything itself.
    pub fn clade(&self) -> Option<&str> {
        self.clade.as_deref()
    }

    pub fn set_clade(&mut self, clade: &str) {
        self.clade = Some(clade.to_string());
    }

    /// Whether this node belongs to the original reference tree, as opposed
    /// to having been introduced by placement.
    ///
    /// Errs with [`TreeError::TypeMissing`] when the node was never
    /// classified, and [`TreeError::TypeInvalid`] when the stored tag is
    /// not a recognized category. The split lets callers tell "never
    /// classified" from "classified incorrectly".
    pub fn is_reference_node(&self) -> Result<bool> {
        match self.node_type.as_deref() {
            None => Err(TreeError::TypeMissing),
            Some(NODE_TYPE_REFERENCE) => Ok(true),
            Some(NODE_TYPE_NEW) => Ok(false),
            Some(other) => Err(TreeError::TypeInvalid(other.to_string())),
        }
    }

    /// Writes the categorical tag verbatim; validation happens on read.
    pub fn set_node_type(&mut self, node_type: &str) {
        self.node_type = Some(node_type.to_string());
    }

    pub(crate) fn raw_node_type(&self) -> Option<&str> {
        self.node_type.as_deref()
    }

    /// Sets a permanent named attribute.
    pub fn set_node_attr(&mut self, name: &str, value: &str) {
        self.attrs.insert(
            name.to_string(),
            NodeAttr {
                value: value.to_string(),
                temporary: false,
            },
        );
    }

    /// Sets a named attribute flagged as transient working state; it will
    /// be dropped by [`TreeNode::remove_temporaries`].
    pub fn set_temp_attr(&mut self, name: &str, value: &str) {
        self.attrs.insert(
            name.to_string(),
            NodeAttr {
                value: value.to_string(),
                temporary: true,
            },
        );
    }

    pub fn node_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|attr| attr.value.as_str())
    }

    pub fn remove_node_attr(&mut self, name: &str) {
        self.attrs.remove(name);
    }

    pub(crate) fn attrs(&self) -> &BTreeMap<String, NodeAttr> {
        &self.attrs
    }

    /// Drops every transient entry from this node: temporary-flagged
    /// attributes, the owner-assigned id, and the raw working mutation
    /// maps. Idempotent. Subtree-wide pruning is composed by the owner
    /// (see [`Tree::remove_temporaries`](crate::models::tree::Tree::remove_temporaries)).
    pub fn remove_temporaries(&mut self) {
        self.attrs.retain(|_, attr| !attr.temporary);
        self.id = None;
        self.substitutions.clear();
        self.mutations.clear();
        self.aa_substitutions.clear();
        self.aa_mutations.clear();
    }

    /// Presentation-only mutation descriptors, grouped by display
    /// attribute. Write-only: this data exists for the serializer, nothing
    /// in the core reads it back.
    pub fn set_branch_attr_mutations(&mut self, mutations: BTreeMap<String, Vec<String>>) {
        self.branch_attr_mutations = mutations;
    }

    pub(crate) fn branch_attr_mutations(&self) -> &BTreeMap<String, Vec<String>> {
        &self.branch_attr_mutations
    }
}
