//! Integration tests for the document-in / document-out workflow through
//! the public API: bind a reference tree, graft placement nodes onto it,
//! accumulate and elaborate mutations, strip temporaries and serialize.
//!
//! Note: unit tests for the individual pieces (binding errors, the
//! accumulation rule, attribute lifecycle) are in the source modules.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{Value, json};

use mutree_core::errors::TreeError;
use mutree_core::models::{Aa, AaPos, Nuc, NucPos, NucSub, Tree};
use mutree_core::reference::{SimpleRefPeptides, SimpleRefSeq};

/// A small reference tree in the document shape the serializer speaks:
/// root -> (clade-A -> leaf-1, leaf-2), all reference nodes.
#[fixture]
fn reference_doc() -> Value {
    json!({
        "name": "root",
        "node_attrs": {
            "div": 0.0,
            "clade_membership": { "value": "19A" },
            "node_type": { "value": "Reference" },
        },
        "children": [
            {
                "name": "clade-A",
                "node_attrs": {
                    "div": 1.5,
                    "clade_membership": { "value": "20A" },
                    "node_type": { "value": "Reference" },
                },
                "children": [
                    {
                        "name": "leaf-1",
                        "node_attrs": {
                            "div": 3.0,
                            "node_type": { "value": "Reference" },
                        },
                    },
                ],
            },
            {
                "name": "leaf-2",
                "node_attrs": {
                    "div": 2.0,
                    "node_type": { "value": "Reference" },
                },
            },
        ],
    })
}

fn nuc_map(entries: &[(NucPos, Nuc)]) -> BTreeMap<NucPos, Nuc> {
    entries.iter().copied().collect()
}

#[rstest]
fn test_bind_then_serialize_round_trip(reference_doc: Value) {
    let tree = Tree::from_value(&reference_doc).unwrap();
    assert_eq!(tree.to_value(), reference_doc);
}

#[rstest]
fn test_empty_root_grows_two_children() {
    // Scenario: start from a bare `{}` document and build up
    let mut tree = Tree::from_value(&json!({})).unwrap();
    let root = tree.root();

    let first = tree.add_child(root);
    let second = tree.add_child(root);

    assert_eq!(tree.children(root).len(), 2);
    assert!(tree[first].id().unwrap() < tree[second].id().unwrap());

    let mut order = Vec::new();
    tree.for_each_child(root, |child| order.push(child.id().unwrap()));
    assert_eq!(order.len(), 2);
    assert_eq!(order[0], tree[first].id().unwrap());
}

#[rstest]
fn test_cumulative_view_and_elaboration() {
    // Scenario: inject a precomputed cumulative set, read it back, then
    // elaborate it against the reference
    let mut tree = Tree::new();
    let root = tree.root();

    tree[root].set_mutations(nuc_map(&[(100, Nuc::A), (55, Nuc::G)]));
    assert_eq!(
        tree[root].mutations(),
        &nuc_map(&[(55, Nuc::G), (100, Nuc::A)])
    );

    // 200 C's: every position answers with C
    let ref_seq: SimpleRefSeq = "C".repeat(200).parse().unwrap();
    let subs = tree[root].nucleotide_mutations(&ref_seq).unwrap();

    assert_eq!(subs.len(), tree[root].mutations().len());
    assert_eq!(
        subs,
        vec![
            NucSub {
                ref_nuc: Nuc::C,
                pos: 55,
                qry_nuc: Nuc::G,
            },
            NucSub {
                ref_nuc: Nuc::C,
                pos: 100,
                qry_nuc: Nuc::A,
            },
        ]
    );
    assert_eq!(subs[0].to_string(), "C56G");
}

#[rstest]
fn test_elaboration_requires_reference_cover() {
    let mut tree = Tree::new();
    let root = tree.root();
    tree[root].set_mutations(nuc_map(&[(10, Nuc::T)]));

    let short_ref: SimpleRefSeq = "ACGT".parse().unwrap();
    let err = tree[root].nucleotide_mutations(&short_ref).unwrap_err();
    assert_eq!(err, TreeError::MutationPositionInvalid("10".to_string()));
}

#[rstest]
fn test_aminoacid_elaboration_per_gene() {
    let mut tree = Tree::new();
    let root = tree.root();

    let mut gene_map: BTreeMap<String, BTreeMap<AaPos, Aa>> = BTreeMap::new();
    gene_map.insert("S".to_string(), [(501, Aa::Y)].into_iter().collect());
    tree[root].set_aa_mutations(gene_map);

    let mut peptides = SimpleRefPeptides::new();
    // Asparagine at codon 501 of S
    let mut spike = "M".repeat(501);
    spike.push('N');
    peptides.add_gene("S", &spike).unwrap();

    let by_gene = tree[root].aminoacid_mutations(&peptides).unwrap();
    assert_eq!(by_gene.len(), 1);
    let subs = &by_gene["S"];
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].pos, 501);
    assert_eq!(subs[0].ref_aa, Aa::N);
    assert_eq!(subs[0].qry_aa, Aa::Y);
    assert_eq!(subs[0].to_string(), "N502Y");
}

#[rstest]
fn test_placement_workflow(reference_doc: Value) {
    // The full pipeline shape: bind, number, graft a query node next to
    // its attachment point, inject its mutation sets, prune, serialize.
    let mut tree = Tree::from_value(&reference_doc).unwrap();
    tree.assign_ids();
    let root = tree.root();

    // Seed branch diffs on the reference nodes and accumulate top-down
    let clade_a = tree.children(root)[0];
    let leaf_1 = tree.children(clade_a)[0];
    tree[clade_a].set_substitutions(nuc_map(&[(240, Nuc::T)]));
    tree[leaf_1].set_substitutions(nuc_map(&[(3036, Nuc::T), (240, Nuc::C)]));
    tree.accumulate_mutations();

    assert_eq!(tree[clade_a].mutations(), &nuc_map(&[(240, Nuc::T)]));
    assert_eq!(
        tree[leaf_1].mutations(),
        &nuc_map(&[(240, Nuc::C), (3036, Nuc::T)])
    );

    // Graft a copy of the attachment target, then hang the query off it
    let grafted = tree.add_child_from_copy(clade_a, leaf_1);
    let query = tree.add_child(grafted);
    tree[query].set_name("query-1");
    tree[query].set_node_type("New");
    tree[query].set_clade("20A");
    tree[query].set_divergence(3.5);
    tree[query].set_mutations(nuc_map(&[(240, Nuc::C), (3036, Nuc::T), (23062, Nuc::A)]));
    tree[query].set_temp_attr("placement-score", "0.97");
    tree[query].set_branch_attr_mutations(BTreeMap::from([(
        "nuc".to_string(),
        vec!["A23063T".to_string()],
    )]));

    assert_eq!(tree[query].is_reference_node(), Ok(false));
    assert_eq!(tree[leaf_1].is_reference_node(), Ok(true));
    assert_eq!(tree[query].divergence(), Some(3.5));
    assert_eq!(tree.max_divergence(), 3.5);

    // The grafted copy carries leaf-1's payload under a fresh id
    assert_eq!(tree[grafted].name(), "leaf-1");
    assert_ne!(tree[grafted].id().unwrap(), tree[leaf_1].id().unwrap());
    assert_eq!(tree[grafted].mutations(), tree[leaf_1].mutations());

    // Prune working state, then serialize: no tmp namespace anywhere,
    // permanent attributes survive
    tree.remove_temporaries();
    tree.remove_temporaries(); // idempotent
    let out = tree.to_value();

    let mut stack = vec![&out];
    while let Some(value) = stack.pop() {
        assert!(value.get("tmp").is_none());
        if let Some(children) = value.get("children").and_then(Value::as_array) {
            stack.extend(children);
        }
    }

    let query_out = &out["children"][0]["children"][1]["children"][0];
    assert_eq!(query_out["name"], json!("query-1"));
    assert_eq!(query_out["node_attrs"]["node_type"]["value"], json!("New"));
    assert_eq!(
        query_out["node_attrs"]["clade_membership"]["value"],
        json!("20A")
    );
    assert!(query_out["node_attrs"].get("placement-score").is_none());
    assert_eq!(
        query_out["branch_attrs"]["mutations"]["nuc"],
        json!(["A23063T"])
    );
}

#[rstest]
fn test_accumulation_matches_pure_rule(reference_doc: Value) {
    use mutree_core::models::accumulate;

    let mut tree = Tree::from_value(&reference_doc).unwrap();
    let root = tree.root();
    let clade_a = tree.children(root)[0];
    let leaf_1 = tree.children(clade_a)[0];

    tree[root].set_substitutions(nuc_map(&[(5, Nuc::T)]));
    tree[clade_a].set_substitutions(nuc_map(&[(5, Nuc::G), (7, Nuc::A)]));
    tree[leaf_1].set_substitutions(nuc_map(&[(9, Nuc::C)]));
    tree.accumulate_mutations();

    // Every non-root node's cumulative set equals the pure rule applied to
    // its parent's, and the root's equals its own diff
    for id in tree.iter_pre_order().collect::<Vec<_>>() {
        match tree.parent(id) {
            None => assert_eq!(tree[id].mutations(), tree[id].substitutions()),
            Some(parent) => assert_eq!(
                tree[id].mutations(),
                &accumulate(tree[parent].mutations(), tree[id].substitutions())
            ),
        }
    }
}
