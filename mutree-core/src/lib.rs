//! # mutree-core
//!
//! Core library for mutree: an in-memory, JSON-backed phylogenetic
//! reference tree where every node carries the nucleotide and amino-acid
//! substitutions that occurred on the branch leading to it, alongside the
//! cumulative set accumulated from the root.
//!
//! The tree is bound from a parsed document value
//! ([`Tree::from_value`](models::tree::Tree::from_value)), manipulated
//! through lightweight [`NodeId`](models::tree::NodeId) handles into a
//! single owning arena, and handed back to a serializer with
//! [`Tree::to_value`](models::tree::Tree::to_value) once temporary working
//! state has been stripped.
//!
//! Placement pipelines typically:
//! - bind a reference tree and number it with `assign_ids`,
//! - read cumulative mutation sets (`mutations`, `aminoacid_mutations`)
//!   while deciding where a query sequence belongs,
//! - graft new nodes with `add_child` / `add_child_from_copy` and inject
//!   the precomputed mutation sets for each,
//! - strip temporaries and serialize.
//!
//! Alignment, codon translation and the placement decision itself live
//! outside this crate; so does the JSON parser (documents arrive as
//! already-parsed `serde_json` values).

pub mod errors;
pub mod models;
pub mod reference;
