use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use crate::errors::{Result, TreeError};
use crate::models::accumulation::{accumulate, accumulate_aa};
use crate::models::node::TreeNode;
use crate::models::symbols::{Nuc, NucPos};

/// Handle to one node of a [Tree]: a plain index into the arena.
///
/// Handles are `Copy`; duplicating one duplicates the reference, never the
/// underlying data. Duplicating data takes an explicit copy operation
/// ([`Tree::add_child_from_copy`], [`Tree::assign`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A mutation-annotated reference tree bound from a JSON document.
///
/// All nodes live in one arena owned by the tree; [NodeId] handles index
/// into it. This keeps ownership single-threaded and aliasing-free: every
/// mutation goes through `&mut Tree`, and a handle can never outlive or
/// dangle into a foreign document.
///
/// Structural invariants kept by construction: children are stored in
/// insertion order, `parent` back-links mirror the child lists, and the
/// root has no parent. Id uniqueness is deliberately NOT enforced here; it
/// is the owner's contract (see [`Tree::assign_ids`]).
#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    root: NodeId,
    next_id: u64,
}

impl Tree {
    /// Creates a tree holding a single empty root node.
    pub fn new() -> Self {
        Tree {
            nodes: vec![TreeNode::default()],
            root: NodeId(0),
            next_id: 0,
        }
    }

    /// Binds a parsed document into a tree.
    ///
    /// Every node value must be a keyed record; anything else is
    /// [`TreeError::NotObject`]. Recognized keys are bound and validated
    /// (see the per-field errors in [TreeError]); unknown keys belong to
    /// the external schema and are ignored. Ids are taken from the
    /// document's temporary namespace when present, never invented; run
    /// [`Tree::assign_ids`] to number a freshly loaded tree.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: NodeId(0),
            next_id: 0,
        };
        tree.root = tree.bind_value(value, None)?;
        tree.next_id = tree
            .nodes
            .iter()
            .filter_map(TreeNode::raw_id)
            .map(|id| id + 1)
            .max()
            .unwrap_or(0);
        Ok(tree)
    }

    fn bind_value(&mut self, value: &Value, parent: Option<NodeId>) -> Result<NodeId> {
        let obj = value
            .as_object()
            .ok_or_else(|| TreeError::NotObject(value.to_string()))?;

        let mut node = TreeNode::default();
        node.parent = parent;

        if let Some(name) = obj.get("name").and_then(Value::as_str) {
            node.set_name(name);
        }

        if let Some(attrs) = obj.get("node_attrs").and_then(Value::as_object) {
            bind_node_attrs(&mut node, attrs)?;
        }

        if let Some(mutations) = obj
            .get("branch_attrs")
            .and_then(|branch| branch.get("mutations"))
            .and_then(Value::as_object)
        {
            let mut lists = BTreeMap::new();
            for (attr, list) in mutations {
                if let Some(entries) = list.as_array() {
                    lists.insert(
                        attr.clone(),
                        entries
                            .iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect(),
                    );
                }
            }
            node.set_branch_attr_mutations(lists);
        }

        if let Some(tmp) = obj.get("tmp").and_then(Value::as_object) {
            bind_tmp(&mut node, tmp)?;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);

        if let Some(children) = obj.get("children").and_then(Value::as_array) {
            for child in children {
                let child_id = self.bind_value(child, Some(id))?;
                self.nodes[id.0].children.push(child_id);
            }
        }

        Ok(id)
    }

    /// Converts the tree back into a document value. The working (`tmp`)
    /// namespace is emitted only for state still present; the serializer
    /// collaborator is expected to call [`Tree::remove_temporaries`] first,
    /// after which no `tmp` record appears in the output.
    pub fn to_value(&self) -> Value {
        self.node_to_value(self.root)
    }

    fn node_to_value(&self, id: NodeId) -> Value {
        let node = &self.nodes[id.0];
        let mut obj = Map::new();

        if !node.name().is_empty() {
            obj.insert("name".to_string(), json!(node.name()));
        }

        let mut node_attrs = Map::new();
        if let Some(div) = node.divergence() {
            node_attrs.insert("div".to_string(), json!(div));
        }
        if let Some(clade) = node.clade() {
            node_attrs.insert("clade_membership".to_string(), json!({ "value": clade }));
        }
        if let Some(node_type) = node.raw_node_type() {
            node_attrs.insert("node_type".to_string(), json!({ "value": node_type }));
        }
        for (name, attr) in node.attrs() {
            if !attr.temporary {
                node_attrs.insert(name.clone(), json!({ "value": attr.value }));
            }
        }
        if !node_attrs.is_empty() {
            obj.insert("node_attrs".to_string(), Value::Object(node_attrs));
        }

        if !node.branch_attr_mutations().is_empty() {
            obj.insert(
                "branch_attrs".to_string(),
                json!({ "mutations": node.branch_attr_mutations() }),
            );
        }

        let mut tmp = Map::new();
        if let Some(id) = node.raw_id() {
            tmp.insert("id".to_string(), json!(id));
        }
        if !node.substitutions().is_empty() {
            tmp.insert(
                "substitutions".to_string(),
                nuc_map_to_value(node.substitutions()),
            );
        }
        if !node.mutations().is_empty() {
            tmp.insert("mutations".to_string(), nuc_map_to_value(node.mutations()));
        }
        for (name, attr) in node.attrs() {
            if attr.temporary {
                tmp.insert(name.clone(), json!(attr.value));
            }
        }
        if !tmp.is_empty() {
            obj.insert("tmp".to_string(), Value::Object(tmp));
        }

        if !node.children().is_empty() {
            let children: Vec<Value> = node
                .children()
                .iter()
                .map(|&child| self.node_to_value(child))
                .collect();
            obj.insert("children".to_string(), Value::Array(children));
        }

        Value::Object(obj)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Direct children of `id`, in insertion order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Number of nodes held in the arena. Nodes unlinked by
    /// [`Tree::assign`] remain counted until the tree is dropped.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    /// Appends a new empty child to `parent` and returns its handle. Child
    /// order reflects call order; the child receives the next
    /// owner-assigned id.
    pub fn add_child(&mut self, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = TreeNode::default();
        node.parent = Some(parent);
        node.set_id(self.fresh_id());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Grafts a deep copy of `source`'s entire subtree as a new child of
    /// `parent`, leaving `source` untouched, and returns the new child.
    ///
    /// The new child gets a fresh owner-assigned id; copied descendants
    /// keep their payloads verbatim, ids included. Renumbering after a
    /// graft is the owner's call. The copy is eager and O(subtree size).
    pub fn add_child_from_copy(&mut self, parent: NodeId, source: NodeId) -> NodeId {
        let new_child = self.copy_subtree(source, Some(parent));
        let fresh = self.fresh_id();
        self.nodes[new_child.0].set_id(fresh);
        self.nodes[parent.0].children.push(new_child);
        new_child
    }

    /// Overwrites `target`'s payload and descendants with a deep copy of
    /// `source`'s, preserving `target`'s position in the tree. The
    /// previously attached descendants of `target` are unlinked (they stay
    /// in the arena until the tree is dropped).
    ///
    /// `source` must not lie inside `target`'s subtree.
    pub fn assign(&mut self, target: NodeId, source: NodeId) {
        let source_children = self.nodes[source.0].children.clone();
        let mut payload = self.nodes[source.0].clone();
        payload.parent = self.nodes[target.0].parent;
        payload.children = Vec::new();
        self.nodes[target.0] = payload;
        for source_child in source_children {
            let copied = self.copy_subtree(source_child, Some(target));
            self.nodes[target.0].children.push(copied);
        }
    }

    fn copy_subtree(&mut self, source: NodeId, parent: Option<NodeId>) -> NodeId {
        let source_children = self.nodes[source.0].children.clone();
        let mut node = self.nodes[source.0].clone();
        node.parent = parent;
        node.children = Vec::new();

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);

        for source_child in source_children {
            let copied = self.copy_subtree(source_child, Some(id));
            self.nodes[id.0].children.push(copied);
        }
        id
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Numbers every reachable node in pre-order starting at 0 and leaves
    /// the id counter past the maximum, so subsequent [`Tree::add_child`]
    /// calls continue the sequence.
    pub fn assign_ids(&mut self) {
        let order: Vec<NodeId> = self.iter_pre_order().collect();
        let mut next = 0u64;
        for id in order {
            self.nodes[id.0].set_id(next);
            next += 1;
        }
        self.next_id = next;
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Applies `action` to each direct child of `id`, in child order.
    /// Single-pass and eager. The closure sees the child payload only, so
    /// the child list cannot be structurally modified mid-iteration.
    pub fn for_each_child(&self, id: NodeId, mut action: impl FnMut(&TreeNode)) {
        for &child in &self.nodes[id.0].children {
            action(&self.nodes[child.0]);
        }
    }

    /// Mutating variant of [`Tree::for_each_child`].
    pub fn for_each_child_mut(&mut self, id: NodeId, mut action: impl FnMut(&mut TreeNode)) {
        let children = self.nodes[id.0].children.clone();
        for child in children {
            action(&mut self.nodes[child.0]);
        }
    }

    /// Iterator over reachable node handles, parents before children.
    pub fn iter_pre_order(&self) -> PreOrderIter<'_> {
        PreOrderIter {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Iterator over reachable node handles, children before parents.
    pub fn iter_post_order(&self) -> PostOrderIter<'_> {
        PostOrderIter {
            tree: self,
            stack: vec![(self.root, false)],
        }
    }

    // ------------------------------------------------------------------
    // Tree-wide passes
    // ------------------------------------------------------------------

    /// Recomputes every node's cumulative mutation sets (nucleotide and
    /// per-gene amino acid) from its parent's cached result and its own
    /// branch-local diff, in one top-down pass. The root's cumulative set
    /// equals its own diff.
    pub fn accumulate_mutations(&mut self) {
        let order: Vec<NodeId> = self.iter_pre_order().collect();
        for id in order {
            let (nuc, aa) = match self.nodes[id.0].parent {
                None => (
                    self.nodes[id.0].substitutions().clone(),
                    self.nodes[id.0].aa_substitutions().clone(),
                ),
                Some(parent) => (
                    accumulate(
                        self.nodes[parent.0].mutations(),
                        self.nodes[id.0].substitutions(),
                    ),
                    accumulate_aa(
                        self.nodes[parent.0].aa_mutations(),
                        self.nodes[id.0].aa_substitutions(),
                    ),
                ),
            };
            self.nodes[id.0].set_mutations(nuc);
            self.nodes[id.0].set_aa_mutations(aa);
        }
    }

    /// Applies [`TreeNode::remove_temporaries`] to every reachable node.
    /// Run once before handing the tree to the serializer; idempotent.
    pub fn remove_temporaries(&mut self) {
        let order: Vec<NodeId> = self.iter_pre_order().collect();
        for id in order {
            self.nodes[id.0].remove_temporaries();
        }
    }

    /// The largest divergence value set on any reachable node, 0.0 when
    /// none is set.
    pub fn max_divergence(&self) -> f64 {
        self.iter_pre_order()
            .filter_map(|id| self.nodes[id.0].divergence())
            .fold(0.0, f64::max)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Index<NodeId> for Tree {
    type Output = TreeNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        &mut self.nodes[id.0]
    }
}

fn bind_node_attrs(node: &mut TreeNode, attrs: &Map<String, Value>) -> Result<()> {
    for (key, value) in attrs {
        match key.as_str() {
            "div" => {
                if let Some(div) = value.as_f64() {
                    node.set_divergence(div);
                }
            }
            "clade_membership" => {
                let clade = attr_value(value)
                    .and_then(Value::as_str)
                    .ok_or_else(|| TreeError::CladeInvalid(value.to_string()))?;
                node.set_clade(clade);
            }
            "node_type" => {
                // The tag is stored verbatim and validated on read, so a
                // malformed document surfaces TypeInvalid, not TypeMissing.
                match attr_value(value).and_then(Value::as_str) {
                    Some(tag) => node.set_node_type(tag),
                    None => node.set_node_type(&value.to_string()),
                }
            }
            other => {
                if let Some(text) = attr_value(value).and_then(Value::as_str) {
                    node.set_node_attr(other, text);
                }
            }
        }
    }
    Ok(())
}

fn bind_tmp(node: &mut TreeNode, tmp: &Map<String, Value>) -> Result<()> {
    for (key, value) in tmp {
        match key.as_str() {
            "id" => {
                let id = value
                    .as_u64()
                    .ok_or_else(|| TreeError::IdInvalid(value.to_string()))?;
                node.set_id(id);
            }
            "substitutions" => node.set_substitutions(parse_nuc_map(value)?),
            "mutations" => node.set_mutations(parse_nuc_map(value)?),
            other => {
                if let Some(text) = value.as_str() {
                    node.set_temp_attr(other, text);
                }
            }
        }
    }
    Ok(())
}

/// Unwraps the `{ "value": ... }` shape node attributes use, accepting a
/// bare value as well.
fn attr_value(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(obj) => obj.get("value"),
        other => Some(other),
    }
}

fn parse_nuc_map(value: &Value) -> Result<BTreeMap<NucPos, Nuc>> {
    let obj = value
        .as_object()
        .ok_or_else(|| TreeError::MutationPositionInvalid(value.to_string()))?;
    let mut map = BTreeMap::new();
    for (key, symbol) in obj {
        let pos: NucPos = key
            .parse()
            .map_err(|_| TreeError::MutationPositionInvalid(key.clone()))?;
        let nuc = symbol
            .as_str()
            .ok_or_else(|| TreeError::MutationNucleotideInvalid(symbol.to_string()))?
            .parse::<Nuc>()?;
        map.insert(pos, nuc);
    }
    Ok(map)
}

fn nuc_map_to_value(map: &BTreeMap<NucPos, Nuc>) -> Value {
    Value::Object(
        map.iter()
            .map(|(pos, nuc)| (pos.to_string(), json!(nuc.to_char().to_string())))
            .collect(),
    )
}

/// Pre-order traversal over node handles, stack-based.
pub struct PreOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        // Push children right-to-left so the leftmost is visited first
        for &child in self.tree.nodes[id.0].children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

/// Post-order traversal over node handles, stack-based.
pub struct PostOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, children_visited)) = self.stack.pop() {
            let node = &self.tree.nodes[id.0];
            if children_visited || node.is_leaf() {
                return Some(id);
            }
            self.stack.push((id, true));
            for &child in node.children.iter().rev() {
                self.stack.push((child, false));
            }
        }
        None
    }
}
