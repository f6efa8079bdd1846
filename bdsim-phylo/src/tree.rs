//! Rooted phylogenetic trees grown and pruned by the simulators.
//!
//! Uses arena-style storage: nodes live in a flat `Vec<Node>` and are
//! referenced by `NodeId` (a `usize` index). Pruning and unifurcation
//! suppression detach nodes without removing them from the arena, so ids held
//! elsewhere (active-leaf lists, lineage histories) stay valid for the whole
//! run. A node belongs to the tree iff its parent chain reaches the root;
//! every count and traversal below only sees attached nodes. [`PhyloTree::compact`]
//! rebuilds a fresh arena once ids no longer need to be stable.

use std::ops::{Index, IndexMut};

use bdsim_core::{BdsimError, Result, Summarizable};

/// Index into the tree's node arena.
pub type NodeId = usize;

/// Index into a protracted speciation run's lineage arena.
pub type LineageId = usize;

/// Per-lineage birth and death rates carried by a simulated node.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rates {
    pub birth: f64,
    pub death: f64,
}

impl Rates {
    pub fn new(birth: f64, death: f64) -> Self {
        Self { birth, death }
    }
}

/// A single node in a phylogenetic tree.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Index of this node in the arena.
    pub id: NodeId,
    /// Parent node (None for the root and for detached nodes).
    pub parent: Option<NodeId>,
    /// Child nodes.
    pub children: Vec<NodeId>,
    /// Length of the edge subtending this node. Never negative.
    pub edge_length: f64,
    /// Taxon label assigned to a tip.
    pub name: Option<String>,
    /// Free-form node label.
    pub label: Option<String>,
    /// Time from this node to the tips, once computed.
    pub age: Option<f64>,
    /// Birth/death rates inherited by a simulated lineage.
    pub rates: Option<Rates>,
    /// Owning lineage in a protracted speciation run.
    pub lineage: Option<LineageId>,
    /// Whether the node marks a completed (full) speciation event.
    pub is_full_speciation_event: bool,
}

impl Node {
    fn empty(id: NodeId, parent: Option<NodeId>, edge_length: f64) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            edge_length,
            name: None,
            label: None,
            age: None,
            rates: None,
            lineage: None,
            is_full_speciation_event: false,
        }
    }

    /// True if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True if this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// True if this node has both parent and children.
    pub fn is_internal(&self) -> bool {
        !self.is_leaf() && !self.is_root()
    }
}

/// A rooted phylogenetic tree stored as an arena of nodes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhyloTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl PhyloTree {
    /// Create a new tree with a single root node and a zero-length edge.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty(0, None, 0.0)],
            root: 0,
        }
    }

    /// Create a tree from pre-built nodes and a root index.
    pub fn from_nodes(nodes: Vec<Node>, root: NodeId) -> Result<Self> {
        if nodes.is_empty() {
            return Err(BdsimError::InvalidInput("empty node list".into()));
        }
        if root >= nodes.len() {
            return Err(BdsimError::InvalidInput(format!(
                "root index {} out of range ({})",
                root,
                nodes.len()
            )));
        }
        Ok(Self { nodes, root })
    }

    /// Add a child to `parent` and return its `NodeId`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: Option<String>,
        edge_length: f64,
    ) -> Result<NodeId> {
        if parent >= self.nodes.len() {
            return Err(BdsimError::InvalidInput(format!(
                "parent index {} out of range ({})",
                parent,
                self.nodes.len()
            )));
        }
        if !(edge_length >= 0.0) {
            return Err(BdsimError::InvalidInput(format!(
                "edge length must be >= 0, got {}",
                edge_length
            )));
        }
        let id = self.nodes.len();
        let mut node = Node::empty(id, Some(parent), edge_length);
        node.name = name;
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Add an unnamed zero-length child to `parent`.
    pub fn new_child(&mut self, parent: NodeId) -> Result<NodeId> {
        self.add_child(parent, None, 0.0)
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// True if `id` is attached to the tree (its parent chain reaches the root).
    pub fn contains(&self, id: NodeId) -> bool {
        let mut cur = match self.nodes.get(id) {
            Some(node) => node.id,
            None => return false,
        };
        loop {
            if cur == self.root {
                return true;
            }
            match self.nodes[cur].parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// Number of attached nodes.
    pub fn node_count(&self) -> usize {
        self.iter_preorder().count()
    }

    /// Number of attached leaf nodes.
    pub fn leaf_count(&self) -> usize {
        self.iter_preorder()
            .filter(|&id| self.nodes[id].is_leaf())
            .count()
    }

    /// Attached leaf node ids, in preorder.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.iter_preorder()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    /// All internal (non-leaf, non-root) node ids, in preorder.
    pub fn internal_nodes(&self) -> Vec<NodeId> {
        self.iter_preorder()
            .filter(|&id| self.nodes[id].is_internal())
            .collect()
    }

    /// Sum of all attached edge lengths, the root edge included.
    pub fn total_branch_length(&self) -> f64 {
        self.iter_preorder().map(|id| self.nodes[id].edge_length).sum()
    }

    /// Pre-order (parent before children) traversal yielding node ids.
    pub fn iter_preorder(&self) -> PreorderIter<'_> {
        PreorderIter {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Post-order (children before parent) traversal yielding node ids.
    pub fn iter_postorder(&self) -> PostorderIter {
        // Reverse of a root-first walk that pushes children left to right.
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            result.push(id);
            for &child in &self.nodes[id].children {
                stack.push(child);
            }
        }
        result.reverse();
        PostorderIter {
            sequence: result,
            pos: 0,
        }
    }

    /// Sorted list of leaf names (leaves without names are excluded).
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .leaves()
            .into_iter()
            .filter_map(|id| self.nodes[id].name.clone())
            .collect();
        names.sort();
        names
    }

    /// Detach the subtree rooted at `node` from its parent.
    ///
    /// With `suppress_unifurcations`, any node left with a single child is
    /// collapsed afterwards (see [`PhyloTree::suppress_unifurcations`]).
    ///
    /// # Errors
    ///
    /// Returns an error if `node` is the root or is not attached to the tree.
    pub fn prune_subtree(&mut self, node: NodeId, suppress_unifurcations: bool) -> Result<()> {
        if node == self.root {
            return Err(BdsimError::InvalidInput("cannot prune the root".into()));
        }
        if !self.contains(node) {
            return Err(BdsimError::InvalidInput(format!(
                "node {} is not attached to the tree",
                node
            )));
        }
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|&c| c != node);
        }
        if suppress_unifurcations {
            self.suppress_unifurcations();
        }
        Ok(())
    }

    /// Collapse every node that has exactly one child.
    ///
    /// The child takes the removed node's place among its siblings and its
    /// edge absorbs the removed edge. A single-child root is replaced by its
    /// child. Leaf ids are never invalidated.
    pub fn suppress_unifurcations(&mut self) {
        let order: Vec<NodeId> = self.iter_postorder().collect();
        for id in order {
            if self.nodes[id].children.len() != 1 {
                continue;
            }
            let child = self.nodes[id].children[0];
            let absorbed = self.nodes[id].edge_length;
            self.nodes[child].edge_length += absorbed;
            self.nodes[id].children.clear();
            match self.nodes[id].parent.take() {
                Some(parent) => {
                    for slot in self.nodes[parent].children.iter_mut() {
                        if *slot == id {
                            *slot = child;
                        }
                    }
                    self.nodes[child].parent = Some(parent);
                }
                None => {
                    self.nodes[child].parent = None;
                    self.root = child;
                }
            }
        }
    }

    /// Node ages (distance to the tips) indexed by `NodeId`, detached nodes `None`.
    ///
    /// Each internal node takes its age from its first child; with
    /// `precision = Some(eps)` every other child must agree within `eps`.
    pub fn node_ages(&self, precision: Option<f64>) -> Result<Vec<Option<f64>>> {
        let mut ages = vec![None; self.nodes.len()];
        for id in self.iter_postorder() {
            let node = &self.nodes[id];
            let age = match node.children.first() {
                None => 0.0,
                Some(&first) => {
                    let age = child_age(&ages, first) + self.nodes[first].edge_length;
                    if let Some(eps) = precision {
                        for &other in &node.children[1..] {
                            let other_age = child_age(&ages, other) + self.nodes[other].edge_length;
                            if (other_age - age).abs() > eps {
                                return Err(BdsimError::NotUltrametric(format!(
                                    "node {} has child ages {} and {} (precision {})",
                                    id, age, other_age, eps
                                )));
                            }
                        }
                    }
                    age
                }
            };
            ages[id] = Some(age);
        }
        Ok(ages)
    }

    /// Store node ages on every attached node and clear them elsewhere.
    pub fn calc_node_ages(&mut self, precision: Option<f64>) -> Result<()> {
        let ages = self.node_ages(precision)?;
        for (node, age) in self.nodes.iter_mut().zip(ages) {
            node.age = age;
        }
        Ok(())
    }

    /// Ages of all non-leaf nodes (the root included), in preorder.
    pub fn internal_node_ages(&self, precision: Option<f64>) -> Result<Vec<f64>> {
        let ages = self.node_ages(precision)?;
        Ok(self
            .iter_preorder()
            .filter(|&id| !self.nodes[id].is_leaf())
            .filter_map(|id| ages[id])
            .collect())
    }

    /// Set each non-root edge to `parent.age - child.age`.
    ///
    /// # Errors
    ///
    /// Returns an error if an attached node has no age or is older than its parent.
    pub fn set_edge_lengths_from_node_ages(&mut self) -> Result<()> {
        let order: Vec<NodeId> = self.iter_preorder().collect();
        for id in order {
            let Some(parent) = self.nodes[id].parent else {
                continue;
            };
            let (Some(parent_age), Some(age)) = (self.nodes[parent].age, self.nodes[id].age) else {
                return Err(BdsimError::InvalidInput(format!(
                    "node {} or its parent has no age",
                    id
                )));
            };
            let length = parent_age - age;
            if length < 0.0 {
                return Err(BdsimError::InvalidInput(format!(
                    "node {} (age {}) is older than its parent (age {})",
                    id, age, parent_age
                )));
            }
            self.nodes[id].edge_length = length;
        }
        Ok(())
    }

    /// Copy the attached nodes into a fresh arena with preorder ids.
    pub fn compact(&self) -> PhyloTree {
        let order: Vec<NodeId> = self.iter_preorder().collect();
        let mut remap = vec![usize::MAX; self.nodes.len()];
        for (new_id, &old_id) in order.iter().enumerate() {
            remap[old_id] = new_id;
        }
        let nodes = order
            .iter()
            .enumerate()
            .map(|(new_id, &old_id)| {
                let old = &self.nodes[old_id];
                Node {
                    id: new_id,
                    parent: if old_id == self.root {
                        None
                    } else {
                        old.parent.map(|p| remap[p])
                    },
                    children: old.children.iter().map(|&c| remap[c]).collect(),
                    ..old.clone()
                }
            })
            .collect();
        PhyloTree { nodes, root: 0 }
    }
}

fn child_age(ages: &[Option<f64>], id: NodeId) -> f64 {
    ages[id].unwrap_or(0.0)
}

impl Default for PhyloTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for PhyloTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for PhyloTree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }
}

impl Summarizable for PhyloTree {
    fn summary(&self) -> String {
        let total = self.node_count();
        let leaves = self.leaf_count();
        format!(
            "PhyloTree: {} nodes ({} leaves, {} internal)",
            total,
            leaves,
            total - leaves
        )
    }
}

/// Pre-order iterator over node ids.
pub struct PreorderIter<'a> {
    tree: &'a PhyloTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreorderIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        // Push children in reverse order so leftmost is visited first.
        for &child in self.tree.nodes[id].children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

/// Post-order iterator over node ids.
pub struct PostorderIter {
    sequence: Vec<NodeId>,
    pos: usize,
}

impl Iterator for PostorderIter {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = *self.sequence.get(self.pos)?;
        self.pos += 1;
        Some(id)
    }
}
