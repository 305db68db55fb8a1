//! Arena-based decomposition tree: nodes, upward links, traversal.

use std::fmt;

use crate::dataset::DataPoint;
use crate::domain::DomainTable;

/// Index into a tree's node arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(usize);

impl NodeId {
    /// Create a node id from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The rule an interior node splits its data subset with.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Split {
    /// One child per non-missing domain value of `attribute`.
    Discrete {
        /// The decomposition attribute.
        attribute: usize,
    },
    /// Two children ordered [≤ threshold, > threshold].
    Continuous {
        /// The decomposition attribute.
        attribute: usize,
        /// The winning threshold.
        threshold: f64,
    },
}

impl Split {
    /// Return the decomposition attribute.
    #[must_use]
    pub fn attribute(self) -> usize {
        match self {
            Split::Discrete { attribute } | Split::Continuous { attribute, .. } => attribute,
        }
    }
}

/// One node of a decomposition tree.
///
/// A node with children is interior; a node without is a leaf. Every
/// non-root node keeps a non-owning parent id, used only for the
/// empty-leaf fallback during classification.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) split: Option<Split>,
    /// The domain code that routed here from a discrete parent split.
    pub(crate) branch_value: Option<usize>,
    pub(crate) class_counts: Vec<usize>,
    /// The criterion score recorded when this node was decomposed.
    pub(crate) score: f64,
}

impl Node {
    pub(crate) fn leaf(class_counts: Vec<usize>) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            split: None,
            branch_value: None,
            class_counts,
            score: 0.0,
        }
    }

    /// Return `true` if this node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Return `true` if no training point reached this node.
    #[must_use]
    pub fn is_unpopulated(&self) -> bool {
        self.class_counts.iter().all(|&c| c == 0)
    }

    /// Return the number of training points that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.class_counts.iter().sum()
    }

    /// Return the per-class frequency counts.
    #[must_use]
    pub fn class_counts(&self) -> &[usize] {
        &self.class_counts
    }

    /// Return the split rule, if this node was decomposed.
    #[must_use]
    pub fn split(&self) -> Option<Split> {
        self.split
    }

    /// Return the children ids.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Return the parent id; the root has none.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Return the criterion score used to decompose this node.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Index of the maximum frequency count, first-encountered wins ties.
    #[must_use]
    pub fn majority_class(&self) -> usize {
        let mut best = 0usize;
        let mut best_count = self.class_counts.first().copied().unwrap_or(0);
        for (class, &count) in self.class_counts.iter().enumerate().skip(1) {
            if count > best_count {
                best_count = count;
                best = class;
            }
        }
        best
    }
}

/// A decomposition tree stored as a node arena rooted at index 0.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree consisting of a single root leaf.
    pub(crate) fn with_root(class_counts: Vec<usize>) -> Self {
        Self {
            nodes: vec![Node::leaf(class_counts)],
        }
    }

    /// Return the root id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Return the node with the given id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Return the total number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return `true` if the arena is empty (never the case for built trees).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Count the nodes at least one training point reached.
    #[must_use]
    pub fn populated_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_unpopulated()).count()
    }

    /// Count the populated leaves (the rules of the tree).
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf() && !n.is_unpopulated())
            .count()
    }

    /// Splice `subtree` into the arena as a child of `parent`.
    ///
    /// Node ids of the subtree are shifted past the current arena end; the
    /// subtree's root becomes the next child of `parent`. Returns the new
    /// id of the subtree root.
    pub(crate) fn graft(&mut self, parent: NodeId, subtree: Tree) -> NodeId {
        let offset = self.nodes.len();
        let root = NodeId(offset);
        for mut node in subtree.nodes {
            node.parent = match node.parent {
                Some(p) => Some(NodeId(p.0 + offset)),
                None => Some(parent),
            };
            for child in node.children.iter_mut() {
                child.0 += offset;
            }
            self.nodes.push(node);
        }
        self.nodes[parent.0].children.push(root);
        root
    }

    /// Walk from the root to the effective leaf for `point`.
    ///
    /// Discrete splits descend into the child whose branch value matches
    /// the point's code; when no child matches (an unseen value), the walk
    /// stops and the current node is the effective leaf. Continuous splits
    /// compare the decoded value against the threshold and take the ≤ or >
    /// child.
    #[must_use]
    pub fn descend(&self, point: &DataPoint, domains: &DomainTable) -> NodeId {
        let mut id = self.root();
        loop {
            let node = &self.nodes[id.0];
            if node.is_leaf() {
                return id;
            }
            let next = match node.split {
                Some(Split::Discrete { attribute }) => {
                    let code = point.code(attribute);
                    node.children
                        .iter()
                        .copied()
                        .find(|&child| self.nodes[child.0].branch_value == Some(code))
                }
                Some(Split::Continuous {
                    attribute,
                    threshold,
                }) => domains
                    .domain(attribute)
                    .number_of(point.code(attribute))
                    .map(|value| {
                        if value <= threshold {
                            node.children[0]
                        } else {
                            node.children[1]
                        }
                    }),
                None => None,
            };
            match next {
                Some(child) => id = child,
                None => return id,
            }
        }
    }

    /// Predict the class code for `point`.
    ///
    /// Applies the empty-leaf rule: when the reached node saw no training
    /// point, the prediction is the majority class of its parent.
    #[must_use]
    pub fn classify(&self, point: &DataPoint, domains: &DomainTable) -> usize {
        let id = self.descend(point, domains);
        let node = &self.nodes[id.0];
        if node.is_unpopulated()
            && let Some(parent) = node.parent
        {
            return self.nodes[parent.0].majority_class();
        }
        node.majority_class()
    }
}
