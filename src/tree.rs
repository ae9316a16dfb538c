//! Categorical classification tree over simulation records.
//!
//! Every level of the tree groups records by one [`Category`]; leaves hold the
//! keys of the records that ended up there, split into successful and failed
//! analyses. Membership of an internal node is the union over its subtree and
//! is always computed on demand, so it never goes stale.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use petgraph::graph::{Graph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{ParseError, RecordError, TreeError};
use crate::record::SimulationRecord;
use crate::repository::Repository;

/// Name of the root node.
pub const ROOT_NAME: &str = "All analyses";

/// Record attribute a tree level groups by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// Ratio of the crack axes `a / b`.
    CrackRatio,
    /// Analysis family.
    AnalysisType,
    /// Model variant; the mesh transformation for FEM analyses.
    ModelType,
    /// Mesh transformation.
    Transform,
    /// Element type.
    Elements,
    /// Composite record key.
    EntryKey,
    /// Container diameter.
    Diameter,
    /// Container height.
    Height,
}

impl Category {
    /// Levels used when no other levels are configured.
    pub const DEFAULT_LEVELS: [Category; 4] = [
        Category::CrackRatio,
        Category::AnalysisType,
        Category::ModelType,
        Category::Elements,
    ];

    const ALL: [Category; 8] = [
        Category::CrackRatio,
        Category::AnalysisType,
        Category::ModelType,
        Category::Transform,
        Category::Elements,
        Category::EntryKey,
        Category::Diameter,
        Category::Height,
    ];

    /// Name of the category in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Category::CrackRatio => "crackRatio",
            Category::AnalysisType => "analysisType",
            Category::ModelType => "modelType",
            Category::Transform => "transform",
            Category::Elements => "elements",
            Category::EntryKey => "entryKey",
            Category::Diameter => "diameter",
            Category::Height => "height",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.name() == s)
            .ok_or_else(|| ParseError::UnknownCategory(s.to_owned()))
    }
}

/// Member tallies of a subtree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemberCounts {
    /// Successful plus failed members.
    pub total: usize,
    /// Successful members.
    pub successful: usize,
    /// Failed members.
    pub failed: usize,
}

/// Internal representation of a tree node.
#[derive(Clone, Debug)]
struct TreeNode {
    /// Category value shared by the records below this node.
    name: String,
    /// Children in display order.
    children: Vec<NodeIndex>,
    /// Successful record keys; only populated at leaves.
    successful: BTreeSet<String>,
    /// Failed record keys; only populated at leaves.
    failed: BTreeSet<String>,
}

impl TreeNode {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            successful: BTreeSet::new(),
            failed: BTreeSet::new(),
        }
    }
}

/// Classification tree stored as an arena; edges point from parent to child.
#[derive(Clone, Debug)]
pub struct ClassificationTree {
    graph: Graph<TreeNode, ()>,
    root: NodeIndex,
    levels: Vec<Category>,
}

impl ClassificationTree {
    /// Create a tree holding only the root.
    #[must_use]
    pub fn new(levels: &[Category]) -> Self {
        let mut graph = Graph::new();
        let root = graph.add_node(TreeNode::new(ROOT_NAME.to_owned()));
        Self {
            graph,
            root,
            levels: levels.to_vec(),
        }
    }

    /// Build a tree by routing every record down the path of its category values.
    ///
    /// # Examples
    /// ```
    /// use shardx::tree::{Category, ClassificationTree};
    ///
    /// let tree = ClassificationTree::build([], &Category::DEFAULT_LEVELS);
    /// assert_eq!(tree.name(tree.root()), Some("All analyses"));
    /// assert!(tree.children(tree.root()).is_empty());
    /// ```
    pub fn build<'a>(
        records: impl IntoIterator<Item = &'a SimulationRecord>,
        levels: &[Category],
    ) -> Self {
        let mut tree = Self::new(levels);
        let mut count = 0_usize;
        for record in records {
            tree.insert(record);
            count += 1;
        }
        info!(records = count, nodes = tree.graph.node_count(), "built classification tree");
        tree
    }

    /// Load every key from the repository (parameters only) and build the tree.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] for the first record that cannot be loaded.
    pub fn from_repository(
        repo: &dyn Repository,
        keys: &BTreeSet<String>,
        levels: &[Category],
    ) -> Result<Self, RecordError> {
        let records = keys
            .iter()
            .map(|key| SimulationRecord::load(repo, key, &[]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::build(&records, levels))
    }

    /// Insert one record below the path of its category values.
    pub fn insert(&mut self, record: &SimulationRecord) {
        let mut node = self.root;
        let levels = self.levels.clone();
        for category in &levels {
            let name = record
                .parameter(*category)
                .unwrap_or_else(|| "None".to_owned());
            node = match self.find_child(node, &name) {
                Some(child) => child,
                None => self.add_child(node, name),
            };
        }
        let weight = &mut self.graph[node];
        if record.is_successful() {
            weight.successful.insert(record.key().to_owned());
        } else {
            weight.failed.insert(record.key().to_owned());
        }
    }

    fn add_child(&mut self, parent: NodeIndex, name: String) -> NodeIndex {
        let child = self.graph.add_node(TreeNode::new(name));
        self.graph.add_edge(parent, child, ());
        let mut children = std::mem::take(&mut self.graph[parent].children);
        children.push(child);
        self.sort_children(&mut children);
        self.graph[parent].children = children;
        child
    }

    /// Numeric order when every name parses as a number, otherwise lexicographic.
    fn sort_children(&self, children: &mut [NodeIndex]) {
        let numeric: Option<Vec<f64>> = children
            .iter()
            .map(|child| self.graph[*child].name.parse::<f64>().ok())
            .collect();
        match numeric {
            Some(values) => {
                let mut paired: Vec<(f64, NodeIndex)> =
                    values.into_iter().zip(children.iter().copied()).collect();
                paired.sort_by(|left, right| left.0.total_cmp(&right.0));
                for (slot, (_, child)) in children.iter_mut().zip(paired) {
                    *slot = child;
                }
            }
            None => children.sort_by(|left, right| self.graph[*left].name.cmp(&self.graph[*right].name)),
        }
    }

    /// Category of each level below the root.
    #[must_use]
    pub fn levels(&self) -> &[Category] {
        &self.levels
    }

    /// Index of the root node.
    #[must_use]
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Name of a node.
    #[must_use]
    pub fn name(&self, node: NodeIndex) -> Option<&str> {
        self.graph.node_weight(node).map(|weight| weight.name.as_str())
    }

    /// Parent of a node; `None` for the root.
    #[must_use]
    pub fn parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(node, Direction::Incoming)
            .next()
    }

    /// Children of a node in display order.
    #[must_use]
    pub fn children(&self, node: NodeIndex) -> &[NodeIndex] {
        self.graph
            .node_weight(node)
            .map(|weight| weight.children.as_slice())
            .unwrap_or_default()
    }

    /// Child of `node` with the given name.
    #[must_use]
    pub fn find_child(&self, node: NodeIndex, name: &str) -> Option<NodeIndex> {
        self.children(node)
            .iter()
            .copied()
            .find(|child| self.graph[*child].name == name)
    }

    /// Nodes of a subtree in depth-first pre-order, `node` first.
    #[must_use]
    pub fn descendants(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        if self.graph.node_weight(node).is_none() {
            return order;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        order
    }

    /// Leaves below `node`, excluding `node` itself.
    #[must_use]
    pub fn leaves(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.descendants(node)
            .into_iter()
            .filter(|candidate| *candidate != node && self.children(*candidate).is_empty())
            .collect()
    }

    /// Nodes from the root down to `node`, both included.
    #[must_use]
    pub fn path(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut path = Vec::new();
        if self.graph.node_weight(node).is_none() {
            return path;
        }
        let mut current = Some(node);
        while let Some(index) = current {
            path.push(index);
            current = self.parent(index);
        }
        path.reverse();
        path
    }

    /// Names along [`ClassificationTree::path`].
    #[must_use]
    pub fn path_names(&self, node: NodeIndex) -> Vec<&str> {
        self.path(node)
            .into_iter()
            .map(|index| self.graph[index].name.as_str())
            .collect()
    }

    /// Distance of a node from the root.
    #[must_use]
    pub fn level(&self, node: NodeIndex) -> usize {
        self.path(node).len().saturating_sub(1)
    }

    /// Largest node level in the tree.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.descendants(self.root)
            .into_iter()
            .map(|node| self.level(node))
            .max()
            .unwrap_or(0)
    }

    /// Nodes grouped by level, in breadth-first order within each level.
    #[must_use]
    pub fn nodes_per_level(&self) -> BTreeMap<usize, Vec<NodeIndex>> {
        let mut levels: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
        let mut queue = std::collections::VecDeque::from([(self.root, 0_usize)]);
        while let Some((node, level)) = queue.pop_front() {
            levels.entry(level).or_default().push(node);
            queue.extend(self.children(node).iter().map(|child| (*child, level + 1)));
        }
        levels
    }

    fn collect_members(
        &self,
        node: NodeIndex,
        select: impl Fn(&TreeNode) -> &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut members = BTreeSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(weight) = self.graph.node_weight(current) else {
                continue;
            };
            if weight.children.is_empty() {
                members.extend(select(weight).iter().cloned());
            } else {
                stack.extend(weight.children.iter().copied());
            }
        }
        members
    }

    /// Keys of successful records in the subtree.
    #[must_use]
    pub fn successful_members(&self, node: NodeIndex) -> BTreeSet<String> {
        self.collect_members(node, |weight| &weight.successful)
    }

    /// Keys of failed records in the subtree.
    #[must_use]
    pub fn failed_members(&self, node: NodeIndex) -> BTreeSet<String> {
        self.collect_members(node, |weight| &weight.failed)
    }

    /// Keys of every record in the subtree.
    #[must_use]
    pub fn all_members(&self, node: NodeIndex) -> BTreeSet<String> {
        let mut members = self.successful_members(node);
        members.extend(self.failed_members(node));
        members
    }

    /// Member tallies of the subtree.
    #[must_use]
    pub fn member_counts(&self, node: NodeIndex) -> MemberCounts {
        let successful = self.successful_members(node).len();
        let failed = self.failed_members(node).len();
        MemberCounts {
            total: successful + failed,
            successful,
            failed,
        }
    }

    /// Find the unique node whose name path ends with `suffix`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PathNotFound`] when no node matches and
    /// [`TreeError::AmbiguousPath`] when several do.
    pub fn tree_branch<S: AsRef<str>>(&self, suffix: &[S]) -> Result<NodeIndex, TreeError> {
        let wanted: Vec<&str> = suffix.iter().map(AsRef::as_ref).collect();
        let matches: Vec<NodeIndex> = self
            .descendants(self.root)
            .into_iter()
            .filter(|node| self.path_names(*node).ends_with(&wanted))
            .collect();
        let owned = || -> Vec<String> { wanted.iter().map(|name| (*name).to_owned()).collect() };
        match matches.as_slice() {
            [node] => Ok(*node),
            [] => Err(TreeError::PathNotFound(owned())),
            _ => Err(TreeError::AmbiguousPath(owned())),
        }
    }

    /// Children of the node found by [`ClassificationTree::tree_branch`].
    ///
    /// # Errors
    ///
    /// See [`ClassificationTree::tree_branch`].
    pub fn children_of_branch<S: AsRef<str>>(&self, suffix: &[S]) -> Result<&[NodeIndex], TreeError> {
        Ok(self.children(self.tree_branch(suffix)?))
    }

    /// Move a record from successful to failed at the leaf that holds it.
    ///
    /// Returns the number of records moved: 1, or 0 when the key is absent or
    /// already failed.
    pub fn assign_member_as_failed(&mut self, key: &str) -> usize {
        for node in self.descendants(self.root) {
            let weight = &mut self.graph[node];
            if weight.successful.remove(key) {
                weight.failed.insert(key.to_owned());
                info!(key, leaf = %weight.name, "marked member as failed");
                return 1;
            }
        }
        0
    }

    /// Apply [`ClassificationTree::assign_member_as_failed`] to several keys.
    pub fn assign_members_as_failed<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> usize {
        keys.into_iter()
            .map(|key| self.assign_member_as_failed(key))
            .sum()
    }
}
