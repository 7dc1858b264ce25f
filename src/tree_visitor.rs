//! Left-to-right iteration over the marginal trees.

use crate::flags::TreeVisitorOptions;
use crate::newtypes::{NodeHash, NodeId};
use crate::tables::TableCollection;

/// Errors related to [`TreeVisitor`] and its consumers.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TreesError {
    #[error("tables are not indexed")]
    TablesNotIndexed,
    #[error("node {0} is out of range")]
    NodeIdOutOfRange(NodeId),
    #[error("no samples were given")]
    NoSamples,
    #[error("node {0} is listed more than once")]
    DuplicateSamples(NodeId),
    /// Sample lists were requested but
    /// [`TreeVisitorOptions::with_sample_lists`] was not set.
    #[error("not tracking samples")]
    NotTrackingSamples,
    /// Leaf counts were requested but
    /// [`TreeVisitorOptions::with_leaf_counts`] was not set.
    #[error("not tracking leaf counts")]
    NotTrackingLeafCounts,
    /// Some samples do not descend from exactly one root
    /// of the tree covering `[left, right)`.
    #[error("invalid sample ancestry on [{left}, {right})")]
    SamplesError { left: f64, right: f64 },
    #[error("mutations are not sorted by position")]
    MutationsNotSorted,
    #[error("site positions are not increasing")]
    SitesNotSorted,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VisitorState {
    NotStarted,
    OnTree,
    Exhausted,
}

const NO_SAMPLE: usize = usize::MAX;

#[derive(Copy, Clone)]
struct TopologyData {
    parent: NodeId,
    left_child: NodeId,
    right_child: NodeId,
    left_sib: NodeId,
    right_sib: NodeId,
    // Indexes into the sample list.
    left_sample: usize,
    right_sample: usize,
    leaf_count: u32,
    preserved_leaf_count: u32,
}

impl Default for TopologyData {
    fn default() -> Self {
        Self {
            parent: NodeId::NULL,
            left_child: NodeId::NULL,
            right_child: NodeId::NULL,
            left_sib: NodeId::NULL,
            right_sib: NodeId::NULL,
            left_sample: NO_SAMPLE,
            right_sample: NO_SAMPLE,
            leaf_count: 0,
            preserved_leaf_count: 0,
        }
    }
}

/// Sweeps the genome from left to right, updating
/// the marginal tree at each breakpoint.
///
/// Roots are the nodes without a parent that are ancestral
/// to, or are, at least one sample.  They form a linked list
/// through their sibling pointers, starting at
/// [`TreeVisitor::left_root`].
///
/// ```
/// use ancestry_tables::prelude::*;
///
/// let mut tables = TableCollection::new(1.0).unwrap();
/// let p = tables.emplace_back_node(DemeId::new(0), 0.0).unwrap();
/// let c0 = tables.emplace_back_node(DemeId::new(0), 1.0).unwrap();
/// let c1 = tables.emplace_back_node(DemeId::new(0), 1.0).unwrap();
/// tables.add_edge(0.0, 1.0, p, c0).unwrap();
/// tables.add_edge(0.0, 1.0, p, c1).unwrap();
/// tables.build_indexes();
///
/// let samples = [c0, c1];
/// let options = TreeVisitorOptions::default().with_leaf_counts();
/// let mut visitor = TreeVisitor::new(&tables, &samples, options).unwrap();
/// while visitor.advance() {
///     assert_eq!(visitor.roots().collect::<Vec<_>>(), vec![p]);
///     assert_eq!(visitor.leaf_count(p), Ok(2));
/// }
/// ```
pub struct TreeVisitor<'tables> {
    tables: &'tables TableCollection,
    topology: Vec<TopologyData>,
    above_sample: Vec<bool>,
    left_root: NodeId,
    samples: &'tables [NodeId],
    sample_index_map: Vec<usize>,
    next_sample: Vec<usize>,
    options: TreeVisitorOptions,
    input_index: usize,
    output_index: usize,
    x: f64,
    left: f64,
    right: f64,
    state: VisitorState,
}

fn check_nodes(
    nodes: &[NodeId],
    num_nodes: usize,
    seen: &mut NodeHash,
) -> Result<(), TreesError> {
    for &n in nodes {
        if n.raw() < 0 || n.as_index() >= num_nodes {
            return Err(TreesError::NodeIdOutOfRange(n));
        }
        if !seen.insert(n.as_index()) {
            return Err(TreesError::DuplicateSamples(n));
        }
    }
    Ok(())
}

impl<'tables> TreeVisitor<'tables> {
    /// # Errors
    ///
    /// * [`TreesError::TablesNotIndexed`] if the edge indexes
    ///   are missing or out of date.
    /// * [`TreesError::NoSamples`] if `samples` is empty.
    /// * [`TreesError::NodeIdOutOfRange`] or
    ///   [`TreesError::DuplicateSamples`] for invalid samples.
    pub fn new(
        tables: &'tables TableCollection,
        samples: &'tables [NodeId],
        options: TreeVisitorOptions,
    ) -> Result<Self, TreesError> {
        Self::with_preserved_nodes(tables, samples, &[], options)
    }

    /// As [`TreeVisitor::new`], also counting the `preserved`
    /// nodes (e.g. ancient samples) below each node.
    ///
    /// Preserved nodes do not take part in root tracking
    /// or sample lists.  A node may not be both a sample
    /// and preserved.
    pub fn with_preserved_nodes(
        tables: &'tables TableCollection,
        samples: &'tables [NodeId],
        preserved: &[NodeId],
        options: TreeVisitorOptions,
    ) -> Result<Self, TreesError> {
        if !tables.is_indexed() {
            return Err(TreesError::TablesNotIndexed);
        }
        if samples.is_empty() {
            return Err(TreesError::NoSamples);
        }
        let num_nodes = tables.num_nodes();
        let mut seen = NodeHash::default();
        check_nodes(samples, num_nodes, &mut seen)?;
        check_nodes(preserved, num_nodes, &mut seen)?;

        let mut visitor = Self {
            tables,
            topology: vec![TopologyData::default(); num_nodes],
            above_sample: vec![false; num_nodes],
            left_root: samples[0],
            samples,
            sample_index_map: vec![NO_SAMPLE; num_nodes],
            next_sample: vec![NO_SAMPLE; samples.len()],
            options,
            input_index: 0,
            output_index: 0,
            x: 0.0,
            left: 0.0,
            right: 0.0,
            state: VisitorState::NotStarted,
        };
        // Initially, each sample is a root.
        for (i, s) in samples.iter().enumerate() {
            visitor.sample_index_map[s.as_index()] = i;
            visitor.above_sample[s.as_index()] = true;
            let row = &mut visitor.topology[s.as_index()];
            row.left_sample = i;
            row.right_sample = i;
            row.leaf_count = 1;
            if i + 1 < samples.len() {
                row.right_sib = samples[i + 1];
            }
            if i > 0 {
                row.left_sib = samples[i - 1];
            }
        }
        for p in preserved {
            visitor.topology[p.as_index()].preserved_leaf_count = 1;
        }
        Ok(visitor)
    }

    fn update_incoming_leaf_counts(&mut self, parent: NodeId, child: NodeId) {
        let TopologyData {
            leaf_count,
            preserved_leaf_count,
            ..
        } = self.topology[child.as_index()];
        if leaf_count == 0 && preserved_leaf_count == 0 {
            return;
        }
        let mut u = parent;
        while !u.is_null() {
            let row = &mut self.topology[u.as_index()];
            row.leaf_count += leaf_count;
            row.preserved_leaf_count += preserved_leaf_count;
            u = row.parent;
        }
    }

    fn update_outgoing_leaf_counts(&mut self, parent: NodeId, child: NodeId) {
        let TopologyData {
            leaf_count,
            preserved_leaf_count,
            ..
        } = self.topology[child.as_index()];
        if leaf_count == 0 && preserved_leaf_count == 0 {
            return;
        }
        let mut u = parent;
        while !u.is_null() {
            let row = &mut self.topology[u.as_index()];
            row.leaf_count -= leaf_count;
            row.preserved_leaf_count -= preserved_leaf_count;
            u = row.parent;
        }
    }

    // `lsib` and `rsib` are the neighbors of `child`
    // in the root list before the edge was added.
    fn update_incoming_roots(&mut self, parent: NodeId, child: NodeId, lsib: NodeId, rsib: NodeId) {
        if !self.above_sample[child.as_index()] {
            return;
        }
        let mut x = parent;
        let mut root = x;
        let mut above_sample = false;
        while !x.is_null() && !above_sample {
            above_sample = self.above_sample[x.as_index()];
            self.above_sample[x.as_index()] = true;
            root = x;
            x = self.topology[x.as_index()].parent;
        }
        if !above_sample {
            // root takes the place of child in the root list
            if !lsib.is_null() {
                self.topology[lsib.as_index()].right_sib = root;
            }
            if !rsib.is_null() {
                self.topology[rsib.as_index()].left_sib = root;
            }
            self.topology[root.as_index()].left_sib = lsib;
            self.topology[root.as_index()].right_sib = rsib;
            self.left_root = root;
        } else {
            // child joined an existing root's tree
            self.left_root = NodeId::NULL;
            if !lsib.is_null() {
                self.topology[lsib.as_index()].right_sib = rsib;
                self.left_root = lsib;
            }
            if !rsib.is_null() {
                self.topology[rsib.as_index()].left_sib = lsib;
                self.left_root = rsib;
            }
        }
    }

    fn update_outgoing_roots(&mut self, parent: NodeId, child: NodeId) {
        if !self.above_sample[child.as_index()] {
            return;
        }
        let mut x = parent;
        let mut root = x;
        let mut above_sample = false;
        while !x.is_null() && !above_sample {
            above_sample = self.sample_index_map[x.as_index()] != NO_SAMPLE;
            let mut c = self.topology[x.as_index()].left_child;
            while !c.is_null() && !above_sample {
                above_sample = self.above_sample[c.as_index()];
                c = self.topology[c.as_index()].right_sib;
            }
            self.above_sample[x.as_index()] = above_sample;
            root = x;
            x = self.topology[x.as_index()].parent;
        }
        if !above_sample {
            // root no longer has samples below it
            let lroot = self.topology[root.as_index()].left_sib;
            let rroot = self.topology[root.as_index()].right_sib;
            self.left_root = NodeId::NULL;
            if !lroot.is_null() {
                self.topology[lroot.as_index()].right_sib = rroot;
                self.left_root = lroot;
            }
            if !rroot.is_null() {
                self.topology[rroot.as_index()].left_sib = lroot;
                self.left_root = rroot;
            }
            self.topology[root.as_index()].left_sib = NodeId::NULL;
            self.topology[root.as_index()].right_sib = NodeId::NULL;
        }
        // child becomes a root
        if !self.left_root.is_null() {
            let lroot = self.topology[self.left_root.as_index()].left_sib;
            if !lroot.is_null() {
                self.topology[lroot.as_index()].right_sib = child;
            }
            self.topology[child.as_index()].left_sib = lroot;
            self.topology[self.left_root.as_index()].left_sib = child;
        }
        self.topology[child.as_index()].right_sib = self.left_root;
        self.left_root = child;
    }

    fn update_sample_lists(&mut self, node: NodeId) {
        let mut n = node;
        while !n.is_null() {
            let sample_index = self.sample_index_map[n.as_index()];
            let row = &mut self.topology[n.as_index()];
            if sample_index != NO_SAMPLE {
                row.left_sample = sample_index;
                row.right_sample = sample_index;
            } else {
                row.left_sample = NO_SAMPLE;
                row.right_sample = NO_SAMPLE;
            }
            let mut v = self.topology[n.as_index()].left_child;
            while !v.is_null() {
                let child = self.topology[v.as_index()];
                if child.left_sample != NO_SAMPLE {
                    let row = &mut self.topology[n.as_index()];
                    if row.left_sample == NO_SAMPLE {
                        row.left_sample = child.left_sample;
                    } else {
                        self.next_sample[row.right_sample] = child.left_sample;
                    }
                    row.right_sample = child.right_sample;
                }
                v = child.right_sib;
            }
            n = self.topology[n.as_index()].parent;
        }
    }

    fn remove_edge(&mut self, parent: NodeId, child: NodeId) {
        let lsib = self.topology[child.as_index()].left_sib;
        let rsib = self.topology[child.as_index()].right_sib;
        if lsib.is_null() {
            self.topology[parent.as_index()].left_child = rsib;
        } else {
            self.topology[lsib.as_index()].right_sib = rsib;
        }
        if rsib.is_null() {
            self.topology[parent.as_index()].right_child = lsib;
        } else {
            self.topology[rsib.as_index()].left_sib = lsib;
        }
        let row = &mut self.topology[child.as_index()];
        row.parent = NodeId::NULL;
        row.left_sib = NodeId::NULL;
        row.right_sib = NodeId::NULL;

        if self.options.leaf_counts() {
            self.update_outgoing_leaf_counts(parent, child);
        }
        if self.options.sample_lists() {
            self.update_sample_lists(parent);
        }
        self.update_outgoing_roots(parent, child);
    }

    fn insert_edge(&mut self, parent: NodeId, child: NodeId) {
        let rchild = self.topology[parent.as_index()].right_child;
        let lsib = self.topology[child.as_index()].left_sib;
        let rsib = self.topology[child.as_index()].right_sib;
        if rchild.is_null() {
            self.topology[parent.as_index()].left_child = child;
            self.topology[child.as_index()].left_sib = NodeId::NULL;
        } else {
            self.topology[rchild.as_index()].right_sib = child;
            self.topology[child.as_index()].left_sib = rchild;
        }
        self.topology[child.as_index()].right_sib = NodeId::NULL;
        self.topology[child.as_index()].parent = parent;
        self.topology[parent.as_index()].right_child = child;

        if self.options.leaf_counts() {
            self.update_incoming_leaf_counts(parent, child);
        }
        if self.options.sample_lists() {
            self.update_sample_lists(parent);
        }
        self.update_incoming_roots(parent, child, lsib, rsib);
    }

    /// Move to the next tree.
    ///
    /// Returns `false`, and stays exhausted, once the
    /// last tree has been visited.
    pub fn advance(&mut self) -> bool {
        if self.state == VisitorState::Exhausted {
            return false;
        }
        let tables = self.tables;
        let edges = tables.edges();
        let input_left = &tables.input_left;
        let output_right = &tables.output_right;
        if self.input_index >= input_left.len() && self.x >= tables.genome_length() {
            self.state = VisitorState::Exhausted;
            return false;
        }

        while let Some(&e) = output_right.get(self.output_index) {
            let edge = &edges[e.as_index()];
            if edge.right != self.x {
                break;
            }
            self.remove_edge(edge.parent, edge.child);
            self.output_index += 1;
        }
        while let Some(&e) = input_left.get(self.input_index) {
            let edge = &edges[e.as_index()];
            if edge.left != self.x {
                break;
            }
            self.insert_edge(edge.parent, edge.child);
            self.input_index += 1;
        }

        // The root updates above only guarantee that
        // left_root is somewhere in the root list.
        if !self.left_root.is_null() {
            while !self.topology[self.left_root.as_index()].left_sib.is_null() {
                self.left_root = self.topology[self.left_root.as_index()].left_sib;
            }
        }

        let mut right = tables.genome_length();
        if let Some(&e) = input_left.get(self.input_index) {
            right = right.min(edges[e.as_index()].left);
        }
        if let Some(&e) = output_right.get(self.output_index) {
            right = right.min(edges[e.as_index()].right);
        }
        self.left = self.x;
        self.right = right;
        self.x = right;
        self.state = VisitorState::OnTree;
        true
    }

    pub fn state(&self) -> VisitorState {
        self.state
    }

    /// Left end of the current tree.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right end (exclusive) of the current tree.
    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn span(&self) -> f64 {
        self.right - self.left
    }

    pub fn tables(&self) -> &'tables TableCollection {
        self.tables
    }

    pub fn sample_nodes(&self) -> &'tables [NodeId] {
        self.samples
    }

    fn row(&self, u: NodeId) -> Result<&TopologyData, TreesError> {
        usize::try_from(u.raw())
            .ok()
            .and_then(|i| self.topology.get(i))
            .ok_or(TreesError::NodeIdOutOfRange(u))
    }

    pub fn parent(&self, u: NodeId) -> Result<NodeId, TreesError> {
        Ok(self.row(u)?.parent)
    }

    pub fn left_child(&self, u: NodeId) -> Result<NodeId, TreesError> {
        Ok(self.row(u)?.left_child)
    }

    pub fn right_child(&self, u: NodeId) -> Result<NodeId, TreesError> {
        Ok(self.row(u)?.right_child)
    }

    pub fn left_sib(&self, u: NodeId) -> Result<NodeId, TreesError> {
        Ok(self.row(u)?.left_sib)
    }

    pub fn right_sib(&self, u: NodeId) -> Result<NodeId, TreesError> {
        Ok(self.row(u)?.right_sib)
    }

    /// Number of samples descending from `u`, including `u`
    /// itself if it is a sample.
    ///
    /// # Errors
    ///
    /// [`TreesError::NotTrackingLeafCounts`] unless
    /// [`TreeVisitorOptions::with_leaf_counts`] was set.
    pub fn leaf_count(&self, u: NodeId) -> Result<u32, TreesError> {
        if !self.options.leaf_counts() {
            return Err(TreesError::NotTrackingLeafCounts);
        }
        Ok(self.row(u)?.leaf_count)
    }

    /// As [`TreeVisitor::leaf_count`], for preserved nodes.
    pub fn preserved_leaf_count(&self, u: NodeId) -> Result<u32, TreesError> {
        if !self.options.leaf_counts() {
            return Err(TreesError::NotTrackingLeafCounts);
        }
        Ok(self.row(u)?.preserved_leaf_count)
    }

    pub fn left_root(&self) -> NodeId {
        self.left_root
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.left_root.into_option(), move |r| {
            self.topology[r.as_index()].right_sib.into_option()
        })
    }

    pub fn num_roots(&self) -> usize {
        self.roots().count()
    }

    /// # Errors
    ///
    /// [`TreesError::NodeIdOutOfRange`] if `u` is out of range.
    pub fn children(&self, u: NodeId) -> Result<impl Iterator<Item = NodeId> + '_, TreesError> {
        let first = self.row(u)?.left_child;
        Ok(std::iter::successors(first.into_option(), move |c| {
            self.topology[c.as_index()].right_sib.into_option()
        }))
    }

    /// `u` followed by each of its ancestors up to the root.
    pub fn parents(&self, u: NodeId) -> Result<impl Iterator<Item = NodeId> + '_, TreesError> {
        self.row(u)?;
        Ok(std::iter::successors(Some(u), move |n| {
            self.topology[n.as_index()].parent.into_option()
        }))
    }

    /// Samples descending from `u`, including `u` if it is one.
    ///
    /// # Errors
    ///
    /// * [`TreesError::NotTrackingSamples`] unless
    ///   [`TreeVisitorOptions::with_sample_lists`] was set.
    /// * [`TreesError::NodeIdOutOfRange`] if `u` is out of range.
    pub fn samples(&self, u: NodeId) -> Result<SamplesIterator<'_, 'tables>, TreesError> {
        if !self.options.sample_lists() {
            return Err(TreesError::NotTrackingSamples);
        }
        let row = self.row(u)?;
        Ok(SamplesIterator {
            visitor: self,
            next: row.left_sample,
            last: row.right_sample,
        })
    }

    /// Sum of the branch lengths of the current tree, over
    /// the nodes reachable from the roots.
    ///
    /// With `scale_by_span`, the sum is multiplied by
    /// [`TreeVisitor::span`].
    pub fn total_branch_length(&self, scale_by_span: bool) -> f64 {
        let nodes = self.tables.nodes();
        let total = self
            .preorder()
            .filter_map(|u| {
                let p = self.topology[u.as_index()].parent.into_option()?;
                Some(nodes[u.as_index()].time - nodes[p.as_index()].time)
            })
            .sum::<f64>();
        if scale_by_span {
            total * self.span()
        } else {
            total
        }
    }

    /// Preorder traversal starting from each root in turn.
    pub fn preorder(&self) -> PreorderIterator<'_, 'tables> {
        let mut stack = self.roots().collect::<Vec<_>>();
        stack.reverse();
        PreorderIterator {
            visitor: self,
            stack,
        }
    }
}

impl<'tables> streaming_iterator::StreamingIterator for TreeVisitor<'tables> {
    type Item = TreeVisitor<'tables>;

    fn advance(&mut self) {
        TreeVisitor::advance(self);
    }

    fn get(&self) -> Option<&Self::Item> {
        match self.state {
            VisitorState::OnTree => Some(self),
            _ => None,
        }
    }
}

pub struct SamplesIterator<'visitor, 'tables> {
    visitor: &'visitor TreeVisitor<'tables>,
    next: usize,
    last: usize,
}

impl Iterator for SamplesIterator<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_SAMPLE {
            return None;
        }
        let current = self.next;
        self.next = if current == self.last {
            NO_SAMPLE
        } else {
            self.visitor.next_sample[current]
        };
        Some(self.visitor.samples[current])
    }
}

pub struct PreorderIterator<'visitor, 'tables> {
    visitor: &'visitor TreeVisitor<'tables>,
    stack: Vec<NodeId>,
}

impl Iterator for PreorderIterator<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let u = self.stack.pop()?;
        let mut c = self.visitor.topology[u.as_index()].right_child;
        while !c.is_null() {
            self.stack.push(c);
            c = self.visitor.topology[c.as_index()].left_sib;
        }
        Some(u)
    }
}

#[cfg(test)]
mod test_tree_visitor {
    use super::*;
    use crate::newtypes::DemeId;
    use streaming_iterator::StreamingIterator;

    //        6                 6
    //      /   \             /   \
    //     4     5           4     5
    //    / \   / \         /|\    |
    //   0   1 2   3       0 1 3   2
    //
    //    [0, 5)              [5, 10)
    fn two_trees() -> TableCollection {
        let mut tables = TableCollection::new(10.0).unwrap();
        for t in [2.0, 2.0, 2.0, 2.0, 1.0, 1.0, 0.0] {
            tables.emplace_back_node(DemeId::new(0), t).unwrap();
        }
        for (l, r, p, c) in [
            (0.0, 10.0, 4, 0),
            (0.0, 10.0, 4, 1),
            (0.0, 10.0, 5, 2),
            (0.0, 5.0, 5, 3),
            (5.0, 10.0, 4, 3),
            (0.0, 10.0, 6, 4),
            (0.0, 10.0, 6, 5),
        ] {
            tables
                .add_edge(l, r, NodeId::new(p), NodeId::new(c))
                .unwrap();
        }
        tables.sort_edges();
        tables.build_indexes();
        tables
    }

    fn nodes(ids: &[i32]) -> Vec<NodeId> {
        ids.iter().map(|&i| NodeId::new(i)).collect()
    }

    #[test]
    fn test_construction_errors() {
        let tables = two_trees();
        let options = TreeVisitorOptions::default();
        assert!(matches!(
            TreeVisitor::new(&tables, &[], options),
            Err(TreesError::NoSamples)
        ));
        let s = nodes(&[0, 0]);
        assert!(matches!(
            TreeVisitor::new(&tables, &s, options),
            Err(TreesError::DuplicateSamples(_))
        ));
        let s = nodes(&[0, 7]);
        assert!(matches!(
            TreeVisitor::new(&tables, &s, options),
            Err(TreesError::NodeIdOutOfRange(_))
        ));
        let s = nodes(&[0, 1]);
        assert!(matches!(
            TreeVisitor::with_preserved_nodes(&tables, &s, &[NodeId::new(1)], options),
            Err(TreesError::DuplicateSamples(_))
        ));
        let mut unindexed = tables.clone();
        unindexed.add_edge(0.0, 1.0, NodeId::new(6), NodeId::new(0)).unwrap();
        assert!(matches!(
            TreeVisitor::new(&unindexed, &s, options),
            Err(TreesError::TablesNotIndexed)
        ));
    }

    #[test]
    fn test_topology_and_leaf_counts() {
        let tables = two_trees();
        let samples = nodes(&[0, 1, 2, 3]);
        let options = TreeVisitorOptions::default().with_leaf_counts();
        let mut visitor = TreeVisitor::new(&tables, &samples, options).unwrap();
        assert_eq!(visitor.state(), VisitorState::NotStarted);

        assert!(visitor.advance());
        assert_eq!(visitor.state(), VisitorState::OnTree);
        assert_eq!((visitor.left(), visitor.right()), (0.0, 5.0));
        assert_eq!(visitor.roots().collect::<Vec<_>>(), nodes(&[6]));
        assert_eq!(visitor.parent(NodeId::new(3)), Ok(NodeId::new(5)));
        let counts = (4..7)
            .map(|n| visitor.leaf_count(NodeId::new(n)).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![2, 2, 4]);
        assert_eq!(
            visitor.preorder().collect::<Vec<_>>(),
            nodes(&[6, 4, 0, 1, 5, 2, 3])
        );

        assert!(visitor.advance());
        assert_eq!((visitor.left(), visitor.right()), (5.0, 10.0));
        assert_eq!(visitor.num_roots(), 1);
        assert_eq!(visitor.left_root(), NodeId::new(6));
        assert_eq!(
            visitor.children(NodeId::new(4)).unwrap().collect::<Vec<_>>(),
            nodes(&[0, 1, 3])
        );
        assert_eq!(
            visitor.parents(NodeId::new(3)).unwrap().collect::<Vec<_>>(),
            nodes(&[3, 4, 6])
        );
        let counts = (4..7)
            .map(|n| visitor.leaf_count(NodeId::new(n)).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![3, 1, 4]);

        assert!(!visitor.advance());
        assert_eq!(visitor.state(), VisitorState::Exhausted);
        assert!(!visitor.advance());
    }

    #[test]
    fn test_sample_lists() {
        let tables = two_trees();
        let samples = nodes(&[0, 1, 2, 3]);
        let options = TreeVisitorOptions::default().with_sample_lists();
        let mut visitor = TreeVisitor::new(&tables, &samples, options).unwrap();
        assert_eq!(
            visitor.leaf_count(NodeId::new(0)),
            Err(TreesError::NotTrackingLeafCounts)
        );
        assert!(visitor.advance());
        assert_eq!(
            visitor.samples(NodeId::new(6)).unwrap().collect::<Vec<_>>(),
            nodes(&[0, 1, 2, 3])
        );
        assert!(visitor.advance());
        assert_eq!(
            visitor.samples(NodeId::new(6)).unwrap().collect::<Vec<_>>(),
            nodes(&[0, 1, 3, 2])
        );
        assert_eq!(
            visitor.samples(NodeId::new(5)).unwrap().collect::<Vec<_>>(),
            nodes(&[2])
        );
        assert_eq!(
            visitor.samples(NodeId::new(2)).unwrap().collect::<Vec<_>>(),
            nodes(&[2])
        );
    }

    #[test]
    fn test_not_tracking_samples() {
        let tables = two_trees();
        let samples = nodes(&[0, 1]);
        let visitor = TreeVisitor::new(&tables, &samples, TreeVisitorOptions::default()).unwrap();
        assert!(matches!(
            visitor.samples(NodeId::new(0)),
            Err(TreesError::NotTrackingSamples)
        ));
    }

    // With samples 0 and 2 only, node 3 is not a root
    // on [5, 10) even though it loses its parent there.
    #[test]
    fn test_roots_with_subset_of_samples() {
        let tables = two_trees();
        let samples = nodes(&[0, 2]);
        let options = TreeVisitorOptions::default().with_leaf_counts();
        let mut visitor = TreeVisitor::new(&tables, &samples, options).unwrap();
        while visitor.advance() {
            assert_eq!(visitor.roots().collect::<Vec<_>>(), nodes(&[6]));
            assert_eq!(visitor.leaf_count(NodeId::new(6)), Ok(2));
        }
    }

    #[test]
    fn test_preserved_leaf_counts() {
        let tables = two_trees();
        let samples = nodes(&[0, 1]);
        let preserved = nodes(&[3]);
        let options = TreeVisitorOptions::default().with_leaf_counts();
        let mut visitor =
            TreeVisitor::with_preserved_nodes(&tables, &samples, &preserved, options).unwrap();
        assert!(visitor.advance());
        assert_eq!(visitor.preserved_leaf_count(NodeId::new(5)), Ok(1));
        assert_eq!(visitor.preserved_leaf_count(NodeId::new(4)), Ok(0));
        assert_eq!(visitor.leaf_count(NodeId::new(5)), Ok(0));
        assert!(visitor.advance());
        assert_eq!(visitor.preserved_leaf_count(NodeId::new(5)), Ok(0));
        assert_eq!(visitor.preserved_leaf_count(NodeId::new(4)), Ok(1));
        assert_eq!(visitor.preserved_leaf_count(NodeId::new(6)), Ok(1));
    }

    // Without any edges, each sample is its own root.
    #[test]
    fn test_no_edges() {
        let mut tables = TableCollection::with_initial_nodes(3, 0.0, DemeId::new(0), 1.0).unwrap();
        tables.build_indexes();
        let samples = nodes(&[0, 1, 2]);
        let mut visitor = TreeVisitor::new(&tables, &samples, TreeVisitorOptions::default()).unwrap();
        assert!(visitor.advance());
        assert_eq!(visitor.roots().collect::<Vec<_>>(), samples);
        assert_eq!(visitor.span(), 1.0);
        assert!(!visitor.advance());
    }

    #[test]
    fn test_streaming_iterator() {
        let tables = two_trees();
        let samples = nodes(&[0, 1, 2, 3]);
        let mut visitor = TreeVisitor::new(&tables, &samples, TreeVisitorOptions::default()).unwrap();
        let mut spans = vec![];
        while let Some(tree) = StreamingIterator::next(&mut visitor) {
            spans.push((tree.left(), tree.right()));
        }
        assert_eq!(spans, vec![(0.0, 5.0), (5.0, 10.0)]);
        assert_eq!(tables.count_trees(), Ok(2));
    }

    // Node times are 0, 1 and 3.
    //
    //   0        [0, 1)
    //  / \
    // 1   |
    //     2
    //
    //   0   2    [1, 4)
    //   |
    //   1
    #[test]
    fn test_total_branch_length() {
        let mut tables = TableCollection::new(4.0).unwrap();
        for t in [0.0, 1.0, 3.0] {
            tables.emplace_back_node(DemeId::new(0), t).unwrap();
        }
        tables.add_edge(0.0, 4.0, NodeId::new(0), NodeId::new(1)).unwrap();
        tables.add_edge(0.0, 1.0, NodeId::new(0), NodeId::new(2)).unwrap();
        tables.sort_edges();
        tables.build_indexes();
        let samples = nodes(&[1, 2]);
        let mut visitor =
            TreeVisitor::new(&tables, &samples, TreeVisitorOptions::default()).unwrap();
        let mut lengths = vec![];
        while visitor.advance() {
            lengths.push((
                visitor.total_branch_length(false),
                visitor.total_branch_length(true),
            ));
        }
        assert_eq!(lengths, vec![(4.0, 4.0), (1.0, 3.0)]);
    }

    #[test]
    fn test_total_branch_length_two_trees() {
        let tables = two_trees();
        let samples = nodes(&[0, 1, 2, 3]);
        let mut visitor =
            TreeVisitor::new(&tables, &samples, TreeVisitorOptions::default()).unwrap();
        while visitor.advance() {
            assert_eq!(visitor.total_branch_length(false), 6.0);
            assert_eq!(visitor.total_branch_length(true), 30.0);
        }
    }
}
