//! Node, edge, site, and mutation tables.

use std::cmp::Ordering;

use crate::breakpoints::{split_breakpoints, validate_breakpoints, ParentalNode};
use crate::edge_buffer::{BirthData, EdgeBuffer};
use crate::flags::NodeFlags;
use crate::newtypes::{DemeId, EdgeId, MutationId, NodeId, SiteId};

/// A genome at a point in (forward) time.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub time: f64,
    pub deme: DemeId,
    pub flags: NodeFlags,
}

/// `child` inherited `[left, right)` from `parent`.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub left: f64,
    pub right: f64,
    pub parent: NodeId,
    pub child: NodeId,
}

impl Edge {
    pub fn overlaps(&self, left: f64, right: f64) -> bool {
        self.right > left && right > self.left
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Site {
    pub position: f64,
    pub ancestral_state: i8,
}

/// A mutation on the branch above `node`.
///
/// `key` is opaque to this crate.  It usually
/// indexes the simulation's own mutation container
/// and is what simplification reports back in
/// [`crate::SimplificationOutput::preserved_mutations`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MutationRecord {
    pub node: NodeId,
    pub site: SiteId,
    pub derived_state: i8,
    pub key: usize,
    pub neutral: bool,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TablesError {
    #[error("genome length must be finite and > 0, got {0}")]
    InvalidGenomeLength(f64),
    #[error("invalid interval [{left}, {right})")]
    InvalidInterval { left: f64, right: f64 },
    #[error("node {0} is out of range")]
    NodeOutOfRange(NodeId),
    #[error("site {0} is out of range")]
    SiteOutOfRange(SiteId),
    #[error("position {0} is not in [0, genome length)")]
    InvalidPosition(f64),
    #[error("time {0} is not finite")]
    InvalidTime(f64),
    #[error("parent {parent} is not older than child {child}")]
    InvalidParentTime { parent: NodeId, child: NodeId },
    #[error("the node table is full")]
    NodeTableFull,
    #[error("breakpoints must end with exactly one sentinel value")]
    MissingBreakpointSentinel,
    #[error("breakpoints must be sorted")]
    UnsortedBreakpoints,
    #[error("breakpoint {0} is not in [0, genome length)")]
    BreakpointOutOfRange(f64),
    #[error("crossover rate must be finite and >= 0, got {0}")]
    InvalidCrossoverRate(f64),
    #[error("edge offset {0} is larger than the edge table")]
    InvalidEdgeOffset(usize),
    #[error("tables are not indexed")]
    TablesNotIndexed,
}

/// Ordering of the edge table required by simplification.
///
/// Parents are ordered from youngest to oldest
/// (descending forward time), then by id.  The
/// edges of a parent are ordered by child, then left.
pub(crate) fn canonical_edge_order(nodes: &[Node], a: &Edge, b: &Edge) -> Ordering {
    let ta = nodes[a.parent.as_index()].time;
    let tb = nodes[b.parent.as_index()].time;
    tb.total_cmp(&ta)
        .then_with(|| a.parent.cmp(&b.parent))
        .then_with(|| a.child.cmp(&b.child))
        .then_with(|| a.left.total_cmp(&b.left))
}

/// Owns the tables and the two edge indexes.
///
/// All rows refer to each other by integer ids,
/// which index into the corresponding table.
#[derive(Debug, Clone)]
pub struct TableCollection {
    pub(crate) genome_length: f64,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) sites: Vec<Site>,
    pub(crate) mutations: Vec<MutationRecord>,
    pub(crate) input_left: Vec<EdgeId>,
    pub(crate) output_right: Vec<EdgeId>,
    pub(crate) edge_offset: usize,
}

impl TableCollection {
    /// # Errors
    ///
    /// [`TablesError::InvalidGenomeLength`] unless `genome_length`
    /// is finite and positive.
    pub fn new(genome_length: f64) -> Result<Self, TablesError> {
        if !genome_length.is_finite() || genome_length <= 0.0 {
            return Err(TablesError::InvalidGenomeLength(genome_length));
        }
        Ok(Self {
            genome_length,
            nodes: vec![],
            edges: vec![],
            sites: vec![],
            mutations: vec![],
            input_left: vec![],
            output_right: vec![],
            edge_offset: 0,
        })
    }

    /// Create tables holding `num_nodes` nodes at `time`, all in `deme`.
    pub fn with_initial_nodes(
        num_nodes: usize,
        time: f64,
        deme: DemeId,
        genome_length: f64,
    ) -> Result<Self, TablesError> {
        let mut tables = Self::new(genome_length)?;
        tables.nodes.reserve(num_nodes);
        for _ in 0..num_nodes {
            tables.emplace_back_node(deme, time)?;
        }
        Ok(tables)
    }

    pub fn genome_length(&self) -> f64 {
        self.genome_length
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn mutations(&self) -> &[MutationRecord] {
        &self.mutations
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn num_mutations(&self) -> usize {
        self.mutations.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(usize::try_from(id.raw()).ok()?)
    }

    /// Length of the edge table after the last simplification.
    pub fn edge_offset(&self) -> usize {
        self.edge_offset
    }

    pub(crate) fn node_in_range(&self, id: NodeId) -> bool {
        id.raw() >= 0 && (id.raw() as usize) < self.nodes.len()
    }

    pub(crate) fn check_node(&self, id: NodeId) -> Result<(), TablesError> {
        if self.node_in_range(id) {
            Ok(())
        } else {
            Err(TablesError::NodeOutOfRange(id))
        }
    }

    /// Add a node with no flags.
    pub fn emplace_back_node(&mut self, deme: DemeId, time: f64) -> Result<NodeId, TablesError> {
        self.add_node(time, deme, NodeFlags::default())
    }

    pub fn add_node(
        &mut self,
        time: f64,
        deme: DemeId,
        flags: NodeFlags,
    ) -> Result<NodeId, TablesError> {
        if !time.is_finite() {
            return Err(TablesError::InvalidTime(time));
        }
        if self.nodes.len() >= i32::MAX as usize {
            return Err(TablesError::NodeTableFull);
        }
        self.nodes.push(Node { time, deme, flags });
        Ok(NodeId::from_index(self.nodes.len() - 1))
    }

    /// Add an edge, checking every invariant of the edge table.
    pub fn add_edge(
        &mut self,
        left: f64,
        right: f64,
        parent: NodeId,
        child: NodeId,
    ) -> Result<EdgeId, TablesError> {
        if !(left >= 0.0 && right > left && right <= self.genome_length) {
            return Err(TablesError::InvalidInterval { left, right });
        }
        self.check_node(parent)?;
        self.check_node(child)?;
        if self.nodes[parent.as_index()].time >= self.nodes[child.as_index()].time {
            return Err(TablesError::InvalidParentTime { parent, child });
        }
        Ok(self.push_back_edge(left, right, parent, child))
    }

    // Only debug builds check the invariants here.
    pub(crate) fn push_back_edge(
        &mut self,
        left: f64,
        right: f64,
        parent: NodeId,
        child: NodeId,
    ) -> EdgeId {
        debug_assert!(right > left);
        debug_assert!(
            self.nodes[parent.as_index()].time < self.nodes[child.as_index()].time,
            "parent {parent} is not older than child {child}"
        );
        self.edges.push(Edge {
            left,
            right,
            parent,
            child,
        });
        EdgeId::from_index(self.edges.len() - 1)
    }

    pub fn add_site(&mut self, position: f64, ancestral_state: i8) -> Result<SiteId, TablesError> {
        if !(0.0..self.genome_length).contains(&position) {
            return Err(TablesError::InvalidPosition(position));
        }
        self.sites.push(Site {
            position,
            ancestral_state,
        });
        Ok(SiteId::from_index(self.sites.len() - 1))
    }

    pub fn add_mutation(
        &mut self,
        node: NodeId,
        site: SiteId,
        derived_state: i8,
        key: usize,
        neutral: bool,
    ) -> Result<MutationId, TablesError> {
        self.check_node(node)?;
        if site.raw() < 0 || site.as_index() >= self.sites.len() {
            return Err(TablesError::SiteOutOfRange(site));
        }
        self.mutations.push(MutationRecord {
            node,
            site,
            derived_state,
            key,
            neutral,
        });
        Ok(MutationId::from_index(self.mutations.len() - 1))
    }

    fn prepare_offspring_node(
        &mut self,
        breakpoints: &[f64],
        parents: (NodeId, NodeId),
        deme: DemeId,
        birth_time: f64,
    ) -> Result<NodeId, TablesError> {
        validate_breakpoints(breakpoints, self.genome_length)?;
        self.check_node(parents.0)?;
        self.check_node(parents.1)?;
        self.emplace_back_node(deme, birth_time)
    }

    /// Record the birth of one offspring node.
    ///
    /// Each interval defined by `breakpoints` becomes an edge
    /// from `parents.0` or `parents.1`, alternating and starting
    /// with `parents.0`.  A diploid birth calls this twice, once
    /// per parent.  The edges are appended unsorted.
    ///
    /// # Errors
    ///
    /// Malformed `breakpoints` or out-of-range parents.
    /// The tables are not changed in that case.
    ///
    /// # Panics
    ///
    /// In debug builds, if a parent is not older than `birth_time`.
    pub fn register_diploid_offspring(
        &mut self,
        breakpoints: &[f64],
        parents: (NodeId, NodeId),
        deme: DemeId,
        birth_time: f64,
    ) -> Result<NodeId, TablesError> {
        let child = self.prepare_offspring_node(breakpoints, parents, deme, birth_time)?;
        split_breakpoints(breakpoints, self.genome_length, |left, right, which| {
            let parent = match which {
                ParentalNode::First => parents.0,
                ParentalNode::Second => parents.1,
            };
            self.push_back_edge(left, right, parent, child);
        });
        Ok(child)
    }

    /// As [`TableCollection::register_diploid_offspring`], but the
    /// edges are recorded in `buffer` rather than the edge table.
    pub fn register_diploid_offspring_buffered(
        &mut self,
        breakpoints: &[f64],
        parents: (NodeId, NodeId),
        deme: DemeId,
        birth_time: f64,
        buffer: &mut EdgeBuffer,
    ) -> Result<NodeId, TablesError> {
        let child = self.prepare_offspring_node(breakpoints, parents, deme, birth_time)?;
        let nodes = &self.nodes;
        split_breakpoints(breakpoints, self.genome_length, |left, right, which| {
            let parent = match which {
                ParentalNode::First => parents.0,
                ParentalNode::Second => parents.1,
            };
            debug_assert!(
                nodes[parent.as_index()].time < nodes[child.as_index()].time,
                "parent {parent} is not older than child {child}"
            );
            buffer.extend(parent.as_index(), BirthData { left, right, child });
        });
        Ok(child)
    }

    /// Sort the entire edge table.
    ///
    /// Edge ids change, so the indexes are cleared.
    pub fn sort_edges(&mut self) {
        self.clear_indexes();
        let nodes = &self.nodes;
        self.edges
            .sort_unstable_by(|a, b| canonical_edge_order(nodes, a, b));
    }

    /// Sort the edges added after `offset`, then merge them
    /// with the (already sorted) first `offset` edges.
    ///
    /// # Errors
    ///
    /// [`TablesError::InvalidEdgeOffset`] if `offset` is larger
    /// than the edge table.
    pub fn sort_edges_from(&mut self, offset: usize) -> Result<(), TablesError> {
        if offset > self.edges.len() {
            return Err(TablesError::InvalidEdgeOffset(offset));
        }
        if offset == 0 {
            self.sort_edges();
            return Ok(());
        }
        self.clear_indexes();
        let nodes = &self.nodes;
        self.edges[offset..].sort_unstable_by(|a, b| canonical_edge_order(nodes, a, b));
        debug_assert!(self.edges[..offset]
            .windows(2)
            .all(|w| canonical_edge_order(nodes, &w[0], &w[1]) != Ordering::Greater));

        let (old, new) = self.edges.split_at(offset);
        // Typically, every new parent is younger than every old one.
        if new.last().map_or(true, |last| {
            old.first()
                .map_or(true, |first| canonical_edge_order(nodes, last, first) == Ordering::Less)
        }) {
            self.edges.rotate_left(offset);
            return Ok(());
        }
        let mut merged = Vec::with_capacity(self.edges.len());
        let (mut i, mut j) = (0, 0);
        while i < old.len() && j < new.len() {
            if canonical_edge_order(nodes, &new[j], &old[i]) == Ordering::Less {
                merged.push(new[j]);
                j += 1;
            } else {
                merged.push(old[i]);
                i += 1;
            }
        }
        merged.extend_from_slice(&old[i..]);
        merged.extend_from_slice(&new[j..]);
        self.edges = merged;
        Ok(())
    }

    /// Sort mutations by site position.
    pub fn sort_mutations(&mut self) {
        let sites = &self.sites;
        self.mutations.sort_by(|a, b| {
            sites[a.site.as_index()]
                .position
                .total_cmp(&sites[b.site.as_index()].position)
        });
    }

    /// Sort the edges added since the last simplification
    /// and the mutation table.
    pub fn sort_tables_for_simplification(&mut self) -> Result<(), TablesError> {
        self.sort_edges_from(self.edge_offset)?;
        self.sort_mutations();
        Ok(())
    }

    /// Rebuild the site table so that each position
    /// appears once, in the order of the mutation table.
    /// Sites without mutations are removed.
    pub fn rebuild_site_table(&mut self) {
        let old_sites = std::mem::take(&mut self.sites);
        for m in self.mutations.iter_mut() {
            let site = old_sites[m.site.as_index()];
            if self.sites.last().map_or(true, |s| s.position != site.position) {
                self.sites.push(site);
            }
            m.site = SiteId::from_index(self.sites.len() - 1);
        }
    }

    /// Remove the nodes born at or before `time`, along with
    /// their edges and mutations.
    ///
    /// The remaining nodes keep their order and are renumbered.
    /// The returned vector maps each old node id to its new id,
    /// or to [`NodeId::NULL`] for a removed node.  Sites are
    /// rebuilt and the edge indexes are rebuilt.
    pub fn decapitate(&mut self, time: f64) -> Vec<NodeId> {
        let mut num_kept = 0;
        let idmap = self
            .nodes
            .iter()
            .map(|n| {
                if n.time > time {
                    num_kept += 1;
                    NodeId::from_index(num_kept - 1)
                } else {
                    NodeId::NULL
                }
            })
            .collect::<Vec<_>>();
        self.nodes.retain(|n| n.time > time);

        let old_offset = self.edge_offset;
        let mut new_offset = 0;
        let mut index = 0;
        self.edges.retain_mut(|e| {
            let (parent, child) = (idmap[e.parent.as_index()], idmap[e.child.as_index()]);
            let keep = !parent.is_null() && !child.is_null();
            if keep {
                e.parent = parent;
                e.child = child;
                if index < old_offset {
                    new_offset += 1;
                }
            }
            index += 1;
            keep
        });
        self.edge_offset = new_offset;

        self.mutations.retain_mut(|m| {
            m.node = idmap[m.node.as_index()];
            !m.node.is_null()
        });
        self.rebuild_site_table();
        self.build_indexes();
        idmap
    }

    pub fn sort_mutations_and_rebuild_site_table(&mut self) {
        self.sort_mutations();
        self.rebuild_site_table();
    }

    /// `true` if edges are in the order given by
    /// [`TableCollection::sort_edges`].
    pub fn edges_are_sorted(&self) -> bool {
        self.edges
            .windows(2)
            .all(|w| canonical_edge_order(&self.nodes, &w[0], &w[1]) == Ordering::Less)
    }

    /// `true` if the edge table meets the weaker requirements
    /// of simplification: parent times never increase, all edges
    /// of a parent are contiguous, and within a parent edges are
    /// ordered by child then left.
    pub fn edges_are_minimally_sorted(&self) -> bool {
        let mut seen_parent = vec![false; self.nodes.len()];
        if let Some(first) = self.edges.first() {
            seen_parent[first.parent.as_index()] = true;
        }
        for w in self.edges.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            let ta = self.nodes[a.parent.as_index()].time;
            let tb = self.nodes[b.parent.as_index()].time;
            if tb > ta {
                return false;
            }
            if a.parent == b.parent {
                if (b.child, b.left) <= (a.child, a.left) {
                    return false;
                }
            } else {
                if seen_parent[b.parent.as_index()] {
                    return false;
                }
                seen_parent[b.parent.as_index()] = true;
            }
        }
        true
    }

    /// `true` if mutations are sorted by site position.
    pub fn mutations_are_sorted(&self) -> bool {
        self.mutations.windows(2).all(|w| {
            self.sites[w[0].site.as_index()].position <= self.sites[w[1].site.as_index()].position
        })
    }

    /// Count the marginal trees.
    ///
    /// # Errors
    ///
    /// [`TablesError::TablesNotIndexed`] if the indexes are out of date.
    pub fn count_trees(&self) -> Result<usize, TablesError> {
        if !self.is_indexed() {
            return Err(TablesError::TablesNotIndexed);
        }
        let mut num_trees = 0;
        let mut input = self.input_left.iter().peekable();
        let mut output = self.output_right.iter().peekable();
        let mut tree_left = 0.0;
        while input.peek().is_some() || tree_left < self.genome_length {
            while output
                .next_if(|&&e| self.edges[e.as_index()].right == tree_left)
                .is_some()
            {}
            while input
                .next_if(|&&e| self.edges[e.as_index()].left == tree_left)
                .is_some()
            {}
            let mut tree_right = self.genome_length;
            if let Some(&&e) = input.peek() {
                tree_right = tree_right.min(self.edges[e.as_index()].left);
            }
            if let Some(&&e) = output.peek() {
                tree_right = tree_right.min(self.edges[e.as_index()].right);
            }
            tree_left = tree_right;
            num_trees += 1;
        }
        Ok(num_trees)
    }

    /// Returns the previous node and edge tables.
    pub(crate) fn replace_nodes_and_edges(
        &mut self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> (Vec<Node>, Vec<Edge>) {
        let old_nodes = std::mem::replace(&mut self.nodes, nodes);
        let old_edges = std::mem::replace(&mut self.edges, edges);
        self.edge_offset = self.edges.len();
        self.clear_indexes();
        (old_nodes, old_edges)
    }

    pub(crate) fn replace_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
        self.clear_indexes();
    }

    fn clear_indexes(&mut self) {
        self.input_left.clear();
        self.output_right.clear();
    }
}

/// Two collections are equal if their genome lengths
/// and all four tables are equal.  Indexes and the edge
/// offset are not compared.
impl PartialEq for TableCollection {
    fn eq(&self, other: &Self) -> bool {
        self.genome_length == other.genome_length
            && self.nodes == other.nodes
            && self.edges == other.edges
            && self.sites == other.sites
            && self.mutations == other.mutations
    }
}

#[cfg(test)]
mod test_table_collection {
    use super::*;
    use crate::breakpoints::BREAKPOINT_SENTINEL;

    fn two_parents() -> TableCollection {
        TableCollection::with_initial_nodes(2, 0.0, DemeId::new(0), 10.0).unwrap()
    }

    #[test]
    fn test_bad_genome_length() {
        for l in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            assert!(TableCollection::new(l).is_err());
        }
    }

    #[test]
    fn test_add_edge_errors() {
        let mut tables = two_parents();
        let c = tables.emplace_back_node(DemeId::new(0), 1.0).unwrap();
        assert!(matches!(
            tables.add_edge(1.0, 1.0, NodeId::new(0), c),
            Err(TablesError::InvalidInterval { .. })
        ));
        assert!(matches!(
            tables.add_edge(0.0, 11.0, NodeId::new(0), c),
            Err(TablesError::InvalidInterval { .. })
        ));
        assert_eq!(
            tables.add_edge(0.0, 1.0, NodeId::new(7), c),
            Err(TablesError::NodeOutOfRange(NodeId::new(7)))
        );
        assert_eq!(
            tables.add_edge(0.0, 1.0, NodeId::new(0), NodeId::new(1)),
            Err(TablesError::InvalidParentTime {
                parent: NodeId::new(0),
                child: NodeId::new(1)
            })
        );
        assert!(tables.add_edge(0.0, 1.0, NodeId::new(0), c).is_ok());
        assert_eq!(tables.num_edges(), 1);
    }

    #[test]
    fn test_register_without_recombination() {
        let mut tables = two_parents();
        let c = tables
            .register_diploid_offspring(&[], (NodeId::new(1), NodeId::new(0)), DemeId::new(0), 1.0)
            .unwrap();
        assert_eq!(c, 2);
        assert_eq!(
            tables.edges(),
            &[Edge {
                left: 0.0,
                right: 10.0,
                parent: NodeId::new(1),
                child: c
            }]
        );
    }

    #[test]
    fn test_register_with_recombination() {
        let mut tables = two_parents();
        let c = tables
            .register_diploid_offspring(
                &[2.0, 5.0, BREAKPOINT_SENTINEL],
                (NodeId::new(0), NodeId::new(1)),
                DemeId::new(0),
                1.0,
            )
            .unwrap();
        let parents = tables.edges().iter().map(|e| e.parent).collect::<Vec<_>>();
        assert_eq!(parents, vec![NodeId::new(0), NodeId::new(1), NodeId::new(0)]);
        let intervals = tables
            .edges()
            .iter()
            .map(|e| (e.left, e.right))
            .collect::<Vec<_>>();
        assert_eq!(intervals, vec![(0.0, 2.0), (2.0, 5.0), (5.0, 10.0)]);
        assert!(tables.edges().iter().all(|e| e.child == c));
    }

    #[test]
    fn test_bad_breakpoints_leave_tables_unchanged() {
        let mut tables = two_parents();
        let before = tables.clone();
        assert!(tables
            .register_diploid_offspring(
                &[5.0, 2.0, BREAKPOINT_SENTINEL],
                (NodeId::new(0), NodeId::new(1)),
                DemeId::new(0),
                1.0,
            )
            .is_err());
        assert!(tables
            .register_diploid_offspring(
                &[2.0],
                (NodeId::new(0), NodeId::new(1)),
                DemeId::new(0),
                1.0,
            )
            .is_err());
        assert!(tables
            .register_diploid_offspring(
                &[],
                (NodeId::new(0), NodeId::new(2)),
                DemeId::new(0),
                1.0,
            )
            .is_err());
        assert_eq!(tables, before);
    }

    #[test]
    fn test_buffered_registration() {
        let mut tables = two_parents();
        let mut buffer = EdgeBuffer::default();
        let c = tables
            .register_diploid_offspring_buffered(
                &[2.0, BREAKPOINT_SENTINEL],
                (NodeId::new(0), NodeId::new(1)),
                DemeId::new(0),
                1.0,
                &mut buffer,
            )
            .unwrap();
        assert_eq!(tables.num_edges(), 0);
        let from_0 = buffer.iter_list(0).copied().collect::<Vec<_>>();
        let from_1 = buffer.iter_list(1).copied().collect::<Vec<_>>();
        assert_eq!(
            from_0,
            vec![BirthData {
                left: 0.0,
                right: 2.0,
                child: c
            }]
        );
        assert_eq!(
            from_1,
            vec![BirthData {
                left: 2.0,
                right: 10.0,
                child: c
            }]
        );
    }

    #[test]
    fn test_sort_edges_and_offset() {
        let mut tables = two_parents();
        // generation 1
        for _ in 0..2 {
            tables
                .register_diploid_offspring(&[], (NodeId::new(1), NodeId::new(0)), DemeId::new(0), 1.0)
                .unwrap();
        }
        tables.sort_edges();
        assert!(tables.edges_are_sorted());
        assert!(tables.edges_are_minimally_sorted());
        let offset = tables.num_edges();
        // generation 2
        tables
            .register_diploid_offspring(&[], (NodeId::new(2), NodeId::new(3)), DemeId::new(0), 2.0)
            .unwrap();
        tables
            .register_diploid_offspring(&[], (NodeId::new(3), NodeId::new(2)), DemeId::new(0), 2.0)
            .unwrap();
        assert!(!tables.edges_are_minimally_sorted());
        tables.sort_edges_from(offset).unwrap();
        assert!(tables.edges_are_sorted());
        assert_eq!(tables.edges()[0].parent, 2);
        assert_eq!(tables.edges()[0].child, 4);
        assert_eq!(tables.edges()[1].parent, 3);
        assert_eq!(tables.edges()[2].parent, 1);
        assert!(tables.sort_edges_from(100).is_err());
    }

    #[test]
    fn test_sort_edges_from_merges_interleaved_parents() {
        let mut tables = TableCollection::new(1.0).unwrap();
        for t in [0.0, 1.0, 2.0, 2.0, 3.0] {
            tables.emplace_back_node(DemeId::new(0), t).unwrap();
        }
        // node 1 already has a child (2), then has another (3)
        tables.add_edge(0.0, 1.0, NodeId::new(0), NodeId::new(1)).unwrap();
        tables.add_edge(0.0, 1.0, NodeId::new(1), NodeId::new(2)).unwrap();
        tables.sort_edges();
        let offset = tables.num_edges();
        tables.add_edge(0.0, 1.0, NodeId::new(1), NodeId::new(3)).unwrap();
        tables.add_edge(0.0, 1.0, NodeId::new(3), NodeId::new(4)).unwrap();
        tables.sort_edges_from(offset).unwrap();
        assert!(tables.edges_are_sorted());
        let pc = tables
            .edges()
            .iter()
            .map(|e| (e.parent.raw(), e.child.raw()))
            .collect::<Vec<_>>();
        assert_eq!(pc, vec![(3, 4), (1, 2), (1, 3), (0, 1)]);
    }

    #[test]
    fn test_minimal_sort_detects_split_parent() {
        let mut tables = TableCollection::new(1.0).unwrap();
        for t in [0.0, 0.0, 1.0, 1.0] {
            tables.emplace_back_node(DemeId::new(0), t).unwrap();
        }
        tables.add_edge(0.0, 1.0, NodeId::new(0), NodeId::new(2)).unwrap();
        tables.add_edge(0.0, 0.5, NodeId::new(1), NodeId::new(3)).unwrap();
        tables.add_edge(0.5, 1.0, NodeId::new(0), NodeId::new(3)).unwrap();
        assert!(!tables.edges_are_minimally_sorted());
        tables.sort_edges();
        assert!(tables.edges_are_minimally_sorted());
    }

    #[test]
    fn test_sort_mutations_and_rebuild_sites() {
        let mut tables = two_parents();
        let s0 = tables.add_site(5.0, 0).unwrap();
        let s1 = tables.add_site(1.0, 0).unwrap();
        let s2 = tables.add_site(5.0, 0).unwrap();
        let _unused = tables.add_site(7.0, 0).unwrap();
        tables.add_mutation(NodeId::new(0), s0, 1, 10, true).unwrap();
        tables.add_mutation(NodeId::new(1), s1, 1, 11, true).unwrap();
        tables.add_mutation(NodeId::new(1), s2, 1, 12, false).unwrap();
        assert!(!tables.mutations_are_sorted());
        tables.sort_mutations_and_rebuild_site_table();
        assert!(tables.mutations_are_sorted());
        assert_eq!(tables.num_sites(), 2);
        let keys = tables.mutations().iter().map(|m| m.key).collect::<Vec<_>>();
        assert_eq!(keys, vec![11, 10, 12]);
        let sites = tables
            .mutations()
            .iter()
            .map(|m| m.site.raw())
            .collect::<Vec<_>>();
        assert_eq!(sites, vec![0, 1, 1]);
        assert!(tables.add_site(10.0, 0).is_err());
        assert!(tables.add_mutation(NodeId::new(0), SiteId::new(9), 1, 0, true).is_err());
    }

    #[test]
    fn test_equality_ignores_indexes() {
        let mut a = two_parents();
        let c = a.emplace_back_node(DemeId::new(0), 1.0).unwrap();
        a.add_edge(0.0, 10.0, NodeId::new(0), c).unwrap();
        let mut b = a.clone();
        b.build_indexes();
        assert_eq!(a, b);
        b.add_site(1.0, 0).unwrap();
        assert_ne!(a, b);
    }

    //     0
    //    / \
    //   1   2
    //   |   |
    //   3   4
    #[test]
    fn test_decapitate() {
        let mut tables = TableCollection::new(1.0).unwrap();
        for t in [0.0, 1.0, 1.0, 2.0, 2.0] {
            tables.emplace_back_node(DemeId::new(0), t).unwrap();
        }
        for (p, c) in [(0, 1), (0, 2), (1, 3), (2, 4)] {
            tables
                .add_edge(0.0, 1.0, NodeId::new(p), NodeId::new(c))
                .unwrap();
        }
        for (node, position) in [(0, 0.1), (1, 0.2), (3, 0.3)] {
            let site = tables.add_site(position, 0).unwrap();
            tables.add_mutation(NodeId::new(node), site, 1, node as usize, true).unwrap();
        }
        tables.sort_edges();
        // Only the first edge, 1 -> 3, predates the last simplification.
        tables.edge_offset = 1;

        let idmap = tables.decapitate(0.0);
        assert_eq!(
            idmap,
            [-1, 0, 1, 2, 3].map(NodeId::new).to_vec()
        );
        assert_eq!(tables.num_nodes(), 4);
        let edges = tables
            .edges()
            .iter()
            .map(|e| (e.parent.raw(), e.child.raw()))
            .collect::<Vec<_>>();
        assert_eq!(edges, vec![(0, 2), (1, 3)]);
        assert!(tables.edges_are_sorted());
        assert_eq!(tables.edge_offset(), 1);
        let mutations = tables
            .mutations()
            .iter()
            .map(|m| (m.node.raw(), m.key))
            .collect::<Vec<_>>();
        assert_eq!(mutations, vec![(0, 1), (2, 3)]);
        assert_eq!(
            tables.sites().iter().map(|s| s.position).collect::<Vec<_>>(),
            vec![0.2, 0.3]
        );
        assert!(tables.is_indexed());
        assert_eq!(tables.count_trees(), Ok(1));

        let idmap = tables.decapitate(1.0);
        assert_eq!(idmap, [-1, -1, 0, 1].map(NodeId::new).to_vec());
        assert_eq!(tables.num_edges(), 0);
        assert_eq!(tables.num_mutations(), 1);
        assert_eq!(tables.mutations()[0].site, SiteId::new(0));
    }
}
