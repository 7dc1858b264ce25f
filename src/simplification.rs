//! Simplification of tables with respect to a set of samples.
//!
//! This is the algorithm of Kelleher et al. (2018),
//! *Efficient pedigree recording for fast population
//! genetics simulation*, working from the youngest
//! parents to the oldest.

use std::cmp::Ordering;

use crate::edge_buffer::{buffered_parents, parent_order, EdgeBuffer, EdgeBufferError};
use crate::flags::SimplificationOptions;
use crate::nested_forward_list::NestedForwardList;
use crate::newtypes::{NodeHash, NodeId};
use crate::overlapper::{Segment, SegmentOverlapper};
use crate::tables::{Edge, Node, TableCollection};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SimplificationError {
    #[error("the sample list is empty")]
    EmptySamples,
    #[error("sample {0} is out of range")]
    SampleOutOfRange(NodeId),
    #[error("sample {0} appears more than once")]
    DuplicateSample(NodeId),
    #[error("edges are not sorted")]
    EdgesNotSorted,
    #[error("mutations are not sorted by position")]
    MutationsNotSorted,
    /// A node the caller considers alive is not ancestral
    /// to any sample.  This is a bug in the caller.
    #[error("node {0} has no output node")]
    AliveNodeLost(NodeId),
    #[error(transparent)]
    EdgeBuffer(#[from] EdgeBufferError),
}

/// Result of a simplification.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimplificationOutput {
    /// Output node for each input node, or [`NodeId::NULL`].
    pub idmap: Vec<NodeId>,
    /// [`crate::MutationRecord::key`] of each mutation that
    /// is still in the tables, in mutation table order.
    pub preserved_mutations: Vec<usize>,
}

impl SimplificationOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.idmap.clear();
        self.preserved_mutations.clear();
    }

    /// Replace each node in `nodes` by its output node.
    ///
    /// # Errors
    ///
    /// [`SimplificationError::AliveNodeLost`] if any node maps
    /// to [`NodeId::NULL`].  `nodes` is unchanged in that case.
    pub fn remap(&self, nodes: &mut [NodeId]) -> Result<(), SimplificationError> {
        if let Some(&lost) = nodes.iter().find(|n| {
            usize::try_from(n.raw())
                .ok()
                .and_then(|i| self.idmap.get(i))
                .map_or(true, |output| output.is_null())
        }) {
            return Err(SimplificationError::AliveNodeLost(lost));
        }
        for n in nodes.iter_mut() {
            *n = self.idmap[n.as_index()];
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone)]
struct MutationNodeMapEntry {
    node: NodeId,
    position: f64,
    location: usize,
}

/// Memory reused from one simplification to the next.
#[derive(Debug, Default)]
pub struct SimplificationBuffers {
    ancestry: NestedForwardList<Segment>,
    overlapper: SegmentOverlapper,
    new_nodes: Vec<Node>,
    new_edges: Vec<Edge>,
    // Output edges of the current parent, keyed by output child.
    child_segments: NestedForwardList<Segment>,
    buffered_children: Vec<NodeId>,
    mutation_map: Vec<MutationNodeMapEntry>,
}

impl SimplificationBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear(&mut self) {
        self.new_nodes.clear();
        self.new_edges.clear();
        self.child_segments.clear();
        self.buffered_children.clear();
        self.mutation_map.clear();
        self.overlapper.clear_queue();
    }
}

fn validate_samples(samples: &[NodeId], num_nodes: usize) -> Result<(), SimplificationError> {
    if samples.is_empty() {
        return Err(SimplificationError::EmptySamples);
    }
    let mut seen = NodeHash::default();
    for &s in samples {
        if s.raw() < 0 || s.as_index() >= num_nodes {
            return Err(SimplificationError::SampleOutOfRange(s));
        }
        if !seen.insert(s.as_index()) {
            return Err(SimplificationError::DuplicateSample(s));
        }
    }
    Ok(())
}

fn add_ancestry(
    ancestry: &mut NestedForwardList<Segment>,
    input_id: NodeId,
    left: f64,
    right: f64,
    node: NodeId,
) {
    let key = input_id.as_index();
    let tail = ancestry.tail(key);
    if !tail.is_null() {
        let last = ancestry.fetch_mut(tail);
        if last.right == left && last.node == node {
            last.right = right;
            return;
        }
    }
    ancestry.extend(key, Segment { left, right, node });
}

// Extends the last edge to `child` if the two are contiguous.
fn buffer_edge(
    child_segments: &mut NestedForwardList<Segment>,
    buffered_children: &mut Vec<NodeId>,
    left: f64,
    right: f64,
    child: NodeId,
) {
    let key = child.as_index();
    let tail = child_segments.tail(key);
    if tail.is_null() {
        buffered_children.push(child);
    } else {
        let last = child_segments.fetch_mut(tail);
        if last.right == left {
            last.right = right;
            return;
        }
    }
    child_segments.extend(
        key,
        Segment {
            left,
            right,
            node: child,
        },
    );
}

// Moves the buffered edges of `parent` to `new_edges`,
// ordered by child and then by position.
fn output_buffered_edges(
    parent: NodeId,
    child_segments: &mut NestedForwardList<Segment>,
    buffered_children: &mut Vec<NodeId>,
    new_edges: &mut Vec<Edge>,
) -> usize {
    let num_edges = new_edges.len();
    buffered_children.sort_unstable();
    for &child in buffered_children.iter() {
        new_edges.extend(
            child_segments
                .iter_list(child.as_index())
                .map(|seg| Edge {
                    left: seg.left,
                    right: seg.right,
                    parent,
                    child,
                }),
        );
    }
    child_segments.clear_lists(buffered_children.iter().map(|c| c.as_index()));
    buffered_children.clear();
    new_edges.len() - num_edges
}

fn queue_children(
    child: NodeId,
    left: f64,
    right: f64,
    ancestry: &NestedForwardList<Segment>,
    overlapper: &mut SegmentOverlapper,
) {
    for seg in ancestry.iter_list(child.as_index()) {
        if seg.right > left && right > seg.left {
            overlapper.enqueue(seg.left.max(left), seg.right.min(right), seg.node);
        }
    }
}

// Queue the child ancestry overlapping the edges of
// `parent` that start at `edges[edge_ptr]`.
fn queue_table_edges(
    edges: &[Edge],
    mut edge_ptr: usize,
    parent: NodeId,
    state: &mut SimplificationBuffers,
) -> usize {
    while edge_ptr < edges.len() && edges[edge_ptr].parent == parent {
        let edge = &edges[edge_ptr];
        queue_children(
            edge.child,
            edge.left,
            edge.right,
            &state.ancestry,
            &mut state.overlapper,
        );
        edge_ptr += 1;
    }
    edge_ptr
}

fn queue_buffered_births(parent: NodeId, buffer: &EdgeBuffer, state: &mut SimplificationBuffers) {
    for birth in buffer.iter_list(parent.as_index()) {
        queue_children(
            birth.child,
            birth.left,
            birth.right,
            &state.ancestry,
            &mut state.overlapper,
        );
    }
}

fn merge_ancestors(
    genome_length: f64,
    input_nodes: &[Node],
    parent: NodeId,
    state: &mut SimplificationBuffers,
    idmap: &mut [NodeId],
) {
    let SimplificationBuffers {
        ancestry,
        overlapper,
        new_nodes,
        new_edges,
        child_segments,
        buffered_children,
        ..
    } = state;

    let mut output_id = idmap[parent.as_index()];
    let is_sample = !output_id.is_null();
    if is_sample {
        ancestry.nullify_list(parent.as_index());
    }
    let mut previous_right = 0.0;
    debug_assert!(buffered_children.is_empty());
    while let Some(overlaps) = overlapper.calculate_next_overlap_set() {
        let ancestry_node = if overlaps.segments.len() == 1 {
            let node = overlaps.segments[0].node;
            if is_sample {
                buffer_edge(
                    child_segments,
                    buffered_children,
                    overlaps.left,
                    overlaps.right,
                    node,
                );
                output_id
            } else {
                node
            }
        } else {
            if output_id.is_null() {
                new_nodes.push(input_nodes[parent.as_index()]);
                output_id = NodeId::from_index(new_nodes.len() - 1);
                idmap[parent.as_index()] = output_id;
            }
            for segment in overlaps.segments {
                buffer_edge(
                    child_segments,
                    buffered_children,
                    overlaps.left,
                    overlaps.right,
                    segment.node,
                );
            }
            output_id
        };
        if is_sample && overlaps.left != previous_right {
            add_ancestry(ancestry, parent, previous_right, overlaps.left, output_id);
        }
        add_ancestry(ancestry, parent, overlaps.left, overlaps.right, ancestry_node);
        previous_right = overlaps.right;
    }
    if is_sample && previous_right != genome_length {
        add_ancestry(ancestry, parent, previous_right, genome_length, output_id);
    }
    if !output_id.is_null() {
        let n = output_buffered_edges(output_id, child_segments, buffered_children, new_edges);
        if n == 0 && !is_sample {
            new_nodes.truncate(output_id.as_index());
            idmap[parent.as_index()] = NodeId::NULL;
        }
    }
}

fn process_table_parent(
    tables: &TableCollection,
    edge_ptr: usize,
    state: &mut SimplificationBuffers,
    idmap: &mut [NodeId],
) -> usize {
    let parent = tables.edges[edge_ptr].parent;
    state.overlapper.clear_queue();
    let edge_ptr = queue_table_edges(&tables.edges, edge_ptr, parent, state);
    state.overlapper.finalize_queue(tables.genome_length);
    merge_ancestors(tables.genome_length, &tables.nodes, parent, state, idmap);
    edge_ptr
}

fn record_sample_nodes(
    samples: &[NodeId],
    tables: &TableCollection,
    state: &mut SimplificationBuffers,
    idmap: &mut [NodeId],
) {
    for &s in samples {
        state.new_nodes.push(tables.nodes[s.as_index()]);
        let output_id = NodeId::from_index(state.new_nodes.len() - 1);
        add_ancestry(&mut state.ancestry, s, 0.0, tables.genome_length, output_id);
        idmap[s.as_index()] = output_id;
    }
}

// Move each mutation to the output node that carries
// its position, dropping those with no such node.
fn simplify_mutations(
    state: &mut SimplificationBuffers,
    tables: &mut TableCollection,
    preserved_mutations: &mut Vec<usize>,
) {
    let SimplificationBuffers {
        ancestry,
        mutation_map,
        ..
    } = state;
    mutation_map.clear();
    mutation_map.extend(
        tables
            .mutations
            .iter()
            .enumerate()
            .map(|(location, m)| MutationNodeMapEntry {
                node: m.node,
                position: tables.sites[m.site.as_index()].position,
                location,
            }),
    );
    mutation_map.sort_unstable_by(|a, b| {
        a.node
            .cmp(&b.node)
            .then_with(|| a.position.total_cmp(&b.position))
            .then_with(|| a.location.cmp(&b.location))
    });

    for m in tables.mutations.iter_mut() {
        m.node = NodeId::NULL;
    }
    for group in mutation_map.chunk_by(|a, b| a.node == b.node) {
        let mut segments = ancestry.iter_list(group[0].node.as_index()).peekable();
        for entry in group {
            while segments.next_if(|seg| entry.position >= seg.right).is_some() {}
            match segments.peek() {
                Some(seg) if seg.left <= entry.position => {
                    tables.mutations[entry.location].node = seg.node;
                }
                Some(_) => (),
                None => break,
            }
        }
    }

    tables.mutations.retain(|m| !m.node.is_null());
    preserved_mutations.clear();
    preserved_mutations.extend(tables.mutations.iter().map(|m| m.key));
    tables.rebuild_site_table();
}

fn finalize(
    state: &mut SimplificationBuffers,
    tables: &mut TableCollection,
    options: SimplificationOptions,
    output: &mut SimplificationOutput,
) {
    debug_assert_eq!(
        output.idmap.iter().filter(|i| !i.is_null()).count(),
        state.new_nodes.len()
    );
    simplify_mutations(state, tables, &mut output.preserved_mutations);
    if options.clear_sample_flags() {
        for node in state.new_nodes.iter_mut() {
            node.flags = node.flags.without_sample();
        }
    }
    let nodes = std::mem::take(&mut state.new_nodes);
    let edges = std::mem::take(&mut state.new_edges);
    let (input_nodes, input_edges) = tables.replace_nodes_and_edges(nodes, edges);
    // Keep the input tables' memory for the next round.
    state.new_nodes = input_nodes;
    state.new_edges = input_edges;
    state.clear();

    // Samples get the first output ids, so parents that share
    // a birth time can come out of order.
    if !tables.edges_are_sorted() {
        tables.sort_edges();
    }
    debug_assert!(tables.edges_are_minimally_sorted());
}

fn prepare(
    samples: &[NodeId],
    state: &mut SimplificationBuffers,
    tables: &TableCollection,
    output: &mut SimplificationOutput,
) {
    state.clear();
    state.ancestry.reset(tables.num_nodes());
    output.clear();
    output.idmap.resize(tables.num_nodes(), NodeId::NULL);
    record_sample_nodes(samples, tables, state, &mut output.idmap);
}

/// Simplify `tables` with respect to `samples`.
///
/// The edge table must be sorted, at least minimally
/// (see [`TableCollection::edges_are_minimally_sorted`]),
/// and mutations must be sorted by position.
/// [`TableCollection::sort_tables_for_simplification`]
/// does both.
///
/// On output, node `i` of the new node table is
/// `samples[i]` for `i < samples.len()`.  The edge table is
/// sorted, sites are rebuilt, and the indexes are cleared.
///
/// # Errors
///
/// Invalid samples or unsorted input.  `tables` are unchanged
/// in that case.
pub fn simplify_tables(
    samples: &[NodeId],
    options: SimplificationOptions,
    state: &mut SimplificationBuffers,
    tables: &mut TableCollection,
    output: &mut SimplificationOutput,
) -> Result<(), SimplificationError> {
    validate_samples(samples, tables.num_nodes())?;
    if !options.skip_input_validation() {
        if !tables.edges_are_minimally_sorted() {
            return Err(SimplificationError::EdgesNotSorted);
        }
        if !tables.mutations_are_sorted() {
            return Err(SimplificationError::MutationsNotSorted);
        }
    }
    let _span = tracing::debug_span!("simplify_tables").entered();
    let input_nodes = tables.num_nodes();
    let input_edges = tables.num_edges();

    prepare(samples, state, tables, output);
    let mut edge_ptr = 0;
    while edge_ptr < tables.edges.len() {
        edge_ptr = process_table_parent(tables, edge_ptr, state, &mut output.idmap);
    }
    finalize(state, tables, options, output);

    tracing::debug!(
        input_nodes,
        input_edges,
        output_nodes = tables.num_nodes(),
        output_edges = tables.num_edges(),
        "simplified"
    );
    Ok(())
}

/// As [`simplify_tables`], allocating all of the working memory.
pub fn simplify_tables_without_state(
    samples: &[NodeId],
    options: SimplificationOptions,
    tables: &mut TableCollection,
) -> Result<SimplificationOutput, SimplificationError> {
    let mut state = SimplificationBuffers::new();
    let mut output = SimplificationOutput::new();
    simplify_tables(samples, options, &mut state, tables, &mut output)?;
    Ok(output)
}

/// Simplify using edges in the tables and in `buffer`.
///
/// The edge table holds the output of the previous
/// simplification (or is empty), and `buffer` holds every edge
/// recorded since.  `alive_at_last_simplification` are the
/// nodes that were alive, after remapping, at that previous
/// simplification
/// (for the first simplification, the founder nodes).
///
/// The result is identical to stitching the buffer into the
/// edge table with [`crate::stitch_together_edges`] and then
/// calling [`simplify_tables`].  `buffer` is reset on success.
///
/// # Errors
///
/// As for [`simplify_tables`], plus
/// [`SimplificationError::EdgeBuffer`] if the buffer holds
/// births of parents that are neither alive at, nor born
/// after, the last simplification.
pub fn simplify_from_edge_buffer(
    samples: &[NodeId],
    alive_at_last_simplification: &[NodeId],
    options: SimplificationOptions,
    state: &mut SimplificationBuffers,
    tables: &mut TableCollection,
    buffer: &mut EdgeBuffer,
    output: &mut SimplificationOutput,
) -> Result<(), SimplificationError> {
    validate_samples(samples, tables.num_nodes())?;
    if !options.skip_input_validation() {
        if !tables.edges_are_sorted() {
            return Err(SimplificationError::EdgesNotSorted);
        }
        if !tables.mutations_are_sorted() {
            return Err(SimplificationError::MutationsNotSorted);
        }
    }
    let parents = buffered_parents(&tables.nodes, alive_at_last_simplification, buffer)?;
    let _span = tracing::debug_span!("simplify_from_edge_buffer").entered();
    let input_nodes = tables.num_nodes();
    let input_edges = tables.num_edges();
    let buffered_edges = buffer.len();

    prepare(samples, state, tables, output);
    let mut edge_ptr = 0;
    for &parent in &parents {
        while edge_ptr < tables.edges.len()
            && parent_order(&tables.nodes, tables.edges[edge_ptr].parent, parent)
                == Ordering::Less
        {
            edge_ptr = process_table_parent(tables, edge_ptr, state, &mut output.idmap);
        }
        state.overlapper.clear_queue();
        edge_ptr = queue_table_edges(&tables.edges, edge_ptr, parent, state);
        queue_buffered_births(parent, buffer, state);
        state.overlapper.finalize_queue(tables.genome_length);
        merge_ancestors(
            tables.genome_length,
            &tables.nodes,
            parent,
            state,
            &mut output.idmap,
        );
    }
    while edge_ptr < tables.edges.len() {
        edge_ptr = process_table_parent(tables, edge_ptr, state, &mut output.idmap);
    }
    finalize(state, tables, options, output);
    buffer.reset(tables.num_nodes());

    tracing::debug!(
        input_nodes,
        input_edges,
        buffered_edges,
        output_nodes = tables.num_nodes(),
        output_edges = tables.num_edges(),
        "simplified from edge buffer"
    );
    Ok(())
}
