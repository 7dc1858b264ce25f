use std::cmp::Ordering;

use crate::nested_forward_list::NestedForwardList;
use crate::newtypes::NodeId;
use crate::tables::{Edge, Node, TableCollection};

/// A buffered edge.  The parent is the list key.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BirthData {
    pub left: f64,
    pub right: f64,
    pub child: NodeId,
}

/// Edges recorded since the last simplification,
/// keyed by parent node.
///
/// Births are added by
/// [`TableCollection::register_diploid_offspring_buffered`].
/// The buffer is consumed either by
/// [`stitch_together_edges`] or by
/// [`crate::simplify_from_edge_buffer`], both of which
/// reset it.
pub type EdgeBuffer = NestedForwardList<BirthData>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EdgeBufferError {
    #[error("node {0} is out of range")]
    NodeOutOfRange(NodeId),
    #[error("{buffered} births are buffered but only {reachable} belong to parents born since, or alive at, the last simplification")]
    UnreachableBirths { buffered: usize, reachable: usize },
    #[error("existing edges are not sorted")]
    EdgesNotSorted,
}

/// Processing order of parent nodes.
pub(crate) fn parent_order(nodes: &[Node], a: NodeId, b: NodeId) -> Ordering {
    nodes[b.as_index()]
        .time
        .total_cmp(&nodes[a.as_index()].time)
        .then_with(|| a.cmp(&b))
}

/// Parents with buffered births, in processing order.
///
/// A buffered parent is either born after the last
/// simplification, meaning it is younger than every
/// node in `alive_at_last_simplification`, or is itself
/// one of those nodes.
pub(crate) fn buffered_parents(
    nodes: &[Node],
    alive_at_last_simplification: &[NodeId],
    buffer: &EdgeBuffer,
) -> Result<Vec<NodeId>, EdgeBufferError> {
    let mut max_time = f64::NEG_INFINITY;
    for &a in alive_at_last_simplification {
        match nodes.get(usize::try_from(a.raw()).unwrap_or(usize::MAX)) {
            Some(node) => max_time = max_time.max(node.time),
            None => return Err(EdgeBufferError::NodeOutOfRange(a)),
        }
    }
    let mut parents = vec![];
    for key in buffer.keys_rev() {
        let Some(node) = nodes.get(key) else {
            return Err(EdgeBufferError::NodeOutOfRange(NodeId::from_index(key)));
        };
        if node.time <= max_time {
            break;
        }
        parents.push(NodeId::from_index(key));
    }
    let num_new = parents.len();
    parents.extend(
        alive_at_last_simplification
            .iter()
            .filter(|a| !buffer.head(a.as_index()).is_null()),
    );
    if parents.len() > num_new {
        parents.sort_unstable_by(|&a, &b| parent_order(nodes, a, b));
        parents.dedup();
    } else {
        parents.reverse();
        if !parents
            .windows(2)
            .all(|w| parent_order(nodes, w[0], w[1]) == Ordering::Less)
        {
            parents.sort_unstable_by(|&a, &b| parent_order(nodes, a, b));
        }
    }

    let reachable = parents
        .iter()
        .map(|p| buffer.iter_list(p.as_index()).count())
        .sum::<usize>();
    if reachable != buffer.len() {
        return Err(EdgeBufferError::UnreachableBirths {
            buffered: buffer.len(),
            reachable,
        });
    }
    Ok(parents)
}

/// Merge the buffered births into the edge table.
///
/// The existing edge table must be sorted, which is
/// the case for the output of simplification. Afterwards,
/// the whole edge table is sorted and `buffer` is reset.
///
/// # Errors
///
/// * [`EdgeBufferError::EdgesNotSorted`] if the existing edges
///   are not sorted.
/// * [`EdgeBufferError::NodeOutOfRange`] or
///   [`EdgeBufferError::UnreachableBirths`] if `buffer` and
///   `alive_at_last_simplification` do not match the node table.
///
/// The tables and buffer are unchanged on error.
pub fn stitch_together_edges(
    alive_at_last_simplification: &[NodeId],
    buffer: &mut EdgeBuffer,
    tables: &mut TableCollection,
) -> Result<(), EdgeBufferError> {
    if !tables.edges_are_sorted() {
        return Err(EdgeBufferError::EdgesNotSorted);
    }
    let parents = buffered_parents(&tables.nodes, alive_at_last_simplification, buffer)?;
    let _span = tracing::debug_span!("stitch_together_edges").entered();

    let nodes = &tables.nodes;
    let edges = &tables.edges;
    let mut new_edges = Vec::with_capacity(edges.len() + buffer.len());
    let mut edge_ptr = 0;
    for &parent in &parents {
        while edge_ptr < edges.len()
            && parent_order(nodes, edges[edge_ptr].parent, parent) == Ordering::Less
        {
            new_edges.push(edges[edge_ptr]);
            edge_ptr += 1;
        }
        let start = new_edges.len();
        while edge_ptr < edges.len() && edges[edge_ptr].parent == parent {
            new_edges.push(edges[edge_ptr]);
            edge_ptr += 1;
        }
        new_edges.extend(buffer.iter_list(parent.as_index()).map(|b| Edge {
            left: b.left,
            right: b.right,
            parent,
            child: b.child,
        }));
        let parent_edges = &mut new_edges[start..];
        if !parent_edges
            .windows(2)
            .all(|w| (w[0].child, w[0].left) < (w[1].child, w[1].left))
        {
            parent_edges.sort_unstable_by(|a, b| {
                a.child.cmp(&b.child).then_with(|| a.left.total_cmp(&b.left))
            });
        }
    }
    new_edges.extend_from_slice(&edges[edge_ptr..]);
    tracing::debug!(
        existing = edges.len(),
        buffered = buffer.len(),
        parents = parents.len(),
        "stitched buffered edges"
    );
    tables.replace_edges(new_edges);
    debug_assert!(tables.edges_are_sorted());
    buffer.reset(tables.num_nodes());
    Ok(())
}
