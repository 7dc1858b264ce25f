//! The `input_left` and `output_right` edge indexes.
//!
//! `input_left` orders edges by when a left-to-right sweep
//! inserts them: by left, then from the youngest parent to
//! the oldest.  `output_right` orders them by when the sweep
//! removes them: by right, then from the oldest parent to the
//! youngest.  Ties go to parent id, child id and then edge id,
//! making both orders total.

use std::cmp::Ordering;

use crate::newtypes::EdgeId;
use crate::tables::{Edge, Node, TableCollection, TablesError};

fn input_left_order(nodes: &[Node], edges: &[Edge], a: EdgeId, b: EdgeId) -> Ordering {
    let (ea, eb) = (&edges[a.as_index()], &edges[b.as_index()]);
    ea.left
        .total_cmp(&eb.left)
        .then_with(|| {
            nodes[eb.parent.as_index()]
                .time
                .total_cmp(&nodes[ea.parent.as_index()].time)
        })
        .then_with(|| ea.parent.cmp(&eb.parent))
        .then_with(|| ea.child.cmp(&eb.child))
        .then_with(|| a.cmp(&b))
}

fn output_right_order(nodes: &[Node], edges: &[Edge], a: EdgeId, b: EdgeId) -> Ordering {
    let (ea, eb) = (&edges[a.as_index()], &edges[b.as_index()]);
    ea.right
        .total_cmp(&eb.right)
        .then_with(|| {
            nodes[ea.parent.as_index()]
                .time
                .total_cmp(&nodes[eb.parent.as_index()].time)
        })
        .then_with(|| ea.parent.cmp(&eb.parent))
        .then_with(|| ea.child.cmp(&eb.child))
        .then_with(|| a.cmp(&b))
}

// Merge the sorted `new` ids into the sorted `index`.
// Entries preceding the first new id are not touched.
fn splice_merge<F>(index: &mut Vec<EdgeId>, new: &[EdgeId], mut cmp: F)
where
    F: FnMut(EdgeId, EdgeId) -> Ordering,
{
    let Some(&first) = new.first() else {
        return;
    };
    let start = index.partition_point(|&e| cmp(e, first) == Ordering::Less);
    let tail = index.split_off(start);
    index.reserve(tail.len() + new.len());
    let (mut i, mut j) = (0, 0);
    while i < tail.len() && j < new.len() {
        if cmp(new[j], tail[i]) == Ordering::Less {
            index.push(new[j]);
            j += 1;
        } else {
            index.push(tail[i]);
            i += 1;
        }
    }
    index.extend_from_slice(&tail[i..]);
    index.extend_from_slice(&new[j..]);
}

impl TableCollection {
    /// Build both edge indexes from scratch.
    ///
    /// Any order of the edge table is allowed.
    pub fn build_indexes(&mut self) {
        let nodes = &self.nodes;
        let edges = &self.edges;
        self.input_left.clear();
        self.input_left
            .extend((0..edges.len()).map(EdgeId::from_index));
        self.input_left
            .sort_unstable_by(|&a, &b| input_left_order(nodes, edges, a, b));
        self.output_right.clear();
        self.output_right
            .extend((0..edges.len()).map(EdgeId::from_index));
        self.output_right
            .sort_unstable_by(|&a, &b| output_right_order(nodes, edges, a, b));
        tracing::trace!(num_edges = edges.len(), "built edge indexes");
    }

    /// `true` if both indexes cover the whole edge table.
    pub fn is_indexed(&self) -> bool {
        self.input_left.len() == self.edges.len() && self.output_right.len() == self.edges.len()
    }

    pub fn indexes_are_sorted(&self) -> bool {
        let nodes = &self.nodes;
        let edges = &self.edges;
        self.is_indexed()
            && self
                .input_left
                .windows(2)
                .all(|w| input_left_order(nodes, edges, w[0], w[1]) == Ordering::Less)
            && self
                .output_right
                .windows(2)
                .all(|w| output_right_order(nodes, edges, w[0], w[1]) == Ordering::Less)
    }

    /// Add the edges from `first_new_edge` onwards to
    /// indexes that cover the edges before it.
    ///
    /// The edge table itself is not reordered.  The result
    /// is the same as that of [`TableCollection::build_indexes`].
    ///
    /// # Errors
    ///
    /// * [`TablesError::InvalidEdgeOffset`] if `first_new_edge`
    ///   is past the end of the edge table.
    /// * [`TablesError::TablesNotIndexed`] if the indexes do not
    ///   cover exactly the edges before `first_new_edge`.
    pub fn update_indexes(&mut self, first_new_edge: usize) -> Result<(), TablesError> {
        if first_new_edge > self.edges.len() {
            return Err(TablesError::InvalidEdgeOffset(first_new_edge));
        }
        if self.input_left.len() != first_new_edge || self.output_right.len() != first_new_edge {
            return Err(TablesError::TablesNotIndexed);
        }
        let nodes = &self.nodes;
        let edges = &self.edges;
        let mut new = (first_new_edge..edges.len())
            .map(EdgeId::from_index)
            .collect::<Vec<_>>();

        new.sort_unstable_by(|&a, &b| input_left_order(nodes, edges, a, b));
        splice_merge(&mut self.input_left, &new, |a, b| {
            input_left_order(nodes, edges, a, b)
        });
        new.sort_unstable_by(|&a, &b| output_right_order(nodes, edges, a, b));
        splice_merge(&mut self.output_right, &new, |a, b| {
            output_right_order(nodes, edges, a, b)
        });

        tracing::trace!(
            num_edges = edges.len(),
            new_edges = new.len(),
            "updated edge indexes"
        );
        debug_assert!(self.indexes_are_sorted());
        Ok(())
    }
}

#[cfg(test)]
mod test_indexing {
    use super::*;
    use crate::newtypes::{DemeId, NodeId};
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};

    //    0
    //   / \
    //  1   2  [0, 5)
    //
    //    0
    //   / \
    //  1   3  [5, 10)
    fn two_trees() -> TableCollection {
        let mut tables = TableCollection::new(10.0).unwrap();
        for t in [0.0, 1.0, 1.0, 1.0] {
            tables.emplace_back_node(DemeId::new(0), t).unwrap();
        }
        tables.add_edge(0.0, 10.0, NodeId::new(0), NodeId::new(1)).unwrap();
        tables.add_edge(0.0, 5.0, NodeId::new(0), NodeId::new(2)).unwrap();
        tables.add_edge(5.0, 10.0, NodeId::new(0), NodeId::new(3)).unwrap();
        tables
    }

    #[test]
    fn test_build_indexes() {
        let mut tables = two_trees();
        assert!(!tables.is_indexed());
        assert_eq!(tables.count_trees(), Err(TablesError::TablesNotIndexed));
        tables.build_indexes();
        assert!(tables.is_indexed());
        assert!(tables.indexes_are_sorted());
        assert_eq!(
            tables.input_left,
            vec![EdgeId::new(0), EdgeId::new(1), EdgeId::new(2)]
        );
        assert_eq!(
            tables.output_right,
            vec![EdgeId::new(1), EdgeId::new(0), EdgeId::new(2)]
        );
        assert_eq!(tables.count_trees(), Ok(2));
    }

    #[test]
    fn test_empty_tables_have_one_tree() {
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.build_indexes();
        assert_eq!(tables.count_trees(), Ok(1));
    }

    #[test]
    fn test_update_indexes() {
        let mut tables = two_trees();
        tables.build_indexes();
        let first_new_edge = tables.num_edges();
        let c = tables.emplace_back_node(DemeId::new(0), 2.0).unwrap();
        tables.add_edge(2.0, 7.0, NodeId::new(1), c).unwrap();
        assert!(!tables.is_indexed());
        tables.update_indexes(first_new_edge).unwrap();
        let updated = (tables.input_left.clone(), tables.output_right.clone());
        tables.build_indexes();
        assert_eq!(updated, (tables.input_left, tables.output_right));
    }

    #[test]
    fn test_update_indexes_errors() {
        let mut tables = two_trees();
        assert_eq!(tables.update_indexes(1), Err(TablesError::TablesNotIndexed));
        assert_eq!(tables.update_indexes(4), Err(TablesError::InvalidEdgeOffset(4)));
        // Nothing is indexed yet, so everything is new.
        tables.update_indexes(0).unwrap();
        assert!(tables.indexes_are_sorted());
    }

    // Random edges between consecutive generations.
    fn random_tables(seed: u64, num_edges: usize) -> TableCollection {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut tables = TableCollection::new(100.0).unwrap();
        for generation in 0..5 {
            for _ in 0..4 {
                tables
                    .emplace_back_node(DemeId::new(0), generation as f64)
                    .unwrap();
            }
        }
        for _ in 0..num_edges {
            let generation = rng.gen_range(0..4);
            let parent = NodeId::new(4 * generation + rng.gen_range(0..4));
            let child = NodeId::new(4 * (generation + 1) + rng.gen_range(0..4));
            // Integer positions make ties likely.
            let left = rng.gen_range(0..99) as f64;
            let right = rng.gen_range(left as i32 + 1..=100) as f64;
            tables.add_edge(left, right, parent, child).unwrap();
        }
        tables
    }

    proptest! {
        #[test]
        fn test_update_indexes_matches_build_indexes(
            seed in any::<u64>(),
            num_edges in 0usize..60,
            num_new in 0usize..60,
        ) {
            let mut tables = random_tables(seed, num_edges + num_new);
            let mut first = tables.clone();
            first.edges.truncate(num_edges);
            first.build_indexes();
            tables.input_left = first.input_left;
            tables.output_right = first.output_right;
            tables.update_indexes(num_edges).unwrap();
            let updated = (tables.input_left.clone(), tables.output_right.clone());
            tables.build_indexes();
            prop_assert_eq!(updated, (tables.input_left.clone(), tables.output_right.clone()));
            prop_assert!(tables.indexes_are_sorted());
        }
    }
}
