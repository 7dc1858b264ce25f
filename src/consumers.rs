//! Functions built on [`TreeVisitor`].

use std::collections::BTreeMap;

use crate::flags::TreeVisitorOptions;
use crate::newtypes::{NodeHash, NodeId};
use crate::tables::TableCollection;
use crate::tree_visitor::{TreeVisitor, TreesError};

/// Check that each sample descends from exactly one root
/// in every tree.
///
/// # Errors
///
/// [`TreesError::SamplesError`] for the first tree that fails,
/// or any error from [`TreeVisitor::new`].
pub fn validate_ancestry(tables: &TableCollection, samples: &[NodeId]) -> Result<(), TreesError> {
    let options = TreeVisitorOptions::default().with_leaf_counts();
    let mut visitor = TreeVisitor::new(tables, samples, options)?;
    let mut roots = NodeHash::default();
    while visitor.advance() {
        let samples_error = TreesError::SamplesError {
            left: visitor.left(),
            right: visitor.right(),
        };
        roots.clear();
        let mut below_roots = 0;
        for r in visitor.roots() {
            if !roots.insert(r.as_index()) {
                return Err(samples_error);
            }
            below_roots += visitor.leaf_count(r)? as usize;
        }
        if roots.is_empty() || below_roots != samples.len() {
            return Err(samples_error);
        }
        for &s in samples {
            match visitor.parents(s)?.last() {
                Some(top) if roots.contains(&top.as_index()) => (),
                _ => return Err(samples_error),
            }
        }
    }
    Ok(())
}

/// Number of samples, and of preserved nodes, carrying each mutation.
///
/// Both vectors are indexed by mutation table row.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MutationCounts {
    pub counts: Vec<u32>,
    pub preserved_counts: Vec<u32>,
}

/// Count the mutations by reading leaf counts while
/// sweeping the trees.
///
/// # Errors
///
/// [`TreesError::MutationsNotSorted`] unless mutations
/// are sorted by position, or any error from
/// [`TreeVisitor::with_preserved_nodes`].
pub fn count_mutations(
    tables: &TableCollection,
    samples: &[NodeId],
    preserved: &[NodeId],
) -> Result<MutationCounts, TreesError> {
    if !tables.mutations_are_sorted() {
        return Err(TreesError::MutationsNotSorted);
    }
    let options = TreeVisitorOptions::default().with_leaf_counts();
    let mut visitor = TreeVisitor::with_preserved_nodes(tables, samples, preserved, options)?;
    let mut counts = MutationCounts {
        counts: vec![0; tables.num_mutations()],
        preserved_counts: vec![0; tables.num_mutations()],
    };
    let position = |row: usize| tables.sites()[tables.mutations()[row].site.as_index()].position;
    let mut row = 0;
    while visitor.advance() {
        while row < tables.num_mutations() && position(row) < visitor.left() {
            row += 1;
        }
        while row < tables.num_mutations() && position(row) < visitor.right() {
            let node = tables.mutations()[row].node;
            counts.counts[row] = visitor.leaf_count(node)?;
            counts.preserved_counts[row] = visitor.preserved_leaf_count(node)?;
            row += 1;
        }
    }
    Ok(counts)
}

/// Remove the mutations fixed among `samples`, returning
/// their keys.
///
/// A mutation found in any `preserved` node is kept, as
/// are non-neutral fixations when `preserve_selected_fixations`
/// is `true`.  The site table is rebuilt.
pub fn remove_fixed_mutations(
    tables: &mut TableCollection,
    samples: &[NodeId],
    preserved: &[NodeId],
    preserve_selected_fixations: bool,
) -> Result<Vec<usize>, TreesError> {
    let counts = count_mutations(tables, samples, preserved)?;
    let num_samples = samples.len() as u32;
    let mut removed = vec![];
    let mut row = 0;
    tables.mutations.retain(|m| {
        let fixed = counts.counts[row] == num_samples
            && counts.preserved_counts[row] == 0
            && (m.neutral || !preserve_selected_fixations);
        row += 1;
        if fixed {
            removed.push(m.key);
        }
        !fixed
    });
    if !removed.is_empty() {
        tables.rebuild_site_table();
        tracing::debug!(num_fixations = removed.len(), "removed fixed mutations");
    }
    Ok(removed)
}

/// For trees with more than one root, the intervals
/// over which each root is ancestral to some samples.
///
/// Trees where all samples share the same root are skipped.
pub fn mark_multiple_roots(
    tables: &TableCollection,
    samples: &[NodeId],
) -> Result<BTreeMap<NodeId, Vec<(f64, f64)>>, TreesError> {
    let options = TreeVisitorOptions::default().with_leaf_counts();
    let mut visitor = TreeVisitor::new(tables, samples, options)?;
    let mut rv = BTreeMap::<NodeId, Vec<(f64, f64)>>::new();
    while visitor.advance() {
        let interval = (visitor.left(), visitor.right());
        for r in visitor.roots() {
            if visitor.leaf_count(r)? as usize == samples.len() {
                break;
            }
            let intervals = rv.entry(r).or_default();
            match intervals.last_mut() {
                Some(last) if last.1 == interval.0 => last.1 = interval.1,
                _ => intervals.push(interval),
            }
        }
    }
    Ok(rv)
}
