//! Visiting sites along with the tree that contains them.

use std::ops::Range;

use crate::flags::TreeVisitorOptions;
use crate::newtypes::{NodeId, SiteId};
use crate::tables::{MutationRecord, Site, TableCollection};
use crate::tree_visitor::{TreeVisitor, TreesError, VisitorState};

/// Steps through the site table one site at a time,
/// keeping a [`TreeVisitor`] on the tree covering the
/// current site.
///
/// Sites must be in increasing order of position and
/// mutations sorted by position, as they are after
/// [`TableCollection::sort_mutations_and_rebuild_site_table`].
pub struct SiteVisitor<'tables> {
    trees: TreeVisitor<'tables>,
    next_site: usize,
    next_mutation: usize,
    current: Option<(usize, Range<usize>)>,
}

impl<'tables> SiteVisitor<'tables> {
    /// # Errors
    ///
    /// * [`TreesError::SitesNotSorted`] unless site positions increase.
    /// * [`TreesError::MutationsNotSorted`] unless mutations are sorted.
    /// * Any error from [`TreeVisitor::new`].
    pub fn new(
        tables: &'tables TableCollection,
        samples: &'tables [NodeId],
        options: TreeVisitorOptions,
    ) -> Result<Self, TreesError> {
        if !tables
            .sites()
            .windows(2)
            .all(|w| w[0].position < w[1].position)
        {
            return Err(TreesError::SitesNotSorted);
        }
        if !tables.mutations_are_sorted() {
            return Err(TreesError::MutationsNotSorted);
        }
        Ok(Self {
            trees: TreeVisitor::new(tables, samples, options)?,
            next_site: 0,
            next_mutation: 0,
            current: None,
        })
    }

    /// Move to the next site.
    ///
    /// Returns `false` once every site has been visited.
    pub fn advance(&mut self) -> bool {
        let tables = self.trees.tables();
        let Some(site) = tables.sites().get(self.next_site) else {
            self.current = None;
            return false;
        };
        while self.trees.state() != VisitorState::OnTree || site.position >= self.trees.right() {
            if !self.trees.advance() {
                self.current = None;
                return false;
            }
        }
        let mutations = tables.mutations();
        while self.next_mutation < mutations.len()
            && mutations[self.next_mutation].site.as_index() < self.next_site
        {
            self.next_mutation += 1;
        }
        let first = self.next_mutation;
        while self.next_mutation < mutations.len()
            && mutations[self.next_mutation].site.as_index() == self.next_site
        {
            self.next_mutation += 1;
        }
        self.current = Some((self.next_site, first..self.next_mutation));
        self.next_site += 1;
        true
    }

    /// The current site, if any.
    pub fn site(&self) -> Option<(SiteId, &'tables Site)> {
        let tables = self.trees.tables();
        self.current
            .as_ref()
            .map(|(s, _)| (SiteId::from_index(*s), &tables.sites()[*s]))
    }

    /// Mutations at the current site.
    pub fn mutations(&self) -> &'tables [MutationRecord] {
        let tables = self.trees.tables();
        match &self.current {
            Some((_, range)) => &tables.mutations()[range.clone()],
            None => &[],
        }
    }

    /// The tree covering the current site.
    pub fn tree(&self) -> &TreeVisitor<'tables> {
        &self.trees
    }
}

/// Call `f` for each site with a position in `[left, right)`,
/// passing the tree that covers it and its mutations.
///
/// # Errors
///
/// As for [`SiteVisitor::new`].
pub fn visit_sites<F>(
    tables: &TableCollection,
    samples: &[NodeId],
    options: TreeVisitorOptions,
    left: f64,
    right: f64,
    mut f: F,
) -> Result<(), TreesError>
where
    F: FnMut(&TreeVisitor<'_>, SiteId, &Site, &[MutationRecord]),
{
    let mut visitor = SiteVisitor::new(tables, samples, options)?;
    while visitor.advance() {
        let Some((id, site)) = visitor.site() else {
            break;
        };
        if site.position >= right {
            break;
        }
        if site.position >= left {
            f(visitor.tree(), id, site, visitor.mutations());
        }
    }
    Ok(())
}
