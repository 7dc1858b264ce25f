//! Ancestry tables for forward-time population genetic simulation.
//!
//! A [`TableCollection`] records nodes, edges, sites and mutations
//! as a simulation runs.  Edges come in either directly or through an
//! [`EdgeBuffer`], and the tables are periodically simplified down to
//! the history of a set of sample nodes.  A [`TreeVisitor`] walks the
//! marginal trees of indexed tables, and a [`SiteVisitor`]
//! walks the sites along with the tree covering each one.

mod breakpoints;
mod consumers;
mod edge_buffer;
#[cfg(feature = "tskit")]
mod export;
mod flags;
mod indexing;
mod nested_forward_list;
mod newtypes;
mod overlapper;
mod simplification;
mod site_visitor;
mod tables;
mod tree_visitor;
mod wright_fisher;

pub use breakpoints::{
    validate_breakpoints, BreakpointGenerator, NoRecombination, PoissonCrossovers,
    BREAKPOINT_SENTINEL,
};
pub use consumers::{
    count_mutations, mark_multiple_roots, remove_fixed_mutations, validate_ancestry,
    MutationCounts,
};
pub use edge_buffer::{stitch_together_edges, BirthData, EdgeBuffer, EdgeBufferError};
#[cfg(feature = "tskit")]
pub use export::{to_tskit, ExportError};
pub use flags::{NodeFlags, SimplificationOptions, TreeVisitorOptions};
pub use nested_forward_list::{ListIterator, NestedForwardList};
pub use newtypes::{DemeId, EdgeId, MutationId, NodeId, SiteId};
pub use simplification::{
    simplify_from_edge_buffer, simplify_tables, simplify_tables_without_state,
    SimplificationBuffers, SimplificationError, SimplificationOutput,
};
pub use site_visitor::{visit_sites, SiteVisitor};
pub use tables::{Edge, MutationRecord, Node, Site, TableCollection, TablesError};
pub use tree_visitor::{PreorderIterator, SamplesIterator, TreeVisitor, TreesError, VisitorState};
pub use wright_fisher::{
    EdgeRecording, WrightFisher, WrightFisherError, WrightFisherParams,
};

pub mod prelude {
    pub use crate::{
        BreakpointGenerator, DemeId, EdgeBuffer, NodeFlags, NodeId, SimplificationBuffers,
        SimplificationOptions, SimplificationOutput, TableCollection, TreeVisitor,
        TreeVisitorOptions,
    };
}
