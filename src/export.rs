//! Conversion to [`tskit::TableCollection`].

use thiserror::Error;

use crate::newtypes::NodeId;
use crate::tables::TableCollection;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("sample node {0} is out of range")]
    SampleOutOfRange(NodeId),
    #[error("node time {time} is later than the export time {forward_time}")]
    TimeAfterExport { time: f64, forward_time: f64 },
    #[error(transparent)]
    Tskit(#[from] tskit::TskitError),
}

/// Copy `tables` into a new [`tskit::TableCollection`].
///
/// Node times are measured forwards here and backwards in
/// tskit, so each time `t` becomes `forward_time - t`.
/// Each deme becomes a population with the same id.
/// Only the nodes in `samples` carry the sample flag.
/// Mutations are given the time of the node they are on.
///
/// The result is sorted and indexed.
///
/// # Errors
///
/// * [`ExportError::SampleOutOfRange`] for a sample that is not a node.
/// * [`ExportError::TimeAfterExport`] if a node is younger than `forward_time`.
/// * [`ExportError::Tskit`] if tskit rejects a row.
pub fn to_tskit(
    tables: &TableCollection,
    samples: &[NodeId],
    forward_time: f64,
) -> Result<tskit::TableCollection, ExportError> {
    let mut is_sample = vec![false; tables.num_nodes()];
    for &s in samples {
        match usize::try_from(s.raw())
            .ok()
            .and_then(|i| is_sample.get_mut(i))
        {
            Some(flag) => *flag = true,
            None => return Err(ExportError::SampleOutOfRange(s)),
        }
    }

    let mut output = tskit::TableCollection::new(tables.genome_length())?;

    let num_populations = tables
        .nodes()
        .iter()
        .filter_map(|n| n.deme.into_option())
        .map(|d| d.as_index() + 1)
        .max()
        .unwrap_or(0);
    for _ in 0..num_populations {
        output.add_population()?;
    }

    for (node, sample) in tables.nodes().iter().zip(is_sample) {
        if node.time > forward_time {
            return Err(ExportError::TimeAfterExport {
                time: node.time,
                forward_time,
            });
        }
        let flags = if sample {
            tskit::NodeFlags::new_sample()
        } else {
            tskit::NodeFlags::default()
        };
        output.add_node(
            flags,
            forward_time - node.time,
            tskit::PopulationId::from(node.deme.raw()),
            -1,
        )?;
    }

    for edge in tables.edges() {
        output.add_edge(
            edge.left,
            edge.right,
            tskit::NodeId::from(edge.parent.raw()),
            tskit::NodeId::from(edge.child.raw()),
        )?;
    }

    for site in tables.sites() {
        output.add_site(site.position, Some(&site.ancestral_state.to_le_bytes()))?;
    }

    for mutation in tables.mutations() {
        let time = forward_time - tables.nodes()[mutation.node.as_index()].time;
        output.add_mutation(
            tskit::SiteId::from(mutation.site.raw()),
            tskit::NodeId::from(mutation.node.raw()),
            tskit::MutationId::NULL,
            time,
            Some(&mutation.derived_state.to_le_bytes()),
        )?;
    }

    output.full_sort(tskit::TableSortOptions::default())?;
    output.build_index()?;
    tracing::debug!(
        num_nodes = tables.num_nodes(),
        num_edges = tables.num_edges(),
        num_mutations = tables.num_mutations(),
        "exported tables to tskit"
    );
    Ok(output)
}
