//! A neutral Wright-Fisher population recording its genealogy.
//!
//! There is no selection and there are no mutations:
//! each generation, every one of the `2N` new genomes picks
//! a parent individual uniformly at random and inherits from
//! its two nodes according to a [`BreakpointGenerator`].
//! This is enough to drive every recording path of the crate.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::breakpoints::BreakpointGenerator;
use crate::edge_buffer::{stitch_together_edges, EdgeBuffer, EdgeBufferError};
use crate::flags::SimplificationOptions;
use crate::newtypes::{DemeId, NodeId};
use crate::simplification::{
    simplify_from_edge_buffer, simplify_tables, SimplificationBuffers, SimplificationError,
    SimplificationOutput,
};
use crate::tables::{TableCollection, TablesError};

/// How new edges reach the simplifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeRecording {
    /// Append to the edge table, then sort before simplifying.
    SortAndSimplify,
    /// Buffer, then stitch into the edge table before simplifying.
    Stitch,
    /// Buffer, then simplify straight from the buffer.
    FromBuffer,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WrightFisherParams {
    /// Number of diploid individuals.
    pub popsize: usize,
    pub genome_length: f64,
    pub num_generations: usize,
    /// Simplify every this many generations.
    pub simplification_interval: usize,
    pub recording: EdgeRecording,
    pub seed: u64,
}

impl Default for WrightFisherParams {
    fn default() -> Self {
        Self {
            popsize: 100,
            genome_length: 1.0,
            num_generations: 100,
            simplification_interval: 10,
            recording: EdgeRecording::SortAndSimplify,
            seed: 0,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WrightFisherError {
    #[error("population size must be > 0")]
    EmptyPopulation,
    #[error("simplification interval must be > 0")]
    InvalidSimplificationInterval,
    #[error(transparent)]
    Tables(#[from] TablesError),
    #[error(transparent)]
    EdgeBuffer(#[from] EdgeBufferError),
    #[error(transparent)]
    Simplification(#[from] SimplificationError),
}

pub struct WrightFisher<B: BreakpointGenerator> {
    params: WrightFisherParams,
    breakpoint_model: B,
    rng: StdRng,
    tables: TableCollection,
    buffer: EdgeBuffer,
    state: SimplificationBuffers,
    output: SimplificationOutput,
    // Individual i owns nodes 2i and 2i + 1.
    alive: Vec<NodeId>,
    alive_at_last_simplification: Vec<NodeId>,
    offspring: Vec<NodeId>,
    breakpoints: Vec<f64>,
    generation: usize,
    last_simplification: usize,
}

impl<B: BreakpointGenerator> WrightFisher<B> {
    /// Create the founder generation, at time zero.
    pub fn new(params: WrightFisherParams, breakpoint_model: B) -> Result<Self, WrightFisherError> {
        if params.popsize == 0 {
            return Err(WrightFisherError::EmptyPopulation);
        }
        if params.simplification_interval == 0 {
            return Err(WrightFisherError::InvalidSimplificationInterval);
        }
        let num_founders = 2 * params.popsize;
        let tables = TableCollection::with_initial_nodes(
            num_founders,
            0.0,
            DemeId::new(0),
            params.genome_length,
        )?;
        let alive = (0..num_founders).map(NodeId::from_index).collect::<Vec<_>>();
        Ok(Self {
            rng: StdRng::seed_from_u64(params.seed),
            params,
            breakpoint_model,
            tables,
            buffer: EdgeBuffer::with_num_keys(num_founders),
            state: SimplificationBuffers::new(),
            output: SimplificationOutput::new(),
            alive_at_last_simplification: alive.clone(),
            alive,
            offspring: vec![],
            breakpoints: vec![],
            generation: 0,
            last_simplification: 0,
        })
    }

    /// Produce the next generation, simplifying
    /// if the interval has elapsed.
    pub fn step(&mut self) -> Result<(), WrightFisherError> {
        self.generation += 1;
        let birth_time = self.generation as f64;
        let deme = DemeId::new(0);
        let parent_individual = Uniform::new(0, self.params.popsize);
        self.offspring.clear();
        for _ in 0..2 * self.params.popsize {
            let individual = parent_individual.sample(&mut self.rng);
            let (a, b) = (self.alive[2 * individual], self.alive[2 * individual + 1]);
            let parents = if self.rng.gen_bool(0.5) { (a, b) } else { (b, a) };
            self.breakpoint_model
                .generate(&mut self.rng, &mut self.breakpoints);
            let child = match self.params.recording {
                EdgeRecording::SortAndSimplify => self.tables.register_diploid_offspring(
                    &self.breakpoints,
                    parents,
                    deme,
                    birth_time,
                )?,
                EdgeRecording::Stitch | EdgeRecording::FromBuffer => {
                    self.tables.register_diploid_offspring_buffered(
                        &self.breakpoints,
                        parents,
                        deme,
                        birth_time,
                        &mut self.buffer,
                    )?
                }
            };
            self.offspring.push(child);
        }
        std::mem::swap(&mut self.alive, &mut self.offspring);
        tracing::trace!(generation = self.generation, "generation done");
        if self.generation % self.params.simplification_interval == 0 {
            self.simplify()?;
        }
        Ok(())
    }

    /// Simplify with respect to the alive nodes and remap them.
    pub fn simplify(&mut self) -> Result<(), WrightFisherError> {
        let _span =
            tracing::debug_span!("wright_fisher_simplify", generation = self.generation).entered();
        let options = SimplificationOptions::default();
        match self.params.recording {
            EdgeRecording::SortAndSimplify => {
                self.tables.sort_tables_for_simplification()?;
                simplify_tables(
                    &self.alive,
                    options,
                    &mut self.state,
                    &mut self.tables,
                    &mut self.output,
                )?;
            }
            EdgeRecording::Stitch => {
                stitch_together_edges(
                    &self.alive_at_last_simplification,
                    &mut self.buffer,
                    &mut self.tables,
                )?;
                simplify_tables(
                    &self.alive,
                    options,
                    &mut self.state,
                    &mut self.tables,
                    &mut self.output,
                )?;
                self.buffer.reset(self.tables.num_nodes());
            }
            EdgeRecording::FromBuffer => simplify_from_edge_buffer(
                &self.alive,
                &self.alive_at_last_simplification,
                options,
                &mut self.state,
                &mut self.tables,
                &mut self.buffer,
                &mut self.output,
            )?,
        }
        self.output.remap(&mut self.alive)?;
        self.alive_at_last_simplification.clone_from(&self.alive);
        self.last_simplification = self.generation;
        tracing::debug!(
            num_nodes = self.tables.num_nodes(),
            num_edges = self.tables.num_edges(),
            "simplified"
        );
        Ok(())
    }

    /// Run the remaining generations, simplifying at the end.
    pub fn run(&mut self) -> Result<(), WrightFisherError> {
        while self.generation < self.params.num_generations {
            self.step()?;
        }
        if self.last_simplification < self.generation {
            self.simplify()?;
        }
        Ok(())
    }

    pub fn params(&self) -> &WrightFisherParams {
        &self.params
    }

    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    pub fn into_tables(self) -> TableCollection {
        self.tables
    }

    /// Nodes of the current generation.
    pub fn alive_nodes(&self) -> &[NodeId] {
        &self.alive
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Output of the most recent simplification.
    pub fn last_simplification_output(&self) -> &SimplificationOutput {
        &self.output
    }

    /// Number of edges waiting in the buffer.
    pub fn num_buffered_edges(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod test_wright_fisher {
    use super::*;
    use crate::breakpoints::{NoRecombination, PoissonCrossovers};
    use crate::consumers::validate_ancestry;

    fn params(recording: EdgeRecording) -> WrightFisherParams {
        WrightFisherParams {
            popsize: 25,
            genome_length: 1.0,
            num_generations: 60,
            simplification_interval: 7,
            recording,
            seed: 6543,
        }
    }

    fn assert_no_mergeable_edges(tables: &TableCollection) {
        for w in tables.edges().windows(2) {
            assert!(
                !(w[0].parent == w[1].parent
                    && w[0].child == w[1].child
                    && w[0].right == w[1].left),
                "{:?} and {:?} can be merged",
                w[0],
                w[1]
            );
        }
    }

    fn assert_recording_methods_agree<B: BreakpointGenerator + Copy>(model: B) {
        let mut sims = [
            EdgeRecording::SortAndSimplify,
            EdgeRecording::Stitch,
            EdgeRecording::FromBuffer,
        ]
        .map(|r| WrightFisher::new(params(r), model).unwrap());
        for _ in 0..60 {
            for sim in sims.iter_mut() {
                sim.step().unwrap();
            }
            if sims[0].generation() % 7 == 0 {
                assert_no_mergeable_edges(sims[0].tables());
                for sim in &sims[1..] {
                    assert_eq!(sim.tables(), sims[0].tables());
                    assert_eq!(sim.alive_nodes(), sims[0].alive_nodes());
                    assert_eq!(sim.num_buffered_edges(), 0);
                }
            }
        }
        for sim in sims.iter_mut() {
            sim.run().unwrap();
        }
        for sim in &sims[1..] {
            assert_eq!(sim.tables(), sims[0].tables());
            assert_eq!(
                sim.last_simplification_output(),
                sims[0].last_simplification_output()
            );
        }
        let mut tables = sims[0].tables().clone();
        assert!(tables.edges_are_sorted());
        assert_no_mergeable_edges(&tables);
        tables.build_indexes();
        validate_ancestry(&tables, sims[0].alive_nodes()).unwrap();
    }

    #[test]
    fn test_recording_methods_agree_without_recombination() {
        assert_recording_methods_agree(NoRecombination);
    }

    #[test]
    fn test_recording_methods_agree_with_recombination() {
        assert_recording_methods_agree(PoissonCrossovers::new(2.0, 1.0).unwrap());
    }

    #[test]
    fn test_simplified_edges_cannot_be_merged() {
        let model = PoissonCrossovers::new(3.0, 1.0).unwrap();
        for seed in 0..5 {
            let mut p = params(EdgeRecording::FromBuffer);
            p.seed = seed;
            let mut sim = WrightFisher::new(p, model).unwrap();
            while sim.generation() < sim.params().num_generations {
                sim.step().unwrap();
                if sim.num_buffered_edges() == 0 {
                    assert!(sim.tables().edges_are_sorted());
                    assert_no_mergeable_edges(sim.tables());
                }
            }
            sim.run().unwrap();
            assert_no_mergeable_edges(sim.tables());
        }
    }

    #[test]
    fn test_simplification_is_idempotent() {
        let model = PoissonCrossovers::new(1.0, 1.0).unwrap();
        let mut sim = WrightFisher::new(params(EdgeRecording::FromBuffer), model).unwrap();
        sim.run().unwrap();
        let mut tables = sim.tables().clone();
        let mut alive = sim.alive_nodes().to_vec();
        let output = crate::simplify_tables_without_state(
            &alive,
            SimplificationOptions::default(),
            &mut tables,
        )
        .unwrap();
        output.remap(&mut alive).unwrap();
        assert_eq!(&tables, sim.tables());
        assert_eq!(alive, sim.alive_nodes());
    }

    #[test]
    fn test_large_population_end_to_end() {
        let popsize = 1000;
        let num_generations = 100;
        let params = WrightFisherParams {
            popsize,
            genome_length: 1.0,
            num_generations,
            simplification_interval: num_generations + 1,
            recording: EdgeRecording::SortAndSimplify,
            seed: 101,
        };
        let mut sim = WrightFisher::new(params, NoRecombination).unwrap();
        for _ in 0..num_generations {
            sim.step().unwrap();
        }
        assert_eq!(sim.tables().num_edges(), 2 * popsize * num_generations);
        assert_eq!(sim.tables().num_nodes(), 2 * popsize * (num_generations + 1));
        sim.run().unwrap();

        let tables = sim.tables();
        assert!(tables.num_nodes() <= 2 * popsize * (num_generations + 1));
        let expected = (0..2 * popsize).map(NodeId::from_index).collect::<Vec<_>>();
        assert_eq!(sim.alive_nodes(), expected);
        assert!(sim
            .alive_nodes()
            .iter()
            .all(|n| tables.nodes()[n.as_index()].time == num_generations as f64));
        let mut tables = tables.clone();
        tables.build_indexes();
        validate_ancestry(&tables, sim.alive_nodes()).unwrap();
    }

    // Without recombination each genome has one ancestor,
    // so every edge spans the whole genome and there is one tree.
    #[test]
    fn test_no_recombination_gives_one_tree() {
        let mut sim = WrightFisher::new(params(EdgeRecording::Stitch), NoRecombination).unwrap();
        sim.run().unwrap();
        let mut tables = sim.tables().clone();
        assert!(tables
            .edges()
            .iter()
            .all(|e| e.left == 0.0 && e.right == tables.genome_length()));
        tables.build_indexes();
        assert_eq!(tables.count_trees(), Ok(1));
    }

    #[test]
    fn test_invalid_params() {
        let mut p = params(EdgeRecording::Stitch);
        p.popsize = 0;
        assert!(matches!(
            WrightFisher::new(p, NoRecombination),
            Err(WrightFisherError::EmptyPopulation)
        ));
        let mut p = params(EdgeRecording::Stitch);
        p.simplification_interval = 0;
        assert!(matches!(
            WrightFisher::new(p, NoRecombination),
            Err(WrightFisherError::InvalidSimplificationInterval)
        ));
        let mut p = params(EdgeRecording::Stitch);
        p.genome_length = -1.0;
        assert!(matches!(
            WrightFisher::new(p, NoRecombination),
            Err(WrightFisherError::Tables(TablesError::InvalidGenomeLength(_)))
        ));
    }
}
