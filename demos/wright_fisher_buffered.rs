use ancestry_tables::{
    validate_ancestry, EdgeRecording, PoissonCrossovers, TreeVisitor,
    TreeVisitorOptions, WrightFisher, WrightFisherParams,
};
use tracing_subscriber::EnvFilter;

// Diploid Wright-Fisher model, simplifying straight from the edge buffer.
// Usage: wright_fisher_buffered [popsize] [num_generations] [seed]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let popsize = args.next().map(|a| a.parse()).transpose()?.unwrap_or(1000);
    let num_generations = args.next().map(|a| a.parse()).transpose()?.unwrap_or(1000);
    let seed = args.next().map(|a| a.parse()).transpose()?.unwrap_or(54321);

    let params = WrightFisherParams {
        popsize,
        genome_length: 1e6,
        num_generations,
        simplification_interval: 100,
        recording: EdgeRecording::FromBuffer,
        seed,
    };
    let crossovers = PoissonCrossovers::new(1.0, params.genome_length)?;
    let mut sim = WrightFisher::new(params, crossovers)?;
    sim.run()?;

    let mut tables = sim.tables().clone();
    let samples = sim.alive_nodes().to_vec();
    tables.build_indexes();
    validate_ancestry(&tables, &samples)?;

    let mut visitor = TreeVisitor::new(
        &tables,
        &samples,
        TreeVisitorOptions::default().with_leaf_counts(),
    )?;
    let mut num_trees = 0;
    let mut max_roots = 0;
    while visitor.advance() {
        num_trees += 1;
        max_roots = max_roots.max(visitor.num_roots());
    }

    println!(
        "generations: {}, nodes: {}, edges: {}, trees: {}, max roots: {}",
        sim.generation(),
        tables.num_nodes(),
        tables.num_edges(),
        num_trees,
        max_roots
    );
    Ok(())
}
