use ancestry_tables::{
    to_tskit, EdgeRecording, PoissonCrossovers, WrightFisher, WrightFisherParams,
};
use tracing_subscriber::EnvFilter;

// Run a diploid Wright-Fisher model and write a tskit tree sequence.
// Usage: wright_fisher_export <outfile> [popsize] [num_generations] [seed]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let outfile = args.next().ok_or("missing output file name")?;
    let popsize = args.next().map(|a| a.parse()).transpose()?.unwrap_or(500);
    let num_generations = args.next().map(|a| a.parse()).transpose()?.unwrap_or(500);
    let seed = args.next().map(|a| a.parse()).transpose()?.unwrap_or(101);

    let params = WrightFisherParams {
        popsize,
        genome_length: 1e6,
        num_generations,
        simplification_interval: 50,
        recording: EdgeRecording::Stitch,
        seed,
    };
    let crossovers = PoissonCrossovers::new(1.0, params.genome_length)?;
    let mut sim = WrightFisher::new(params, crossovers)?;
    sim.run()?;

    let forward_time = sim.generation() as f64;
    let tables = to_tskit(sim.tables(), sim.alive_nodes(), forward_time)?;
    let ts = tables.tree_sequence(tskit::TreeSequenceFlags::default())?;
    ts.dump(&outfile, tskit::TableOutputOptions::default())?;
    println!("wrote {} trees to {}", u64::from(ts.num_trees()), outfile);
    Ok(())
}
