//! dagflow CLI — a minimal task-submission entry point that builds a demo
//! DAG and runs it, exercising both the default spawn-per-submission
//! executor and a bounded worker pool.

mod config;
mod demo;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use dagflow::prelude::*;

use config::ExecutorConfig;

#[derive(Parser)]
#[command(name = "dagflow")]
#[command(about = "Run and inspect dagflow demo graphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bundled demo pipeline for a given input value.
    Run {
        /// Value fed into the pipeline's single Input node.
        #[arg(default_value_t = 21)]
        n: i64,

        #[command(flatten)]
        executor: ExecutorConfig,
    },

    /// Print the bundled demo pipeline's topology as a Mermaid graph.
    Graph,
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { n, executor } => run(n, &executor),
        Commands::Graph => graph(),
    }
}

fn run(n: i64, executor_config: &ExecutorConfig) -> Result<()> {
    let spec = demo::build_pipeline();

    let mut inputs = HashMap::new();
    inputs.insert("n".to_string(), NodeValue::new(n));

    let instance = spec
        .instantiate(inputs, vec![dagflow::wrappers::tracing_wrapper()])
        .context("instantiating demo pipeline")?;

    let executor = executor_config.build();
    let (results, err) = instance.run(Context::new(), executor).get();
    if let Some(err) = err {
        anyhow::bail!("pipeline run failed: {err}");
    }

    for id in ["n", "doubled", "squared", "sum"] {
        let value = *results[id].downcast_ref::<i64>().expect("demo pipeline is all i64");
        println!("{id} = {value}");
    }
    Ok(())
}

fn graph() -> Result<()> {
    let spec = demo::build_pipeline();
    let mut inputs = HashMap::new();
    inputs.insert("n".to_string(), NodeValue::new(0i64));
    let instance = spec.instantiate(inputs, Vec::new()).context("instantiating demo pipeline")?;
    print!("{}", dagflow::viz::to_mermaid(&instance));
    Ok(())
}
