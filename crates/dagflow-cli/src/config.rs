//! `ExecutorConfig`: the CLI's choice of [`Executor`] implementation, threaded
//! through its subcommands as a `clap`-derived arg group.

use std::sync::Arc;

use dagflow::{Executor, PoolExecutor, ThreadExecutor};

/// Which [`Executor`] a run should use.
#[derive(Debug, Clone, clap::Args)]
pub struct ExecutorConfig {
    /// Use a bounded worker pool instead of the default spawn-per-submission
    /// executor.
    #[arg(long)]
    pub pool: bool,

    /// Worker count when `--pool` is set.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
}

impl ExecutorConfig {
    pub fn build(&self) -> Arc<dyn Executor> {
        if self.pool {
            Arc::new(PoolExecutor::new(self.workers))
        } else {
            Arc::new(ThreadExecutor)
        }
    }
}
