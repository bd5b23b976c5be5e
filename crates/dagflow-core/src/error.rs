//! Error types for dagflow-core.

use std::sync::Arc;

/// Result type for dagflow-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors observable at the boundary of the future/DAG core.
///
/// Every variant here is a distinct, matchable identity per spec: structural
/// DAG errors are synchronous and never retried; `Panic`/`Timeout` are
/// produced by combinators; `NodeNotExecuted` is produced only by the DAG
/// instance's failure fan-out.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A submitted task panicked. Carries the panic payload (best-effort
    /// stringified) and a captured backtrace.
    #[error("async panic: {cause}")]
    Panic {
        cause: String,
        backtrace: Arc<std::backtrace::Backtrace>,
    },

    /// A combinator (`timeout`/`deadline`) lost the race to its timer.
    #[error("future timeout")]
    Timeout,

    /// `DagSpec::add_input`/`add_node`/`add_subgraph` given an id already
    /// registered.
    #[error("DAG node {0} already exists")]
    NodeExists(String),

    /// `DagSpec::instantiate` given an input value for a non-Input node.
    #[error("DAG node {0} is not an input")]
    NodeNotInput(String),

    /// `DagSpec::add_node` given a null runnable, or `instantiate` missing a
    /// required input value for an Input node.
    #[error("DAG node {0} is not runnable")]
    NodeNotRunnable(String),

    /// A node's cell never ran because a sibling node failed; the DAG
    /// instance marks it with this error so no waiter blocks forever.
    #[error("DAG node {0} was not executed")]
    NodeNotExecuted(String),

    /// A spec method was called on an already-frozen `DagSpec`.
    #[error("DAG is frozen")]
    Frozen,

    /// `instantiate` was called on a spec that has not been frozen yet.
    #[error("DAG is not frozen")]
    NotFrozen,

    /// `freeze` found a dependency id that does not name a node in the spec.
    #[error("DAG is incomplete: {0}")]
    Incomplete(String),

    /// `freeze` found a cycle via Kahn's algorithm.
    #[error("DAG is cyclic")]
    Cyclic,

    /// Catch-all for node-body errors that don't need a dedicated variant;
    /// node runnables return `dagflow_core::Result<T>` and may produce any
    /// message here so the DAG core stays generic over node error types.
    #[error("{0}")]
    Node(String),
}

impl Error {
    /// Short, stable tag for log correlation and `matches!`-free comparisons.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Panic { .. } => "panic",
            Error::Timeout => "timeout",
            Error::NodeExists(_) => "node_exists",
            Error::NodeNotInput(_) => "node_not_input",
            Error::NodeNotRunnable(_) => "node_not_runnable",
            Error::NodeNotExecuted(_) => "node_not_executed",
            Error::Frozen => "frozen",
            Error::NotFrozen => "not_frozen",
            Error::Incomplete(_) => "incomplete",
            Error::Cyclic => "cyclic",
            Error::Node(_) => "node",
        }
    }
}
