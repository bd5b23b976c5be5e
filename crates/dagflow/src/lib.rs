//! dagflow: a composable asynchronous-value library plus a DAG execution
//! engine built on top of it.
//!
//! This is the stable, user-facing facade over `dagflow-core` — the hard
//! engineering (lock-free cell, combinators, scheduler) lives there; this
//! crate re-exports its public surface through [`prelude`] and bundles the
//! Mermaid visualizer as ambient tooling rather than a separate crate.
//!
//! ```
//! use dagflow::prelude::*;
//! use std::sync::Arc;
//!
//! let spec = Arc::new(DagSpec::new());
//! spec.add_node(
//!     "answer",
//!     Vec::<String>::new(),
//!     Some(Arc::new(|_: &Context, _: &DepValues| Ok(NodeValue::new(42))) as Runnable),
//! ).unwrap();
//! spec.freeze().unwrap();
//!
//! let instance = spec.instantiate(Default::default(), Vec::new()).unwrap();
//! let (results, err) = instance.run(Context::new(), Arc::new(ThreadExecutor)).get();
//! assert!(err.is_none());
//! assert_eq!(*results["answer"].downcast_ref::<i32>().unwrap(), 42);
//! ```

pub mod viz;

pub use dagflow_core::*;

pub mod prelude {
    //! Common imports for dagflow users.
    //!
    //! ```
    //! use dagflow::prelude::*;
    //! ```

    pub use dagflow_core::{
        dag::{DagInstance, DagSpec, DepValues, InputRemap, NodeId, NodeInstance, NodeValue, OutputRemap, Runnable, Wrapper},
        done_of, join_all, race, race_collect_on_all_err, submit, submit_with_context, timeout,
        deadline, transform, transform_async, CancellationToken, Context, Error, Executor, Future,
        PoolExecutor, Promise, RaceResult, Result, ThreadExecutor,
    };
    pub use crate::viz::to_mermaid;
}
