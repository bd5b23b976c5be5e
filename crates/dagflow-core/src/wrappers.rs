//! Ready-made node [`Wrapper`](crate::dag::Wrapper)s. A `Wrapper` observes
//! execution without altering graph semantics; this module's
//! `tracing_wrapper` reports per-node progress through `tracing` spans and
//! events rather than a bespoke callback trait.

use std::sync::Arc;

use crate::dag::{DepValues, NodeInstance, Runnable, Wrapper};
use crate::executor::Context;

/// Wraps every node's body in an `info_span` and logs start/finish/failure.
/// Calling the inner runnable exactly once per invocation keeps each node's
/// `Duration` authoritative, matching the contract wrappers must uphold.
pub fn tracing_wrapper() -> Wrapper {
    Arc::new(|node: &NodeInstance, inner: Runnable| {
        let id = node.id().to_string();
        let wrapped: Runnable = Arc::new(move |ctx: &Context, deps: &DepValues| {
            let span = tracing::info_span!("dag_node", node = %id);
            let _enter = span.enter();
            tracing::debug!(node = %id, "node started");
            let result = inner(ctx, deps);
            match &result {
                Ok(_) => tracing::debug!(node = %id, "node finished"),
                Err(err) => tracing::warn!(node = %id, %err, "node failed"),
            }
            result
        });
        wrapped
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{DagSpec, NodeValue};
    use crate::executor::ThreadExecutor;
    use std::collections::HashMap;
    use std::sync::Arc as StdArc;

    #[test]
    fn tracing_wrapper_preserves_result() {
        let spec = StdArc::new(DagSpec::new());
        spec.add_node(
            "A",
            Vec::<String>::new(),
            Some(StdArc::new(|_: &Context, _: &DepValues| Ok(NodeValue::new(5))) as Runnable),
        )
        .unwrap();
        spec.freeze().unwrap();

        let instance = spec
            .instantiate(HashMap::new(), vec![tracing_wrapper()])
            .unwrap();
        let (results, err) = instance.run(Context::new(), StdArc::new(ThreadExecutor)).get();
        assert!(err.is_none());
        assert_eq!(*results["A"].downcast_ref::<i32>().unwrap(), 5);
    }
}
