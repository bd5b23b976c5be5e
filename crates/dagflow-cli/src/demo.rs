//! A small bundled demo graph: `dagflow` has no external DAG-description
//! format of its own, so this CLI demonstrates the engine against a graph
//! built directly with the public `DagSpec` API instead of parsing one from
//! a file.

use std::sync::Arc;

use dagflow::prelude::*;

/// `n` (input) -> `doubled` = n*2, `squared` = n*n -> `sum` = doubled + squared.
pub fn build_pipeline() -> Arc<DagSpec> {
    let spec = Arc::new(DagSpec::new());

    spec.add_input("n").expect("fresh spec, unique id");

    spec.add_node(
        "doubled",
        vec!["n"],
        Some(Arc::new(|_: &Context, deps: &DepValues| {
            let n = *deps["n"].downcast_ref::<i64>().expect("n is an i64");
            Ok(NodeValue::new(n * 2))
        }) as Runnable),
    )
    .expect("fresh spec, unique id");

    spec.add_node(
        "squared",
        vec!["n"],
        Some(Arc::new(|_: &Context, deps: &DepValues| {
            let n = *deps["n"].downcast_ref::<i64>().expect("n is an i64");
            Ok(NodeValue::new(n * n))
        }) as Runnable),
    )
    .expect("fresh spec, unique id");

    spec.add_node(
        "sum",
        vec!["doubled", "squared"],
        Some(Arc::new(|_: &Context, deps: &DepValues| {
            let doubled = *deps["doubled"].downcast_ref::<i64>().expect("doubled is an i64");
            let squared = *deps["squared"].downcast_ref::<i64>().expect("squared is an i64");
            Ok(NodeValue::new(doubled + squared))
        }) as Runnable),
    )
    .expect("fresh spec, unique id");

    spec.freeze().expect("graph is complete and acyclic");
    spec
}
