//! End-to-end DAG scenarios exercised through the public crate surface only
//! (no access to crate-internal items), complementing the colocated unit
//! tests in `src/dag.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dagflow_core::{
    Context, DagSpec, DepValues, Error, NodeValue, PoolExecutor, Result, Runnable, ThreadExecutor,
};

fn node(f: impl Fn(&Context, &DepValues) -> Result<NodeValue> + Send + Sync + 'static) -> Option<Runnable> {
    Some(Arc::new(f))
}

#[test]
fn two_node_chain_produces_expected_results() {
    let spec = Arc::new(DagSpec::new());
    spec.add_node("A", Vec::<String>::new(), node(|_, _| Ok(NodeValue::new("a".to_string()))))
        .unwrap();
    spec.add_node(
        "B",
        vec!["A"],
        node(|_, deps| {
            let a = deps["A"].downcast_ref::<String>().unwrap();
            Ok(NodeValue::new(format!("{a}b")))
        }),
    )
    .unwrap();
    spec.freeze().unwrap();

    let instance = spec.instantiate(HashMap::new(), Vec::new()).unwrap();
    let (results, err) = instance.run(Context::new(), Arc::new(ThreadExecutor)).get();
    assert!(err.is_none());
    assert_eq!(results["A"].downcast_ref::<String>().unwrap(), "a");
    assert_eq!(results["B"].downcast_ref::<String>().unwrap(), "ab");
}

#[test]
fn input_node_feeds_dependent_and_rejects_mismatched_instantiation() {
    let spec = Arc::new(DagSpec::new());
    spec.add_input("A").unwrap();
    spec.add_node("B", vec!["A"], node(|_, deps| Ok(deps["A"].clone()))).unwrap();
    spec.freeze().unwrap();

    let mut inputs = HashMap::new();
    inputs.insert("A".to_string(), NodeValue::new("a".to_string()));
    let instance = spec.instantiate(inputs, Vec::new()).unwrap();
    let (results, err) = instance.run(Context::new(), Arc::new(ThreadExecutor)).get();
    assert!(err.is_none());
    assert_eq!(results["B"].downcast_ref::<String>().unwrap(), "a");

    let missing = spec.instantiate(HashMap::new(), Vec::new()).unwrap_err();
    assert!(matches!(missing, Error::NodeNotRunnable(id) if id == "A"));

    let compute_spec = Arc::new(DagSpec::new());
    compute_spec
        .add_node("C", Vec::<String>::new(), node(|_, _| Ok(NodeValue::new(1))))
        .unwrap();
    compute_spec.freeze().unwrap();
    let mut extra = HashMap::new();
    extra.insert("C".to_string(), NodeValue::new(1));
    let not_input = compute_spec.instantiate(extra, Vec::new()).unwrap_err();
    assert!(matches!(not_input, Error::NodeNotInput(id) if id == "C"));
}

#[test]
fn failure_fans_out_without_deadlocking_siblings() {
    let spec = Arc::new(DagSpec::new());
    spec.add_node("A", Vec::<String>::new(), node(|_, _| Err(Error::Node("fail".into()))))
        .unwrap();
    spec.add_node("B", vec!["A"], node(|_, _| Ok(NodeValue::new(1)))).unwrap();
    spec.add_node("C", Vec::<String>::new(), node(|_, _| Ok(NodeValue::new(2)))).unwrap();
    spec.freeze().unwrap();

    let instance = spec.instantiate(HashMap::new(), Vec::new()).unwrap();
    let (_results, err) = instance.run(Context::new(), Arc::new(ThreadExecutor)).get();
    assert!(err.is_some());

    let (_, a_err) = instance.node("A").unwrap().future().get();
    assert!(matches!(a_err, Some(Error::Node(_))));
    let (_, b_err) = instance.node("B").unwrap().future().get();
    assert!(matches!(b_err, Some(Error::NodeNotExecuted(_))));
    // C never depended on the failing node and still ran to completion.
    let (c_val, c_err) = instance.node("C").unwrap().future().get();
    assert!(c_err.is_none());
    assert_eq!(*c_val.downcast_ref::<i32>().unwrap(), 2);
}

#[test]
fn race_against_timeout_picks_whichever_settles_first() {
    use dagflow_core::{submit, timeout};

    let slow = submit(&ThreadExecutor, || {
        std::thread::sleep(Duration::from_millis(50));
        (1, None)
    });
    let (_, err) = timeout(slow, Duration::from_millis(1)).get();
    assert!(matches!(err, Some(Error::Timeout)));

    let fast = submit(&ThreadExecutor, || (1, None));
    let (val, err) = timeout(fast, Duration::from_millis(50)).get();
    assert!(err.is_none());
    assert_eq!(val, 1);
}

#[test]
fn cyclic_dependency_is_rejected_at_freeze() {
    let spec = DagSpec::new();
    spec.add_node("A", vec!["B"], node(|_, _| Ok(NodeValue::new(1)))).unwrap();
    spec.add_node("B", vec!["A"], node(|_, _| Ok(NodeValue::new(1)))).unwrap();
    assert!(matches!(spec.freeze().unwrap_err(), Error::Cyclic));
}

#[test]
fn two_independent_roots_run_in_parallel_on_a_pool() {
    let spec = Arc::new(DagSpec::new());
    for id in ["A", "B"] {
        spec.add_node(id, Vec::<String>::new(), node(|_, _| {
            std::thread::sleep(Duration::from_millis(30));
            Ok(NodeValue::new(1))
        }))
        .unwrap();
    }
    spec.freeze().unwrap();

    let instance = spec.instantiate(HashMap::new(), Vec::new()).unwrap();
    let start = Instant::now();
    let (_results, err) = instance.run(Context::new(), Arc::new(PoolExecutor::new(2))).get();
    assert!(err.is_none());
    assert!(start.elapsed() < Duration::from_millis(55), "roots should overlap, not serialize");
}
