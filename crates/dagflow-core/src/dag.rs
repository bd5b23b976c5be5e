//! The DAG spec/instance pair: a statically validated dependency graph that
//! is instantiated into fresh per-run cells and scheduled as in-degrees
//! reach zero.
//!
//! Node payloads are type-erased as [`NodeValue`] (an `Arc<dyn Any + Send +
//! Sync>` with a usable zero value) since a single `DagSpec` mixes nodes of
//! different result types; a typed reflection front-end that re-keys results
//! by Rust type is an external collaborator and is not part of this crate.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::combinators::{join_all, submit_with_context, transform};
use crate::error::{Error, Result};
use crate::executor::{Context, Executor};
use crate::handle::{Future, Promise};

/// Opaque node identifier.
pub type NodeId = String;

/// A type-erased node result with a usable [`Default`] ("zero value"),
/// needed because [`crate::cell::Cell`] requires `T: Default` but a DAG
/// mixes nodes of unrelated result types.
#[derive(Clone)]
pub struct NodeValue(Arc<dyn Any + Send + Sync>);

impl NodeValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        NodeValue(Arc::new(value))
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Default for NodeValue {
    fn default() -> Self {
        NodeValue(Arc::new(()))
    }
}

/// A node's deps, resolved to their published values, handed to a
/// [`Runnable`] / remap closure.
pub type DepValues = HashMap<NodeId, NodeValue>;

/// A Compute node's body: reads resolved dep values, produces a result or an
/// error.
pub type Runnable = Arc<dyn Fn(&Context, &DepValues) -> Result<NodeValue> + Send + Sync>;

/// Reduces a Subgraph node's own deps into inputs for its inner spec.
pub type InputRemap = Arc<dyn Fn(&DepValues) -> DepValues + Send + Sync>;

/// Reduces an inner spec's harvested results into this Subgraph node's one
/// published value.
pub type OutputRemap = Arc<dyn Fn(&HashMap<NodeId, NodeValue>) -> NodeValue + Send + Sync>;

/// A decorator applied to a node's [`Runnable`] at run time: the first wrapper in the list given to `instantiate` ends up
/// outermost.
pub type Wrapper = Arc<dyn Fn(&NodeInstance, Runnable) -> Runnable + Send + Sync>;

#[derive(Clone)]
enum NodeKind {
    Input,
    Compute(Runnable),
    Subgraph {
        inner: Arc<DagSpec>,
        input_remap: InputRemap,
        output_remap: OutputRemap,
    },
}

#[derive(Clone)]
struct NodeSpec {
    id: NodeId,
    deps: Vec<NodeId>,
    kind: NodeKind,
}

/// Static, freezable dependency graph.
///
/// Mutable (`add_input`/`add_node`/`add_subgraph`) until [`DagSpec::freeze`]
/// succeeds; frozen specs are structurally immutable and safe to
/// [`DagSpec::instantiate`] concurrently any number of times.
pub struct DagSpec {
    nodes: RwLock<HashMap<NodeId, NodeSpec>>,
    frozen: AtomicBool,
}

impl Default for DagSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl DagSpec {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    fn insert(&self, id: NodeId, deps: Vec<NodeId>, kind: NodeKind) -> Result<()> {
        if self.is_frozen() {
            return Err(Error::Frozen);
        }
        let mut nodes = self.nodes.write().unwrap();
        if nodes.contains_key(&id) {
            return Err(Error::NodeExists(id));
        }
        nodes.insert(id.clone(), NodeSpec { id, deps, kind });
        Ok(())
    }

    /// Registers an Input node: its value is supplied at `instantiate` time
    /// rather than computed.
    pub fn add_input(&self, id: impl Into<String>) -> Result<()> {
        self.insert(id.into(), Vec::new(), NodeKind::Input)
    }

    /// Registers a Compute node. Dep ids may reference nodes not yet added
    /// (forward references are resolved at `freeze`).
    ///
    /// `runnable` is `Option` rather than a bare closure so the "null
    /// runnable" failure mode (`NotRunnable`) has a value to check for —
    /// Rust has no null function pointers to pass by accident.
    pub fn add_node(
        &self,
        id: impl Into<String>,
        deps: Vec<impl Into<String>>,
        runnable: Option<Runnable>,
    ) -> Result<()> {
        let id = id.into();
        let Some(runnable) = runnable else {
            return Err(Error::NodeNotRunnable(id));
        };
        let deps = deps.into_iter().map(Into::into).collect();
        self.insert(id, deps, NodeKind::Compute(runnable))
    }

    /// Registers a Subgraph node. `inner` must already be frozen.
    pub fn add_subgraph(
        &self,
        id: impl Into<String>,
        deps: Vec<impl Into<String>>,
        inner: Arc<DagSpec>,
        input_remap: InputRemap,
        output_remap: OutputRemap,
    ) -> Result<()> {
        if !inner.is_frozen() {
            return Err(Error::NotFrozen);
        }
        let id = id.into();
        let deps = deps.into_iter().map(Into::into).collect();
        self.insert(
            id,
            deps,
            NodeKind::Subgraph {
                inner,
                input_remap,
                output_remap,
            },
        )
    }

    /// Validates completeness (every dep id names a node in this spec) and
    /// acyclicity (Kahn's algorithm), then marks the spec immutable.
    /// Idempotent: freezing an already-frozen spec is a no-op.
    pub fn freeze(&self) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        let nodes = self.nodes.read().unwrap();

        for spec in nodes.values() {
            for dep in &spec.deps {
                if !nodes.contains_key(dep) {
                    return Err(Error::Incomplete(format!(
                        "node {} depends on undeclared node {}",
                        spec.id, dep
                    )));
                }
            }
        }

        let mut indegree: HashMap<&str, usize> = nodes
            .values()
            .map(|s| (s.id.as_str(), s.deps.len()))
            .collect();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for spec in nodes.values() {
            for dep in &spec.deps {
                children.entry(dep.as_str()).or_default().push(spec.id.as_str());
            }
        }

        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut processed = 0usize;
        while let Some(id) = queue.pop_front() {
            processed += 1;
            if let Some(kids) = children.get(id) {
                for &child in kids {
                    let d = indegree.get_mut(child).unwrap();
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
        if processed != nodes.len() {
            return Err(Error::Cyclic);
        }

        drop(nodes);
        self.frozen.store(true, Ordering::Release);
        Ok(())
    }

    /// Allocates a fresh [`DagInstance`]: one cell per node, Input cells
    /// published immediately from `inputs`. Requires the spec be frozen.
    pub fn instantiate(
        self: &Arc<Self>,
        inputs: HashMap<NodeId, NodeValue>,
        wrappers: Vec<Wrapper>,
    ) -> Result<Arc<DagInstance>> {
        if !self.is_frozen() {
            return Err(Error::NotFrozen);
        }
        let nodes = self.nodes.read().unwrap();

        for spec in nodes.values() {
            match spec.kind {
                NodeKind::Input => {
                    if !inputs.contains_key(&spec.id) {
                        return Err(Error::NodeNotRunnable(spec.id.clone()));
                    }
                }
                _ => {
                    if inputs.contains_key(&spec.id) {
                        return Err(Error::NodeNotInput(spec.id.clone()));
                    }
                }
            }
        }

        let mut children: HashMap<NodeId, Vec<NodeId>> =
            nodes.keys().map(|id| (id.clone(), Vec::new())).collect();
        for spec in nodes.values() {
            for dep in &spec.deps {
                children.get_mut(dep).unwrap().push(spec.id.clone());
            }
        }

        let mut instances = HashMap::with_capacity(nodes.len());
        for spec in nodes.values() {
            let promise = Promise::<NodeValue>::new();
            let future = promise.future();
            if let NodeKind::Input = spec.kind {
                let value = inputs
                    .get(&spec.id)
                    .cloned()
                    .expect("presence checked above");
                promise.set(value, None);
            }
            instances.insert(
                spec.id.clone(),
                Arc::new(NodeInstance {
                    id: spec.id.clone(),
                    deps: spec.deps.clone(),
                    children: children.remove(&spec.id).unwrap_or_default(),
                    kind: spec.kind.clone(),
                    pending: AtomicUsize::new(spec.deps.len()),
                    promise,
                    future,
                    started_at: Mutex::new(None),
                    duration: Mutex::new(None),
                    subgraph: Mutex::new(None),
                }),
            );
        }

        Ok(Arc::new(DagInstance {
            nodes: instances,
            wrappers,
        }))
    }
}

/// Per-execution state for one DAG node.
pub struct NodeInstance {
    id: NodeId,
    deps: Vec<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    pending: AtomicUsize,
    promise: Promise<NodeValue>,
    future: Future<NodeValue>,
    started_at: Mutex<Option<Instant>>,
    duration: Mutex<Option<Duration>>,
    subgraph: Mutex<Option<Arc<DagInstance>>>,
}

impl NodeInstance {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn deps(&self) -> &[NodeId] {
        &self.deps
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input)
    }

    pub fn future(&self) -> Future<NodeValue> {
        self.future.clone()
    }

    /// Non-`None` once this node has started executing (never set for Input
    /// nodes, whose cell is published at instantiate time).
    pub fn started_at(&self) -> Option<Instant> {
        *self.started_at.lock().unwrap()
    }

    /// Wall-clock time this node's body took, once it has finished.
    pub fn duration(&self) -> Option<Duration> {
        *self.duration.lock().unwrap()
    }

    /// The inner [`DagInstance`] this node spawned, if it is a Subgraph node
    /// that has started running.
    pub fn subgraph(&self) -> Option<Arc<DagInstance>> {
        self.subgraph.lock().unwrap().clone()
    }
}

/// A per-execution wiring of a frozen [`DagSpec`]: fresh cells, topological
/// scheduling, and the aggregate completion future.
pub struct DagInstance {
    nodes: HashMap<NodeId, Arc<NodeInstance>>,
    wrappers: Vec<Wrapper>,
}

impl DagInstance {
    pub fn node(&self, id: &str) -> Option<&Arc<NodeInstance>> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<NodeInstance>> {
        self.nodes.values()
    }

    /// Schedules every root node (in-degree zero) through `executor`, then
    /// returns the run's terminal future: a map of every node's result,
    /// keyed by id. If any node errors, every node whose cell never reached
    /// DONE is marked [`Error::NodeNotExecuted`] so no outstanding waiter
    /// blocks forever, and the
    /// terminal future itself carries the first error.
    pub fn run(
        self: &Arc<Self>,
        ctx: Context,
        executor: Arc<dyn Executor>,
    ) -> Future<HashMap<NodeId, NodeValue>> {
        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();

        for id in &ids {
            if self.nodes[id].pending.load(Ordering::Acquire) == 0 {
                self.schedule(ctx.clone(), executor.clone(), id);
            }
        }

        let futures: Vec<Future<NodeValue>> = ids.iter().map(|id| self.nodes[id].future()).collect();
        let this = self.clone();
        let harvest_ids = ids;

        transform(join_all(futures), move |_vals, err| {
            if err.is_some() {
                for id in &harvest_ids {
                    this.nodes[id]
                        .promise
                        .set_safe(NodeValue::default(), Some(Error::NodeNotExecuted(id.clone())));
                }
            }
            let harvested: HashMap<NodeId, NodeValue> = harvest_ids
                .iter()
                .map(|id| (id.clone(), this.nodes[id].future().get().0))
                .collect();
            (harvested, err)
        })
    }

    fn schedule(self: &Arc<Self>, ctx: Context, executor: Arc<dyn Executor>, id: &str) {
        let node = self.nodes[id].clone();

        if matches!(node.kind, NodeKind::Input) {
            self.advance_children(ctx, executor, &node);
            return;
        }

        let deps_values: DepValues = node
            .deps
            .iter()
            .map(|dep| (dep.clone(), self.nodes[dep].future().get().0))
            .collect();
        let runnable = self.build_runnable(&node, executor.clone());

        *node.started_at.lock().unwrap() = Some(Instant::now());

        let this = self.clone();
        let node_for_cb = node.clone();
        let ctx_for_children = ctx.clone();
        let executor_for_children = executor.clone();

        let task: Future<NodeValue> = submit_with_context(executor.as_ref(), ctx, move |ctx| {
            match runnable(&ctx, &deps_values) {
                Ok(value) => (value, None),
                Err(err) => (NodeValue::default(), Some(err)),
            }
        });

        task.subscribe(move |val, err| {
            let started = node_for_cb
                .started_at
                .lock()
                .unwrap()
                .expect("started_at set immediately before submit");
            *node_for_cb.duration.lock().unwrap() = Some(started.elapsed());

            let succeeded = err.is_none();
            node_for_cb.promise.set_safe(val, err);
            if succeeded {
                this.advance_children(ctx_for_children, executor_for_children, &node_for_cb);
            }
        });
    }

    fn advance_children(
        self: &Arc<Self>,
        ctx: Context,
        executor: Arc<dyn Executor>,
        node: &Arc<NodeInstance>,
    ) {
        for child_id in &node.children {
            let child = &self.nodes[child_id];
            if child.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                self.schedule(ctx.clone(), executor.clone(), child_id);
            }
        }
    }

    fn build_runnable(&self, node: &NodeInstance, executor: Arc<dyn Executor>) -> Runnable {
        let base: Runnable = match &node.kind {
            NodeKind::Compute(f) => f.clone(),
            NodeKind::Subgraph {
                inner,
                input_remap,
                output_remap,
            } => {
                let inner = inner.clone();
                let input_remap = input_remap.clone();
                let output_remap = output_remap.clone();
                let wrappers = self.wrappers.clone();
                let back_ref = node.subgraph.clone();
                Arc::new(move |ctx: &Context, deps: &DepValues| {
                    let inner_inputs = input_remap(deps);
                    let inner_instance = inner.instantiate(inner_inputs, wrappers.clone())?;
                    *back_ref.lock().unwrap() = Some(inner_instance.clone());
                    let (results, err) = inner_instance.run(ctx.clone(), executor.clone()).get();
                    if let Some(err) = err {
                        return Err(err);
                    }
                    Ok(output_remap(&results))
                })
            }
            NodeKind::Input => unreachable!("input nodes never execute a runnable"),
        };

        let mut runnable = base;
        for wrapper in self.wrappers.iter().rev() {
            runnable = wrapper(node, runnable);
        }
        runnable
    }
}
