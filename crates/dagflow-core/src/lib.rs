//! Lock-free promise/future primitives and a DAG execution engine built on
//! top of them.
//!
//! - [`cell`] (private): the single-assignment state machine underlying
//!   every promise/future pair.
//! - [`handle`]: [`Promise`]/[`Future`], the write/read ends of a cell.
//! - [`combinators`]: `transform`, `race`, `join_all`, `timeout`, ... built
//!   solely on promises/futures and an [`Executor`].
//! - [`executor`]: the [`Executor`] capability, its default and pooled
//!   implementations, and the cooperative [`Context`].
//! - [`dag`]: the static [`DagSpec`] and its per-run [`DagInstance`].
//! - [`wrappers`]: ready-made node wrappers (currently: `tracing`-backed
//!   logging).
//!
//! See `DESIGN.md` at the workspace root for the rationale behind the pieces
//! that don't have a 1:1 `std` equivalent (the status-word layout, the
//! Treiber-stack callback list, the two-level error shape of `race`).

mod cell;

pub mod combinators;
pub mod dag;
pub mod error;
pub mod executor;
pub mod handle;
pub mod tuple;
pub mod wrappers;

pub use combinators::{
    done_of, join_all, race, race_collect_on_all_err, submit, submit_with_context, timeout,
    deadline, transform, transform_async, RaceResult,
};
pub use dag::{DagInstance, DagSpec, DepValues, InputRemap, NodeId, NodeInstance, NodeValue, OutputRemap, Runnable, Wrapper};
pub use error::{Error, Result};
pub use executor::{default_executor, set_default_executor, CancellationToken, Context, Executor, PoolExecutor, ThreadExecutor};
pub use handle::{Future, Promise};
pub use tuple::*;
