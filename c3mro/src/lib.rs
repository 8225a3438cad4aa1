//! C3 method resolution order and chained next-method dispatch.
//!
//! This crate models a multiple-inheritance type graph, computes the C3
//! linearization of every type in it, and runs method bodies that can hand
//! control to "the next implementation" further along that order.
//!
//! # Pipeline
//!
//! ```text
//! ┌───────────┐    ┌────────────┐    ┌──────────┐    ┌─────────┐
//! │ Hierarchy │───►│ Linearizer │───►│ Resolver │───►│ Runtime │
//! │  (graph)  │    │    (C3)    │    │ (lookup) │    │ (frames)│
//! └───────────┘    └────────────┘    └──────────┘    └─────────┘
//! ```
//!
//! 1. **Declare** types with [`Hierarchy::declare`]; parents must exist.
//! 2. **Linearize** with [`Hierarchy::linearize`]; results are cached.
//! 3. **Resolve** a method name from a position with
//!    [`DispatchResolver::resolve_from`].
//! 4. **Invoke** with [`Hierarchy::invoke`]; bodies receive a [`CallFrame`]
//!    and may call [`Invocation::call_next`].
//!
//! # Example
//!
//! ```
//! use c3mro::{Hierarchy, Value};
//!
//! let mut h = Hierarchy::new();
//! let a = h.declare("A", &[]).unwrap();
//! let b = h.declare("B", &[a]).unwrap();
//! let c = h.declare("C", &[a]).unwrap();
//! let d = h.declare("D", &[b, c]).unwrap();
//!
//! h.define(a, "greet", |inv, _frame, _args| {
//!     inv.emit("A::greet");
//!     Ok(Value::Null)
//! }).unwrap();
//! h.define(b, "greet", |inv, frame, args| {
//!     inv.emit("B::greet");
//!     inv.call_next(frame, args)?;
//!     Ok(Value::Null)
//! }).unwrap();
//!
//! assert_eq!(h.mro_names(d).unwrap(), ["D", "B", "C", "A", "object"]);
//! let outcome = h.invoke(d, "greet", &[]).unwrap();
//! assert_eq!(outcome.transcript, ["B::greet", "A::greet"]);
//! ```

pub mod config;
pub mod dispatch;
pub mod graph;
pub mod linearize;
pub mod runtime;
pub mod script;

use thiserror::Error;

pub use config::RuntimeConfig;
pub use dispatch::{DispatchResolver, Resolution};
pub use graph::{Hierarchy, TypeId, TypeNode};
pub use linearize::{merge, Linearization, Linearizer};
pub use runtime::{CallFrame, FrameState, Invocation, Method, Outcome, Value};
pub use script::{HierarchyFile, Scenario, ScenarioReport, ScriptError, Step, TypeDecl};

/// Errors raised while building a hierarchy, linearizing it, or
/// dispatching through it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MroError {
    #[error("type `{name}` is already declared")]
    DuplicateName { name: String },

    #[error("type `{name}` names undeclared parent `{parent}`")]
    UnknownParent { name: String, parent: String },

    #[error("type `{name}` lists parent `{parent}` more than once")]
    DuplicateParent { name: String, parent: String },

    #[error(
        "cannot create a consistent method resolution order for `{name}`: conflicting bases {list}",
        list = .conflicts.join(", ")
    )]
    InconsistentHierarchy { name: String, conflicts: Vec<String> },

    #[error("`{receiver}` has no method `{method}`")]
    MethodNotFound { receiver: String, method: String },

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("call depth limit of {limit} exceeded while calling `{method}`")]
    CallDepthExceeded { method: String, limit: usize },
}

/// Result type for hierarchy operations.
pub type MroResult<T> = Result<T, MroError>;
