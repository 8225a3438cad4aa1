//! Chained-call runtime.
//!
//! An [`Invocation`] runs method bodies against a receiver's linearization.
//! Each running body owns a [`CallFrame`]: the method name, the receiver's
//! linearization, and the index of the implementation being executed.
//! Position lives in the frame, not in the receiver, so two chains for
//! different method names never share a cursor.
//!
//! ## Next-calls
//!
//! A body can continue the chain in three ways:
//!
//! - [`Invocation::call_next`]: the next implementation of the *same*
//!   name, searched from one past the frame's index. No-op once the root
//!   has been passed.
//! - [`Invocation::call_method`]: a fresh dispatch of another name from
//!   index 0 of the same linearization. The calling frame is untouched.
//! - [`Invocation::call_super`]: another name, searched from one past the
//!   calling frame's index. This mirrors `super().other()` in languages
//!   with cooperative multiple inheritance.
//!
//! ## Frame states
//!
//! ```text
//! Dispatching ──► Executing ──► Returned
//!                   │   ▲
//!                   ▼   │
//!                 Delegating
//! ```

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use string_interner::DefaultSymbol;
use tracing::{debug, trace};

use crate::dispatch::DispatchResolver;
use crate::graph::{Hierarchy, TypeId};
use crate::linearize::Linearization;
use crate::{MroError, MroResult};

pub use serde_json::Value;

/// A method body.
///
/// Bodies receive the running invocation, their own frame, and the call
/// arguments. They are shared so that one body can serve many types.
pub type Method =
    Arc<dyn Fn(&mut Invocation<'_>, &CallFrame, &[Value]) -> MroResult<Value> + Send + Sync>;

/// Lifecycle of a [`CallFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Created, implementation not yet entered.
    Dispatching,
    /// The implementation body is running.
    Executing,
    /// The body handed control to another implementation.
    Delegating,
    /// The body finished. Terminal.
    Returned,
}

/// Cursor for one chained call.
pub struct CallFrame {
    method: DefaultSymbol,
    linearization: Linearization,
    index: usize,
    state: Cell<FrameState>,
}

impl CallFrame {
    fn new(method: DefaultSymbol, linearization: Linearization, index: usize) -> Self {
        Self {
            method,
            linearization,
            index,
            state: Cell::new(FrameState::Dispatching),
        }
    }

    /// The interned method name this frame resolves.
    pub fn method(&self) -> DefaultSymbol {
        self.method
    }

    /// The receiver's linearization.
    pub fn linearization(&self) -> &Linearization {
        &self.linearization
    }

    /// Index of the running implementation in [`linearization`](Self::linearization).
    pub fn index(&self) -> usize {
        self.index
    }

    /// The receiver: the type the chain was started on.
    pub fn receiver(&self) -> TypeId {
        self.linearization.as_slice()[0]
    }

    /// The type whose implementation this frame runs.
    pub fn node(&self) -> TypeId {
        self.linearization.as_slice()[self.index]
    }

    pub fn state(&self) -> FrameState {
        self.state.get()
    }

    fn transition(&self, to: FrameState) {
        trace!(index = self.index, from = ?self.state.get(), ?to, "frame");
        self.state.set(to);
    }
}

impl fmt::Debug for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFrame")
            .field("method", &self.method)
            .field("index", &self.index)
            .field("state", &self.state.get())
            .finish()
    }
}

/// Result of a top-level invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Value returned by the first implementation.
    pub value: Value,
    /// Lines emitted by every body in the chain, in order.
    pub transcript: Vec<String>,
}

/// A running call chain against one hierarchy.
pub struct Invocation<'h> {
    hierarchy: &'h Hierarchy,
    transcript: Vec<String>,
    depth: usize,
}

impl<'h> Invocation<'h> {
    pub fn new(hierarchy: &'h Hierarchy) -> Self {
        Self {
            hierarchy,
            transcript: Vec::new(),
            depth: 0,
        }
    }

    pub fn hierarchy(&self) -> &'h Hierarchy {
        self.hierarchy
    }

    /// Appends a line to the transcript.
    pub fn emit(&mut self, line: impl Into<String>) {
        self.transcript.push(line.into());
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn into_transcript(self) -> Vec<String> {
        self.transcript
    }

    /// Current nesting depth of running bodies.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Dispatches `method` on `receiver` from the start of its linearization.
    pub fn invoke(&mut self, receiver: TypeId, method: &str, args: &[Value]) -> MroResult<Value> {
        let linearization = self.hierarchy.linearize(receiver)?;
        self.dispatch(linearization, method, args)
    }

    /// Runs the next implementation of the frame's own method name.
    ///
    /// Returns `Ok(None)` when no later type defines it.
    pub fn call_next(&mut self, frame: &CallFrame, args: &[Value]) -> MroResult<Option<Value>> {
        self.advance(frame, frame.method(), args)
    }

    /// Dispatches a different method name on the same receiver, starting
    /// from index 0. `frame` keeps its position.
    pub fn call_method(
        &mut self,
        frame: &CallFrame,
        method: &str,
        args: &[Value],
    ) -> MroResult<Value> {
        frame.transition(FrameState::Delegating);
        let result = self.dispatch(frame.linearization().clone(), method, args);
        frame.transition(FrameState::Executing);
        result
    }

    /// Runs the first implementation of `method` strictly after the frame's
    /// position. Returns `Ok(None)` when there is none.
    pub fn call_super(
        &mut self,
        frame: &CallFrame,
        method: &str,
        args: &[Value],
    ) -> MroResult<Option<Value>> {
        match self.hierarchy.symbol(method) {
            Some(symbol) => self.advance(frame, symbol, args),
            None => Ok(None),
        }
    }

    fn dispatch(
        &mut self,
        linearization: Linearization,
        method: &str,
        args: &[Value],
    ) -> MroResult<Value> {
        let resolver = DispatchResolver::new(self.hierarchy);
        let resolution = self
            .hierarchy
            .symbol(method)
            .and_then(|symbol| {
                resolver
                    .resolve_symbol_from(&linearization, 0, symbol)
                    .map(|resolution| (symbol, resolution))
            });

        let Some((symbol, resolution)) = resolution else {
            let receiver = linearization
                .head()
                .map(|ty| self.hierarchy.name_of(ty).to_string())
                .unwrap_or_default();
            return Err(MroError::MethodNotFound {
                receiver,
                method: method.to_string(),
            });
        };

        debug!(
            method,
            receiver = ?linearization.head().map(|ty| self.hierarchy.name_of(ty)),
            implementor = self.hierarchy.name_of(resolution.node),
            "dispatch"
        );
        let frame = CallFrame::new(symbol, linearization, resolution.index);
        self.execute(&frame, args)
    }

    fn advance(
        &mut self,
        frame: &CallFrame,
        method: DefaultSymbol,
        args: &[Value],
    ) -> MroResult<Option<Value>> {
        frame.transition(FrameState::Delegating);
        let resolver = DispatchResolver::new(self.hierarchy);
        let next = resolver.resolve_symbol_from(frame.linearization(), frame.index() + 1, method);

        let result = match next {
            Some(resolution) => {
                let next_frame =
                    CallFrame::new(method, frame.linearization().clone(), resolution.index);
                self.execute(&next_frame, args).map(Some)
            }
            None => {
                trace!(
                    method = self.hierarchy.method_name(method),
                    "next-call reached the root"
                );
                Ok(None)
            }
        };

        frame.transition(FrameState::Executing);
        result
    }

    fn execute(&mut self, frame: &CallFrame, args: &[Value]) -> MroResult<Value> {
        let hierarchy = self.hierarchy;
        let limit = hierarchy.config().max_call_depth;
        if self.depth >= limit {
            return Err(MroError::CallDepthExceeded {
                method: hierarchy.method_name(frame.method()).to_string(),
                limit,
            });
        }

        let node = hierarchy.node_unchecked(frame.node());
        let body = node.method(frame.method()).ok_or_else(|| MroError::MethodNotFound {
            receiver: node.name().to_string(),
            method: hierarchy.method_name(frame.method()).to_string(),
        })?;

        frame.transition(FrameState::Executing);
        self.depth += 1;
        let result = body(self, frame, args);
        self.depth -= 1;
        frame.transition(FrameState::Returned);
        result
    }
}

impl Hierarchy {
    /// Invokes `method` on `receiver` and collects the transcript.
    pub fn invoke(&self, receiver: TypeId, method: &str, args: &[Value]) -> MroResult<Outcome> {
        let mut invocation = Invocation::new(self);
        let value = invocation.invoke(receiver, method, args)?;
        Ok(Outcome {
            value,
            transcript: invocation.into_transcript(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuntimeConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn emit_and_next(
        label: &'static str,
    ) -> impl Fn(&mut Invocation<'_>, &CallFrame, &[Value]) -> MroResult<Value> {
        move |inv, frame, args| {
            inv.emit(label);
            inv.call_next(frame, args)?;
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_method_not_found() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let err = h.invoke(a, "missing", &[]).unwrap_err();
        assert_eq!(
            err,
            MroError::MethodNotFound {
                receiver: "A".into(),
                method: "missing".into()
            }
        );
    }

    #[test]
    fn test_method_defined_only_on_subtype_is_not_found() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        h.define(b, "meth", emit_and_next("B")).unwrap();
        assert!(matches!(
            h.invoke(a, "meth", &[]),
            Err(MroError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn test_call_next_stops_at_root() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        h.define(a, "meth", emit_and_next("A")).unwrap();
        h.define(b, "meth", emit_and_next("B")).unwrap();

        let outcome = h.invoke(b, "meth", &[]).unwrap();
        assert_eq!(outcome.transcript, ["B", "A"]);
    }

    #[test]
    fn test_return_values_flow_back() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        h.define(a, "sum", |_, _, args| {
            Ok(Value::from(args.iter().filter_map(Value::as_i64).sum::<i64>()))
        })
        .unwrap();
        h.define(b, "sum", |inv, frame, args| {
            let base = inv.call_next(frame, args)?.and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(Value::from(base * 10))
        })
        .unwrap();

        let outcome = h.invoke(b, "sum", &[Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(outcome.value, Value::from(30));
    }

    #[test]
    fn test_frame_states() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();

        h.define(a, "meth", |_, _, _| Ok(Value::Null)).unwrap();
        let log = Arc::clone(&seen);
        h.define(b, "meth", move |inv, frame, args| {
            log.lock().unwrap().push(frame.state());
            inv.call_next(frame, args)?;
            log.lock().unwrap().push(frame.state());
            Ok(Value::Null)
        })
        .unwrap();

        h.invoke(b, "meth", &[]).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            [FrameState::Executing, FrameState::Executing]
        );
    }

    #[test]
    fn test_frame_lifecycle_ends_returned() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        h.define(a, "meth", |_, _, _| Ok(Value::Null)).unwrap();
        h.define(b, "meth", |inv, frame, args| {
            inv.call_next(frame, args)?;
            Err(MroError::UnknownType("fail".into()))
        })
        .unwrap();

        let symbol = h.symbol("meth").unwrap();
        let lin = h.linearize(b).unwrap();

        let frame = CallFrame::new(symbol, lin.clone(), 1);
        assert_eq!(frame.state(), FrameState::Dispatching);
        assert_eq!(Invocation::new(&h).execute(&frame, &[]), Ok(Value::Null));
        assert_eq!(frame.state(), FrameState::Returned);

        // A failing body still leaves its frame returned.
        let frame = CallFrame::new(symbol, lin, 0);
        assert!(Invocation::new(&h).execute(&frame, &[]).is_err());
        assert_eq!(frame.state(), FrameState::Returned);
    }

    #[test]
    fn test_next_call_past_root_is_noop() {
        let seen = Arc::new(Mutex::new(None));
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();

        let slot = Arc::clone(&seen);
        h.define(a, "meth", move |inv, frame, args| {
            let next = inv.call_next(frame, args)?;
            *slot.lock().unwrap() = Some((next, frame.state()));
            Ok(Value::from("done"))
        })
        .unwrap();

        let outcome = h.invoke(a, "meth", &[]).unwrap();
        assert_eq!(outcome.value, Value::from("done"));
        assert_eq!(*seen.lock().unwrap(), Some((None, FrameState::Executing)));
    }

    #[test]
    fn test_call_depth_limit() {
        let mut h = Hierarchy::with_config(RuntimeConfig::new().with_max_call_depth(4));
        let a = h.declare("A", &[]).unwrap();
        h.define(a, "forever", |inv, frame, args| inv.call_method(frame, "forever", args))
            .unwrap();

        let err = h.invoke(a, "forever", &[]).unwrap_err();
        assert_eq!(
            err,
            MroError::CallDepthExceeded {
                method: "forever".into(),
                limit: 4
            }
        );
    }

    #[test]
    fn test_receiver_and_node() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();

        for ty in [a, b] {
            let log = Arc::clone(&seen);
            h.define(ty, "meth", move |inv, frame, args| {
                log.lock().unwrap().push((frame.receiver(), frame.node()));
                inv.call_next(frame, args)?;
                Ok(Value::Null)
            })
            .unwrap();
        }

        h.invoke(b, "meth", &[]).unwrap();
        assert_eq!(*seen.lock().unwrap(), [(b, b), (b, a)]);
    }
}
