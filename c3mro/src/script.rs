//! Hierarchy files
//!
//! A hierarchy file describes types, scripted method bodies, and scenarios
//! to run against them. The format is TOML:
//!
//! ```toml
//! [settings]
//! root_name = "object"
//!
//! [[types]]
//! name = "A"
//! methods.meth1 = [{ emit = "A::meth1" }]
//!
//! [[types]]
//! name = "C"
//! parents = ["A"]
//! methods.meth1 = [{ emit = "C::meth1" }, "next"]
//!
//! [[scenarios]]
//! receiver = "C"
//! method = "meth1"
//! expect = ["C::meth1", "A::meth1"]
//! ```
//!
//! Types are declared in file order, so parents must appear first.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::graph::Hierarchy;
use crate::runtime::{CallFrame, Invocation, Method, Value};
use crate::{MroError, MroResult};

/// Errors raised while loading or running a hierarchy file.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Mro(#[from] MroError),
}

/// Script result type.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// One statement of a scripted method body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Append a line to the transcript.
    Emit(String),
    /// Run the next implementation of the current method.
    Next,
    /// Dispatch another method from the start of the receiver's order.
    Call(String),
    /// Run another method's next implementation after the current position.
    Super(String),
}

/// A type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,

    /// Parent names in declaration order. Empty means the root.
    #[serde(default)]
    pub parents: Vec<String>,

    /// Local method bodies by name.
    #[serde(default)]
    pub methods: IndexMap<String, Vec<Step>>,
}

/// An invocation to run, with the transcript it should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub receiver: String,
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Vec<String>>,
}

/// The outcome of running one [`Scenario`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    /// The transcript, or the error the invocation failed with.
    pub result: Result<Vec<String>, MroError>,
}

impl ScenarioReport {
    /// True when the invocation succeeded and matched any expectation.
    pub fn passed(&self) -> bool {
        match (&self.result, &self.scenario.expect) {
            (Ok(actual), Some(expected)) => actual == expected,
            (Ok(_), None) => true,
            (Err(_), _) => false,
        }
    }
}

/// A parsed hierarchy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyFile {
    pub settings: RuntimeConfig,
    pub types: Vec<TypeDecl>,
    pub scenarios: Vec<Scenario>,
}

impl HierarchyFile {
    /// Parses a hierarchy file from TOML source.
    pub fn parse(source: &str) -> ScriptResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a hierarchy file.
    pub fn load(path: impl AsRef<Path>) -> ScriptResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading hierarchy file");
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }

    /// Declares every type and attaches its scripted methods.
    pub fn build(&self) -> MroResult<Hierarchy> {
        let mut hierarchy = Hierarchy::with_config(self.settings.clone());
        for decl in &self.types {
            let id = hierarchy.declare_named(&decl.name, decl.parents.as_slice())?;
            for (method, steps) in &decl.methods {
                hierarchy.define_method(id, method, compile(steps.clone()))?;
            }
        }
        info!(types = self.types.len(), "built hierarchy");
        Ok(hierarchy)
    }

    /// Runs every scenario against `hierarchy`, in file order.
    ///
    /// Invocation failures are reported per scenario; only an unknown
    /// receiver aborts the run.
    pub fn run_scenarios(&self, hierarchy: &Hierarchy) -> MroResult<Vec<ScenarioReport>> {
        let mut reports = Vec::with_capacity(self.scenarios.len());
        for scenario in &self.scenarios {
            let receiver = hierarchy.lookup(&scenario.receiver)?;
            let result = hierarchy
                .invoke(receiver, &scenario.method, &[])
                .map(|outcome| outcome.transcript);
            reports.push(ScenarioReport {
                scenario: scenario.clone(),
                result,
            });
        }
        Ok(reports)
    }
}

/// Turns a step list into a method body.
fn compile(steps: Vec<Step>) -> Method {
    Arc::new(move |inv: &mut Invocation<'_>, frame: &CallFrame, args: &[Value]| {
        run_steps(&steps, inv, frame, args)
    })
}

/// Runs steps in order; the body's value is that of the last call that returned one.
fn run_steps(
    steps: &[Step],
    inv: &mut Invocation<'_>,
    frame: &CallFrame,
    args: &[Value],
) -> MroResult<Value> {
    let mut last = Value::Null;
    for step in steps {
        match step {
            Step::Emit(line) => inv.emit(line.clone()),
            Step::Next => {
                if let Some(value) = inv.call_next(frame, args)? {
                    last = value;
                }
            }
            Step::Call(method) => last = inv.call_method(frame, method, args)?,
            Step::Super(method) => {
                if let Some(value) = inv.call_super(frame, method, args)? {
                    last = value;
                }
            }
        }
    }
    Ok(last)
}
