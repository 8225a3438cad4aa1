//! c3mro Command Implementations
//!
//! Each command loads a hierarchy file and renders its result as text, so
//! the binary only has to parse arguments and print.

use std::path::Path;

use anyhow::{Context, Result};
use c3mro::{DispatchResolver, Hierarchy, HierarchyFile, RuntimeConfig};
use tracing::{debug, warn};

/// Settings given on the command line, applied over the file's `[settings]`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root_name: Option<String>,
    pub max_call_depth: Option<usize>,
}

impl Overrides {
    fn apply(&self, config: &mut RuntimeConfig) {
        if let Some(root) = &self.root_name {
            config.root_name = root.clone();
        }
        if let Some(depth) = self.max_call_depth {
            config.max_call_depth = depth;
        }
    }
}

/// A parsed hierarchy file and the hierarchy built from it.
pub struct Loaded {
    pub file: HierarchyFile,
    pub hierarchy: Hierarchy,
}

/// Loads and builds a hierarchy file.
pub fn load(path: &Path, overrides: &Overrides) -> Result<Loaded> {
    let mut file = HierarchyFile::load(path)
        .with_context(|| format!("Failed to load hierarchy file: {}", path.display()))?;
    overrides.apply(&mut file.settings);
    let hierarchy = file
        .build()
        .with_context(|| format!("Failed to build hierarchy from {}", path.display()))?;
    debug!(types = hierarchy.len(), "loaded {}", path.display());
    Ok(Loaded { file, hierarchy })
}

/// The linearization of `ty`, space-separated.
pub fn mro(loaded: &Loaded, ty: &str, include_root: bool) -> Result<String> {
    let h = &loaded.hierarchy;
    let mut names = h.mro_names(h.lookup(ty)?)?;
    if !include_root {
        names.pop();
    }
    Ok(names.join(" "))
}

/// Runs `method` on `ty` and returns the transcript, one line per entry.
pub fn invoke(loaded: &Loaded, ty: &str, method: &str) -> Result<String> {
    let h = &loaded.hierarchy;
    let outcome = h.invoke(h.lookup(ty)?, method, &[])?;
    Ok(outcome.transcript.join("\n"))
}

/// Every implementation of `method` visible from `ty`, most specific first.
pub fn which(loaded: &Loaded, ty: &str, method: &str) -> Result<String> {
    let h = &loaded.hierarchy;
    let lin = h.linearize(h.lookup(ty)?)?;
    let lines: Vec<String> = DispatchResolver::new(h)
        .implementors(&lin, method)
        .iter()
        .filter_map(|r| h.node(r.node).map(|node| format!("{} (position {})", node, r.index)))
        .collect();
    Ok(lines.join("\n"))
}

/// Linearization status of every declared type.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub lines: Vec<String>,
    pub failures: usize,
}

/// Linearizes every type, recording each inconsistency.
pub fn check(loaded: &Loaded) -> CheckReport {
    let h = &loaded.hierarchy;
    let mut report = CheckReport::default();
    for node in h.nodes() {
        match h.mro_names(node.id()) {
            Ok(names) => report.lines.push(format!("{}: {}", node, names.join(" "))),
            Err(e) => {
                warn!(ty = node.name(), "{e}");
                report.failures += 1;
                report.lines.push(format!("{}: {}", node, e));
            }
        }
    }
    report
}

/// Results of running a file's scenarios.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub lines: Vec<String>,
    pub passed: usize,
    pub failed: usize,
}

/// Runs every scenario in the file.
pub fn run(loaded: &Loaded) -> Result<RunSummary> {
    let reports = loaded.file.run_scenarios(&loaded.hierarchy)?;
    let mut summary = RunSummary::default();

    for report in &reports {
        let label = format!("{}.{}", report.scenario.receiver, report.scenario.method);
        if report.passed() {
            summary.passed += 1;
            summary.lines.push(format!("  {label} ... ok"));
            continue;
        }

        summary.failed += 1;
        summary.lines.push(format!("  {label} ... FAILED"));
        match (&report.result, &report.scenario.expect) {
            (Ok(actual), Some(expected)) => {
                summary.lines.push(format!("    expected: {}", expected.join(" ")));
                summary.lines.push(format!("    actual:   {}", actual.join(" ")));
            }
            (Err(e), _) => summary.lines.push(format!("    error: {e}")),
            (Ok(_), None) => {}
        }
    }

    Ok(summary)
}

/// The default `[settings]` as pretty JSON.
pub fn default_config() -> Result<String> {
    Ok(serde_json::to_string_pretty(&RuntimeConfig::default())?)
}
