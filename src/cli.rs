//! CLI front door helpers.
//!
//! Loads the two input documents, runs the module build and wraps the result
//! in a [`BuildResponse`]. All functions return [`ExposeError`] so the binary
//! can map every failure to a stable exit code.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use pyexpose_core::decl::{DeclGraph, IntrospectionTable};
use pyexpose_core::diagnostics::BuildConfig;
use pyexpose_core::error::ExposeError;
use pyexpose_cpp::module::{build_module, BindingPlan};

use crate::output::BuildResponse;

/// The declarations document: `{"records": {"<id>": {"kind": ...}}}`.
#[derive(Debug, Deserialize)]
pub struct DeclsDocument {
    pub records: IntrospectionTable,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ExposeError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| ExposeError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ExposeError::InvalidInput {
        path: display,
        source,
    })
}

/// Read and link a declarations document.
pub fn load_decls(path: &Path) -> Result<DeclGraph, ExposeError> {
    let doc: DeclsDocument = read_json(path)?;
    debug!(records = doc.records.len(), path = %path.display(), "declarations read");
    Ok(DeclGraph::link(&doc.records)?)
}

/// Read a binding plan document.
pub fn load_plan(path: &Path) -> Result<BindingPlan, ExposeError> {
    read_json(path)
}

/// Run the `build` command.
pub fn run_build(
    decls: &Path,
    plan: &Path,
    config: &BuildConfig,
) -> Result<BuildResponse, ExposeError> {
    let graph = load_decls(decls)?;
    let plan = load_plan(plan)?;
    let artifacts = build_module(&graph, &plan, config)?;
    info!(
        module = %artifacts.module,
        classes = artifacts.classes.len(),
        functions = artifacts.functions.len(),
        "build finished"
    );
    Ok(BuildResponse::new(artifacts))
}
