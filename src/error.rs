use std::path::PathBuf;

use thiserror::Error;

use crate::types::StatementId;

/// Failure to load a statement source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed document: {0}")]
    Structure(String),
}

/// A statement whose JSON shape is not understood.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StatementError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("`{0}` must be an object")]
    ExpectedObject(&'static str),
    #[error("unknown value `{0}`")]
    UnknownValue(String),
    #[error("unknown field direction `{0}`")]
    UnknownField(String),
    #[error("unrecognized statement shape")]
    UnknownShape,
}

/// A statement that could not be applied to the ownership graphs.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AnalysisError {
    #[error("statement {id}: {error}")]
    Shape {
        id: StatementId,
        #[source]
        error: StatementError,
    },
    #[error("variable `{0}` is not declared")]
    UndeclaredVariable(String),
    #[error("cannot follow `{field}` from `{node}`")]
    UnresolvedField { node: String, field: String },
    #[error("node `{0}` does not exist")]
    MissingNode(String),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// The SAT backend gave up on a formula.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("SAT solver failed: {0}")]
pub struct SolverError(pub String);
