//! Loading programs from JSON.
//!
//! The document layout is `{"code": {"rows": [row, ...]}}`, where every row is
//! a statement object carrying an integer `id`.

use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::SourceError;
use crate::statement::{Parsed, Statement};
use crate::types::StatementId;

#[derive(Debug, Deserialize)]
struct Document {
    code: Code,
}

#[derive(Debug, Deserialize)]
struct Code {
    rows: Vec<Json>,
}

/// One top-level statement of a program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Row {
    pub id: StatementId,
    pub statement: Parsed,
}

/// An ordered list of rows.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Program {
    pub rows: Vec<Row>,
}

impl Program {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Program { rows }
    }

    /// Reads and parses the program stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded {} ({} bytes)", path.display(), text.len());
        Self::from_json_str(&text)
    }

    /// Parses a program from JSON text.
    ///
    /// Invalid JSON, a missing `code.rows` array, and rows that are not objects
    /// with an integer `id` are errors. Rows whose statement is not understood
    /// are kept, with the reason in place of the statement.
    pub fn from_json_str(text: &str) -> Result<Self, SourceError> {
        let value: Json = serde_json::from_str(text)?;
        let document: Document = serde_json::from_value(value).map_err(|e| SourceError::Structure(e.to_string()))?;

        let mut rows = Vec::with_capacity(document.code.rows.len());
        for (index, row) in document.code.rows.iter().enumerate() {
            if !row.is_object() {
                return Err(SourceError::Structure(format!("row {} is not an object", index)));
            }
            let id = row
                .get("id")
                .and_then(Json::as_i64)
                .ok_or_else(|| SourceError::Structure(format!("row {} has no integer `id`", index)))?;
            rows.push(Row {
                id,
                statement: Statement::from_json(row),
            });
        }
        debug!("parsed {} row(s)", rows.len());
        Ok(Program { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
