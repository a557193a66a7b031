//! Per file type catalogue of indexed files.
//!
//! A catalogue is an ordered table keyed by `file_path` whose columns are
//! exactly [`FileTypeSchema::columns`]. Persistence goes through
//! [`store::Client`].

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::{FILE_PATH, FileTypeSchema};

pub(crate) mod sql;
pub mod sqlite;
pub mod store;

pub use sqlite::LocalCatalogue;
pub use store::Client;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("sheet {table} has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("sheet {table} has an undecodable value in column {column}")]
    Decode { table: String, column: String },
    #[error("catalogue db is unreadable while loading sheet {table}: {reason}")]
    Corrupt { table: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Path(PathBuf),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Integral values keep one decimal (`1.0`), others use the shortest round-trip form.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(text) => f.write_str(text),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

pub type Row = IndexMap<String, Option<Value>>;

#[derive(Debug, Clone)]
pub struct Catalogue {
    pub schema: Arc<FileTypeSchema>,
    pub rows: Vec<Row>,
}

pub(crate) fn row_path(row: &Row) -> Option<&Path> {
    match row.get(FILE_PATH)? {
        Some(Value::Path(path)) => Some(path),
        _ => None,
    }
}

impl Catalogue {
    pub fn empty(schema: Arc<FileTypeSchema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn file_type(&self) -> &str {
        self.schema.name()
    }

    pub fn columns(&self) -> Vec<String> {
        self.schema.column_names()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.rows.iter().filter_map(row_path)
    }

    pub fn row(&self, path: &Path) -> Option<&Row> {
        self.rows.iter().find(|row| row_path(row) == Some(path))
    }

    pub fn row_mut(&mut self, path: &Path) -> Option<&mut Row> {
        self.rows.iter_mut().find(|row| row_path(row) == Some(path))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
