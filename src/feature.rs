//! File name feature extraction.
//!
//! Data files are named `<FILE_TYPE>_<marker>_<value>_..._<marker>_<value>.csv`.
//! The first token selects the schema, every declared attribute is looked up as
//! a marker token and parsed from the token that follows it.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::warn;

use crate::{
    Error, ErrorContext, ErrorDetail,
    catalogue::{Row, Value},
    config,
    schema::{FILE_PATH, FileTypeSchema, Schemas},
};

pub const TOKEN_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub file_type: String,
    pub attributes: IndexMap<String, Option<Value>>,
    pub file_path: PathBuf,
}

impl FileRecord {
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute).and_then(Option::as_ref)
    }

    /// Catalogue row in column order, affinity columns unset.
    pub fn into_row(self, schema: &FileTypeSchema) -> Row {
        let Self {
            mut attributes,
            file_path,
            ..
        } = self;
        schema
            .column_names()
            .into_iter()
            .map(|column| {
                let value = if column == FILE_PATH {
                    Some(Value::Path(file_path.clone()))
                } else {
                    attributes.swap_remove(&column).flatten()
                };
                (column, value)
            })
            .collect()
    }
}

fn tokens(path: &Path) -> Vec<&str> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.split(TOKEN_SEPARATOR).collect())
        .unwrap_or_default()
}

fn file_type_token(path: &Path) -> Option<String> {
    tokens(path)
        .first()
        .filter(|token| !token.is_empty())
        .map(|token| token.to_uppercase())
}

/// Classifies a file without building its attribute map.
pub fn extract_type_only(schemas: &Schemas, path: &Path) -> Result<String, Error> {
    let ctx = ErrorContext::new(path);
    let Some(file_type) = file_type_token(path) else {
        return Err(ctx.error(ErrorDetail::UnsupportedFileType(String::new())));
    };
    if schemas.contains(&file_type) {
        Ok(file_type)
    } else {
        Err(ctx.error(ErrorDetail::UnsupportedFileType(file_type)))
    }
}

fn parse_value(kind: config::Attribute, token: &str) -> Option<Value> {
    match kind {
        config::Attribute::Numeric => token.parse::<f64>().ok().map(Value::Number),
        config::Attribute::Text => Some(Value::Text(token.to_owned())),
    }
}

pub fn extract(schemas: &Schemas, path: &Path) -> Result<FileRecord, Error> {
    let file_type = extract_type_only(schemas, path)?;
    let ctx = ErrorContext::new(path).with_file_type(&file_type);
    let schema = schemas.get(&file_type).map_err(|detail| ctx.error(detail))?;
    let tokens = tokens(path);
    let attributes = schema
        .attributes()
        .iter()
        .map(|(name, kind)| {
            let value = tokens
                .iter()
                .skip(1)
                .position(|token| *token == name.as_str())
                .and_then(|index| tokens.get(index + 2))
                .and_then(|token| {
                    let value = parse_value(*kind, token);
                    if value.is_none() {
                        warn!(path = %path.display(), attribute = %name, token, "unparsable attribute value");
                    }
                    value
                });
            (name.clone(), value)
        })
        .collect();
    Ok(FileRecord {
        file_type,
        attributes,
        file_path: path.to_owned(),
    })
}
