//! Collapsing catalogue rows that differ only in one attribute.

use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools as _;

use crate::{
    ErrorDetail,
    catalogue::{Catalogue, Row, Value, row_path},
    curve::mean,
    feature::FileRecord,
    schema::{AFFINITY_TOTAL, FILE_PATH, FileTypeSchema},
};

pub const GROUP_DELIMITER: char = '#';
pub const KEY_SEPARATOR: &str = "_";

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: String,
    pub members: Vec<PathBuf>,
    /// The grouping attribute takes at least two distinct values across members.
    pub contains_group: bool,
}

#[derive(Debug, Clone)]
pub struct Grouped {
    pub catalogue: Catalogue,
    pub hidden_columns: Vec<String>,
    pub groups: Vec<Group>,
}

fn value_key(value: Option<&Value>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// Joins every column value except `hidden` and affinity columns, in column order.
pub fn group_key(columns: &[String], hidden: &IndexSet<String>, row: &Row) -> String {
    columns
        .iter()
        .filter(|column| !hidden.contains(*column) && !FileTypeSchema::is_affinity_column(column))
        .map(|column| value_key(row.get(column).and_then(Option::as_ref)))
        .join(KEY_SEPARATOR)
}

pub fn join_paths<'p>(paths: impl IntoIterator<Item = &'p std::path::Path>) -> String {
    paths
        .into_iter()
        .map(|path| path.display().to_string())
        .join(&GROUP_DELIMITER.to_string())
}

pub fn split_key(key: &str) -> Vec<PathBuf> {
    key.split(GROUP_DELIMITER)
        .filter(|member| !member.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn hidden_columns(catalogue: &Catalogue, columns: &[String], attribute: &str) -> IndexSet<String> {
    let mut hidden = IndexSet::new();
    hidden.insert(FILE_PATH.to_owned());
    for column in columns {
        let empty = catalogue
            .rows
            .iter()
            .all(|row| row.get(column).is_none_or(Option::is_none));
        if empty {
            hidden.insert(column.clone());
        }
    }
    hidden.insert(attribute.to_owned());
    hidden
}

pub fn group(catalogue: &Catalogue, attribute: &str) -> Result<Grouped, ErrorDetail> {
    let columns = catalogue.columns();
    if !columns.iter().any(|column| column == attribute) || attribute == FILE_PATH {
        return Err(ErrorDetail::UnknownGroupingAttribute(attribute.to_owned()));
    }
    let hidden = hidden_columns(catalogue, &columns, attribute);
    let mut buckets = IndexMap::<String, Vec<&Row>>::new();
    for row in &catalogue.rows {
        buckets
            .entry(group_key(&columns, &hidden, row))
            .or_default()
            .push(row);
    }
    let affinity_columns = columns
        .iter()
        .filter(|column| {
            FileTypeSchema::is_affinity_column(column) && column.as_str() != AFFINITY_TOTAL
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(buckets.len());
    let mut groups = Vec::with_capacity(buckets.len());
    for (key, members) in buckets {
        let mut row = members[0].clone();
        let paths = members
            .iter()
            .filter_map(|member| row_path(member))
            .collect::<Vec<_>>();
        // joined keys stay paths so every row keeps the column's kind
        row.insert(
            FILE_PATH.to_owned(),
            Some(Value::Path(PathBuf::from(join_paths(paths.iter().copied())))),
        );
        let mut curve_means = Vec::new();
        for column in &affinity_columns {
            let average = mean(
                members
                    .iter()
                    .filter_map(|member| member.get(*column)?.as_ref()?.as_number()),
            );
            curve_means.extend(average);
            row.insert((*column).clone(), average.map(Value::Number));
        }
        if catalogue.schema.supports_targets() {
            let total = if affinity_columns.is_empty() {
                mean(
                    members
                        .iter()
                        .filter_map(|member| member.get(AFFINITY_TOTAL)?.as_ref()?.as_number()),
                )
            } else {
                mean(curve_means)
            };
            row.insert(AFFINITY_TOTAL.to_owned(), total.map(Value::Number));
        }
        let distinct = members
            .iter()
            .map(|member| value_key(member.get(attribute).and_then(Option::as_ref)))
            .unique()
            .count();
        groups.push(Group {
            key,
            members: paths.into_iter().map(ToOwned::to_owned).collect(),
            contains_group: members.len() >= 2 && distinct >= 2,
        });
        rows.push(row);
    }
    Ok(Grouped {
        catalogue: Catalogue {
            schema: catalogue.schema.clone(),
            rows,
        },
        hidden_columns: hidden.into_iter().collect(),
        groups,
    })
}

/// Attributes whose values are not identical across `records`.
pub fn varying_attributes(records: &[FileRecord]) -> Vec<String> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    first
        .attributes
        .keys()
        .filter(|attribute| {
            records
                .iter()
                .map(|record| record.get(attribute))
                .unique_by(|value| value_key(*value))
                .nth(1)
                .is_some()
        })
        .cloned()
        .collect()
}

/// A genuine group: one file type and exactly one varying attribute.
pub fn group_attribute(records: &[FileRecord]) -> Option<String> {
    if records.len() < 2 || !records.iter().map(|record| &record.file_type).all_equal() {
        return None;
    }
    let varying = varying_attributes(records);
    match varying.as_slice() {
        [attribute] => Some(attribute.clone()),
        _ => None,
    }
}
