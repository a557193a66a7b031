use std::fmt::Write as _;

use crate::schema::{ColumnKind, FILE_PATH, FileTypeSchema};

fn sqlite_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Numeric => "REAL",
        ColumnKind::Text => "TEXT",
        ColumnKind::Path => "TEXT",
    }
}

/// Erase trailing comma and newline from output, replacing with newline.
fn erase_trailing_comma_newline(out: &mut String) {
    if out.ends_with(",\n") {
        out.pop();
        out.pop();
        out.push('\n');
    }
}

fn write_column_list(out: &mut String, schema: &FileTypeSchema) -> std::fmt::Result {
    for (i, (name, _)) in schema.columns().iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "\"{name}\"")?;
    }
    Ok(())
}

pub fn drop_table(out: &mut String, schema: &FileTypeSchema) -> std::fmt::Result {
    writeln!(out, "DROP TABLE IF EXISTS \"{}\"", schema.name())
}

pub fn create_table(out: &mut String, schema: &FileTypeSchema) -> std::fmt::Result {
    writeln!(out, "CREATE TABLE \"{}\" (", schema.name())?;
    for (name, kind) in schema.columns() {
        write!(out, "  \"{name}\" {}", sqlite_type(kind))?;
        if name == FILE_PATH {
            write!(out, " NOT NULL PRIMARY KEY")?;
        }
        writeln!(out, ",")?;
    }
    erase_trailing_comma_newline(out);
    writeln!(out, ")")
}

pub fn insert(out: &mut String, schema: &FileTypeSchema) -> std::fmt::Result {
    write!(out, "INSERT INTO \"{}\" (", schema.name())?;
    write_column_list(out, schema)?;
    write!(out, ") VALUES (")?;
    let count = schema.columns().len();
    for i in 0..count {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "?")?;
    }
    writeln!(out, ")")
}

pub fn select(out: &mut String, schema: &FileTypeSchema) -> std::fmt::Result {
    write!(out, "SELECT ")?;
    write_column_list(out, schema)?;
    writeln!(out, " FROM \"{}\" ORDER BY rowid", schema.name())
}

pub const TABLE_COLUMNS: &str = "SELECT name FROM pragma_table_info(?) ORDER BY cid";

pub(crate) fn build(
    schema: &FileTypeSchema,
    generate: impl FnOnce(&mut String, &FileTypeSchema) -> std::fmt::Result,
) -> String {
    let mut out = String::new();
    generate(&mut out, schema).unwrap();
    out
}
