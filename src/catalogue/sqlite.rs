use std::{
    path::PathBuf,
    str::FromStr as _,
    sync::{Arc, PoisonError, RwLock},
};

use sqlx::{
    Row as _, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, error, warn};

use crate::schema::{ColumnKind, FileTypeSchema};

use super::{Catalogue, Error, Row, Value, sql, store};

const SQLITE_CORRUPT: i32 = 11;
const SQLITE_NOTADB: i32 = 26;

pub struct LocalCatalogue {
    options: SqliteConnectOptions,
    /// Swapped for a fresh pool when the database file turns out to be unreadable.
    pool: RwLock<SqlitePool>,
}

async fn connect(options: &SqliteConnectOptions) -> Result<SqlitePool, sqlx::Error> {
    // a single connection keeps `sqlite::memory:` catalogues on one database
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone())
        .await
}

/// Whether SQLite gave up on the file itself rather than on a statement.
fn is_corrupt(error: &sqlx::Error) -> bool {
    let sqlx::Error::Database(error) = error else {
        return false;
    };
    error
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_CORRUPT | SQLITE_NOTADB))
}

impl LocalCatalogue {
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, %url, "Failed to open catalogue db"))?
            .create_if_missing(true);
        let pool = connect(&options)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to open catalogue db"))?;
        Ok(Self {
            options,
            pool: RwLock::new(pool),
        })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Moves the database file aside as `<file>.corrupt` and reconnects to a new one.
    async fn reset(&self) -> Result<(), sqlx::Error> {
        self.pool().close().await;
        let filename = self.options.get_filename();
        let mut backup = filename.as_os_str().to_owned();
        backup.push(".corrupt");
        match tokio::fs::rename(filename, &backup).await {
            Ok(()) => warn!(
                file = %filename.display(),
                backup = %PathBuf::from(&backup).display(),
                "unreadable catalogue db moved aside"
            ),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(sqlx::Error::Io(error)),
        }
        let pool = connect(&self.options)
            .await
            .inspect_err(|error| error!(%error, "Failed to reopen catalogue db"))?;
        *self.pool.write().unwrap_or_else(PoisonError::into_inner) = pool;
        Ok(())
    }
}

async fn fetch(
    pool: &SqlitePool,
    schema: &Arc<FileTypeSchema>,
) -> Result<Option<Catalogue>, Error> {
    let table = schema.name();
    let found = sqlx::query_scalar::<_, String>(sql::TABLE_COLUMNS)
        .bind(table)
        .fetch_all(pool)
        .await?;
    if found.is_empty() {
        return Ok(None);
    }
    let expected = schema.column_names();
    if found.len() != expected.len() || !expected.iter().all(|column| found.contains(column)) {
        return Err(Error::SchemaMismatch {
            table: table.to_owned(),
            expected,
            found,
        });
    }
    let columns = schema.columns();
    let rows = sqlx::query(&sql::build(schema, sql::select))
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|(name, kind)| Ok((name.clone(), decode(table, row, name, *kind)?)))
                .collect::<Result<Row, Error>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(table, rows = rows.len(), "sheet loaded");
    Ok(Some(Catalogue {
        schema: schema.clone(),
        rows,
    }))
}

fn decode(
    table: &str,
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
    kind: ColumnKind,
) -> Result<Option<Value>, Error> {
    let value = match kind {
        ColumnKind::Numeric => row
            .try_get::<Option<f64>, _>(column)
            .map(|value| value.map(Value::Number)),
        ColumnKind::Text => row
            .try_get::<Option<String>, _>(column)
            .map(|value| value.map(Value::Text)),
        ColumnKind::Path => row
            .try_get::<Option<String>, _>(column)
            .map(|value| value.map(|path| Value::Path(PathBuf::from(path)))),
    };
    value.map_err(|_| Error::Decode {
        table: table.to_owned(),
        column: column.to_owned(),
    })
}

impl store::Client for LocalCatalogue {
    type Error = Error;

    async fn load(&self, schema: &Arc<FileTypeSchema>) -> Result<Option<Catalogue>, Self::Error> {
        match fetch(&self.pool(), schema).await {
            Err(Error::Sqlite(error)) if is_corrupt(&error) => {
                self.reset().await?;
                Err(Error::Corrupt {
                    table: schema.name().to_owned(),
                    reason: error.to_string(),
                })
            }
            loaded => loaded,
        }
    }

    async fn save(&self, catalogues: &[Catalogue]) -> Result<(), Self::Error> {
        let mut tx = self.pool().begin().await?;
        for catalogue in catalogues {
            let schema = &catalogue.schema;
            sqlx::query(&sql::build(schema, sql::drop_table))
                .execute(&mut *tx)
                .await?;
            sqlx::query(&sql::build(schema, sql::create_table))
                .execute(&mut *tx)
                .await?;
            let insert = sql::build(schema, sql::insert);
            let columns = schema.column_names();
            for row in &catalogue.rows {
                let query = columns.iter().fold(sqlx::query(&insert), |query, column| {
                    match row.get(column).cloned().flatten() {
                        Some(Value::Number(n)) => query.bind(n),
                        Some(Value::Text(text)) => query.bind(text),
                        Some(Value::Path(path)) => {
                            query.bind(path.to_string_lossy().into_owned())
                        }
                        None => query.bind(None::<String>),
                    }
                });
                query.execute(&mut *tx).await?;
            }
            debug!(
                table = schema.name(),
                rows = catalogue.rows.len(),
                "sheet written"
            );
        }
        tx.commit().await?;
        Ok(())
    }
}
