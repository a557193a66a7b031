//! Reconciles the persisted catalogue with a data directory.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    Error, ErrorContext, ErrorDetail,
    catalogue::{self, Catalogue, row_path, store},
    feature,
    schema::Schemas,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetSummary {
    pub kept: usize,
    pub added: usize,
    pub removed: usize,
    pub rebuilt: bool,
}

#[derive(Debug)]
pub struct IndexReport {
    pub catalogues: IndexMap<String, Catalogue>,
    pub summaries: IndexMap<String, SheetSummary>,
    pub skipped: Vec<PathBuf>,
}

pub struct Indexer<'a, C> {
    schemas: &'a Schemas,
    store: &'a C,
}

fn list_data_files(directory: &Path) -> Result<Vec<PathBuf>, ErrorDetail> {
    let pattern = format!(
        "{}/*.csv",
        glob::Pattern::escape(&directory.to_string_lossy())
    );
    let mut paths = glob::glob(&pattern)
        .map_err(|error| ErrorDetail::ListDirectory(error.to_string()))?
        .filter_map(|entry| {
            entry
                .inspect_err(|error| warn!(%error, "failed to read directory entry"))
                .ok()
        })
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

impl<'a, C: store::Client<Error = catalogue::Error>> Indexer<'a, C> {
    pub fn new(schemas: &'a Schemas, store: &'a C) -> Self {
        Self { schemas, store }
    }

    /// Loads a sheet, falling back to an empty one when it is absent, drifted or corrupt.
    async fn load_or_rebuild(
        &self,
        schema: &std::sync::Arc<crate::schema::FileTypeSchema>,
    ) -> Result<(Catalogue, bool), Error> {
        match self.store.load(schema).await {
            Ok(Some(catalogue)) => Ok((catalogue, false)),
            Ok(None) => Ok((Catalogue::empty(schema.clone()), false)),
            Err(
                error @ (catalogue::Error::SchemaMismatch { .. }
                | catalogue::Error::Decode { .. }
                | catalogue::Error::Corrupt { .. }),
            ) => {
                warn!(%error, file_type = schema.name(), "catalogue sheet rebuilt");
                Ok((Catalogue::empty(schema.clone()), true))
            }
            Err(error) => Err(ErrorContext::new(schema.name())
                .with_file_type(schema.name())
                .error(ErrorDetail::Catalogue(error))),
        }
    }

    pub async fn reindex(&self, directory: impl AsRef<Path>) -> Result<IndexReport, Error> {
        let directory = directory.as_ref();
        let ctx = ErrorContext::new(directory);
        let is_dir = tokio::fs::metadata(directory)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ctx.error(ErrorDetail::MissingDirectory));
        }

        let mut discovered = IndexMap::<String, Vec<PathBuf>>::new();
        let mut skipped = Vec::new();
        for path in list_data_files(directory).map_err(|detail| ctx.error(detail))? {
            match feature::extract_type_only(self.schemas, &path) {
                Ok(file_type) => discovered.entry(file_type).or_default().push(path),
                Err(error) => {
                    debug!(%error, "skip unsupported file");
                    skipped.push(path);
                }
            }
        }

        let mut sheets = Vec::new();
        let mut summaries = IndexMap::new();
        for schema in self.schemas.iter() {
            let files = discovered.swap_remove(schema.name()).unwrap_or_default();
            let (mut catalogue, rebuilt) = self.load_or_rebuild(schema).await?;
            let on_disk = files.iter().map(PathBuf::as_path).collect::<HashSet<_>>();
            let before = catalogue.rows.len();
            catalogue
                .rows
                .retain(|row| row_path(row).is_some_and(|path| on_disk.contains(path)));
            let removed = before - catalogue.rows.len();
            let kept = catalogue.rows.len();
            let known = catalogue
                .paths()
                .map(Path::to_path_buf)
                .collect::<HashSet<_>>();
            let mut added = 0;
            for path in files.iter().filter(|path| !known.contains(*path)) {
                match feature::extract(self.schemas, path) {
                    Ok(record) => {
                        catalogue.rows.push(record.into_row(schema));
                        added += 1;
                    }
                    Err(error) => {
                        warn!(%error, "skip file");
                        skipped.push(path.clone());
                    }
                }
            }
            info!(
                file_type = schema.name(),
                kept, added, removed, rebuilt, "catalogue reconciled"
            );
            summaries.insert(
                schema.name().to_owned(),
                SheetSummary {
                    kept,
                    added,
                    removed,
                    rebuilt,
                },
            );
            sheets.push(catalogue);
        }

        self.store
            .save(&sheets)
            .await
            .map_err(|error| ctx.error(ErrorDetail::Catalogue(error)))?;
        Ok(IndexReport {
            catalogues: sheets
                .into_iter()
                .map(|catalogue| (catalogue.file_type().to_owned(), catalogue))
                .collect(),
            summaries,
            skipped,
        })
    }
}
