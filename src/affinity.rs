//! Integral affinity between catalogued files and their target curves.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools as _;
use tracing::{debug, info};

use crate::{
    Error, ErrorContext, ErrorDetail,
    catalogue::{self, Catalogue, Value, store},
    curve::{CurveSet, mean},
    feature,
    schema::{AFFINITY_TOTAL, FileTypeSchema, Schemas},
};

/// Whether `token` occurs in `stem` between separators or the stem's ends,
/// so `Es_1.0` does not match inside `Es_1.05`.
fn has_token(stem: &str, token: &str) -> bool {
    stem.match_indices(token).any(|(start, _)| {
        let end = start + token.len();
        let opens = start == 0 || stem[..start].ends_with(feature::TOKEN_SEPARATOR);
        let closes = end == stem.len() || stem[end..].starts_with(feature::TOKEN_SEPARATOR);
        opens && closes
    })
}

/// Locates reference curve files in the target directory.
#[derive(Debug, Clone)]
pub struct TargetLocator {
    directory: PathBuf,
}

impl TargetLocator {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `<attribute>_<value>` for every target-matching attribute, `None` if one is unset.
    pub fn tokens(
        schema: &FileTypeSchema,
        attributes: &IndexMap<String, Option<Value>>,
    ) -> Option<Vec<String>> {
        schema
            .target_match()
            .iter()
            .map(|attribute| {
                let value = attributes.get(attribute)?.as_ref()?;
                Some(format!("{attribute}{}{value}", feature::TOKEN_SEPARATOR))
            })
            .collect()
    }

    fn candidates(&self, schemas: &Schemas, file_type: &str) -> Result<Vec<PathBuf>, ErrorDetail> {
        let pattern = format!(
            "{}/*.csv",
            glob::Pattern::escape(&self.directory.to_string_lossy())
        );
        let paths = glob::glob(&pattern)
            .map_err(|error| ErrorDetail::ListDirectory(error.to_string()))?
            .filter_map(Result::ok)
            .filter(|path| {
                feature::extract_type_only(schemas, path)
                    .is_ok_and(|candidate| candidate == file_type)
            })
            .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
            .collect();
        Ok(paths)
    }

    /// First target file, in file name order, whose name carries every matching token.
    pub fn find_target(
        &self,
        schemas: &Schemas,
        file_type: &str,
        attributes: &IndexMap<String, Option<Value>>,
    ) -> Result<PathBuf, Error> {
        let ctx = ErrorContext::new(&self.directory).with_file_type(file_type);
        let schema = schemas.get(file_type).map_err(|detail| ctx.error(detail))?;
        if !schema.supports_targets() {
            return Err(ctx.error(ErrorDetail::TargetsUnsupported));
        }
        let Some(tokens) = Self::tokens(schema, attributes) else {
            return Err(ctx.error(ErrorDetail::NoMatchingTarget {
                tokens: schema.target_match().to_vec(),
            }));
        };
        self.candidates(schemas, file_type)
            .map_err(|detail| ctx.error(detail))?
            .into_iter()
            .find(|path| {
                let stem = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy())
                    .unwrap_or_default();
                tokens.iter().all(|token| has_token(&stem, token))
            })
            .inspect(|path| debug!(file = %path.display(), ?tokens, "target matched"))
            .ok_or_else(|| ctx.error(ErrorDetail::NoMatchingTarget { tokens }))
    }

    pub fn load_target(
        &self,
        schemas: &Schemas,
        file_type: &str,
        attributes: &IndexMap<String, Option<Value>>,
    ) -> Result<CurveSet, Error> {
        let path = self.find_target(schemas, file_type, attributes)?;
        let schema = schemas
            .get(file_type)
            .map_err(|detail| ErrorContext::new(&path).error(detail))?;
        CurveSet::import(&path, schema.curves()).map_err(|detail| {
            ErrorContext::new(&path)
                .with_file_type(file_type)
                .error(detail)
        })
    }
}

/// Per curve scores plus their mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Affinities {
    pub curves: IndexMap<String, f64>,
    pub total: Option<f64>,
}

impl Affinities {
    pub fn compute(curves: &CurveSet, target: &CurveSet) -> Result<Self, ErrorDetail> {
        let curves = curves.affinities(target)?;
        let total = mean(curves.values().copied());
        Ok(Self { curves, total })
    }

    fn write(&self, schema: &FileTypeSchema, row: &mut catalogue::Row) {
        for curve in schema.curves().keys() {
            row.insert(
                FileTypeSchema::affinity_column(curve),
                self.curves.get(curve).copied().map(Value::Number),
            );
        }
        row.insert(AFFINITY_TOTAL.to_owned(), self.total.map(Value::Number));
    }
}

pub struct AffinityEngine<'a, C> {
    schemas: &'a Schemas,
    locator: &'a TargetLocator,
    store: &'a C,
}

impl<'a, C: store::Client<Error = catalogue::Error>> AffinityEngine<'a, C> {
    pub fn new(schemas: &'a Schemas, locator: &'a TargetLocator, store: &'a C) -> Self {
        Self {
            schemas,
            locator,
            store,
        }
    }

    /// Scores the given files, every catalogued file when `paths` is empty,
    /// and persists the updated sheet. Nothing is written if any file fails.
    pub async fn calculate_affinities(
        &self,
        file_type: &str,
        paths: &[PathBuf],
    ) -> Result<Catalogue, Error> {
        let ctx = ErrorContext::new(file_type).with_file_type(file_type);
        let schema = self.schemas.get(file_type).map_err(|detail| ctx.error(detail))?;
        if !schema.supports_targets() {
            return Err(ctx.error(ErrorDetail::TargetsUnsupported));
        }
        let mut catalogue = self
            .store
            .load(schema)
            .await
            .map_err(|error| ctx.error(ErrorDetail::Catalogue(error)))?
            .ok_or_else(|| ctx.error(ErrorDetail::MissingCatalogue))?;
        let paths = if paths.is_empty() {
            catalogue.paths().map(Path::to_owned).collect()
        } else {
            paths.to_vec()
        };
        let mut scores = Vec::with_capacity(paths.len());
        for path in paths {
            let ctx = ErrorContext::new(&path).with_file_type(file_type);
            let row = catalogue
                .row(&path)
                .ok_or_else(|| ctx.error(ErrorDetail::NotIndexed))?;
            let curves =
                CurveSet::import(&path, schema.curves()).map_err(|detail| ctx.error(detail))?;
            let target = self.locator.load_target(self.schemas, file_type, row)?;
            let affinities =
                Affinities::compute(&curves, &target).map_err(|detail| ctx.error(detail))?;
            scores.push((path, affinities));
        }
        for (path, affinities) in &scores {
            if let Some(row) = catalogue.row_mut(path) {
                affinities.write(schema, row);
            }
        }
        self.store
            .save(std::slice::from_ref(&catalogue))
            .await
            .map_err(|error| ctx.error(ErrorDetail::Catalogue(error)))?;
        info!(file_type, files = scores.len(), "affinities written");
        Ok(catalogue)
    }
}
