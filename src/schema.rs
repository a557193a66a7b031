use std::sync::Arc;

use indexmap::IndexMap;

use crate::{ErrorDetail, config};

pub const FILE_PATH: &str = "file_path";
pub const AFFINITY_PREFIX: &str = "aff_";
pub const AFFINITY_TOTAL: &str = "aff_tot";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{1}: attribute name {0} is reserved")]
    ReservedAttribute(String, String),
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("{file_type}: target matching attribute {attribute} is undefined")]
    UndefinedMatchAttribute {
        file_type: String,
        attribute: String,
    },
    #[error("{file_type}: default subsample value {value} is not finite")]
    InvalidSamples { file_type: String, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    Path,
}

impl From<config::Attribute> for ColumnKind {
    fn from(value: config::Attribute) -> Self {
        match value {
            config::Attribute::Numeric => Self::Numeric,
            config::Attribute::Text => Self::Text,
        }
    }
}

#[derive(Debug)]
pub struct FileTypeSchema {
    pub(crate) name: String,
    pub(crate) attributes: IndexMap<String, config::Attribute>,
    pub(crate) curves: IndexMap<String, String>,
    pub(crate) target_match: Option<Vec<String>>,
    pub(crate) samples: Vec<f64>,
}

impl FileTypeSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &IndexMap<String, config::Attribute> {
        &self.attributes
    }

    pub fn curves(&self) -> &IndexMap<String, String> {
        &self.curves
    }

    pub fn supports_targets(&self) -> bool {
        self.target_match.is_some()
    }

    pub fn target_match(&self) -> &[String] {
        self.target_match.as_deref().unwrap_or_default()
    }

    pub fn default_samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn affinity_column(curve: &str) -> String {
        format!("{AFFINITY_PREFIX}{curve}")
    }

    pub fn is_affinity_column(name: &str) -> bool {
        name.starts_with(AFFINITY_PREFIX)
    }

    /// Catalogue columns: attributes, `file_path`, then affinity columns when targets apply.
    pub fn columns(&self) -> Vec<(String, ColumnKind)> {
        let mut columns = self
            .attributes
            .iter()
            .map(|(name, attribute)| (name.clone(), ColumnKind::from(*attribute)))
            .collect::<Vec<_>>();
        columns.push((FILE_PATH.to_owned(), ColumnKind::Path));
        if self.supports_targets() {
            for curve in self.curves.keys() {
                columns.push((Self::affinity_column(curve), ColumnKind::Numeric));
            }
            columns.push((AFFINITY_TOTAL.to_owned(), ColumnKind::Numeric));
        }
        columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().into_iter().map(|(name, _)| name).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schemas(IndexMap<String, Arc<FileTypeSchema>>);

fn validate_identifier(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.contains(['"', '\'', '#']) || name.contains(char::is_whitespace) {
        Err(Error::InvalidIdentifier(name.to_owned()))
    } else {
        Ok(())
    }
}

impl Schemas {
    pub fn compile(config: &config::Config) -> Result<Self, Error> {
        let mut schemas = IndexMap::new();
        for (name, def) in &config.file_types {
            let name = name.to_uppercase();
            validate_identifier(&name)?;
            for attribute in def.attributes.keys() {
                validate_identifier(attribute)?;
                if attribute == FILE_PATH || Self::is_reserved(attribute) {
                    return Err(Error::ReservedAttribute(attribute.clone(), name));
                }
            }
            for curve in def.curves.keys() {
                validate_identifier(curve)?;
            }
            if let Some(&value) = def.samples.iter().find(|value| !value.is_finite()) {
                return Err(Error::InvalidSamples {
                    file_type: name,
                    value,
                });
            }
            let target_match = match &def.targets {
                Some(targets) => {
                    if let Some(attribute) = targets
                        .match_attributes
                        .iter()
                        .find(|attribute| !def.attributes.contains_key(*attribute))
                    {
                        return Err(Error::UndefinedMatchAttribute {
                            file_type: name,
                            attribute: attribute.clone(),
                        });
                    }
                    Some(targets.match_attributes.clone())
                }
                None => None,
            };
            schemas.insert(
                name.clone(),
                Arc::new(FileTypeSchema {
                    name,
                    attributes: def.attributes.clone(),
                    curves: def.curves.clone(),
                    target_match,
                    samples: def.samples.clone(),
                }),
            );
        }
        Ok(Self(schemas))
    }

    fn is_reserved(name: &str) -> bool {
        FileTypeSchema::is_affinity_column(name)
    }

    pub fn get(&self, file_type: &str) -> Result<&Arc<FileTypeSchema>, ErrorDetail> {
        self.0
            .get(file_type)
            .ok_or_else(|| ErrorDetail::UnknownFileType(file_type.to_owned()))
    }

    pub fn contains(&self, file_type: &str) -> bool {
        self.0.contains_key(file_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FileTypeSchema>> {
        self.0.values()
    }
}
