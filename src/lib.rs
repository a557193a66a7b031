use std::path::PathBuf;

pub mod affinity;
pub mod catalogue;
pub mod config;
pub mod curve;
pub mod feature;
pub mod grouping;
pub mod indexer;
pub mod schema;
pub mod tab;

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

impl Error {
    pub fn detail(&self) -> &ErrorDetail {
        &self.detail
    }
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub path: PathBuf,
    pub file_type: Option<String>,
}

impl ErrorContext {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_type: None,
        }
    }

    pub(crate) fn with_file_type(&self, file_type: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            file_type: Some(file_type.into()),
        }
    }

    pub(crate) fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file_type {
            Some(file_type) => write!(f, "{file_type}({})", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Unknown file type: {0}")]
    UnknownFileType(String),
    #[error("Unknown grouping attribute: {0}")]
    UnknownGroupingAttribute(String),
    #[error("No target file matches tokens {tokens:?}")]
    NoMatchingTarget { tokens: Vec<String> },
    #[error("Target curve {curve} has a zero or non-finite integral")]
    DegenerateTarget { curve: String },
    #[error("Not a tab candidate: {0}")]
    NotATabCandidate(String),
    #[error("Invalid tab state: {0}")]
    InvalidState(String),
    #[error("Subsample values must not be empty")]
    EmptySamples,
    #[error("Subsample value {0} is not finite")]
    InvalidSamples(f64),
    #[error("No subsample values selected")]
    NoSamples,
    #[error("Tab is not open")]
    TabNotOpen,
    #[error("File type does not support targets")]
    TargetsUnsupported,
    #[error("File is not catalogued")]
    NotIndexed,
    #[error("Catalogue has not been built")]
    MissingCatalogue,
    #[error("Directory does not exist")]
    MissingDirectory,
    #[error("Failed to list directory: {0}")]
    ListDirectory(String),
    #[error("Failed to read curves: {0}")]
    ReadCurves(csv::Error),
    #[error("Failed to render figure: {0}")]
    Render(String),
    #[error("Catalogue error: {0}")]
    Catalogue(catalogue::Error),
}
