use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Attribute {
    Numeric,
    Text,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Targets {
    #[serde(rename = "match", default)]
    pub match_attributes: Vec<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FileType {
    pub attributes: IndexMap<String, Attribute>,
    /// Curve acronym to display label. Empty means every X/Y pair found in a file.
    #[serde(default)]
    pub curves: IndexMap<String, String>,
    pub targets: Option<Targets>,
    #[serde(default)]
    pub samples: Vec<f64>,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct FigureStyle {
    pub colors: Vec<String>,
    pub target_line_style: String,
    pub line_width: f64,
    pub markers: bool,
    pub legend: bool,
    pub dpi: u32,
    pub format: ExportFormat,
}

impl Default for FigureStyle {
    fn default() -> Self {
        Self {
            colors: ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            target_line_style: "dashed".into(),
            line_width: 1.5,
            markers: false,
            legend: true,
            dpi: 100,
            format: ExportFormat::Json,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub data_directory: PathBuf,
    pub target_directory: Option<PathBuf>,
    pub catalogue: String,
    #[serde(default)]
    pub figure: FigureStyle,
    pub file_types: IndexMap<String, FileType>,
}
