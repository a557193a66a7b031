//! The seam between tabs and a plotting backend.

use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::{
    ErrorDetail,
    config::{ExportFormat, FigureStyle},
    curve::Curve,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Measured,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub role: Role,
    pub curve: Curve,
}

/// Backend independent description of one figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub title: String,
    pub x_label: Option<String>,
    pub series: Vec<Series>,
    /// Points rather than lines.
    pub markers: bool,
}

pub trait Renderer {
    type Figure;

    fn render(&self, scene: &Scene) -> Result<Self::Figure, ErrorDetail>;
    fn export(&self, figure: &Self::Figure, path: &Path) -> Result<(), ErrorDetail>;
}

/// Renders scenes to a styled JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    style: FigureStyle,
}

impl JsonRenderer {
    pub fn new(style: FigureStyle) -> Self {
        Self { style }
    }

    fn color(&self, index: usize) -> Option<&str> {
        if self.style.colors.is_empty() {
            None
        } else {
            Some(&self.style.colors[index % self.style.colors.len()])
        }
    }
}

impl Renderer for JsonRenderer {
    type Figure = serde_json::Value;

    fn render(&self, scene: &Scene) -> Result<Self::Figure, ErrorDetail> {
        let style = &self.style;
        let (mut measured, mut target) = (0, 0);
        let series = scene
            .series
            .iter()
            .map(|series| {
                // targets reuse the color of the measured curve at the same position
                let (index, line_style) = match series.role {
                    Role::Measured => {
                        measured += 1;
                        (measured - 1, "solid")
                    }
                    Role::Target => {
                        target += 1;
                        (target - 1, style.target_line_style.as_str())
                    }
                };
                json!({
                    "label": series.label,
                    "role": series.role,
                    "color": self.color(index),
                    "line_style": line_style,
                    "line_width": style.line_width,
                    "marker": scene.markers || style.markers,
                    "x": series.curve.x,
                    "y": series.curve.y,
                })
            })
            .collect::<Vec<_>>();
        Ok(json!({
            "title": scene.title,
            "x_label": scene.x_label,
            "legend": style.legend,
            "dpi": style.dpi,
            "series": series,
        }))
    }

    fn export(&self, figure: &Self::Figure, path: &Path) -> Result<(), ErrorDetail> {
        let ExportFormat::Json = self.style.format;
        let text = serde_json::to_string_pretty(figure)
            .map_err(|error| ErrorDetail::Render(error.to_string()))?;
        std::fs::write(path, text).map_err(|error| ErrorDetail::Render(error.to_string()))
    }
}
