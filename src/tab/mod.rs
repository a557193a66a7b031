//! Memoized figures for open tabs.
//!
//! A tab shows one data file or one group of files. Each tab owns up to four
//! figures, one per [`Variant`], rendered on first use and kept until one of
//! their inputs changes.

use std::{path::Path, sync::Arc};

use itertools::Itertools as _;
use tracing::{debug, warn};

use crate::{
    Error, ErrorContext, ErrorDetail,
    affinity::TargetLocator,
    catalogue::{Value, format_number},
    curve::{Curve, CurveSet},
    feature::FileRecord,
    schema::{FileTypeSchema, Schemas},
};

mod open;
pub mod render;
mod variant;

pub use open::OpenTabsCache;
pub use render::{JsonRenderer, Renderer, Role, Scene, Series};
pub use variant::Variant;

/// Collaborators shared by every tab.
pub struct TabContext<R> {
    pub schemas: Arc<Schemas>,
    pub locator: Option<TargetLocator>,
    pub renderer: R,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub record: FileRecord,
    pub curves: CurveSet,
}

impl Member {
    pub(crate) fn import(record: FileRecord, schema: &FileTypeSchema) -> Result<Self, Error> {
        let curves = CurveSet::import(&record.file_path, schema.curves()).map_err(|detail| {
            ErrorContext::new(&record.file_path)
                .with_file_type(schema.name())
                .error(detail)
        })?;
        Ok(Self { record, curves })
    }
}

#[derive(Debug, Clone)]
pub enum TabSource {
    File(Member),
    Group {
        attribute: String,
        members: Vec<Member>,
    },
}

impl TabSource {
    pub fn members(&self) -> &[Member] {
        match self {
            Self::File(member) => std::slice::from_ref(member),
            Self::Group { members, .. } => members,
        }
    }

    fn members_mut(&mut self) -> &mut [Member] {
        match self {
            Self::File(member) => std::slice::from_mut(member),
            Self::Group { members, .. } => members,
        }
    }
}

fn normalize(mut samples: Vec<f64>) -> Vec<f64> {
    samples.sort_by(f64::total_cmp);
    samples.dedup();
    samples
}

pub struct TabCache<R: Renderer> {
    key: String,
    schema: Arc<FileTypeSchema>,
    source: TabSource,
    context: Arc<TabContext<R>>,
    samples: Vec<f64>,
    variant: Variant,
    figures: [Option<R::Figure>; 4],
    /// Target curves per member, loaded on the first `+t` render.
    targets: Option<Vec<CurveSet>>,
}

impl<R: Renderer> TabCache<R> {
    /// Builds the tab and renders its base figure.
    pub(crate) fn new(
        key: impl Into<String>,
        schema: Arc<FileTypeSchema>,
        source: TabSource,
        context: Arc<TabContext<R>>,
    ) -> Result<Self, Error> {
        let samples = normalize(schema.default_samples().to_vec());
        let mut tab = Self {
            key: key.into(),
            schema,
            source,
            context,
            samples,
            variant: Variant::default(),
            figures: [None, None, None, None],
            targets: None,
        };
        tab.materialize(Variant::FIGURE)?;
        Ok(tab)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn file_type(&self) -> &str {
        self.schema.name()
    }

    pub fn source(&self) -> &TabSource {
        &self.source
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn is_cached(&self, variant: Variant) -> bool {
        self.figures[variant.slot()].is_some()
    }

    fn ctx(&self) -> ErrorContext {
        ErrorContext::new(&self.key).with_file_type(self.schema.name())
    }

    pub fn switch_char(&mut self) -> Variant {
        self.variant = self.variant.switch_char();
        self.variant
    }

    pub fn switch_target(&mut self) -> Variant {
        self.variant = self.variant.switch_target();
        self.variant
    }

    /// Restores a selection saved by label.
    pub fn select(&mut self, label: &str) -> Result<Variant, Error> {
        self.variant = label.parse().map_err(|detail| self.ctx().error(detail))?;
        Ok(self.variant)
    }

    /// Replaces the subsample X-values. Returns whether they changed; the
    /// subsampled figures are only dropped in that case.
    pub fn set_samples(&mut self, samples: Vec<f64>) -> Result<bool, Error> {
        if samples.is_empty() {
            return Err(self.ctx().error(ErrorDetail::EmptySamples));
        }
        if let Some(&value) = samples.iter().find(|value| !value.is_finite()) {
            return Err(self.ctx().error(ErrorDetail::InvalidSamples(value)));
        }
        let samples = normalize(samples);
        if samples == self.samples {
            return Ok(false);
        }
        self.samples = samples;
        self.figures[Variant::SAMPLES.slot()] = None;
        self.figures[Variant::SAMPLES_TARGETS.slot()] = None;
        Ok(true)
    }

    fn targets_available(&self) -> bool {
        self.schema.supports_targets() && self.context.locator.is_some()
    }

    /// Figure of the variant in use.
    pub fn figure(&mut self) -> Result<&R::Figure, Error> {
        self.figure_for(self.variant)
    }

    pub fn figure_for(&mut self, variant: Variant) -> Result<&R::Figure, Error> {
        let variant = if variant.with_targets && !self.targets_available() {
            warn!(
                key = %self.key,
                file_type = self.schema.name(),
                "targets requested for a file type without targets"
            );
            variant.without_targets()
        } else {
            variant
        };
        self.materialize(variant)
    }

    fn materialize(&mut self, variant: Variant) -> Result<&R::Figure, Error> {
        let slot = variant.slot();
        let figure = match self.figures[slot].take() {
            Some(figure) => figure,
            None => {
                if variant.with_targets && self.targets.is_none() {
                    self.targets = Some(self.load_targets()?);
                }
                let scene = self.scene(variant).map_err(|detail| self.ctx().error(detail))?;
                debug!(key = %self.key, variant = variant.label(), "render figure");
                self.context
                    .renderer
                    .render(&scene)
                    .map_err(|detail| self.ctx().error(detail))?
            }
        };
        Ok(&*self.figures[slot].insert(figure))
    }

    fn load_targets(&self) -> Result<Vec<CurveSet>, Error> {
        let Some(locator) = &self.context.locator else {
            return Ok(Vec::new());
        };
        self.source
            .members()
            .iter()
            .map(|member| {
                locator.load_target(
                    &self.context.schemas,
                    self.schema.name(),
                    &member.record.attributes,
                )
            })
            .collect()
    }

    fn series_label(&self, curve: &str, role: Role, tag: Option<&str>) -> String {
        let mut label = self
            .schema
            .curves()
            .get(curve)
            .cloned()
            .unwrap_or_else(|| curve.to_owned());
        if let Some(tag) = tag {
            label = format!("{label} {tag}");
        }
        if role == Role::Target {
            label.push_str(" (target)");
        }
        label
    }

    fn scene(&self, variant: Variant) -> Result<Scene, ErrorDetail> {
        if variant.subsampled && self.samples.is_empty() {
            return Err(ErrorDetail::NoSamples);
        }
        let measured = self
            .source
            .members()
            .iter()
            .map(|member| &member.curves)
            .collect::<Vec<_>>();
        let targets: Vec<&CurveSet> = match (&self.targets, variant.with_targets) {
            (Some(targets), true) => targets.iter().collect(),
            _ => Vec::new(),
        };
        let layers = [(Role::Measured, measured), (Role::Target, targets)];
        let mut series = Vec::new();
        let (title, x_label) = match &self.source {
            TabSource::File(member) => {
                for (role, sets) in &layers {
                    for curve in sets.iter().flat_map(|set| set.curves.values()) {
                        let curve = if variant.subsampled {
                            curve.sample(&self.samples)
                        } else {
                            curve.clone()
                        };
                        let label = self.series_label(&curve.name, *role, None);
                        series.push(Series {
                            label,
                            role: *role,
                            curve,
                        });
                    }
                }
                let title = member
                    .record
                    .file_path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.key.clone());
                (title, None)
            }
            TabSource::Group { attribute, members } if variant.subsampled => {
                // characteristic: Y at each sample X against the varying attribute
                let positions = members
                    .iter()
                    .enumerate()
                    .map(|(index, member)| {
                        member
                            .record
                            .get(attribute)
                            .and_then(Value::as_number)
                            .unwrap_or(index as f64)
                    })
                    .collect::<Vec<_>>();
                let names = members
                    .iter()
                    .flat_map(|member| member.curves.curves.keys())
                    .unique()
                    .collect::<Vec<_>>();
                for (role, sets) in &layers {
                    if sets.is_empty() {
                        continue;
                    }
                    for name in &names {
                        for &at in &self.samples {
                            let (x, y): (Vec<f64>, Vec<f64>) = sets
                                .iter()
                                .zip(&positions)
                                .filter_map(|(set, &position)| {
                                    Some((position, set.get(name)?.interpolate(at)?))
                                })
                                .unzip();
                            if x.is_empty() {
                                continue;
                            }
                            let tag = format!("@ X={}", format_number(at));
                            series.push(Series {
                                label: self.series_label(name, *role, Some(&tag)),
                                role: *role,
                                curve: Curve::new(name.as_str(), x, y),
                            });
                        }
                    }
                }
                (
                    format!("{} by {attribute}", self.schema.name()),
                    Some(attribute.clone()),
                )
            }
            TabSource::Group { attribute, members } => {
                for (role, sets) in &layers {
                    for (member, set) in members.iter().zip(sets) {
                        let value = member
                            .record
                            .get(attribute)
                            .map(ToString::to_string)
                            .unwrap_or_default();
                        let tag = format!("{attribute}={value}");
                        for curve in set.curves.values() {
                            series.push(Series {
                                label: self.series_label(&curve.name, *role, Some(&tag)),
                                role: *role,
                                curve: curve.clone(),
                            });
                        }
                    }
                }
                (format!("{} by {attribute}", self.schema.name()), None)
            }
        };
        Ok(Scene {
            title,
            x_label,
            series,
            markers: variant.subsampled,
        })
    }

    /// Re-imports every member and drops all figures, then renders the base figure.
    pub fn reload(&mut self) -> Result<(), Error> {
        for member in self.source.members_mut() {
            member.curves = CurveSet::import(&member.record.file_path, self.schema.curves())
                .map_err(|detail| {
                    ErrorContext::new(&member.record.file_path)
                        .with_file_type(self.schema.name())
                        .error(detail)
                })?;
        }
        self.figures = [None, None, None, None];
        self.targets = None;
        self.materialize(Variant::FIGURE)?;
        Ok(())
    }

    /// Writes the figure in use to `path`.
    pub fn export(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let context = self.context.clone();
        let figure = self.figure()?;
        context
            .renderer
            .export(figure, path)
            .map_err(|detail| ErrorContext::new(path).error(detail))
    }
}
