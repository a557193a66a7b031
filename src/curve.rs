//! Measured and target curves.
//!
//! Curve files are CSV documents with one `"<curve> X"` / `"<curve> Y"`
//! column pair per curve. Pairs may have different lengths: a row whose X or
//! Y cell is missing or unparsable is skipped for that curve, and later rows
//! still append.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::ErrorDetail;

const X_SUFFIX: &str = " X";
const Y_SUFFIX: &str = " Y";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    /// Builds a curve with X and Y co-sorted ascending by X.
    pub fn new(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        let mut points = x.into_iter().zip(y).collect::<Vec<_>>();
        points.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        let (x, y): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        Self {
            name: name.into(),
            x,
            y,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Trapezoidal area under the curve.
    pub fn integral(&self) -> f64 {
        self.x
            .windows(2)
            .zip(self.y.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
            .sum()
    }

    /// `max(1 - |I - I_target| / |I_target|, 0)`.
    pub fn integral_affinity(&self, target: &Curve) -> Result<f64, ErrorDetail> {
        let reference = target.integral();
        if reference == 0.0 || !reference.is_finite() {
            return Err(ErrorDetail::DegenerateTarget {
                curve: target.name.clone(),
            });
        }
        let affinity = 1.0 - (self.integral() - reference).abs() / reference.abs();
        // NaN from a non-finite measured integral collapses to zero as well
        Ok(if affinity > 0.0 { affinity } else { 0.0 })
    }

    /// Linear interpolation at `xs`; values outside the X range are dropped.
    pub fn sample(&self, xs: &[f64]) -> Curve {
        let (x, y): (Vec<f64>, Vec<f64>) = xs
            .iter()
            .filter_map(|&at| self.interpolate(at).map(|y| (at, y)))
            .unzip();
        Curve::new(self.name.clone(), x, y)
    }

    pub fn interpolate(&self, at: f64) -> Option<f64> {
        if !at.is_finite() {
            return None;
        }
        let (first, last) = (*self.x.first()?, *self.x.last()?);
        if at < first || at > last {
            return None;
        }
        let upper = self.x.partition_point(|&x| x < at);
        if upper == 0 || self.x[upper] == at {
            return Some(self.y[upper]);
        }
        let (x0, x1) = (self.x[upper - 1], self.x[upper]);
        let (y0, y1) = (self.y[upper - 1], self.y[upper]);
        Some(y0 + (y1 - y0) * (at - x0) / (x1 - x0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurveSet {
    pub curves: IndexMap<String, Curve>,
}

fn curve_names(headers: &csv::StringRecord) -> Vec<String> {
    headers
        .iter()
        .filter_map(|header| header.strip_suffix(X_SUFFIX))
        .filter(|name| headers.iter().any(|h| h == format!("{name}{Y_SUFFIX}")))
        .map(str::to_owned)
        .collect()
}

fn parse_cell(record: &csv::StringRecord, index: usize) -> Option<f64> {
    record
        .get(index)
        .filter(|cell| !cell.is_empty())
        .and_then(|cell| cell.parse().ok())
}

impl CurveSet {
    /// Reads every X/Y pair from `path`, restricted to `allowed` unless it is empty.
    pub fn import(
        path: impl AsRef<Path>,
        allowed: &IndexMap<String, String>,
    ) -> Result<Self, ErrorDetail> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(ErrorDetail::ReadCurves)?;
        let headers = reader.headers().map_err(ErrorDetail::ReadCurves)?.clone();
        let columns = curve_names(&headers)
            .into_iter()
            .filter(|name| allowed.is_empty() || allowed.contains_key(name))
            .filter_map(|name| {
                let x = headers.iter().position(|h| h == format!("{name}{X_SUFFIX}"))?;
                let y = headers.iter().position(|h| h == format!("{name}{Y_SUFFIX}"))?;
                Some((name, x, y))
            })
            .collect::<Vec<_>>();
        let mut series = columns
            .iter()
            .map(|(name, ..)| (name.clone(), (Vec::new(), Vec::new())))
            .collect::<IndexMap<_, _>>();
        for record in reader.records() {
            let record = record.map_err(ErrorDetail::ReadCurves)?;
            for (name, x, y) in &columns {
                if let (Some(x), Some(y)) = (parse_cell(&record, *x), parse_cell(&record, *y)) {
                    let (xs, ys) = &mut series[name];
                    xs.push(x);
                    ys.push(y);
                }
            }
        }
        let curves = series
            .into_iter()
            .map(|(name, (x, y))| (name.clone(), Curve::new(name, x, y)))
            .collect();
        Ok(Self { curves })
    }

    pub fn get(&self, name: &str) -> Option<&Curve> {
        self.curves.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.curves.values().all(Curve::is_empty)
    }

    /// Per curve affinity for every curve present in both sets, in this set's order.
    pub fn affinities(&self, target: &CurveSet) -> Result<IndexMap<String, f64>, ErrorDetail> {
        self.curves
            .iter()
            .filter_map(|(name, curve)| Some((name, curve, target.get(name)?)))
            .map(|(name, curve, target)| Ok((name.clone(), curve.integral_affinity(target)?)))
            .collect()
    }
}

pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}
