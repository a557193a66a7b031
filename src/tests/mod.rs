use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{catalogue::LocalCatalogue, config, schema::Schemas};

mod affinity;
mod index;

pub(crate) struct Workspace {
    _root: TempDir,
    pub data: PathBuf,
    pub targets: PathBuf,
    pub schemas: Schemas,
}

impl Workspace {
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data.join(name)
    }
}

/// Fixture config with its directories pointed at a scratch tree.
pub(crate) fn workspace() -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    let targets = root.path().join("targets");
    std::fs::create_dir(&data).unwrap();
    std::fs::create_dir(&targets).unwrap();
    let mut config: config::Config =
        serde_yaml::from_str(include_str!("config.yaml")).unwrap();
    config.data_directory = data.clone();
    config.target_directory = Some(targets.clone());
    let schemas = Schemas::compile(&config).unwrap();
    Workspace {
        _root: root,
        data,
        targets,
        schemas,
    }
}

pub(crate) async fn local_catalogue() -> LocalCatalogue {
    LocalCatalogue::open("sqlite::memory:").await.unwrap()
}

pub(crate) fn ramp(slope: f64) -> Vec<(f64, f64)> {
    vec![(0.0, 0.0), (1.0, slope), (2.0, 2.0 * slope)]
}

/// Writes one `"<curve> X"`/`"<curve> Y"` column pair per curve.
pub(crate) fn write_curves(path: &Path, curves: &[(&str, Vec<(f64, f64)>)]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    let header = curves
        .iter()
        .flat_map(|(name, _)| [format!("{name} X"), format!("{name} Y")])
        .collect::<Vec<_>>();
    writer.write_record(&header).unwrap();
    let rows = curves.iter().map(|(_, points)| points.len()).max().unwrap_or(0);
    for index in 0..rows {
        let record = curves
            .iter()
            .flat_map(|(_, points)| match points.get(index) {
                Some((x, y)) => [x.to_string(), y.to_string()],
                None => [String::new(), String::new()],
            })
            .collect::<Vec<_>>();
        writer.write_record(&record).unwrap();
    }
    writer.flush().unwrap();
}

/// An IDVD measurement with drain current `ID` of the given slope and a fixed gate current.
pub(crate) fn write_idvd(path: &Path, slope: f64) {
    write_curves(path, &[("ID", ramp(slope)), ("IG", ramp(0.1))]);
}
