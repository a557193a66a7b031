use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use expcat::{
    affinity::{AffinityEngine, TargetLocator},
    catalogue::{LocalCatalogue, store::Client as _},
    config, grouping,
    indexer::Indexer,
    schema::{AFFINITY_TOTAL, Schemas},
    tab::{JsonRenderer, OpenTabsCache, TabContext},
};
use tracing::error;

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "EXPCAT_CONFIG")]
    config: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the catalogue with the data directory
    Index,
    /// Print catalogue rows collapsed over one attribute
    Group {
        #[clap(long)]
        file_type: String,
        #[clap(long)]
        by: String,
    },
    /// Score files against their targets, every catalogued file when none are given
    Affinity {
        #[clap(long)]
        file_type: String,
        paths: Vec<PathBuf>,
    },
    /// Export the figure of a file or `#`-joined group
    Plot {
        key: String,
        #[clap(long)]
        targets: bool,
        #[clap(long, value_delimiter = ',')]
        samples: Vec<f64>,
        #[clap(long)]
        characteristic: bool,
        #[clap(short, long)]
        output: PathBuf,
    },
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(&opts.config)
        .await
        .with_context(|| "read config")?;
    let config: config::Config = serde_yaml::from_str(&text)
        .with_context(|| format!("parse config from {}", opts.config.display()))?;
    let schemas = Arc::new(Schemas::compile(&config).with_context(|| "compile schema")?);
    let catalogue = LocalCatalogue::open(&config.catalogue)
        .await
        .with_context(|| format!("open catalogue {}", config.catalogue))?;

    match opts.command {
        Command::Index => {
            let report = Indexer::new(&schemas, &catalogue)
                .reindex(&config.data_directory)
                .await?;
            for (file_type, summary) in &report.summaries {
                println!(
                    "{file_type}: {} kept, {} added, {} removed{}",
                    summary.kept,
                    summary.added,
                    summary.removed,
                    if summary.rebuilt { " (rebuilt)" } else { "" }
                );
            }
            if !report.skipped.is_empty() {
                println!("{} files skipped", report.skipped.len());
            }
        }
        Command::Group { file_type, by } => {
            let file_type = file_type.to_uppercase();
            let schema = schemas.get(&file_type)?;
            let sheet = catalogue
                .load(schema)
                .await?
                .ok_or_else(|| anyhow!("{file_type} is not indexed yet"))?;
            let grouped = grouping::group(&sheet, &by)?;
            for row in &grouped.catalogue.rows {
                let visible = row
                    .iter()
                    .filter(|(column, _)| {
                        column.as_str() == expcat::schema::FILE_PATH
                            || !grouped.hidden_columns.contains(*column)
                    })
                    .collect::<indexmap::IndexMap<_, _>>();
                println!("{}", serde_json::to_string(&visible)?);
            }
        }
        Command::Affinity { file_type, paths } => {
            let directory = config
                .target_directory
                .as_ref()
                .ok_or_else(|| anyhow!("target_directory is not configured"))?;
            let locator = TargetLocator::new(directory);
            let sheet = AffinityEngine::new(&schemas, &locator, &catalogue)
                .calculate_affinities(&file_type.to_uppercase(), &paths)
                .await?;
            for row in &sheet.rows {
                let path = row.get(expcat::schema::FILE_PATH).cloned().flatten();
                let total = row.get(AFFINITY_TOTAL).cloned().flatten();
                if let (Some(path), Some(total)) = (path, total) {
                    println!("{path}\t{total}");
                }
            }
        }
        Command::Plot {
            key,
            targets,
            samples,
            characteristic,
            output,
        } => {
            let mut tabs = OpenTabsCache::new(TabContext {
                schemas: schemas.clone(),
                locator: config.target_directory.as_ref().map(TargetLocator::new),
                renderer: JsonRenderer::new(config.figure.clone()),
            });
            let tab = tabs.tab(&key)?;
            if !samples.is_empty() {
                tab.set_samples(samples)?;
            }
            if characteristic {
                tab.switch_char();
            }
            if targets {
                tab.switch_target();
            }
            tab.export(&output)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    if let Err(e) = run(opts).await {
        error!(?e, "critical error");
    }
}
