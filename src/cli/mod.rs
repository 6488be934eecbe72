//! Kolosal Select CLI Module
//!
//! Command-line interface for training, prediction, bundle export and data
//! inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::dataset::Scalar;
use crate::export::{BundleStore, FileBundleStore};
use crate::inference::InferenceService;
use crate::preprocessing::{classify_features, FeatureKind};
use crate::training::{catalog, ModelFamily, TaskType, TrainingConfig, TrainingOrchestrator};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{:<14} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-select")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated model selection with cross-validated Bayesian search")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search every candidate family and persist the best model of each
    Train {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Task type (classification, regression). Defaults to the config
        /// file's task, or classification without one.
        #[arg(long)]
        task: Option<String>,

        /// Trials per family (overrides the config file)
        #[arg(long)]
        trials: Option<usize>,

        /// Number of cross-validation folds (overrides the config file)
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Restrict the search to these families (comma separated)
        #[arg(long, value_delimiter = ',')]
        families: Option<Vec<String>>,

        /// Search families in parallel
        #[arg(long)]
        parallel: bool,

        /// Training configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bundle store directory
        #[arg(short, long, default_value = "bundles")]
        store: PathBuf,

        /// Write the training report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Predict with a trained family
    Predict {
        /// Model family name
        #[arg(short, long)]
        family: String,

        /// Input rows (CSV, JSON, or Parquet), target column absent
        #[arg(short, long)]
        data: PathBuf,

        /// Bundle store directory
        #[arg(short, long, default_value = "bundles")]
        store: PathBuf,

        /// Write predictions as a JSON array
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy a persisted bundle out as `<family>_model.json`
    Export {
        /// Model family name
        #[arg(short, long)]
        family: String,

        /// Bundle store directory
        #[arg(short, long, default_value = "bundles")]
        store: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Show data information and the feature classification
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// List candidate families and their search spaces
    Families {
        /// Only show one task (classification, regression)
        #[arg(long)]
        task: Option<String>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Resolve the training configuration from the config file and flags.
/// Flags override the file; anything not given keeps the file's value.
#[allow(clippy::too_many_arguments)]
pub fn resolve_train_config(
    target: &str,
    task_type: Option<&str>,
    trials: Option<usize>,
    cv_folds: Option<usize>,
    families: Option<&[String]>,
    parallel: bool,
    config_path: Option<&Path>,
) -> anyhow::Result<TrainingConfig> {
    let task = task_type.map(str::parse::<TaskType>).transpose()?;
    let mut config = match config_path {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::new(task.unwrap_or(TaskType::Classification), target),
    };
    if let Some(task) = task {
        config.task = task;
    }
    config.target_column = target.to_string();
    if let Some(n) = trials {
        config.search.n_trials = n;
    }
    if let Some(k) = cv_folds {
        config.search.cv_folds = k;
    }
    if parallel {
        config.parallel_families = true;
    }
    if let Some(names) = families {
        let parsed = names
            .iter()
            .map(|n| n.trim().parse::<ModelFamily>())
            .collect::<Result<Vec<_>, _>>()?;
        config.families = Some(parsed);
    }
    Ok(config)
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    data_path: &Path,
    target: &str,
    task_type: Option<&str>,
    trials: Option<usize>,
    cv_folds: Option<usize>,
    families: Option<&[String]>,
    parallel: bool,
    config_path: Option<&Path>,
    store_dir: &Path,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let config = resolve_train_config(target, task_type, trials, cv_folds, families, parallel, config_path)?;
    let task = config.task;

    step_run("Loading data");
    let start = Instant::now();
    let data = DataLoader::new().load_dataset(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", data.n_rows(), data.n_cols(), start.elapsed()));

    let store = Arc::new(FileBundleStore::open(store_dir)?);
    let orchestrator = TrainingOrchestrator::new(config.clone(), store);

    step_run(&format!(
        "Searching {} trials × {} folds per family",
        config.search.n_trials, config.search.cv_folds
    ));
    let start = Instant::now();
    let report = orchestrator.train(&data)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let metric_name = match task {
        TaskType::Classification => "Accuracy",
        TaskType::Regression => "Neg MSE",
    };

    println!();
    println!("  {:<22} {:>12} {:>8} {:>10}", muted("Family"), muted(metric_name), muted("Failed"), muted("Time"));
    println!("  {}", dim(&"─".repeat(56)));
    for result in report.results.values() {
        let failed = result.history.iter().filter(|h| !h.score.is_finite()).count();
        println!(
            "  {:<22} {:>12.4} {:>8} {:>9.2}s",
            result.family.name(),
            result.best_score,
            failed,
            result.duration_secs
        );
    }
    for (family, reason) in &report.failures {
        println!("  {:<22} {}", family.name(), format!("err: {}", reason).red());
    }
    println!("  {}", dim(&"─".repeat(56)));

    if let Some(best) = report.best() {
        println!();
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            best.family.name().white().bold(),
            muted(&format!("{}:", metric_name)),
            best.best_score
        );
    }
    if let Some(labels) = &report.class_labels {
        println!("  {}", kv("Classes", &format_scalars(labels)));
    }
    println!("  {}", kv("Bundles", &store_dir.display().to_string()));

    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("  {}", kv("Report", &path.display().to_string()));
    }
    println!();

    Ok(())
}

pub fn cmd_predict(
    family: &str,
    data_path: &Path,
    store_dir: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let family: ModelFamily = family.parse()?;
    let store: Arc<dyn BundleStore> = Arc::new(FileBundleStore::open(store_dir)?);
    if !store.contains(family) {
        anyhow::bail!("no trained bundle for '{}' in {}", family, store_dir.display());
    }

    step_run("Loading data");
    let data = DataLoader::new().load_dataset(data_path)?;
    step_done(&format!("{} rows", data.n_rows()));

    step_run(&format!("Predicting with {}", family.name().cyan()));
    let start = Instant::now();
    let predictions = InferenceService::new(store).predict(family, &data)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    match output {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&predictions)?)?;
            println!("  {}", kv("Output", &path.display().to_string()));
        }
        None => {
            println!();
            for (i, p) in predictions.iter().take(20).enumerate() {
                println!("  {:>5}  {}", muted(&i.to_string()), format_scalar(p));
            }
            if predictions.len() > 20 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 20)));
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_export(family: &str, store_dir: &Path, output_dir: &Path) -> anyhow::Result<()> {
    section("Export");

    let family: ModelFamily = family.parse()?;
    let store = FileBundleStore::open(store_dir)?;
    let (name, bytes) = store.export(family)?;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(name);
    std::fs::write(&path, &bytes)?;
    println!("  {} {} {}", ok("✓"), path.display(), dim(&format!("({} bytes)", bytes.len())));
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Info");

    let data = DataLoader::new().load_dataset(data_path)?;
    let features = classify_features(&data);

    println!("  {}", kv("File", &data_path.display().to_string()));
    println!("  {}", kv("Rows", &data.n_rows().to_string()));
    println!("  {}", kv("Columns", &data.n_cols().to_string()));
    println!();
    println!("  {:<24} {:<12} {:>8} {:>8}", muted("Column"), muted("Kind"), muted("Missing"), muted("Distinct"));
    println!("  {}", dim(&"─".repeat(56)));
    for column in data.columns() {
        let kind = match features.kind_of(column.name()) {
            Some(FeatureKind::Numerical) => "numerical",
            _ => "categorical",
        };
        println!(
            "  {:<24} {:<12} {:>8} {:>8}",
            column.name(),
            kind,
            column.n_missing(),
            column.distinct().len()
        );
    }
    println!();
    Ok(())
}

pub fn cmd_families(task: Option<&str>) -> anyhow::Result<()> {
    let tasks = match task {
        Some(t) => vec![t.parse::<TaskType>()?],
        None => vec![TaskType::Classification, TaskType::Regression],
    };

    for task in tasks {
        section(&format!("Families · {}", task));
        for candidate in catalog(task) {
            let space = if candidate.search_space.is_empty() {
                dim("(no hyperparameters)").to_string()
            } else {
                candidate
                    .search_space
                    .parameters()
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!("  {:<22} {}", candidate.family.name().white(), space);
        }
    }
    println!();
    Ok(())
}

fn format_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Number(v) => format!("{}", v),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Text(s) => s.clone(),
        Scalar::Missing => "∅".to_string(),
    }
}

fn format_scalars(values: &[Scalar]) -> String {
    values.iter().map(format_scalar).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &[&str]) -> anyhow::Result<TrainingConfig> {
        let cli = Cli::try_parse_from(args)?;
        match cli.command {
            Commands::Train {
                target,
                task,
                trials,
                cv_folds,
                families,
                parallel,
                config,
                ..
            } => resolve_train_config(
                &target,
                task.as_deref(),
                trials,
                cv_folds,
                families.as_deref(),
                parallel,
                config.as_deref(),
            ),
            _ => anyhow::bail!("not a train command"),
        }
    }

    fn saved_regression_config(dir: &Path) -> PathBuf {
        let path = dir.join("run.json");
        let config = TrainingConfig::new(TaskType::Regression, "price")
            .with_n_trials(9)
            .with_families(vec![ModelFamily::LinearRegression]);
        std::fs::write(&path, config.to_json().unwrap()).unwrap();
        path
    }

    #[test]
    fn test_config_file_task_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_regression_config(dir.path());
        let config = resolve(&[
            "kolosal-select", "train", "-d", "d.csv", "-t", "price", "--config", path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(config.task, TaskType::Regression);
        assert_eq!(config.search.n_trials, 9);
        assert_eq!(config.families, Some(vec![ModelFamily::LinearRegression]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_regression_config(dir.path());
        let config = resolve(&[
            "kolosal-select", "train", "-d", "d.csv", "-t", "label", "--config", path.to_str().unwrap(),
            "--task", "classification", "--trials", "4", "--families", "knn,svm",
        ])
        .unwrap();

        assert_eq!(config.task, TaskType::Classification);
        assert_eq!(config.target_column, "label");
        assert_eq!(config.search.n_trials, 4);
        assert_eq!(config.families, Some(vec![ModelFamily::Knn, ModelFamily::Svm]));
    }

    #[test]
    fn test_task_defaults_to_classification() {
        let config = resolve(&["kolosal-select", "train", "-d", "d.csv", "-t", "y"]).unwrap();
        assert_eq!(config.task, TaskType::Classification);
        assert!(config.families.is_none());
    }

    #[test]
    fn test_unknown_task_rejected() {
        assert!(resolve(&["kolosal-select", "train", "-d", "d.csv", "-t", "y", "--task", "ranking"]).is_err());
    }
}
