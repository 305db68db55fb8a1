use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use quercus_io::{
    CaseReader, PredictionWriter, RowReader, SchemaReader, data_path, model_path, names_path,
    output_path, test_path,
};
use quercus_tree::{
    CrossValidation, DataPoint, Dataset, DomainTable, EvaluationReport, ForestConfig, Model,
    ModelKind, SplitCriterion, TreeConfig, compute_imputation, evaluate_forest, evaluate_tree,
    impute_missing,
};

#[derive(Parser)]
#[command(name = "quercus")]
#[command(about = "Decision tree and random forest induction over tabular data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 13579, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Build a decision tree or a random forest and evaluate it
    Train {
        /// Path to the .data file (the .names file must sit next to it)
        #[arg(long)]
        data: PathBuf,

        /// Split criterion: certainty, entropy, or gini
        #[arg(long, default_value = "certainty")]
        criterion: String,

        /// Build a random forest with this many trees instead of one tree
        #[arg(long)]
        trees: Option<usize>,

        /// Hold out 20% of the training data as a test set when no .test
        /// file exists
        #[arg(long)]
        partition: bool,

        /// Save the trained model next to the data file
        #[arg(long)]
        save: bool,

        /// Soft cap on concurrent subtree workers (single-tree mode)
        #[arg(long, default_value_t = 500)]
        subtree_workers: usize,
    },

    /// 10-fold cross-validation of tree or forest induction
    Validate {
        /// Path to the .data file
        #[arg(long)]
        data: PathBuf,

        /// Split criterion: certainty, entropy, or gini
        #[arg(long, default_value = "certainty")]
        criterion: String,

        /// Validate random forests with this many trees per fold
        #[arg(long)]
        trees: Option<usize>,
    },

    /// Classify a .cases file against a saved model
    Predict {
        /// Path to the saved .tree or .forest model file
        #[arg(long)]
        model: PathBuf,

        /// Path to the .cases file with unlabeled records
        #[arg(long)]
        cases: PathBuf,

        /// Output file (defaults to the cases file with a .tmp extension)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    data: String,
    criterion: String,
    trees: usize,
    nodes: usize,
    rules: usize,
    root_attribute: Option<String>,
    train: EvaluationReport,
    test: Option<EvaluationReport>,
    importances: Vec<ImportanceOutput>,
    model: Option<String>,
}

#[derive(Serialize)]
struct ImportanceOutput {
    attribute: String,
    score: f64,
    baseline: f64,
}

#[derive(Serialize)]
struct ValidateOutput {
    data: String,
    criterion: String,
    trees: usize,
    fold_errors: Vec<f64>,
    mean_error: f64,
    std_error: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    model: String,
    cases: usize,
    output: String,
}

fn parse_criterion(s: &str) -> Result<SplitCriterion> {
    match s {
        "certainty" | "c" => Ok(SplitCriterion::Certainty),
        "entropy" | "e" => Ok(SplitCriterion::Entropy),
        "gini" | "g" => Ok(SplitCriterion::Gini),
        other => anyhow::bail!("unknown criterion: {other} (expected certainty, entropy, or gini)"),
    }
}

/// Read the schema and all row files next to `input`.
///
/// Returns the training dataset plus the rows of an optional `.test`
/// companion file, encoded through the same domains.
fn load_dataset(input: &Path) -> Result<(Dataset, Vec<DataPoint>, PathBuf)> {
    let data = data_path(input);
    let schema = SchemaReader::new(&names_path(&data))
        .read()
        .context("failed to read schema file")?;

    let mut domains = DomainTable::new(schema.len());
    let train_points = RowReader::new(&data, &schema)
        .read(&mut domains)
        .context("failed to read training data")?;
    info!(n_rows = train_points.len(), "training data loaded");

    let test = test_path(&data);
    let test_points = if test.exists() {
        let points = RowReader::new(&test, &schema)
            .read(&mut domains)
            .context("failed to read test data")?;
        info!(n_rows = points.len(), "test data loaded");
        points
    } else {
        Vec::new()
    };

    let dataset = Dataset::new(schema, domains, train_points)?;
    Ok((dataset, test_points, data))
}

fn importance_output(
    dataset: &Dataset,
    importances: &[quercus_tree::AttributeImportance],
) -> Vec<ImportanceOutput> {
    importances
        .iter()
        .map(|record| ImportanceOutput {
            attribute: dataset.schema().name(record.attribute).to_string(),
            score: record.score,
            baseline: record.baseline,
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            criterion,
            trees,
            partition,
            save,
            subtree_workers,
        } => {
            let criterion_parsed = parse_criterion(&criterion)?;
            let (mut dataset, mut test_points, data_file) = load_dataset(&data)?;

            if partition && test_points.is_empty() {
                let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
                test_points = dataset.split_off_test(0.8, &mut rng);
                info!(
                    n_train = dataset.len(),
                    n_test = test_points.len(),
                    "data partitioned"
                );
            }
            if save && !test_points.is_empty() {
                // A saved model trains on everything.
                dataset.absorb(std::mem::take(&mut test_points));
            }

            let imputation = compute_imputation(&dataset);
            impute_missing(&mut dataset, &imputation);

            let output = if let Some(tree_count) = trees {
                let config = ForestConfig::new(tree_count)?
                    .with_criterion(criterion_parsed)
                    .with_seed(cli.seed);
                let fit = config.fit(&dataset)?;
                let importances = importance_output(&dataset, fit.importances());
                let nodes = fit
                    .forest()
                    .trees()
                    .iter()
                    .map(quercus_tree::Tree::populated_node_count)
                    .sum();
                let rules = fit
                    .forest()
                    .trees()
                    .iter()
                    .map(quercus_tree::Tree::rule_count)
                    .sum();
                let train_report = evaluate_forest(fit.forest(), &dataset, dataset.points());
                let test_report = (!test_points.is_empty())
                    .then(|| evaluate_forest(fit.forest(), &dataset, &test_points));

                let model = if save {
                    let path = model_path(&data_file, true);
                    let (forest, importance_records) = fit.into_parts();
                    let (schema, domains, _) = dataset.into_parts();
                    Model::new(
                        schema,
                        domains,
                        imputation,
                        importance_records,
                        ModelKind::Forest(forest),
                    )
                    .save(&path)?;
                    Some(path.display().to_string())
                } else {
                    None
                };

                TrainOutput {
                    data: data_file.display().to_string(),
                    criterion,
                    trees: tree_count,
                    nodes,
                    rules,
                    root_attribute: None,
                    train: train_report,
                    test: test_report,
                    importances,
                    model,
                }
            } else {
                let config = TreeConfig::new()
                    .with_criterion(criterion_parsed)
                    .with_seed(cli.seed)
                    .with_subtree_workers(subtree_workers);
                let fit = config.fit(&dataset)?;
                let importances = importance_output(&dataset, fit.importances());
                let tree = fit.tree();
                let nodes = tree.populated_node_count();
                let rules = tree.rule_count();
                let root_attribute = tree
                    .node(tree.root())
                    .split()
                    .map(|split| dataset.schema().name(split.attribute()).to_string());
                let train_report = evaluate_tree(tree, &dataset, dataset.points());
                let test_report =
                    (!test_points.is_empty()).then(|| evaluate_tree(tree, &dataset, &test_points));

                let model = if save {
                    let path = model_path(&data_file, false);
                    let (tree, importance_records) = fit.into_parts();
                    let (schema, domains, _) = dataset.into_parts();
                    Model::new(
                        schema,
                        domains,
                        imputation,
                        importance_records,
                        ModelKind::Tree(tree),
                    )
                    .save(&path)?;
                    Some(path.display().to_string())
                } else {
                    None
                };

                TrainOutput {
                    data: data_file.display().to_string(),
                    criterion,
                    trees: 1,
                    nodes,
                    rules,
                    root_attribute,
                    train: train_report,
                    test: test_report,
                    importances,
                    model,
                }
            };

            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Validate {
            data,
            criterion,
            trees,
        } => {
            let criterion_parsed = parse_criterion(&criterion)?;
            let (mut dataset, test_points, data_file) = load_dataset(&data)?;

            // Cross-validation folds over everything that was read.
            dataset.absorb(test_points);
            let imputation = compute_imputation(&dataset);
            impute_missing(&mut dataset, &imputation);

            let validation = CrossValidation::new().with_seed(cli.seed);
            let result = if let Some(tree_count) = trees {
                let config = ForestConfig::new(tree_count)?
                    .with_criterion(criterion_parsed)
                    .with_seed(cli.seed);
                validation.evaluate_forests(&dataset, &config)?
            } else {
                let config = TreeConfig::new()
                    .with_criterion(criterion_parsed)
                    .with_seed(cli.seed);
                validation.evaluate_trees(&dataset, &config)?
            };

            let output = ValidateOutput {
                data: data_file.display().to_string(),
                criterion,
                trees: trees.unwrap_or(1),
                fold_errors: result.fold_errors,
                mean_error: result.mean_error,
                std_error: result.std_error,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            cases,
            output,
        } => {
            let mut loaded = Model::load(&model).context("failed to load model")?;
            info!(path = %model.display(), "model loaded");

            let (schema, domains, imputation) = loaded.query_context();
            let encoded = CaseReader::new(&cases, schema, imputation)
                .read(domains)
                .context("failed to read cases file")?;

            let predictions: Vec<(String, String)> = encoded
                .into_iter()
                .map(|(line, point)| {
                    let code = loaded.classify(&point);
                    let label = loaded.class_label(code).unwrap_or("?").to_string();
                    (line, label)
                })
                .collect();

            let out_path = output.unwrap_or_else(|| output_path(&cases));
            PredictionWriter::new(&out_path).write(&predictions)?;

            let summary = PredictOutput {
                model: model.display().to_string(),
                cases: predictions.len(),
                output: out_path.display().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
