//! CLI command definitions for mlops-pipeline.
//!
//! Without a subcommand the binary runs the workflow selected by `--step`.
//! Every step can also be invoked on its own through a subcommand carrying
//! its step-specific options.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::error::{InvalidEnvironment, PipelineError, StorageError};
use crate::pipeline::{
    invoke_with_retries, CancellationFlag, ConfigError, PipelineConfig, PipelinePlan,
    PipelineRunner, ALL_STEPS,
};
use crate::steps::{default_registry, smoke_test, FEAT_DATA, MAKE_DATA, PREDICT, TRAIN_MODEL};
use crate::storage::{ArtifactStore, Environment, FsBackend, ModelSelector, LATEST};
use crate::tracking::{FileRunTracker, PipelineRun};

/// Values accepted by `--step`.
pub const WORKFLOW_STEPS: [&str; 6] = ["test", "make_data", "feat_data", "train_model", "predict", "full"];

/// Values accepted by `--environment`.
pub const ENVIRONMENT_OPTIONS: [&str; 3] = ["local", "dev", "prod"];

/// Exit code for requests rejected before any work started.
pub const EXIT_USAGE: i32 = 2;
/// Exit code for failures during execution.
pub const EXIT_FAILURE: i32 = 1;

/// MLOps pipeline: create data, build features, train, deploy and predict.
#[derive(Parser)]
#[command(name = "mlops-pipeline")]
#[command(about = "Run the ML pipeline against local, dev or prod storage")]
#[command(version)]
#[command(
    long_about = "mlops-pipeline runs the create data -> build features -> train model -> predict workflow.\n\nArtifacts are stored locally or under s3://bucket-{env}/ depending on --environment.\n\nExample usage:\n  mlops-pipeline --step full --environment local\n  mlops-pipeline predict --name Tree_model --model latest"
)]
pub struct Cli {
    /// Run a single step instead of the workflow.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Workflow step to run (`full` runs every step, `test` checks the environment).
    #[arg(short, long, default_value = "full", value_parser = WORKFLOW_STEPS)]
    pub step: String,

    /// Storage environment.
    #[arg(
        short,
        long,
        default_value = "local",
        env = "PIPELINE_ENVIRONMENT",
        global = true,
        value_parser = ENVIRONMENT_OPTIONS
    )]
    pub environment: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Output JSON instead of text.
    #[arg(short, long, global = true)]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Create and process the dataset.
    MakeData,

    /// Featurize the processed dataset.
    #[command(alias = "feat-data")]
    BuildFeatures,

    /// Train, evaluate and conditionally deploy a model.
    TrainModel(TrainModelArgs),

    /// Predict with a deployed model.
    Predict(PredictArgs),

    /// Print the task manifest for an external orchestrator.
    Plan,
}

/// Arguments for `mlops-pipeline train-model`.
#[derive(Parser, Debug)]
pub struct TrainModelArgs {
    /// Model name (default: PIPELINE_MODEL_NAME or Tree_model).
    #[arg(long)]
    pub name: Option<String>,
}

/// Arguments for `mlops-pipeline predict`.
#[derive(Parser, Debug)]
pub struct PredictArgs {
    /// Model name (default: PIPELINE_MODEL_NAME or Tree_model).
    #[arg(long)]
    pub name: Option<String>,

    /// Model version timestamp, or `latest`.
    #[arg(short, long, default_value = LATEST)]
    pub model: String,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let environment: Environment = cli.environment.parse()?;
    let mut config = PipelineConfig::from_env()?.with_environment(environment);

    let requested = match cli.command {
        None => match cli.step.as_str() {
            "test" => return run_smoke_command(&config, cli.json).await,
            "full" => ALL_STEPS.to_string(),
            step => step.to_string(),
        },
        Some(Commands::MakeData) => MAKE_DATA.to_string(),
        Some(Commands::BuildFeatures) => FEAT_DATA.to_string(),
        Some(Commands::TrainModel(args)) => {
            if let Some(name) = args.name {
                config.model_name = name;
            }
            TRAIN_MODEL.to_string()
        }
        Some(Commands::Predict(args)) => {
            if let Some(name) = args.name {
                config.model_name = name;
            }
            config.model_selector = args.model.parse::<ModelSelector>()?;
            PREDICT.to_string()
        }
        Some(Commands::Plan) => return run_plan_command(&config),
    };

    config.validate()?;
    run_pipeline_command(&requested, config, cli.json).await
}

/// Maps a CLI failure to the process exit code.
///
/// Requests rejected before any step ran are usage errors.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
        if pipeline_err.is_validation() {
            return EXIT_USAGE;
        }
    }
    if let Some(StorageError::InvalidEnvironment(_)) = err.downcast_ref::<StorageError>() {
        return EXIT_USAGE;
    }
    if err.is::<InvalidEnvironment>() || err.is::<ConfigError>() {
        return EXIT_USAGE;
    }
    EXIT_FAILURE
}

fn build_runner(config: PipelineConfig) -> anyhow::Result<PipelineRunner> {
    let registry = default_registry(&config)?;
    let store = build_store(&config);
    let tracker = Arc::new(FileRunTracker::new(&config.tracking_dir));
    Ok(PipelineRunner::new(Arc::new(registry), store, tracker, config))
}

fn build_store(config: &PipelineConfig) -> ArtifactStore {
    let mut backend = FsBackend::new(&config.workdir);
    if let Some(mount) = &config.remote_mount {
        backend = backend.with_remote_mount(mount);
    }
    ArtifactStore::new(Arc::new(backend))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn run_pipeline_command(
    requested: &str,
    config: PipelineConfig,
    json: bool,
) -> anyhow::Result<()> {
    let environment = config.environment.to_string();
    let retries = config.retries;
    let timeout = config.timeout;

    let cancel = CancellationFlag::new();
    let timer = cancel.cancel_after(timeout);
    let signal = cancel.cancel_on_ctrl_c();

    let runner = build_runner(config)?.with_cancellation(cancel);
    info!(requested, environment = %environment, retries, "Launching pipeline");
    let result = invoke_with_retries(&runner, requested, &environment, retries).await;

    timer.abort();
    signal.abort();

    let run = result?;
    print_run(&run, json)?;
    Ok(())
}

async fn run_smoke_command(config: &PipelineConfig, json: bool) -> anyhow::Result<()> {
    let store = build_store(config);
    let tracker = FileRunTracker::new(&config.tracking_dir);
    let root = smoke_test(&store, &tracker, config.environment.as_str()).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "status": "success", "root": root })
        );
    } else {
        println!("Success (storage root: {})", root);
    }
    Ok(())
}

fn run_plan_command(config: &PipelineConfig) -> anyhow::Result<()> {
    config.validate()?;
    let registry = default_registry(config)?;
    let plan = PipelinePlan::build(&registry, config.environment, config);
    println!("{}", plan.to_json()?);
    Ok(())
}

fn print_run(run: &PipelineRun, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(run)?);
        return Ok(());
    }

    println!("Run {} ({}) {}", run.run_id, run.environment, run.status);
    for step in &run.steps {
        println!("- {}", step.name);
        for (key, value) in &step.params {
            println!("    {}: {}", key, value);
        }
        for (key, value) in &step.metrics {
            println!("    {}: {:.4}", key, value);
        }
    }
    Ok(())
}
