//! End-to-end tests running the default steps against local storage.

use std::path::Path;
use std::sync::Arc;

use mlops_pipeline::model::{Estimator, Predictor};
use mlops_pipeline::pipeline::{
    PipelineConfig, PipelineRunner, PlacementHint, ResourceHint, StepRegistry,
};
use mlops_pipeline::steps::{default_registry, BuildFeatures, MakeData, TrainModel};
use mlops_pipeline::storage::{ArtifactStore, Category, FsBackend, StorageRoot, PREDICTION};
use mlops_pipeline::tracking::{FileRunTracker, RunStatus};
use mlops_pipeline::{ModelError, PipelineError, StorageError};
use ndarray::{Array1, Array2};
use tempfile::TempDir;

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig::new()
        .with_workdir(dir)
        .with_tracking_dir(dir.join("mlruns"))
}

fn runner_for(config: PipelineConfig, registry: StepRegistry) -> PipelineRunner {
    let mut backend = FsBackend::new(&config.workdir);
    if let Some(mount) = &config.remote_mount {
        backend = backend.with_remote_mount(mount);
    }
    let store = ArtifactStore::new(Arc::new(backend));
    let tracker = Arc::new(FileRunTracker::new(&config.tracking_dir));
    PipelineRunner::new(Arc::new(registry), store, tracker, config)
}

fn default_runner(config: PipelineConfig) -> PipelineRunner {
    let registry = default_registry(&config).expect("default registry");
    runner_for(config, registry)
}

fn model_versions(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir.join("models")) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Always predicts the first class it saw.
struct ConstantEstimator;

struct ConstantPredictor(i64);

impl Predictor for ConstantPredictor {
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<i64>, ModelError> {
        Ok(Array1::from_elem(features.nrows(), self.0))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(self.0.to_string().into_bytes())
    }
}

impl Estimator for ConstantEstimator {
    fn name(&self) -> &str {
        "constant"
    }

    fn fit(
        &self,
        _features: &Array2<f64>,
        labels: &Array1<i64>,
    ) -> Result<Box<dyn Predictor>, ModelError> {
        let first = labels.first().copied().ok_or(ModelError::EmptyTrainingSet)?;
        Ok(Box::new(ConstantPredictor(first)))
    }

    fn load(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>, ModelError> {
        let label = String::from_utf8_lossy(bytes)
            .parse()
            .map_err(|_| ModelError::MissingColumn("label".to_string()))?;
        Ok(Box::new(ConstantPredictor(label)))
    }
}

#[tokio::test]
async fn test_full_local_pipeline() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let runner = default_runner(config_in(temp_dir.path()).with_f1_threshold(0.5));

    let run = runner.run("all", "local").await.expect("pipeline should succeed");

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.executed_steps(),
        vec!["make_data", "feat_data", "train_model", "predict"]
    );

    let data = temp_dir.path().join("data");
    assert!(data.join("iris.csv").exists());
    assert!(data.join("processed_data.csv").exists());
    assert!(data.join("featurized_data.csv").exists());
    assert!(data.join("prediction.csv").exists());

    let train = run.step("train_model").expect("train_model recorded");
    assert_eq!(train.params.get("name").map(String::as_str), Some("Tree_model"));
    assert_eq!(train.params.get("data shape").map(String::as_str), Some("(150, 5)"));
    assert_eq!(train.metrics.get("rndm"), Some(&101.0));
    let f1 = *train.metrics.get("f1").expect("f1 logged");
    assert!(f1 > 0.5, "f1 was {}", f1);

    let versioned = train.params.get("data").expect("data version logged");
    assert!(versioned.starts_with("data/Tree_model_"));
    assert!(temp_dir.path().join(versioned).exists());

    let deploy = train.params.get("deploy").expect("model deployed");
    let versions = model_versions(temp_dir.path());
    assert_eq!(versions.len(), 1);
    assert!(versions[0].ends_with("-Tree_model"));
    assert_eq!(deploy, &format!("models/{}", versions[0]));
    assert!(temp_dir
        .path()
        .join(deploy)
        .join("artifacts/Tree_model/model.json")
        .exists());

    let predict = run.step("predict").expect("predict recorded");
    assert_eq!(predict.params.get("model"), Some(&versions[0]));
    assert!(predict.metrics.get("accuracy").is_some());

    let store = ArtifactStore::new(Arc::new(FsBackend::new(temp_dir.path())));
    let root = store.resolve_root("local").expect("root");
    let prediction = store
        .read_table(&root, Category::Data, PREDICTION)
        .await
        .expect("prediction readable");
    assert_eq!(prediction.num_rows(), 150);
    assert_eq!(prediction.schema().field(4).name(), "specie");
}

#[tokio::test]
async fn test_low_f1_is_not_promoted() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = config_in(temp_dir.path());

    let mut registry = StepRegistry::new();
    let hints = || {
        (
            ResourceHint::new("1", "1", "2000Mi", "3500Mi"),
            PlacementHint::new("t3.medium"),
        )
    };
    let (r, p) = hints();
    registry
        .register("make_data", Arc::new(MakeData::default()), r, p)
        .expect("register");
    let (r, p) = hints();
    registry
        .register("feat_data", Arc::new(BuildFeatures), r, p)
        .expect("register");
    let (r, p) = hints();
    registry
        .register(
            "train_model",
            Arc::new(TrainModel::new("Tree_model", Arc::new(ConstantEstimator))),
            r,
            p,
        )
        .expect("register");

    let runner = runner_for(config, registry);
    let run = runner.run("all", "local").await.expect("pipeline should succeed");

    let train = run.step("train_model").expect("train_model recorded");
    let f1 = *train.metrics.get("f1").expect("f1 logged");
    assert!(f1 < 0.8, "constant model scored {}", f1);
    assert!(train.params.get("deploy").is_none());
    assert!(model_versions(temp_dir.path()).is_empty());

    // the model still lives in the run artifacts
    let model = temp_dir
        .path()
        .join("mlruns")
        .join(run.run_id.as_str())
        .join("artifacts/Tree_model/model.json");
    assert!(model.exists());
}

#[tokio::test]
async fn test_threshold_boundary_blocks_perfect_threshold() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    // no f1 can strictly exceed 1.0
    let runner = default_runner(config_in(temp_dir.path()).with_f1_threshold(1.0));

    runner
        .run("make_data", "local")
        .await
        .expect("make_data should succeed");
    runner
        .run("feat_data", "local")
        .await
        .expect("feat_data should succeed");
    let run = runner
        .run("train_model", "local")
        .await
        .expect("train_model should succeed");

    assert_eq!(run.executed_steps(), vec!["train_model"]);
    assert!(model_versions(temp_dir.path()).is_empty());

    // nothing deployed, so prediction cannot resolve a model
    let result = runner.run("predict", "local").await;
    match result {
        Err(PipelineError::StepExecution { step, source }) => {
            assert_eq!(step, "predict");
            assert!(matches!(
                source.downcast_ref::<StorageError>(),
                Some(StorageError::ModelNotFound { .. })
            ));
        }
        other => panic!("Expected StepExecution, got {:?}", other.map(|r| r.run_id)),
    }
}

#[tokio::test]
async fn test_missing_input_surfaces_artifact_not_found() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let runner = default_runner(config_in(temp_dir.path()));

    let result = runner.run("feat_data", "local").await;

    match result {
        Err(PipelineError::StepExecution { step, source }) => {
            assert_eq!(step, "feat_data");
            assert!(matches!(
                source.downcast_ref::<StorageError>(),
                Some(StorageError::ArtifactNotFound(_))
            ));
        }
        other => panic!("Expected StepExecution, got {:?}", other.map(|r| r.run_id)),
    }
    assert!(!temp_dir.path().join("data/featurized_data.csv").exists());
}

#[tokio::test]
async fn test_text_features_fail_training() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(temp_dir.path().join("data")).expect("mkdir");
    std::fs::write(
        temp_dir.path().join("data/featurized_data.csv"),
        "color,specie\nred,0\nblue,1\nred,0\nblue,1\n",
    )
    .expect("write features");
    let runner = default_runner(config_in(temp_dir.path()).with_f1_threshold(0.0));

    let result = runner.run("train_model", "local").await;

    match result {
        Err(PipelineError::StepExecution { step, source }) => {
            assert_eq!(step, "train_model");
            assert!(matches!(
                source.downcast_ref::<ModelError>(),
                Some(ModelError::NonNumericFeature { .. })
            ));
        }
        other => panic!("Expected StepExecution, got {:?}", other.map(|r| r.run_id)),
    }
    assert!(model_versions(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_existing_raw_data_is_reused() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(temp_dir.path().join("data")).expect("mkdir");
    std::fs::write(
        temp_dir.path().join("data/iris.csv"),
        "a,b,specie\n1.0,2.0,0\n3.0,4.0,1\n",
    )
    .expect("write raw data");
    let runner = default_runner(config_in(temp_dir.path()));

    let run = runner.run("make_data", "local").await.expect("make_data");

    let step = run.step("make_data").expect("make_data recorded");
    assert_eq!(step.params.get("data shape").map(String::as_str), Some("(2, 3)"));
    assert!(step.params.get("source").is_none());
}

#[tokio::test]
async fn test_remote_environment_uses_mount() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mount = temp_dir.path().join("mnt");
    let runner = default_runner(config_in(temp_dir.path()).with_remote_mount(&mount));

    runner.run("make_data", "dev").await.expect("make_data on dev");

    assert!(mount.join("bucket-dev/data/processed_data.csv").exists());
    assert!(!temp_dir.path().join("data").exists());
    assert_eq!(
        StorageRoot::for_environment("dev".parse().expect("env")).prefix(),
        "s3://bucket-dev/"
    );
}

#[tokio::test]
async fn test_remote_environment_without_mount_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let runner = default_runner(config_in(temp_dir.path()));

    let result = runner.run("make_data", "prod").await;

    match result {
        Err(PipelineError::StepExecution { source, .. }) => {
            assert!(matches!(
                source.downcast_ref::<StorageError>(),
                Some(StorageError::UnsupportedUri(_))
            ));
        }
        other => panic!("Expected StepExecution, got {:?}", other.map(|r| r.run_id)),
    }
}
