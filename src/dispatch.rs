use std::collections::HashSet;

use indicatif::ProgressBar;
use log::{error, info};
use serde::Deserialize;

use crate::batch::batch;
use crate::error::{Error, Result};
use crate::manifest::{ManifestHandle, write_manifest};
use crate::queue::{JobQueue, JobSpec};
use crate::store::{ObjectStore, list_keys};
use crate::utils::pb_style;

pub const ENV_BUCKET_NAME: &str = "S3_BUCKET_NAME";
pub const ENV_OBJECT_KEY: &str = "S3_OBJECT_KEY";
pub const ENV_TABLE_REGION: &str = "DYNAMODB_TABLE_REGION";
pub const ENV_TABLE_NAME: &str = "DYNAMODB_TABLE_NAME";

pub const ENV_DATASET_NAME: &str = "DATASET_NAME";
pub const ENV_MAX_EPOCHS: &str = "MAX_EPOCHS";
pub const ENV_PER_GPU_BATCH_SIZE: &str = "PER_GPU_BATCH_SIZE";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_DB_REGION: &str = "DB_REGION";

/// Trigger event of the fan-out dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct FanOutEvent {
    #[serde(rename = "Paths")]
    pub paths: Vec<String>,
}

/// Static parameters shared by every fan-out job
#[derive(Debug, Clone)]
pub struct FanOutParams {
    pub job_prefix: String,
    pub bucket: String,
    pub table_name: String,
    pub table_region: String,
}

/// How keys are selected and grouped before dispatch
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub suffix: String,
    pub batch_limit: usize,
    pub manifest_prefix: String,
}

/// Parameter grid of the training sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Sweep {
    pub datasets: Vec<String>,
    pub max_epochs: Vec<u32>,
    pub per_gpu_batch_size: Vec<u32>,
}

impl Sweep {
    /// Cartesian product, datasets outermost and batch sizes innermost
    pub fn combinations(&self) -> impl Iterator<Item = (&str, u32, u32)> + '_ {
        self.datasets.iter().flat_map(move |dataset| {
            self.max_epochs.iter().flat_map(move |&epochs| {
                self.per_gpu_batch_size.iter().map(move |&size| (dataset.as_str(), epochs, size))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.datasets.len() * self.max_epochs.len() * self.per_gpu_batch_size.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Static parameters shared by every sweep job
#[derive(Debug, Clone)]
pub struct SweepParams {
    pub job_prefix: String,
    pub db_name: String,
    pub db_region: String,
}

/// Outcome of one submission
#[derive(Debug)]
pub struct SubmissionResult {
    /// 1-based position in the dispatch
    pub index: usize,
    pub job_name: String,
    /// Job id acknowledged by the queue
    pub outcome: Result<String>,
}

/// All submission outcomes of one dispatch, in submission order
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub results: Vec<SubmissionResult>,
}

impl DispatchReport {
    pub fn submitted(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.submitted()
    }

    /// Job ids in submission order, or one error naming every failed job
    pub fn into_result(self) -> Result<Vec<String>> {
        let total = self.results.len();
        let mut ids = vec![];
        let mut failures = vec![];
        for result in self.results {
            match result.outcome {
                Ok(id) => ids.push(id),
                Err(e) => failures.push(format!("[{}] {}: {}", result.index, result.job_name, e)),
            }
        }
        if failures.is_empty() {
            Ok(ids)
        } else {
            Err(Error::JobSubmission(format!(
                "{} of {} submissions failed: {}",
                failures.len(),
                total,
                failures.join("; ")
            )))
        }
    }
}

/// Job for manifest `index` (1-based) out of `total`
pub fn fan_out_spec(
    params: &FanOutParams,
    manifest: &str,
    index: usize,
    total: usize,
) -> JobSpec {
    JobSpec::new(format!("{}-{}-{}", params.job_prefix, index, total))
        .env(ENV_BUCKET_NAME, &params.bucket)
        .env(ENV_OBJECT_KEY, manifest)
        .env(ENV_TABLE_REGION, &params.table_region)
        .env(ENV_TABLE_NAME, &params.table_name)
}

pub fn sweep_spec(params: &SweepParams, dataset: &str, epochs: u32, batch_size: u32) -> JobSpec {
    JobSpec::new(format!("{}-{}-{}-{}", params.job_prefix, dataset, epochs, batch_size))
        .env(ENV_DATASET_NAME, dataset)
        .env(ENV_MAX_EPOCHS, epochs)
        .env(ENV_PER_GPU_BATCH_SIZE, batch_size)
        .env(ENV_DB_NAME, &params.db_name)
        .env(ENV_DB_REGION, &params.db_region)
}

/// Submit `specs` one after another; a failed submission never stops the rest
async fn submit_all<Q: JobQueue>(queue: &Q, specs: Vec<JobSpec>) -> DispatchReport {
    let pb = ProgressBar::new(specs.len() as u64).with_style(pb_style());
    let mut results = Vec::with_capacity(specs.len());
    for (i, spec) in specs.into_iter().enumerate() {
        let outcome = queue.submit_job(&spec).await;
        match &outcome {
            Ok(id) => {
                info!("submitted {} as {}", spec.name, id);
                pb.set_message(spec.name.clone());
            }
            Err(e) => error!("failed to submit {}: {}", spec.name, e),
        }
        pb.inc(1);
        results.push(SubmissionResult { index: i + 1, job_name: spec.name, outcome });
    }
    pb.finish_and_clear();
    DispatchReport { results }
}

/// Submit one job per manifest, in the order given
pub async fn dispatch_manifests<Q: JobQueue>(
    queue: &Q,
    manifests: &[ManifestHandle],
    params: &FanOutParams,
) -> DispatchReport {
    let total = manifests.len();
    let specs = manifests
        .iter()
        .enumerate()
        .map(|(i, manifest)| fan_out_spec(params, manifest, i + 1, total))
        .collect();
    submit_all(queue, specs).await
}

/// Submit one job per combination of the sweep
pub async fn dispatch_sweep<Q: JobQueue>(
    queue: &Q,
    sweep: &Sweep,
    params: &SweepParams,
) -> DispatchReport {
    let specs = sweep
        .combinations()
        .map(|(dataset, epochs, size)| sweep_spec(params, dataset, epochs, size))
        .collect();
    submit_all(queue, specs).await
}

/// Enumerate, split and persist the keys under `prefixes`
///
/// Keys from all prefixes form one sequence, so manifest numbering follows
/// the order of `prefixes`. A key reached through overlapping prefixes is kept
/// at its first position only. Stops at the first failed write.
pub async fn split_into_manifests<S: ObjectStore>(
    store: &S,
    prefixes: &[String],
    opts: &SplitOptions,
) -> Result<Vec<ManifestHandle>> {
    let mut seen = HashSet::new();
    let mut keys = vec![];
    for prefix in prefixes {
        let listed = list_keys(store, prefix, &opts.suffix).await?;
        keys.extend(listed.into_iter().filter(|key| seen.insert(key.clone())));
    }
    info!("found {} objects under {} prefixes", keys.len(), prefixes.len());

    let mut manifests = vec![];
    for (i, batch) in batch(keys, opts.batch_limit)?.enumerate() {
        manifests.push(write_manifest(store, &opts.manifest_prefix, i + 1, &batch).await?);
    }
    Ok(manifests)
}

/// The whole fan-out trigger: split the keys, then submit one job per manifest
pub async fn fan_out<S: ObjectStore, Q: JobQueue>(
    store: &S,
    queue: &Q,
    event: &FanOutEvent,
    opts: &SplitOptions,
    params: &FanOutParams,
) -> Result<DispatchReport> {
    let manifests = split_into_manifests(store, &event.paths, opts).await?;
    info!("dispatching {} jobs", manifests.len());
    Ok(dispatch_manifests(queue, &manifests, params).await)
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::memory::{MemoryQueue, MemoryStore};

    #[fixture]
    fn params() -> FanOutParams {
        FanOutParams {
            job_prefix: "vec".to_string(),
            bucket: "bucket".to_string(),
            table_name: "vectors".to_string(),
            table_region: "eu-west-1".to_string(),
        }
    }

    #[fixture]
    fn sweep() -> Sweep {
        Sweep {
            datasets: vec!["cifar".to_string(), "food".to_string()],
            max_epochs: vec![5, 10],
            per_gpu_batch_size: vec![8, 16, 32],
        }
    }

    #[rstest]
    #[tokio::test]
    async fn job_names_are_deterministic(params: FanOutParams) {
        let queue = MemoryQueue::new();
        let manifests = vec!["m/1".to_string(), "m/2".to_string(), "m/3".to_string()];

        let report = dispatch_manifests(&queue, &manifests, &params).await;
        assert_eq!(report.submitted(), 3);

        let names = queue.submitted().into_iter().map(|s| s.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["vec-1-3", "vec-2-3", "vec-3-3"]);
    }

    #[rstest]
    fn fan_out_environment(params: FanOutParams) {
        let spec = fan_out_spec(&params, "m/2", 2, 3);
        assert_eq!(spec.get(ENV_BUCKET_NAME), Some("bucket"));
        assert_eq!(spec.get(ENV_OBJECT_KEY), Some("m/2"));
        assert_eq!(spec.get(ENV_TABLE_REGION), Some("eu-west-1"));
        assert_eq!(spec.get(ENV_TABLE_NAME), Some("vectors"));
    }

    #[rstest]
    #[tokio::test]
    async fn failed_submission_does_not_stop_the_rest(params: FanOutParams) {
        let queue = MemoryQueue::new();
        queue.reject("vec-2-3");
        let manifests = vec!["m/1".to_string(), "m/2".to_string(), "m/3".to_string()];

        let report = dispatch_manifests(&queue, &manifests, &params).await;
        assert_eq!(report.submitted(), 2);
        assert_eq!(report.failed(), 1);
        assert!(report.results[1].outcome.is_err());
        assert_eq!(queue.submitted().len(), 2);

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, Error::JobSubmission(ref msg) if msg.contains("vec-2-3")));
    }

    #[rstest]
    fn sweep_order(sweep: Sweep) {
        let combos = sweep.combinations().collect::<Vec<_>>();
        assert_eq!(combos.len(), sweep.len());
        assert_eq!(combos[0], ("cifar", 5, 8));
        assert_eq!(combos[1], ("cifar", 5, 16));
        assert_eq!(combos[3], ("cifar", 10, 8));
        assert_eq!(combos[6], ("food", 5, 8));
        assert_eq!(combos[11], ("food", 10, 32));
    }

    #[rstest]
    #[tokio::test]
    async fn sweep_jobs(sweep: Sweep) {
        let queue = MemoryQueue::new();
        let params = SweepParams {
            job_prefix: "bench".to_string(),
            db_name: "results".to_string(),
            db_region: "us-east-1".to_string(),
        };

        let ids = dispatch_sweep(&queue, &sweep, &params).await.into_result().unwrap();
        assert_eq!(ids.len(), 12);

        let submitted = queue.submitted();
        assert_eq!(submitted[0].name, "bench-cifar-5-8");
        assert_eq!(submitted[11].name, "bench-food-10-32");
        assert_eq!(submitted[11].get(ENV_DATASET_NAME), Some("food"));
        assert_eq!(submitted[11].get(ENV_MAX_EPOCHS), Some("10"));
        assert_eq!(submitted[11].get(ENV_PER_GPU_BATCH_SIZE), Some("32"));
        assert_eq!(submitted[11].get(ENV_DB_NAME), Some("results"));
        assert_eq!(submitted[11].get(ENV_DB_REGION), Some("us-east-1"));
    }

    #[test]
    fn empty_sweep_dimension() {
        let sweep = Sweep { datasets: vec!["a".into()], max_epochs: vec![], per_gpu_batch_size: vec![1] };
        assert!(sweep.is_empty());
        assert_eq!(sweep.combinations().count(), 0);
    }

    #[tokio::test]
    async fn overlapping_prefixes_list_each_key_once() {
        let store = MemoryStore::with_objects(
            "bucket",
            [("img/cats/1.jpg", vec![]), ("img/cats/2.jpg", vec![]), ("img/dogs/3.jpg", vec![])],
        );
        let prefixes = ["img/cats/", "img/", "img/cats/"].map(String::from);
        let opts = SplitOptions {
            suffix: "jpg".to_string(),
            batch_limit: 1,
            manifest_prefix: "m".to_string(),
        };

        let manifests = split_into_manifests(&store, &prefixes, &opts).await.unwrap();
        let mut listed = vec![];
        for manifest in &manifests {
            listed.extend(crate::manifest::read_manifest(&store, manifest).await.unwrap());
        }
        assert_eq!(listed, ["img/cats/1.jpg", "img/cats/2.jpg", "img/dogs/3.jpg"]);
    }

    #[test]
    fn parses_events() {
        let event: FanOutEvent = serde_json::from_str(r#"{"Paths": ["a/", "b/"]}"#).unwrap();
        assert_eq!(event.paths, vec!["a/", "b/"]);

        let sweep: Sweep = serde_json::from_str(
            r#"{"datasets": ["x"], "max_epochs": [1, 2], "per_gpu_batch_size": [4]}"#,
        )
        .unwrap();
        assert_eq!(sweep.len(), 2);
    }
}
