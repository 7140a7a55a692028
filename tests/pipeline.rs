use anyhow::Result;
use opencv::core::{CV_8UC3, Mat, Scalar, Vector};
use opencv::imgcodecs;
use rstest::*;

use imbatch::dispatch::{FanOutEvent, FanOutParams, SplitOptions, fan_out};
use imbatch::embed::{Embedder, PooledEmbedder};
use imbatch::manifest::read_manifest;
use imbatch::memory::{MemoryQueue, MemoryStore, MemoryTable};
use imbatch::store::{LocalStore, ObjectStore};
use imbatch::vectorizer::ImageVectorizer;

fn jpeg(value: f64) -> Vec<u8> {
    let mat = Mat::new_rows_cols_with_default(64, 48, CV_8UC3, Scalar::all(value)).unwrap();
    let mut buf = Vector::<u8>::new();
    imgcodecs::imencode_def(".jpg", &mat, &mut buf).unwrap();
    buf.to_vec()
}

#[fixture]
fn params() -> FanOutParams {
    FanOutParams {
        job_prefix: "vec".to_string(),
        bucket: "images".to_string(),
        table_name: "vectors".to_string(),
        table_region: "eu-west-1".to_string(),
    }
}

fn split(batch_limit: usize) -> SplitOptions {
    SplitOptions {
        suffix: "jpg".to_string(),
        batch_limit,
        manifest_prefix: "manifests".to_string(),
    }
}

#[rstest]
#[tokio::test]
async fn fan_out_2500_images(params: FanOutParams) -> Result<()> {
    let store = MemoryStore::with_objects(
        "images",
        (0..2500).map(|i| (format!("raw/{:05}.jpg", i), vec![])),
    );
    store.insert("raw/notes.txt", vec![]);
    let queue = MemoryQueue::new();
    let event = FanOutEvent { paths: vec!["raw/".to_string()] };

    let report = fan_out(&store, &queue, &event, &split(1000), &params).await?;
    let ids = report.into_result()?;
    assert_eq!(ids.len(), 3);

    let jobs = queue.submitted();
    let names = jobs.iter().map(|job| job.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["vec-1-3", "vec-2-3", "vec-3-3"]);

    let mut sizes = vec![];
    for job in &jobs {
        assert_eq!(job.get("S3_BUCKET_NAME"), Some("images"));
        assert_eq!(job.get("DYNAMODB_TABLE_NAME"), Some("vectors"));
        assert_eq!(job.get("DYNAMODB_TABLE_REGION"), Some("eu-west-1"));
        let manifest = job.get("S3_OBJECT_KEY").unwrap();
        sizes.push(read_manifest(&store, manifest).await?.len());
    }
    assert_eq!(sizes, [1000, 1000, 500]);

    let first = read_manifest(&store, "manifests/batch-job-split-1.txt").await?;
    assert_eq!(first[0], "raw/00000.jpg");
    let last = read_manifest(&store, "manifests/batch-job-split-3.txt").await?;
    assert_eq!(last[499], "raw/02499.jpg");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn empty_prefix_submits_nothing(params: FanOutParams) -> Result<()> {
    let store = MemoryStore::new("images");
    let queue = MemoryQueue::new();
    let event = FanOutEvent { paths: vec!["nothing/".to_string()] };

    let report = fan_out(&store, &queue, &event, &split(10), &params).await?;
    assert_eq!(report.submitted(), 0);
    assert!(store.is_empty());
    assert!(queue.submitted().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dispatch_then_vectorize(params: FanOutParams) -> Result<()> {
    let store = MemoryStore::with_objects(
        "images",
        (0..5).map(|i| (format!("cats/{}.jpg", i), jpeg(i as f64 * 40.))),
    );
    let queue = MemoryQueue::new();
    let event = FanOutEvent { paths: vec!["cats/".to_string()] };
    fan_out(&store, &queue, &event, &split(2), &params).await?.into_result()?;

    let table = MemoryTable::new();
    let embedder = PooledEmbedder::new(4);
    let vectorizer = ImageVectorizer::new(&store, &table, &embedder).concurrency(2);
    let mut processed = 0;
    for job in queue.submitted() {
        let (success, total) = vectorizer.process(job.get("S3_OBJECT_KEY").unwrap(), true).await?;
        assert_eq!(success, total);
        processed += total;
    }

    assert_eq!(processed, 5);
    assert_eq!(table.len(), 5);
    let record = table.record("3").unwrap();
    assert_eq!(record.dimension, embedder.dimension());
    assert_eq!(record.values(), embedder.embed(&jpeg(120.))?);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn local_directory_as_store(params: FanOutParams) -> Result<()> {
    let root = tempfile::tempdir()?;
    let store = LocalStore::new(root.path());
    for name in ["b/2.jpg", "a/1.jpg", "a/3.png", "c.jpg"] {
        store.put(name, vec![1, 2, 3]).await?;
    }
    let queue = MemoryQueue::new();
    let event = FanOutEvent { paths: vec!["a/".to_string(), "b/".to_string()] };

    fan_out(&store, &queue, &event, &split(1), &params).await?.into_result()?;

    assert_eq!(queue.submitted().len(), 2);
    assert!(root.path().join("manifests/batch-job-split-2.txt").is_file());
    assert_eq!(read_manifest(&store, "manifests/batch-job-split-1.txt").await?, ["a/1.jpg"]);
    assert_eq!(read_manifest(&store, "manifests/batch-job-split-2.txt").await?, ["b/2.jpg"]);
    Ok(())
}
