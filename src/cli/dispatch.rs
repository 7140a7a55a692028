use std::path::PathBuf;

use anyhow::Result;
use aws_config::SdkConfig;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{AwsOptions, Opts, QueueOptions, require};
use crate::dispatch::{DispatchReport, FanOutEvent, FanOutParams, SplitOptions, fan_out};
use crate::memory::{MemoryQueue, WriteOverlay};
use crate::queue::BatchQueue;
use crate::store::{LocalStore, ObjectStore, S3Store};
use crate::utils::read_event;

#[derive(Parser, Debug, Clone)]
pub struct DispatchCommand {
    #[command(flatten)]
    pub aws: AwsOptions,
    #[command(flatten)]
    pub queue: QueueOptions,
    /// 触发事件 `{"Paths": [...]}`，`-` 表示从标准输入读取
    #[arg(long, value_name = "FILE", conflicts_with = "paths", required_unless_present = "paths")]
    pub event: Option<PathBuf>,
    /// 要扫描的键前缀，可重复指定
    #[arg(short, long = "path", value_name = "PREFIX")]
    pub paths: Vec<String>,
    /// 存放图片和清单的 S3 桶
    #[arg(long, value_name = "S3_BUCKET_NAME", env = "S3_BUCKET_NAME", required_unless_present = "local_root")]
    pub bucket: Option<String>,
    /// 使用本地目录代替 S3 作为对象存储
    #[arg(long, value_name = "DIR")]
    pub local_root: Option<PathBuf>,
    /// 只处理以该后缀结尾的键（区分大小写）
    #[arg(short, long, default_value = "jpg")]
    pub suffix: String,
    /// 每个清单最多包含的键数量
    #[arg(short, long, value_name = "N", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_limit: u64,
    /// 清单写入的前缀
    #[arg(long, value_name = "PREFIX", default_value = "manifests")]
    pub manifest_prefix: String,
    /// 任务名称为 `{job_prefix}-{index}-{total}`
    #[arg(long, default_value = "imbatch-vectorize")]
    pub job_prefix: String,
    /// 写入向量的 DynamoDB 表
    #[arg(long, value_name = "DYNAMODB_TABLE_NAME", env = "DYNAMODB_TABLE_NAME")]
    pub table_name: String,
    /// DynamoDB 表所在区域
    #[arg(long, value_name = "DYNAMODB_TABLE_REGION", env = "DYNAMODB_TABLE_REGION")]
    pub table_region: String,
}

impl DispatchCommand {
    fn event(&self) -> Result<FanOutEvent> {
        match &self.event {
            Some(path) => read_event(path),
            None => Ok(FanOutEvent { paths: self.paths.clone() }),
        }
    }

    fn split_options(&self) -> SplitOptions {
        SplitOptions {
            suffix: self.suffix.clone(),
            batch_limit: self.batch_limit as usize,
            manifest_prefix: self.manifest_prefix.clone(),
        }
    }

    fn params(&self, bucket: &str) -> FanOutParams {
        FanOutParams {
            job_prefix: self.job_prefix.clone(),
            bucket: bucket.to_string(),
            table_name: self.table_name.clone(),
            table_region: self.table_region.clone(),
        }
    }

    /// `sdk_config` is loaded on demand when the store did not need it
    async fn run_with<S: ObjectStore>(&self, store: &S, sdk_config: Option<SdkConfig>) -> Result<()> {
        let event = self.event()?;
        let opts = self.split_options();
        let params = self.params(store.name());

        if self.queue.dry_run {
            let store = WriteOverlay::new(store);
            let queue = MemoryQueue::new();
            let report = fan_out(&store, &queue, &event, &opts, &params).await?;
            println!("{}", serde_json::to_string_pretty(&queue.submitted())?);
            return finish(report);
        }

        let sdk_config = match sdk_config {
            Some(sdk_config) => sdk_config,
            None => self.aws.load().await,
        };
        let (job_queue, job_definition) = self.queue.target()?;
        let queue = BatchQueue::new(&sdk_config, job_queue, job_definition, self.aws.endpoint());
        let report = fan_out(store, &queue, &event, &opts, &params).await?;
        finish(report)
    }
}

/// Log the outcome, failing if any submission failed
pub(crate) fn finish(report: DispatchReport) -> Result<()> {
    info!("{} jobs submitted, {} failed", report.submitted(), report.failed());
    let ids = report.into_result()?;
    println!("dispatch finished: {} jobs submitted", ids.len());
    Ok(())
}

impl SubCommandExtend for DispatchCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        match &self.local_root {
            Some(root) => self.run_with(&LocalStore::new(root), None).await,
            None => {
                let sdk_config = self.aws.load().await;
                let bucket = require(&self.bucket, "S3_BUCKET_NAME")?;
                let store = S3Store::new(&sdk_config, bucket, self.aws.endpoint());
                self.run_with(&store, Some(sdk_config)).await
            }
        }
    }
}
