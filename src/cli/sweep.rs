use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::cli::dispatch::finish;
use crate::config::{AwsOptions, Opts, QueueOptions};
use crate::dispatch::{Sweep, SweepParams, dispatch_sweep};
use crate::memory::MemoryQueue;
use crate::queue::BatchQueue;
use crate::utils::read_event;

#[derive(Parser, Debug, Clone)]
pub struct SweepCommand {
    #[command(flatten)]
    pub aws: AwsOptions,
    #[command(flatten)]
    pub queue: QueueOptions,
    /// 参数网格事件 `{"datasets": [..], "max_epochs": [..], "per_gpu_batch_size": [..]}`，
    /// `-` 表示从标准输入读取
    #[arg(long, value_name = "FILE", conflicts_with_all = ["datasets", "max_epochs", "per_gpu_batch_size"])]
    pub event: Option<PathBuf>,
    /// 数据集名称，多个用逗号分隔
    #[arg(long = "dataset", value_name = "NAME", value_delimiter = ',')]
    pub datasets: Vec<String>,
    /// 训练轮数，多个用逗号分隔
    #[arg(long, value_name = "N", value_delimiter = ',')]
    pub max_epochs: Vec<u32>,
    /// 每个 GPU 的批大小，多个用逗号分隔
    #[arg(long, value_name = "N", value_delimiter = ',')]
    pub per_gpu_batch_size: Vec<u32>,
    /// 任务名称为 `{job_prefix}-{dataset}-{epochs}-{batch_size}`
    #[arg(long, default_value = "imbatch-train")]
    pub job_prefix: String,
    /// 保存训练结果的 DynamoDB 表
    #[arg(long, value_name = "DYNAMODB_TABLE_NAME", env = "DYNAMODB_TABLE_NAME")]
    pub db_name: String,
    /// 结果表所在区域
    #[arg(long, value_name = "DYNAMODB_TABLE_REGION", env = "DYNAMODB_TABLE_REGION")]
    pub db_region: String,
}

impl SweepCommand {
    fn sweep(&self) -> Result<Sweep> {
        let sweep = match &self.event {
            Some(path) => read_event(path)?,
            None => Sweep {
                datasets: self.datasets.clone(),
                max_epochs: self.max_epochs.clone(),
                per_gpu_batch_size: self.per_gpu_batch_size.clone(),
            },
        };
        if sweep.is_empty() {
            bail!("the sweep has no combination, every dimension needs at least one value");
        }
        Ok(sweep)
    }
}

impl SubCommandExtend for SweepCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let sweep = self.sweep()?;
        let params = SweepParams {
            job_prefix: self.job_prefix.clone(),
            db_name: self.db_name.clone(),
            db_region: self.db_region.clone(),
        };
        info!("submitting {} training jobs", sweep.len());

        if self.queue.dry_run {
            let queue = MemoryQueue::new();
            let report = dispatch_sweep(&queue, &sweep, &params).await;
            println!("{}", serde_json::to_string_pretty(&queue.submitted())?);
            return finish(report);
        }

        let sdk_config = self.aws.load().await;
        let (job_queue, job_definition) = self.queue.target()?;
        let queue = BatchQueue::new(&sdk_config, job_queue, job_definition, self.aws.endpoint());
        finish(dispatch_sweep(&queue, &sweep, &params).await)
    }
}
