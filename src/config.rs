use aws_config::{BehaviorVersion, Region, SdkConfig};
use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::error::{Error, Result};

#[derive(Parser, Debug, Clone)]
#[command(name = "imbatch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 将图片拆分为清单，并为每个清单提交一个向量化任务
    Dispatch(DispatchCommand),
    /// 为每组数据集/轮数/批大小组合提交一个训练任务
    Sweep(SweepCommand),
    /// 计算单个清单中所有图片的向量
    Vectorize(VectorizeCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AwsOptions {
    /// AWS 客户端所在区域，未指定时使用 SDK 默认配置链
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,
    /// 覆盖所有 AWS 服务的端点，例如 LocalStack
    #[arg(long, value_name = "URL", env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

impl AwsOptions {
    /// Load the shared SDK configuration from the environment
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        loader.load().await
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }
}

/// Settings of the job queue every trigger submits to
#[derive(Parser, Debug, Clone)]
pub struct QueueOptions {
    /// 任务队列名称或 ARN
    #[arg(long, value_name = "BATCH_JOB_QUEUE", env = "BATCH_JOB_QUEUE", required_unless_present = "dry_run")]
    pub job_queue: Option<String>,
    /// 任务定义名称或 ARN
    #[arg(
        long,
        value_name = "BATCH_JOB_DEFINITION",
        env = "BATCH_JOB_DEFINITION",
        required_unless_present = "dry_run"
    )]
    pub job_definition: Option<String>,
    /// 只打印任务而不提交，清单仅保存在内存中
    #[arg(long)]
    pub dry_run: bool,
}

impl QueueOptions {
    /// Queue and job definition; clap only enforces them outside `--dry-run`
    pub fn target(&self) -> Result<(String, String)> {
        Ok((
            require(&self.job_queue, "BATCH_JOB_QUEUE")?,
            require(&self.job_definition, "BATCH_JOB_DEFINITION")?,
        ))
    }
}

/// Value of a setting that may only be omitted in some modes
pub fn require(value: &Option<String>, name: &str) -> Result<String> {
    value.clone().ok_or_else(|| Error::Config(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_setting_is_named() {
        let err = require(&None, "S3_BUCKET_NAME").unwrap_err();
        assert_eq!(err.to_string(), "missing mandatory setting `S3_BUCKET_NAME`");
        assert_eq!(require(&Some("b".to_string()), "S3_BUCKET_NAME").unwrap(), "b");
    }

    #[test]
    fn dry_run_needs_no_queue() {
        let opts = Opts::try_parse_from([
            "imbatch", "sweep", "--dry-run", "--dataset", "a", "--max-epochs", "1",
            "--per-gpu-batch-size", "2", "--db-name", "t", "--db-region", "r",
        ])
        .unwrap();
        let SubCommand::Sweep(sweep) = opts.subcmd else { panic!("not a sweep") };
        assert!(sweep.queue.dry_run);
        assert!(matches!(sweep.queue.target(), Err(Error::Config(_))));
    }
}
