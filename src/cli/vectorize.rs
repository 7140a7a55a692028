use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{AwsOptions, Opts, require};
#[cfg(feature = "pretrained")]
use crate::embed::{PretrainedEmbedder, PretrainedModel};
use crate::embed::{Embedder, PooledEmbedder};
use crate::error::Error;
use crate::store::{LocalStore, ObjectStore, S3Store};
use crate::table::DynamoTable;
use crate::vectorizer::ImageVectorizer;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// 归一化像素的区域池化，无需下载模型
    Pooled,
    /// 预训练 ResNet-50，2048 维
    Resnet50,
    /// 预训练 CLIP ViT-B/32 视觉编码器，512 维
    ClipVitB32,
}

#[derive(Parser, Debug, Clone)]
pub struct VectorizeCommand {
    #[command(flatten)]
    pub aws: AwsOptions,
    /// 存放清单和图片的 S3 桶
    #[arg(long, value_name = "S3_BUCKET_NAME", env = "S3_BUCKET_NAME", required_unless_present = "local_root")]
    pub bucket: Option<String>,
    /// 使用本地目录代替 S3 作为对象存储
    #[arg(long, value_name = "DIR")]
    pub local_root: Option<PathBuf>,
    /// 要处理的清单的键
    #[arg(long, value_name = "S3_OBJECT_KEY", env = "S3_OBJECT_KEY")]
    pub manifest: String,
    /// 写入向量的 DynamoDB 表
    #[arg(long, value_name = "DYNAMODB_TABLE_NAME", env = "DYNAMODB_TABLE_NAME")]
    pub table_name: String,
    /// DynamoDB 表所在区域
    #[arg(long, value_name = "DYNAMODB_TABLE_REGION", env = "DYNAMODB_TABLE_REGION")]
    pub table_region: String,
    /// 遇到第一张写入失败的图片时立即停止
    #[arg(long)]
    pub early_stop: bool,
    /// 预先下载并计算向量的图片数量
    #[arg(short, long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: u64,
    /// 向量模型，预训练模型需要启用 `pretrained` 特性
    #[arg(long, value_enum, default_value_t = ModelKind::Pooled)]
    pub model: ModelKind,
    /// 池化网格大小，向量维度为 `3 * grid * grid`，仅用于 `pooled`
    #[arg(long, value_name = "N", default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub grid: u32,
    /// 预训练模型的缓存目录
    #[arg(long, value_name = "DIR", env = "IMBATCH_MODEL_CACHE")]
    pub model_cache: Option<PathBuf>,
}

impl VectorizeCommand {
    async fn process<S: ObjectStore, E: Embedder>(
        &self,
        store: &S,
        table: &DynamoTable,
        embedder: &E,
    ) -> Result<()> {
        let start = Instant::now();

        let (success, total) = ImageVectorizer::new(store, table, embedder)
            .concurrency(self.concurrency as usize)
            .process(&self.manifest, self.early_stop)
            .await?;

        info!("total execution time: {:.2?}", start.elapsed());
        if success != total {
            return Err(Error::IncompleteProcessing { success, total }.into());
        }
        info!("all {} images processed successfully", success);
        Ok(())
    }

    async fn process_with_model<S: ObjectStore>(&self, store: &S, table: &DynamoTable) -> Result<()> {
        match self.model {
            ModelKind::Pooled => self.process(store, table, &PooledEmbedder::new(self.grid)).await,
            #[cfg(feature = "pretrained")]
            ModelKind::Resnet50 => self.process_pretrained(store, table, PretrainedModel::Resnet50).await,
            #[cfg(feature = "pretrained")]
            ModelKind::ClipVitB32 => {
                self.process_pretrained(store, table, PretrainedModel::ClipVitB32).await
            }
            #[cfg(not(feature = "pretrained"))]
            _ => self.check_model(),
        }
    }

    fn check_model(&self) -> Result<()> {
        if cfg!(not(feature = "pretrained")) && self.model != ModelKind::Pooled {
            anyhow::bail!("model {:?} needs a build with the `pretrained` feature", self.model);
        }
        Ok(())
    }

    #[cfg(feature = "pretrained")]
    async fn process_pretrained<S: ObjectStore>(
        &self,
        store: &S,
        table: &DynamoTable,
        model: PretrainedModel,
    ) -> Result<()> {
        let cache_dir = self.model_cache.clone();
        // 首次使用时会下载模型
        let embedder = tokio::task::block_in_place(|| PretrainedEmbedder::try_new(model, cache_dir))?;
        self.process(store, table, &embedder).await
    }
}

impl SubCommandExtend for VectorizeCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        self.check_model()?;
        let sdk_config = self.aws.load().await;
        let table = DynamoTable::new(
            &sdk_config,
            self.table_name.clone(),
            Some(self.table_region.clone()),
            self.aws.endpoint(),
        );

        match &self.local_root {
            Some(root) => self.process_with_model(&LocalStore::new(root), &table).await,
            None => {
                let bucket = require(&self.bucket, "S3_BUCKET_NAME")?;
                let store = S3Store::new(&sdk_config, bucket, self.aws.endpoint());
                self.process_with_model(&store, &table).await
            }
        }
    }
}
