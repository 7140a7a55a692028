use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};
use log::info;

use super::Embedder;
use crate::error::{Error, Result};

/// ONNX image models fetched from the fastembed model hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PretrainedModel {
    Resnet50,
    ClipVitB32,
}

impl PretrainedModel {
    pub fn dimension(self) -> usize {
        match self {
            Self::Resnet50 => 2048,
            Self::ClipVitB32 => 512,
        }
    }

    fn hub_model(self) -> ImageEmbeddingModel {
        match self {
            Self::Resnet50 => ImageEmbeddingModel::Resnet50,
            Self::ClipVitB32 => ImageEmbeddingModel::ClipVitB32,
        }
    }
}

/// Embeds images with a pretrained network, one image per call
pub struct PretrainedEmbedder {
    model: PretrainedModel,
    session: Mutex<ImageEmbedding>,
}

impl PretrainedEmbedder {
    /// Load `model`, downloading it into `cache_dir` on first use
    pub fn try_new(model: PretrainedModel, cache_dir: Option<PathBuf>) -> Result<Self> {
        let mut options = ImageInitOptions::new(model.hub_model()).with_show_download_progress(false);
        if let Some(cache_dir) = cache_dir {
            options = options.with_cache_dir(cache_dir);
        }
        let session = ImageEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(format!("loading {:?}: {}", model, e)))?;
        info!("loaded {:?} ({} dims)", model, model.dimension());
        Ok(Self { model, session: Mutex::new(session) })
    }
}

impl Embedder for PretrainedEmbedder {
    fn dimension(&self) -> usize {
        self.model.dimension()
    }

    fn embed(&self, data: &[u8]) -> Result<Vec<f32>> {
        let session = self
            .session
            .lock()
            .map_err(|_| Error::Embedding("model session poisoned".to_string()))?;
        let mut vectors = session
            .embed_bytes(&[data], None)
            .map_err(|e| Error::Embedding(e.to_string()))?;
        vectors.pop().ok_or_else(|| Error::Embedding("model returned no vector".to_string()))
    }
}
