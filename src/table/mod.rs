mod dynamodb;

use std::future::Future;

use chrono::Local;
use serde::Serialize;

pub use self::dynamodb::DynamoTable;
use crate::error::Result;

/// Status reported for a successful write
pub const STATUS_OK: u16 = 200;

/// Format of the `Created` attribute
pub const CREATED_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub const DATA_TYPE_F32: &str = "float32";

/// One embedding row, keyed by image id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub image_id: String,
    pub created: String,
    /// Little-endian `f32` bytes of the vector
    pub vector: Vec<u8>,
    pub dimension: usize,
    pub data_type: String,
}

impl VectorRecord {
    /// Build a record stamped with the current local time
    pub fn new(image_id: impl Into<String>, vector: &[f32]) -> Self {
        Self {
            image_id: image_id.into(),
            created: Local::now().format(CREATED_FORMAT).to_string(),
            vector: vector.iter().flat_map(|v| v.to_le_bytes()).collect(),
            dimension: vector.len(),
            data_type: DATA_TYPE_F32.to_string(),
        }
    }

    /// Decode the stored bytes back into floats
    pub fn values(&self) -> Vec<f32> {
        self.vector
            .chunks_exact(size_of::<f32>())
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }
}

/// Key-value table receiving one record per image
pub trait RecordTable: Send + Sync {
    /// Write (or overwrite) a record, returning the HTTP-style status of the call
    fn put_item(&self, record: &VectorRecord) -> impl Future<Output = Result<u16>> + Send;
}
