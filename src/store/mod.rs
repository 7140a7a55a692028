mod local;
mod s3;

use std::future::Future;

use log::debug;

pub use self::local::LocalStore;
pub use self::s3::S3Store;
use crate::error::Result;

/// Identifier of an object in a store
pub type ObjectKey = String;

/// Minimal object store used by the pipeline
pub trait ObjectStore: Send + Sync {
    /// Name of the store, handed to workers as `S3_BUCKET_NAME`
    fn name(&self) -> &str;

    /// Every key starting with `prefix`, in the store's listing order
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<ObjectKey>>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn put(&self, key: &str, data: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

/// List the keys under `prefix` whose name ends with `suffix`
///
/// The match is case-sensitive and the listing order of the store is kept.
pub async fn list_keys<S: ObjectStore>(
    store: &S,
    prefix: &str,
    suffix: &str,
) -> Result<Vec<ObjectKey>> {
    let keys = store.list(prefix).await?;
    let total = keys.len();
    let keys = keys
        .into_iter()
        .filter(|key| key.starts_with(prefix) && key.ends_with(suffix))
        .collect::<Vec<_>>();
    debug!("listed {} objects under `{}`, {} match `{}`", total, prefix, keys.len(), suffix);
    Ok(keys)
}
