use log::{debug, info};

use crate::error::{Error, Result};
use crate::store::{ObjectKey, ObjectStore};

/// Object key of a manifest, in the same store as the keys it lists
pub type ManifestHandle = ObjectKey;

/// Key under which the manifest for batch `index` is stored
pub fn manifest_key(destination_prefix: &str, index: usize) -> ManifestHandle {
    let prefix = destination_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("batch-job-split-{}.txt", index)
    } else {
        format!("{}/batch-job-split-{}.txt", prefix, index)
    }
}

/// Persist `batch` as a newline-separated manifest and return its handle
///
/// Keys are written as-is; they must not contain newlines.
pub async fn write_manifest<S: ObjectStore>(
    store: &S,
    destination_prefix: &str,
    index: usize,
    batch: &[ObjectKey],
) -> Result<ManifestHandle> {
    let key = manifest_key(destination_prefix, index);
    let content = batch.join("\n");
    store.put(&key, content.into_bytes()).await?;
    info!("wrote manifest {} ({} keys)", key, batch.len());
    Ok(key)
}

/// Read back the keys listed in a manifest
pub async fn read_manifest<S: ObjectStore>(store: &S, handle: &str) -> Result<Vec<ObjectKey>> {
    let data = store.get(handle).await?;
    let text = String::from_utf8(data).map_err(|e| Error::store_access(handle, e))?;
    let keys = text
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();
    debug!("manifest {} lists {} keys", handle, keys.len());
    Ok(keys)
}
