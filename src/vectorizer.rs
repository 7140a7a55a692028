use std::path::Path;

use futures::StreamExt;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use tokio::task::block_in_place;

use crate::embed::Embedder;
use crate::error::Result;
use crate::manifest::read_manifest;
use crate::store::ObjectStore;
use crate::table::{RecordTable, STATUS_OK, VectorRecord};
use crate::utils::pb_style;

/// Record id of an object key: its file name without directory or extension
///
/// Only a final `.` strictly inside the name starts an extension, so `x.` and
/// `.hidden` are kept whole.
pub fn image_id(key: &str) -> String {
    let name = Path::new(key)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| key.to_string());
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot < name.len() - 1 => name[..dot].to_string(),
        _ => name,
    }
}

/// Worker turning the images listed in a manifest into table records
///
/// Must run on a multi-threaded tokio runtime, embedding happens in
/// `block_in_place`.
pub struct ImageVectorizer<'a, S, T, E> {
    store: &'a S,
    table: &'a T,
    embedder: &'a E,
    concurrency: usize,
}

impl<'a, S, T, E> ImageVectorizer<'a, S, T, E>
where
    S: ObjectStore,
    T: RecordTable,
    E: Embedder,
{
    pub fn new(store: &'a S, table: &'a T, embedder: &'a E) -> Self {
        Self { store, table, embedder, concurrency: 1 }
    }

    /// Number of images fetched and embedded ahead of the one being persisted
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process every image of `manifest`, returning `(successes, total)`
    ///
    /// An image counts as a success when its record was written with status
    /// 200. With `early_stop` the first failure ends the run. Records are
    /// written in manifest order.
    pub async fn process(&self, manifest: &str, early_stop: bool) -> Result<(usize, usize)> {
        let paths = read_manifest(self.store, manifest).await?;
        let total = paths.len();
        info!("processing {} images from {}", total, manifest);

        let pb = ProgressBar::new(total as u64).with_style(pb_style());
        let mut records = futures::stream::iter(paths.iter())
            .map(|path| self.vectorize(path))
            .buffered(self.concurrency);

        let mut success = 0;
        let mut position = 0;
        while let Some(record) = records.next().await {
            let path = &paths[position];
            position += 1;

            let ok = match record {
                Ok(record) => {
                    let status = self.table.put_item(&record).await?;
                    if status != STATUS_OK {
                        warn!("writing {} returned status {}", record.image_id, status);
                    }
                    status == STATUS_OK
                }
                Err(e) => {
                    warn!("failed to vectorize {}: {}", path, e);
                    false
                }
            };
            pb.inc(1);

            if ok {
                success += 1;
                pb.set_message(path.clone());
            } else if early_stop {
                pb.abandon();
                info!("stopping early after {} of {} images", position, total);
                return Ok((success, total));
            }
        }

        pb.finish_and_clear();
        Ok((success, total))
    }

    async fn vectorize(&self, path: &str) -> Result<VectorRecord> {
        let data = self.store.get(path).await?;
        let vector = block_in_place(|| self.embedder.embed(&data))?;
        debug!("{}: {} bytes -> {} dims", path, data.len(), vector.len());
        Ok(VectorRecord::new(image_id(path), &vector))
    }
}
