//! In-process collaborators, used for `--dry-run` and tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::queue::{JobQueue, JobSpec};
use crate::store::{ObjectKey, ObjectStore};
use crate::table::{RecordTable, STATUS_OK, VectorRecord};

/// Object store kept in a sorted map
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    objects: Mutex<BTreeMap<ObjectKey, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_objects<K, I>(name: impl Into<String>, objects: I) -> Self
    where
        K: Into<ObjectKey>,
        I: IntoIterator<Item = (K, Vec<u8>)>,
    {
        let store = Self::new(name);
        store.lock().extend(objects.into_iter().map(|(k, v)| (k.into(), v)));
        store
    }

    /// Make every `list` and `get` fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every `put` fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn insert(&self, key: impl Into<ObjectKey>, data: Vec<u8>) {
        self.lock().insert(key.into(), data);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ObjectKey, Vec<u8>>> {
        self.objects.lock().expect("memory store lock poisoned")
    }
}

impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectKey>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::store_access(prefix, "listing disabled"));
        }
        Ok(self.lock().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::store_access(key, "reads disabled"));
        }
        self.object(key).ok_or_else(|| Error::store_access(key, "no such key"))
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::store_write(key, "writes disabled"));
        }
        self.insert(key, data);
        Ok(())
    }
}

/// Reads from `base`, keeps every write in memory
///
/// Lets `--dry-run` produce manifests without touching the real store.
#[derive(Debug)]
pub struct WriteOverlay<'a, S> {
    base: &'a S,
    writes: MemoryStore,
}

impl<'a, S: ObjectStore> WriteOverlay<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self { base, writes: MemoryStore::new(base.name()) }
    }

    /// Objects written through the overlay
    pub fn writes(&self) -> &MemoryStore {
        &self.writes
    }
}

impl<S: ObjectStore> ObjectStore for WriteOverlay<'_, S> {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectKey>> {
        let mut keys = self.base.list(prefix).await?;
        let known = keys.iter().cloned().collect::<HashSet<_>>();
        let written = self.writes.list(prefix).await?;
        keys.extend(written.into_iter().filter(|key| !known.contains(key)));
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.writes.object(key) {
            Some(data) => Ok(data),
            None => self.base.get(key).await,
        }
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.writes.put(key, data).await
    }
}

/// Table keeping the last record written per image id
#[derive(Debug, Default)]
pub struct MemoryTable {
    records: Mutex<HashMap<String, VectorRecord>>,
    failing: Mutex<HashMap<String, u16>>,
    calls: AtomicUsize,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `status` instead of writing whenever `image_id` is put
    pub fn fail_with(&self, image_id: impl Into<String>, status: u16) {
        self.failing.lock().expect("memory table lock poisoned").insert(image_id.into(), status);
    }

    pub fn record(&self, image_id: &str) -> Option<VectorRecord> {
        self.records.lock().expect("memory table lock poisoned").get(image_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("memory table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `put_item` calls, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecordTable for MemoryTable {
    async fn put_item(&self, record: &VectorRecord) -> Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(&status) =
            self.failing.lock().expect("memory table lock poisoned").get(&record.image_id)
        {
            return Ok(status);
        }
        self.records
            .lock()
            .expect("memory table lock poisoned")
            .insert(record.image_id.clone(), record.clone());
        Ok(STATUS_OK)
    }
}

/// Queue that records submissions and hands out sequential job ids
#[derive(Debug, Default)]
pub struct MemoryQueue {
    submitted: Mutex<Vec<JobSpec>>,
    rejected: Mutex<HashSet<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the job named `job_name`
    pub fn reject(&self, job_name: impl Into<String>) {
        self.rejected.lock().expect("memory queue lock poisoned").insert(job_name.into());
    }

    /// Accepted jobs, in submission order
    pub fn submitted(&self) -> Vec<JobSpec> {
        self.submitted.lock().expect("memory queue lock poisoned").clone()
    }
}

impl JobQueue for MemoryQueue {
    async fn submit_job(&self, spec: &JobSpec) -> Result<String> {
        if self.rejected.lock().expect("memory queue lock poisoned").contains(&spec.name) {
            return Err(Error::JobSubmission(format!("{}: rejected", spec.name)));
        }
        let mut submitted = self.submitted.lock().expect("memory queue lock poisoned");
        submitted.push(spec.clone());
        Ok(format!("job-{:04}", submitted.len()))
    }
}
