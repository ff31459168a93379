//! Stub fetch backends and an in-memory object store

use async_trait::async_trait;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{Barrier, mpsc};
use yloader::{FetchError, FetchRequest, FetchRunner, JobId, ObjectStoreUploader};

/// Public base URL used for the in-memory bucket
pub const LOCATION_BASE: &str = "https://s3.example.com/media";

/// Fetcher that fails the first `failures` attempts of every job, then writes
/// `<jobId>.mp4` containing the job's own URL
pub struct ScriptedFetcher {
    failures: u32,
    calls: Mutex<Vec<(JobId, String)>>,
    attempts: Mutex<HashMap<JobId, u32>>,
}

impl ScriptedFetcher {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
        })
    }

    /// Proxy URLs used for one job, in attempt order
    pub fn proxies_for(&self, id: JobId) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(job, _)| *job == id)
            .map(|(_, proxy)| proxy.clone())
            .collect()
    }
}

#[async_trait]
impl FetchRunner for ScriptedFetcher {
    async fn run(
        &self,
        request: &FetchRequest,
        progress: mpsc::Sender<f32>,
    ) -> Result<PathBuf, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.job_id, request.proxy_url.clone()));

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(request.job_id).or_insert(0);
            *count += 1;
            *count
        };
        if attempt <= self.failures {
            return Err(FetchError::ToolFailure {
                detail: format!("proxy refused attempt {attempt}"),
            });
        }

        for percent in [10.0, 60.0, 100.0] {
            progress.send(percent).await.ok();
            tokio::task::yield_now().await;
        }

        let path = request.output_dir.join(format!("{}.mp4", request.job_id));
        tokio::fs::write(&path, request.url.as_bytes())
            .await
            .map_err(|e| FetchError::ToolFailure {
                detail: e.to_string(),
            })?;
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Progress value that identifies job `index` at `step`
pub fn tagged_progress(index: u32, step: u32) -> f32 {
    (index * 10 + step) as f32
}

/// Fetcher whose progress values identify the job
///
/// The job for `...?v=<i>` reports `tagged_progress(i, 1..=3)`. Every job holds
/// after its first value until all jobs and the test have reached
/// [`wait_until_paused`](Self::wait_until_paused), then continues once the test
/// calls [`resume`](Self::resume).
pub struct TaggedProgressFetcher {
    paused: Barrier,
    resumed: Barrier,
}

impl TaggedProgressFetcher {
    pub fn new(jobs: usize) -> Arc<Self> {
        Arc::new(Self {
            paused: Barrier::new(jobs + 1),
            resumed: Barrier::new(jobs + 1),
        })
    }

    /// Index encoded in the URL's `v` parameter
    pub fn index_of(url: &str) -> u32 {
        url.rsplit('=').next().unwrap().parse().unwrap()
    }

    /// Returns once every job has reported its first value
    pub async fn wait_until_paused(&self) {
        self.paused.wait().await;
    }

    /// Let every paused job finish
    pub async fn resume(&self) {
        self.resumed.wait().await;
    }
}

#[async_trait]
impl FetchRunner for TaggedProgressFetcher {
    async fn run(
        &self,
        request: &FetchRequest,
        progress: mpsc::Sender<f32>,
    ) -> Result<PathBuf, FetchError> {
        let index = Self::index_of(&request.url);

        progress.send(tagged_progress(index, 1)).await.ok();
        self.paused.wait().await;
        self.resumed.wait().await;
        for step in 2..=3 {
            progress.send(tagged_progress(index, step)).await.ok();
            tokio::task::yield_now().await;
        }

        let path = request.output_dir.join(format!("{}.mp4", request.job_id));
        tokio::fs::write(&path, request.url.as_bytes())
            .await
            .map_err(|e| FetchError::ToolFailure {
                detail: e.to_string(),
            })?;
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "tagged"
    }
}

/// Uploader over an in-memory store, returned alongside the store for inspection
pub fn memory_uploader(part_size: usize) -> (Arc<ObjectStoreUploader>, Arc<InMemory>) {
    let store = Arc::new(InMemory::new());
    let uploader = ObjectStoreUploader::new(
        store.clone() as Arc<dyn ObjectStore>,
        LOCATION_BASE,
        part_size,
        2,
    );
    (Arc::new(uploader), store)
}

/// Read an object back as bytes
pub async fn stored_bytes(store: &InMemory, key: &str) -> Vec<u8> {
    store
        .get(&object_store::path::Path::from(key))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap()
        .to_vec()
}
