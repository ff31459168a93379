//! In-memory job store

use super::record::{JobHandle, JobRecord};
use crate::types::{Event, JobId, JobInfo};
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast, watch};

/// Concurrency-safe map from job ID to the read side of each job's record
///
/// The store never writes a record after creating it; writes go through the
/// [`JobHandle`] returned by [`create`](Self::create). Records live until the
/// process exits.
#[derive(Debug)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, watch::Receiver<JobRecord>>>,
    events: broadcast::Sender<Event>,
}

impl JobStore {
    /// Create an empty store that publishes job events on `events`
    pub fn new(events: broadcast::Sender<Event>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Insert a pending job and hand back its only writer
    ///
    /// The record is visible to [`get`](Self::get) before this returns.
    pub async fn create(&self, url: impl Into<String>) -> (JobId, JobHandle) {
        let url = url.into();
        let id = JobId::new();
        let (tx, rx) = watch::channel(JobRecord::new(id, url.clone()));

        self.jobs.write().await.insert(id, rx);
        self.events.send(Event::Queued { id, url }).ok();

        (id, JobHandle::new(id, tx, self.events.clone()))
    }

    /// Point-in-time snapshot of a job, or `None` if the ID is unknown
    pub async fn get(&self, id: JobId) -> Option<JobInfo> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).map(|rx| rx.borrow().info())
    }

    /// Full record including internal fields
    pub async fn record(&self, id: JobId) -> Option<JobRecord> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).map(|rx| rx.borrow().clone())
    }

    /// Number of jobs ever created
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether no jobs have been created
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
