//! Application state for the API server

use crate::{Config, JobService};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The job service
    pub service: JobService,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: JobService, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}
