//! Job records, storage, and orchestration
//!
//! - [`JobStore`] maps job IDs to the read side of each record
//! - [`JobHandle`] is the single writer of one record
//! - [`JobOrchestrator`] owns the retry loop and drives a job to a terminal status

mod orchestrator;
mod record;
mod store;

pub use orchestrator::{CANCELLED_MESSAGE, JobOrchestrator};
pub use record::{JobHandle, JobRecord};
pub use store::JobStore;
