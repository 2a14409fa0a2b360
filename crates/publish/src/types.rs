//! Data types for the publish flow.

use driverpub_archive::ArchiveHandle;

use crate::error::PublishError;

/// Outcome of one publish invocation.
pub type PublishResult = Result<PublishSummary, PublishError>;

/// What a successful publish did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    /// The driver archive that was built, if any.
    pub archive: Option<ArchiveHandle>,
    /// Remote names updated, in the order they were sent.
    pub updated: Vec<String>,
}

/// Progress event emitted during a publish.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishEvent {
    /// Progress update (0.0–1.0).
    Progress { progress: f64, status: String },
    /// The publish finished successfully.
    Completed,
    /// The publish failed.
    Failed { error: String },
}
