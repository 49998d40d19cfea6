use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A pending delivery status lookup for one provider message id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCheckJob {
    pub message_id: String,
    pub attempt: u32,
}

impl StatusCheckJob {
    #[must_use]
    pub const fn first(message_id: String) -> Self {
        Self { message_id, attempt: 0 }
    }

    #[must_use]
    pub fn retry(&self) -> Self {
        Self { message_id: self.message_id.clone(), attempt: self.attempt + 1 }
    }
}

#[async_trait]
pub trait StatusCheckQueue: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns an error if the job cannot be stored.
    async fn schedule(&self, job: StatusCheckJob, run_at: OffsetDateTime) -> anyhow::Result<()>;

    /// Removes and returns up to `limit` jobs due at or before `now`, earliest first. A claimed
    /// job is never handed to another caller.
    ///
    /// # Errors
    /// Returns an error if the queue is unreachable.
    async fn claim_due(&self, now: OffsetDateTime, limit: usize) -> anyhow::Result<Vec<StatusCheckJob>>;
}
