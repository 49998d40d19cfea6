use crate::core::message_store::MessageStore;
use crate::core::status_queue::{StatusCheckJob, StatusCheckQueue};
use crate::domain::message::{DeliveryStatus, NewOutboundMessage, OutboundMessage};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

/// Message store used when no database is configured. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: DashMap<Uuid, OutboundMessage>,
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored messages, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<OutboundMessage> {
        let mut messages: Vec<_> = self.messages.iter().map(|m| m.value().clone()).collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        messages
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: NewOutboundMessage) -> anyhow::Result<OutboundMessage> {
        let message = message.into_message(Uuid::now_v7());
        self.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn advance_status(&self, provider_message_id: &str, status: DeliveryStatus) -> anyhow::Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut updated = 0;

        for mut entry in self.messages.iter_mut() {
            let message = entry.value_mut();
            if message.provider_message_id.as_deref() == Some(provider_message_id)
                && message.status.can_advance_to(status)
            {
                message.status = status;
                message.updated_at = now;
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn find_by_provider_id(&self, provider_message_id: &str) -> anyhow::Result<Vec<OutboundMessage>> {
        Ok(self.all().into_iter().filter(|m| m.provider_message_id.as_deref() == Some(provider_message_id)).collect())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Process-local status check queue. Pending checks are lost if the process exits.
#[derive(Debug, Default)]
pub struct InMemoryStatusQueue {
    jobs: Mutex<Vec<(OffsetDateTime, StatusCheckJob)>>,
}

impl InMemoryStatusQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of queued jobs with their due times.
    #[must_use]
    pub fn pending(&self) -> Vec<(OffsetDateTime, StatusCheckJob)> {
        self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl StatusCheckQueue for InMemoryStatusQueue {
    async fn schedule(&self, job: StatusCheckJob, run_at: OffsetDateTime) -> anyhow::Result<()> {
        self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((run_at, job));
        Ok(())
    }

    async fn claim_due(&self, now: OffsetDateTime, limit: usize) -> anyhow::Result<Vec<StatusCheckJob>> {
        let mut jobs = self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        jobs.sort_by_key(|(run_at, _)| *run_at);

        let due = jobs.iter().take_while(|(run_at, _)| *run_at <= now).count().min(limit);
        Ok(jobs.drain(..due).map(|(_, job)| job).collect())
    }
}
