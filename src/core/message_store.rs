use crate::domain::message::{DeliveryStatus, NewOutboundMessage, OutboundMessage};
use async_trait::async_trait;

#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns an error if the record cannot be written.
    async fn insert(&self, message: NewOutboundMessage) -> anyhow::Result<OutboundMessage>;

    /// Moves every record carrying `provider_message_id` to `status` where that is a forward
    /// transition, returning the number of records changed.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    async fn advance_status(&self, provider_message_id: &str, status: DeliveryStatus) -> anyhow::Result<u64>;

    /// # Errors
    /// Returns an error if the lookup fails.
    async fn find_by_provider_id(&self, provider_message_id: &str) -> anyhow::Result<Vec<OutboundMessage>>;

    /// # Errors
    /// Returns an error if the store is unreachable.
    async fn ping(&self) -> anyhow::Result<()>;
}
