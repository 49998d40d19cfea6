use crate::domain::message::{DeliveryStatus, Direction, OutboundMessage};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct SmsMessageRecord {
    pub(crate) id: Uuid,
    pub(crate) phone_number: String,
    pub(crate) body: String,
    pub(crate) status: String,
    pub(crate) provider_message_id: Option<String>,
    pub(crate) sender_id: String,
    pub(crate) error: Option<String>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl TryFrom<SmsMessageRecord> for OutboundMessage {
    type Error = anyhow::Error;

    fn try_from(record: SmsMessageRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            phone_number: record.phone_number,
            body: record.body,
            status: record.status.parse::<DeliveryStatus>()?,
            direction: Direction::Outgoing,
            provider_message_id: record.provider_message_id,
            sender_id: record.sender_id,
            error: record.error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
