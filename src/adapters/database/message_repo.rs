use crate::adapters::database::DbPool;
use crate::adapters::database::records::SmsMessageRecord;
use crate::core::message_store::MessageStore;
use crate::domain::message::{DeliveryStatus, Direction, NewOutboundMessage, OutboundMessage};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[tracing::instrument(level = "debug", skip_all, err)]
    async fn insert(&self, message: NewOutboundMessage) -> anyhow::Result<OutboundMessage> {
        let mut conn = self.pool.acquire().await?;

        let record = sqlx::query_as::<_, SmsMessageRecord>(
            r#"
            INSERT INTO sms_messages
                (id, phone_number, body, status, direction, provider_message_id, sender_id, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING id, phone_number, body, status, provider_message_id, sender_id, error, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&message.phone_number)
        .bind(&message.body)
        .bind(message.status.as_str())
        .bind(Direction::Outgoing.as_str())
        .bind(&message.provider_message_id)
        .bind(&message.sender_id)
        .bind(&message.error)
        .bind(message.created_at)
        .fetch_one(&mut *conn)
        .await?;

        record.try_into()
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn advance_status(&self, provider_message_id: &str, status: DeliveryStatus) -> anyhow::Result<u64> {
        let predecessors: Vec<&str> = status.predecessors().iter().map(|s| s.as_str()).collect();
        if predecessors.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r#"
            UPDATE sms_messages
            SET status = $2, updated_at = NOW()
            WHERE provider_message_id = $1 AND status = ANY($3)
            "#,
        )
        .bind(provider_message_id)
        .bind(status.as_str())
        .bind(&predecessors)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn find_by_provider_id(&self, provider_message_id: &str) -> anyhow::Result<Vec<OutboundMessage>> {
        let mut conn = self.pool.acquire().await?;

        let records = sqlx::query_as::<_, SmsMessageRecord>(
            r#"
            SELECT id, phone_number, body, status, provider_message_id, sender_id, error, created_at, updated_at
            FROM sms_messages
            WHERE provider_message_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(provider_message_id)
        .fetch_all(&mut *conn)
        .await?;

        records.into_iter().map(TryInto::try_into).collect()
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
