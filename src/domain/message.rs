use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
            Self::Failed => "FAILED",
        }
    }

    /// Statuses a record may hold for `self` to be a legal next status.
    ///
    /// Delivery only moves forward (PENDING, SENT, DELIVERED) and any state except FAILED
    /// may become FAILED.
    #[must_use]
    pub const fn predecessors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[],
            Self::Sent => &[Self::Pending],
            Self::Delivered => &[Self::Pending, Self::Sent],
            Self::Failed => &[Self::Pending, Self::Sent, Self::Delivered],
        }
    }

    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        next.predecessors().contains(&self)
    }

    /// Whether a send that produced this status counts as accepted.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Pending | Self::Sent | Self::Delivered)
    }

    /// Whether the provider may still report a later status.
    #[must_use]
    pub const fn awaits_report(self) -> bool {
        matches!(self, Self::Pending | Self::Sent)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown delivery status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "DELIVERED" => Ok(Self::Delivered),
            "FAILED" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Outgoing,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outgoing => "OUTGOING",
        }
    }
}

/// A persisted notification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub phone_number: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub direction: Direction,
    pub provider_message_id: Option<String>,
    pub sender_id: String,
    pub error: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied by the dispatcher when recording a send.
#[derive(Debug, Clone)]
pub struct NewOutboundMessage {
    pub phone_number: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub provider_message_id: Option<String>,
    pub sender_id: String,
    pub error: Option<String>,
    pub created_at: OffsetDateTime,
}

impl NewOutboundMessage {
    #[must_use]
    pub fn into_message(self, id: Uuid) -> OutboundMessage {
        OutboundMessage {
            id,
            phone_number: self.phone_number,
            body: self.body,
            status: self.status,
            direction: Direction::Outgoing,
            provider_message_id: self.provider_message_id,
            sender_id: self.sender_id,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use DeliveryStatus::{Delivered, Failed, Pending, Sent};

        assert!(Pending.can_advance_to(Sent));
        assert!(Pending.can_advance_to(Delivered));
        assert!(Sent.can_advance_to(Delivered));
        assert!(Pending.can_advance_to(Failed));
        assert!(Sent.can_advance_to(Failed));
        assert!(Delivered.can_advance_to(Failed));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        use DeliveryStatus::{Delivered, Failed, Pending, Sent};

        assert!(!Sent.can_advance_to(Pending));
        assert!(!Delivered.can_advance_to(Sent));
        assert!(!Failed.can_advance_to(Delivered));
        assert!(!Failed.can_advance_to(Failed));
        assert!(!Sent.can_advance_to(Sent));
    }

    #[test]
    fn test_status_strings() {
        for status in [DeliveryStatus::Pending, DeliveryStatus::Sent, DeliveryStatus::Delivered, DeliveryStatus::Failed] {
            assert_eq!(status.as_str().parse::<DeliveryStatus>().unwrap(), status);
        }
        assert!("QUEUED".parse::<DeliveryStatus>().is_err());
        assert_eq!(serde_json::to_string(&DeliveryStatus::Delivered).unwrap(), "\"DELIVERED\"");
    }
}
