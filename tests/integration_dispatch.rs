#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, missing_debug_implementations, unreachable_pub)]
use async_trait::async_trait;
use sms_notifier::adapters::memory::{InMemoryMessageStore, InMemoryStatusQueue};
use sms_notifier::core::clock::{Clock, SystemClock};
use sms_notifier::core::dispatcher::{BulkRecipient, DispatchError, DispatchPolicy, NotificationDispatcher};
use sms_notifier::core::message_store::MessageStore;
use sms_notifier::core::rate_limiter::{InMemoryRateLimiter, RateLimitPolicy, RateLimiter};
use sms_notifier::core::transport::{StatusOutcome, TransportError};
use sms_notifier::domain::message::{DeliveryStatus, NewOutboundMessage, OutboundMessage};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{StubTransport, TestDispatcher};

const BODY: &str = "Your hearing is scheduled for Monday at 9:00";

#[tokio::test]
async fn test_send_normalizes_and_records() {
    let t = TestDispatcher::new();

    let sent = t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap();
    assert_eq!(sent.message_id.as_deref(), Some("abc123"));
    assert_eq!(sent.status, DeliveryStatus::Sent);

    assert_eq!(t.transport.sent_to(), ["+251911234567"]);

    let stored = t.store.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(Some(stored[0].id), sent.record_id);
    assert_eq!(stored[0].phone_number, "+251911234567");
    assert_eq!(stored[0].body, BODY);
    assert_eq!(stored[0].status, DeliveryStatus::Sent);
    assert_eq!(stored[0].provider_message_id.as_deref(), Some("abc123"));
    assert_eq!(stored[0].sender_id, "coordinator-1");
    assert!(stored[0].error.is_none());
}

#[tokio::test]
async fn test_invalid_phone_never_reaches_transport() {
    let t = TestDispatcher::new();

    for phone in ["", "abc", "12345", "+2519112345678901", "09112a4567"] {
        let result = t.dispatcher.send_sms(phone, BODY, "coordinator-1").await;
        assert!(matches!(result, Err(DispatchError::InvalidPhoneFormat(_))), "{phone:?} should be rejected");
    }

    assert_eq!(t.transport.send_calls(), 0);
    assert!(t.store.all().is_empty());
    assert!(t.queue.pending().is_empty());
}

#[tokio::test]
async fn test_accepted_send_schedules_status_check() {
    let t = TestDispatcher::new();
    let sent_at = t.clock.now();

    t.dispatcher.send_sms("+251911234567", BODY, "coordinator-1").await.unwrap();

    let pending = t.queue.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, sent_at + Duration::from_secs(5));
    assert_eq!(pending[0].1.message_id, "abc123");
    assert_eq!(pending[0].1.attempt, 0);
}

#[tokio::test]
async fn test_rejected_send_is_recorded_as_failed() {
    let t = TestDispatcher::new();
    t.transport.fail_for("+251911234567", TransportError::NotAllowListed);

    let result = t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await;
    match result {
        Err(DispatchError::ProviderRejected(msg)) => assert!(msg.contains("allow-list"), "{msg}"),
        other => panic!("expected ProviderRejected, got {other:?}"),
    }

    let stored = t.store.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, DeliveryStatus::Failed);
    assert!(stored[0].provider_message_id.is_none());
    assert!(stored[0].error.as_deref().unwrap().contains("allow-list"));
    assert!(t.queue.pending().is_empty());
}

#[tokio::test]
async fn test_missing_configuration_surfaces() {
    let t = TestDispatcher::new();
    t.transport.fail_for("+251911234567", TransportError::ConfigurationIncomplete);

    let result = t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await;
    assert!(matches!(result, Err(DispatchError::ConfigurationIncomplete)));
}

#[tokio::test]
async fn test_transport_failures_are_transport_errors() {
    let t = TestDispatcher::new();
    t.transport.fail_for("+251911234567", TransportError::Unauthorized);

    let result = t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await;
    assert!(matches!(result, Err(DispatchError::Transport(_))));
}

#[tokio::test]
async fn test_rate_limit_per_recipient() {
    let t = TestDispatcher::new();

    for i in 1..=50 {
        t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap_or_else(|e| panic!("send {i}: {e}"));
    }

    let result = t.dispatcher.send_sms("+251 91 123 4567", BODY, "coordinator-1").await;
    assert!(matches!(result, Err(DispatchError::RateLimitExceeded(ref p)) if p == "+251911234567"));
    assert_eq!(t.transport.send_calls(), 50);
    assert_eq!(t.store.all().len(), 50);

    // Another recipient is unaffected
    t.dispatcher.send_sms("0922000000", BODY, "coordinator-1").await.unwrap();

    t.clock.advance(time::Duration::seconds(3600));
    let result = t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await;
    assert!(matches!(result, Err(DispatchError::RateLimitExceeded(_))), "window boundary is still blocked");

    t.clock.advance(time::Duration::seconds(1));
    t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap();
}

#[tokio::test]
async fn test_bulk_isolates_failures() {
    let t = TestDispatcher::new();
    t.transport.fail_for("+251922000000", TransportError::Rejected("Not enough credits".to_string()));

    let recipients = vec![
        BulkRecipient { phone: "0911234567".to_string(), name: "Abebe".to_string() },
        BulkRecipient { phone: "0922000000".to_string(), name: "Almaz".to_string() },
        BulkRecipient { phone: "0933000000".to_string(), name: "Bekele".to_string() },
    ];

    let report = t.dispatcher.send_bulk_sms(&recipients, BODY, "coordinator-1").await;

    assert!(!report.success);
    let outcomes: Vec<_> = report.results.iter().map(|r| r.success).collect();
    assert_eq!(outcomes, [true, false, true]);

    assert_eq!(report.results[0].name, "Abebe");
    assert_eq!(report.results[0].message_id.as_deref(), Some("abc123"));
    assert!(report.results[0].error.is_none());
    assert_eq!(report.results[1].phone, "0922000000");
    assert!(report.results[1].error.as_deref().unwrap().contains("Not enough credits"));
    assert!(report.results[1].message_id.is_none());
    assert!(report.results[2].message_id.is_some());

    assert_eq!(t.transport.sent_to(), ["+251911234567", "+251922000000", "+251933000000"]);
    assert_eq!(t.store.all().len(), 3);
}

#[tokio::test]
async fn test_bulk_all_successful() {
    let t = TestDispatcher::new();
    let recipients = vec![
        BulkRecipient { phone: "0911234567".to_string(), name: String::new() },
        BulkRecipient { phone: "0922000000".to_string(), name: String::new() },
    ];

    let report = t.dispatcher.send_bulk_sms(&recipients, BODY, "coordinator-1").await;

    assert!(report.success);
    assert_eq!(report.results.len(), 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][0]["messageId"], "abc123");
    assert!(json["results"][0].get("error").is_none());
}

#[tokio::test]
async fn test_status_refresh_moves_forward_only() {
    let t = TestDispatcher::new();
    t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap();

    t.transport.set_report(StatusOutcome::reported(DeliveryStatus::Delivered));
    let refresh = t.dispatcher.check_message_status("abc123").await.unwrap();
    assert_eq!(refresh.status, DeliveryStatus::Delivered);
    assert_eq!(refresh.updated, 1);

    t.transport.set_report(StatusOutcome::reported(DeliveryStatus::Pending));
    let refresh = t.dispatcher.check_message_status("abc123").await.unwrap();
    assert_eq!(refresh.status, DeliveryStatus::Pending);
    assert_eq!(refresh.updated, 0);

    assert_eq!(t.store.all()[0].status, DeliveryStatus::Delivered);
}

#[tokio::test]
async fn test_failed_lookup_leaves_record_untouched() {
    let t = TestDispatcher::new();
    t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap();

    t.transport.set_report(StatusOutcome::failed(TransportError::NoReport));
    let result = t.dispatcher.check_message_status("abc123").await;

    assert!(matches!(result, Err(DispatchError::StatusCheckFailed(_))));
    assert_eq!(t.store.all()[0].status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn test_provider_reported_failure_is_applied() {
    let t = TestDispatcher::new();
    t.dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap();

    t.transport.set_report(StatusOutcome::reported(DeliveryStatus::Failed));
    let refresh = t.dispatcher.check_message_status("abc123").await.unwrap();

    assert_eq!(refresh.updated, 1);
    assert_eq!(t.store.all()[0].status, DeliveryStatus::Failed);
}

#[tokio::test]
async fn test_balance_passthrough() {
    let t = TestDispatcher::new();
    let balance = t.dispatcher.get_balance().await.unwrap();
    assert!((balance.balance - 12.5).abs() < f64::EPSILON);

    t.transport.set_balance(Err(TransportError::Forbidden));
    assert!(matches!(t.dispatcher.get_balance().await, Err(DispatchError::ProviderRejected(_))));
}

#[derive(Debug)]
struct BrokenLimiter;

#[async_trait]
impl RateLimiter for BrokenLimiter {
    async fn allow(&self, _phone: &str) -> anyhow::Result<bool> {
        anyhow::bail!("connection refused")
    }
}

#[derive(Debug)]
struct BrokenStore;

#[async_trait]
impl MessageStore for BrokenStore {
    async fn insert(&self, _message: NewOutboundMessage) -> anyhow::Result<OutboundMessage> {
        anyhow::bail!("database is down")
    }

    async fn advance_status(&self, _provider_message_id: &str, _status: DeliveryStatus) -> anyhow::Result<u64> {
        anyhow::bail!("database is down")
    }

    async fn find_by_provider_id(&self, _provider_message_id: &str) -> anyhow::Result<Vec<OutboundMessage>> {
        anyhow::bail!("database is down")
    }

    async fn ping(&self) -> anyhow::Result<()> {
        anyhow::bail!("database is down")
    }
}

fn dispatcher_with(
    transport: Arc<StubTransport>,
    limiter: Arc<dyn RateLimiter>,
    store: Arc<dyn MessageStore>,
    queue: Arc<InMemoryStatusQueue>,
) -> NotificationDispatcher {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    NotificationDispatcher::new(transport, limiter, store, queue, clock, DispatchPolicy::default())
}

#[tokio::test]
async fn test_limiter_outage_allows_send() {
    common::setup_tracing();
    let transport = StubTransport::new();
    let store = Arc::new(InMemoryMessageStore::new());
    let dispatcher =
        dispatcher_with(transport.clone(), Arc::new(BrokenLimiter), store.clone(), Arc::new(InMemoryStatusQueue::new()));

    dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap();

    assert_eq!(transport.send_calls(), 1);
    assert_eq!(store.all().len(), 1);
}

#[tokio::test]
async fn test_store_outage_keeps_accepted_send() {
    common::setup_tracing();
    let transport = StubTransport::new();
    let queue = Arc::new(InMemoryStatusQueue::new());
    let dispatcher = dispatcher_with(
        transport.clone(),
        Arc::new(InMemoryRateLimiter::new(RateLimitPolicy::default(), Arc::new(SystemClock))),
        Arc::new(BrokenStore),
        queue.clone(),
    );

    let sent = dispatcher.send_sms("0911234567", BODY, "coordinator-1").await.unwrap();
    assert_eq!(sent.message_id.as_deref(), Some("abc123"));
    assert_eq!(sent.status, DeliveryStatus::Sent);
    assert!(sent.record_id.is_none());
    assert_eq!(transport.send_calls(), 1);

    let pending = queue.pending();
    assert_eq!(pending.len(), 1, "delivery is still tracked");
    assert_eq!(pending[0].1.message_id, "abc123");

    let recipients = vec![BulkRecipient { phone: "0922000000".to_string(), name: "Almaz".to_string() }];
    let report = dispatcher.send_bulk_sms(&recipients, BODY, "coordinator-1").await;
    assert!(report.success);
    assert_eq!(report.results[0].message_id.as_deref(), Some("msg-2"));
}

#[tokio::test]
async fn test_store_outage_keeps_provider_rejection() {
    common::setup_tracing();
    let transport = StubTransport::new();
    transport.fail_for("+251911234567", TransportError::NotAllowListed);
    let queue = Arc::new(InMemoryStatusQueue::new());
    let dispatcher = dispatcher_with(
        transport.clone(),
        Arc::new(InMemoryRateLimiter::new(RateLimitPolicy::default(), Arc::new(SystemClock))),
        Arc::new(BrokenStore),
        queue.clone(),
    );

    let result = dispatcher.send_sms("0911234567", BODY, "coordinator-1").await;

    assert!(matches!(result, Err(DispatchError::ProviderRejected(_))));
    assert!(queue.pending().is_empty());
}
