#![allow(dead_code)]
use async_trait::async_trait;
use clap::Parser;
use sms_notifier::adapters::memory::{InMemoryMessageStore, InMemoryStatusQueue};
use sms_notifier::api::{AppState, MgmtState};
use sms_notifier::config::Config;
use sms_notifier::core::clock::{Clock, ManualClock};
use sms_notifier::core::dispatcher::{DispatchPolicy, NotificationDispatcher};
use sms_notifier::core::rate_limiter::{InMemoryRateLimiter, RateLimitPolicy};
use sms_notifier::core::transport::{Balance, SendOutcome, SmsTransport, StatusOutcome, TransportError};
use sms_notifier::domain::auth::Claims;
use sms_notifier::domain::message::DeliveryStatus;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::watch;

static INIT: Once = Once::new();

pub const TEST_SECRET: &str = "test_secret";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("sms_notifier=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("wiremock=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    Config::parse_from([
        "sms-notifier",
        "--host",
        "127.0.0.1",
        "--port",
        "0",
        "--mgmt-port",
        "0",
        "--jwt-secret",
        TEST_SECRET,
        "--provider-startup-probe",
        "false",
    ])
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(OffsetDateTime::now_utc()))
}

pub fn bearer(sender_id: &str) -> String {
    format!("Bearer {}", Claims::new(sender_id, 3600).encode(TEST_SECRET).unwrap())
}

/// Programmable provider double. Sends succeed with `abc123`, then `msg-2`, `msg-3`, ...
/// unless the normalized destination has a scripted failure.
#[derive(Debug)]
pub struct StubTransport {
    send_calls: AtomicUsize,
    status_calls: AtomicUsize,
    sent_to: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, TransportError>>,
    report: Mutex<StatusOutcome>,
    balance: Mutex<Result<Balance, TransportError>>,
}

impl Default for StubTransport {
    fn default() -> Self {
        Self {
            send_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            sent_to: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            report: Mutex::new(StatusOutcome::reported(DeliveryStatus::Delivered)),
            balance: Mutex::new(Ok(Balance { balance: 12.5, currency: Some("EUR".to_string()) })),
        }
    }
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, to: &str, error: TransportError) {
        self.failures.lock().unwrap().insert(to.to_string(), error);
    }

    pub fn set_report(&self, outcome: StatusOutcome) {
        *self.report.lock().unwrap() = outcome;
    }

    pub fn set_balance(&self, balance: Result<Balance, TransportError>) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent_to.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsTransport for StubTransport {
    async fn send(&self, to: &str, _body: &str) -> SendOutcome {
        let n = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent_to.lock().unwrap().push(to.to_string());

        if let Some(error) = self.failures.lock().unwrap().get(to) {
            return SendOutcome::failed(error.clone());
        }

        SendOutcome::sent(if n == 1 { "abc123".to_string() } else { format!("msg-{n}") })
    }

    async fn check_status(&self, _message_id: &str) -> StatusOutcome {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.report.lock().unwrap().clone()
    }

    async fn get_balance(&self) -> Result<Balance, TransportError> {
        self.balance.lock().unwrap().clone()
    }
}

/// Dispatcher over in-memory backends, with handles to inspect them.
pub struct TestDispatcher {
    pub dispatcher: NotificationDispatcher,
    pub transport: Arc<StubTransport>,
    pub store: Arc<InMemoryMessageStore>,
    pub queue: Arc<InMemoryStatusQueue>,
    pub clock: Arc<ManualClock>,
}

impl TestDispatcher {
    pub fn new() -> Self {
        Self::with_cap(50)
    }

    pub fn with_cap(cap: u32) -> Self {
        setup_tracing();
        let transport = StubTransport::new();
        let store = Arc::new(InMemoryMessageStore::new());
        let queue = Arc::new(InMemoryStatusQueue::new());
        let clock = manual_clock();
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let dispatcher = NotificationDispatcher::new(
            transport.clone(),
            Arc::new(InMemoryRateLimiter::new(RateLimitPolicy::new(cap, 3600), dyn_clock.clone())),
            store.clone(),
            queue.clone(),
            dyn_clock,
            DispatchPolicy::default(),
        );

        Self { dispatcher, transport, store, queue, clock }
    }
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub transport: Arc<StubTransport>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();
        let transport = StubTransport::new();

        let app = sms_notifier::AppBuilder::new(config.clone())
            .with_transport(transport.clone())
            .build()
            .expect("Failed to build app");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app_router = sms_notifier::api::app_router(AppState { auth: config.auth.clone(), dispatcher: app.dispatcher });
        let mgmt_router = sms_notifier::api::mgmt_router(MgmtState { health_service: app.health_service });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = listener.local_addr().unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            server_url: format!("http://{server_addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            client: reqwest::Client::new(),
            config,
            transport,
            shutdown_tx,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
