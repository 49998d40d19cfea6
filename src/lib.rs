#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod telemetry;
pub mod workers;

pub use workers::Workers;

use crate::adapters::database::{DbPool, MessageRepository};
use crate::adapters::memory::{InMemoryMessageStore, InMemoryStatusQueue};
use crate::adapters::redis::{RedisClient, RedisRateLimiter, RedisStatusQueue};
use crate::adapters::sms::HttpSmsTransport;
use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::dispatcher::{DispatchPolicy, NotificationDispatcher};
use crate::core::health_service::HealthService;
use crate::core::message_store::MessageStore;
use crate::core::rate_limiter::{InMemoryRateLimiter, RateLimitPolicy, RateLimiter};
use crate::core::status_queue::StatusCheckQueue;
use crate::core::transport::SmsTransport;
use crate::workers::StatusReconcilerWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Fully wired application components, ready to be served and run.
#[derive(Debug)]
pub struct App {
    pub dispatcher: NotificationDispatcher,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Assembles the dispatcher and its collaborators. Postgres and Redis are optional: without them
/// messages, rate windows, and pending status checks live in process memory.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    redis: Option<Arc<RedisClient>>,
    transport: Option<Arc<dyn SmsTransport>>,
    clock: Arc<dyn Clock>,
}

impl AppBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, pool: None, redis: None, transport: None, clock: Arc::new(SystemClock) }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.redis = Some(redis);
        self
    }

    /// Overrides the provider HTTP transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn SmsTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// # Errors
    /// Returns an error if the provider HTTP client cannot be built.
    pub fn build(self) -> anyhow::Result<App> {
        let config = &self.config;

        let transport: Arc<dyn SmsTransport> = match self.transport {
            Some(transport) => transport,
            None => HttpSmsTransport::with_startup_probe(&config.provider)?,
        };

        let store: Arc<dyn MessageStore> = match self.pool {
            Some(pool) => Arc::new(MessageRepository::new(pool)),
            None => {
                tracing::warn!("No database configured, messages are kept in memory");
                Arc::new(InMemoryMessageStore::new())
            }
        };

        let policy = RateLimitPolicy::new(config.rate_limit.hourly_cap, config.rate_limit.window_secs);
        let (limiter, status_queue): (Arc<dyn RateLimiter>, Arc<dyn StatusCheckQueue>) = match &self.redis {
            Some(redis) => (
                Arc::new(RedisRateLimiter::new(Arc::clone(redis), policy, Arc::clone(&self.clock))),
                Arc::new(RedisStatusQueue::new(Arc::clone(redis), &config.status_check.queue_key)),
            ),
            None => (
                Arc::new(InMemoryRateLimiter::new(policy, Arc::clone(&self.clock))),
                Arc::new(InMemoryStatusQueue::new()),
            ),
        };

        let dispatcher = NotificationDispatcher::new(
            transport,
            limiter,
            Arc::clone(&store),
            Arc::clone(&status_queue),
            Arc::clone(&self.clock),
            DispatchPolicy {
                country_code: config.phone.country_code.clone(),
                status_check_delay: Duration::from_secs(config.status_check.delay_secs),
            },
        );

        let health_service = HealthService::new(store, self.redis.clone(), HEALTH_CHECK_TIMEOUT);

        let workers = Workers {
            status_reconciler: StatusReconcilerWorker::new(
                dispatcher.clone(),
                status_queue,
                Arc::clone(&self.clock),
                &config.status_check,
            ),
        };

        Ok(App { dispatcher, health_service, workers })
    }
}

/// Flips `shutdown_tx` on SIGINT or, on Unix, SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });
}
