use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub redis: RedisConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub provider: ProviderConfig,

    #[command(flatten)]
    pub phone: PhoneConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub status_check: StatusCheckConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "SMS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "SMS_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health probes)
    #[arg(long, env = "SMS_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// How long to wait for background tasks during shutdown
    #[arg(long, env = "SMS_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Postgres connection URL. Messages are kept in memory when unset.
    #[arg(id = "database_url", long = "database-url", env = "SMS_DATABASE_URL")]
    pub url: Option<String>,

    #[arg(long, env = "SMS_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    #[arg(long, env = "SMS_DB_MIN_CONNECTIONS", default_value_t = 1)]
    pub min_connections: u32,

    #[arg(long, env = "SMS_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RedisConfig {
    /// Redis connection URL. Rate limits and status checks stay process-local when unset.
    #[arg(id = "redis_url", long = "redis-url", env = "SMS_REDIS_URL")]
    pub url: Option<String>,

    /// Prefix applied to every key this service writes
    #[arg(long = "redis-key-prefix", env = "SMS_REDIS_KEY_PREFIX", default_value = "sms:")]
    pub key_prefix: String,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret used to verify bearer tokens issued by the case-management backend
    #[arg(long, env = "SMS_JWT_SECRET")]
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Args)]
pub struct ProviderConfig {
    /// Base URL of the SMS provider API
    #[arg(long = "provider-base-url", env = "SMS_PROVIDER_BASE_URL")]
    pub base_url: Option<String>,

    /// API key sent as `Authorization: App <key>`
    #[arg(long = "provider-api-key", env = "SMS_PROVIDER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Sender identifier registered with the provider
    #[arg(long = "provider-sender", env = "SMS_PROVIDER_SENDER")]
    pub sender: Option<String>,

    /// Per-request timeout for provider calls. No timeout is applied when unset.
    #[arg(long = "provider-timeout-secs", env = "SMS_PROVIDER_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Query the account balance once at startup and log the result
    #[arg(
        long = "provider-startup-probe",
        env = "SMS_PROVIDER_STARTUP_PROBE",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub startup_probe: bool,
}

#[derive(Clone, Debug, Args)]
pub struct PhoneConfig {
    /// Calling code substituted for a leading trunk `0`
    #[arg(long, env = "SMS_COUNTRY_CODE", default_value = "+251")]
    pub country_code: String,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Maximum messages per recipient inside one window
    #[arg(long = "rate-limit-hourly-cap", env = "SMS_RATE_LIMIT_HOURLY_CAP", default_value_t = 50)]
    pub hourly_cap: u32,

    /// Length of the rate window, measured from the last counted send
    #[arg(long = "rate-limit-window-secs", env = "SMS_RATE_LIMIT_WINDOW_SECS", default_value_t = 3600)]
    pub window_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct StatusCheckConfig {
    /// Delay between a successful send and the first delivery status check
    #[arg(long = "status-check-delay-secs", env = "SMS_STATUS_CHECK_DELAY_SECS", default_value_t = 5)]
    pub delay_secs: u64,

    /// How often the reconciler polls for due checks
    #[arg(long = "status-check-poll-interval-ms", env = "SMS_STATUS_CHECK_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Attempts per message before the check is abandoned
    #[arg(long = "status-check-max-attempts", env = "SMS_STATUS_CHECK_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long = "status-check-min-backoff-secs", env = "SMS_STATUS_CHECK_MIN_BACKOFF_SECS", default_value_t = 5)]
    pub min_backoff_secs: u64,

    #[arg(long = "status-check-max-backoff-secs", env = "SMS_STATUS_CHECK_MAX_BACKOFF_SECS", default_value_t = 300)]
    pub max_backoff_secs: u64,

    /// Maximum number of status checks in flight
    #[arg(long = "status-check-concurrency", env = "SMS_STATUS_CHECK_CONCURRENCY", default_value_t = 8)]
    pub concurrency: usize,

    /// Sorted-set key (without prefix) holding pending checks when Redis is configured
    #[arg(long = "status-check-queue-key", env = "SMS_STATUS_CHECK_QUEUE_KEY", default_value = "status_checks")]
    pub queue_key: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "SMS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP/HTTP collector endpoint for traces and metrics
    #[arg(long, env = "SMS_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

impl Default for StatusCheckConfig {
    fn default() -> Self {
        Self {
            delay_secs: 5,
            poll_interval_ms: 1000,
            max_attempts: 3,
            min_backoff_secs: 5,
            max_backoff_secs: 300,
            concurrency: 8,
            queue_key: "status_checks".to_string(),
        }
    }
}
