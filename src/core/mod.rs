pub mod clock;
pub mod dispatcher;
pub mod health_service;
pub mod message_store;
pub mod rate_limiter;
pub mod status_queue;
pub mod transport;
