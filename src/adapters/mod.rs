pub mod database;
pub mod memory;
pub mod redis;
pub mod sms;
