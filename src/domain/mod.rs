pub mod auth;
pub mod message;
pub mod phone;
