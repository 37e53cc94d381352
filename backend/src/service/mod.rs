pub mod auth;
pub mod bank;
pub mod chat;
pub mod realtime;
pub mod signaling;
