//! HTTP request handlers.

pub mod health;
pub mod ticket_options;
