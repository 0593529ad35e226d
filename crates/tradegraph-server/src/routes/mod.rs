//! HTTP route handlers.

pub mod admin;
pub mod analyze;
pub mod health;
pub mod threads;
