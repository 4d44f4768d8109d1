//! Bank statement monitoring and payment reconciliation service.
//!
//! Polls monitored bank accounts for statement items during business hours,
//! ingests them idempotently, matches incoming credits against open orders,
//! and exposes an HTTP surface for manual allocation work.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod scheduler;
pub mod services;
