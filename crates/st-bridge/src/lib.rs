//! SmartThings bridge daemon
//!
//! Ties the layers together: configuration entries are set up against the
//! cloud API, each yielding a connected `DeviceBroker` and a registry of
//! platform entities; the axum webhook endpoint feeds event batches into
//! the brokers; a render loop re-reads entity state on broker signals.

pub mod config;
pub mod lifecycle;
pub mod registry;
pub mod webhook;
