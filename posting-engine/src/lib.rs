//! Posting Engine - Rule-driven double-entry posting for document lifecycle events.
//!
//! When an invoice or payment enters a triggering lifecycle status, the engine
//! computes its GST breakdown, matches the tenant's configured accounting rules,
//! resolves rule-referenced amounts, and emits balanced journals plus optional
//! per-party subledger entries.

pub mod engine;
pub mod models;
pub mod ports;
pub mod services;
