//! Cross-service plumbing for Agenda services: config loading, tracing,
//! health probes, request ids and the gateway identity extractor.

pub mod config;
pub mod health;
pub mod identity;
pub mod middleware;
pub mod serde;
pub mod tracing;
