//! Book catalogue HTTP service.
//!
//! A single `books` resource stored in PostgreSQL, served over axum with
//! request logging, CORS and Prometheus metrics.

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod observability;
pub mod ports;
