//! Order ingestion and lookup service.
//!
//! Orders arrive on a Kafka topic, are validated and written through to
//! Postgres, and are served back over HTTP with a fixed-capacity LRU cache
//! in front of the store. Unprocessable messages are parked on a dead-letter
//! topic after bounded retries.

pub mod cache;
pub mod config;
pub mod generator;
pub mod kafka;
pub mod metrics;
pub mod models;
pub mod server;
pub mod service;
pub mod store;
pub mod utils;
pub mod validator;
