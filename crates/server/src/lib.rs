//! Storepulse server library.
//!
//! Pulls customers, products and orders from connected Shopify stores into
//! local storage and serves analytics over them.
//!
//! - [`shopify`] - Admin API client with cursor pagination
//! - [`ingestion`] - Reconciliation, per-store sync orchestration, scheduler
//! - [`analytics`] - Segments, forecast, product matrix, alerts, insights, summary
//! - [`routes`] - HTTP surface over the above

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod models;
pub mod routes;
pub mod shopify;
pub mod state;
