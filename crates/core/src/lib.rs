//! storepulse core - Shared types library.
//!
//! This crate provides common types used across all storepulse components:
//! - `server` - Ingestion pipeline, analytics engine and HTTP surface
//! - `cli` - Command-line tools for migrations and one-shot syncs
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for tenant/store IDs, remote IDs, amounts
//!   and sync phases

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
