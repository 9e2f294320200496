//! Core types for storepulse.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod remote_id;
pub mod status;

pub use id::*;
pub use money::{AmountError, amount_to_f64, parse_amount};
pub use remote_id::{RemoteId, RemoteIdError};
pub use status::*;
