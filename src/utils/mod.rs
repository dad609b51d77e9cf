//! Utility modules
//!
//! Contains date formatting and parsing helpers.

pub mod date;

pub use date::{from_iso, is_date, to_iso};
