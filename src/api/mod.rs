//! API endpoint handlers module
//!
//! Contains all HTTP endpoint handler implementations.

pub mod check_in;
pub mod flights;
pub mod health;
pub mod passengers;
