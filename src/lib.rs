//! Flight check-in service library
//!
//! A generic repository layer over a partitioned key-value store, the flight
//! repository built on it, and the HTTP service that exposes flights and the
//! check-in workflow.

// Public modules
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::ApiError;
pub use server::App;
