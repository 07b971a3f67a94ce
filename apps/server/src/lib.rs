//! Ride-hailing backend
//!
//! HTTP API over users, driver profiles, rides and the supporting records
//! (roles, commissions, transactions, ...), plus a WebSocket hub that pushes
//! ride events to connected clients.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod realtime;
pub mod services;
pub mod state;

pub use error::{Error, Result};
