//! Real-time ride events over WebSocket

pub mod manager;
pub mod protocol;
pub mod socket;

pub use manager::{ConnectionId, ConnectionManager, RealtimeStats};
