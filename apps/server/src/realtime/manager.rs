//! WebSocket connection registry
//!
//! A user may hold several connections at once (one per device). Each
//! connection is represented by the sending half of an unbounded channel; a
//! per-socket writer task drains the other half, so sending never waits on the
//! network while the registry lock is held.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

pub type ConnectionId = Uuid;
pub type Outbox = UnboundedSender<JsonValue>;

#[derive(Default)]
struct Registry {
    connections: BTreeMap<i64, Vec<(ConnectionId, Outbox)>>,
    rides: BTreeMap<i64, BTreeSet<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealtimeStats {
    pub online_users: Vec<i64>,
    pub total_connections: usize,
    pub active_rides: Vec<i64>,
}

#[derive(Default)]
pub struct ConnectionManager {
    registry: Mutex<Registry>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the maps half-updated, so a
    // poisoned lock is still usable.
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connect(&self, user_id: i64, outbox: Outbox) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut registry = self.registry();
        let connections = registry.connections.entry(user_id).or_default();
        connections.push((id, outbox));
        tracing::info!(
            user_id,
            connection_id = %id,
            user_connections = connections.len(),
            "WebSocket connected"
        );
        id
    }

    pub fn disconnect(&self, user_id: i64, connection_id: ConnectionId) {
        let mut registry = self.registry();
        if let Some(connections) = registry.connections.get_mut(&user_id) {
            connections.retain(|(id, _)| *id != connection_id);
            if connections.is_empty() {
                registry.connections.remove(&user_id);
            }
        }
        tracing::info!(user_id, connection_id = %connection_id, "WebSocket disconnected");
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.registry()
            .connections
            .get(&user_id)
            .is_some_and(|c| !c.is_empty())
    }

    /// Deliver to every connection of one user. Returns false when the user
    /// has no open connection.
    pub fn send_personal(&self, user_id: i64, message: JsonValue) -> bool {
        let message = with_timestamp(message);
        let mut registry = self.registry();
        Self::deliver(&mut registry, user_id, &message)
    }

    /// Deliver to every connected user except `exclude`. Returns the number of
    /// connections reached.
    pub fn broadcast(&self, message: JsonValue, exclude: Option<i64>) -> usize {
        let message = with_timestamp(message);
        let mut registry = self.registry();
        let users: Vec<i64> = registry
            .connections
            .keys()
            .copied()
            .filter(|user_id| Some(*user_id) != exclude)
            .collect();
        users
            .into_iter()
            .map(|user_id| {
                Self::deliver(&mut registry, user_id, &message);
                registry.connections.get(&user_id).map_or(0, Vec::len)
            })
            .sum()
    }

    pub fn join_ride(&self, ride_id: i64, user_id: i64) {
        self.registry()
            .rides
            .entry(ride_id)
            .or_default()
            .insert(user_id);
        tracing::info!(ride_id, user_id, "User joined ride");
    }

    pub fn leave_ride(&self, ride_id: i64, user_id: i64) {
        let mut registry = self.registry();
        if let Some(participants) = registry.rides.get_mut(&ride_id) {
            participants.remove(&user_id);
            if participants.is_empty() {
                registry.rides.remove(&ride_id);
            }
        }
        tracing::info!(ride_id, user_id, "User left ride");
    }

    pub fn is_participant(&self, ride_id: i64, user_id: i64) -> bool {
        self.registry()
            .rides
            .get(&ride_id)
            .is_some_and(|p| p.contains(&user_id))
    }

    /// Deliver to every participant of a ride except `exclude`. Returns the
    /// number of participants reached.
    pub fn send_to_ride(&self, ride_id: i64, message: JsonValue, exclude: Option<i64>) -> usize {
        let message = with_timestamp(message);
        let mut registry = self.registry();
        let Some(participants) = registry.rides.get(&ride_id).cloned() else {
            tracing::debug!(ride_id, "No participants in ride");
            return 0;
        };
        participants
            .into_iter()
            .filter(|user_id| Some(*user_id) != exclude)
            .filter(|user_id| Self::deliver(&mut registry, *user_id, &message))
            .count()
    }

    pub fn online_users(&self) -> Vec<i64> {
        self.registry().connections.keys().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.registry().connections.values().map(Vec::len).sum()
    }

    pub fn active_rides(&self) -> Vec<i64> {
        self.registry().rides.keys().copied().collect()
    }

    pub fn stats(&self) -> RealtimeStats {
        let registry = self.registry();
        RealtimeStats {
            online_users: registry.connections.keys().copied().collect(),
            total_connections: registry.connections.values().map(Vec::len).sum(),
            active_rides: registry.rides.keys().copied().collect(),
        }
    }

    /// Send to all connections of `user_id`, dropping the ones whose writer is
    /// gone.
    fn deliver(registry: &mut Registry, user_id: i64, message: &JsonValue) -> bool {
        let Some(connections) = registry.connections.get_mut(&user_id) else {
            tracing::debug!(user_id, "User is not connected");
            return false;
        };
        connections.retain(|(id, outbox)| {
            let alive = outbox.send(message.clone()).is_ok();
            if !alive {
                tracing::warn!(user_id, connection_id = %id, "Dropping dead connection");
            }
            alive
        });
        if connections.is_empty() {
            registry.connections.remove(&user_id);
        }
        true
    }
}

fn with_timestamp(message: JsonValue) -> JsonValue {
    match message {
        JsonValue::Object(mut map) => {
            map.insert(
                "timestamp".to_string(),
                JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
            JsonValue::Object(map)
        }
        other => other,
    }
}
