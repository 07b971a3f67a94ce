//! Ride lifecycle: creation, audited status changes and status history

use crate::{
    db::{
        tables::{RIDES, RIDE_STATUS_HISTORY},
        JsonMap, ListQuery, RecordStore, RideTransition, TransitionOutcome,
    },
    models::{
        from_row, to_values, ActorRole, Ride, RideCreate, RideStatus, RideStatusChangeRequest,
        RideStatusHistory,
    },
    realtime::ConnectionManager,
    Error, Result,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct RideService {
    store: Arc<dyn RecordStore>,
    realtime: Option<Arc<ConnectionManager>>,
}

impl RideService {
    pub fn new(store: Arc<dyn RecordStore>, realtime: Option<Arc<ConnectionManager>>) -> Self {
        Self { store, realtime }
    }

    /// Create a ride in `requested` status and record the initial history row.
    pub async fn create(&self, payload: RideCreate) -> Result<Ride> {
        payload.validate()?;
        let client_id = payload.client_id;

        let mut values = RIDES.writable_values(to_values(&payload)?);
        values.insert(
            "status".to_string(),
            JsonValue::from(RideStatus::Requested.as_str()),
        );

        let history = json_map(json!({
            "to_status": RideStatus::Requested.as_str(),
            "changed_by": client_id,
            "actor_role": ActorRole::Client.as_str(),
            "meta": {},
        }));

        let ride: Ride = from_row(self.store.insert_ride(values, history).await?)?;
        tracing::info!(ride_id = ride.id, client_id, "Ride requested");
        Ok(ride)
    }

    /// Move a ride to a new status if the actor's role allows it from the
    /// ride's current status.
    pub async fn change_status(&self, ride_id: i64, request: RideStatusChangeRequest) -> Result<Ride> {
        request.validate()?;
        let transition = build_transition(&request, Utc::now());

        let ride: Ride = match self.store.transition_ride(ride_id, &transition).await? {
            TransitionOutcome::NotFound => {
                return Err(Error::RecordNotFound {
                    resource: RIDES.resource,
                    id: ride_id,
                })
            }
            TransitionOutcome::Rejected { current } => {
                tracing::debug!(
                    ride_id,
                    from = %current,
                    to = %request.to_status,
                    role = %request.actor_role,
                    "Ride transition rejected"
                );
                return Err(Error::InvalidTransition {
                    from: current,
                    to: request.to_status.to_string(),
                    role: request.actor_role.to_string(),
                });
            }
            TransitionOutcome::Applied(row) => from_row(row)?,
        };

        tracing::info!(
            ride_id,
            status = %ride.status,
            role = %request.actor_role,
            actor_id = request.actor_id,
            "Ride status changed"
        );
        self.publish_status(&ride, &request);
        Ok(ride)
    }

    /// Status changes of one ride, oldest first.
    pub async fn status_history(&self, ride_id: i64) -> Result<Vec<RideStatusHistory>> {
        if self.store.get(&RIDES, ride_id).await?.is_none() {
            return Err(Error::RecordNotFound {
                resource: RIDES.resource,
                id: ride_id,
            });
        }
        let query = ListQuery::unbounded().filter("ride_id", JsonValue::from(ride_id));
        self.store
            .list(&RIDE_STATUS_HISTORY, &query)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    fn publish_status(&self, ride: &Ride, request: &RideStatusChangeRequest) {
        let Some(realtime) = &self.realtime else {
            return;
        };
        let event = json!({
            "type": "ride_status",
            "ride_id": ride.id,
            "status": ride.status,
            "actor_role": request.actor_role,
            "reason": request.reason,
        });
        realtime.send_to_ride(ride.id, event.clone(), None);
        // The client hears about its own ride even without joining the room.
        if !realtime.is_participant(ride.id, ride.client_id) {
            realtime.send_personal(ride.client_id, event);
        }
    }
}

fn json_map(value: JsonValue) -> JsonMap {
    match value {
        JsonValue::Object(map) => map,
        _ => JsonMap::new(),
    }
}

/// Column changes and history row for one requested transition.
fn build_transition(request: &RideStatusChangeRequest, now: DateTime<Utc>) -> RideTransition {
    let now = JsonValue::String(now.to_rfc3339_opts(SecondsFormat::Micros, true));
    let to = request.to_status;
    let reason = request
        .reason
        .clone()
        .map_or(JsonValue::Null, JsonValue::String);

    // Every transition overwrites the reason, clearing it when none is given.
    let mut changes = JsonMap::new();
    changes.insert("status".to_string(), JsonValue::from(to.as_str()));
    changes.insert("status_reason".to_string(), reason.clone());
    match to {
        RideStatus::Started => {
            changes.insert("started_at".to_string(), now);
        }
        RideStatus::Completed => {
            changes.insert("completed_at".to_string(), now);
        }
        RideStatus::Canceled => {
            changes.insert("canceled_at".to_string(), now);
            changes.insert("cancellation_reason".to_string(), reason.clone());
        }
        _ => {}
    }

    let history = json_map(json!({
        "to_status": to.as_str(),
        "changed_by": request.actor_id,
        "actor_role": request.actor_role.as_str(),
        "reason": reason,
        "meta": request.meta.clone().unwrap_or_else(|| json!({})),
    }));

    RideTransition {
        allowed_from: request
            .actor_role
            .allowed_sources(to)
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        changes,
        history,
    }
}
