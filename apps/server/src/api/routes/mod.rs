use crate::api::handlers::{health, realtime, records, rides, users};
use crate::models::{
    Commission, DriverDocument, DriverLocation, DriverProfile, PhoneVerification, Record, Ride,
    Role, Transaction, User,
};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

/// Routes mounted under the API prefix.
pub fn api_routes(realtime_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health::health_check))
        // Users: get-or-create by Telegram id instead of a plain create
        .route("/users", get(records::list::<User>))
        .route("/users/count", get(records::count::<User>))
        .route(
            "/users/:id",
            get(records::get::<User>)
                .post(users::get_or_create)
                .put(records::update::<User>),
        )
        .route(
            "/users/update_user_balance/:user_id",
            patch(users::update_user_balance),
        )
        // Rides: creation and status changes go through the ride service
        .route(
            "/rides",
            get(records::list::<Ride>).post(rides::create_ride),
        )
        .route("/rides/count", get(records::count::<Ride>))
        .route(
            "/rides/:id",
            get(records::get::<Ride>)
                .put(records::update::<Ride>)
                .delete(records::delete::<Ride>),
        )
        .route("/rides/:id/status", post(rides::change_status))
        .route("/rides/:id/status-history", get(rides::status_history));

    let router = collection::<Role>(router, "/roles");
    let router = collection::<DriverProfile>(router, "/driver-profiles");
    let router = collection::<DriverLocation>(router, "/driver-locations");
    let router = collection::<DriverDocument>(router, "/driver-documents");
    let router = collection::<Commission>(router, "/commissions");
    let router = collection::<PhoneVerification>(router, "/phone-verifications");
    let router = collection::<Transaction>(router, "/transactions");

    if realtime_enabled {
        router.merge(realtime_routes())
    } else {
        router
    }
}

/// list, count, create, get, update and delete for one record type.
fn collection<R: Record>(router: Router<AppState>, path: &str) -> Router<AppState> {
    router
        .route(path, get(records::list::<R>).post(records::create::<R>))
        .route(&format!("{path}/count"), get(records::count::<R>))
        .route(
            &format!("{path}/:id"),
            get(records::get::<R>)
                .put(records::update::<R>)
                .delete(records::delete::<R>),
        )
}

fn realtime_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/stats", get(realtime::stats))
        .route("/ws/broadcast", post(realtime::broadcast))
        .route("/ws/notify/:user_id", post(realtime::notify))
        .route("/ws/:user_id", get(realtime::connect))
}
