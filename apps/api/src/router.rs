use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};

use appointment_cell::router::appointment_routes;
use patient_cell::router::patient_routes;
use practitioner_cell::router::practitioner_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dental Reservation API is running!" }))
        .nest("/api/appointments", appointment_routes(state.clone()))
        .nest("/api/patients", patient_routes(state.clone()))
        .nest("/api/practitioners", practitioner_routes(state))
}
