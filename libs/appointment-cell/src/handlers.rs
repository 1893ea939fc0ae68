// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentFilter, AvailableSlotsQuery, PractitionerAgendaQuery,
    SaveAppointmentRequest, SchedulingError, SlotOverview,
};
use crate::services::calendar::{SlotCalendarService, DEFAULT_STEP_MINUTES};
use crate::services::scheduling::AppointmentSchedulingService;

fn map_scheduling_error(err: SchedulingError) -> AppError {
    match err {
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        SchedulingError::PractitionerBooked => {
            AppError::Conflict("Practitioner already has an appointment at this time".to_string())
        }
        SchedulingError::RoomBooked => {
            AppError::Conflict("Room is already booked at this time".to_string())
        }
        SchedulingError::ValidationError(msg) => AppError::ValidationError(msg),
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SaveAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    debug!("User {} booking an appointment", user.id);

    let service = AppointmentSchedulingService::new(&config);
    let appointment = service
        .create_appointment(request, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<i32>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Appointment>, AppError> {
    let service = AppointmentSchedulingService::new(&config);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<i32>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SaveAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    debug!("User {} updating appointment {}", user.id, appointment_id);

    let service = AppointmentSchedulingService::new(&config);
    let appointment = service
        .update_appointment(appointment_id, request, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<i32>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    debug!("User {} deleting appointment {}", user.id, appointment_id);

    let service = AppointmentSchedulingService::new(&config);
    service
        .delete_appointment(appointment_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let service = AppointmentSchedulingService::new(&config);
    let appointments = service
        .list_appointments(filter, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointments))
}

/// A practitioner's agenda for one day (`date`) or an inclusive range
/// (`start_date` + `end_date`).
#[axum::debug_handler]
pub async fn appointments_by_practitioner(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PractitionerAgendaQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let service = AppointmentSchedulingService::new(&config);

    let appointments = match (query.date, query.start_date, query.end_date) {
        (Some(date), _, _) => {
            service
                .find_by_practitioner_and_date(&query.practitioner, date, auth.token())
                .await
        }
        (None, Some(start_date), Some(end_date)) => {
            service
                .find_by_practitioner_in_range(&query.practitioner, start_date, end_date, auth.token())
                .await
        }
        _ => {
            return Err(AppError::ValidationError(
                "date or start_date/end_date is required".to_string(),
            ))
        }
    }
    .map_err(map_scheduling_error)?;

    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn appointments_by_matricule(
    State(config): State<Arc<AppConfig>>,
    Path(matricule): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let service = AppointmentSchedulingService::new(&config);
    let appointments = service
        .find_by_patient_matricule(&matricule, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn available_slots(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let service = SlotCalendarService::new(&config);
    let slots = service
        .available_for(
            query.date,
            query.practitioner.as_deref(),
            query.room.as_deref(),
            query.step_minutes.unwrap_or(DEFAULT_STEP_MINUTES),
            auth.token(),
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(slots))
}

#[axum::debug_handler]
pub async fn slot_overview(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<SlotOverview>, AppError> {
    let service = SlotCalendarService::new(&config);
    let overview = service
        .overview_for(
            query.date,
            query.practitioner.as_deref(),
            query.room.as_deref(),
            query.step_minutes.unwrap_or(DEFAULT_STEP_MINUTES),
            auth.token(),
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(overview))
}
