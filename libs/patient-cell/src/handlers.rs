use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest,
};
use crate::services::PatientService;

fn map_patient_error(err: PatientError) -> AppError {
    match err {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Vec<Patient>>, AppError> {
    let service = PatientService::new(&config);

    let patients = service
        .list_patients(query.name.as_deref(), auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(patients))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    Path(patient_id): Path<i32>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&config);

    let patient = service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(patient))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&config);

    let patient = service
        .create_patient(request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(patient))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    Path(patient_id): Path<i32>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&config);

    let patient = service
        .update_patient(patient_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(patient))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    Path(patient_id): Path<i32>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<StatusCode, AppError> {
    let service = PatientService::new(&config);

    service
        .delete_patient(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(StatusCode::NO_CONTENT)
}
