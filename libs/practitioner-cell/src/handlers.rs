use std::sync::Arc;
use axum::{extract::State, Json};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{Practitioner, PractitionerError};
use crate::services::PractitionerDirectoryService;

#[axum::debug_handler]
pub async fn list_practitioners(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<Practitioner>>, AppError> {
    let service = PractitionerDirectoryService::new(&config);

    let practitioners = service
        .list_practitioners(auth.token())
        .await
        .map_err(|e| match e {
            PractitionerError::DatabaseError(msg) => AppError::Database(msg),
        })?;

    Ok(Json(practitioners))
}
