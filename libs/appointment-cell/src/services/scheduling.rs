use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use std::sync::Arc;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentFilter, SaveAppointmentRequest, SchedulingError};
use crate::services::conflict::{map_storage_error, ConflictDetectionService};

/// Mediates every write to the appointment collection and enforces the
/// no-double-booking invariant before anything reaches storage.
pub struct AppointmentSchedulingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
}

impl AppointmentSchedulingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let conflict_service = ConflictDetectionService::new(Arc::clone(&supabase));

        Self {
            supabase,
            conflict_service,
        }
    }

    pub async fn create_appointment(
        &self,
        request: SaveAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking appointment for practitioner {:?} / room {:?} on {:?} at {:?}",
            request.practitioner_name,
            request.room_number,
            request.appointment_date,
            request.appointment_time
        );

        Self::validate_slot_fields(&request)?;
        self.conflict_service.check_slot(&request, None, auth_token).await?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(Self::appointment_row(&request)),
                Some(headers),
            )
            .await
            .map_err(map_storage_error)?;

        let appointment: Appointment = result
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))?
            .ok_or_else(|| SchedulingError::DatabaseError("Insert returned no row".to_string()))?;

        info!("Appointment booked with id {}", appointment.id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: i32,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or(SchedulingError::NotFound)
            .and_then(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })
            })
    }

    /// Replace the stored record wholesale; fields absent from the request
    /// become null. The conflict scan skips the record's own id so an
    /// unchanged slot can be re-saved.
    pub async fn update_appointment(
        &self,
        appointment_id: i32,
        request: SaveAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        info!("Updating appointment {}", appointment_id);

        self.get_appointment(appointment_id, auth_token).await?;

        Self::validate_slot_fields(&request)?;
        self.conflict_service
            .check_slot(&request, Some(appointment_id), auth_token)
            .await?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Self::appointment_row(&request)),
                Some(headers),
            )
            .await
            .map_err(map_storage_error)?;

        result
            .into_iter()
            .next()
            .ok_or(SchedulingError::NotFound)
            .and_then(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })
            })
    }

    pub async fn delete_appointment(
        &self,
        appointment_id: i32,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        info!("Deleting appointment {}", appointment_id);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if deleted.is_empty() {
            return Err(SchedulingError::NotFound);
        }

        Ok(())
    }

    pub async fn list_appointments(
        &self,
        filter: AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();

        if let Some(patient) = filter.patient.as_deref().filter(|v| !v.is_empty()) {
            query_parts.push(format!("patient_name=ilike.*{}*", urlencoding::encode(patient)));
        }
        if let Some(practitioner) = filter.practitioner.as_deref().filter(|v| !v.is_empty()) {
            query_parts.push(format!(
                "practitioner_name=ilike.*{}*",
                urlencoding::encode(practitioner)
            ));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }

        let path = if query_parts.is_empty() {
            "/rest/v1/appointments".to_string()
        } else {
            format!("/rest/v1/appointments?{}", query_parts.join("&"))
        };

        debug!("Listing appointments: {}", path);
        self.fetch_appointments(&path, auth_token).await
    }

    pub async fn find_by_practitioner_and_date(
        &self,
        practitioner: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?practitioner_name=eq.{}&appointment_date=eq.{}",
            urlencoding::encode(practitioner),
            date
        );
        self.fetch_appointments(&path, auth_token).await
    }

    pub async fn find_by_practitioner_in_range(
        &self,
        practitioner: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?practitioner_name=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}",
            urlencoding::encode(practitioner),
            start_date,
            end_date
        );
        self.fetch_appointments(&path, auth_token).await
    }

    /// Resolve a patient by matricule via the patients collection, then
    /// return that patient's appointments. Explicit two-step lookup; the
    /// scheduler never navigates entity relations itself.
    pub async fn find_by_patient_matricule(
        &self,
        matricule: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Resolving patient by matricule");

        let path = format!("/rest/v1/patients?matricule=eq.{}", urlencoding::encode(matricule));
        let patients: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let patient_id = patients
            .first()
            .and_then(|p| p.get("id"))
            .and_then(Value::as_i64)
            .ok_or(SchedulingError::PatientNotFound)?;

        let path = format!("/rest/v1/appointments?patient_id=eq.{}", patient_id);
        self.fetch_appointments(&path, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn validate_slot_fields(request: &SaveAppointmentRequest) -> Result<(), SchedulingError> {
        if request.appointment_date.is_none() {
            return Err(SchedulingError::ValidationError(
                "appointment_date is required".to_string(),
            ));
        }
        if request
            .appointment_time
            .as_deref()
            .filter(|t| !t.is_empty())
            .is_none()
        {
            return Err(SchedulingError::ValidationError(
                "appointment_time is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Full column set for insert and wholesale update; explicit nulls make
    /// PATCH overwrite omitted fields.
    fn appointment_row(request: &SaveAppointmentRequest) -> Value {
        json!({
            "patient_id": request.patient_id,
            "practitioner_name": request.practitioner_name,
            "room_number": request.room_number,
            "appointment_date": request.appointment_date,
            "appointment_time": request.appointment_time,
            "duration": request.duration,
            "observation": request.observation,
            "care_type": request.care_type,
            "patient_name": request.patient_name,
            "patient_role": request.patient_role,
            "affiliation": request.affiliation,
            "agent": request.agent,
            "insurer_name": request.insurer_name,
            "cancelled_at": request.cancelled_at,
        })
    }

    async fn fetch_appointments(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(date: Option<&str>, time: Option<&str>) -> SaveAppointmentRequest {
        SaveAppointmentRequest {
            patient_id: None,
            practitioner_name: Some("Dr. Smith".to_string()),
            room_number: None,
            appointment_date: date.and_then(|d| d.parse().ok()),
            appointment_time: time.map(str::to_string),
            duration: None,
            observation: None,
            care_type: None,
            patient_name: None,
            patient_role: None,
            affiliation: None,
            agent: None,
            insurer_name: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn missing_date_is_rejected() {
        assert_matches!(
            AppointmentSchedulingService::validate_slot_fields(&request(None, Some("09:00"))),
            Err(SchedulingError::ValidationError(_))
        );
    }

    #[test]
    fn empty_time_is_rejected() {
        assert_matches!(
            AppointmentSchedulingService::validate_slot_fields(&request(Some("2024-01-15"), Some(""))),
            Err(SchedulingError::ValidationError(_))
        );
        assert_matches!(
            AppointmentSchedulingService::validate_slot_fields(&request(Some("2024-01-15"), None)),
            Err(SchedulingError::ValidationError(_))
        );
    }

    #[test]
    fn complete_slot_fields_pass() {
        assert!(
            AppointmentSchedulingService::validate_slot_fields(&request(Some("2024-01-15"), Some("09:00")))
                .is_ok()
        );
    }

    #[test]
    fn row_carries_explicit_nulls_for_omitted_fields() {
        let row = AppointmentSchedulingService::appointment_row(&request(Some("2024-01-15"), Some("09:00")));

        assert_eq!(row["practitioner_name"], "Dr. Smith");
        assert!(row["room_number"].is_null());
        assert!(row["observation"].is_null());
        assert!(row.get("id").is_none());
    }
}
