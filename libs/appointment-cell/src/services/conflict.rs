use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, SaveAppointmentRequest, SchedulingError};

/// Normalize an optional booking-axis value; blank strings count as unset.
pub fn axis_value(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Scan the existing date/time cohort for a booking collision.
///
/// The two axes are evaluated independently: the practitioner axis first,
/// then the room axis. An unset axis (on either side) can never conflict.
pub fn find_axis_conflict(
    incoming_practitioner: Option<&str>,
    incoming_room: Option<&str>,
    existing: &[Appointment],
) -> Option<SchedulingError> {
    if let Some(practitioner) = axis_value(incoming_practitioner) {
        if existing.iter().any(|a| a.practitioner_axis() == Some(practitioner)) {
            return Some(SchedulingError::PractitionerBooked);
        }
    }

    if let Some(room) = axis_value(incoming_room) {
        if existing.iter().any(|a| a.room_axis() == Some(room)) {
            return Some(SchedulingError::RoomBooked);
        }
    }

    None
}

/// Translate a failed write into the scheduler's error taxonomy.
///
/// The conflict pre-check is check-then-act, so a concurrent writer can slip
/// past it; the partial unique indexes on (practitioner, date, time) and
/// (room, date, time) then reject the insert with a 23505. The caller gets
/// the same conflict error the pre-check would have produced.
pub fn map_storage_error(err: anyhow::Error) -> SchedulingError {
    let text = err.to_string();
    if text.contains("23505") || text.contains("duplicate key") {
        if text.contains("uq_appointments_room_slot") {
            return SchedulingError::RoomBooked;
        }
        return SchedulingError::PractitionerBooked;
    }
    SchedulingError::DatabaseError(text)
}

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Reject the requested slot if either booking axis is already taken.
    ///
    /// `exclude_id` removes the record being updated from the scan so an
    /// appointment can be re-saved into its own slot.
    pub async fn check_slot(
        &self,
        request: &SaveAppointmentRequest,
        exclude_id: Option<i32>,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let (date, time) = match (request.appointment_date, request.appointment_time.as_deref()) {
            (Some(date), Some(time)) if !time.is_empty() => (date, time),
            // Nothing to collide with until both slot fields are present;
            // field validation happens upstream.
            _ => return Ok(()),
        };

        debug!("Checking slot conflicts on {} at {}", date, time);

        let existing = self
            .appointments_at(date, time, exclude_id, auth_token)
            .await?;

        if let Some(conflict) =
            find_axis_conflict(request.practitioner_axis(), request.room_axis(), &existing)
        {
            warn!(
                "Slot conflict on {} at {}: {} existing appointment(s)",
                date,
                time,
                existing.len()
            );
            return Err(conflict);
        }

        Ok(())
    }

    async fn appointments_at(
        &self,
        date: NaiveDate,
        time: &str,
        exclude_id: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = vec![
            format!("appointment_date=eq.{}", date),
            format!("appointment_time=eq.{}", urlencoding::encode(time)),
        ];

        if let Some(id) = exclude_id {
            query_parts.push(format!("id=neq.{}", id));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}
