// libs/appointment-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A booked visit. Identity is assigned by storage; everything except the
/// date/time pair and the two booking axes is opaque display data carried
/// for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i32,
    pub patient_id: Option<i32>,
    pub practitioner_name: Option<String>,
    pub room_number: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub duration: Option<String>,
    pub observation: Option<String>,
    pub care_type: Option<String>,
    pub patient_name: Option<String>,
    pub patient_role: Option<String>,
    pub affiliation: Option<String>,
    pub agent: Option<String>,
    pub insurer_name: Option<String>,
    pub cancelled_at: Option<String>,
}

impl Appointment {
    /// Practitioner booking axis; a blank name means the axis is unset.
    pub fn practitioner_axis(&self) -> Option<&str> {
        self.practitioner_name.as_deref().filter(|v| !v.is_empty())
    }

    /// Room booking axis; a blank room means the axis is unset.
    pub fn room_axis(&self) -> Option<&str> {
        self.room_number.as_deref().filter(|v| !v.is_empty())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Body for both create and update. Updates replace the stored record
/// wholesale, so omitted fields overwrite to null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAppointmentRequest {
    pub patient_id: Option<i32>,
    pub practitioner_name: Option<String>,
    pub room_number: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub duration: Option<String>,
    pub observation: Option<String>,
    pub care_type: Option<String>,
    pub patient_name: Option<String>,
    pub patient_role: Option<String>,
    pub affiliation: Option<String>,
    pub agent: Option<String>,
    pub insurer_name: Option<String>,
    pub cancelled_at: Option<String>,
}

impl SaveAppointmentRequest {
    pub fn practitioner_axis(&self) -> Option<&str> {
        self.practitioner_name.as_deref().filter(|v| !v.is_empty())
    }

    pub fn room_axis(&self) -> Option<&str> {
        self.room_number.as_deref().filter(|v| !v.is_empty())
    }
}

/// Listing filters; all optional, combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub patient: Option<String>,
    pub practitioner: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Query for the practitioner agenda: a single day or an inclusive range.
#[derive(Debug, Clone, Deserialize)]
pub struct PractitionerAgendaQuery {
    pub practitioner: String,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Query for the bookable-slot views.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableSlotsQuery {
    pub practitioner: Option<String>,
    pub room: Option<String>,
    pub date: NaiveDate,
    pub step_minutes: Option<u32>,
}

/// Day-level occupancy summary for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotOverview {
    pub date: NaiveDate,
    pub total_slots: usize,
    pub booked_count: usize,
    pub available_count: usize,
    pub utilization_percent: u32,
    pub available_slots: Vec<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Practitioner already has an appointment at this time")]
    PractitionerBooked,

    #[error("Room is already booked at this time")]
    RoomBooked,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
