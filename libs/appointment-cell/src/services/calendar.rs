use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, SchedulingError, SlotOverview};
use crate::services::conflict::axis_value;

/// Clinic working hours: first slot at 08:00, last slot at 17:30.
pub const DEFAULT_START_HOUR: u32 = 8;
pub const DEFAULT_END_HOUR: u32 = 17;
pub const DEFAULT_STEP_MINUTES: u32 = 30;

/// Minute past which no slot starts within the terminal hour.
const LAST_SLOT_MINUTE: u32 = 30;

/// Produce the day's slot labels from `start_hour:00`, stepping by
/// `step_minutes` within each hour. The minute counter restarts at every
/// hour boundary, so steps that do not divide 60 stay deterministic; the
/// terminal hour is cut off after `:30`. A zero step yields no slots.
pub fn generate_daily_slots(start_hour: u32, end_hour: u32, step_minutes: u32) -> Vec<String> {
    let mut slots = Vec::new();
    if step_minutes == 0 {
        return slots;
    }

    for hour in start_hour..=end_hour {
        let mut minute = 0;
        while minute < 60 {
            if hour == end_hour && minute > LAST_SLOT_MINUTE {
                break;
            }
            slots.push(format!("{:02}:{:02}", hour, minute));
            minute += step_minutes;
        }
    }

    slots
}

/// Order-preserving set difference: every slot not already booked.
pub fn available_slots(all_slots: &[String], booked: &[String]) -> Vec<String> {
    all_slots
        .iter()
        .filter(|slot| !booked.contains(slot))
        .cloned()
        .collect()
}

/// Share of the day already booked, as a whole percentage.
pub fn utilization_percent(total: usize, booked: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((booked as f64 / total as f64) * 100.0).round() as u32
}

/// Stored times may carry seconds; slot labels are always `HH:MM`.
pub fn normalize_time_label(time: &str) -> &str {
    time.get(..5).unwrap_or(time)
}

pub struct SlotCalendarService {
    supabase: SupabaseClient,
}

impl SlotCalendarService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Slot labels still bookable for the practitioner and/or room on `date`.
    pub async fn available_for(
        &self,
        date: NaiveDate,
        practitioner: Option<&str>,
        room: Option<&str>,
        step_minutes: u32,
        auth_token: &str,
    ) -> Result<Vec<String>, SchedulingError> {
        let all = generate_daily_slots(DEFAULT_START_HOUR, DEFAULT_END_HOUR, step_minutes);
        let booked = self.booked_labels(date, practitioner, room, auth_token).await?;
        Ok(available_slots(&all, &booked))
    }

    /// Occupancy summary for the dashboard's day view.
    pub async fn overview_for(
        &self,
        date: NaiveDate,
        practitioner: Option<&str>,
        room: Option<&str>,
        step_minutes: u32,
        auth_token: &str,
    ) -> Result<SlotOverview, SchedulingError> {
        let all = generate_daily_slots(DEFAULT_START_HOUR, DEFAULT_END_HOUR, step_minutes);
        let booked = self.booked_labels(date, practitioner, room, auth_token).await?;
        let available = available_slots(&all, &booked);

        let total_slots = all.len();
        let booked_count = total_slots - available.len();

        Ok(SlotOverview {
            date,
            total_slots,
            booked_count,
            available_count: available.len(),
            utilization_percent: utilization_percent(total_slots, booked_count),
            available_slots: available,
        })
    }

    /// Times already taken on `date` by the practitioner or the room
    /// (inclusive or), normalized to `HH:MM`.
    async fn booked_labels(
        &self,
        date: NaiveDate,
        practitioner: Option<&str>,
        room: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<String>, SchedulingError> {
        let mut query_parts = vec![format!("appointment_date=eq.{}", date)];

        match (axis_value(practitioner), axis_value(room)) {
            (Some(p), Some(r)) => query_parts.push(format!(
                "or=(practitioner_name.eq.{},room_number.eq.{})",
                urlencoding::encode(p),
                urlencoding::encode(r)
            )),
            (Some(p), None) => {
                query_parts.push(format!("practitioner_name=eq.{}", urlencoding::encode(p)))
            }
            (None, Some(r)) => {
                query_parts.push(format!("room_number=eq.{}", urlencoding::encode(r)))
            }
            (None, None) => {}
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        debug!("Fetching booked slots: {}", path);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let appointments = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e))
            })?;

        Ok(appointments
            .iter()
            .filter_map(|a| a.appointment_time.as_deref())
            .map(|t| normalize_time_label(t).to_string())
            .collect())
    }
}
