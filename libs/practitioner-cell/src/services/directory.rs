use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Practitioner, PractitionerError};

/// Read-only view of the clinic's practitioners; the scheduler only ever
/// needs their names for the booking axes.
pub struct PractitionerDirectoryService {
    supabase: SupabaseClient,
}

impl PractitionerDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_practitioners(
        &self,
        auth_token: &str,
    ) -> Result<Vec<Practitioner>, PractitionerError> {
        debug!("Listing practitioners");

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, "/rest/v1/practitioners", Some(auth_token), None)
            .await
            .map_err(|e| PractitionerError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Practitioner>, _>>()
            .map_err(|e| {
                PractitionerError::DatabaseError(format!("Failed to parse practitioners: {}", e))
            })
    }
}
