use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreatePatientRequest, Patient, PatientError, UpdatePatientRequest};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// List patients, optionally narrowed by a name fragment matched against
    /// both name columns.
    pub async fn list_patients(
        &self,
        name: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let path = match name.filter(|v| !v.is_empty()) {
            Some(name) => format!(
                "/rest/v1/patients?or=(first_name.ilike.*{}*,last_name.ilike.*{}*)",
                urlencoding::encode(name),
                urlencoding::encode(name)
            ),
            None => "/rest/v1/patients".to_string(),
        };

        debug!("Listing patients: {}", path);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>()
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patients: {}", e)))
    }

    pub async fn get_patient(
        &self,
        patient_id: i32,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or(PatientError::NotFound)
            .and_then(|row| {
                serde_json::from_value(row)
                    .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
            })
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Creating patient record for {} {}", request.first_name, request.last_name);

        let patient_data = json!({
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "phone": request.phone,
            "date_of_birth": request.date_of_birth,
            "gender_code": request.gender_code,
            "matricule": request.matricule,
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(patient_data),
                Some(headers),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Insert returned no row".to_string()))
            .and_then(|row| {
                serde_json::from_value(row)
                    .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
            })
    }

    pub async fn update_patient(
        &self,
        patient_id: i32,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient {}", patient_id);

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth));
        }
        if let Some(gender_code) = request.gender_code {
            update_data.insert("gender_code".to_string(), json!(gender_code));
        }
        if let Some(matricule) = request.matricule {
            update_data.insert("matricule".to_string(), json!(matricule));
        }

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or(PatientError::NotFound)
            .and_then(|row| {
                serde_json::from_value(row)
                    .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
            })
    }

    pub async fn delete_patient(
        &self,
        patient_id: i32,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        debug!("Deleting patient {}", patient_id);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if deleted.is_empty() {
            return Err(PatientError::NotFound);
        }

        Ok(())
    }
}
