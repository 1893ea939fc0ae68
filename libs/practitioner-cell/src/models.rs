use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: i32,
    pub name: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PractitionerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}
