use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub account_id: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    /// Set for pet patients ("dog", "cat", ...); None for humans.
    pub species: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A named possible health topic surfaced as "discuss with your doctor"
/// guidance, not a medical diagnosis. At most 5 are retained per patient,
/// sorted descending by confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisCandidate {
    pub name: String,
    pub confidence: f32,
    pub reasoning: String,
    pub updated_at: NaiveDateTime,
}
