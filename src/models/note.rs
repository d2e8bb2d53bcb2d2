use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NoteType;

/// AI-authored persistent memory entry about a patient. Toggle-able by
/// the user; contributes to prompt context only while active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorNote {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub note_type: NoteType,
    pub title: String,
    pub content: String,
    pub is_active: bool,
    pub confidence_score: Option<f32>,
    pub created_at: NaiveDateTime,
}
