use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PriorityLevel;

/// Pre-computed condensed text representation of a raw health record.
/// The summary, not the raw record, is the unit of contextual inclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecordSummary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub record_type: String,
    pub summary: String,
    pub priority: PriorityLevel,
    pub created_at: NaiveDateTime,
}
