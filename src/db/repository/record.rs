use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::PriorityLevel;
use crate::models::HealthRecordSummary;

pub fn insert_record_summary(
    conn: &Connection,
    record: &HealthRecordSummary,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_record_summaries (id, patient_id, record_type, summary, priority, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.record_type,
            record.summary,
            record.priority.as_str(),
            format_timestamp(record.created_at),
        ],
    )?;
    Ok(())
}

/// All summaries for a patient, newest first within each priority.
pub fn get_record_summaries(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<HealthRecordSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, record_type, summary, priority, created_at
         FROM health_record_summaries WHERE patient_id = ?1
         ORDER BY created_at DESC, id ASC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, patient_id, record_type, summary, priority, created_at) = row?;
        records.push(HealthRecordSummary {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            patient_id: Uuid::parse_str(&patient_id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            record_type,
            summary,
            priority: PriorityLevel::from_str(&priority)?,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(records)
}
