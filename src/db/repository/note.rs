use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::NoteType;
use crate::models::DoctorNote;

pub fn insert_doctor_note(conn: &Connection, note: &DoctorNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_notes (id, patient_id, note_type, title, content, is_active, confidence_score, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            note.id.to_string(),
            note.patient_id.to_string(),
            note.note_type.as_str(),
            note.title,
            note.content,
            note.is_active,
            note.confidence_score,
            format_timestamp(note.created_at),
        ],
    )?;
    Ok(())
}

/// Only active notes contribute to prompt context.
pub fn get_active_notes(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<DoctorNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, note_type, title, content, is_active, confidence_score, created_at
         FROM doctor_notes WHERE patient_id = ?1 AND is_active = 1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
            row.get::<_, Option<f32>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut notes = Vec::new();
    for row in rows {
        let (id, patient_id, note_type, title, content, is_active, confidence_score, created_at) =
            row?;
        notes.push(DoctorNote {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            patient_id: Uuid::parse_str(&patient_id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            note_type: NoteType::from_str(&note_type)?,
            title,
            content,
            is_active,
            confidence_score,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(notes)
}

/// Toggle a note on or off. Returns NotFound if the note does not exist.
pub fn set_note_active(
    conn: &Connection,
    note_id: &Uuid,
    is_active: bool,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctor_notes SET is_active = ?1 WHERE id = ?2",
        params![is_active, note_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor_note".into(),
            id: note_id.to_string(),
        });
    }
    Ok(())
}
