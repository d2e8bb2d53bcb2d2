use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{DiagnosisCandidate, Patient};

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, account_id, name, birth_date, gender, species, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient.id.to_string(),
            patient.account_id,
            patient.name,
            patient.birth_date.map(|d| d.to_string()),
            patient.gender,
            patient.species,
            format_timestamp(patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, account_id, name, birth_date, gender, species, created_at
         FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        },
    );

    match result {
        Ok((id, account_id, name, birth_date, gender, species, created_at)) => {
            Ok(Some(Patient {
                id: Uuid::parse_str(&id)
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
                account_id,
                name,
                birth_date: birth_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                gender,
                species,
                created_at: parse_timestamp(&created_at)?,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace a patient's candidate set wholesale. The merge computes the
/// final (capped, sorted) list; persistence is a plain rewrite.
pub fn replace_diagnosis_candidates(
    conn: &Connection,
    patient_id: &Uuid,
    candidates: &[DiagnosisCandidate],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM diagnosis_candidates WHERE patient_id = ?1",
        params![patient_id.to_string()],
    )?;
    for candidate in candidates {
        conn.execute(
            "INSERT INTO diagnosis_candidates (patient_id, name, confidence, reasoning, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                patient_id.to_string(),
                candidate.name,
                candidate.confidence,
                candidate.reasoning,
                format_timestamp(candidate.updated_at),
            ],
        )?;
    }
    Ok(())
}

/// Stored candidates, highest confidence first.
pub fn get_diagnosis_candidates(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<DiagnosisCandidate>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name, confidence, reasoning, updated_at
         FROM diagnosis_candidates WHERE patient_id = ?1
         ORDER BY confidence DESC, name ASC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, f32>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut candidates = Vec::new();
    for row in rows {
        let (name, confidence, reasoning, updated_at) = row?;
        candidates.push(DiagnosisCandidate {
            name,
            confidence,
            reasoning,
            updated_at: parse_timestamp(&updated_at)?,
        });
    }
    Ok(candidates)
}
