use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{note, patient, record};
use crate::db::DatabaseError;

/// Render a patient's stored data as a Markdown report suitable for
/// bringing to a doctor visit. Empty sections are omitted entirely.
pub fn build_patient_report(conn: &Connection, patient_id: &Uuid) -> Result<String, DatabaseError> {
    let Some(patient) = patient::get_patient(conn, patient_id)? else {
        return Err(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: patient_id.to_string(),
        });
    };

    let mut report = format!("# Health Report: {}\n", patient.name);

    report.push_str("\n## Profile\n");
    report.push_str(&format!("- Name: {}\n", patient.name));
    if let Some(birth_date) = patient.birth_date {
        report.push_str(&format!("- Born: {birth_date}\n"));
    }
    if let Some(ref gender) = patient.gender {
        report.push_str(&format!("- Gender: {gender}\n"));
    }
    if let Some(ref species) = patient.species {
        report.push_str(&format!("- Species: {species}\n"));
    }

    let candidates = patient::get_diagnosis_candidates(conn, patient_id)?;
    if !candidates.is_empty() {
        report.push_str("\n## Topics to Discuss with Your Doctor\n");
        for candidate in &candidates {
            report.push_str(&format!(
                "- **{}** (confidence {:.0}%): {}\n",
                candidate.name,
                candidate.confidence * 100.0,
                candidate.reasoning
            ));
        }
    }

    let records = record::get_record_summaries(conn, patient_id)?;
    if !records.is_empty() {
        report.push_str("\n## Health Records\n");
        for record in &records {
            report.push_str(&format!(
                "- [{}] {} ({})\n",
                record.record_type,
                record.summary,
                record.created_at.format("%Y-%m-%d")
            ));
        }
    }

    let notes = note::get_active_notes(conn, patient_id)?;
    if !notes.is_empty() {
        report.push_str("\n## Care Notes\n");
        for n in &notes {
            report.push_str(&format!("- [{}] {}: {}\n", n.note_type.as_str(), n.title, n.content));
        }
    }

    Ok(report)
}
