use crate::models::enums::{MessageRole, NoteType};
use crate::models::{AiSettings, DoctorNote, Message, Patient};

use super::prompt::{
    personalization_clause, CORE_INSTRUCTIONS, NO_PATIENT_PREAMBLE, NO_RECORDS_LINE,
    OUTPUT_FORMAT_INSTRUCTIONS, SYSTEM_PREAMBLE,
};
use super::tier::RecordPartitions;

/// Recent history lines included in the memory section.
const HISTORY_LINES: usize = 6;

/// Per-type caps on doctor notes included in context.
fn note_cap(note_type: NoteType) -> usize {
    match note_type {
        NoteType::Pattern => 3,
        NoteType::Concern => 3,
        NoteType::Preference => 2,
        NoteType::Insight => 3,
    }
}

/// Everything the assembler reads for one turn, fetched fresh by the
/// caller and passed in explicitly. Pure input: the assembler performs
/// no I/O of its own.
pub struct ContextInputs<'a> {
    pub patient: Option<&'a Patient>,
    pub records: &'a RecordPartitions,
    pub notes: &'a [DoctorNote],
    pub history: &'a [Message],
    pub forms: &'a [String],
    pub settings: &'a AiSettings,
}

/// Build the system prompt for one chat turn.
///
/// Section order is fixed: settings → memory/doctor-notes → patient
/// profile → health records (always → conditional → normal) → health
/// forms → core instructions → personalization → output format. The
/// output is deterministic for a given input.
pub fn assemble_system_prompt(inputs: &ContextInputs) -> String {
    let mut sections: Vec<String> = Vec::new();

    // Preamble doubles as the settings section header.
    let preamble = if inputs.patient.is_some() {
        SYSTEM_PREAMBLE
    } else {
        NO_PATIENT_PREAMBLE
    };
    sections.push(format!(
        "{preamble}\n\nSETTINGS:\n- memory: {}\n- personalization: {}",
        if inputs.settings.memory_enabled { "on" } else { "off" },
        inputs.settings.personalization_level.as_str(),
    ));

    if let Some(section) = memory_section(inputs) {
        sections.push(section);
    }

    if let Some(patient) = inputs.patient {
        sections.push(patient_section(patient));
        sections.push(records_section(inputs.records));
    }

    if !inputs.forms.is_empty() {
        sections.push(forms_section(inputs.forms));
    }

    sections.push(CORE_INSTRUCTIONS.to_string());
    sections.push(personalization_clause(inputs.settings.personalization_level).to_string());
    sections.push(OUTPUT_FORMAT_INSTRUCTIONS.to_string());

    sections.join("\n\n")
}

/// Doctor notes plus recent history. Omitted entirely when there is
/// nothing to remember; the model should not see an empty memory header.
fn memory_section(inputs: &ContextInputs) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    for note_type in [
        NoteType::Pattern,
        NoteType::Concern,
        NoteType::Preference,
        NoteType::Insight,
    ] {
        let selected: Vec<&DoctorNote> = inputs
            .notes
            .iter()
            .filter(|n| n.is_active && n.note_type == note_type)
            .take(note_cap(note_type))
            .collect();
        for note in selected {
            lines.push(format!(
                "- [{}] {}: {}",
                note.note_type.as_str(),
                note.title,
                note.content
            ));
        }
    }

    let mut section = String::new();
    if !lines.is_empty() {
        section.push_str("DOCTOR NOTES (AI memory about this patient):\n");
        section.push_str(&lines.join("\n"));
    }

    if inputs.settings.memory_enabled && !inputs.history.is_empty() {
        let recent: Vec<&Message> = inputs
            .history
            .iter()
            .rev()
            .take(HISTORY_LINES)
            .rev()
            .collect();
        if !section.is_empty() {
            section.push_str("\n\n");
        }
        section.push_str("RECENT CONVERSATION:\n");
        for msg in recent {
            let role = match msg.role {
                MessageRole::User => "User",
                MessageRole::Ai => "Careloop",
            };
            section.push_str(&format!("{role}: {}\n", msg.content));
        }
        section.truncate(section.trim_end().len());
    }

    if section.is_empty() {
        None
    } else {
        Some(section)
    }
}

fn patient_section(patient: &Patient) -> String {
    let mut section = format!("PATIENT PROFILE:\n- name: {}", patient.name);
    if let Some(birth_date) = patient.birth_date {
        section.push_str(&format!("\n- born: {birth_date}"));
    }
    if let Some(ref gender) = patient.gender {
        section.push_str(&format!("\n- gender: {gender}"));
    }
    if let Some(ref species) = patient.species {
        section.push_str(&format!("\n- species: {species}"));
    }
    section
}

fn records_section(records: &RecordPartitions) -> String {
    if records.is_empty() {
        return format!("HEALTH RECORDS:\n{NO_RECORDS_LINE}");
    }

    let mut section = String::from("HEALTH RECORDS:");
    for record in &records.always {
        section.push_str(&format!("\n- [{}] {}", record.record_type, record.summary));
    }
    for record in &records.conditional {
        section.push_str(&format!("\n- [{}] {}", record.record_type, record.summary));
    }
    for record in &records.normal {
        section.push_str(&format!("\n- [{}] {}", record.record_type, record.summary));
    }
    if records.normal_overflow > 0 {
        section.push_str(&format!("\n- +{} more", records.normal_overflow));
    }
    section
}

fn forms_section(forms: &[String]) -> String {
    let mut section = String::from("AVAILABLE HEALTH FORMS:");
    for form in forms {
        section.push_str(&format!("\n- {form}"));
    }
    section
}
