use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::db::repository::{account, conversation, note, patient, record};
use crate::models::enums::MessageRole;
use crate::models::{Conversation, DiagnosisCandidate, Message, Patient};

use super::context::{assemble_system_prompt, ContextInputs};
use super::extract::extract_response;
use super::llm::{ChatCompletion, TokenUsage};
use super::merge::merge_candidates;
use super::tier::{clamp_confidence, partition_records, RecordPartitions};
use super::ChatError;

/// Structured health forms the assistant may suggest.
const HEALTH_FORMS: [&str; 3] = [
    "Symptom diary",
    "Medication tracker",
    "Visit preparation checklist",
];

/// How many stored messages ride along as conversation history.
const HISTORY_LIMIT: usize = 20;

/// Conversation titles are derived from the opening message.
const TITLE_MAX_CHARS: usize = 48;

/// One incoming chat request. The account is identified by `user_id`;
/// `conversation_history` is the client's view of the transcript, used
/// only when account memory is off (the database is authoritative
/// otherwise).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
    pub conversation_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub image_url: Option<String>,
}

/// One history message as the client sends it. Clients do not hold the
/// storage ids, so this carries only what the model needs.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Lift client history into transient `Message` values for the prompt
/// and the model call. These are never persisted.
fn history_from_client(entries: &[HistoryEntry], now: NaiveDateTime) -> Vec<Message> {
    entries
        .iter()
        .map(|entry| Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::nil(),
            role: entry.role,
            content: entry.content.clone(),
            image_url: entry.image_url.clone(),
            created_at: entry.created_at.unwrap_or(now),
        })
        .collect()
}

/// Everything the caller gets back from one completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    pub model: String,
    pub usage: TokenUsage,
    pub updated_diagnoses: Option<Vec<DiagnosisCandidate>>,
    pub conversation_id: Uuid,
}

/// One sequential chat turn: gather context, call the model, extract,
/// merge, persist.
pub struct ChatPipeline<'a, C: ChatCompletion + ?Sized> {
    pub llm: &'a C,
    pub conn: &'a Connection,
}

impl<'a, C: ChatCompletion + ?Sized> ChatPipeline<'a, C> {
    pub fn new(llm: &'a C, conn: &'a Connection) -> Self {
        Self { llm, conn }
    }

    pub fn run(&self, turn: &ChatTurn) -> Result<ChatOutcome, ChatError> {
        let message = turn.message.trim();
        if message.is_empty() {
            return Err(ChatError::MissingInput);
        }

        let settings = account::get_account_settings(self.conn, &turn.user_id)?;
        let patient = self.resolve_patient(turn)?;
        let conversation = self.resolve_conversation(turn)?;

        // With memory on, stored history is authoritative; otherwise the
        // client's own transcript rides along.
        let history = match (&conversation, settings.ai.memory_enabled) {
            (Some(conv), true) => {
                conversation::get_recent_messages(self.conn, &conv.id, HISTORY_LIMIT)?
            }
            _ => {
                let entries = &turn.conversation_history;
                let skip = entries.len().saturating_sub(HISTORY_LIMIT);
                history_from_client(&entries[skip..], Local::now().naive_local())
            }
        };

        let system_prompt = match &patient {
            Some(p) => {
                let records = record::get_record_summaries(self.conn, &p.id)?;
                let partitions = partition_records(settings.tier, records);
                let notes = note::get_active_notes(self.conn, &p.id)?;
                let forms: Vec<String> = HEALTH_FORMS.iter().map(|f| f.to_string()).collect();
                assemble_system_prompt(&ContextInputs {
                    patient: Some(p),
                    records: &partitions,
                    notes: &notes,
                    history: &history,
                    forms: &forms,
                    settings: &settings.ai,
                })
            }
            None => assemble_system_prompt(&ContextInputs {
                patient: None,
                records: &RecordPartitions::default(),
                notes: &[],
                history: &history,
                forms: &[],
                settings: &settings.ai,
            }),
        };

        let reply = self.llm.complete(
            &system_prompt,
            &history,
            message,
            turn.image_url.as_deref(),
        )?;

        let mut extraction = extract_response(&reply.text);
        for diagnosis in &mut extraction.diagnoses {
            diagnosis.confidence = clamp_confidence(settings.tier, diagnosis.confidence);
        }

        let updated_diagnoses = match (&patient, extraction.diagnoses.is_empty()) {
            (Some(p), false) => {
                let existing = patient::get_diagnosis_candidates(self.conn, &p.id)?;
                let merged = merge_candidates(
                    &existing,
                    &extraction.diagnoses,
                    Local::now().naive_local(),
                );
                patient::replace_diagnosis_candidates(self.conn, &p.id, &merged)?;
                info!(
                    patient_id = %p.id,
                    extracted = extraction.diagnoses.len(),
                    retained = merged.len(),
                    "merged diagnosis candidates"
                );
                Some(merged)
            }
            _ => None,
        };

        let conversation_id =
            self.persist_turn(turn, conversation, message, &extraction.clean_text);

        Ok(ChatOutcome {
            response: extraction.clean_text,
            model: reply.model,
            usage: reply.usage,
            updated_diagnoses,
            conversation_id,
        })
    }

    /// Look up the requested patient and confirm account ownership. A
    /// missing patient reports the same error as a foreign one.
    fn resolve_patient(&self, turn: &ChatTurn) -> Result<Option<Patient>, ChatError> {
        let Some(patient_id) = turn.patient_id else {
            return Ok(None);
        };
        match patient::get_patient(self.conn, &patient_id)? {
            Some(p) if p.account_id == turn.user_id => Ok(Some(p)),
            _ => Err(ChatError::PatientMismatch(patient_id)),
        }
    }

    fn resolve_conversation(&self, turn: &ChatTurn) -> Result<Option<Conversation>, ChatError> {
        let Some(conversation_id) = turn.conversation_id else {
            return Ok(None);
        };
        match conversation::get_conversation(self.conn, &conversation_id)? {
            Some(conv) if conv.account_id == turn.user_id => Ok(Some(conv)),
            _ => Err(ChatError::ConversationNotFound(conversation_id)),
        }
    }

    /// Persist the turn: create the conversation on first contact, then
    /// append the user and assistant messages. Persistence failures are
    /// logged and swallowed; the user already has their answer, and the
    /// visible conversation is allowed to diverge from what is stored.
    fn persist_turn(
        &self,
        turn: &ChatTurn,
        conversation: Option<Conversation>,
        user_message: &str,
        ai_response: &str,
    ) -> Uuid {
        let now = Local::now().naive_local();

        let conversation_id = match conversation {
            Some(conv) => conv.id,
            None => {
                let conv = Conversation {
                    id: Uuid::new_v4(),
                    account_id: turn.user_id.clone(),
                    patient_id: turn.patient_id,
                    title: Some(derive_title(user_message)),
                    started_at: now,
                };
                if let Err(e) = conversation::insert_conversation(self.conn, &conv) {
                    error!(error = %e, "failed to create conversation");
                    return conv.id;
                }
                conv.id
            }
        };

        let user_msg = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::User,
            content: user_message.to_string(),
            image_url: turn.image_url.clone(),
            created_at: now,
        };
        if let Err(e) = conversation::insert_message(self.conn, &user_msg) {
            error!(error = %e, conversation_id = %conversation_id, "failed to persist user message");
        }

        let ai_msg = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::Ai,
            content: ai_response.to_string(),
            image_url: None,
            created_at: now,
        };
        if let Err(e) = conversation::insert_message(self.conn, &ai_msg) {
            error!(error = %e, conversation_id = %conversation_id, "failed to persist assistant message");
        }

        conversation_id
    }
}

fn derive_title(message: &str) -> String {
    let mut title: String = message.chars().take(TITLE_MAX_CHARS).collect();
    if message.chars().count() > TITLE_MAX_CHARS {
        title.push('…');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::account::upsert_account;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Tier;
    use crate::models::AccountSettings;
    use crate::pipeline::llm::testing::MockChatClient;

    const PAYLOAD_REPLY: &str = r#"{"diagnoses":[{"diagnosis":"Tension headache","confidence":0.6,"reasoning":"recurring head pain"}]} Worth discussing with your doctor."#;

    fn seeded_conn(tier: Tier) -> Connection {
        let conn = open_memory_database().unwrap();
        let settings = AccountSettings {
            tier,
            ..Default::default()
        };
        upsert_account(&conn, "acct-1", &settings).unwrap();
        conn
    }

    fn seeded_patient(conn: &Connection) -> Patient {
        let p = Patient {
            id: Uuid::new_v4(),
            account_id: "acct-1".into(),
            name: "Maple".into(),
            birth_date: None,
            gender: None,
            species: Some("dog".into()),
            created_at: Local::now().naive_local(),
        };
        patient::insert_patient(conn, &p).unwrap();
        p
    }

    fn turn(message: &str) -> ChatTurn {
        ChatTurn {
            user_id: "acct-1".into(),
            message: message.into(),
            conversation_history: Vec::new(),
            conversation_id: None,
            patient_id: None,
            image_url: None,
        }
    }

    #[test]
    fn empty_message_is_rejected() {
        let conn = seeded_conn(Tier::Free);
        let mock = MockChatClient::replying("hi");
        let pipeline = ChatPipeline::new(&mock, &conn);
        let result = pipeline.run(&turn("   "));
        assert!(matches!(result, Err(ChatError::MissingInput)));
    }

    #[test]
    fn client_history_needs_no_storage_ids() {
        let conn = seeded_conn(Tier::Free);
        let mock = MockChatClient::replying("How long has it lasted?");
        let pipeline = ChatPipeline::new(&mock, &conn);

        let t: ChatTurn = serde_json::from_str(
            r#"{
                "user_id": "acct-1",
                "message": "still hurting",
                "conversation_history": [
                    {"type": "user", "content": "my head hurts", "created_at": "2026-08-20T09:30:00"},
                    {"type": "ai", "content": "Tell me more."}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(t.conversation_history.len(), 2);
        assert_eq!(t.conversation_history[0].role, MessageRole::User);

        let outcome = pipeline.run(&t).unwrap();
        assert_eq!(outcome.response, "How long has it lasted?");
    }

    #[test]
    fn turn_without_patient_creates_conversation_and_persists_messages() {
        let conn = seeded_conn(Tier::Free);
        let mock = MockChatClient::replying("Drink some water and rest.");
        let pipeline = ChatPipeline::new(&mock, &conn);

        let outcome = pipeline.run(&turn("I have a mild headache")).unwrap();
        assert_eq!(outcome.response, "Drink some water and rest.");
        assert!(outcome.updated_diagnoses.is_none());

        let messages =
            conversation::get_messages_by_conversation(&conn, &outcome.conversation_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Ai);
        assert_eq!(messages[1].content, "Drink some water and rest.");

        let conv = conversation::get_conversation(&conn, &outcome.conversation_id)
            .unwrap()
            .unwrap();
        assert_eq!(conv.title.as_deref(), Some("I have a mild headache"));
    }

    #[test]
    fn payload_is_stripped_and_merged_for_patient() {
        let conn = seeded_conn(Tier::Pro);
        let p = seeded_patient(&conn);
        let mock = MockChatClient::replying(PAYLOAD_REPLY);
        let pipeline = ChatPipeline::new(&mock, &conn);

        let mut t = turn("My head keeps hurting");
        t.patient_id = Some(p.id);
        let outcome = pipeline.run(&t).unwrap();

        assert_eq!(outcome.response, "Worth discussing with your doctor.");
        let updated = outcome.updated_diagnoses.unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].name, "Tension headache");

        let stored = patient::get_diagnosis_candidates(&conn, &p.id).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn extracted_confidence_clamped_to_tier_band() {
        let conn = seeded_conn(Tier::Free);
        let p = seeded_patient(&conn);
        let mock = MockChatClient::replying(PAYLOAD_REPLY);
        let pipeline = ChatPipeline::new(&mock, &conn);

        let mut t = turn("My head keeps hurting");
        t.patient_id = Some(p.id);
        let outcome = pipeline.run(&t).unwrap();

        // Free band tops out at 0.40; the model said 0.6.
        let updated = outcome.updated_diagnoses.unwrap();
        assert!((updated[0].confidence - 0.40).abs() < f32::EPSILON);
    }

    #[test]
    fn quiet_turn_leaves_stored_candidates_untouched() {
        let conn = seeded_conn(Tier::Pro);
        let p = seeded_patient(&conn);
        patient::replace_diagnosis_candidates(
            &conn,
            &p.id,
            &[DiagnosisCandidate {
                name: "Migraine".into(),
                confidence: 0.5,
                reasoning: "earlier chat".into(),
                updated_at: Local::now().naive_local(),
            }],
        )
        .unwrap();

        let mock = MockChatClient::replying("Sounds like you are doing better.");
        let pipeline = ChatPipeline::new(&mock, &conn);
        let mut t = turn("Feeling fine today");
        t.patient_id = Some(p.id);
        let outcome = pipeline.run(&t).unwrap();

        assert!(outcome.updated_diagnoses.is_none());
        let stored = patient::get_diagnosis_candidates(&conn, &p.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Migraine");
    }

    #[test]
    fn foreign_patient_is_rejected() {
        let conn = seeded_conn(Tier::Free);
        upsert_account(&conn, "acct-2", &AccountSettings::default()).unwrap();
        let foreign = Patient {
            id: Uuid::new_v4(),
            account_id: "acct-2".into(),
            name: "Other".into(),
            birth_date: None,
            gender: None,
            species: None,
            created_at: Local::now().naive_local(),
        };
        patient::insert_patient(&conn, &foreign).unwrap();

        let mock = MockChatClient::replying("hi");
        let pipeline = ChatPipeline::new(&mock, &conn);
        let mut t = turn("hello");
        t.patient_id = Some(foreign.id);
        let result = pipeline.run(&t);
        assert!(matches!(result, Err(ChatError::PatientMismatch(_))));
    }

    #[test]
    fn unknown_conversation_is_rejected() {
        let conn = seeded_conn(Tier::Free);
        let mock = MockChatClient::replying("hi");
        let pipeline = ChatPipeline::new(&mock, &conn);
        let mut t = turn("hello");
        t.conversation_id = Some(Uuid::new_v4());
        let result = pipeline.run(&t);
        assert!(matches!(result, Err(ChatError::ConversationNotFound(_))));
    }

    #[test]
    fn followup_turn_appends_to_existing_conversation() {
        let conn = seeded_conn(Tier::Free);
        let mock = MockChatClient::replying("Good to hear.");
        let pipeline = ChatPipeline::new(&mock, &conn);

        let first = pipeline.run(&turn("I have a headache")).unwrap();
        let mut t = turn("It is better now");
        t.conversation_id = Some(first.conversation_id);
        let second = pipeline.run(&t).unwrap();

        assert_eq!(second.conversation_id, first.conversation_id);
        let messages =
            conversation::get_messages_by_conversation(&conn, &first.conversation_id).unwrap();
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn patient_context_flows_into_system_prompt() {
        let conn = seeded_conn(Tier::Pro);
        let p = seeded_patient(&conn);
        let mock = MockChatClient::replying("ok");
        let pipeline = ChatPipeline::new(&mock, &conn);

        let mut t = turn("hello");
        t.patient_id = Some(p.id);
        pipeline.run(&t).unwrap();

        let prompts = mock.seen_prompts.lock().unwrap();
        assert!(prompts[0].contains("Maple"));
        assert!(prompts[0].contains("No health records available"));
    }

    #[test]
    fn memory_enabled_feeds_stored_history_into_prompt() {
        let conn = open_memory_database().unwrap();
        let settings = AccountSettings {
            tier: Tier::Free,
            ai: crate::models::AiSettings {
                memory_enabled: true,
                ..Default::default()
            },
        };
        upsert_account(&conn, "acct-1", &settings).unwrap();

        let mock = MockChatClient::replying("Tell me more.");
        let pipeline = ChatPipeline::new(&mock, &conn);
        let first = pipeline.run(&turn("my ears have been ringing")).unwrap();

        let mut followup = turn("it gets worse at night");
        followup.conversation_id = Some(first.conversation_id);
        pipeline.run(&followup).unwrap();

        let prompts = mock.seen_prompts.lock().unwrap();
        assert!(!prompts[0].contains("RECENT CONVERSATION"));
        assert!(prompts[1].contains("RECENT CONVERSATION"));
        assert!(prompts[1].contains("my ears have been ringing"));
    }

    #[test]
    fn long_first_message_gets_truncated_title() {
        let conn = seeded_conn(Tier::Free);
        let mock = MockChatClient::replying("ok");
        let pipeline = ChatPipeline::new(&mock, &conn);

        let long = "a".repeat(200);
        let outcome = pipeline.run(&turn(&long)).unwrap();
        let conv = conversation::get_conversation(&conn, &outcome.conversation_id)
            .unwrap()
            .unwrap();
        let title = conv.title.unwrap();
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn upstream_failure_propagates() {
        let conn = seeded_conn(Tier::Free);
        let mock = MockChatClient::failing(ChatError::Upstream {
            status: 500,
            body: "boom".into(),
        });
        let pipeline = ChatPipeline::new(&mock, &conn);
        let result = pipeline.run(&turn("hello"));
        assert!(matches!(result, Err(ChatError::Upstream { status: 500, .. })));
    }
}
