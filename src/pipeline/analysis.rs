use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::repository::{account, analysis_cache, patient};
use crate::db::DatabaseError;
use crate::models::enums::ConversationType;

use super::llm::ChatCompletion;
use super::prompt::analysis_system_prompt;
use super::tier::clamp_confidence;
use super::ChatError;

/// Request for a health-topic analysis over a conversation transcript.
/// The tier comes from the patient's owning account.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub patient_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub conversation_context: String,
    pub conversation_type: ConversationType,
    #[serde(default)]
    pub include_solutions: bool,
    #[serde(default)]
    pub analysis_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub topic: String,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// The model's analysis payload as stored in the cache. Confidence values
/// are clamped before storage, so cache hits replay tier-correct numbers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AnalysisPayload {
    #[serde(default)]
    topics: Vec<Topic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    solutions: Option<Vec<Solution>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    testing_recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub topics: Vec<Topic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solutions: Option<Vec<Solution>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testing_recommendations: Option<Vec<String>>,
    pub cached: bool,
}

/// Run (or replay) a health-topic analysis. The same transcript for the
/// same patient never pays for a second model call.
pub fn run_analysis<C: ChatCompletion + ?Sized>(
    llm: &C,
    conn: &Connection,
    request: &AnalysisRequest,
) -> Result<AnalysisOutcome, ChatError> {
    let context = request.conversation_context.trim();
    if context.is_empty() {
        return Err(ChatError::MissingInput);
    }

    let Some(patient) = patient::get_patient(conn, &request.patient_id)? else {
        return Err(ChatError::Database(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: request.patient_id.to_string(),
        }));
    };
    let settings = account::get_account_settings(conn, &patient.account_id)?;

    let hash = context_hash(&request.patient_id, request.conversation_type, context);

    if let Some(stored) = analysis_cache::get_cached_analysis(conn, &hash)? {
        match serde_json::from_str::<AnalysisPayload>(&stored) {
            Ok(payload) => {
                info!(patient_id = %request.patient_id, "analysis served from cache");
                return Ok(outcome_from(payload, true));
            }
            Err(e) => {
                // A corrupt cache entry is recomputed, not fatal.
                warn!(error = %e, "discarding unreadable cached analysis");
            }
        }
    }

    let system = analysis_system_prompt(request.conversation_type, request.include_solutions);
    let reply = llm.complete(&system, &[], context, None)?;

    let mut payload = parse_payload(&reply.text)?;
    for topic in &mut payload.topics {
        topic.confidence = clamp_confidence(settings.tier, topic.confidence);
    }
    if !request.include_solutions {
        payload.solutions = None;
    }

    let serialized = serde_json::to_string(&payload)
        .map_err(|e| ChatError::ResponseParsing(e.to_string()))?;
    analysis_cache::put_cached_analysis(conn, &hash, &request.patient_id, &serialized)?;

    Ok(outcome_from(payload, false))
}

fn outcome_from(payload: AnalysisPayload, cached: bool) -> AnalysisOutcome {
    AnalysisOutcome {
        topics: payload.topics,
        solutions: payload.solutions,
        testing_recommendations: payload.testing_recommendations,
        cached,
    }
}

fn context_hash(patient_id: &Uuid, conversation_type: ConversationType, context: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(patient_id.as_bytes());
    hasher.update(conversation_type.as_str().as_bytes());
    hasher.update(context.as_bytes());
    hex::encode(hasher.finalize())
}

/// The model is told to reply with JSON only, but chatter around the
/// object is tolerated: the parse retries on the outermost brace span.
fn parse_payload(text: &str) -> Result<AnalysisPayload, ChatError> {
    let trimmed = text.trim();
    if let Ok(payload) = serde_json::from_str::<AnalysisPayload>(trimmed) {
        return Ok(payload);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(payload) = serde_json::from_str::<AnalysisPayload>(&trimmed[start..=end]) {
                return Ok(payload);
            }
        }
    }

    Err(ChatError::ResponseParsing(
        "analysis reply was not valid JSON".into(),
    ))
}
