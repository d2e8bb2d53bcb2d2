pub mod analysis;
pub mod context;
pub mod extract;
pub mod llm;
pub mod merge;
pub mod orchestrator;
pub mod prompt;
pub mod tier;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message is required")]
    MissingInput,

    #[error("Upstream model call failed with status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Rate or token limit reached, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Could not reach the model endpoint: {0}")]
    Connection(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Patient {0} does not belong to this account")]
    PatientMismatch(Uuid),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(Uuid),
}

impl ChatError {
    /// True when the upstream signalled rate/token exhaustion: either an
    /// explicit 429 or a body mentioning the token limit.
    pub fn is_rate_exhaustion(&self) -> bool {
        match self {
            ChatError::RateLimited { .. } => true,
            ChatError::Upstream { status, body } => {
                *status == 429 || body.to_lowercase().contains("token limit")
            }
            _ => false,
        }
    }
}

/// Plain-language, same-turn message for the user. The classification is
/// a substring heuristic over the error text: network/timeout, rate limit,
/// and unauthorized each get a tailored apology; everything else a generic
/// one. Never leaks a stack trace or status code prose.
pub fn user_facing_message(err: &ChatError) -> String {
    let detail = err.to_string().to_lowercase();

    if err.is_rate_exhaustion() || detail.contains("rate limit") {
        return "I'm getting a lot of questions right now. Please wait a moment \
                and try sending your message again."
            .into();
    }
    if detail.contains("timed out")
        || detail.contains("timeout")
        || detail.contains("could not reach")
        || detail.contains("connection")
        || detail.contains("network")
    {
        return "I'm having trouble reaching my knowledge service. Please check \
                your connection and try again."
            .into();
    }
    if detail.contains("unauthorized") || detail.contains("api key") || detail.contains("401") {
        return "Something is wrong with my configuration. Please try again later, \
                and contact support if this keeps happening."
            .into();
    }

    "I'm sorry, something went wrong while preparing your answer. Please try \
     sending your message again."
        .into()
}
