use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MessageRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub account_id: String,
    pub patient_id: Option<Uuid>,
    pub title: Option<String>,
    pub started_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
}
