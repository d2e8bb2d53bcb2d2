use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::conversation;
use crate::models::{Conversation, Message};

#[derive(Deserialize)]
pub struct ListParams {
    pub account_id: String,
}

/// GET /api/conversations?account_id=..., newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let conn = ctx.open_db()?;
    let conversations = conversation::list_conversations(&conn, &params.account_id)?;
    Ok(Json(conversations))
}

/// GET /api/conversations/:id
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    let conn = ctx.open_db()?;
    match conversation::get_conversation(&conn, &id)? {
        Some(conv) => Ok(Json(conv)),
        None => Err(ApiError::NotFound(format!("Conversation {id} not found"))),
    }
}

/// GET /api/conversations/:id/messages, full transcript oldest first.
pub async fn messages(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let conn = ctx.open_db()?;
    if conversation::get_conversation(&conn, &id)?.is_none() {
        return Err(ApiError::NotFound(format!("Conversation {id} not found")));
    }
    let messages = conversation::get_messages_by_conversation(&conn, &id)?;
    Ok(Json(messages))
}
