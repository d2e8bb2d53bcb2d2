use std::time::Duration;

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::orchestrator::{ChatOutcome, ChatPipeline, ChatTurn};

/// POST /api/chat/send, one full chat turn.
///
/// Turns are refused outright while the rate-limit cooldown is engaged,
/// and a reply that arrives after a newer turn was dispatched for the
/// same client is dropped rather than delivered out of order.
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(turn): Json<ChatTurn>,
) -> Result<Json<ChatOutcome>, ApiError> {
    if let Some(remaining) = ctx.cooldown.remaining() {
        return Err(ApiError::RateLimited {
            retry_after: remaining.as_secs().max(1),
        });
    }

    let guard = ctx.turn_guards.for_account(&turn.user_id);
    let ticket = guard.issue(turn.conversation_id);

    let worker = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = worker.open_db()?;
        let pipeline = ChatPipeline::new(worker.llm.as_ref(), &conn);
        pipeline.run(&turn).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    match result {
        Ok(outcome) => {
            if !guard.accept(&ticket) {
                return Err(ApiError::Superseded);
            }
            Ok(Json(outcome))
        }
        Err(err) => {
            if let ApiError::RateLimited { retry_after } = &err {
                ctx.cooldown.engage(Duration::from_secs(*retry_after));
            }
            Err(err)
        }
    }
}
