use std::time::Duration;

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::analysis::{run_analysis, AnalysisOutcome, AnalysisRequest};

/// POST /api/analysis: health-topic analysis over a transcript, cached
/// by context hash.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisOutcome>, ApiError> {
    if let Some(remaining) = ctx.cooldown.remaining() {
        return Err(ApiError::RateLimited {
            retry_after: remaining.as_secs().max(1),
        });
    }

    let worker = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = worker.open_db()?;
        run_analysis(worker.llm.as_ref(), &conn, &request).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    match result {
        Ok(outcome) => Ok(Json(outcome)),
        Err(err) => {
            if let ApiError::RateLimited { retry_after } = &err {
                ctx.cooldown.engage(Duration::from_secs(*retry_after));
            }
            Err(err)
        }
    }
}
