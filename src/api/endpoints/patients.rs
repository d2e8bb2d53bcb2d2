use axum::extract::{Path, State};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::patient;
use crate::models::{DiagnosisCandidate, Patient};
use crate::report::build_patient_report;

#[derive(Deserialize)]
pub struct NewPatient {
    pub account_id: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub species: Option<String>,
}

/// POST /api/patients
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewPatient>,
) -> Result<Json<Patient>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Patient name is required".into()));
    }

    let conn = ctx.open_db()?;
    let p = Patient {
        id: Uuid::new_v4(),
        account_id: body.account_id,
        name: body.name.trim().to_string(),
        birth_date: body.birth_date,
        gender: body.gender,
        species: body.species,
        created_at: Local::now().naive_local(),
    };
    patient::insert_patient(&conn, &p)?;
    Ok(Json(p))
}

/// GET /api/patients/:id
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.open_db()?;
    match patient::get_patient(&conn, &id)? {
        Some(p) => Ok(Json(p)),
        None => Err(ApiError::NotFound(format!("Patient {id} not found"))),
    }
}

/// GET /api/patients/:id/diagnoses, stored candidates highest first.
pub async fn diagnoses(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DiagnosisCandidate>>, ApiError> {
    let conn = ctx.open_db()?;
    if patient::get_patient(&conn, &id)?.is_none() {
        return Err(ApiError::NotFound(format!("Patient {id} not found")));
    }
    let candidates = patient::get_diagnosis_candidates(&conn, &id)?;
    Ok(Json(candidates))
}

/// GET /api/patients/:id/report, rendered as Markdown.
pub async fn report(State(ctx): State<ApiContext>, Path(id): Path<Uuid>) -> Result<String, ApiError> {
    let conn = ctx.open_db()?;
    Ok(build_patient_report(&conn, &id)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Local;
    use tower::ServiceExt;

    use super::*;
    use crate::api::router::api_router;
    use crate::db::repository::account::upsert_account;
    use crate::db::repository::patient::{insert_patient, replace_diagnosis_candidates};
    use crate::db::sqlite::open_database;
    use crate::models::AccountSettings;
    use crate::pipeline::llm::testing::MockChatClient;

    fn test_context() -> (tempfile::TempDir, ApiContext, Patient) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let conn = open_database(&db_path).unwrap();
        upsert_account(&conn, "acct-1", &AccountSettings::default()).unwrap();
        let p = Patient {
            id: Uuid::new_v4(),
            account_id: "acct-1".into(),
            name: "Maple".into(),
            birth_date: None,
            gender: None,
            species: Some("dog".into()),
            created_at: Local::now().naive_local(),
        };
        insert_patient(&conn, &p).unwrap();
        replace_diagnosis_candidates(
            &conn,
            &p.id,
            &[DiagnosisCandidate {
                name: "Seasonal allergy".into(),
                confidence: 0.35,
                reasoning: "sneezing after walks".into(),
                updated_at: Local::now().naive_local(),
            }],
        )
        .unwrap();
        drop(conn);
        let ctx = ApiContext::new(db_path, Arc::new(MockChatClient::replying("ok")));
        (dir, ctx, p)
    }

    #[tokio::test]
    async fn get_patient_and_diagnoses() {
        let (_dir, ctx, p) = test_context();
        let app = api_router(ctx);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/patients/{}", p.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), 64 * 1024).await.unwrap())
                .unwrap();
        assert_eq!(json["name"], "Maple");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/patients/{}/diagnoses", p.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), 64 * 1024).await.unwrap())
                .unwrap();
        assert_eq!(json[0]["name"], "Seasonal allergy");
    }

    #[tokio::test]
    async fn report_is_rendered_as_markdown() {
        let (_dir, ctx, p) = test_context();
        let app = api_router(ctx);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/patients/{}/report", p.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("# Health Report: Maple"));
        assert!(text.contains("Seasonal allergy"));
    }

    #[tokio::test]
    async fn create_patient_round_trip() {
        let (_dir, ctx, _p) = test_context();
        let app = api_router(ctx);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/patients")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"account_id":"acct-1","name":"Noah","birth_date":"1990-04-02"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), 64 * 1024).await.unwrap())
                .unwrap();
        assert_eq!(json["name"], "Noah");
        let id = json["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/patients/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn blank_patient_name_returns_400() {
        let (_dir, ctx, _p) = test_context();
        let app = api_router(ctx);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/patients")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"account_id":"acct-1","name":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_patient_returns_404() {
        let (_dir, ctx, _p) = test_context();
        let app = api_router(ctx);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/patients/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
