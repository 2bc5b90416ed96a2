//! HTTP surface for ScopeForge: submission, polling, results, and template
//! upload, with permissive CORS for the browser frontend.

use axum::Router;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use log::{info, warn};
use scopeforge_core::types::{IntakeFields, ProjectDuration};
use scopeforge_core::{ForgeCoreError, Orchestrator};
use scopeforge_protocol::SessionId;
use scopeforge_steps::ObjectStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Workflow orchestrator facade.
    pub orchestrator: Arc<Orchestrator>,
    /// Template object store backing uploads.
    pub templates: Arc<dyn ObjectStore>,
}

/// Build the application router with permissive CORS on every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/submit-assessment", post(submit_assessment))
        .route("/agent-status/{session_id}", get(agent_status))
        .route("/results/{session_id}", get(results))
        .route("/upload-template", post(upload_template))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct SubmitAssessmentRequest {
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    requirements: Option<String>,
    #[serde(default)]
    duration: Option<ProjectDuration>,
    #[serde(default)]
    team_size: Option<u32>,
}

async fn submit_assessment(
    State(state): State<AppState>,
    Json(request): Json<SubmitAssessmentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let intake = IntakeFields {
        client_name: request.client_name.unwrap_or_default(),
        project_name: request.project_name.unwrap_or_default(),
        industry: request.industry.unwrap_or_default(),
        requirements: request.requirements.unwrap_or_default(),
        duration: request.duration.unwrap_or_default(),
        team_size: request.team_size.unwrap_or(4),
    };

    let receipt = state.orchestrator.submit(intake).await.map_err(|err| match err {
        // Validation failures happen before any session exists.
        ForgeCoreError::InvalidIntake(message) => {
            warn!("rejected assessment submission: {message}");
            error_response(StatusCode::BAD_REQUEST, message)
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;
    Ok(Json(receipt))
}

async fn agent_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let session_id = parse_session_id(&session_id)?;
    let session = state
        .orchestrator
        .session(session_id)
        .await
        .map_err(not_found_or_internal)?;
    Ok(Json(session))
}

async fn results(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let session_id = parse_session_id(&session_id)?;
    let artifacts = state
        .orchestrator
        .results(session_id)
        .await
        .map_err(|err| match err {
            ForgeCoreError::ArtifactsNotReady(_) => {
                error_response(StatusCode::NOT_FOUND, "No documents available yet")
            }
            other => not_found_or_internal(other),
        })?;
    Ok(Json(artifacts))
}

async fn upload_template(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error_response(StatusCode::BAD_REQUEST, format!("invalid multipart body: {err}"))
    })? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|err| {
            error_response(StatusCode::BAD_REQUEST, format!("invalid multipart body: {err}"))
        })?;
        let template_path = format!("templates/{file_name}");
        state
            .templates
            .put(&template_path, &bytes)
            .await
            .map_err(|err| {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            })?;
        info!(
            "stored uploaded template (path={}, bytes={})",
            template_path,
            bytes.len()
        );
        return Ok(Json(serde_json::json!({
            "message": "Template uploaded successfully",
            "template_path": template_path,
        })));
    }
    Err(error_response(StatusCode::BAD_REQUEST, "No file provided"))
}

fn parse_session_id(raw: &str) -> Result<SessionId, (StatusCode, Json<ErrorBody>)> {
    raw.parse()
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "Session not found"))
}

fn not_found_or_internal(err: ForgeCoreError) -> (StatusCode, Json<ErrorBody>) {
    match err {
        ForgeCoreError::UnknownSession(_) => {
            error_response(StatusCode::NOT_FOUND, "Session not found")
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use pretty_assertions::assert_eq;
    use scopeforge_config::ForgeConfig;
    use scopeforge_core::store::{MemorySessionStore, SessionStore};
    use scopeforge_protocol::SessionStatus;
    use scopeforge_steps::{
        LocalObjectStore, StaticOracle, StaticRateSheet, StepContext, builtin_step_registry,
    };
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn test_router() -> (Router, Arc<MemorySessionStore>) {
        let templates_dir = tempfile::tempdir().expect("templates dir");
        let artifacts_dir = tempfile::tempdir().expect("artifacts dir");
        let templates: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(templates_dir.path()).expect("templates"));
        let artifacts: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(artifacts_dir.path()).expect("artifacts"));
        // Leak the tempdirs so the stores stay valid for the test lifetime.
        std::mem::forget(templates_dir);
        std::mem::forget(artifacts_dir);

        let store = Arc::new(MemorySessionStore::new());
        let ctx = Arc::new(StepContext {
            store: store.clone(),
            oracle: Arc::new(StaticOracle::new(
                r#"{ "complexity_level": "Low", "project_scope": "CRM" }"#,
            )),
            templates: templates.clone(),
            artifacts,
            rates: Arc::new(StaticRateSheet::standard()),
            signed_url_ttl: Duration::from_secs(3600),
        });
        let registry = Arc::new(builtin_step_registry(ctx));
        let orchestrator = Arc::new(
            Orchestrator::new(ForgeConfig::default(), store.clone(), registry, None)
                .expect("orchestrator"),
        );
        (
            build_router(AppState {
                orchestrator,
                templates,
            }),
            store,
        )
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn submission_returns_pending_receipt() {
        let (router, store) = test_router().await;
        let request = Request::builder()
            .method("POST")
            .uri("/submit-assessment")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "client_name": "Acme", "requirements": "Build a CRM" }).to_string(),
            ))
            .expect("request");

        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("PENDING"));
        let session_id: Uuid = body["session_id"]
            .as_str()
            .expect("session_id")
            .parse()
            .expect("uuid");
        assert_eq!(
            body["poll_url"],
            json!(format!("/agent-status/{session_id}"))
        );

        // An immediate status poll must never report a finished session
        // for work that has not run yet.
        let session = store.get(session_id).await.expect("created");
        assert!(matches!(
            session.status,
            SessionStatus::Pending | SessionStatus::Processing | SessionStatus::Completed
        ));
    }

    #[tokio::test]
    async fn missing_requirements_is_rejected_before_any_session_exists() {
        let (router, _store) = test_router().await;
        let request = Request::builder()
            .method("POST")
            .uri("/submit-assessment")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "client_name": "Acme" }).to_string()))
            .expect("request");

        let response = router.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], json!("requirements is required"));

        // Polling a fabricated id afterwards is a 404, proving nothing was
        // created.
        let probe = Request::builder()
            .uri(format!("/agent-status/{}", Uuid::new_v4()))
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(probe).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_endpoint_serves_the_full_session_view() {
        let (router, store) = test_router().await;
        let session_id = store
            .create(IntakeFields {
                client_name: "Acme".to_string(),
                project_name: "CRM".to_string(),
                industry: "retail".to_string(),
                requirements: "Build a CRM".to_string(),
                duration: ProjectDuration::Medium,
                team_size: 4,
            })
            .await
            .expect("create");

        let request = Request::builder()
            .uri(format!("/agent-status/{session_id}"))
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("PENDING"));
        assert_eq!(body["client_name"], json!("Acme"));
        assert_eq!(body["progress"], json!(0));
        assert_eq!(body["document_urls"], json!([]));
    }

    #[tokio::test]
    async fn results_are_not_found_until_artifacts_exist() {
        let (router, store) = test_router().await;
        let session_id = store
            .create(IntakeFields {
                client_name: "Acme".to_string(),
                project_name: String::new(),
                industry: String::new(),
                requirements: "Build a CRM".to_string(),
                duration: ProjectDuration::Medium,
                team_size: 4,
            })
            .await
            .expect("create");

        let request = Request::builder()
            .uri(format!("/results/{session_id}"))
            .body(Body::empty())
            .expect("request");
        let response = router.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], json!("No documents available yet"));

        store
            .append_document_url(session_id, "file:///artifacts/presentation.pptx")
            .await
            .expect("append");
        store
            .append_document_url(session_id, "file:///artifacts/sow.docx")
            .await
            .expect("append");

        let request = Request::builder()
            .uri(format!("/results/{session_id}"))
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["powerpoint_url"],
            json!("file:///artifacts/presentation.pptx")
        );
        assert_eq!(body["sow_url"], json!("file:///artifacts/sow.docx"));
    }

    #[tokio::test]
    async fn template_upload_stores_under_the_templates_prefix() {
        let (router, _store) = test_router().await;
        let boundary = "scopeforge-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"standard-sow.docx\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             sow template body\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload-template")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request");

        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["template_path"],
            json!("templates/standard-sow.docx")
        );
    }

    #[tokio::test]
    async fn upload_without_a_file_part_is_rejected() {
        let (router, _store) = test_router().await;
        let boundary = "scopeforge-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"note\"\r\n\r\n\
             no file here\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload-template")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request");

        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], json!("No file provided"));
    }

    #[tokio::test]
    async fn preflight_requests_are_answered_permissively() {
        let (router, _store) = test_router().await;
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/submit-assessment")
            .header(header::ORIGIN, "https://frontend.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .expect("request");

        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }
}
