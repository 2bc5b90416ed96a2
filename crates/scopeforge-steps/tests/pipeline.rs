//! End-to-end direct pipeline tests with the real leaf steps.

use pretty_assertions::assert_eq;
use scopeforge_config::ForgeConfig;
use scopeforge_core::store::{MemorySessionStore, SessionStore};
use scopeforge_core::types::{IntakeFields, ProjectDuration};
use scopeforge_core::{Orchestrator, StepInvoker, WorkflowRunner};
use scopeforge_protocol::{SessionStatus, StepError, StepName};
use scopeforge_steps::{
    LocalObjectStore, ObjectStore, StaticOracle, StaticRateSheet, StepContext,
    builtin_step_registry,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    store: Arc<MemorySessionStore>,
    ctx: Arc<StepContext>,
    _dirs: (TempDir, TempDir),
}

async fn fixture(oracle_response: &str) -> Fixture {
    let templates_dir = tempfile::tempdir().expect("templates dir");
    let artifacts_dir = tempfile::tempdir().expect("artifacts dir");
    let templates = Arc::new(LocalObjectStore::new(templates_dir.path()).expect("templates"));
    let artifacts = Arc::new(LocalObjectStore::new(artifacts_dir.path()).expect("artifacts"));

    for (key, body) in [
        ("sow-templates/standard-sow.docx", "standard sow template"),
        ("sow-templates/enterprise-sow.docx", "enterprise sow template"),
        ("powerpoint-templates/standard.pptx", "standard deck template"),
        ("powerpoint-templates/detailed.pptx", "detailed deck template"),
    ] {
        templates.put(key, body.as_bytes()).await.expect("seed template");
    }

    let store = Arc::new(MemorySessionStore::new());
    let ctx = Arc::new(StepContext {
        store: store.clone(),
        oracle: Arc::new(StaticOracle::new(oracle_response)),
        templates,
        artifacts,
        rates: Arc::new(StaticRateSheet::standard()),
        signed_url_ttl: Duration::from_secs(3600),
    });
    Fixture {
        store,
        ctx,
        _dirs: (templates_dir, artifacts_dir),
    }
}

fn intake() -> IntakeFields {
    IntakeFields {
        client_name: "Acme".to_string(),
        project_name: "CRM Rebuild".to_string(),
        industry: "retail".to_string(),
        requirements: "Replace the legacy CRM with a web app".to_string(),
        duration: ProjectDuration::Medium,
        team_size: 4,
    }
}

const ANALYSIS_JSON: &str = r#"{
    "project_scope": "Replace the legacy CRM",
    "deliverables": ["Web app", "Data migration"],
    "technical_requirements": ["Rust backend"],
    "timeline_estimate": "12 weeks",
    "complexity_level": "Low",
    "team_skills_needed": ["Backend", "Frontend"],
    "key_risks": ["Scope changes"]
}"#;

/// The full direct chain: analysis, cost, template selection, and both
/// renderers, ending in a completed session with two artifacts.
#[tokio::test]
async fn direct_pipeline_produces_both_documents() {
    let fixture = fixture(ANALYSIS_JSON).await;
    let registry = Arc::new(builtin_step_registry(fixture.ctx.clone()));
    let orchestrator = Orchestrator::new(
        ForgeConfig::default(),
        fixture.store.clone(),
        registry,
        None,
    )
    .expect("orchestrator");

    let session_id = fixture.store.create(intake()).await.expect("create");
    orchestrator.engine().run_workflow(session_id, intake()).await;

    let session = fixture.store.get(session_id).await.expect("get");
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.progress, 100);
    assert_eq!(session.document_urls.len(), 2);

    // Requirements carry the structured analysis plus the raw input.
    let requirements = session.requirements_data.expect("requirements_data");
    assert_eq!(requirements["complexity_level"], json!("Low"));
    assert_eq!(
        requirements["raw_requirements"],
        json!("Replace the legacy CRM with a web app")
    );

    // 4 people x 40 h x 12 weeks = 1920 role-share hours against the
    // standard sheet comes to 244,800 USD.
    let cost = session.cost_data.expect("cost_data");
    assert_eq!(cost["total_cost"], json!(244800.0));
    assert_eq!(cost["duration_weeks"], json!(12));
    assert_eq!(cost["hours_per_week"], json!(160.0));
    assert_eq!(cost["breakdown"]["dev"]["hours"], json!(672.0));
    assert_eq!(cost["breakdown"]["dev"]["subtotal"], json!(67200.0));

    // That total clears the premium threshold, so the premium variants win
    // even though the analysis called the project low-complexity.
    let selection = session.template_selection.expect("template_selection");
    assert_eq!(selection["sow"]["name"], json!("enterprise-sow"));
    assert_eq!(selection["powerpoint"]["name"], json!("detailed"));

    let results = orchestrator.results(session_id).await.expect("results");
    assert!(results.powerpoint_url.expect("deck url").contains("presentation.pptx"));
    assert!(results.sow_url.expect("sow url").contains("sow.docx"));
    assert!(results.cost_data.is_some());
}

/// Artifact bodies contain the rendered proposal content on top of the
/// selected template.
#[tokio::test]
async fn rendered_artifacts_carry_proposal_content() {
    let fixture = fixture(ANALYSIS_JSON).await;
    let registry = Arc::new(builtin_step_registry(fixture.ctx.clone()));
    let orchestrator = Orchestrator::new(
        ForgeConfig::default(),
        fixture.store.clone(),
        registry,
        None,
    )
    .expect("orchestrator");

    let session_id = fixture.store.create(intake()).await.expect("create");
    orchestrator.engine().run_workflow(session_id, intake()).await;

    let deck = fixture
        .ctx
        .artifacts
        .get(&format!("{session_id}/presentation.pptx"))
        .await
        .expect("deck artifact");
    let deck = String::from_utf8(deck).expect("utf8");
    assert!(deck.contains("detailed deck template"));
    assert!(deck.contains("# CRM Rebuild"));
    assert!(deck.contains("Replace the legacy CRM"));

    let sow = fixture
        .ctx
        .artifacts
        .get(&format!("{session_id}/sow.docx"))
        .await
        .expect("sow artifact");
    let sow = String::from_utf8(sow).expect("utf8");
    assert!(sow.contains("enterprise sow template"));
    assert!(sow.contains("Prepared for Acme"));
    assert!(sow.contains("Total: $244800.00 USD"));
}

/// An undecodable oracle response falls back to the neutral analysis and the
/// pipeline still completes.
#[tokio::test]
async fn prose_oracle_response_falls_back_and_completes() {
    let fixture = fixture("I could not produce JSON today, sorry.").await;
    let registry = Arc::new(builtin_step_registry(fixture.ctx.clone()));
    let orchestrator = Orchestrator::new(
        ForgeConfig::default(),
        fixture.store.clone(),
        registry,
        None,
    )
    .expect("orchestrator");

    let session_id = fixture.store.create(intake()).await.expect("create");
    orchestrator.engine().run_workflow(session_id, intake()).await;

    let session = fixture.store.get(session_id).await.expect("get");
    assert_eq!(session.status, SessionStatus::Completed);
    let requirements = session.requirements_data.expect("requirements_data");
    assert_eq!(requirements["complexity_level"], json!("Medium"));
    assert_eq!(requirements["project_scope"], json!("Requirements analysis completed"));
    assert_eq!(
        requirements["raw_requirements"],
        json!("Replace the legacy CRM with a web app")
    );
}

/// A costing call for a session that does not exist downstream is the
/// step's own business failure.
#[tokio::test]
async fn cost_step_reports_missing_session() {
    let fixture = fixture(ANALYSIS_JSON).await;
    let registry = builtin_step_registry(fixture.ctx.clone());

    let missing = uuid::Uuid::new_v4();
    let err = registry
        .invoke(
            StepName::CalculateCost,
            json!({ "session_id": missing.to_string() }),
        )
        .await
        .expect_err("missing session");
    match err {
        StepError::Internal(message) => {
            assert_eq!(message, format!("session not found: {missing}"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// A payload without a session id is rejected as invalid, not retried.
#[tokio::test]
async fn steps_reject_payloads_without_a_session_id() {
    let fixture = fixture(ANALYSIS_JSON).await;
    let registry = builtin_step_registry(fixture.ctx.clone());

    let err = registry
        .invoke(StepName::AnalyzeRequirements, json!({ "requirements": "x" }))
        .await
        .expect_err("invalid payload");
    assert!(matches!(err, StepError::InvalidPayload(_)));
    assert_eq!(err.is_retryable(), false);
}

/// Short engagements use the four-week mapping.
#[tokio::test]
async fn short_duration_uses_four_weeks() {
    let fixture = fixture(ANALYSIS_JSON).await;
    let registry = builtin_step_registry(fixture.ctx.clone());

    let mut short_intake = intake();
    short_intake.duration = ProjectDuration::Short;
    short_intake.team_size = 2;
    let session_id = fixture.store.create(short_intake).await.expect("create");

    let cost = registry
        .invoke(
            StepName::CalculateCost,
            json!({ "session_id": session_id.to_string() }),
        )
        .await
        .expect("cost");
    assert_eq!(cost["duration_weeks"], json!(4));
    assert_eq!(cost["hours_per_week"], json!(80.0));
    // 2 people x 40 h x 4 weeks = 320 share-weighted hours -> 40,800 USD.
    assert_eq!(cost["total_cost"], json!(40800.0));
}
