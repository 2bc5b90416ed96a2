//! Workflow orchestration: session lifecycle state machine, strategy
//! execution, terminal reconciliation, and the client-facing facade.

mod delegated;
mod direct;
mod dispatch;
mod strategy;
mod stream;

pub use delegated::DelegatedStrategy;
pub use direct::DirectStrategy;
pub use dispatch::{TokioDispatcher, WorkflowDispatcher, WorkflowRunner};
pub use strategy::{WorkflowOutcome, WorkflowStrategy};
pub use stream::{EventStreamReader, StreamOutcome};

use crate::error::ForgeCoreError;
use crate::invoker::StepInvoker;
use crate::planner::Planner;
use crate::store::{SessionStore, SessionUpdate};
use crate::types::{IntakeFields, ProposalArtifacts, Session, SubmissionReceipt};
use async_trait::async_trait;
use log::{error, info, warn};
use scopeforge_config::{ForgeConfig, WorkflowStrategyKind};
use scopeforge_protocol::{SessionId, SessionStatus};
use std::sync::Arc;
use std::time::Duration;

/// Owns one workflow execution from `PROCESSING` to a terminal state.
///
/// The engine wraps the configured strategy with the pieces every run needs:
/// the fail-fast configuration check, the hang watchdog, the top-level error
/// capture, and the reconciliation of reported success against artifacts
/// actually produced.
pub struct WorkflowEngine {
    store: Arc<dyn SessionStore>,
    strategy: Option<Arc<dyn WorkflowStrategy>>,
    configuration_error: Option<String>,
    max_duration: Duration,
}

impl WorkflowEngine {
    /// Create an engine around a ready strategy.
    pub fn new(
        store: Arc<dyn SessionStore>,
        strategy: Arc<dyn WorkflowStrategy>,
        max_duration: Duration,
    ) -> Self {
        Self {
            store,
            strategy: Some(strategy),
            configuration_error: None,
            max_duration,
        }
    }

    /// Create an engine that terminates every run with a provisioning error.
    pub fn misconfigured(
        store: Arc<dyn SessionStore>,
        message: impl Into<String>,
        max_duration: Duration,
    ) -> Self {
        Self {
            store,
            strategy: None,
            configuration_error: Some(message.into()),
            max_duration,
        }
    }

    async fn finish(&self, session_id: SessionId, outcome: WorkflowOutcome) {
        match outcome {
            WorkflowOutcome::Completed => {
                // Never trust the run's own report of success; only artifact
                // state counts.
                match self.store.get(session_id).await {
                    Ok(session) if session.document_urls.is_empty() => {
                        warn!(
                            "run reported success without artifacts (session_id={})",
                            session_id
                        );
                        self.record(
                            session_id,
                            SessionUpdate::failed(
                                SessionStatus::Error,
                                "no documents were generated",
                            ),
                        )
                        .await;
                    }
                    Ok(session) => {
                        info!(
                            "workflow completed (session_id={}, documents={})",
                            session_id,
                            session.document_urls.len()
                        );
                        self.record(
                            session_id,
                            SessionUpdate::stage("Completed", 100)
                                .with_status(SessionStatus::Completed),
                        )
                        .await;
                    }
                    Err(err) => {
                        error!(
                            "cannot reconcile workflow result (session_id={}, error={})",
                            session_id, err
                        );
                    }
                }
            }
            WorkflowOutcome::AwaitingInput => {
                info!("workflow awaiting client input (session_id={})", session_id);
                self.record(
                    session_id,
                    SessionUpdate {
                        status: Some(SessionStatus::AwaitingInput),
                        current_stage: Some("Awaiting client input".to_string()),
                        ..SessionUpdate::default()
                    },
                )
                .await;
            }
            WorkflowOutcome::Failed { message } => {
                error!(
                    "workflow failed (session_id={}, error={})",
                    session_id, message
                );
                self.record(
                    session_id,
                    SessionUpdate::failed(SessionStatus::Error, message),
                )
                .await;
            }
        }
    }

    /// Write a state transition; a session that cannot be updated can only be
    /// logged at this point, the triggering request is long gone.
    async fn record(&self, session_id: SessionId, update: SessionUpdate) {
        if let Err(err) = self.store.update(session_id, update).await {
            error!(
                "failed to record workflow state (session_id={}, error={})",
                session_id, err
            );
        }
    }
}

#[async_trait]
impl WorkflowRunner for WorkflowEngine {
    async fn run_workflow(&self, session_id: SessionId, intake: IntakeFields) {
        if let Some(message) = &self.configuration_error {
            warn!(
                "failing fast on configuration error (session_id={}, error={})",
                session_id, message
            );
            self.record(
                session_id,
                SessionUpdate::failed(SessionStatus::ConfigurationError, message.clone()),
            )
            .await;
            return;
        }
        let Some(strategy) = self.strategy.clone() else {
            self.record(
                session_id,
                SessionUpdate::failed(SessionStatus::Error, "no workflow strategy configured"),
            )
            .await;
            return;
        };

        info!(
            "starting workflow (session_id={}, strategy={})",
            session_id,
            strategy.name()
        );
        self.record(
            session_id,
            SessionUpdate::stage("Starting workflow", 10).with_status(SessionStatus::Processing),
        )
        .await;

        let run = strategy.run(session_id, &intake);
        let outcome = match tokio::time::timeout(self.max_duration, run).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => WorkflowOutcome::Failed {
                message: err.to_string(),
            },
            Err(_) => WorkflowOutcome::Failed {
                message: format!("workflow timed out after {:?}", self.max_duration),
            },
        };
        self.finish(session_id, outcome).await;
    }
}

/// Main orchestration facade: creates sessions, schedules workflows, and
/// serves session views and results.
pub struct Orchestrator {
    config: Arc<ForgeConfig>,
    store: Arc<dyn SessionStore>,
    engine: Arc<WorkflowEngine>,
    dispatcher: Arc<dyn WorkflowDispatcher>,
}

impl Orchestrator {
    /// Construct an orchestrator with the strategy picked from configuration.
    ///
    /// `planner` is required only for a provisioned delegated configuration;
    /// an unprovisioned delegated configuration still constructs, but every
    /// session it accepts terminates in `CONFIGURATION_ERROR`.
    pub fn new(
        config: ForgeConfig,
        store: Arc<dyn SessionStore>,
        invoker: Arc<dyn StepInvoker>,
        planner: Option<Arc<dyn Planner>>,
    ) -> Result<Self, ForgeCoreError> {
        let config = Arc::new(config);
        let max_duration = Duration::from_secs(config.workflow.max_workflow_secs);
        info!(
            "initializing orchestrator (strategy={:?})",
            config.workflow.strategy
        );

        let engine = match config.workflow.strategy {
            WorkflowStrategyKind::Direct => {
                let strategy = Arc::new(DirectStrategy::new(store.clone(), invoker));
                WorkflowEngine::new(store.clone(), strategy, max_duration)
            }
            WorkflowStrategyKind::Delegated if !config.planner.is_provisioned() => {
                warn!("delegated planner is not provisioned; sessions will fail fast");
                WorkflowEngine::misconfigured(
                    store.clone(),
                    "delegated planner is not provisioned; set planner.agent_id and planner.agent_alias_id",
                    max_duration,
                )
            }
            WorkflowStrategyKind::Delegated => {
                let planner = planner.ok_or_else(|| {
                    ForgeCoreError::Configuration(
                        "delegated strategy requires a planner client".to_string(),
                    )
                })?;
                let reader = EventStreamReader::new(
                    store.clone(),
                    Duration::from_millis(config.workflow.event_flush_interval_ms),
                    Duration::from_millis(config.workflow.throttle_pause_ms),
                );
                let strategy = Arc::new(DelegatedStrategy::new(
                    planner,
                    reader,
                    config.workflow.max_dispatch_attempts,
                    Duration::from_millis(config.workflow.retry_base_delay_ms),
                ));
                WorkflowEngine::new(store.clone(), strategy, max_duration)
            }
        };
        let engine = Arc::new(engine);
        let dispatcher = Arc::new(TokioDispatcher::new(engine.clone()));

        Ok(Self {
            config,
            store,
            engine,
            dispatcher,
        })
    }

    /// Replace the dispatch boundary, e.g. with a durable queue.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn WorkflowDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Return the shared configuration for this orchestrator.
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Return the workflow engine, the re-entry point for custom dispatchers.
    pub fn engine(&self) -> Arc<WorkflowEngine> {
        self.engine.clone()
    }

    /// Validate intake, create the session, and schedule the workflow.
    ///
    /// Returns quickly; all later failures surface through polling.
    pub async fn submit(&self, intake: IntakeFields) -> Result<SubmissionReceipt, ForgeCoreError> {
        intake.validate()?;
        let session_id = self.store.create(intake.clone()).await?;
        info!(
            "accepted assessment (session_id={}, client={})",
            session_id, intake.client_name
        );

        if let Err(err) = self.dispatcher.dispatch(session_id, intake).await {
            error!(
                "workflow dispatch failed (session_id={}, error={})",
                session_id, err
            );
            let update = SessionUpdate::failed(
                SessionStatus::Error,
                format!("workflow dispatch failed: {err}"),
            );
            if let Err(store_err) = self.store.update(session_id, update).await {
                error!(
                    "failed to record dispatch failure (session_id={}, error={})",
                    session_id, store_err
                );
            }
            return Err(ForgeCoreError::Dispatch(err.to_string()));
        }

        Ok(SubmissionReceipt {
            session_id,
            status: SessionStatus::Pending,
            poll_url: format!("/agent-status/{session_id}"),
        })
    }

    /// Fetch the full session view.
    pub async fn session(&self, session_id: SessionId) -> Result<Session, ForgeCoreError> {
        Ok(self.store.get(session_id).await?)
    }

    /// Derive the final artifact links from the session record.
    pub async fn results(&self, session_id: SessionId) -> Result<ProposalArtifacts, ForgeCoreError> {
        let session = self.store.get(session_id).await?;
        if session.document_urls.is_empty() {
            return Err(ForgeCoreError::ArtifactsNotReady(session_id));
        }
        Ok(ProposalArtifacts {
            powerpoint_url: find_url(&session.document_urls, "pptx"),
            sow_url: find_url(&session.document_urls, "sow"),
            cost_data: session.cost_data,
        })
    }
}

/// First artifact link whose name contains the marker, case-insensitive.
fn find_url(urls: &[String], marker: &str) -> Option<String> {
    urls.iter()
        .find(|url| url.to_lowercase().contains(marker))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::find_url;
    use pretty_assertions::assert_eq;

    #[test]
    fn find_url_matches_by_filename_convention() {
        let urls = vec![
            "file:///artifacts/s1/presentation.PPTX?expires=1".to_string(),
            "file:///artifacts/s1/sow.docx?expires=1".to_string(),
        ];
        assert_eq!(find_url(&urls, "pptx"), Some(urls[0].clone()));
        assert_eq!(find_url(&urls, "sow"), Some(urls[1].clone()));
        assert_eq!(find_url(&urls, "xls"), None);
    }
}
