//! Sentinel X CLI
//!
//! Command-line entrypoint for the Sentinel X host defense pipeline:
//! loads configuration, wires the detector, analysis pipeline, gate,
//! executor, and API server together, and manages startup and shutdown.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

mod config;

use config::{AppConfig, BackendConfig, BackendProvider};
use sx_actions::{
    AccountControl, FileQuarantine, HostIsolation, NetworkControl, PersistenceControl,
    PlanExecutor, RemediationRegistry, SimulatedPlatform, SysinfoProcessControl,
};
use sx_analysis::{
    AnalysisBackend, AnalysisPipeline, ApprovedPlanHandler, GeminiBackend, OpenAiBackend,
    OperationMode, PipelineConfig, Stage,
};
use sx_core::{CaseStore, PlanSigner, ThreatQueue};
use sx_observability::{init_logging_with_config, AuditTrail, LoggingConfig};
use sx_policy::{Gate, PolicyDocument, PolicyEngine};
use sx_sentry::{Detector, DetectorConfig, SignatureTable, SysinfoScanner};

#[derive(Parser)]
#[command(name = "sentinel-x")]
#[command(author = "Sentinel X Team")]
#[command(version)]
#[command(about = "Host defense pipeline with AI-assisted, human-approved remediation", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the detector, analysis pipeline, and API server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured bind port
        #[arg(short, long)]
        port: Option<u16>,

        /// Auto-approve and execute gate-passing plans
        #[arg(long)]
        autonomous: bool,
    },

    /// Validate configuration and the policy document, then exit
    Validate,

    /// Show the effective configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            autonomous,
        } => {
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }
            if autonomous {
                config.operation_mode = OperationMode::Autonomous;
            }
            serve(config).await
        }
        Commands::Validate => validate(&config),
        Commands::Config { show_secrets } => {
            let shown = if show_secrets {
                config
            } else {
                config.redact_secrets()
            };
            println!("{}", serde_yaml::to_string(&shown)?);
            Ok(())
        }
    }
}

/// Wires every component together and runs until interrupted.
async fn serve(config: AppConfig) -> Result<()> {
    init_logging_with_config(logging_config(&config)?);

    let hostname = config
        .hostname
        .clone()
        .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
        .unwrap_or_else(|| "localhost".to_string());
    info!(hostname = %hostname, mode = ?config.operation_mode, "Starting Sentinel X");

    // Owned shared state, handed to each component by reference.
    let queue = Arc::new(ThreatQueue::new(config.queue.capacity));
    let store = Arc::new(CaseStore::new());
    let audit = Arc::new(AuditTrail::new());
    let signatures = Arc::new(signature_table(&config));

    // Signing and execution.
    let signer = Arc::new(PlanSigner::generate().context("Failed to generate signing keypair")?);
    let sim = Arc::new(SimulatedPlatform);
    let registry = Arc::new(RemediationRegistry::standard(
        Arc::new(SysinfoProcessControl),
        Arc::clone(&sim) as Arc<dyn FileQuarantine>,
        Arc::clone(&sim) as Arc<dyn PersistenceControl>,
        Arc::clone(&sim) as Arc<dyn NetworkControl>,
        Arc::clone(&sim) as Arc<dyn HostIsolation>,
        sim as Arc<dyn AccountControl>,
    ));
    let executor = Arc::new(
        PlanExecutor::new(Arc::clone(&store), registry, signer).with_audit(Arc::clone(&audit)),
    );

    // Analysis pipeline: stages, policy gate, consume loop.
    let analyst = build_stage("analyst", &config.analysis.analyst)?;
    let expert = build_stage("expert", &config.analysis.expert)?;
    let policy = load_policy_document(config.policy.document.as_deref())?;
    let gate = Gate::new(Arc::new(PolicyEngine::new(policy)))
        .with_policy_timeout(Duration::from_secs(config.policy.timeout_secs));

    let pipeline = AnalysisPipeline::new(
        Arc::clone(&queue),
        Arc::clone(&store),
        analyst,
        expert,
        gate,
        PipelineConfig {
            consume_interval: Duration::from_millis(config.analysis.consume_interval_ms),
            hostname: hostname.clone(),
            mode: config.operation_mode,
        },
    )
    .with_approved_handler(Arc::new(ExecuteOnApproval {
        executor: Arc::clone(&executor),
    }));
    let pipeline_handle = Arc::new(pipeline).spawn();

    // Host detector.
    let detector = Detector::new(
        Arc::new(SysinfoScanner::new()),
        (*signatures).clone(),
        Arc::clone(&queue),
        DetectorConfig {
            poll_interval: Duration::from_millis(config.detector.poll_interval_ms),
            error_threshold: config.detector.error_threshold,
            max_backoff: Duration::from_millis(config.detector.max_backoff_ms),
        },
    );
    let detector_handle = detector.spawn();

    // API server.
    let addr = config.api.bind_addr()?;
    let state = sx_api::AppState::new(store, queue, signatures, executor, audit);
    let api = tokio::spawn(sx_api::serve(addr, state));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    detector_handle.stop().await;
    pipeline_handle.stop().await;
    api.abort();
    info!("Sentinel X stopped");
    Ok(())
}

/// Checks everything that can fail at startup without starting anything.
fn validate(config: &AppConfig) -> Result<()> {
    let table = signature_table(config);
    println!("Signatures: {} entries", table.len());

    for (name, backends) in [
        ("analyst", &config.analysis.analyst),
        ("expert", &config.analysis.expert),
    ] {
        if backends.is_empty() {
            println!(
                "WARNING: {} stage has no backends; every case will fail analysis",
                name
            );
            continue;
        }
        for backend in backends {
            backend.resolve_api_key().with_context(|| {
                format!("{} stage backend '{}' has no usable API key", name, backend.model)
            })?;
        }
        println!("{} stage: {} backend(s)", name, backends.len());
    }

    let policy = load_policy_document(config.policy.document.as_deref())?;
    println!("Policy: 1 allow predicate, {} deny rule(s)", policy.deny.len());

    config.api.bind_addr()?;
    logging_config(config)?;
    println!("Configuration OK");
    Ok(())
}

/// The configured signature table, or the built-in one.
fn signature_table(config: &AppConfig) -> SignatureTable {
    if config.detector.signatures.is_empty() {
        SignatureTable::default_table()
    } else {
        SignatureTable::new(config.detector.signatures.clone())
    }
}

/// Builds one waterfall stage from its configured priority list.
fn build_stage(name: &str, backends: &[BackendConfig]) -> Result<Stage> {
    if backends.is_empty() {
        warn!(stage = name, "No backends configured; stage will always exhaust");
    }
    let mut stage = Stage::new(name);
    for backend in backends {
        stage = stage.push_backend(
            build_backend(backend)?,
            Duration::from_secs(backend.timeout_secs),
        );
    }
    Ok(stage)
}

fn build_backend(config: &BackendConfig) -> Result<Arc<dyn AnalysisBackend>> {
    let api_key = config.resolve_api_key()?;
    Ok(match config.provider {
        BackendProvider::Gemini => {
            let mut backend = GeminiBackend::new(&config.model, api_key);
            if let Some(url) = &config.base_url {
                backend = backend.with_base_url(url);
            }
            Arc::new(backend)
        }
        BackendProvider::Openai => {
            let mut backend = OpenAiBackend::new(&config.model, api_key);
            if let Some(url) = &config.base_url {
                backend = backend.with_base_url(url);
            }
            Arc::new(backend)
        }
    })
}

/// Reads the policy document, or falls back to the built-in safety
/// policy when none is configured.
fn load_policy_document(path: Option<&Path>) -> Result<PolicyDocument> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read policy document: {}", path.display()))?;
            PolicyDocument::from_yaml(&text)
                .with_context(|| format!("Failed to parse policy document: {}", path.display()))
        }
        None => {
            info!("No policy document configured, using the built-in safety policy");
            Ok(PolicyDocument::default_document())
        }
    }
}

fn logging_config(config: &AppConfig) -> Result<LoggingConfig> {
    let level = config
        .logging
        .level
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {}", config.logging.level))?;
    Ok(LoggingConfig {
        level,
        json_format: config.logging.json,
        ..LoggingConfig::default()
    })
}

/// Executes gate-passing plans immediately when running autonomously.
struct ExecuteOnApproval {
    executor: Arc<PlanExecutor>,
}

#[async_trait]
impl ApprovedPlanHandler for ExecuteOnApproval {
    async fn execute_approved(&self, case_id: Uuid) {
        if let Err(err) = self.executor.execute_case(case_id).await {
            error!(case_id = %case_id, error = %err, "Autonomous execution failed");
        }
    }
}
