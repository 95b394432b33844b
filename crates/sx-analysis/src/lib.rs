//! # sx-analysis
//!
//! The AI analysis pipeline for Sentinel X.
//!
//! An alert flows through two stages, Analyst (fast, human-readable
//! report) and Expert (slower, machine-executable plan). Each stage tries
//! an ordered list of backends — the waterfall protocol — and normalizes
//! whatever comes back with parse-or-fallback decoding, so the pipeline
//! always produces a usable payload or a well-typed failure.

pub mod backend;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod waterfall;

pub use backend::{AnalysisBackend, BackendError};
pub use pipeline::{
    AnalysisPipeline, ApprovedPlanHandler, OperationMode, PipelineConfig, PipelineHandle,
};
pub use providers::{GeminiBackend, MockBackend, OpenAiBackend};
pub use waterfall::{BackendFailure, Stage, StageExhausted, StageSuccess};
