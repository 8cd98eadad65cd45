//! Batch analysis and ad blueprint pipeline.
//!
//! This crate wires the stages together:
//! - `tracker`: the per-asset state machine, the only shared mutable state
//! - `orchestrator`: sampling plus one comparative completion call per batch
//! - `ranking`: primary asset selection
//! - `generator` and `ranker`: blueprint generation and scoring
//! - `sink`: fire-and-forget persistence

pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod ranker;
pub mod ranking;
pub mod retry;
pub mod sink;
pub mod tracker;

pub use config::PipelineConfig;
pub use error::{
    GenerationError, GenerationResult, PipelineError, PipelineResult, RankingError, WorkspaceError,
    WorkspaceResult,
};
pub use generator::{BlueprintAuditLog, BlueprintGenerator};
pub use logging::BatchLogger;
pub use orchestrator::{BatchOrchestrator, BatchReport, FailedAsset};
pub use pipeline::{AdPipeline, PipelineRun};
pub use ranker::{sanitize_rankings, BlueprintRanker};
pub use ranking::{check_permutation, known_ids, select_primary, PrimarySelection, RankViolation};
pub use retry::{retry_async, RetryConfig, Retryable};
pub use sink::{JsonDirSink, NullSink, ResultSink};
pub use tracker::{
    AnalyzedAsset, AssetEvent, AssetSnapshot, AssetSummary, AssetTracker, TransitionOutcome,
};
