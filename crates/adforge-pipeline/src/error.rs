//! Pipeline error types.

use adforge_gemini::CompletionError;
use adforge_models::AssetId;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Errors raised by the asset tracker's upload and retry entry points.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Asset name is empty")]
    EmptyFileName,

    #[error("Asset already uploaded: {0}")]
    DuplicateAsset(AssetId),

    #[error("Asset not found: {0}")]
    UnknownAsset(AssetId),

    /// Handle names an asset that was replaced or reset away.
    #[error("Stale handle for asset {0}")]
    StaleHandle(AssetId),

    #[error("Asset {id} cannot be retried: {reason}")]
    NotRetryable { id: AssetId, reason: String },
}

impl WorkspaceError {
    pub fn not_retryable(id: &AssetId, reason: impl Into<String>) -> Self {
        Self::NotRetryable {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while choosing the primary asset.
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("No asset ranked 1 in the batch")]
    NoPrimary,

    /// Flagged for review; never resolved by picking one.
    #[error("Multiple assets claim rank 1: {}", join_ids(.ids))]
    AmbiguousPrimary { ids: Vec<AssetId> },
}

fn join_ids(ids: &[AssetId]) -> String {
    ids.iter().map(AssetId::as_str).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Blueprint count {requested} outside 1..={max}")]
    InvalidCount { requested: usize, max: usize },

    #[error("Invalid creative brief: {0}")]
    InvalidBrief(String),

    #[error("Completion returned no blueprints")]
    NoBlueprints,

    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Completion(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Top-level error for pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Generation(e) => e.is_retryable(),
            PipelineError::Io(_) => true,
            _ => false,
        }
    }
}
