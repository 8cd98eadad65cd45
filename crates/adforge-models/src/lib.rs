//! Shared data models for the AdForge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video assets, their identity and lifecycle status
//! - Comparative analysis results returned by the completion service
//! - Ad blueprints and their edit plans
//! - Creative rankings
//! - Creative briefs
//! - Response schemas derived from the types above

pub mod analysis;
pub mod asset;
pub mod blueprint;
pub mod brief;
pub mod contract;
pub mod ranking;
pub mod schema;

// Re-export common types
pub use analysis::{AnalysisResult, AudioAnalysis, BatchAnalysisResponse, SceneDescription};
pub use asset::{
    AssetFailure, AssetHandle, AssetId, AssetStatus, AssetToken, FailureCategory, SampledFrame,
    Thumbnail,
};
pub use blueprint::{
    AdBlueprint, BlueprintBatchResponse, BlueprintDraft, BlueprintSet, EditScene,
    InvalidBlueprint, InvalidReference, RejectionReason,
};
pub use brief::CreativeBrief;
pub use contract::ContractViolation;
pub use ranking::{CreativeRanking, RankingResponse};
pub use schema::response_schema;
