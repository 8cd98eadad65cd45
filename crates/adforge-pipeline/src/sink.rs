//! Fire-and-forget result persistence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use adforge_models::{AnalysisResult, AssetId, BlueprintSet};

use crate::error::PipelineResult;

/// Destination for analysis results and blueprint sets.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist_analysis(&self, id: &AssetId, result: &AnalysisResult) -> PipelineResult<()>;

    async fn persist_blueprints(&self, primary: &AssetId, set: &BlueprintSet) -> PipelineResult<()>;
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl ResultSink for NullSink {
    async fn persist_analysis(&self, _id: &AssetId, _result: &AnalysisResult) -> PipelineResult<()> {
        Ok(())
    }

    async fn persist_blueprints(&self, _primary: &AssetId, _set: &BlueprintSet) -> PipelineResult<()> {
        Ok(())
    }
}

/// Writes one JSON file per analyzed asset and per blueprint set.
///
/// Layout: `<root>/analysis/<asset id>.json` and
/// `<root>/blueprints/<primary id>-<timestamp>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    root: PathBuf,
}

impl JsonDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_json<T: serde::Serialize + Sync>(&self, path: PathBuf, value: &T) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, json).await?;
        debug!(path = %path.display(), "Persisted result");
        Ok(())
    }
}

#[async_trait]
impl ResultSink for JsonDirSink {
    async fn persist_analysis(&self, id: &AssetId, result: &AnalysisResult) -> PipelineResult<()> {
        let path = self.root.join("analysis").join(format!("{}.json", id));
        self.write_json(path, result).await
    }

    async fn persist_blueprints(&self, primary: &AssetId, set: &BlueprintSet) -> PipelineResult<()> {
        let path = self.root.join("blueprints").join(format!(
            "{}-{}.json",
            primary,
            Utc::now().format("%Y%m%dT%H%M%S%.3f")
        ));
        self.write_json(path, set).await
    }
}

/// Persist an analysis result in the background. Failures are only logged.
pub fn spawn_persist_analysis(sink: Arc<dyn ResultSink>, id: AssetId, result: Arc<AnalysisResult>) {
    tokio::spawn(async move {
        if let Err(e) = sink.persist_analysis(&id, &result).await {
            warn!(asset_id = %id, "Failed to persist analysis: {}", e);
        }
    });
}

/// Persist a blueprint set in the background. Failures are only logged.
pub fn spawn_persist_blueprints(sink: Arc<dyn ResultSink>, primary: AssetId, set: BlueprintSet) {
    tokio::spawn(async move {
        if let Err(e) = sink.persist_blueprints(&primary, &set).await {
            warn!(asset_id = %primary, "Failed to persist blueprints: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn result() -> AnalysisResult {
        AnalysisResult {
            rank: 1,
            file_name: "hero.mp4".to_string(),
            justification: "clear demo".to_string(),
            summary: "unboxing".to_string(),
            scene_descriptions: vec![],
            key_objects: BTreeSet::from(["phone".to_string()]),
            emotional_tone: BTreeSet::new(),
            audio_analysis: None,
        }
    }

    #[tokio::test]
    async fn test_json_dir_sink_writes_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path());

        sink.persist_analysis(&AssetId::from("hero.mp4"), &result())
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("analysis").join("hero.mp4.json")).unwrap();
        let parsed: AnalysisResult = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed, result());
    }

    #[tokio::test]
    async fn test_json_dir_sink_writes_blueprints() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path());

        sink.persist_blueprints(&AssetId::from("hero.mp4"), &BlueprintSet::default())
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("blueprints"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
