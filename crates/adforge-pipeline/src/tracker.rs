//! Asset state tracker.
//!
//! The tracker is the only shared mutable structure of the pipeline. Assets
//! live in an id-keyed map and change state only through the transition
//! functions below. Each transition is a compare-and-set on the asset's
//! handle and the workspace generation: a transition against a replaced,
//! reset or unknown asset is `Stale`, and one that is not an edge of the
//! state machine is `Rejected`. Neither mutates anything, so duplicate and
//! late results are harmless.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use adforge_media::SampleSet;
use adforge_models::{
    AnalysisResult, AssetFailure, AssetHandle, AssetId, AssetStatus, SampledFrame, Thumbnail,
};

use crate::error::{WorkspaceError, WorkspaceResult};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// Handle no longer names a live asset
    Stale,
    /// Not an edge of the state machine
    Rejected { from: AssetStatus, to: AssetStatus },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

/// Workspace change published to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AssetEvent {
    Uploaded {
        handle: AssetHandle,
    },
    Transitioned {
        handle: AssetHandle,
        from: AssetStatus,
        to: AssetStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        failure: Option<AssetFailure>,
    },
    /// A failed asset was replaced for a retry. Observers keyed by id see
    /// the asset leave `error` for `pending` under a new token.
    Respawned {
        previous: AssetHandle,
        handle: AssetHandle,
        from: AssetStatus,
        to: AssetStatus,
    },
    Reset {
        generation: u64,
        discarded: usize,
    },
}

struct AssetRecord {
    handle: AssetHandle,
    generation: u64,
    raw: Arc<[u8]>,
    status: AssetStatus,
    duration_secs: Option<f64>,
    frames: Option<Arc<[SampledFrame]>>,
    thumbnail: Option<Arc<Thumbnail>>,
    analysis: Option<Arc<AnalysisResult>>,
    failure: Option<AssetFailure>,
    uploaded_at: DateTime<Utc>,
}

impl AssetRecord {
    fn snapshot(&self) -> AssetSnapshot {
        AssetSnapshot {
            handle: self.handle.clone(),
            status: self.status,
            raw: Arc::clone(&self.raw),
            duration_secs: self.duration_secs,
            frames: self.frames.clone(),
            thumbnail: self.thumbnail.clone(),
            analysis: self.analysis.clone(),
            failure: self.failure.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Point-in-time view of one asset. Shares frame and result data with the
/// tracker instead of copying it.
#[derive(Clone)]
pub struct AssetSnapshot {
    pub handle: AssetHandle,
    pub status: AssetStatus,
    pub raw: Arc<[u8]>,
    pub duration_secs: Option<f64>,
    pub frames: Option<Arc<[SampledFrame]>>,
    pub thumbnail: Option<Arc<Thumbnail>>,
    pub analysis: Option<Arc<AnalysisResult>>,
    pub failure: Option<AssetFailure>,
    pub uploaded_at: DateTime<Utc>,
}

impl AssetSnapshot {
    pub fn id(&self) -> &AssetId {
        &self.handle.id
    }

    pub fn has_frames(&self) -> bool {
        self.frames.as_ref().is_some_and(|f| !f.is_empty())
    }

    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            id: self.handle.id.clone(),
            status: self.status,
            frame_count: self.frames.as_ref().map_or(0, |f| f.len()),
            has_thumbnail: self.thumbnail.is_some(),
            analysis: self.analysis.as_deref().cloned(),
            failure: self.failure.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

impl fmt::Debug for AssetSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetSnapshot")
            .field("handle", &self.handle)
            .field("status", &self.status)
            .field("bytes", &self.raw.len())
            .field("frames", &self.frames.as_ref().map(|f| f.len()))
            .field("failure", &self.failure)
            .finish()
    }
}

/// Serializable asset view for reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub id: AssetId,
    pub status: AssetStatus,
    pub frame_count: usize,
    pub has_thumbnail: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<AssetFailure>,
    pub uploaded_at: DateTime<Utc>,
}

/// An asset in the `analyzed` state together with its evidence.
#[derive(Debug, Clone)]
pub struct AnalyzedAsset {
    pub handle: AssetHandle,
    pub analysis: Arc<AnalysisResult>,
    pub frames: Arc<[SampledFrame]>,
}

impl AnalyzedAsset {
    pub fn id(&self) -> &AssetId {
        &self.handle.id
    }

    pub fn rank(&self) -> u32 {
        self.analysis.rank
    }
}

#[derive(Default)]
struct Workspace {
    generation: u64,
    assets: HashMap<AssetId, AssetRecord>,
}

/// Id-keyed collection of assets for one workspace.
pub struct AssetTracker {
    workspace: RwLock<Workspace>,
    events: broadcast::Sender<AssetEvent>,
}

impl Default for AssetTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetTracker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            workspace: RwLock::new(Workspace::default()),
            events,
        }
    }

    /// Receive every applied change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AssetEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: AssetEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Add a new `pending` asset named after its source file.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> WorkspaceResult<AssetHandle> {
        let id = AssetId::from_file_name(file_name).ok_or(WorkspaceError::EmptyFileName)?;

        let mut ws = self.workspace.write().await;
        if ws.assets.contains_key(&id) {
            return Err(WorkspaceError::DuplicateAsset(id));
        }

        let handle = AssetHandle::new(id.clone());
        let record = AssetRecord {
            handle: handle.clone(),
            generation: ws.generation,
            raw: Arc::from(bytes),
            status: AssetStatus::Pending,
            duration_secs: None,
            frames: None,
            thumbnail: None,
            analysis: None,
            failure: None,
            uploaded_at: Utc::now(),
        };
        info!(asset_id = %id, bytes = record.raw.len(), "Asset uploaded");
        ws.assets.insert(id, record);

        self.publish(AssetEvent::Uploaded {
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Compare-and-set transition. `apply` runs only on a valid edge and may
    /// refuse by returning `false`.
    async fn transition<F>(&self, handle: &AssetHandle, to: AssetStatus, apply: F) -> TransitionOutcome
    where
        F: FnOnce(&mut AssetRecord) -> bool,
    {
        let mut ws = self.workspace.write().await;
        let generation = ws.generation;

        let Some(record) = ws.assets.get_mut(&handle.id) else {
            debug!(asset = %handle, to = %to, "Transition on unknown asset ignored");
            return TransitionOutcome::Stale;
        };
        if record.handle.token != handle.token || record.generation != generation {
            debug!(asset = %handle, to = %to, "Transition on stale handle ignored");
            return TransitionOutcome::Stale;
        }

        let from = record.status;
        if !from.can_transition_to(to) || !apply(record) {
            debug!(asset = %handle, from = %from, to = %to, "Transition rejected");
            return TransitionOutcome::Rejected { from, to };
        }
        record.status = to;

        self.publish(AssetEvent::Transitioned {
            handle: record.handle.clone(),
            from,
            to,
            failure: record.failure.clone(),
        });
        TransitionOutcome::Applied
    }

    /// `pending -> sampling`
    pub async fn begin_sampling(&self, handle: &AssetHandle) -> TransitionOutcome {
        self.transition(handle, AssetStatus::Sampling, |_| true).await
    }

    /// `sampling -> analyzing`, storing the extracted evidence.
    pub async fn finish_sampling(&self, handle: &AssetHandle, samples: SampleSet) -> TransitionOutcome {
        self.transition(handle, AssetStatus::Analyzing, move |record| {
            record.duration_secs = Some(samples.duration_secs);
            record.frames = Some(Arc::from(samples.frames));
            record.thumbnail = Some(Arc::new(samples.thumbnail));
            true
        })
        .await
    }

    /// `sampling -> analyzing` for an asset that already carries frames.
    pub async fn reuse_samples(&self, handle: &AssetHandle) -> TransitionOutcome {
        self.transition(handle, AssetStatus::Analyzing, |record| {
            record.frames.as_ref().is_some_and(|f| !f.is_empty())
        })
        .await
    }

    /// `analyzing -> analyzed`
    pub async fn complete(&self, handle: &AssetHandle, result: AnalysisResult) -> TransitionOutcome {
        self.transition(handle, AssetStatus::Analyzed, move |record| {
            record.analysis = Some(Arc::new(result));
            true
        })
        .await
    }

    /// `sampling | analyzing -> error`
    pub async fn fail(&self, handle: &AssetHandle, failure: AssetFailure) -> TransitionOutcome {
        self.transition(handle, AssetStatus::Error, move |record| {
            record.failure = Some(failure);
            true
        })
        .await
    }

    /// Replace a retry-worthy failed asset with a fresh `pending` one.
    ///
    /// The replacement keeps the raw bytes, frames and thumbnail under a new
    /// token, so results still in flight for the old handle are discarded.
    ///
    /// The record is reused in place: `snapshot(id)` and other id-keyed
    /// observers see the asset go from `error` back to `pending` without a
    /// reset. Only the token tells the two lives apart, and the
    /// `Respawned` event carries both handles.
    pub async fn respawn(&self, handle: &AssetHandle) -> WorkspaceResult<AssetHandle> {
        let mut ws = self.workspace.write().await;
        let generation = ws.generation;

        let record = ws
            .assets
            .get_mut(&handle.id)
            .ok_or_else(|| WorkspaceError::UnknownAsset(handle.id.clone()))?;
        if record.handle.token != handle.token || record.generation != generation {
            return Err(WorkspaceError::StaleHandle(handle.id.clone()));
        }
        if record.status != AssetStatus::Error {
            return Err(WorkspaceError::not_retryable(
                &handle.id,
                format!("status is {}", record.status),
            ));
        }
        match &record.failure {
            Some(failure) if failure.is_retryable() => {}
            Some(failure) => {
                return Err(WorkspaceError::not_retryable(
                    &handle.id,
                    format!("{} failures are final", failure.category),
                ))
            }
            None => return Err(WorkspaceError::not_retryable(&handle.id, "no failure recorded")),
        }
        if !record.frames.as_ref().is_some_and(|f| !f.is_empty()) {
            return Err(WorkspaceError::not_retryable(&handle.id, "no sampled frames"));
        }

        let replacement = AssetHandle::new(handle.id.clone());
        record.handle = replacement.clone();
        record.status = AssetStatus::Pending;
        record.failure = None;
        record.analysis = None;

        info!(asset = %replacement, previous = %handle.token, "Asset respawned for retry");
        self.publish(AssetEvent::Respawned {
            previous: handle.clone(),
            handle: replacement.clone(),
            from: AssetStatus::Error,
            to: AssetStatus::Pending,
        });
        Ok(replacement)
    }

    /// Destroy every asset. Returns the new workspace generation.
    pub async fn reset(&self) -> u64 {
        let mut ws = self.workspace.write().await;
        ws.generation += 1;
        let discarded = ws.assets.len();
        ws.assets.clear();

        info!(generation = ws.generation, discarded, "Workspace reset");
        self.publish(AssetEvent::Reset {
            generation: ws.generation,
            discarded,
        });
        ws.generation
    }

    pub async fn snapshot(&self, id: &AssetId) -> Option<AssetSnapshot> {
        self.workspace.read().await.assets.get(id).map(AssetRecord::snapshot)
    }

    /// Snapshot only if `handle` still names the live asset.
    pub async fn get(&self, handle: &AssetHandle) -> Option<AssetSnapshot> {
        self.workspace
            .read()
            .await
            .assets
            .get(&handle.id)
            .filter(|r| r.handle.token == handle.token)
            .map(AssetRecord::snapshot)
    }

    /// All assets, ordered by id.
    pub async fn list(&self) -> Vec<AssetSnapshot> {
        let ws = self.workspace.read().await;
        let mut assets: Vec<_> = ws.assets.values().map(AssetRecord::snapshot).collect();
        assets.sort_by(|a, b| a.handle.id.cmp(&b.handle.id));
        assets
    }

    /// Handles of every `pending` asset, ordered by id.
    pub async fn pending(&self) -> Vec<AssetHandle> {
        let ws = self.workspace.read().await;
        let mut handles: Vec<_> = ws
            .assets
            .values()
            .filter(|r| r.status == AssetStatus::Pending)
            .map(|r| r.handle.clone())
            .collect();
        handles.sort_by(|a, b| a.id.cmp(&b.id));
        handles
    }

    /// The analyzed assets among `handles`. Stale handles are skipped.
    pub async fn analyzed(&self, handles: &[AssetHandle]) -> Vec<AnalyzedAsset> {
        let ws = self.workspace.read().await;
        handles
            .iter()
            .filter_map(|handle| {
                let record = ws.assets.get(&handle.id)?;
                if record.handle.token != handle.token || record.status != AssetStatus::Analyzed {
                    return None;
                }
                Some(AnalyzedAsset {
                    handle: record.handle.clone(),
                    analysis: Arc::clone(record.analysis.as_ref()?),
                    frames: Arc::clone(record.frames.as_ref()?),
                })
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.workspace.read().await.assets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
