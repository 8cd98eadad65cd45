//! Video asset identity and lifecycle models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Identifier of an uploaded asset, derived from its source file name.
///
/// Unique within one workspace. The same file name uploaded again after a
/// workspace reset yields the same `AssetId` but a different [`AssetToken`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Derive an asset id from a source file name or path.
    ///
    /// Directory components are stripped. Returns `None` when nothing usable
    /// remains.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let base = Path::new(name.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::trim)
            .unwrap_or_default();

        if base.is_empty() {
            None
        } else {
            Some(Self(base.to_string()))
        }
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-upload identity token. Minted fresh on every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetToken(pub Uuid);

impl AssetToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle naming one specific uploaded asset.
///
/// Every state transition is keyed by a handle, so results computed for a
/// discarded upload can never land on a newer asset with the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetHandle {
    pub id: AssetId,
    pub token: AssetToken,
}

impl AssetHandle {
    pub fn new(id: AssetId) -> Self {
        Self {
            id,
            token: AssetToken::new(),
        }
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.token)
    }
}

/// Asset lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Uploaded, waiting for a batch
    #[default]
    Pending,
    /// Frames are being extracted
    Sampling,
    /// Frames submitted for comparative analysis
    Analyzing,
    /// Analysis result attached
    Analyzed,
    /// Failed; see the asset's failure detail
    Error,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Sampling => "sampling",
            AssetStatus::Analyzing => "analyzing",
            AssetStatus::Analyzed => "analyzed",
            AssetStatus::Error => "error",
        }
    }

    /// Terminal states have no exit except a workspace reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Analyzed | AssetStatus::Error)
    }

    /// The only edges of the asset state machine.
    pub fn can_transition_to(&self, next: AssetStatus) -> bool {
        matches!(
            (self, next),
            (AssetStatus::Pending, AssetStatus::Sampling)
                | (AssetStatus::Sampling, AssetStatus::Analyzing)
                | (AssetStatus::Sampling, AssetStatus::Error)
                | (AssetStatus::Analyzing, AssetStatus::Analyzed)
                | (AssetStatus::Analyzing, AssetStatus::Error)
        )
    }

    pub const ALL: [AssetStatus; 5] = [
        AssetStatus::Pending,
        AssetStatus::Sampling,
        AssetStatus::Analyzing,
        AssetStatus::Analyzed,
        AssetStatus::Error,
    ];
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an asset ended up in [`AssetStatus::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Decode,
    SampleOutOfRange,
    EmptyResponse,
    SchemaViolation,
    Throttled,
    Transport,
    Rejected,
    PayloadTooLarge,
    MissingResult,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Decode => "decode",
            FailureCategory::SampleOutOfRange => "sample_out_of_range",
            FailureCategory::EmptyResponse => "empty_response",
            FailureCategory::SchemaViolation => "schema_violation",
            FailureCategory::Throttled => "throttled",
            FailureCategory::Transport => "transport",
            FailureCategory::Rejected => "rejected",
            FailureCategory::PayloadTooLarge => "payload_too_large",
            FailureCategory::MissingResult => "missing_result",
        }
    }

    /// Throttling and transport failures are worth a caller-driven retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureCategory::Throttled | FailureCategory::Transport)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure detail attached to an errored asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub category: FailureCategory,
    pub detail: String,
    /// Backoff hint for retry-worthy failures
    #[serde(skip_serializing_if = "Option::is_none", with = "duration_secs_opt")]
    #[serde(default)]
    pub retry_after: Option<Duration>,
}

impl AssetFailure {
    pub fn new(category: FailureCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn missing_result(id: &AssetId) -> Self {
        Self::new(
            FailureCategory::MissingResult,
            format!("no analysis result returned for {}", id),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

/// One still frame sampled from a video.
#[derive(Clone, PartialEq)]
pub struct SampledFrame {
    /// Position in the source video (seconds)
    pub timestamp_secs: f64,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl SampledFrame {
    pub fn jpeg(timestamp_secs: f64, data: Vec<u8>) -> Self {
        Self {
            timestamp_secs,
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

impl fmt::Debug for SampledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampledFrame")
            .field("timestamp_secs", &self.timestamp_secs)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Preview image for an asset.
#[derive(Clone, PartialEq)]
pub struct Thumbnail {
    pub mime_type: String,
    pub width: u32,
    pub data: Vec<u8>,
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("bytes", &self.data.len())
            .finish()
    }
}
