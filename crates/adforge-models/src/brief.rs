//! Creative brief supplied with a blueprint generation request.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// What the generated ads should sell, and to whom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreativeBrief {
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,

    #[validate(length(min = 1, max = 500))]
    pub offer: String,

    #[validate(length(min = 1, max = 500))]
    pub target_audience: String,

    #[serde(default)]
    pub pain_points: Vec<String>,

    #[serde(default)]
    pub desires: Vec<String>,

    /// Placement the ads are cut for (reels, stories, feed...)
    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default = "default_tone")]
    pub tone: String,

    /// Target ad length
    #[serde(default = "default_duration")]
    #[validate(range(min = 5, max = 180))]
    pub duration_seconds: u32,
}

fn default_platform() -> String {
    "reels".to_string()
}

fn default_tone() -> String {
    "direct".to_string()
}

fn default_duration() -> u32 {
    30
}

impl CreativeBrief {
    pub fn new(
        product_name: impl Into<String>,
        offer: impl Into<String>,
        target_audience: impl Into<String>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            offer: offer.into(),
            target_audience: target_audience.into(),
            pain_points: Vec::new(),
            desires: Vec::new(),
            platform: default_platform(),
            tone: default_tone(),
            duration_seconds: default_duration(),
        }
    }

    /// Render the brief as a prompt section.
    pub fn to_prompt(&self) -> String {
        let mut out = format!(
            "PRODUCT: {}\nOFFER: {}\nTARGET AUDIENCE: {}\nPLATFORM: {}\nTONE: {}\nDURATION: {} seconds\n",
            self.product_name,
            self.offer,
            self.target_audience,
            self.platform,
            self.tone,
            self.duration_seconds
        );
        if !self.pain_points.is_empty() {
            out.push_str(&format!("PAIN POINTS: {}\n", self.pain_points.join(", ")));
        }
        if !self.desires.is_empty() {
            out.push_str(&format!("DESIRES: {}\n", self.desires.join(", ")));
        }
        out
    }
}
