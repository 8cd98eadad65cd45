//! Pipeline configuration.

use std::path::PathBuf;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frames sampled per asset
    pub frames_per_asset: usize,
    /// Maximum outstanding completion calls, shared by every stage
    pub max_concurrent_completions: usize,
    /// Maximum assets decoded in parallel
    pub max_sampling_parallel: usize,
    /// Blueprints requested per generation call
    pub blueprint_count: usize,
    /// Upper bound accepted for `blueprint_count`
    pub max_blueprints: usize,
    /// Caller-side retries for throttled or transport failures
    pub completion_retries: u32,
    pub analysis_max_tokens: u32,
    pub blueprint_max_tokens: u32,
    pub ranking_max_tokens: u32,
    /// Directory for persisted results; nothing is persisted when unset
    pub output_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames_per_asset: 8,
            max_concurrent_completions: 4,
            max_sampling_parallel: 4,
            blueprint_count: 3,
            max_blueprints: 10,
            completion_retries: 2,
            analysis_max_tokens: 8192,
            blueprint_max_tokens: 8192,
            ranking_max_tokens: 2048,
            output_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frames_per_asset: env_or("ADFORGE_FRAMES_PER_ASSET", defaults.frames_per_asset),
            max_concurrent_completions: env_or(
                "ADFORGE_MAX_COMPLETIONS",
                defaults.max_concurrent_completions,
            )
            .max(1),
            max_sampling_parallel: env_or(
                "ADFORGE_MAX_SAMPLING_PARALLEL",
                defaults.max_sampling_parallel,
            )
            .max(1),
            blueprint_count: env_or("ADFORGE_BLUEPRINT_COUNT", defaults.blueprint_count),
            max_blueprints: env_or("ADFORGE_MAX_BLUEPRINTS", defaults.max_blueprints),
            completion_retries: env_or("ADFORGE_COMPLETION_RETRIES", defaults.completion_retries),
            analysis_max_tokens: env_or("ADFORGE_ANALYSIS_MAX_TOKENS", defaults.analysis_max_tokens),
            blueprint_max_tokens: env_or(
                "ADFORGE_BLUEPRINT_MAX_TOKENS",
                defaults.blueprint_max_tokens,
            ),
            ranking_max_tokens: env_or("ADFORGE_RANKING_MAX_TOKENS", defaults.ranking_max_tokens),
            output_dir: std::env::var("ADFORGE_OUTPUT_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
