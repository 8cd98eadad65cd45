//! Structured batch logging utilities.
//!
//! Provides consistent, structured logging for pipeline stages with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

/// Batch logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct BatchLogger {
    batch_id: String,
    operation: String,
}

impl BatchLogger {
    /// Create a new logger for a specific batch and operation.
    ///
    /// # Arguments
    /// * `batch_id` - The unique identifier for the batch
    /// * `operation` - The stage being run (e.g., "analyze_batch", "generate_blueprints")
    pub fn new(batch_id: &str, operation: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            operation = %self.operation,
            "Batch started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            operation = %self.operation,
            "Batch progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            batch_id = %self.batch_id,
            operation = %self.operation,
            "Batch warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            batch_id = %self.batch_id,
            operation = %self.operation,
            "Batch error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            operation = %self.operation,
            "Batch completed: {}", message
        );
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this batch.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "batch",
            batch_id = %self.batch_id,
            operation = %self.operation
        )
    }
}
