//! Structured completion gateway.
//!
//! This crate provides the seam between the pipeline and the generative
//! completion provider. Every call returns JSON that parsed, or a typed
//! [`CompletionError`] telling the caller whether a retry makes sense.
//! The gateway itself never retries.

pub mod client;
pub mod error;
pub mod gateway;
pub mod types;

pub use client::{GatewayConfig, GeminiGateway};
pub use error::{CompletionError, CompletionResult};
pub use gateway::{complete_typed, CompletionGateway};
pub use types::{CompletionRequest, ContentPart};
