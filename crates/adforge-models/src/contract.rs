//! Structural contract checks applied to decoded completion output.

use thiserror::Error;

/// A decoded response that parsed but broke the output contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("rank must be a positive integer, got 0 for {0}")]
    ZeroRank(String),

    #[error("result is missing its fileName")]
    EmptyFileName,
}
