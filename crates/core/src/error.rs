use thiserror::Error;

/// Failure taxonomy for pipeline stages.
///
/// Stages never let these escape the orchestrator: each stage catches its own
/// errors, records a diagnostic, and yields a neutral value.  The variants
/// exist so diagnostics and logs can name what actually went wrong.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("embedding failed: {0}")]
    EmbedFailed(String),
    #[error("vector search failed: {0}")]
    SearchFailed(String),
    #[error("logprobs call failed: {0}")]
    LogprobsFailed(String),
    #[error("rewrite call failed: {0}")]
    RewriteFailed(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("cancelled by caller")]
    Cancelled,
    #[error("timed out after {0} ms")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_render_their_cause() {
        let err = StageError::EmbedFailed("429 from provider".to_string());
        assert!(err.to_string().contains("429"));
        assert_eq!(StageError::Cancelled.to_string(), "cancelled by caller");
        assert!(StageError::Timeout(15_000).to_string().contains("15000"));
    }
}
