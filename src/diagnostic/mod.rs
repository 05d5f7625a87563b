//! LLM-backed noise diagnostics.
//!
//! The aggregator hands its statistics to a [`Diagnostician`] and gets free
//! text back. The text is only ever displayed, never interpreted.

pub mod client;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

pub use client::OllamaDiagnostician;
pub use prompt::{extract_recommendations, strip_code_blocks, DEFAULT_GUIDELINES};

/// Everything the diagnostician gets to see.
#[derive(Debug, Clone)]
pub struct DiagnosticRequest {
    /// Guideline text the diagnostic should be grounded on.
    pub context: String,
    /// Aggregated measurement statistics, serialized as JSON.
    pub aggregated_json: String,
    /// Free-form description of the accommodation, if known.
    pub accommodation: Option<String>,
}

/// Failure of the diagnostic collaborator.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to model server at {0}")]
    Connect(String),

    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model returned an empty diagnostic")]
    EmptyResponse,
}

impl DiagnosticError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DiagnosticError::Timeout(_) | DiagnosticError::Connect(_) => true,
            DiagnosticError::Api { status, .. } => *status >= 500 || *status == 429,
            DiagnosticError::Request(_) | DiagnosticError::EmptyResponse => false,
        }
    }
}

/// Produces a textual diagnostic from aggregated measurements.
#[async_trait]
pub trait Diagnostician: Send + Sync {
    async fn diagnose(&self, request: &DiagnosticRequest) -> Result<String, DiagnosticError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedDiagnostician(&'static str);

    #[async_trait]
    impl Diagnostician for CannedDiagnostician {
        async fn diagnose(&self, request: &DiagnosticRequest) -> Result<String, DiagnosticError> {
            Ok(format!("{} ({} bytes)", self.0, request.aggregated_json.len()))
        }
    }

    #[test]
    fn test_trait_object_dispatch() {
        let diagnostician: Box<dyn Diagnostician> = Box::new(CannedDiagnostician("quiet flat"));
        let request = DiagnosticRequest {
            context: String::new(),
            aggregated_json: "{}".to_string(),
            accommodation: None,
        };

        let text = tokio_test::block_on(diagnostician.diagnose(&request)).unwrap();
        assert_eq!(text, "quiet flat (2 bytes)");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(DiagnosticError::Timeout(30).is_retryable());
        assert!(DiagnosticError::Connect("http://localhost".to_string()).is_retryable());
        assert!(DiagnosticError::Api {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!DiagnosticError::Api {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!DiagnosticError::EmptyResponse.is_retryable());
    }
}
