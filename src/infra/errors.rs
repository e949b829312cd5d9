// src/infra/errors.rs — Error types for Tripwise

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TripwiseError {
    // Caller errors (the only kind that is reported back verbatim)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Collaborator errors (degrade, never surface)
    #[error("Capability '{capability}' unavailable: {message}")]
    CapabilityUnavailable { capability: String, message: String },

    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    // Persistence
    #[error("Session store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TripwiseError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TripwiseError::Provider {
                retriable: true,
                ..
            } | TripwiseError::RateLimited { .. }
                | TripwiseError::Timeout { .. }
        )
    }

    pub fn unavailable(capability: impl Into<String>, message: impl Into<String>) -> Self {
        TripwiseError::CapabilityUnavailable {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// True for failures of the persistence backend.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, TripwiseError::Store(_) | TripwiseError::Database(_))
    }
}

/// Run `fut` with a deadline, mapping expiry to [`TripwiseError::Timeout`].
pub async fn with_timeout<T, F>(
    operation: &str,
    limit: std::time::Duration,
    fut: F,
) -> Result<T, TripwiseError>
where
    F: std::future::Future<Output = Result<T, TripwiseError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TripwiseError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retriable_classification() {
        assert!(TripwiseError::RateLimited {
            provider: "xai".into(),
            retry_after_ms: 10
        }
        .is_retriable());
        assert!(TripwiseError::Provider {
            provider: "xai".into(),
            message: "HTTP 503".into(),
            retriable: true
        }
        .is_retriable());
        assert!(!TripwiseError::InvalidInput("empty".into()).is_retriable());
        assert!(!TripwiseError::Store("down".into()).is_retriable());
    }

    #[test]
    fn test_store_failure_classification() {
        assert!(TripwiseError::Store("gone".into()).is_store_failure());
        assert!(!TripwiseError::unavailable("weather", "down").is_store_failure());
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let v = with_timeout("fast", Duration::from_secs(1), async { Ok::<_, TripwiseError>(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let err = with_timeout("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TripwiseError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, TripwiseError::Timeout { ref operation, .. } if operation == "slow"));
    }
}
