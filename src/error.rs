/// Errors raised while fetching, caching or persisting prefetch data
///
/// None of these are fatal to the caller: the prefetcher logs them and
/// degrades to "no prefetch occurred".
#[derive(thiserror::Error, Debug)]
pub enum PrefetchError {
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PrefetchError {
    /// Whether the failure came from talking to the feed backend
    pub fn is_upstream(&self) -> bool {
        matches!(self, PrefetchError::HttpClient(_) | PrefetchError::ExternalApi(_))
    }
}

pub type PrefetchResult<T> = Result<T, PrefetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_api_is_upstream() {
        let err = PrefetchError::ExternalApi("503".to_string());
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "External API error: 503");
    }

    #[test]
    fn test_internal_is_not_upstream() {
        let err = PrefetchError::Internal("join error".to_string());
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_serialization_error_converts() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: PrefetchError = json_err.into();
        assert!(matches!(err, PrefetchError::Serialization(_)));
    }
}
