use thiserror::Error;

/// Failures of the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is corrupt")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize store snapshot")]
    Serialize(#[source] serde_json::Error),

    #[error("store worker stopped before finishing")]
    Worker(#[source] tokio::task::JoinError),
}

/// Failures of the upstream provider collaborator.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to weather provider failed")]
    Network(#[source] reqwest::Error),

    #[error("weather provider did not answer in time")]
    Timeout,

    #[error("weather provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("weather provider returned an unreadable payload: {0}")]
    Decode(String),
}

/// Outcome categories of a gate request. Messages are generic; provider
/// details are only logged.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("unauthorized credential")]
    InvalidCredential,

    #[error("hourly request limit exceeded")]
    QuotaExceeded,

    #[error("weather provider is unavailable")]
    UpstreamUnavailable,

    #[error("weather provider returned invalid data")]
    UpstreamDataInvalid,

    #[error("storage is unavailable")]
    Persistence(#[from] StoreError),
}

impl GateError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::InvalidCredential => "invalid_credential",
            GateError::QuotaExceeded => "quota_exceeded",
            GateError::UpstreamUnavailable => "upstream_unavailable",
            GateError::UpstreamDataInvalid => "upstream_data_invalid",
            GateError::Persistence(_) => "persistence_error",
        }
    }

    /// HTTP-style status an endpoint layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::InvalidCredential => 401,
            GateError::QuotaExceeded => 429,
            GateError::UpstreamUnavailable => 503,
            GateError::UpstreamDataInvalid => 502,
            GateError::Persistence(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::UpstreamUnavailable | GateError::Persistence(_))
    }
}

impl From<ProviderError> for GateError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Decode(_) => GateError::UpstreamDataInvalid,
            // The provider rejected the request itself (unknown city and the like).
            ProviderError::Status { status: 400..=499, .. } => GateError::UpstreamDataInvalid,
            ProviderError::Network(_) | ProviderError::Timeout | ProviderError::Status { .. } => {
                GateError::UpstreamUnavailable
            }
        }
    }
}
