use thiserror::Error;

/// Everything that can go wrong while talking to the token API.
///
/// A zero balance or a symbol that the wallet does not hold is never an
/// error: those come back as `Ok(None)` or as an empty record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("{0}")]
    Configuration(String),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("The Graph API authentication failed. Please check your API key.")]
    Authentication,

    #[error("The Graph API access forbidden. Please check your API key permissions.")]
    Authorization,

    #[error("The Graph API rate limit exceeded. Please wait and try again.")]
    RateLimited,

    #[error("Request timeout. The API took too long to respond.")]
    Timeout,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("HTTP error! status: {0}")]
    UpstreamStatus(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(
        "Reached maximum page limit ({max_pages}). There may be more tokens. \
         Consider filtering by token symbols."
    )]
    PageLimitReached { max_pages: u32 },
}

impl BalanceError {
    /// Rate limiting is the only outcome the pagination loop retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BalanceError::RateLimited)
    }

    pub(crate) fn from_status(status: u16) -> Self {
        match status {
            401 => BalanceError::Authentication,
            403 => BalanceError::Authorization,
            429 => BalanceError::RateLimited,
            code => BalanceError::UpstreamStatus(code),
        }
    }
}

pub type Result<T> = std::result::Result<T, BalanceError>;
