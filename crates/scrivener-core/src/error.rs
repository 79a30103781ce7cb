use scrivener_provider::ProviderError;
use thiserror::Error;

/// Everything a core operation can fail with.
///
/// User-input problems are ordinary variants; only `Storage` reflects an
/// infrastructure fault.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("an account with this email already exists")]
    DuplicateIdentity,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not permitted for this user")]
    Forbidden,

    #[error("validation failed: {0}")]
    Validation(String),

    /// The prompt is still in the log; retrying re-runs generation only.
    #[error("generation temporarily unavailable: {0}")]
    TransientProvider(#[source] ProviderError),

    #[error("generation failed: {0}")]
    FatalProvider(#[source] ProviderError),

    #[error("generation cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        if err.is_transient() {
            CoreError::TransientProvider(err)
        } else {
            CoreError::FatalProvider(err)
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
