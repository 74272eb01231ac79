use thiserror::Error;

/// Errors surfaced by the provider-facing components: registry loading,
/// token refresh, auth header assembly.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider record in {file}: {reason}")]
    InvalidRecord { file: String, reason: String },

    #[error("duplicate provider prefix '{prefix}' (first seen in {first_file})")]
    DuplicatePrefix { prefix: String, first_file: String },

    #[error("oidc token request failed: {0}")]
    TokenRequest(String),

    #[error("oidc token response missing required field: {0}")]
    TokenFieldMissing(&'static str),

    #[error("missing api key for provider '{0}'")]
    MissingApiKey(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
