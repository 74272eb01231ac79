use thiserror::Error;

/// Errors surfaced by the data-plane components: retry exhaustion detail,
/// bootstrap failures the app layer turns into exit codes.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to build http client: {0}")]
    ClientBuild(String),

    #[error("request body was not valid JSON: {0}")]
    InvalidJsonBody(String),

    #[error(transparent)]
    Provider(#[from] llmproxy_provider_core::ProviderError),
}

pub type ProxyResult<T> = Result<T, ProxyError>;
