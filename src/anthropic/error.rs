//! Erros do cliente da API Anthropic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnthropicError {
    /// HTTP 429; `retry_after_ms` vem do cabeçalho `retry-after`.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Qualquer outra resposta 4xx/5xx, com o corpo da resposta.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
