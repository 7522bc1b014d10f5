//! Tipos de erro para o cliente da API do Arc XP.
//!
//! Define [`ApiError`] com variantes para cada classe de falha que o pipeline
//! precisa distinguir, e [`ErrorKind`], a taxonomia plana gravada nos
//! registros de resultado. Usa `thiserror` para derivar `Display` e `Error`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classe de uma falha, na forma em que aparece nos relatórios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Authentication,
    NotFound,
    Conflict,
    TransientNetwork,
    RateLimited,
    RetriesExhausted,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransientNetwork => "transient-network",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::RetriesExhausted => "retries-exhausted",
            ErrorKind::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// Erros que podem ocorrer ao interagir com a API do Arc XP.
///
/// - [`Authentication`](ApiError::Authentication): HTTP 401/403, interrompe a execução inteira
/// - [`NotFound`](ApiError::NotFound): HTTP 404
/// - [`Conflict`](ApiError::Conflict): HTTP 409/412
/// - [`RateLimited`](ApiError::RateLimited): HTTP 429, retentável
/// - [`Transient`](ApiError::Transient): timeouts, falhas de conexão, 408 e 5xx, retentável
/// - [`RetriesExhausted`](ApiError::RetriesExhausted): produzido pelo governador quando o orçamento acaba
/// - [`Unexpected`](ApiError::Unexpected): resposta malformada ou status não previsto
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict (status {status}): {message}")]
    Conflict { status: u16, message: String },

    /// O campo `retry_after_ms` vem do cabeçalho `Retry-After`, quando presente.
    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ApiError> },

    #[error("unexpected API response: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// Classe da falha, usada pelo governador e pelos registros de resultado.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Conflict { .. } => ErrorKind::Conflict,
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Transient(_) => ErrorKind::TransientNetwork,
            ApiError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            ApiError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// Converte um status HTTP de erro na variante correspondente.
///
/// Função pura; o cliente chama-a com o corpo da resposta como mensagem.
pub fn classify_status(status: u16, message: String, retry_after_ms: Option<u64>) -> ApiError {
    match status {
        401 | 403 => ApiError::Authentication { status, message },
        404 => ApiError::NotFound(message),
        409 | 412 => ApiError::Conflict { status, message },
        429 => ApiError::RateLimited { retry_after_ms },
        408 | 500..=599 => ApiError::Transient(format!("status {status}: {message}")),
        _ => ApiError::Unexpected(format!("status {status}: {message}")),
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return ApiError::Transient(err.to_string());
        }
        if let Some(status) = err.status() {
            return classify_status(status.as_u16(), err.to_string(), None);
        }
        ApiError::Unexpected(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Unexpected(format!("malformed body: {err}"))
    }
}
