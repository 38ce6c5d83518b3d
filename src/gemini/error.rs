//! Tipos de erro do cliente da API Gemini.
//!
//! A classificação em [`GeminiError::is_quota_exhausted`] é o que decide,
//! no escalonador, entre girar a matriz de chaves/modelos (cota esgotada)
//! e descartar o item (qualquer outra falha).

use thiserror::Error;

/// Erros que podem ocorrer ao pedir uma legenda à API Gemini.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Resposta não-2xx da API, com o status simbólico do corpo quando
    /// presente (ex.: `RESOURCE_EXHAUSTED`).
    #[error("API returned status {code} {status}: {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
    },

    /// Falha de transporte: DNS, conexão recusada, timeout.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A resposta veio sem texto, normalmente por bloqueio de conteúdo.
    #[error("response contains no caption ({0})")]
    EmptyResponse(String),

    /// Falha ao interpretar o JSON da resposta.
    #[error("failed to parse API response: {0}")]
    Parse(String),
}

impl GeminiError {
    /// Indica cota/limite de requisições esgotado para o par (chave, modelo)
    /// atual: HTTP 429, status `RESOURCE_EXHAUSTED` ou a mensagem de cota do
    /// serviço. Tudo o mais é tratado como falha do item, não da chave.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            GeminiError::Api {
                code,
                status,
                message,
            } => *code == 429 || status == "RESOURCE_EXHAUSTED" || message.contains("Quota exceeded"),
            _ => false,
        }
    }
}
