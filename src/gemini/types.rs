//! Tipos de dados para a API Gemini `generateContent`.
//!
//! As structs seguem o JSON camelCase do endpoint
//! `models/{model}:generateContent` da Google Generative Language API.

use serde::{Deserialize, Serialize};

/// Corpo da requisição para o endpoint `generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Conteúdo da conversa: aqui, sempre uma única mensagem de usuário com
    /// o prompt e a imagem.
    pub contents: Vec<Content>,

    /// Instrução de sistema (persona/contexto) opcional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// Limiares de bloqueio por categoria; sempre enviados como `BLOCK_NONE`.
    pub safety_settings: Vec<SafetySetting>,
}

/// Bloco de conteúdo composto por partes (texto e/ou imagem).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Content {
    /// Mensagem de usuário com as partes dadas.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            parts,
            role: Some("user".to_string()),
        }
    }

    /// Instrução de sistema: só texto, sem papel.
    pub fn system(text: &str) -> Self {
        Self {
            parts: vec![Part::text(text)],
            role: None,
        }
    }
}

/// Uma parte de conteúdo: texto ou dados de imagem embutidos.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Imagem embutida já codificada em base64.
    pub fn inline_image(mime_type: impl Into<String>, data: String) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data,
            }),
            ..Self::default()
        }
    }
}

/// Dados binários embutidos (imagem em base64).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Configuração de segurança por categoria de dano.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Categorias de dano reconhecidas pelo endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmCategory {
    HarmCategoryHarassment,
    HarmCategoryHateSpeech,
    HarmCategorySexuallyExplicit,
    HarmCategoryDangerousContent,
}

/// Limiar de bloqueio. Esta ferramenta só envia `BLOCK_NONE`: a filtragem do
/// que legendar é decisão de quem monta a pasta, não do serviço.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
}

/// Bloqueio desativado para todas as categorias.
pub fn permissive_safety_settings() -> Vec<SafetySetting> {
    [
        HarmCategory::HarmCategoryHarassment,
        HarmCategory::HarmCategoryHateSpeech,
        HarmCategory::HarmCategorySexuallyExplicit,
        HarmCategory::HarmCategoryDangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockNone,
    })
    .collect()
}

/// Resposta do endpoint `generateContent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    pub prompt_feedback: Option<PromptFeedback>,
}

/// Um candidato de resposta. `content` pode faltar quando a geração foi
/// bloqueada ou interrompida.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

/// Veredito de segurança sobre o prompt enviado.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl GenerateResponse {
    /// Texto concatenado do primeiro candidato, se houver.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut out = String::new();
        for part in &content.parts {
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }
        (!out.is_empty()).then_some(out)
    }

    /// Motivo de bloqueio ou de parada reportado, para mensagens de erro.
    pub fn refusal_reason(&self) -> Option<&str> {
        if let Some(feedback) = &self.prompt_feedback
            && let Some(reason) = &feedback.block_reason
        {
            return Some(reason);
        }
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
    }
}

/// Envelope de erro retornado pela API em respostas não-2xx.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Detalhe do erro: código HTTP, mensagem e status simbólico
/// (ex.: `RESOURCE_EXHAUSTED`).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub status: String,
}
