//! Configuração do legenda carregada a partir de `legenda.toml`.
//!
//! A struct [`CaptionConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `GEMINI_API_KEYS` (lista separada por vírgulas)
//! e `GEMINI_API_KEY` (chave única) têm precedência sobre o arquivo.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CaptionError;
use crate::matrix::MODEL_CATALOG;

/// Nome do arquivo de configuração no diretório atual.
pub const CONFIG_FILE: &str = "legenda.toml";

/// Instrução de tarefa padrão enviada com cada imagem.
pub const DEFAULT_PROMPT: &str = r#"Describe this image in detail.
Do not generate title or chapter headings or needless confirmations such as "Of course." Only generate the description in a single continuous line.
Do not describe the art style or the medium of the image. Example: You don't need to describe the image as "a painting of an anime woman", or "photograph of a woman", just do "a woman...""#;

/// Chave de API do Gemini.
///
/// O valor nunca aparece em logs nem em saídas de `Debug`; use
/// [`ApiKey::as_str`] apenas no ponto em que a requisição é montada.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Valor bruto da chave, para o cabeçalho de autenticação.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Detecta as chaves de exemplo do template que nunca devem ir à API.
    pub fn is_placeholder(&self) -> bool {
        self.0.contains("InsertYour")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

/// Configuração de nível superior carregada de `legenda.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptionConfig {
    /// Chaves da API Gemini, na ordem em que serão usadas.
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,

    /// Pasta padrão com as imagens, quando não passada na linha de comando.
    #[serde(default)]
    pub folder: Option<PathBuf>,

    /// Instrução de tarefa enviada com cada imagem.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Instrução de sistema (persona/contexto) opcional; vazia = omitida.
    #[serde(default)]
    pub system_instruction: String,

    /// Modelo inicial dentro do catálogo de fallback.
    #[serde(default = "default_start_model")]
    pub start_model: String,

    /// Pausa em milissegundos após trocar de chave ou de modelo.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

// Valor padrão para o prompt de tarefa.
fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

// Valor padrão para o modelo inicial: primeiro do catálogo.
fn default_start_model() -> String {
    MODEL_CATALOG[0].to_string()
}

// Valor padrão para a pausa pós-troca: 2000ms.
fn default_cooldown_ms() -> u64 {
    2000
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            folder: None,
            prompt: default_prompt(),
            system_instruction: String::new(),
            start_model: default_start_model(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl CaptionConfig {
    /// Carrega a configuração de `legenda.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, CaptionError> {
        let path = Path::new(CONFIG_FILE);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<CaptionConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env_keys(
            std::env::var("GEMINI_API_KEYS").ok(),
            std::env::var("GEMINI_API_KEY").ok(),
        );
        Ok(config)
    }

    // Precedência das chaves: GEMINI_API_KEYS (lista) vence GEMINI_API_KEY
    // (única), que vence o arquivo. Valores vazios são ignorados.
    fn apply_env_keys(&mut self, key_list: Option<String>, single_key: Option<String>) {
        if let Some(keys) = key_list
            && !keys.is_empty()
        {
            self.api_keys = parse_key_list(&keys);
        } else if let Some(key) = single_key
            && !key.is_empty()
        {
            self.api_keys = vec![ApiKey::new(key)];
        }
    }

    /// Valida os campos necessários para iniciar uma execução.
    pub fn validate(&self) -> Result<(), CaptionError> {
        if self.api_keys.is_empty() {
            return Err(CaptionError::Config(
                "no API keys configured (edit legenda.toml or set GEMINI_API_KEYS)".to_string(),
            ));
        }
        if self.api_keys.iter().any(ApiKey::is_placeholder) {
            return Err(CaptionError::Config(
                "replace the placeholder API keys in legenda.toml with real ones".to_string(),
            ));
        }
        if self.prompt.trim().is_empty() {
            return Err(CaptionError::Config("prompt must not be empty".to_string()));
        }
        Ok(())
    }

    /// Instrução de sistema, se não vazia após trim.
    pub fn system_instruction(&self) -> Option<&str> {
        let trimmed = self.system_instruction.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

// Divide a lista de chaves vinda do ambiente em vírgulas ou quebras de linha.
fn parse_key_list(raw: &str) -> Vec<ApiKey> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ApiKey::new)
        .collect()
}

/// Conteúdo do `legenda.toml` inicial escrito por `legenda init`.
pub const CONFIG_TEMPLATE: &str = r##"# legenda configuration.
#
# Keys are used in order: the first one runs until the API reports its quota
# exhausted, then the next takes over. Once every key has failed for the
# current model, the run moves to the next model in the catalog and starts
# over from the first key.
api_keys = [
    "AIzaSyCInsertYourFirstAPIKeyHere",
    "AIzaSyCInsertYourSecondAPIKeyHere",
    "AIzaSyCInsertYourThirdAPIKeyHere",
]

# Folder containing the images to caption (.png/.jpg/.jpeg/.webp).
folder = "./images"

# Task instruction sent with every image.
prompt = """
Describe this image in detail.
Do not generate title or chapter headings or needless confirmations such as "Of course." Only generate the description in a single continuous line.
Do not describe the art style or the medium of the image. Example: You don't need to describe the image as "a painting of an anime woman", or "photograph of a woman", just do \"a woman...\""""

# Optional system instruction (persona/context). Leave empty to omit.
system_instruction = ""

# Starting model. Run `legenda models` to see the catalog in fallback order.
start_model = "gemini-3-flash-preview"

# Pause in milliseconds after switching key or model.
cooldown_ms = 2000
"##;

/// Escreve o template de configuração em `path`.
/// Recusa-se a sobrescrever um arquivo existente, a menos que `force` seja dado.
pub fn write_template(path: &Path, force: bool) -> Result<(), CaptionError> {
    if path.exists() && !force {
        return Err(CaptionError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    std::fs::write(path, CONFIG_TEMPLATE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = CaptionConfig::default();
        assert!(config.api_keys.is_empty());
        assert!(config.folder.is_none());
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.start_model, "gemini-3-flash-preview");
        assert_eq!(config.cooldown_ms, 2000);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_keys = ["AIzaKeyOne", "AIzaKeyTwo"]
            start_model = "gemini-2.5-flash"
        "#;
        let config: CaptionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_keys.len(), 2);
        assert_eq!(config.api_keys[0].as_str(), "AIzaKeyOne");
        assert_eq!(config.start_model, "gemini-2.5-flash");
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.cooldown_ms, 2000);
    }

    #[test]
    fn template_parses_back_to_defaults() {
        let config: CaptionConfig = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.api_keys.len(), 3);
        assert!(config.api_keys.iter().all(ApiKey::is_placeholder));
        assert_eq!(config.folder.as_deref(), Some(Path::new("./images")));
        assert_eq!(config.start_model, MODEL_CATALOG[0]);
        assert_eq!(config.cooldown_ms, 2000);
    }

    #[test]
    fn validate_rejects_missing_and_placeholder_keys() {
        let mut config = CaptionConfig::default();
        assert!(config.validate().is_err());

        config.api_keys = vec![ApiKey::new("AIzaSyCInsertYourFirstAPIKeyHere")];
        assert!(config.validate().is_err());

        config.api_keys = vec![ApiKey::new("AIzaRealLookingKey")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_prompt() {
        let config = CaptionConfig {
            api_keys: vec![ApiKey::new("AIzaRealLookingKey")],
            prompt: "   \n".to_string(),
            ..CaptionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn key_list_splits_on_commas_and_newlines() {
        let keys = parse_key_list("AIzaOne, AIzaTwo\nAIzaThree\n\n");
        let values: Vec<&str> = keys.iter().map(ApiKey::as_str).collect();
        assert_eq!(values, vec!["AIzaOne", "AIzaTwo", "AIzaThree"]);
    }

    #[test]
    fn env_keys_take_precedence_over_the_file() {
        let mut config = CaptionConfig {
            api_keys: vec![ApiKey::new("AIzaFromFile")],
            ..CaptionConfig::default()
        };

        // A lista vence a chave única quando ambas estão presentes.
        config.apply_env_keys(
            Some("AIzaOne, AIzaTwo".to_string()),
            Some("AIzaSingle".to_string()),
        );
        let values: Vec<&str> = config.api_keys.iter().map(ApiKey::as_str).collect();
        assert_eq!(values, vec!["AIzaOne", "AIzaTwo"]);

        // Sem lista, a chave única se aplica.
        config.apply_env_keys(None, Some("AIzaSingle".to_string()));
        assert_eq!(config.api_keys.len(), 1);
        assert_eq!(config.api_keys[0].as_str(), "AIzaSingle");
    }

    #[test]
    fn unset_or_empty_env_leaves_file_keys_alone() {
        let mut config = CaptionConfig {
            api_keys: vec![ApiKey::new("AIzaFromFile")],
            ..CaptionConfig::default()
        };

        config.apply_env_keys(None, None);
        assert_eq!(config.api_keys[0].as_str(), "AIzaFromFile");

        config.apply_env_keys(Some(String::new()), Some(String::new()));
        assert_eq!(config.api_keys[0].as_str(), "AIzaFromFile");
    }

    #[test]
    fn load_falls_back_to_defaults() {
        // No ambiente de teste não há legenda.toml no diretório de trabalho;
        // só campos que o ambiente não sobrescreve são verificados.
        let config = CaptionConfig::load().unwrap();
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.start_model, MODEL_CATALOG[0]);
        assert_eq!(config.cooldown_ms, 2000);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(toml::from_str::<CaptionConfig>("api_keys = \"AIzaNotAList\"").is_err());
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("AIzaSuperSecretValue");
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("AIzaSuperSecretValue"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn system_instruction_empty_means_none() {
        let mut config = CaptionConfig::default();
        assert_eq!(config.system_instruction(), None);

        config.system_instruction = "  You are a captioner.  ".to_string();
        assert_eq!(config.system_instruction(), Some("You are a captioner."));
    }

    #[test]
    fn write_template_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        write_template(&path, false).unwrap();
        assert!(path.exists());

        let err = write_template(&path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        write_template(&path, true).unwrap();
    }
}
