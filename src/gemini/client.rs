use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;

use crate::config::ApiKey;

use super::error::GeminiError;
use super::types::{
    Content, ErrorResponse, GenerateRequest, GenerateResponse, Part, permissive_safety_settings,
};

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Image bytes plus the mime type inferred from the file extension.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageData {
    /// Reads the file and guesses its mime type from the extension.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("image/jpeg")
            .to_string();
        Ok(Self { bytes, mime_type })
    }
}

/// Everything one inference attempt needs. Borrowed from the run state so a
/// retry against another (key, model) pair costs nothing but the call.
#[derive(Debug, Clone, Copy)]
pub struct CaptionRequest<'a> {
    pub api_key: &'a ApiKey,
    pub model: &'a str,
    pub image: &'a ImageData,
    pub prompt: &'a str,
    pub system_instruction: Option<&'a str>,
}

/// One inference call per invocation. Implemented by [`GeminiClient`] and by
/// scripted doubles in tests.
pub trait CaptionSender {
    async fn caption(&self, req: CaptionRequest<'_>) -> Result<String, GeminiError>;
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self { client, base_url }
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptionSender for GeminiClient {
    async fn caption(&self, req: CaptionRequest<'_>) -> Result<String, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            req.model
        );

        let body = GenerateRequest {
            contents: vec![Content::user(vec![
                Part::text(req.prompt),
                Part::inline_image(
                    req.image.mime_type.clone(),
                    general_purpose::STANDARD.encode(&req.image.bytes),
                ),
            ])],
            system_instruction: req.system_instruction.map(Content::system),
            safety_settings: permissive_safety_settings(),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", req.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(parse_api_error(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| GeminiError::Parse(e.to_string()))?;

        match parsed.text() {
            Some(raw) => Ok(normalize_caption(&raw)),
            None => Err(GeminiError::EmptyResponse(
                parsed.refusal_reason().unwrap_or("no candidates").to_string(),
            )),
        }
    }
}

/// Maps a non-2xx response to [`GeminiError::Api`], falling back to the raw
/// body when it is not the structured error envelope.
fn parse_api_error(code: u16, body: &str) -> GeminiError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => GeminiError::Api {
            code: u16::try_from(parsed.error.code).unwrap_or(code),
            status: parsed.error.status,
            message: parsed.error.message,
        },
        Err(_) => GeminiError::Api {
            code,
            status: String::new(),
            message: body.to_string(),
        },
    }
}

/// Trims and folds line breaks so the stored caption is a single line.
pub fn normalize_caption(raw: &str) -> String {
    raw.trim().replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_image() -> ImageData {
        ImageData {
            bytes: b"PNGDATA".to_vec(),
            mime_type: "image/png".to_string(),
        }
    }

    async fn request_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        serde_json::from_slice(&requests[0].body).unwrap()
    }

    #[tokio::test]
    async fn sends_wire_format_and_normalizes_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "AIzaTestKey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "parts": [{"text": "  a cat\nsitting on a mat  "}],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(server.uri());
        let key = ApiKey::new("AIzaTestKey");
        let image = png_image();
        let caption = client
            .caption(CaptionRequest {
                api_key: &key,
                model: "gemini-2.5-flash",
                image: &image,
                prompt: "Describe this image.",
                system_instruction: Some("You caption images."),
            })
            .await
            .unwrap();

        assert_eq!(caption, "a cat sitting on a mat");

        let body = request_body(&server).await;
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Describe this image.");
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["data"],
            "UE5HREFUQQ=="
        );
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You caption images."
        );
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn omits_system_instruction_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(server.uri());
        let key = ApiKey::new("AIzaTestKey");
        let image = png_image();
        client
            .caption(CaptionRequest {
                api_key: &key,
                model: "gemini-2.5-flash",
                image: &image,
                prompt: "Describe this image.",
                system_instruction: None,
            })
            .await
            .unwrap();

        let body = request_body(&server).await;
        assert!(body.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn quota_response_classifies_as_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {
                    "code": 429,
                    "message": "Quota exceeded for quota metric 'GenerateContent requests'",
                    "status": "RESOURCE_EXHAUSTED"
                }
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(server.uri());
        let key = ApiKey::new("AIzaTestKey");
        let image = png_image();
        let err = client
            .caption(CaptionRequest {
                api_key: &key,
                model: "gemini-2.0-flash",
                image: &image,
                prompt: "Describe this image.",
                system_instruction: None,
            })
            .await
            .unwrap_err();

        assert!(err.is_quota_exhausted());
        assert!(matches!(err, GeminiError::Api { code: 429, .. }));
    }

    #[tokio::test]
    async fn invalid_argument_is_an_ordinary_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "Invalid image payload",
                    "status": "INVALID_ARGUMENT"
                }
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(server.uri());
        let key = ApiKey::new("AIzaTestKey");
        let image = png_image();
        let err = client
            .caption(CaptionRequest {
                api_key: &key,
                model: "gemini-2.0-flash",
                image: &image,
                prompt: "Describe this image.",
                system_instruction: None,
            })
            .await
            .unwrap_err();

        assert!(!err.is_quota_exhausted());
        assert!(err.to_string().contains("Invalid image payload"));
    }

    #[tokio::test]
    async fn unstructured_error_body_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(server.uri());
        let key = ApiKey::new("AIzaTestKey");
        let image = png_image();
        let err = client
            .caption(CaptionRequest {
                api_key: &key,
                model: "gemini-2.0-flash",
                image: &image,
                prompt: "Describe this image.",
                system_instruction: None,
            })
            .await
            .unwrap_err();

        match err {
            GeminiError::Api { code, message, .. } => {
                assert_eq!(code, 503);
                assert!(message.contains("upstream unavailable"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_response_is_empty_not_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(server.uri());
        let key = ApiKey::new("AIzaTestKey");
        let image = png_image();
        let err = client
            .caption(CaptionRequest {
                api_key: &key,
                model: "gemini-2.0-flash",
                image: &image,
                prompt: "Describe this image.",
                system_instruction: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GeminiError::EmptyResponse(ref reason) if reason == "SAFETY"));
        assert!(!err.is_quota_exhausted());
    }

    #[test]
    fn normalize_folds_line_breaks_and_trims() {
        assert_eq!(normalize_caption("  a cat  "), "a cat");
        assert_eq!(normalize_caption("line one\nline two"), "line one line two");
        assert_eq!(normalize_caption("line one\r\nline two"), "line one line two");
        assert_eq!(normalize_caption("a\n\nb"), "a  b");
        assert_eq!(normalize_caption("already clean"), "already clean");
    }

    #[test]
    fn image_read_guesses_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"fake png bytes").unwrap();

        let image = ImageData::read(&path).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, b"fake png bytes");
    }

    #[test]
    fn image_read_falls_back_to_jpeg_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.mystery");
        std::fs::write(&path, b"bytes").unwrap();

        let image = ImageData::read(&path).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }
}
