use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use tracing::debug;

use crate::client::{build_http_client, send_chat_request};
use crate::config::TutorConfig;
use crate::errors::{CallError, TutorResult};
use crate::types::{ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl};

pub const DEFAULT_TRANSCRIBE_INSTRUCTION: &str = "Transcreva exatamente o texto da questão \
    presente nesta imagem, incluindo o enunciado e todas as alternativas. Escreva fórmulas \
    em LaTeX. Não resolva a questão.";

/// Reads question screenshots through a vision-capable chat model
#[derive(Debug, Clone)]
pub struct VisionClient {
    http_client: Client,
    api_url: String,
    api_key: Option<String>,
    model_name: String,
}

impl VisionClient {
    pub fn new(config: &TutorConfig) -> TutorResult<Self> {
        Ok(Self {
            http_client: build_http_client(config.timeout_secs)?,
            api_url: config.vision_api_url().to_string(),
            api_key: config
                .vision_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            model_name: config.vision_model_name().to_string(),
        })
    }

    /// Without a vision key only the screenshot entry point is disabled
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Sends the image inline as a base64 data URL and returns the model's transcription
    pub async fn transcribe(
        &self,
        image: &[u8],
        mime_type: &str,
        instruction: Option<&str>,
    ) -> Result<String, CallError> {
        let api_key = self.api_key.as_deref().ok_or(CallError::Unconfigured)?;

        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(image));
        let request = ChatCompletionRequest {
            model: &self.model_name,
            messages: vec![ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: instruction
                        .unwrap_or(DEFAULT_TRANSCRIBE_INSTRUCTION)
                        .to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ])],
            temperature: 0.0,
            max_tokens: 2048,
        };

        debug!(
            model = %self.model_name,
            image_bytes = image.len(),
            mime_type,
            "Sending transcription request"
        );
        send_chat_request(&self.http_client, &self.api_url, api_key, &request).await
    }
}

/// Guesses an image MIME type from a file extension
pub fn mime_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
