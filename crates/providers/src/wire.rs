//! Wire format of the OpenAI-style chat-completions gateway.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::edit::SourceImage;

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Output modalities, e.g. `["image", "text"]` for image generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
}

impl ChatRequest {
    /// Single user turn with plain text content.
    pub fn text(model: &str, prompt: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: MessageContent::Text(prompt.into()),
            }],
            modalities: None,
        }
    }

    /// Single user turn carrying an instruction and one image.
    pub fn vision(
        model: &str,
        instruction: impl Into<String>,
        image_uri: impl Into<String>,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: instruction.into(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_uri.into(),
                        },
                    },
                ]),
            }],
            modalities: None,
        }
    }

    /// Ask for an image back alongside text.
    pub fn with_image_output(mut self) -> Self {
        self.modalities = Some(vec!["image".into(), "text".into()]);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

// ── Response types ───────────────────────────────────────────────────
//
// The gateway fronts several models whose replies differ in shape, so the
// loosely-typed parts stay as `serde_json::Value`.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Upstream provider's own reason, e.g. `PROHIBITED_CONTENT`
    #[serde(default)]
    pub native_finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub refusal: Option<Value>,
    #[serde(default)]
    pub images: Option<Vec<Value>>,
}

impl ChatResponse {
    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }

    pub fn first_message(&self) -> Option<&ResponseMessage> {
        self.first_choice().and_then(|c| c.message.as_ref())
    }
}

impl ResponseMessage {
    /// Content when the model replied with a plain string.
    pub fn content_str(&self) -> Option<&str> {
        self.content.as_ref().and_then(Value::as_str)
    }

    /// All textual content, whether sent as a string or as text parts.
    pub fn content_text(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            _ => None,
        }
    }

    /// Whether the structured refusal field carries anything.
    pub fn has_refusal(&self) -> bool {
        match &self.refusal {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }
}

// ── Data URIs ────────────────────────────────────────────────────────

/// URI form of an image for the `image_url` content part.
pub fn image_uri(image: &SourceImage) -> String {
    match image {
        SourceImage::Uri(uri) => uri.clone(),
        SourceImage::Bytes { mime, data } => {
            format!("data:{};base64,{}", mime, STANDARD.encode(data))
        }
    }
}

/// Split a base64 data URI into its mime type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}
