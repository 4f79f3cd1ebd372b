//! Types that flow through a single clothing-edit request.

use serde::{Deserialize, Serialize};

/// Safety qualifier appended to every prompt before it reaches the gateway.
pub const SAFETY_QUALIFIER: &str =
    " (appropriate, opaque fabric with full coverage, no nudity or explicit content)";

/// The photo to edit, either already addressable or as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImage {
    /// `https://...` or `data:image/...;base64,...`
    Uri(String),
    Bytes { mime: String, data: Vec<u8> },
}

impl SourceImage {
    pub fn byte_len(&self) -> usize {
        match self {
            SourceImage::Uri(uri) => uri.len(),
            SourceImage::Bytes { data, .. } => data.len(),
        }
    }
}

/// One user edit action. Never persisted.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub source_image: SourceImage,
    pub raw_prompt: String,
}

impl EditRequest {
    pub fn new(source_image: SourceImage, raw_prompt: impl Into<String>) -> Self {
        Self {
            source_image,
            raw_prompt: raw_prompt.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationResult {
    pub cleaned_prompt: String,
    /// Matched substrings as written by the user, in order of appearance
    pub removed_terms: Vec<String>,
    pub was_sanitized: bool,
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditOutcome {
    Success {
        edited_image_uri: String,
        sanitized: bool,
        /// Only present when something was stripped
        removed_terms: Option<Vec<String>>,
        cleaned_prompt: Option<String>,
    },
    BlockedByFilter {
        reason: String,
    },
    Refused {
        reason: String,
    },
    RateLimited,
    PaymentRequired,
    UnknownFailure {
        message: String,
    },
}

impl EditOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EditOutcome::Success { .. })
    }

    pub fn edited_image_uri(&self) -> Option<&str> {
        match self {
            EditOutcome::Success {
                edited_image_uri, ..
            } => Some(edited_image_uri),
            _ => None,
        }
    }

    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            EditOutcome::Success {
                sanitized: true,
                removed_terms,
                ..
            } => {
                let terms = removed_terms
                    .as_ref()
                    .map(|t| t.join(", "))
                    .unwrap_or_default();
                format!(
                    "Your clothing has been changed. Some terms were removed from the prompt for safety: {}",
                    terms
                )
            }
            EditOutcome::Success { .. } => {
                "Your clothing has been changed successfully".to_string()
            }
            EditOutcome::BlockedByFilter { reason } => reason.clone(),
            EditOutcome::Refused { reason } => reason.clone(),
            EditOutcome::RateLimited => {
                "Rate limit exceeded. Please try again in a moment.".to_string()
            }
            EditOutcome::PaymentRequired => {
                "Payment required. Please add credits to your AI workspace.".to_string()
            }
            EditOutcome::UnknownFailure { message } => message.clone(),
        }
    }
}
