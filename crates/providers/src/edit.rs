//! Clothing edit orchestration.
//!
//! Sanitizes the prompt, sends the photo and instruction to the gateway's
//! image model, and folds every possible reply or failure into an
//! [`EditOutcome`]. Nothing escapes as an error and nothing is retried.

use crate::extract::{extract_image, is_refusal};
use crate::gateway::{send_chat, Gateway, GatewayError};
use crate::wire::{image_uri, ChatRequest, ChatResponse};
use services::sanitizer::sanitize;
use shared::edit::{EditOutcome, EditRequest, SanitizationResult};
use shared::settings::GatewaySettings;

pub const BLOCKED_MESSAGE: &str = "The AI safety filters blocked this request. Please use a more neutral clothing description (e.g., \"black floral dress\" or \"blue denim jacket\").";
pub const REFUSED_MESSAGE: &str =
    "The AI declined this request. Try a different clothing description.";
pub const NO_IMAGE_MESSAGE: &str = "No edited image returned from AI. The AI may have encountered an issue processing this image.";

/// Full instruction for the image model around an already-cleaned prompt.
pub fn build_instruction(cleaned_prompt: &str) -> String {
    format!(
        "Edit the provided image by changing only the clothing to: {}.

Strict requirements:
- Preserve the person's exact identity (face, skin tone, hair), pose, body shape, and proportions
- Preserve the background, objects, composition, camera angle, and lighting
- Do not alter face, hair, skin, tattoos, accessories, hands, or environment
- No nudity or sexually explicit content; use opaque fabrics and appropriate coverage
- Photorealistic result consistent with the original image",
        cleaned_prompt
    )
}

fn is_content_filtered(response: &ChatResponse) -> bool {
    response
        .first_choice()
        .map(|c| {
            c.finish_reason.as_deref() == Some("content_filter")
                || c.native_finish_reason.as_deref() == Some("PROHIBITED_CONTENT")
        })
        .unwrap_or(false)
}

/// Classify a successfully decoded reply.
pub fn interpret_response(
    response: &ChatResponse,
    sanitization: &SanitizationResult,
) -> EditOutcome {
    if is_content_filtered(response) {
        tracing::warn!("content filter triggered");
        return EditOutcome::BlockedByFilter {
            reason: BLOCKED_MESSAGE.to_string(),
        };
    }

    let Some(message) = response.first_message() else {
        tracing::error!("gateway reply carried no message");
        return EditOutcome::UnknownFailure {
            message: NO_IMAGE_MESSAGE.to_string(),
        };
    };

    if is_refusal(message) {
        tracing::warn!("AI refused the request");
        return EditOutcome::Refused {
            reason: REFUSED_MESSAGE.to_string(),
        };
    }

    match extract_image(message) {
        Some(uri) => {
            tracing::info!(len = uri.len(), "clothing edited");
            let sanitized = sanitization.was_sanitized;
            EditOutcome::Success {
                edited_image_uri: uri,
                sanitized,
                removed_terms: sanitized.then(|| sanitization.removed_terms.clone()),
                cleaned_prompt: sanitized.then(|| sanitization.cleaned_prompt.clone()),
            }
        }
        None => {
            tracing::error!("no image found in gateway reply");
            EditOutcome::UnknownFailure {
                message: NO_IMAGE_MESSAGE.to_string(),
            }
        }
    }
}

fn outcome_for_error(err: GatewayError) -> EditOutcome {
    match err {
        GatewayError::RateLimited => EditOutcome::RateLimited,
        GatewayError::PaymentRequired => EditOutcome::PaymentRequired,
        other => EditOutcome::UnknownFailure {
            message: other.to_string(),
        },
    }
}

/// Run one edit end to end.
pub async fn request_edit(
    gateway: &dyn Gateway,
    settings: &GatewaySettings,
    request: &EditRequest,
) -> EditOutcome {
    let sanitization = sanitize(&request.raw_prompt);
    tracing::info!(prompt = %sanitization.cleaned_prompt, "editing clothing");
    tracing::debug!(image_len = request.source_image.byte_len(), "source image");

    let chat = ChatRequest::vision(
        &settings.edit_model,
        build_instruction(&sanitization.cleaned_prompt),
        image_uri(&request.source_image),
    )
    .with_image_output();

    match send_chat(gateway, &chat).await {
        Ok(response) => interpret_response(&response, &sanitization),
        Err(err) => outcome_for_error(err),
    }
}
