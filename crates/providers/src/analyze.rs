//! Clothing detection on an uploaded photo.

use crate::gateway::{send_chat, Gateway, GatewayError};
use crate::wire::{image_uri, ChatRequest};
use shared::edit::SourceImage;
use shared::settings::GatewaySettings;

const ANALYZE_PROMPT: &str = "Analyze this image and list all clothing items visible on people. Return only a comma-separated list of clothing items. Be specific about colors and types. For example: \"blue jeans, white t-shirt, black sneakers, red jacket\"";

/// Split the model's comma-separated answer into trimmed, non-empty items.
pub fn parse_clothing_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ask the vision model which clothing items are visible.
pub async fn analyze_clothing(
    gateway: &dyn Gateway,
    settings: &GatewaySettings,
    image: &SourceImage,
) -> Result<Vec<String>, GatewayError> {
    let request = ChatRequest::vision(&settings.analysis_model, ANALYZE_PROMPT, image_uri(image));
    let response = send_chat(gateway, &request).await?;
    let text = response
        .first_message()
        .and_then(|m| m.content_text())
        .ok_or_else(|| GatewayError::EmptyResponse("No analysis returned from AI".into()))?;
    let clothing = parse_clothing_list(&text);
    tracing::info!(items = clothing.len(), "clothing detected");
    Ok(clothing)
}
