//! Outfit suggestions built from the saved wardrobe.

use crate::gateway::{send_chat, Gateway, GatewayError};
use crate::wire::ChatRequest;
use serde::{Deserialize, Serialize};
use shared::records::ImageRecord;
use shared::settings::GatewaySettings;

/// At most this many gallery records are described to the model.
pub const WARDROBE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfitPreferences {
    pub season: String,
    pub occasion: String,
    pub style: String,
}

impl Default for OutfitPreferences {
    fn default() -> Self {
        Self {
            season: "any".into(),
            occasion: "casual".into(),
            style: "versatile".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitSuggestion {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pieces: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tips: String,
    #[serde(default)]
    pub colors: String,
}

/// One line per record, numbered from 1.
pub fn wardrobe_summary(images: &[ImageRecord]) -> String {
    if images.is_empty() {
        return "No images in gallery".to_string();
    }
    images
        .iter()
        .take(WARDROBE_LIMIT)
        .enumerate()
        .map(|(idx, img)| {
            let tags = if img.tags.is_empty() {
                "no tags".to_string()
            } else {
                img.tags.join(", ")
            };
            let desc = img
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or("no description");
            format!("Image {}: Tags: {}, Description: {}", idx + 1, tags, desc)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

pub fn build_stylist_prompt(images: &[ImageRecord], prefs: &OutfitPreferences) -> String {
    format!(
        r#"You are a professional fashion stylist AI. Analyze the user's wardrobe and provide personalized outfit recommendations.

USER'S WARDROBE:
{wardrobe}

PREFERENCES:
- Season: {season}
- Occasion: {occasion}
- Style: {style}

Generate 5 complete outfit recommendations. For EACH outfit provide:
1. A catchy outfit name
2. Which pieces to combine (reference the image numbers)
3. Why this outfit works for the season/occasion
4. Styling tips (accessories, shoes, etc.)
5. Color coordination advice

Format your response as a JSON array with this structure:
[
  {{
    "name": "Outfit name",
    "pieces": ["Image 1", "Image 3"],
    "description": "Why this works",
    "tips": "Styling suggestions",
    "colors": "Color advice"
  }}
]

Be specific, creative, and practical. Only suggest combinations that make sense."#,
        wardrobe = wardrobe_summary(images),
        season = or_default(&prefs.season, "any"),
        occasion = or_default(&prefs.occasion, "casual"),
        style = or_default(&prefs.style, "versatile"),
    )
}

/// Parse the model's answer, tolerating Markdown code fences. Unparseable
/// text comes back as a single free-form suggestion.
pub fn parse_suggestions(text: &str) -> Vec<OutfitSuggestion> {
    let stripped = text.replace("```json", "").replace("```", "");
    let stripped = stripped.trim();
    match serde_json::from_str::<Vec<OutfitSuggestion>>(stripped) {
        Ok(list) => list,
        Err(err) => {
            tracing::warn!(error = %err, "suggestions were not valid JSON");
            vec![OutfitSuggestion {
                name: "AI Suggestions".into(),
                description: stripped.to_string(),
                ..Default::default()
            }]
        }
    }
}

pub async fn suggest_outfits(
    gateway: &dyn Gateway,
    settings: &GatewaySettings,
    images: &[ImageRecord],
    prefs: &OutfitPreferences,
) -> Result<Vec<OutfitSuggestion>, GatewayError> {
    let request = ChatRequest::text(&settings.analysis_model, build_stylist_prompt(images, prefs));
    let response = send_chat(gateway, &request).await?;
    let text = response
        .first_message()
        .and_then(|m| m.content_text())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            tracing::error!("no suggestions in gateway reply");
            GatewayError::EmptyResponse("Failed to generate suggestions. Please try again.".into())
        })?;
    let suggestions = parse_suggestions(&text);
    tracing::info!(count = suggestions.len(), "outfit suggestions received");
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use chrono::Utc;
    use serde_json::json;

    fn record(tags: &[&str], description: Option<&str>) -> ImageRecord {
        let mut rec = ImageRecord::new("a.png", "https://x/a.png", "id/a.png", Utc::now())
            .with_tags(tags.iter().copied());
        rec.description = description.map(str::to_string);
        rec
    }

    #[test]
    fn summary_lines_and_fallbacks() {
        assert_eq!(wardrobe_summary(&[]), "No images in gallery");
        let text = wardrobe_summary(&[
            record(&["denim", "blue"], Some("jacket")),
            record(&[], None),
        ]);
        assert_eq!(
            text,
            "Image 1: Tags: denim, blue, Description: jacket\nImage 2: Tags: no tags, Description: no description"
        );

        let many: Vec<_> = (0..30).map(|_| record(&[], None)).collect();
        assert_eq!(wardrobe_summary(&many).lines().count(), WARDROBE_LIMIT);
    }

    #[test]
    fn fenced_json_is_parsed() {
        let text = "```json\n[{\"name\": \"Weekend\", \"pieces\": [\"Image 1\"], \"tips\": \"loafers\"}]\n```";
        let parsed = parse_suggestions(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Weekend");
        assert_eq!(parsed[0].pieces, vec!["Image 1"]);
        assert_eq!(parsed[0].colors, "");
    }

    #[test]
    fn free_text_becomes_one_suggestion() {
        let parsed = parse_suggestions("Wear the blue jacket with white jeans.");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "AI Suggestions");
        assert_eq!(parsed[0].description, "Wear the blue jacket with white jeans.");
        assert!(parsed[0].pieces.is_empty());
    }

    #[tokio::test]
    async fn prompt_carries_wardrobe_and_preferences() {
        let gateway = ScriptedGateway::replying(
            200,
            json!({"choices": [{"message": {"content": "[{\"name\": \"Layered\"}]"}}]}),
        );
        let prefs = OutfitPreferences {
            season: "winter".into(),
            occasion: String::new(),
            ..Default::default()
        };
        let out = suggest_outfits(
            &gateway,
            &GatewaySettings::default(),
            &[record(&["wool"], None)],
            &prefs,
        )
        .await
        .unwrap();
        assert_eq!(out[0].name, "Layered");

        let sent = gateway.last_request();
        assert_eq!(sent["model"], "google/gemini-2.5-flash");
        let prompt = sent["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("Image 1: Tags: wool, Description: no description"));
        assert!(prompt.contains("- Season: winter"));
        assert!(prompt.contains("- Occasion: casual"));
        assert!(prompt.contains("\"name\": \"Outfit name\""));
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let gateway =
            ScriptedGateway::replying(200, json!({"choices": [{"message": {"content": ""}}]}));
        let err = suggest_outfits(
            &gateway,
            &GatewaySettings::default(),
            &[],
            &OutfitPreferences::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse(_)));
    }
}
