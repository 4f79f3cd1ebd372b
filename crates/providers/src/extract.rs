//! Locating the generated image inside a gateway reply.
//!
//! Models put the image in different places, so extraction is an ordered
//! chain of strategies. The first one that finds something wins.

use crate::wire::ResponseMessage;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/[a-zA-Z+]+;base64,[A-Za-z0-9+/=]+").expect("valid data URI pattern")
});

static REFUSAL_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cannot\s+fulfill|refus").expect("valid refusal pattern"));

type Strategy = fn(&ResponseMessage) -> Option<String>;

/// Strategies in priority order, with names for logging.
pub const IMAGE_STRATEGIES: &[(&str, Strategy)] = &[
    ("images[0].image_url.url", image_url_field),
    ("images[0] as string", bare_image_string),
    ("data URI in content", data_uri_in_content),
];

fn first_image(message: &ResponseMessage) -> Option<&Value> {
    message.images.as_ref()?.first()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `{"images": [{"image_url": {"url": "..."}}]}`
fn image_url_field(message: &ResponseMessage) -> Option<String> {
    first_image(message)?
        .get("image_url")?
        .get("url")?
        .as_str()
        .and_then(non_empty)
}

/// `{"images": ["data:image/png;base64,..."]}`
fn bare_image_string(message: &ResponseMessage) -> Option<String> {
    first_image(message)?.as_str().and_then(non_empty)
}

fn data_uri_in_content(message: &ResponseMessage) -> Option<String> {
    let text = message.content_text()?;
    DATA_URI.find(&text).map(|m| m.as_str().to_string())
}

/// Run the strategy chain over `message`.
pub fn extract_image(message: &ResponseMessage) -> Option<String> {
    IMAGE_STRATEGIES.iter().find_map(|(name, strategy)| {
        let found = strategy(message)?;
        tracing::debug!(strategy = *name, len = found.len(), "generated image located");
        Some(found)
    })
}

/// Whether the model declined, either through the structured refusal field or
/// in its text.
pub fn is_refusal(message: &ResponseMessage) -> bool {
    message.has_refusal()
        || message
            .content_str()
            .map(|text| REFUSAL_PHRASE.is_match(text))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: Value) -> ResponseMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn structured_url_wins_over_everything_else() {
        let msg = message(json!({
            "content": "here: data:image/png;base64,CCCC",
            "images": [{"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}]
        }));
        assert_eq!(extract_image(&msg).as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn bare_string_image_is_second() {
        let msg = message(json!({
            "content": "data:image/png;base64,CCCC",
            "images": ["https://cdn.test/out.png"]
        }));
        assert_eq!(extract_image(&msg).as_deref(), Some("https://cdn.test/out.png"));
    }

    #[test]
    fn data_uri_embedded_in_text_is_last_resort() {
        let msg = message(json!({
            "content": "Here is your image: data:image/jpeg;base64,/9j/4AAQ+== enjoy",
            "images": []
        }));
        assert_eq!(
            extract_image(&msg).as_deref(),
            Some("data:image/jpeg;base64,/9j/4AAQ+==")
        );

        let parts = message(json!({
            "content": [{"type": "text", "text": "data:image/png;base64,QUJD"}]
        }));
        assert_eq!(extract_image(&parts).as_deref(), Some("data:image/png;base64,QUJD"));
    }

    #[test]
    fn nothing_found() {
        assert_eq!(extract_image(&message(json!({"content": "sorry, no image"}))), None);
        assert_eq!(extract_image(&message(json!({"images": [{"image_url": {}}]}))), None);
        assert_eq!(extract_image(&ResponseMessage::default()), None);
    }

    #[test]
    fn refusal_detection() {
        assert!(is_refusal(&message(json!({"refusal": "policy"}))));
        assert!(is_refusal(&message(json!({"content": "I cannot   fulfill this request"}))));
        assert!(is_refusal(&message(json!({"content": "I must Refuse."}))));
        assert!(!is_refusal(&message(json!({"content": "Here is your edited image"}))));
    }
}
