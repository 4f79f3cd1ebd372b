//! Virtual try-on: render a garment photo on a generated model.

use crate::extract::extract_image;
use crate::gateway::{send_chat, Gateway, GatewayError};
use crate::wire::{image_uri, ChatRequest};
use shared::edit::SourceImage;
use shared::settings::GatewaySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    Athletic,
    Slim,
    #[default]
    Average,
    Plus,
    Petite,
}

impl BodyType {
    /// Unknown names fall back to [`BodyType::Average`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "athletic" => BodyType::Athletic,
            "slim" => BodyType::Slim,
            "plus" => BodyType::Plus,
            "petite" => BodyType::Petite,
            _ => BodyType::Average,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BodyType::Athletic => "athletic, fit body with toned muscles",
            BodyType::Slim => "slim, lean body type",
            BodyType::Average => "average, medium body build",
            BodyType::Plus => "plus-size, curvy body type",
            BodyType::Petite => "petite, small frame body type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pose {
    #[default]
    Standing,
    Casual,
    Fashion,
    Sitting,
    Walking,
}

impl Pose {
    /// Unknown names fall back to [`Pose::Standing`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "casual" => Pose::Casual,
            "fashion" => Pose::Fashion,
            "sitting" => Pose::Sitting,
            "walking" => Pose::Walking,
            _ => Pose::Standing,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Pose::Standing => "standing straight, front view, neutral pose",
            Pose::Casual => "casual relaxed pose, slightly turned",
            Pose::Fashion => "fashion model pose, confident stance",
            Pose::Sitting => "sitting casually",
            Pose::Walking => "walking pose, mid-stride",
        }
    }
}

pub fn build_try_on_instruction(body: BodyType, pose: Pose) -> String {
    format!(
        "You are a virtual try-on AI. Place this clothing item on a {} person in a {} pose.

CRITICAL REQUIREMENTS:
1. Create a realistic mannequin or model with the specified body type
2. Place the clothing item naturally on the body, respecting fabric physics and fit
3. Maintain realistic proportions and shadows
4. Ensure the clothing looks like it's actually being worn
5. Professional fashion photography style
6. Clean, well-lit background

Generate a photorealistic image showing how this clothing would look when worn.",
        body.description(),
        pose.description()
    )
}

/// Returns the URI of the generated try-on image.
pub async fn virtual_try_on(
    gateway: &dyn Gateway,
    settings: &GatewaySettings,
    clothing_image: &SourceImage,
    body: BodyType,
    pose: Pose,
) -> Result<String, GatewayError> {
    let request = ChatRequest::vision(
        &settings.edit_model,
        build_try_on_instruction(body, pose),
        image_uri(clothing_image),
    )
    .with_image_output();
    let response = send_chat(gateway, &request).await?;
    response
        .first_message()
        .and_then(extract_image)
        .ok_or_else(|| {
            tracing::error!("no try-on image in gateway reply");
            GatewayError::EmptyResponse(
                "Failed to generate try-on image. Please try again.".into(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use serde_json::json;

    #[test]
    fn unknown_options_use_defaults() {
        assert_eq!(BodyType::parse("PLUS"), BodyType::Plus);
        assert_eq!(BodyType::parse("giant"), BodyType::Average);
        assert_eq!(Pose::parse("walking"), Pose::Walking);
        assert_eq!(Pose::parse(""), Pose::Standing);
        let text = build_try_on_instruction(BodyType::Petite, Pose::Sitting);
        assert!(text.contains("petite, small frame body type person in a sitting casually pose"));
    }

    #[tokio::test]
    async fn returns_generated_image() {
        let gateway = ScriptedGateway::replying(
            200,
            json!({"choices": [{"message": {"images": [{"image_url": {"url": "data:image/png;base64,TRY"}}]}}]}),
        );
        let uri = virtual_try_on(
            &gateway,
            &GatewaySettings::default(),
            &SourceImage::Uri("https://x/shirt.png".into()),
            BodyType::Athletic,
            Pose::Fashion,
        )
        .await
        .unwrap();
        assert_eq!(uri, "data:image/png;base64,TRY");
        assert_eq!(gateway.last_request()["modalities"], json!(["image", "text"]));
    }

    #[tokio::test]
    async fn missing_image_is_an_error() {
        let gateway =
            ScriptedGateway::replying(200, json!({"choices": [{"message": {"content": "hmm"}}]}));
        let err = virtual_try_on(
            &gateway,
            &GatewaySettings::default(),
            &SourceImage::Uri("https://x/shirt.png".into()),
            BodyType::default(),
            Pose::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse(_)));
    }
}
