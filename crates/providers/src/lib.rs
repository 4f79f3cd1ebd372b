//! Calls to the hosted multimodal gateway: clothing edits, clothing
//! analysis, outfit suggestions and virtual try-on.

pub mod analyze;
pub mod edit;
pub mod extract;
pub mod gateway;
pub mod suggestions;
pub mod tryon;
pub mod wire;

pub use analyze::analyze_clothing;
pub use edit::request_edit;
pub use gateway::{Gateway, GatewayError, HttpGateway};
pub use suggestions::{suggest_outfits, OutfitPreferences, OutfitSuggestion};
pub use tryon::{virtual_try_on, BodyType, Pose};
