pub mod edit;
pub mod errors;
pub mod records;

pub use errors::StudioError;

pub mod settings {
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;

    fn default_timeout_secs() -> u64 {
        120
    }

    /// Connection details for the hosted multimodal gateway.
    ///
    /// The API key is never read from or written to the settings file; it is
    /// injected from the environment at startup.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct GatewaySettings {
        #[serde(skip)]
        pub api_key: Option<String>,
        pub base_url: String,
        pub edit_model: String,     // image-to-image model
        pub analysis_model: String, // text-only / vision model
        #[serde(default = "default_timeout_secs")]
        pub timeout_secs: u64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct StorageSettings {
        /// Holds `library.db` and the `blobs/` directory
        pub data_dir: PathBuf,
        /// Prefix for public blob URLs and share links
        pub public_base_url: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AppSettings {
        pub gateway: GatewaySettings,
        pub storage: StorageSettings,
    }

    impl Default for GatewaySettings {
        fn default() -> Self {
            Self {
                api_key: None,
                base_url: "https://ai.gateway.lovable.dev".into(),
                edit_model: "google/gemini-2.5-flash-image-preview".into(),
                analysis_model: "google/gemini-2.5-flash".into(),
                timeout_secs: default_timeout_secs(),
            }
        }
    }

    impl Default for StorageSettings {
        fn default() -> Self {
            Self {
                data_dir: PathBuf::from("outfit-studio-data"),
                public_base_url: "http://localhost:8080".into(),
            }
        }
    }

    impl Default for AppSettings {
        fn default() -> Self {
            Self {
                gateway: GatewaySettings::default(),
                storage: StorageSettings::default(),
            }
        }
    }
}

pub mod gallery_types {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SortKey {
        #[default]
        Newest,
        Oldest,
        Favorites,
    }

    impl SortKey {
        pub fn as_str(&self) -> &'static str {
            match self {
                SortKey::Newest => "newest",
                SortKey::Oldest => "oldest",
                SortKey::Favorites => "favorites",
            }
        }
    }

    impl fmt::Display for SortKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for SortKey {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "newest" => Ok(SortKey::Newest),
                "oldest" => Ok(SortKey::Oldest),
                "favorites" => Ok(SortKey::Favorites),
                other => Err(format!("unknown sort key: {}", other)),
            }
        }
    }

    /// Criteria for the visible gallery. The default query shows everything,
    /// newest first.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct GalleryQuery {
        pub search: String,
        pub tags: Vec<String>, // AND semantics
        pub favorites_only: bool,
        pub sort: SortKey,
    }
}
