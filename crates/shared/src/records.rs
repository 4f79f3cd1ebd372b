//! Persisted records of the image library.
//!
//! These mirror the rows kept by the library store. Timestamps are UTC;
//! identifiers are UUID v4 strings.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One uploaded (and possibly edited) image and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub original_url: String,
    pub edited_url: Option<String>,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    /// Compared as a set; stored in insertion order
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    pub description: Option<String>,
    /// Key of the blob in the blob store
    pub storage_path: String,
}

impl ImageRecord {
    pub fn new(
        filename: impl Into<String>,
        original_url: impl Into<String>,
        storage_path: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_url: original_url.into(),
            edited_url: None,
            filename: filename.into(),
            uploaded_at,
            tags: Vec::new(),
            is_favorite: false,
            description: None,
            storage_path: storage_path.into(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn favorite(mut self) -> Self {
        self.is_favorite = true;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// The edited image when there is one, the original otherwise
    pub fn display_url(&self) -> &str {
        self.edited_url.as_deref().unwrap_or(&self.original_url)
    }

    /// Format upload time for display
    pub fn formatted_time(&self) -> String {
        self.uploaded_at.format("%Y-%m-%d %H:%M").to_string()
    }

    /// Format relative upload time (e.g., "2 hours ago")
    pub fn relative_time(&self, now: DateTime<Utc>) -> String {
        let duration = now.signed_duration_since(self.uploaded_at);

        if duration.num_seconds() < 60 {
            "just now".to_string()
        } else if duration.num_minutes() < 60 {
            plural(duration.num_minutes(), "minute")
        } else if duration.num_hours() < 24 {
            plural(duration.num_hours(), "hour")
        } else if duration.num_days() < 30 {
            if duration.num_days() == 1 {
                "yesterday".to_string()
            } else {
                format!("{} days ago", duration.num_days())
            }
        } else {
            self.formatted_time()
        }
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// Named group of images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Derived from membership rows when listed
    #[serde(default)]
    pub image_count: usize,
}

/// Reusable editing prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPrompt {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub category: Option<String>,
    pub used_count: u32,
    pub created_at: DateTime<Utc>,
}

/// How long a share link stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareExpiry {
    Never,
    Days(u32),
}

impl ShareExpiry {
    /// Options offered when generating a link.
    pub const CHOICES: [ShareExpiry; 4] = [
        ShareExpiry::Never,
        ShareExpiry::Days(1),
        ShareExpiry::Days(7),
        ShareExpiry::Days(30),
    ];

    pub fn expires_at(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ShareExpiry::Never => None,
            ShareExpiry::Days(days) => Some(from + Duration::days(i64::from(*days))),
        }
    }

    /// Parses "never" or a day count from [`ShareExpiry::CHOICES`].
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("never") {
            return Some(ShareExpiry::Never);
        }
        let days: u32 = value.parse().ok()?;
        Self::CHOICES
            .iter()
            .copied()
            .find(|c| *c == ShareExpiry::Days(days))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareLink {
    pub id: String,
    pub image_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    pub fn url(&self, public_base_url: &str) -> String {
        format!(
            "{}/share/{}",
            public_base_url.trim_end_matches('/'),
            self.token
        )
    }
}

/// One successful edit, kept for usage statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditHistoryEntry {
    pub id: String,
    pub image_id: Option<String>,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptCount {
    pub prompt: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStatistics {
    pub total_images: usize,
    pub total_edits: usize,
    pub top_tags: Vec<TagCount>,
    pub top_prompts: Vec<PromptCount>,
    pub recent_activity: Vec<DailyActivity>,
}
