//! Shared data models used across modules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verification state of a clip's external URL.
///
/// Created as `NotChecked`; only the validate-and-persist path in
/// `services::clips` ever moves a record to `Valid` or `Invalid`, and
/// revalidation may flip it in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifiedStatus {
    NotChecked,
    Valid,
    Invalid,
}

impl VerifiedStatus {
    /// Text form used in the `verified_status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifiedStatus::NotChecked => "not_checked",
            VerifiedStatus::Valid => "valid",
            VerifiedStatus::Invalid => "invalid",
        }
    }

    #[allow(dead_code)]
    pub fn from_str(s: &str) -> Self {
        match s {
            "valid" => VerifiedStatus::Valid,
            "invalid" => VerifiedStatus::Invalid,
            _ => VerifiedStatus::NotChecked,
        }
    }
}

/// Hosting platform of a clip; determines the source label shown to users
/// and whether a thumbnail URL can be derived without a network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Tiktok,
}

impl Platform {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "youtube" => Some(Platform::Youtube),
            "tiktok" => Some(Platform::Tiktok),
            _ => None,
        }
    }

    /// Display string shown next to a clip, derived deterministically
    pub fn source_label(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Tiktok => "TikTok",
        }
    }
}

/// A career clip row from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClipRecord {
    pub id: i64,
    pub career_slug: String,
    pub category_slug: String,
    pub title: String,
    pub platform: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration_secs: i32,
    pub display_order: i32,
    pub verified_status: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub check_fail_reason: Option<String>,
    pub source_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClipRecord {
    pub fn platform(&self) -> Option<Platform> {
        Platform::from_str(&self.platform)
    }
}

/// Consumer-facing clip shape. Deliberately omits `verified_status`,
/// `last_checked_at` and `check_fail_reason` - verification state is
/// internal and never leaks to display consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ClipForDisplay {
    pub id: i64,
    pub career_slug: String,
    pub category_slug: String,
    pub title: String,
    pub platform: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration_secs: i32,
    pub source_label: String,
}

impl From<&ClipRecord> for ClipForDisplay {
    fn from(clip: &ClipRecord) -> Self {
        let source_label = clip
            .source_label
            .clone()
            .or_else(|| clip.platform().map(|p| p.source_label().to_string()))
            .unwrap_or_else(|| clip.platform.clone());

        ClipForDisplay {
            id: clip.id,
            career_slug: clip.career_slug.clone(),
            category_slug: clip.category_slug.clone(),
            title: clip.title.clone(),
            platform: clip.platform.clone(),
            url: clip.url.clone(),
            thumbnail_url: clip.thumbnail_url.clone(),
            duration_secs: clip.duration_secs,
            source_label,
        }
    }
}
