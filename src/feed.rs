//! Activity feed - achievements and coach notes

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::users::random_id;

/// Training days are counted in Moscow time (UTC+3, no DST)
const TRAINING_TZ_OFFSET_SECS: i32 = 3 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedItemType {
    VideoAchievement,
    Note,
}

impl FeedItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedItemType::VideoAchievement => "video_achievement",
            FeedItemType::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video_achievement" => Some(FeedItemType::VideoAchievement),
            "note" => Some(FeedItemType::Note),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    /// Training day the post belongs to
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: FeedItemType,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub discipline_slug: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Training day of an instant
pub fn training_date(ts: DateTime<Utc>) -> NaiveDate {
    FixedOffset::east_opt(TRAINING_TZ_OFFSET_SECS)
        .map(|tz| ts.with_timezone(&tz).date_naive())
        .unwrap_or_else(|| ts.date_naive())
}

impl FeedItem {
    fn new(kind: FeedItemType, user_id: &str, title: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: random_id("f"),
            date: training_date(created_at),
            kind,
            user_id: user_id.to_string(),
            title: title.to_string(),
            text: None,
            discipline_slug: None,
            value: None,
            video_url: None,
            created_at,
        }
    }

    pub fn note(user_id: &str, title: &str, text: Option<String>) -> Self {
        Self {
            text,
            ..Self::new(FeedItemType::Note, user_id, title, Utc::now())
        }
    }

    /// Result with a video proof
    pub fn achievement(user_id: &str, title: &str, slug: &str, value: f64, video_url: &str) -> Self {
        Self {
            discipline_slug: Some(slug.to_string()),
            value: Some(value),
            video_url: Some(video_url.to_string()),
            ..Self::new(FeedItemType::VideoAchievement, user_id, title, Utc::now())
        }
    }
}
