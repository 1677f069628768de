//! Result history - user -> discipline -> recorded results

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl HistoryItem {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    pub fn now(value: f64) -> Self {
        Self::new(Utc::now(), value)
    }
}

/// discipline slug -> results
pub type HistoryBySlug = HashMap<String, Vec<HistoryItem>>;

/// Latest item by timestamp, regardless of array order.
/// On equal timestamps the first one wins.
pub fn latest(items: &[HistoryItem]) -> Option<&HistoryItem> {
    let mut best = items.first()?;
    for item in &items[1..] {
        if item.timestamp > best.timestamp {
            best = item;
        }
    }
    Some(best)
}

/// Latest value for a slug in one user's history
pub fn latest_value(by_slug: &HistoryBySlug, slug: &str) -> Option<f64> {
    by_slug
        .get(slug)
        .and_then(|items| latest(items))
        .map(|item| item.value)
}

/// user id -> discipline slug -> results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    users: HashMap<String, HistoryBySlug>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// One user's history (empty if the user has none)
    pub fn for_user(&self, user_id: &str) -> &HistoryBySlug {
        static EMPTY: std::sync::OnceLock<HistoryBySlug> = std::sync::OnceLock::new();
        self.users
            .get(user_id)
            .unwrap_or_else(|| EMPTY.get_or_init(HistoryBySlug::new))
    }

    pub fn items(&self, user_id: &str, slug: &str) -> &[HistoryItem] {
        self.users
            .get(user_id)
            .and_then(|by_slug| by_slug.get(slug))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn latest(&self, user_id: &str, slug: &str) -> Option<&HistoryItem> {
        latest(self.items(user_id, slug))
    }

    pub fn latest_value(&self, user_id: &str, slug: &str) -> Option<f64> {
        self.latest(user_id, slug).map(|item| item.value)
    }

    /// Append a result, keeping the series sorted by time
    pub fn add_result(&mut self, user_id: &str, slug: &str, item: HistoryItem) {
        let series = self
            .users
            .entry(user_id.to_string())
            .or_default()
            .entry(slug.to_string())
            .or_default();
        series.push(item);
        series.sort_by_key(|i| i.timestamp);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HistoryBySlug)> {
        self.users.iter().map(|(id, by_slug)| (id.as_str(), by_slug))
    }

    /// Total number of recorded results
    pub fn len(&self) -> usize {
        self.users
            .values()
            .flat_map(|by_slug| by_slug.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// "YYYY-MM-DD HH:MM UTC"
pub fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}
