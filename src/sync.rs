//! Merge of the local result store with records exported from the cloud

use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::history::{History, HistoryItem};
use crate::users::{AvatarType, Role, User};

/// Flat result row as stored by the hosted backend (`results` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub discipline_slug: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Profile row as stored by the hosted backend (`profiles` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatar_type: AvatarType,
    #[serde(default)]
    pub role: Role,
}

impl From<&User> for CloudProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            avatar: u.avatar.clone(),
            avatar_type: u.avatar_type,
            role: u.role,
        }
    }
}

/// Dump of the cloud tables used for import/export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudExport {
    #[serde(default)]
    pub profiles: Vec<CloudProfile>,
    #[serde(default)]
    pub results: Vec<ResultRecord>,
}

/// Sub-second digits kept for result timestamps (the local store keeps milliseconds)
pub const TIMESTAMP_PRECISION: u16 = 3;

/// Group flat records into a history store. Timestamps are cut to
/// millisecond precision so records from the hosted backend compare equal
/// to the copies already stored locally.
pub fn history_from_records(records: &[ResultRecord]) -> History {
    let mut history = History::new();
    for r in records {
        history.add_result(
            &r.user_id,
            &r.discipline_slug,
            HistoryItem::new(r.recorded_at.trunc_subsecs(TIMESTAMP_PRECISION), r.value),
        );
    }
    history
}

/// Flatten a history store back into records, ordered by user, slug and time
pub fn records_from_history(history: &History) -> Vec<ResultRecord> {
    let mut records: Vec<ResultRecord> = history
        .iter()
        .flat_map(|(user_id, by_slug)| {
            by_slug.iter().flat_map(move |(slug, items)| {
                items.iter().map(move |item| ResultRecord {
                    id: None,
                    user_id: user_id.to_string(),
                    discipline_slug: slug.clone(),
                    value: item.value,
                    recorded_at: item.timestamp,
                })
            })
        })
        .collect();

    records.sort_by(|a, b| {
        (&a.user_id, &a.discipline_slug, a.recorded_at)
            .cmp(&(&b.user_id, &b.discipline_slug, b.recorded_at))
    });
    records
}

/// Merge two stores. Per (user, slug) the series are unioned and
/// deduplicated on timestamp; on a clash the remote item wins.
pub fn merge(local: &History, remote: &History) -> History {
    let mut merged = remote.clone();

    for (user_id, by_slug) in local.iter() {
        for (slug, items) in by_slug {
            let remote_ts: HashSet<DateTime<Utc>> =
                merged.items(user_id, slug).iter().map(|r| r.timestamp).collect();
            for item in items.iter().filter(|i| !remote_ts.contains(&i.timestamp)) {
                merged.add_result(user_id, slug, *item);
            }
        }
    }

    dedup_timestamps(merged)
}

/// Remote exports may contain duplicates themselves; keep the first per timestamp
fn dedup_timestamps(history: History) -> History {
    let mut out = History::new();
    for (user_id, by_slug) in history.iter() {
        for (slug, items) in by_slug {
            let mut seen: HashSet<DateTime<Utc>> = HashSet::with_capacity(items.len());
            for item in items {
                if seen.insert(item.timestamp) {
                    out.add_result(user_id, slug, *item);
                }
            }
        }
    }
    out
}
