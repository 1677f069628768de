//! Users - roles, avatars, edit policy and body measurements

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};

/// Max photo avatar size in bytes (10MB)
pub const MAX_PHOTO_SIZE: usize = 10 * 1024 * 1024;

/// Emoji avatars offered in the profile editor
pub const AVATAR_OPTIONS: &[&str] = &[
    "🏃", "🏋️", "🧘", "🤸", "💪", "🥇", "🏆", "⚡",
    "🔥", "🎯", "👤", "👩", "👨", "🧑", "🦸", "🥷",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AvatarType {
    #[default]
    Emoji,
    Photo,
}

impl AvatarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarType::Emoji => "emoji",
            AvatarType::Photo => "photo",
        }
    }

    /// Guess the type of a stored avatar string
    pub fn detect(avatar: Option<&str>) -> Self {
        match avatar {
            Some(a) if !AVATAR_OPTIONS.contains(&a) => AvatarType::Photo,
            _ => AvatarType::Emoji,
        }
    }
}

/// Body measurements snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurement {
    pub weight: Option<f64>,    // кг
    pub height: Option<f64>,    // рост, см
    pub chest: Option<f64>,     // обхват груди, см
    pub waist: Option<f64>,     // обхват талии, см
    pub hips: Option<f64>,      // обхват бёдер, см
    pub biceps: Option<f64>,    // бицепс, см
    pub shoulders: Option<f64>, // плечи, см
    pub glutes: Option<f64>,    // ягодицы, см
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

impl BodyMeasurement {
    /// (label, value) pairs for the filled fields
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        [
            ("вес", self.weight),
            ("рост", self.height),
            ("грудь", self.chest),
            ("талия", self.waist),
            ("бёдра", self.hips),
            ("бицепс", self.biceps),
            ("плечи", self.shoulders),
            ("ягодицы", self.glutes),
        ]
        .into_iter()
        .filter_map(|(label, v)| v.map(|v| (label, v)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatar_type: AvatarType,
    #[serde(default)]
    pub measurements: Vec<BodyMeasurement>,
}

/// `<prefix>_` + 12 random alphanumerics
pub(crate) fn random_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix)
}

/// Random user id, `u_` + 12 alphanumerics
pub fn new_user_id() -> String {
    random_id("u")
}

impl User {
    pub fn new(name: &str, role: Role) -> Self {
        Self::with_id(new_user_id(), name, role)
    }

    pub fn with_id(id: impl Into<String>, name: &str, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            email: None,
            role,
            avatar: None,
            avatar_type: AvatarType::Emoji,
            measurements: vec![],
        }
    }

    /// Name for tables; blank names fall back to "Пользователь <id prefix>"
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            let prefix: String = self.id.chars().take(4).collect();
            format!("Пользователь {}", prefix)
        } else {
            self.name.clone()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn latest_measurement(&self) -> Option<&BodyMeasurement> {
        self.measurements.iter().max_by_key(|m| m.timestamp)
    }

    /// Last `limit` measurements, newest first
    pub fn measurement_history(&self, limit: usize) -> Vec<&BodyMeasurement> {
        let mut sorted: Vec<_> = self.measurements.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted.truncate(limit);
        sorted
    }
}

pub fn is_admin(user: Option<&User>) -> bool {
    user.is_some_and(User::is_admin)
}

/// Admins may edit anyone, users only themselves
pub fn can_edit_user(current: Option<&User>, target_user_id: &str) -> bool {
    match current {
        None => false,
        Some(u) => u.is_admin() || u.id == target_user_id,
    }
}

/// Same policy as editing: admins log results for anyone
pub fn can_add_results_for(current: Option<&User>, target_user_id: &str) -> bool {
    can_edit_user(current, target_user_id)
}

/// Partial profile update
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub avatar_type: Option<AvatarType>,
    pub role: Option<Role>,
}

impl UserUpdate {
    /// Apply to a user; a blank name is ignored
    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name
            && !name.trim().is_empty()
        {
            user.name = name.clone();
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = Some(avatar.clone());
        }
        if let Some(avatar_type) = self.avatar_type {
            user.avatar_type = avatar_type;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
    }
}

pub fn is_base64_image(s: &str) -> bool {
    s.starts_with("data:image/")
}

/// Decoded size of a base64 data URL payload
fn data_url_size(s: &str) -> usize {
    let payload = s.split_once(',').map(|(_, p)| p).unwrap_or("");
    let padding = payload.chars().rev().take_while(|c| *c == '=').count();
    (payload.len() / 4 * 3).saturating_sub(padding)
}

/// Validate a new avatar: one of the emoji options or a base64 image
/// data URL no larger than `MAX_PHOTO_SIZE`
pub fn avatar_update(avatar: &str) -> Result<UserUpdate> {
    let avatar_type = if is_base64_image(avatar) {
        let size = data_url_size(avatar);
        if size > MAX_PHOTO_SIZE {
            bail!("Photo is too large: {} bytes (max {})", size, MAX_PHOTO_SIZE);
        }
        AvatarType::Photo
    } else if AVATAR_OPTIONS.contains(&avatar) {
        AvatarType::Emoji
    } else {
        bail!("Avatar must be one of {} or a data:image URL", AVATAR_OPTIONS.join(" "));
    };

    Ok(UserUpdate {
        avatar: Some(avatar.to_string()),
        avatar_type: Some(avatar_type),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn measurement(day: u32, weight: f64) -> BodyMeasurement {
        BodyMeasurement {
            weight: Some(weight),
            timestamp: Utc.with_ymd_and_hms(2025, 1, day, 8, 0, 0).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_user_id() {
        let a = new_user_id();
        let b = new_user_id();
        assert!(a.starts_with("u_"));
        assert_eq!(a.len(), 14);
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_name_fallback() {
        let user = User::with_id("abcdef", "   ", Role::User);
        assert_eq!(user.display_name(), "Пользователь abcd");

        let named = User::with_id("abcdef", "Ира", Role::User);
        assert_eq!(named.display_name(), "Ира");
    }

    #[test]
    fn test_edit_policy() {
        let admin = User::with_id("a", "Тренер", Role::Admin);
        let user = User::with_id("u", "Атлет", Role::User);

        assert!(can_edit_user(Some(&admin), "u"));
        assert!(can_edit_user(Some(&user), "u"));
        assert!(!can_edit_user(Some(&user), "a"));
        assert!(!can_edit_user(None, "u"));
        assert!(can_add_results_for(Some(&admin), "anyone"));
        assert!(!can_add_results_for(Some(&user), "anyone"));
        assert!(is_admin(Some(&admin)));
        assert!(!is_admin(None));
    }

    #[test]
    fn test_update_ignores_blank_name() {
        let mut user = User::with_id("u", "Атлет", Role::User);
        let update = UserUpdate {
            name: Some("  ".to_string()),
            role: Some(Role::Admin),
            ..Default::default()
        };
        update.apply(&mut user);

        assert_eq!(user.name, "Атлет");
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_avatar_update_emoji() {
        let update = avatar_update("🥷").unwrap();
        assert_eq!(update.avatar.as_deref(), Some("🥷"));
        assert_eq!(update.avatar_type, Some(AvatarType::Emoji));
        assert!(update.name.is_none());
    }

    #[test]
    fn test_avatar_update_photo() {
        let update = avatar_update("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(update.avatar_type, Some(AvatarType::Photo));
    }

    #[test]
    fn test_avatar_update_rejects_large_photo() {
        let payload = "A".repeat((MAX_PHOTO_SIZE / 3 + 1) * 4);
        let avatar = format!("data:image/jpeg;base64,{}", payload);
        assert!(avatar_update(&avatar).is_err());
    }

    #[test]
    fn test_avatar_update_rejects_unknown() {
        assert!(avatar_update("https://example.com/me.png").is_err());
        assert!(avatar_update("🐙").is_err());
    }

    #[test]
    fn test_measurements() {
        let mut user = User::with_id("u", "Атлет", Role::User);
        assert!(user.latest_measurement().is_none());

        user.measurements = vec![measurement(3, 80.0), measurement(10, 78.5), measurement(1, 81.0)];
        assert_eq!(user.latest_measurement().unwrap().weight, Some(78.5));

        let history = user.measurement_history(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].weight, Some(78.5));
        assert_eq!(history[1].weight, Some(80.0));
    }

    #[test]
    fn test_measurement_fields() {
        let m = measurement(1, 70.0);
        assert_eq!(m.fields(), vec![("вес", 70.0)]);
    }

    #[test]
    fn test_avatar_detect() {
        assert_eq!(AvatarType::detect(Some("💪")), AvatarType::Emoji);
        assert_eq!(AvatarType::detect(Some("data:image/png;base64,AAAA")), AvatarType::Photo);
        assert_eq!(AvatarType::detect(None), AvatarType::Emoji);
        assert!(is_base64_image("data:image/jpeg;base64,xx"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::Admin.as_str(), "admin");
    }
}
