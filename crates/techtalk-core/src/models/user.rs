use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// A TechTalk user as returned by the backend.
///
/// When held by the session this is the logged-in identity; elsewhere it is
/// the author of a post, a follower, a search hit, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_pic: String,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Merge a partial update into this user, touching only the fields it sets.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(ref bio) = update.bio {
            self.bio = bio.clone();
        }
        if let Some(ref profile_pic) = update.profile_pic {
            self.profile_pic = profile_pic.clone();
        }
    }

    pub fn display_bio(&self) -> &str {
        if self.bio.is_empty() {
            "No bio yet"
        } else {
            &self.bio
        }
    }
}

/// Partial profile update sent to `PUT /profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl ProfileUpdate {
    pub fn bio(bio: impl Into<String>) -> Self {
        Self {
            bio: Some(bio.into()),
            ..Self::default()
        }
    }

    pub fn profile_pic(url: impl Into<String>) -> Self {
        Self {
            profile_pic: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bio.is_none() && self.profile_pic.is_none()
    }
}

/// Registration form for `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_answer: Option<String>,
}

/// Security questions offered on the registration screen
pub const SECURITY_QUESTIONS: [&str; 6] = [
    "What was the name of your first pet?",
    "What city were you born in?",
    "What is your mother's maiden name?",
    "What was the name of your elementary school?",
    "What is your favorite book?",
    "What was your childhood nickname?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowStatus {
    pub is_following: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: 42,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            bio: "Rustacean".to_string(),
            profile_pic: "https://img.example.com/alice.png".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_apply_bio_only() {
        let mut user = alice();
        user.apply(&ProfileUpdate::bio("x"));

        assert_eq!(user.bio, "x");
        assert_eq!(user.id, 42);
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.profile_pic, "https://img.example.com/alice.png");
    }

    #[test]
    fn test_apply_empty_update_is_noop() {
        let mut user = alice();
        user.apply(&ProfileUpdate::default());
        assert_eq!(user, alice());
    }

    #[test]
    fn test_parse_backend_user() {
        let json = r#"{"id": 42, "username": "alice", "email": "alice@example.com", "bio": "", "profile_pic": "", "created_at": "2024-03-01T12:30:00.123456"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");

        assert_eq!(user.id, 42);
        assert_eq!(user.display_bio(), "No bio yet");
        let created = user.created_at.expect("created_at should parse");
        assert_eq!(created.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 12:30");
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let body = serde_json::to_value(ProfileUpdate::bio("hello")).unwrap();
        assert_eq!(body, serde_json::json!({"bio": "hello"}));
    }
}
