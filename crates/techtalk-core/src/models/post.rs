use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub author: User,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default)]
    pub reposts_count: i64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_reposted: bool,
}

impl Post {
    /// Hashtags mentioned in the post body, without the leading `#`
    pub fn hashtags(&self) -> Vec<&str> {
        self.content
            .split_whitespace()
            .filter_map(|word| word.strip_prefix('#'))
            .map(|tag| tag.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_'))
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    pub fn is_authored_by(&self, user: &User) -> bool {
        self.user_id == user.id
    }
}

/// Body of `POST /posts`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewPost {
    pub content: String,
    pub image_url: String,
    /// Comma-separated tag list
    pub tags: String,
}

impl NewPost {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = tags
            .iter()
            .map(|t| t.as_ref().trim().trim_start_matches('#'))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        self
    }
}

/// Body of `PUT /posts/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct PostUpdate {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub content: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub author: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingTag {
    pub tag: String,
    pub count: i64,
}

/// Plain acknowledgement body, e.g. `{"message": "Post liked"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_with(content: &str) -> Post {
        let json = serde_json::json!({
            "id": 7,
            "user_id": 42,
            "content": content,
            "image_url": "",
            "timestamp": "2024-03-01T12:30:00",
            "author": {"id": 42, "username": "alice", "email": "alice@example.com", "bio": "", "profile_pic": "", "created_at": "2024-01-01T00:00:00"},
            "likes_count": 3
        });
        serde_json::from_value(json).expect("Failed to parse post JSON")
    }

    #[test]
    fn test_parse_post_defaults() {
        let post = post_with("hello");
        assert_eq!(post.likes_count, 3);
        assert_eq!(post.comments_count, 0);
        assert!(!post.is_liked);
        assert_eq!(post.author.username, "alice");
    }

    #[test]
    fn test_hashtags() {
        let post = post_with("Shipping #rust and #async_io today! #");
        assert_eq!(post.hashtags(), vec!["rust", "async_io"]);
    }

    #[test]
    fn test_new_post_tags_joined() {
        let post = NewPost::new("hi").with_tags(&["#rust", " tokio ", ""]);
        assert_eq!(post.tags, "rust,tokio");
    }
}
