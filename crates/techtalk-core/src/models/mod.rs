//! Data models for TechTalk entities.
//!
//! These mirror the JSON payloads of the TechTalk REST backend:
//!
//! - `User`: profiles, including the logged-in identity
//! - `Post`, `Comment`, `TrendingTag`: feed content
//! - `Notification`, `Message`, `Conversation`: activity and direct messages
//! - Request bodies: `NewAccount`, `ProfileUpdate`, `NewPost`, `PostUpdate`, `NewMessage`

pub mod message;
pub mod notification;
pub mod post;
pub mod timestamp;
pub mod user;

pub use message::{Conversation, Message, NewMessage};
pub use notification::{Notification, UnreadCount};
pub use post::{Ack, Comment, NewPost, Post, PostUpdate, TrendingTag};
pub use user::{FollowStatus, NewAccount, ProfileUpdate, User, SECURITY_QUESTIONS};
