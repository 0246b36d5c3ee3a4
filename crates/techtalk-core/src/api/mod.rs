//! REST API client module for the TechTalk backend.
//!
//! This module provides the `ApiClient` used by every screen to talk to the
//! backend: feed, posts, comments, likes, follows, messages, notifications,
//! search and profile editing.
//!
//! The API uses bearer token authentication. The token is obtained from
//! `/login` or `/register` and attached to each request while a session holds it.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiResult, AuthResponse, ProfileOverview};
pub use error::ApiError;
