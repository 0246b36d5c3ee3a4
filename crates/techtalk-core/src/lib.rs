//! Core library for the TechTalk social-network client.
//!
//! - `api`: HTTP client for the REST backend
//! - `auth`: session lifecycle, credential storage and the screen auth gate
//! - `config`: client configuration
//! - `models`: backend data types
//! - `optimistic`: apply-then-roll-back updates for likes and follows

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod optimistic;
pub mod utils;

pub use api::{ApiClient, ApiError, ApiResult};
pub use auth::{AuthError, AuthGate, Screen, Session, SessionHandle, SessionStore};
pub use config::Config;
