//! Authentication module for the client-side session lifecycle.
//!
//! This module provides:
//! - `SessionStore` / `SessionHandle`: the single owner of who is logged in
//! - `CredentialStorage`: durable storage for the bearer token (keychain,
//!   file or memory)
//! - `AuthGate`: per-screen guard that substitutes a login-required result
//! - `validation`: client-side checks run before any request
//!
//! The session is not cleared when the backend answers 401; callers decide.

pub mod credentials;
pub mod gate;
pub mod session;
pub mod validation;

pub use credentials::{
    open_storage, Credential, CredentialStorage, FileStorage, KeyringStorage, MemoryStorage,
    StorageError, TOKEN_KEY,
};
pub use gate::{Access, AuthGate, Gated, LoginRequired, Screen, ScreenTask};
pub use session::{AuthError, Session, SessionHandle, SessionStore};
pub use validation::ValidationError;
