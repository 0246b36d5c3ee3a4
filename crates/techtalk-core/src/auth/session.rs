//! The process-wide session: who is logged in, and with which credential.
//!
//! `SessionStore` is the only writer. It runs as one task and applies
//! commands in the order they arrive, so a `login` racing a `logout` never
//! interleaves. Every change is published on a `watch` channel before the
//! caller's reply is sent; once `login` or `logout` returns, all readers see
//! the new session.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, AuthResponse};
use crate::models::{NewAccount, ProfileUpdate, User};

use super::credentials::{Credential, CredentialStorage, StorageError};
use super::gate::AuthGate;
use super::validation::{self, ValidationError};

/// Pending commands before callers start waiting for the store
const COMMAND_BUFFER_SIZE: usize = 32;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { user: User, credential: Credential },
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        match self {
            Session::Authenticated { user, .. } => Some(user),
            Session::Anonymous => None,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Session::Authenticated { credential, .. } => Some(credential),
            Session::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// Bad credentials or a registration conflict; the backend's message
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Could not read stored credential: {0}")]
    Storage(#[from] StorageError),

    #[error("Session store is no longer running")]
    Closed,
}

impl AuthError {
    /// Map a failed login/register call: credential and conflict failures
    /// carry the backend detail, anything else stays an API error.
    fn from_attempt(err: ApiError, fallback: &str) -> Self {
        if matches!(err, ApiError::Unauthorized { .. } | ApiError::Rejected { .. }) {
            AuthError::Rejected(err.user_message(fallback))
        } else {
            AuthError::Api(err)
        }
    }

    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AuthError::Api(e) => e.user_message(fallback),
            other => other.to_string(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, AuthError>>;

enum Command {
    Login {
        identifier: String,
        password: String,
        reply: Reply<User>,
    },
    Register {
        account: NewAccount,
        reply: Reply<User>,
    },
    Logout {
        reply: oneshot::Sender<()>,
    },
    UpdateIdentity {
        update: ProfileUpdate,
        reply: Reply<User>,
    },
    Restore {
        reply: Reply<Option<User>>,
    },
}

/// Owner of the session state and the durable credential.
pub struct SessionStore {
    api: ApiClient,
    storage: Arc<dyn CredentialStorage>,
    state: watch::Sender<Session>,
    commands: mpsc::Receiver<Command>,
}

impl SessionStore {
    /// Start the store on the current tokio runtime and return a handle to it.
    /// The store starts `Anonymous`; call `restore` to pick up a stored credential.
    pub fn spawn(api: &ApiClient, storage: Arc<dyn CredentialStorage>) -> SessionHandle {
        let (state, state_rx) = watch::channel(Session::Anonymous);
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER_SIZE);

        let store = SessionStore {
            api: api.with_session(state_rx.clone()),
            storage,
            state,
            commands: rx,
        };
        tokio::spawn(store.run());

        SessionHandle {
            commands: tx,
            api: api.with_session(state_rx.clone()),
            state: state_rx,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Login {
                    identifier,
                    password,
                    reply,
                } => {
                    let result = self.login(&identifier, &password).await;
                    let _ = reply.send(result);
                }
                Command::Register { account, reply } => {
                    let result = self.register(&account).await;
                    let _ = reply.send(result);
                }
                Command::Logout { reply } => {
                    self.logout();
                    let _ = reply.send(());
                }
                Command::UpdateIdentity { update, reply } => {
                    let result = self.update_identity(&update).await;
                    let _ = reply.send(result);
                }
                Command::Restore { reply } => {
                    let result = self.restore().await;
                    let _ = reply.send(result);
                }
            }
        }
        debug!("Session store stopped");
    }

    async fn login(&mut self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let auth = self
            .api
            .login(identifier, password)
            .await
            .map_err(|e| AuthError::from_attempt(e, "Login failed"))?;
        Ok(self.establish(auth))
    }

    async fn register(&mut self, account: &NewAccount) -> Result<User, AuthError> {
        let auth = self
            .api
            .register(account)
            .await
            .map_err(|e| AuthError::from_attempt(e, "Registration failed"))?;
        Ok(self.establish(auth))
    }

    /// Persist the new credential and publish the authenticated session
    fn establish(&mut self, auth: AuthResponse) -> User {
        let credential = auth.credential();
        if let Err(e) = self.storage.store(&credential) {
            warn!(error = %e, "Failed to persist credential");
        }

        let user = auth.user;
        info!(user_id = user.id, username = %user.username, "Logged in");
        self.state.send_replace(Session::Authenticated {
            user: user.clone(),
            credential,
        });
        user
    }

    fn logout(&mut self) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "Failed to remove stored credential");
        }
        let previous = self.state.send_replace(Session::Anonymous);
        match previous.user() {
            Some(user) => info!(user_id = user.id, "Logged out"),
            None => debug!("Logout while anonymous"),
        }
    }

    async fn update_identity(&mut self, update: &ProfileUpdate) -> Result<User, AuthError> {
        if !self.state.borrow().is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        self.api.update_profile(update).await?;

        let mut updated = None;
        self.state.send_modify(|session| {
            if let Session::Authenticated { user, .. } = session {
                user.apply(update);
                updated = Some(user.clone());
            }
        });
        debug!(bio = update.bio.is_some(), profile_pic = update.profile_pic.is_some(), "Profile updated");
        updated.ok_or(AuthError::NotAuthenticated)
    }

    async fn restore(&mut self) -> Result<Option<User>, AuthError> {
        let credential = match self.storage.load()? {
            Some(credential) => credential,
            None => {
                debug!("No stored credential");
                return Ok(None);
            }
        };

        match self.api.fetch_profile_with(&credential).await {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "Session restored");
                self.state.send_replace(Session::Authenticated {
                    user: user.clone(),
                    credential,
                });
                Ok(Some(user))
            }
            Err(e) => {
                // The stored credential is kept; callers decide whether to log out.
                warn!(error = %e, "Could not restore session from stored credential");
                Err(e.into())
            }
        }
    }
}

/// Cloneable access to the session for every screen.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<Session>,
    api: ApiClient,
}

impl SessionHandle {
    async fn call<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, AuthError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| AuthError::Closed)?;
        rx.await.map_err(|_| AuthError::Closed)
    }

    /// Log in with an email or username.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        validation::validate_login(identifier, password)?;
        self.call(|reply| Command::Login {
            identifier: identifier.to_string(),
            password: password.to_string(),
            reply,
        })
        .await?
    }

    /// Create an account and log in as it.
    pub async fn register(&self, account: NewAccount) -> Result<User, AuthError> {
        validation::validate_new_account(&account)?;
        self.call(|reply| Command::Register { account, reply }).await?
    }

    /// Forget the credential and identity. No backend call is made.
    pub async fn logout(&self) {
        if self.call(|reply| Command::Logout { reply }).await.is_err() {
            warn!("Session store stopped before logout");
        }
    }

    /// Send a profile change and, once the backend confirms it, merge the
    /// provided fields into the current identity.
    pub async fn update_identity(&self, update: ProfileUpdate) -> Result<User, AuthError> {
        self.call(|reply| Command::UpdateIdentity { update, reply })
            .await?
    }

    /// Re-derive the identity for a stored credential via `GET /profile`.
    /// Returns `Ok(None)` when nothing is stored.
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        self.call(|reply| Command::Restore { reply }).await?
    }

    pub fn current_identity(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receiver that observes every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// API client that attaches this session's credential
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn gate(&self) -> AuthGate {
        AuthGate::new(self.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::auth::MemoryStorage;

    fn user() -> User {
        serde_json::from_value(serde_json::json!({
            "id": 42, "username": "alice", "email": "alice@example.com"
        }))
        .unwrap()
    }

    fn unreachable_api() -> ApiClient {
        // Port 9 (discard) is never served in tests; nothing here should connect.
        ApiClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap()
    }

    #[test]
    fn test_session_accessors() {
        let anonymous = Session::default();
        assert!(!anonymous.is_authenticated());
        assert!(anonymous.user().is_none());
        assert!(anonymous.credential().is_none());

        let session = Session::Authenticated {
            user: user(),
            credential: Credential::new("tok"),
        };
        assert!(session.is_authenticated());
        assert_eq!(session.user().map(|u| u.id), Some(42));
        assert_eq!(session.credential().map(Credential::expose), Some("tok"));
    }

    #[test]
    fn test_attempt_errors_keep_backend_detail() {
        let err = AuthError::from_attempt(
            ApiError::Unauthorized {
                detail: Some("Invalid credentials".to_string()),
            },
            "Login failed",
        );
        assert!(matches!(err, AuthError::Rejected(ref m) if m == "Invalid credentials"));

        let err = AuthError::from_attempt(ApiError::Unauthorized { detail: None }, "Login failed");
        assert_eq!(err.to_string(), "Login failed");

        let err = AuthError::from_attempt(
            ApiError::ServerError {
                detail: None,
                body: "boom".to_string(),
            },
            "Login failed",
        );
        assert!(matches!(err, AuthError::Api(ApiError::ServerError { .. })));
        assert_eq!(err.user_message("Login failed"), "Login failed");
    }

    #[tokio::test]
    async fn test_logout_clears_storage_without_backend() {
        let storage = Arc::new(MemoryStorage::with_credential(Credential::new("old")));
        let session = SessionStore::spawn(&unreachable_api(), storage.clone());

        session.logout().await;

        assert!(storage.peek().is_none());
        assert!(session.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_validation_short_circuits() {
        let storage = Arc::new(MemoryStorage::default());
        let session = SessionStore::spawn(&unreachable_api(), storage);

        let err = session.login("", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(ValidationError::Missing(_))));

        let err = session
            .register(NewAccount {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "weak".to_string(),
                security_question: Some("What city were you born in?".to_string()),
                security_answer: Some("Oslo".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(ValidationError::WeakPassword(_))));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_update_identity_requires_session() {
        let session = SessionStore::spawn(&unreachable_api(), Arc::new(MemoryStorage::default()));
        let err = session
            .update_identity(ProfileUpdate::bio("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_restore_without_stored_credential() {
        let session = SessionStore::spawn(&unreachable_api(), Arc::new(MemoryStorage::default()));
        assert_eq!(session.restore().await.unwrap(), None);
        assert!(!session.is_authenticated());
    }
}
