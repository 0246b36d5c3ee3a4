//! Screen guard: decides whether a screen may load for the current session.
//!
//! The session is read once per activation. A login that happens while a
//! guarded screen is already showing takes effect on its next activation.

use std::fmt;
use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::User;

use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Loads for everyone; the identity, if any, is passed along
    Public,
    /// Needs a logged-in user
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Home,
    Login,
    Register,
    ForgotPassword,
    Search,
    Topic,
    Post,
    UserProfile,
    Profile,
    Notifications,
    Messages,
}

impl Screen {
    pub fn access(&self) -> Access {
        match self {
            Screen::Profile | Screen::Notifications | Screen::Messages => Access::Required,
            _ => Access::Public,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Home => "Home",
            Screen::Login => "Login",
            Screen::Register => "Register",
            Screen::ForgotPassword => "Forgot Password",
            Screen::Search => "Search",
            Screen::Topic => "Topic",
            Screen::Post => "Post",
            Screen::UserProfile => "User Profile",
            Screen::Profile => "Profile",
            Screen::Notifications => "Notifications",
            Screen::Messages => "Messages",
        }
    }
}

/// Stand-in result for a guarded screen opened without a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginRequired {
    pub screen: Screen,
}

impl LoginRequired {
    pub const TITLE: &'static str = "Login Required";
    pub const MESSAGE: &'static str = "You need to be logged in to access this feature.";

    /// Where the user can go from here
    pub fn next_steps(&self) -> [Screen; 2] {
        [Screen::Login, Screen::Register]
    }
}

impl fmt::Display for LoginRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", Self::TITLE, Self::MESSAGE)
    }
}

impl std::error::Error for LoginRequired {}

#[derive(Debug)]
pub enum Gated<T> {
    Ready(T),
    LoginRequired(LoginRequired),
}

impl<T> Gated<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Gated::Ready(value) => Some(value),
            Gated::LoginRequired(_) => None,
        }
    }

    pub fn is_login_required(&self) -> bool {
        matches!(self, Gated::LoginRequired(_))
    }

    pub fn into_result(self) -> Result<T, LoginRequired> {
        match self {
            Gated::Ready(value) => Ok(value),
            Gated::LoginRequired(required) => Err(required),
        }
    }
}

#[derive(Clone)]
pub struct AuthGate {
    session: watch::Receiver<Session>,
}

impl AuthGate {
    pub fn new(session: watch::Receiver<Session>) -> Self {
        Self { session }
    }

    /// Evaluate the gate for `screen` against the session as it is now.
    pub fn check(&self, screen: Screen) -> Result<Option<User>, LoginRequired> {
        let user = self.session.borrow().user().cloned();
        match (screen.access(), user) {
            (Access::Required, None) => {
                debug!(screen = screen.title(), "Login required");
                Err(LoginRequired { screen })
            }
            (_, user) => Ok(user),
        }
    }

    /// Activate `screen`: run `load` with the current identity, or return the
    /// login-required stand-in without running it.
    pub async fn activate<F, Fut, T>(&self, screen: Screen, load: F) -> Gated<T>
    where
        F: FnOnce(Option<User>) -> Fut,
        Fut: Future<Output = T>,
    {
        match self.check(screen) {
            Ok(user) => Gated::Ready(load(user).await),
            Err(required) => Gated::LoginRequired(required),
        }
    }

    /// Like `activate`, but runs the load on its own task. Dropping the
    /// returned `ScreenTask` (navigating away) aborts the load.
    pub fn spawn<F, Fut, T>(&self, screen: Screen, load: F) -> Gated<ScreenTask<T>>
    where
        F: FnOnce(Option<User>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match self.check(screen) {
            Ok(user) => Gated::Ready(ScreenTask {
                screen,
                handle: Some(tokio::spawn(load(user))),
            }),
            Err(required) => Gated::LoginRequired(required),
        }
    }
}

/// In-flight load for an active screen.
pub struct ScreenTask<T> {
    screen: Screen,
    handle: Option<JoinHandle<T>>,
}

impl<T> ScreenTask<T> {
    /// Wait for the load. Returns `None` if it panicked or was aborted.
    pub async fn finish(mut self) -> Option<T> {
        let handle = self.handle.as_mut()?;
        match handle.await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(screen = self.screen.title(), cancelled = e.is_cancelled(), "Screen load did not complete");
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }
}

impl<T> Drop for ScreenTask<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                debug!(screen = self.screen.title(), "Cancelling screen load");
                handle.abort();
            }
        }
    }
}
