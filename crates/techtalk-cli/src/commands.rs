//! Subcommand handlers. Each one plays the part of a single client screen.

use std::future::Future;
use std::io::{self, Write};

use anyhow::{anyhow, bail, Context as _, Result};
use tracing::{debug, info, warn};

use techtalk_core::api::ApiClient;
use techtalk_core::auth::{validation, Gated, Screen};
use techtalk_core::models::{NewAccount, NewPost, ProfileUpdate, User, SECURITY_QUESTIONS};
use techtalk_core::optimistic::{self, FollowSet, LikeState};
use techtalk_core::{ApiError, AuthError, Config, SessionHandle};

use crate::output;
use crate::Command;

pub struct Context {
    pub session: SessionHandle,
    pub config: Config,
    pub json: bool,
}

impl Context {
    fn api(&self) -> &ApiClient {
        self.session.api()
    }

    /// Identity for actions that need a login, outside of any screen
    fn require_user(&self) -> Result<User> {
        self.session
            .current_identity()
            .ok_or_else(|| anyhow!(AuthError::NotAuthenticated))
    }

    /// Run `load` for `screen` through the auth gate. Ctrl-C cancels the load.
    /// Returns `None` when the gate showed the login-required message instead.
    async fn open_screen<T, F, Fut>(&self, screen: Screen, load: F) -> Result<Option<T>>
    where
        F: FnOnce(Option<User>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let task = match self.session.gate().spawn(screen, load) {
            Gated::Ready(task) => task,
            Gated::LoginRequired(required) => {
                output::login_required(&required);
                return Ok(None);
            }
        };

        tokio::select! {
            loaded = task.finish() => match loaded {
                Some(result) => result.map(Some),
                None => Err(anyhow!("{} did not finish loading", screen.title())),
            },
            _ = tokio::signal::ctrl_c() => {
                info!(screen = screen.title(), "Cancelled by user");
                Ok(None)
            }
        }
    }
}

/// Error carrying the backend's message, or `fallback` when it sent none
fn api_failure(fallback: &'static str) -> impl Fn(ApiError) -> anyhow::Error {
    move |e| anyhow!(e.user_message(fallback))
}

fn auth_failure(fallback: &'static str) -> impl Fn(AuthError) -> anyhow::Error {
    move |e| anyhow!(e.user_message(fallback))
}

/// Whether `command` should pick up the stored credential first.
/// Logout never talks to the backend, so it skips the profile fetch.
fn restores_session(command: &Command) -> bool {
    !matches!(
        command,
        Command::Login { .. }
            | Command::Register { .. }
            | Command::ResetPassword { .. }
            | Command::Logout
    )
}

/// The first `limit` items, applied before any rendering
fn first_page<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    items.truncate(limit);
    items
}

pub async fn run(ctx: &Context, command: Command) -> Result<()> {
    if restores_session(&command) {
        restore(ctx).await;
    }

    match command {
        Command::Login { identifier } => login(ctx, identifier).await,
        Command::Register {
            username,
            email,
            question,
        } => register(ctx, username, email, question).await,
        Command::Logout => {
            ctx.session.logout().await;
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => whoami(ctx),
        Command::Profile { bio, avatar } => profile(ctx, ProfileUpdate { bio, profile_pic: avatar }).await,
        Command::User { user_id } => user_profile(ctx, user_id).await,
        Command::Feed { limit } => feed(ctx, limit).await,
        Command::Post {
            content,
            image,
            tags,
        } => create_post(ctx, content, image, tags).await,
        Command::Show { post_id } => show_post(ctx, post_id).await,
        Command::Like { post_id } => set_like(ctx, post_id, true).await,
        Command::Unlike { post_id } => set_like(ctx, post_id, false).await,
        Command::Comment { post_id, content } => comment(ctx, post_id, content).await,
        Command::Follow { user_id } => set_follow(ctx, user_id, true).await,
        Command::Unfollow { user_id } => set_follow(ctx, user_id, false).await,
        Command::Notifications { read_all } => notifications(ctx, read_all).await,
        Command::Messages { with_user, send } => messages(ctx, with_user, send).await,
        Command::Search { query } => search(ctx, query).await,
        Command::Trending { limit } => trending(ctx, limit).await,
        Command::ResetPassword { email } => reset_password(ctx, email).await,
    }
}

/// Pick up the stored credential, if any. Failure leaves the session anonymous.
async fn restore(ctx: &Context) {
    match ctx.session.restore().await {
        Ok(Some(user)) => debug!(username = %user.username, "Using stored session"),
        Ok(None) => {}
        Err(AuthError::Api(e)) if e.is_unauthorized() => {
            eprintln!("Your session has expired. Run `techtalk login` to sign in again.");
        }
        Err(e) => warn!(error = %e, "Continuing without stored session"),
    }
}

// ===== Prompts =====

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

/// New password typed twice, checked against the password rules
fn prompt_new_password() -> Result<String> {
    let password = prompt_password("Password: ")?;
    validation::validate_password(&password)?;
    if prompt_password("Confirm password: ")? != password {
        bail!("Passwords do not match");
    }
    Ok(password)
}

// ===== Account =====

async fn login(ctx: &Context, identifier: Option<String>) -> Result<()> {
    let identifier = match identifier.or_else(|| ctx.config.last_username.clone()) {
        Some(identifier) => identifier,
        None => prompt("Email or username: ")?,
    };
    let password = prompt_password("Password: ")?;

    let user = ctx
        .session
        .login(&identifier, &password)
        .await
        .map_err(auth_failure("Login failed"))?;

    if let Err(e) = Config::remember_username(&identifier) {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {}", user.username);
    Ok(())
}

async fn register(
    ctx: &Context,
    username: String,
    email: String,
    question: Option<usize>,
) -> Result<()> {
    let index = match question {
        Some(index) => index,
        None => {
            output::security_questions();
            prompt("Security question number: ")?
                .parse()
                .context("Security question must be a number")?
        }
    };
    let Some(security_question) = SECURITY_QUESTIONS.get(index) else {
        output::security_questions();
        bail!("Unknown security question {}", index);
    };
    let security_answer = prompt(&format!("{} ", security_question))?;
    if security_answer.is_empty() {
        bail!("Security answer is required");
    }

    let account = NewAccount {
        username,
        email,
        password: prompt_new_password()?,
        security_question: Some(security_question.to_string()),
        security_answer: Some(security_answer),
    };

    let user = ctx
        .session
        .register(account)
        .await
        .map_err(auth_failure("Registration failed"))?;
    println!("Welcome to TechTalk, {}!", user.username);
    Ok(())
}

fn whoami(ctx: &Context) -> Result<()> {
    match ctx.session.current_identity() {
        Some(user) if ctx.json => output::json(&user),
        Some(user) => {
            output::user(&user);
            Ok(())
        }
        None => {
            println!("Not logged in");
            Ok(())
        }
    }
}

async fn reset_password(ctx: &Context, email: String) -> Result<()> {
    let answer = prompt("Security answer: ")?;
    let question = ctx
        .api()
        .verify_security_answer(&email, &answer)
        .await
        .map_err(api_failure("Verification failed"))?;
    println!("Verified: {}", question);

    let password = prompt_new_password()?;
    let ack = ctx
        .api()
        .reset_password(&email, &answer, &password)
        .await
        .map_err(api_failure("Password reset failed"))?;
    println!("{}", ack.message);
    Ok(())
}

// ===== Profiles =====

async fn profile(ctx: &Context, update: ProfileUpdate) -> Result<()> {
    if !update.is_empty() {
        if let Err(required) = ctx.session.gate().check(Screen::Profile) {
            output::login_required(&required);
            return Ok(());
        }
        ctx.session
            .update_identity(update)
            .await
            .map_err(auth_failure("Error updating profile"))?;
        println!("Profile updated");
    }

    let api = ctx.api().clone();
    let loaded = ctx
        .open_screen(Screen::Profile, move |user| async move {
            let user = user.ok_or(AuthError::NotAuthenticated)?;
            let overview = api
                .profile_overview(user.id)
                .await
                .map_err(api_failure("Error loading profile"))?;
            Ok::<_, anyhow::Error>((user, overview))
        })
        .await?;

    match loaded {
        Some((user, overview)) => output::profile(&user, &overview, ctx.json),
        None => Ok(()),
    }
}

async fn user_profile(ctx: &Context, user_id: i64) -> Result<()> {
    let api = ctx.api().clone();
    let loaded = ctx
        .open_screen(Screen::UserProfile, move |viewer| async move {
            let (user, overview) = tokio::try_join!(api.get_user(user_id), api.profile_overview(user_id))
                .map_err(api_failure("Error loading profile"))?;
            let following = match viewer {
                Some(viewer) if viewer.id != user_id => Some(
                    api.is_following(user_id)
                        .await
                        .map_err(api_failure("Error loading profile"))?,
                ),
                _ => None,
            };
            Ok::<_, anyhow::Error>((user, overview, following))
        })
        .await?;

    if let Some((user, overview, following)) = loaded {
        output::profile(&user, &overview, ctx.json)?;
        if let Some(following) = following {
            println!("{}", if following { "You follow this user" } else { "You do not follow this user" });
        }
    }
    Ok(())
}

async fn set_follow(ctx: &Context, user_id: i64, follow: bool) -> Result<()> {
    let me = ctx.require_user()?;
    if me.id == user_id {
        bail!("You cannot follow yourself");
    }

    let mut following = FollowSet::default();
    if ctx
        .api()
        .is_following(user_id)
        .await
        .map_err(api_failure("Error loading profile"))?
    {
        following.0.insert(user_id);
    }

    if following.contains(user_id) == follow {
        println!("{}", if follow { "Already following" } else { "Not following" });
        return Ok(());
    }

    optimistic::toggle_follow(ctx.api(), &mut following, user_id)
        .await
        .map_err(api_failure("Error updating follow"))?;
    println!("{}", if following.contains(user_id) { "Followed" } else { "Unfollowed" });
    Ok(())
}

// ===== Posts =====

async fn feed(ctx: &Context, limit: usize) -> Result<()> {
    let api = ctx.api().clone();
    let loaded = ctx
        .open_screen(Screen::Home, move |user| async move {
            // Logged-out visitors see the public feed
            let posts = match user {
                Some(_) => api.feed().await,
                None => api.public_feed().await,
            };
            posts.map_err(api_failure("Error loading feed"))
        })
        .await?;

    match loaded.map(|posts| first_page(posts, limit)) {
        Some(posts) if ctx.json => output::json(&posts),
        Some(posts) => {
            output::posts(posts.iter());
            Ok(())
        }
        None => Ok(()),
    }
}

async fn create_post(
    ctx: &Context,
    content: String,
    image: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    ctx.require_user()?;
    if content.trim().is_empty() {
        bail!("Post content is required");
    }

    let mut new_post = NewPost::new(content).with_tags(&tags);
    if let Some(image) = image {
        new_post = new_post.with_image(image);
    }

    let post = ctx
        .api()
        .create_post(&new_post)
        .await
        .map_err(api_failure("Error creating post"))?;
    println!("Posted #{}", post.id);
    Ok(())
}

async fn show_post(ctx: &Context, post_id: i64) -> Result<()> {
    let api = ctx.api().clone();
    let loaded = ctx
        .open_screen(Screen::Post, move |_| async move {
            tokio::try_join!(api.get_post(post_id), api.comments(post_id))
                .map_err(api_failure("Error loading post"))
        })
        .await?;

    match loaded {
        Some((post, comments)) if ctx.json => {
            output::json(&serde_json::json!({ "post": post, "comments": comments }))
        }
        Some((post, comments)) => {
            output::post(&post);
            output::comments(&comments);
            Ok(())
        }
        None => Ok(()),
    }
}

async fn set_like(ctx: &Context, post_id: i64, like: bool) -> Result<()> {
    ctx.require_user()?;
    let post = ctx
        .api()
        .get_post(post_id)
        .await
        .map_err(api_failure("Error loading post"))?;

    let mut state = LikeState::from_post(&post);
    if state.liked == like {
        println!("{}", if like { "Already liked" } else { "Not liked" });
        return Ok(());
    }

    optimistic::toggle_like(ctx.api(), &mut state, post_id)
        .await
        .map_err(api_failure("Error updating like"))?;
    println!(
        "{} post #{} ({} likes)",
        if state.liked { "Liked" } else { "Unliked" },
        post_id,
        state.count
    );
    Ok(())
}

async fn comment(ctx: &Context, post_id: i64, content: String) -> Result<()> {
    ctx.require_user()?;
    if content.trim().is_empty() {
        bail!("Comment is required");
    }

    let comment = ctx
        .api()
        .add_comment(post_id, &content)
        .await
        .map_err(api_failure("Error adding comment"))?;
    println!("Commented on post #{} (comment #{})", post_id, comment.id);
    Ok(())
}

async fn search(ctx: &Context, query: String) -> Result<()> {
    let api = ctx.api().clone();
    let loaded = ctx
        .open_screen(Screen::Search, move |_| async move {
            tokio::try_join!(api.search_users(&query), api.search_posts(&query))
                .map_err(api_failure("Search failed"))
        })
        .await?;

    match loaded {
        Some((users, posts)) if ctx.json => {
            output::json(&serde_json::json!({ "users": users, "posts": posts }))
        }
        Some((users, posts)) => {
            output::heading("Users");
            output::users(&users);
            output::heading("Posts");
            output::posts(posts.iter());
            Ok(())
        }
        None => Ok(()),
    }
}

async fn trending(ctx: &Context, limit: u32) -> Result<()> {
    let api = ctx.api().clone();
    let loaded = ctx
        .open_screen(Screen::Home, move |_| async move {
            tokio::try_join!(api.trending_tags(limit), api.trending_users(limit))
                .map_err(api_failure("Error loading trending"))
        })
        .await?;

    match loaded {
        Some((tags, users)) if ctx.json => {
            output::json(&serde_json::json!({ "tags": tags, "users": users }))
        }
        Some((tags, users)) => {
            output::heading("Trending tags");
            output::tags(&tags);
            output::heading("Trending users");
            output::users(&users);
            Ok(())
        }
        None => Ok(()),
    }
}

// ===== Notifications and messages =====

async fn notifications(ctx: &Context, read_all: bool) -> Result<()> {
    let api = ctx.api().clone();
    let loaded = ctx
        .open_screen(Screen::Notifications, move |_| async move {
            if read_all {
                api.mark_all_notifications_read()
                    .await
                    .map_err(api_failure("Error updating notifications"))?;
            }
            let loaded = tokio::try_join!(api.notifications(), api.unread_count())
                .map_err(api_failure("Error loading notifications"))?;
            Ok::<_, anyhow::Error>(loaded)
        })
        .await?;

    match loaded {
        Some((notifications, _)) if ctx.json => output::json(&notifications),
        Some((notifications, unread)) => {
            output::heading(&format!("Notifications ({} unread)", unread));
            output::notifications(&notifications);
            Ok(())
        }
        None => Ok(()),
    }
}

async fn messages(ctx: &Context, with_user: Option<i64>, send: Option<String>) -> Result<()> {
    let api = ctx.api().clone();

    let Some(other) = with_user else {
        let loaded = ctx
            .open_screen(Screen::Messages, move |_| async move {
                api.conversations()
                    .await
                    .map_err(api_failure("Error loading conversations"))
            })
            .await?;
        return match loaded {
            Some(conversations) if ctx.json => output::json(&conversations),
            Some(conversations) => {
                output::conversations(&conversations);
                Ok(())
            }
            None => Ok(()),
        };
    };

    let loaded = ctx
        .open_screen(Screen::Messages, move |user| async move {
            let user = user.ok_or(AuthError::NotAuthenticated)?;
            if let Some(content) = send.filter(|c| !c.trim().is_empty()) {
                api.send_message(other, &content)
                    .await
                    .map_err(api_failure("Error sending message"))?;
            }
            let thread = api
                .messages_with(other)
                .await
                .map_err(api_failure("Error loading messages"))?;
            Ok::<_, anyhow::Error>((user, thread))
        })
        .await?;

    match loaded {
        Some((_, thread)) if ctx.json => output::json(&thread),
        Some((user, thread)) => {
            output::thread(&thread, user.id);
            Ok(())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_skips_restore() {
        assert!(!restores_session(&Command::Logout));
        assert!(!restores_session(&Command::Login { identifier: None }));
        assert!(!restores_session(&Command::ResetPassword {
            email: "alice@example.com".to_string()
        }));
        assert!(restores_session(&Command::Whoami));
        assert!(restores_session(&Command::Feed { limit: 20 }));
    }

    #[test]
    fn test_first_page() {
        assert_eq!(first_page(vec![1, 2, 3, 4], 2), vec![1, 2]);
        assert_eq!(first_page(vec![1, 2], 20), vec![1, 2]);
        assert!(first_page(vec![1, 2], 0).is_empty());
    }
}
