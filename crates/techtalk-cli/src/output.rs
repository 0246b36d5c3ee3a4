//! Plain-text rendering of backend data for the terminal.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use techtalk_core::api::ProfileOverview;
use techtalk_core::auth::LoginRequired;
use techtalk_core::models::{
    Comment, Conversation, Message, Notification, Post, TrendingTag, User, SECURITY_QUESTIONS,
};
use techtalk_core::utils::{time_ago, truncate};

/// Width for one-line previews
const PREVIEW_WIDTH: usize = 72;

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn heading(title: &str) {
    println!("\n{}\n{}", title, "-".repeat(title.chars().count()));
}

pub fn login_required(required: &LoginRequired) {
    let [first, second] = required.next_steps();
    println!("{}", LoginRequired::TITLE);
    println!("{}", LoginRequired::MESSAGE);
    println!(
        "Run `techtalk {}` or `techtalk {}`.",
        first.title().to_lowercase(),
        second.title().to_lowercase()
    );
}

pub fn security_questions() {
    for (i, question) in SECURITY_QUESTIONS.iter().enumerate() {
        eprintln!("  {}: {}", i, question);
    }
}

pub fn user(user: &User) {
    println!("@{} (#{})", user.username, user.id);
    println!("  {}", user.email);
    println!("  {}", user.display_bio());
    if !user.profile_pic.is_empty() {
        println!("  Avatar: {}", user.profile_pic);
    }
    if let Some(joined) = user.created_at {
        println!("  Joined {}", joined.format("%B %Y"));
    }
}

pub fn users(users: &[User]) {
    if users.is_empty() {
        println!("No users found");
    }
    for u in users {
        println!("@{:<20} {}", u.username, truncate(&u.bio, PREVIEW_WIDTH - 22));
    }
}

pub fn profile(user: &User, overview: &ProfileOverview, as_json: bool) -> Result<()> {
    if as_json {
        return json(&serde_json::json!({
            "user": user,
            "posts": overview.posts,
            "reposts": overview.reposts,
            "followers": overview.followers,
            "following": overview.following,
        }));
    }

    self::user(user);
    println!(
        "  {} posts, {} followers, {} following",
        overview.posts.len(),
        overview.followers.len(),
        overview.following.len()
    );
    heading("Posts");
    posts(overview.posts.iter());
    if !overview.reposts.is_empty() {
        heading("Reposts");
        posts(overview.reposts.iter());
    }
    Ok(())
}

pub fn post(post: &Post) {
    let now = Utc::now();
    println!(
        "#{} @{} · {}",
        post.id,
        post.author.username,
        time_ago(post.timestamp, now)
    );
    println!("  {}", post.content);
    if !post.image_url.is_empty() {
        println!("  [image] {}", post.image_url);
    }
    println!(
        "  {} {} likes  {} comments  {} reposts",
        if post.is_liked { "♥" } else { "♡" },
        post.likes_count,
        post.comments_count,
        post.reposts_count
    );
}

pub fn posts<'a>(posts: impl Iterator<Item = &'a Post>) {
    let mut any = false;
    for p in posts {
        any = true;
        post(p);
    }
    if !any {
        println!("No posts yet");
    }
}

pub fn comments(comments: &[Comment]) {
    heading(&format!("Comments ({})", comments.len()));
    let now = Utc::now();
    for c in comments {
        println!("@{} · {}", c.author.username, time_ago(c.timestamp, now));
        println!("  {}", c.content);
    }
}

pub fn tags(tags: &[TrendingTag]) {
    for t in tags {
        println!("#{:<24} {} posts", t.tag, t.count);
    }
}

pub fn notifications(notifications: &[Notification]) {
    if notifications.is_empty() {
        println!("No notifications");
    }
    let now = Utc::now();
    for n in notifications {
        println!(
            "{} [{}] {} · {}",
            if n.read { " " } else { "*" },
            n.kind,
            n.message,
            time_ago(n.timestamp, now)
        );
    }
}

pub fn conversations(conversations: &[Conversation]) {
    if conversations.is_empty() {
        println!("No conversations yet");
    }
    let now = Utc::now();
    for c in conversations {
        let unread = if c.unread_count > 0 {
            format!(" ({} new)", c.unread_count)
        } else {
            String::new()
        };
        println!("@{} (#{}){} · {}", c.user.username, c.user.id, unread, time_ago(c.last_message_time, now));
        println!("  {}", truncate(&c.last_message, PREVIEW_WIDTH));
    }
}

/// Messages oldest first, marking the ones `me` sent
pub fn thread(messages: &[Message], me: i64) {
    let now = Utc::now();
    for m in messages {
        let who = if m.is_from(me) { "you" } else { "them" };
        println!("{:>4}: {} · {}", who, m.content, time_ago(m.timestamp, now));
    }
}
