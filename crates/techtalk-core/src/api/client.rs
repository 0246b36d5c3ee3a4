//! API client for the TechTalk REST backend.
//!
//! `ApiClient` builds every outgoing request from a fixed base URL and a JSON
//! content type, attaches the session's bearer credential when one is held at
//! call time, and turns non-2xx responses into `ApiError`s.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::auth::{Credential, Session};
use crate::config::Config;
use crate::models::{
    Ack, Comment, Conversation, FollowStatus, Message, NewAccount, NewMessage, NewPost,
    Notification, Post, PostUpdate, ProfileUpdate, TrendingTag, UnreadCount, User,
};

use super::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Default number of suggested users requested by the home screen
const SUGGESTED_USERS_LIMIT: u32 = 10;

/// Successful body of `POST /login` and `POST /register`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub user: User,
}

impl AuthResponse {
    pub fn credential(&self) -> Credential {
        Credential::new(self.access_token.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SecurityQuestionResponse {
    security_question: String,
}

/// Everything shown on a profile page, fetched concurrently.
#[derive(Debug, Clone)]
pub struct ProfileOverview {
    pub posts: Vec<Post>,
    pub reposts: Vec<Post>,
    pub followers: Vec<User>,
    pub following: Vec<User>,
}

/// API client for TechTalk.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: watch::Receiver<Session>,
}

impl ApiClient {
    /// Create a client that is not attached to any session.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        // The sender is dropped; the receiver keeps reporting `Anonymous`.
        let (_, session) = watch::channel(Session::Anonymous);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn from_config(config: &Config) -> ApiResult<Self> {
        Self::new(&config.api_url, config.request_timeout())
    }

    /// Create a new ApiClient that reads its credential from `session`,
    /// sharing the connection pool.
    pub fn with_session(&self, session: watch::Receiver<Session>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the next request would carry a credential
    pub fn has_credential(&self) -> bool {
        self.session.borrow().credential().is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build a request, attaching the session credential if one is held now
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path));
        let credential = self.session.borrow().credential().cloned();
        match credential {
            Some(credential) => req.bearer_auth(credential.expose()),
            None => req,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response, authenticated: bool) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            error!(
                credential = if authenticated { "present" } else { "missing" },
                body = %ApiError::truncate_body(&body),
                "401 Unauthorized"
            );
        } else {
            debug!(status = status.as_u16(), "Request failed");
        }
        Err(ApiError::from_status(status, &body))
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let request = req.build()?;
        let authenticated = request.headers().contains_key(header::AUTHORIZATION);
        let url = request.url().path().to_string();
        debug!(method = %request.method(), url = %url, authenticated, "Sending request");

        let response = self.client.execute(request).await?;
        let response = Self::check_response(response, authenticated).await?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute(self.request(Method::GET, path)).await
    }

    async fn get_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ApiResult<T> {
        self.execute(self.request(Method::GET, path).query(query)).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.execute(self.request(Method::POST, path).json(body)).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.execute(self.request(Method::PUT, path).json(body)).await
    }

    async fn send_empty<T: DeserializeOwned>(&self, method: Method, path: &str) -> ApiResult<T> {
        self.execute(self.request(method, path)).await
    }

    // ===== Authentication =====

    /// Exchange an email-or-username and password for a token and profile.
    /// The backend reads either identifier from the `email` field.
    pub async fn login(&self, identifier: &str, password: &str) -> ApiResult<AuthResponse> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            email: &'a str,
            password: &'a str,
        }

        self.post(
            "/login",
            &LoginRequest {
                email: identifier,
                password,
            },
        )
        .await
    }

    pub async fn register(&self, account: &NewAccount) -> ApiResult<AuthResponse> {
        self.post("/register", account).await
    }

    /// Fetch the logged-in user's profile
    pub async fn fetch_profile(&self) -> ApiResult<User> {
        self.get("/profile").await
    }

    /// Fetch the profile that `credential` belongs to, ignoring the session.
    pub async fn fetch_profile_with(&self, credential: &Credential) -> ApiResult<User> {
        let req = self
            .client
            .get(self.url("/profile"))
            .bearer_auth(credential.expose());
        self.execute(req).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<User> {
        self.put("/profile", update).await
    }

    /// Step one of a password reset: returns the account's security question
    pub async fn verify_security_answer(&self, email: &str, answer: &str) -> ApiResult<String> {
        let body = serde_json::json!({ "email": email, "security_answer": answer });
        let response: SecurityQuestionResponse = self.post("/password-reset/verify", &body).await?;
        Ok(response.security_question)
    }

    pub async fn reset_password(
        &self,
        email: &str,
        answer: &str,
        new_password: &str,
    ) -> ApiResult<Ack> {
        let body = serde_json::json!({
            "email": email,
            "security_answer": answer,
            "new_password": new_password,
        });
        self.post("/password-reset/reset", &body).await
    }

    // ===== Users =====

    pub async fn get_user(&self, user_id: i64) -> ApiResult<User> {
        self.get(&format!("/users/{}", user_id)).await
    }

    pub async fn search_users(&self, query: &str) -> ApiResult<Vec<User>> {
        self.get_query("/search/users", &[("q", query)]).await
    }

    pub async fn suggested_users(&self) -> ApiResult<Vec<User>> {
        self.get_query("/users/suggested", &[("limit", SUGGESTED_USERS_LIMIT)])
            .await
    }

    pub async fn user_posts(&self, user_id: i64) -> ApiResult<Vec<Post>> {
        self.get(&format!("/users/{}/posts", user_id)).await
    }

    pub async fn user_reposts(&self, user_id: i64) -> ApiResult<Vec<Post>> {
        self.get(&format!("/users/{}/reposts", user_id)).await
    }

    pub async fn followers(&self, user_id: i64) -> ApiResult<Vec<User>> {
        self.get(&format!("/users/{}/followers", user_id)).await
    }

    pub async fn following(&self, user_id: i64) -> ApiResult<Vec<User>> {
        self.get(&format!("/users/{}/following", user_id)).await
    }

    pub async fn is_following(&self, user_id: i64) -> ApiResult<bool> {
        let status: FollowStatus = self.get(&format!("/users/{}/is-following", user_id)).await?;
        Ok(status.is_following)
    }

    pub async fn follow(&self, user_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::POST, &format!("/users/{}/follow", user_id))
            .await
    }

    pub async fn unfollow(&self, user_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::DELETE, &format!("/users/{}/follow", user_id))
            .await
    }

    /// Posts, reposts, followers and following for a profile page
    pub async fn profile_overview(&self, user_id: i64) -> ApiResult<ProfileOverview> {
        let (posts, reposts, followers, following) = futures::try_join!(
            self.user_posts(user_id),
            self.user_reposts(user_id),
            self.followers(user_id),
            self.following(user_id),
        )?;

        Ok(ProfileOverview {
            posts,
            reposts,
            followers,
            following,
        })
    }

    // ===== Posts =====

    /// Posts from followed users (requires a credential)
    pub async fn feed(&self) -> ApiResult<Vec<Post>> {
        self.get("/feed").await
    }

    pub async fn public_feed(&self) -> ApiResult<Vec<Post>> {
        self.get("/feed/public").await
    }

    pub async fn create_post(&self, post: &NewPost) -> ApiResult<Post> {
        self.post("/posts", post).await
    }

    pub async fn get_post(&self, post_id: i64) -> ApiResult<Post> {
        self.get(&format!("/posts/{}", post_id)).await
    }

    pub async fn update_post(&self, post_id: i64, update: &PostUpdate) -> ApiResult<Post> {
        self.put(&format!("/posts/{}", post_id), update).await
    }

    pub async fn delete_post(&self, post_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::DELETE, &format!("/posts/{}", post_id))
            .await
    }

    /// Full-text post search; also used for topic (hashtag) pages
    pub async fn search_posts(&self, query: &str) -> ApiResult<Vec<Post>> {
        self.get_query("/search/posts", &[("q", query)]).await
    }

    pub async fn comments(&self, post_id: i64) -> ApiResult<Vec<Comment>> {
        self.get(&format!("/posts/{}/comments", post_id)).await
    }

    pub async fn add_comment(&self, post_id: i64, content: &str) -> ApiResult<Comment> {
        let body = serde_json::json!({ "content": content });
        self.post(&format!("/posts/{}/comments", post_id), &body)
            .await
    }

    pub async fn delete_comment(&self, comment_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::DELETE, &format!("/comments/{}", comment_id))
            .await
    }

    pub async fn like(&self, post_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::POST, &format!("/posts/{}/likes", post_id))
            .await
    }

    pub async fn unlike(&self, post_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::DELETE, &format!("/posts/{}/likes", post_id))
            .await
    }

    pub async fn repost(&self, post_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::POST, &format!("/posts/{}/repost", post_id))
            .await
    }

    pub async fn unrepost(&self, post_id: i64) -> ApiResult<Ack> {
        self.send_empty(Method::DELETE, &format!("/posts/{}/repost", post_id))
            .await
    }

    // ===== Notifications =====

    pub async fn notifications(&self) -> ApiResult<Vec<Notification>> {
        self.get("/notifications").await
    }

    pub async fn mark_notification_read(&self, notification_id: i64) -> ApiResult<Ack> {
        self.send_empty(
            Method::PUT,
            &format!("/notifications/{}/read", notification_id),
        )
        .await
    }

    pub async fn mark_all_notifications_read(&self) -> ApiResult<Ack> {
        self.send_empty(Method::PUT, "/notifications/read-all").await
    }

    pub async fn unread_count(&self) -> ApiResult<i64> {
        let count: UnreadCount = self.get("/notifications/unread-count").await?;
        Ok(count.unread_count)
    }

    // ===== Messages =====

    pub async fn send_message(&self, receiver_id: i64, content: &str) -> ApiResult<Message> {
        let body = NewMessage {
            receiver_id,
            content: content.to_string(),
        };
        self.post("/messages", &body).await
    }

    pub async fn conversations(&self) -> ApiResult<Vec<Conversation>> {
        self.get("/messages/conversations").await
    }

    /// Conversation with one user, oldest first. The backend marks the
    /// other user's messages as read.
    pub async fn messages_with(&self, user_id: i64) -> ApiResult<Vec<Message>> {
        self.get(&format!("/messages/{}", user_id)).await
    }

    // ===== Trending =====

    pub async fn trending_tags(&self, limit: u32) -> ApiResult<Vec<TrendingTag>> {
        self.get_query("/trending/tags", &[("limit", limit)]).await
    }

    pub async fn trending_users(&self, limit: u32) -> ApiResult<Vec<User>> {
        self.get_query("/trending/users", &[("limit", limit)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(5))
            .expect("client should build");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/feed"), "http://localhost:8000/feed");
    }

    #[test]
    fn test_detached_client_has_no_credential() {
        let client = ApiClient::new("http://localhost:8000", Duration::from_secs(5))
            .expect("client should build");
        assert!(!client.has_credential());
    }

    #[test]
    fn test_session_credential_read_at_call_time() {
        let base = ApiClient::new("http://localhost:8000", Duration::from_secs(5))
            .expect("client should build");
        let (tx, rx) = watch::channel(Session::Anonymous);
        let client = base.with_session(rx);
        assert!(!client.has_credential());

        let user: User = serde_json::from_value(serde_json::json!({
            "id": 42, "username": "alice", "email": "alice@example.com"
        }))
        .unwrap();
        tx.send_replace(Session::Authenticated {
            user,
            credential: Credential::new("tok"),
        });
        assert!(client.has_credential());

        let request = client.request(Method::GET, "/feed").build().unwrap();
        let values: Vec<_> = request.headers().get_all(header::AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer tok");
    }

    #[test]
    fn test_parse_auth_response() {
        let json = r#"{"access_token":"abc.def","token_type":"bearer","user":{"id":42,"username":"alice","email":"alice@example.com","bio":"","profile_pic":"","created_at":"2024-01-01T00:00:00"}}"#;
        let auth: AuthResponse = serde_json::from_str(json).expect("Failed to parse auth JSON");
        assert_eq!(auth.credential().expose(), "abc.def");
        assert_eq!(auth.user.id, 42);
    }
}
