//! Optimistic local updates: apply a change before the backend confirms it,
//! and undo it if the request fails.

use std::collections::HashSet;
use std::future::Future;

use tracing::warn;

use crate::api::{ApiClient, ApiError};
use crate::models::Post;

/// A reversible change to local view state.
pub trait Delta<S> {
    fn apply(&self, state: &mut S);
    fn revert(&self, state: &mut S);
}

/// Apply `delta` to `state`, await `request`, and revert the delta if the
/// request fails. The request's error is returned unchanged.
pub async fn apply<S, D, Fut, T>(state: &mut S, delta: D, request: Fut) -> Result<T, ApiError>
where
    D: Delta<S>,
    Fut: Future<Output = Result<T, ApiError>>,
{
    delta.apply(state);
    match request.await {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(error = %e, "Request failed, rolling back local change");
            delta.revert(state);
            Err(e)
        }
    }
}

/// Like button state for one post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub count: i64,
}

impl LikeState {
    pub fn from_post(post: &Post) -> Self {
        Self {
            liked: post.is_liked,
            count: post.likes_count,
        }
    }
}

/// Flip a like on or off
pub struct LikeToggle;

impl LikeToggle {
    fn toggle(state: &mut LikeState) {
        state.liked = !state.liked;
        state.count += if state.liked { 1 } else { -1 };
    }
}

impl Delta<LikeState> for LikeToggle {
    fn apply(&self, state: &mut LikeState) {
        Self::toggle(state);
    }

    fn revert(&self, state: &mut LikeState) {
        Self::toggle(state);
    }
}

/// Ids of users the current user follows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowSet(pub HashSet<i64>);

impl FollowSet {
    pub fn contains(&self, user_id: i64) -> bool {
        self.0.contains(&user_id)
    }
}

/// Follow or unfollow one user
pub struct FollowToggle(pub i64);

impl FollowToggle {
    fn toggle(&self, state: &mut FollowSet) {
        if !state.0.remove(&self.0) {
            state.0.insert(self.0);
        }
    }
}

impl Delta<FollowSet> for FollowToggle {
    fn apply(&self, state: &mut FollowSet) {
        self.toggle(state);
    }

    fn revert(&self, state: &mut FollowSet) {
        self.toggle(state);
    }
}

/// Like or unlike `post_id` depending on `state`, updating it optimistically
pub async fn toggle_like(api: &ApiClient, state: &mut LikeState, post_id: i64) -> Result<(), ApiError> {
    let was_liked = state.liked;
    let request = async move {
        if was_liked {
            api.unlike(post_id).await
        } else {
            api.like(post_id).await
        }
    };
    apply(state, LikeToggle, request).await.map(|_| ())
}

/// Follow or unfollow `user_id` depending on `following`, updating it optimistically
pub async fn toggle_follow(
    api: &ApiClient,
    following: &mut FollowSet,
    user_id: i64,
) -> Result<(), ApiError> {
    let was_following = following.contains(user_id);
    let request = async move {
        if was_following {
            api.unfollow(user_id).await
        } else {
            api.follow(user_id).await
        }
    };
    apply(following, FollowToggle(user_id), request)
        .await
        .map(|_| ())
}
