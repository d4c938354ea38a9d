use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::Viewer;
use crate::ports::follows::FollowRepository;
use crate::ports::users::UserRepository;
use crate::util::now_ms;

const MAX_USERNAME_LENGTH: usize = 64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at_ms: i64,
}

/// Embedded author/counterpart reference returned by gateway joins.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl UserRef {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }

    /// Fallback when a join returned no row for the referenced id.
    pub fn unresolved(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            username: user_id.clone(),
            user_id,
            avatar_url: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub follower_count: u64,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, follows: Arc<dyn FollowRepository>) -> Self {
        Self { users, follows }
    }

    /// Login-triggered upsert: the first request after an OAuth sign-in
    /// materializes the user row. Concurrent first logins race on the
    /// gateway unique constraint; the loser resolves to the existing row.
    pub async fn sync_profile(&self, viewer: &Viewer) -> DomainResult<User> {
        validate_username(&viewer.username)?;
        if let Some(existing) = self.users.get_by_id(&viewer.user_id).await? {
            return Ok(existing);
        }

        let user = User {
            user_id: viewer.user_id.clone(),
            username: viewer.username.clone(),
            avatar_url: viewer.avatar_url.clone(),
            created_at_ms: now_ms(),
        };
        match self.users.create(&user).await {
            Ok(user) => Ok(user),
            Err(DomainError::Conflict) => self
                .users
                .get_by_id(&viewer.user_id)
                .await?
                .ok_or(DomainError::Conflict),
            Err(err) => Err(err),
        }
    }

    pub async fn get_by_username(&self, username: &str) -> DomainResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::Validation("username is required".into()));
        }
        self.users
            .get_by_username(username)
            .await?
            .ok_or(DomainError::NotFound)
    }

    pub async fn search(&self, query: &str) -> DomainResult<Vec<UserSummary>> {
        let fragment = query.trim();
        if fragment.is_empty() {
            return Err(DomainError::Validation("search query is required".into()));
        }

        let users = self.users.search_by_username_fragment(fragment).await?;
        let mut summaries = Vec::with_capacity(users.len());
        for user in users {
            let follower_count = self.follows.count_followers(&user.user_id).await?;
            summaries.push(UserSummary {
                user,
                follower_count,
            });
        }
        Ok(summaries)
    }
}

fn validate_username(username: &str) -> DomainResult<()> {
    let username = username.trim();
    if username.is_empty() {
        return Err(DomainError::Validation("username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(DomainError::Validation(format!(
            "username exceeds max length of {MAX_USERNAME_LENGTH}"
        )));
    }
    Ok(())
}
