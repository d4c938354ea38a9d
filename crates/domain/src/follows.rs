use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::Viewer;
use crate::ports::follows::FollowRepository;
use crate::users::UserSummary;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Follow {
    pub follower_id: String,
    pub followee_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowToggle {
    pub following: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowRepository>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowRepository>) -> Self {
        Self { follows }
    }

    /// Flips the directed (viewer → followee) edge. `currently_following`
    /// comes from the caller's view state; a duplicate-insert conflict is
    /// success. Self-follows are not rejected here (gateway concern).
    pub async fn toggle(
        &self,
        viewer: &Viewer,
        followee_id: &str,
        currently_following: bool,
    ) -> DomainResult<FollowToggle> {
        if currently_following {
            self.follows.delete(&viewer.user_id, followee_id).await?;
            return Ok(FollowToggle { following: false });
        }

        let follow = Follow {
            follower_id: viewer.user_id.clone(),
            followee_id: followee_id.to_string(),
        };
        match self.follows.insert(&follow).await {
            Ok(_) | Err(DomainError::Conflict) => Ok(FollowToggle { following: true }),
            Err(err) => Err(err),
        }
    }

    pub async fn is_following(&self, viewer_id: &str, followee_id: &str) -> DomainResult<bool> {
        self.follows.exists(viewer_id, followee_id).await
    }

    /// Two independent aggregates over the follow set; never derived from
    /// one another.
    pub async fn counts(&self, user_id: &str) -> DomainResult<FollowCounts> {
        let followers = self.follows.count_followers(user_id).await?;
        let following = self.follows.count_following(user_id).await?;
        Ok(FollowCounts {
            followers,
            following,
        })
    }

    pub async fn list_followers(&self, user_id: &str) -> DomainResult<Vec<UserSummary>> {
        let users = self.follows.list_followers(user_id).await?;
        self.enrich(users).await
    }

    pub async fn list_following(&self, user_id: &str) -> DomainResult<Vec<UserSummary>> {
        let users = self.follows.list_following(user_id).await?;
        self.enrich(users).await
    }

    async fn enrich(&self, users: Vec<crate::users::User>) -> DomainResult<Vec<UserSummary>> {
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
