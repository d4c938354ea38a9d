use std::sync::Arc;

use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::follows::Follow;
use fizzbuzz_domain::ports::BoxFuture;
use fizzbuzz_domain::ports::follows::FollowRepository;
use fizzbuzz_domain::users::User;
use serde::Deserialize;
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;

use super::memory::MemoryGateway;
use super::support::{invalid_row, map_surreal_error, one_or_many};
use super::users::SurrealUserRow;

pub struct InMemoryFollowRepository {
    gateway: Arc<MemoryGateway>,
}

impl InMemoryFollowRepository {
    pub fn new(gateway: Arc<MemoryGateway>) -> Self {
        Self { gateway }
    }
}

fn resolve_users(gateway: &MemoryGateway, ids: Vec<String>) -> Vec<User> {
    let users = gateway.users.lock().expect("lock");
    ids.into_iter()
        .filter_map(|id| users.get(&id).cloned())
        .collect()
}

impl FollowRepository for InMemoryFollowRepository {
    fn insert(&self, follow: &Follow) -> BoxFuture<'_, DomainResult<Follow>> {
        let follow = follow.clone();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let mut follows = gateway.follows.lock().expect("lock");
            if follows.iter().any(|f| *f == follow) {
                return Err(DomainError::Conflict);
            }
            follows.push(follow.clone());
            Ok(follow)
        })
    }

    fn delete(&self, follower_id: &str, followee_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let follower_id = follower_id.to_string();
        let followee_id = followee_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            gateway
                .follows
                .lock()
                .expect("lock")
                .retain(|f| !(f.follower_id == follower_id && f.followee_id == followee_id));
            Ok(())
        })
    }

    fn exists(&self, follower_id: &str, followee_id: &str) -> BoxFuture<'_, DomainResult<bool>> {
        let follower_id = follower_id.to_string();
        let followee_id = followee_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .follows
                .lock()
                .expect("lock")
                .iter()
                .any(|f| f.follower_id == follower_id && f.followee_id == followee_id))
        })
    }

    fn count_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.followee_id == user_id)
                .count() as u64)
        })
    }

    fn count_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.follower_id == user_id)
                .count() as u64)
        })
    }

    fn list_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let user_id = user_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let ids: Vec<String> = gateway
                .follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.followee_id == user_id)
                .map(|f| f.follower_id.clone())
                .collect();
            Ok(resolve_users(&gateway, ids))
        })
    }

    fn list_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let user_id = user_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let ids: Vec<String> = gateway
                .follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.follower_id == user_id)
                .map(|f| f.followee_id.clone())
                .collect();
            Ok(resolve_users(&gateway, ids))
        })
    }
}

pub struct SurrealFollowRepository {
    client: Arc<Surreal<Client>>,
}

#[derive(Debug, Deserialize)]
struct SurrealCountRow {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SurrealFollowEdgeRow {
    #[serde(default, deserialize_with = "one_or_many")]
    user: Vec<SurrealUserRow>,
}

impl SurrealFollowRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn decode_count(rows: Vec<Value>) -> DomainResult<u64> {
        let Some(row) = rows.into_iter().next() else {
            return Ok(0);
        };
        let row: SurrealCountRow = serde_json::from_value(row).map_err(invalid_row)?;
        Ok(row.count)
    }

    fn decode_edge_users(rows: Vec<Value>) -> DomainResult<Vec<User>> {
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let row: SurrealFollowEdgeRow = serde_json::from_value(row).map_err(invalid_row)?;
            if let Some(user_row) = row.user.into_iter().next() {
                users.push(user_row.into_user()?);
            }
        }
        Ok(users)
    }
}

impl FollowRepository for SurrealFollowRepository {
    fn insert(&self, follow: &Follow) -> BoxFuture<'_, DomainResult<Follow>> {
        let follow = follow.clone();
        let client = self.client.clone();
        Box::pin(async move {
            client
                .query(
                    "CREATE type::record('follow', string::concat($follower_id, '_', $followee_id)) SET \
                        follower_id = $follower_id, \
                        followee_id = $followee_id, \
                        created_at = time::now()",
                )
                .bind(("follower_id", follow.follower_id.clone()))
                .bind(("followee_id", follow.followee_id.clone()))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(follow)
        })
    }

    fn delete(&self, follower_id: &str, followee_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let follower_id = follower_id.to_string();
        let followee_id = followee_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            client
                .query(
                    "DELETE follow \
                     WHERE follower_id = $follower_id AND followee_id = $followee_id",
                )
                .bind(("follower_id", follower_id))
                .bind(("followee_id", followee_id))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(())
        })
    }

    fn exists(&self, follower_id: &str, followee_id: &str) -> BoxFuture<'_, DomainResult<bool>> {
        let follower_id = follower_id.to_string();
        let followee_id = followee_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT follower_id FROM follow \
                     WHERE follower_id = $follower_id AND followee_id = $followee_id LIMIT 1",
                )
                .bind(("follower_id", follower_id))
                .bind(("followee_id", followee_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Ok(!rows.is_empty())
        })
    }

    fn count_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT count() AS count FROM follow \
                     WHERE followee_id = $user_id GROUP ALL",
                )
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_count(rows)
        })
    }

    fn count_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT count() AS count FROM follow \
                     WHERE follower_id = $user_id GROUP ALL",
                )
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_count(rows)
        })
    }

    fn list_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT follower_id, \
                        (SELECT user_id, username, avatar_url, <string>created_at AS created_at \
                           FROM user WHERE user_id = $parent.follower_id) AS user \
                     FROM follow WHERE followee_id = $user_id",
                )
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_edge_users(rows)
        })
    }

    fn list_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT followee_id, \
                        (SELECT user_id, username, avatar_url, <string>created_at AS created_at \
                           FROM user WHERE user_id = $parent.followee_id) AS user \
                     FROM follow WHERE follower_id = $user_id",
                )
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_edge_users(rows)
        })
    }
}
