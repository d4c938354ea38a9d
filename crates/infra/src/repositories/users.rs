use std::sync::Arc;

use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::ports::BoxFuture;
use fizzbuzz_domain::ports::users::UserRepository;
use fizzbuzz_domain::users::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;

use super::memory::MemoryGateway;
use super::support::{invalid_row, map_surreal_error, parse_datetime_ms, to_rfc3339};

pub struct InMemoryUserRepository {
    gateway: Arc<MemoryGateway>,
}

impl InMemoryUserRepository {
    pub fn new(gateway: Arc<MemoryGateway>) -> Self {
        Self { gateway }
    }
}

impl UserRepository for InMemoryUserRepository {
    fn create(&self, user: &User) -> BoxFuture<'_, DomainResult<User>> {
        let user = user.clone();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let mut users = gateway.users.lock().expect("lock");
            let taken = users.contains_key(&user.user_id)
                || users.values().any(|u| u.username == user.username);
            if taken {
                return Err(DomainError::Conflict);
            }
            users.insert(user.user_id.clone(), user.clone());
            Ok(user)
        })
    }

    fn get_by_id(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
        let user_id = user_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move { Ok(gateway.users.lock().expect("lock").get(&user_id).cloned()) })
    }

    fn get_by_username(&self, username: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
        let username = username.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .users
                .lock()
                .expect("lock")
                .values()
                .find(|u| u.username == username)
                .cloned())
        })
    }

    fn search_by_username_fragment(
        &self,
        fragment: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let fragment = fragment.to_lowercase();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let mut hits: Vec<User> = gateway
                .users
                .lock()
                .expect("lock")
                .values()
                .filter(|u| u.username.to_lowercase().contains(&fragment))
                .cloned()
                .collect();
            hits.sort_by(|a, b| a.username.cmp(&b.username));
            Ok(hits)
        })
    }
}

pub struct SurrealUserRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealUserRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn decode_rows(rows: Vec<Value>) -> DomainResult<Vec<User>> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<SurrealUserRow>(row)
                    .map_err(invalid_row)
                    .and_then(SurrealUserRow::into_user)
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct SurrealUserCreateRow {
    user_id: String,
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    created_at: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SurrealUserRow {
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) avatar_url: Option<String>,
    pub(crate) created_at: String,
}

impl SurrealUserRow {
    pub(crate) fn into_user(self) -> DomainResult<User> {
        Ok(User {
            user_id: self.user_id,
            username: self.username,
            avatar_url: self.avatar_url,
            created_at_ms: parse_datetime_ms(&self.created_at)?,
        })
    }
}

const USER_FIELDS: &str = "user_id, username, avatar_url, <string>created_at AS created_at";

impl UserRepository for SurrealUserRepository {
    fn create(&self, user: &User) -> BoxFuture<'_, DomainResult<User>> {
        let payload = SurrealUserCreateRow {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: to_rfc3339(user.created_at_ms),
        };
        let user_id = user.user_id.clone();
        let username = user.username.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let mut probe = client
                .query("SELECT user_id FROM user WHERE username = $username LIMIT 1")
                .bind(("username", username))
                .await
                .map_err(map_surreal_error)?;
            let existing: Vec<Value> = probe.take(0).map_err(map_surreal_error)?;
            if !existing.is_empty() {
                return Err(DomainError::Conflict);
            }

            let payload = serde_json::to_value(payload).map_err(invalid_row)?;
            let mut response = client
                .query(format!(
                    "CREATE type::record('user', $user_id) SET \
                        user_id = $payload.user_id, \
                        username = $payload.username, \
                        avatar_url = $payload.avatar_url, \
                        created_at = <datetime>$payload.created_at; \
                     SELECT {USER_FIELDS} FROM user WHERE user_id = $user_id LIMIT 1"
                ))
                .bind(("user_id", user_id))
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(1).map_err(map_surreal_error)?;
            Self::decode_rows(rows)?
                .pop()
                .ok_or_else(|| DomainError::Gateway("create returned no row".to_string()))
        })
    }

    fn get_by_id(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {USER_FIELDS} FROM user WHERE user_id = $user_id LIMIT 1"
                ))
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Ok(Self::decode_rows(rows)?.pop())
        })
    }

    fn get_by_username(&self, username: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
        let username = username.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {USER_FIELDS} FROM user WHERE username = $username LIMIT 1"
                ))
                .bind(("username", username))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Ok(Self::decode_rows(rows)?.pop())
        })
    }

    fn search_by_username_fragment(
        &self,
        fragment: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let fragment = fragment.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {USER_FIELDS} FROM user \
                     WHERE string::contains(string::lowercase(username), string::lowercase($fragment)) \
                     ORDER BY username ASC"
                ))
                .bind(("fragment", fragment))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_rows(rows)
        })
    }
}
