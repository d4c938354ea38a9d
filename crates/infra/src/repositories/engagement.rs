use std::sync::Arc;

use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::engagement::{Comment, Like};
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::ports::BoxFuture;
use fizzbuzz_domain::ports::engagement::EngagementRepository;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;

use super::memory::MemoryGateway;
use super::support::{invalid_row, map_surreal_error, parse_datetime_ms, to_rfc3339};

pub struct InMemoryEngagementRepository {
    gateway: Arc<MemoryGateway>,
}

impl InMemoryEngagementRepository {
    pub fn new(gateway: Arc<MemoryGateway>) -> Self {
        Self { gateway }
    }
}

impl EngagementRepository for InMemoryEngagementRepository {
    fn insert_like(&self, like: &Like) -> BoxFuture<'_, DomainResult<Like>> {
        let like = like.clone();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            {
                let mut likes = gateway.likes.lock().expect("lock");
                if likes.iter().any(|l| *l == like) {
                    return Err(DomainError::Conflict);
                }
                likes.push(like.clone());
            }
            // The gateway maintains the denormalized counter.
            let mut buzzes = gateway.buzzes.lock().expect("lock");
            if let Some(buzz) = buzzes.iter_mut().find(|b| b.buzz_id == like.buzz_id) {
                buzz.like_count = Some(buzz.like_count.unwrap_or(0) + 1);
            }
            Ok(like)
        })
    }

    fn delete_like(&self, buzz_id: &str, user_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let buzz_id = buzz_id.to_string();
        let user_id = user_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let removed = {
                let mut likes = gateway.likes.lock().expect("lock");
                let before = likes.len();
                likes.retain(|l| !(l.buzz_id == buzz_id && l.user_id == user_id));
                before != likes.len()
            };
            if removed {
                let mut buzzes = gateway.buzzes.lock().expect("lock");
                if let Some(buzz) = buzzes.iter_mut().find(|b| b.buzz_id == buzz_id) {
                    buzz.like_count = Some(buzz.like_count.unwrap_or(0).saturating_sub(1));
                }
            }
            Ok(())
        })
    }

    fn insert_comment(&self, comment: &Comment) -> BoxFuture<'_, DomainResult<Comment>> {
        let comment = comment.clone();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let mut comments = gateway.comments.lock().expect("lock");
            if comments.iter().any(|c| c.comment_id == comment.comment_id) {
                return Err(DomainError::Conflict);
            }
            comments.push(comment.clone());
            Ok(comment)
        })
    }

    fn get_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<Option<Comment>>> {
        let comment_id = comment_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .comments
                .lock()
                .expect("lock")
                .iter()
                .find(|c| c.comment_id == comment_id)
                .cloned())
        })
    }

    fn delete_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let comment_id = comment_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            gateway
                .comments
                .lock()
                .expect("lock")
                .retain(|c| c.comment_id != comment_id);
            Ok(())
        })
    }
}

pub struct SurrealEngagementRepository {
    client: Arc<Surreal<Client>>,
}

#[derive(Debug, Serialize)]
struct SurrealCommentCreateRow {
    comment_id: String,
    buzz_id: String,
    author_id: String,
    content: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct SurrealCommentRow {
    comment_id: String,
    buzz_id: String,
    author_id: String,
    content: String,
    created_at: String,
}

const COMMENT_FIELDS: &str =
    "comment_id, buzz_id, author_id, content, <string>created_at AS created_at";

impl SurrealEngagementRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn decode_comments(rows: Vec<Value>) -> DomainResult<Vec<Comment>> {
        rows.into_iter()
            .map(|row| {
                let row: SurrealCommentRow = serde_json::from_value(row).map_err(invalid_row)?;
                Ok(Comment {
                    comment_id: row.comment_id,
                    buzz_id: row.buzz_id,
                    author_id: row.author_id,
                    content: row.content,
                    created_at_ms: parse_datetime_ms(&row.created_at)?,
                })
            })
            .collect()
    }
}

impl EngagementRepository for SurrealEngagementRepository {
    fn insert_like(&self, like: &Like) -> BoxFuture<'_, DomainResult<Like>> {
        let like = like.clone();
        let client = self.client.clone();
        Box::pin(async move {
            // The pair id doubles as the unique constraint: a second insert
            // of the same (buzz, user) collides and rolls the counter bump
            // back with it.
            client
                .query(
                    "BEGIN TRANSACTION; \
                     CREATE type::record('like', string::concat($buzz_id, '_', $user_id)) SET \
                        buzz_id = $buzz_id, \
                        user_id = $user_id, \
                        created_at = time::now(); \
                     UPDATE buzz SET like_count += 1 WHERE buzz_id = $buzz_id; \
                     COMMIT TRANSACTION;",
                )
                .bind(("buzz_id", like.buzz_id.clone()))
                .bind(("user_id", like.user_id.clone()))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(like)
        })
    }

    fn delete_like(&self, buzz_id: &str, user_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let buzz_id = buzz_id.to_string();
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "DELETE like \
                     WHERE buzz_id = $buzz_id AND user_id = $user_id \
                     RETURN BEFORE",
                )
                .bind(("buzz_id", buzz_id.clone()))
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let deleted: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            if deleted.is_empty() {
                return Ok(());
            }

            client
                .query(
                    "UPDATE buzz SET like_count -= 1 \
                     WHERE buzz_id = $buzz_id AND like_count > 0",
                )
                .bind(("buzz_id", buzz_id))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(())
        })
    }

    fn insert_comment(&self, comment: &Comment) -> BoxFuture<'_, DomainResult<Comment>> {
        let payload = SurrealCommentCreateRow {
            comment_id: comment.comment_id.clone(),
            buzz_id: comment.buzz_id.clone(),
            author_id: comment.author_id.clone(),
            content: comment.content.clone(),
            created_at: to_rfc3339(comment.created_at_ms),
        };
        let comment_id = comment.comment_id.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let payload = serde_json::to_value(payload).map_err(invalid_row)?;
            let mut response = client
                .query(format!(
                    "CREATE type::record('comment', $comment_id) SET \
                        comment_id = $payload.comment_id, \
                        buzz_id = $payload.buzz_id, \
                        author_id = $payload.author_id, \
                        content = $payload.content, \
                        created_at = <datetime>$payload.created_at; \
                     SELECT {COMMENT_FIELDS} FROM comment WHERE comment_id = $comment_id LIMIT 1"
                ))
                .bind(("comment_id", comment_id))
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(1).map_err(map_surreal_error)?;
            Self::decode_comments(rows)?
                .pop()
                .ok_or_else(|| DomainError::Gateway("create returned no row".to_string()))
        })
    }

    fn get_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<Option<Comment>>> {
        let comment_id = comment_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {COMMENT_FIELDS} FROM comment WHERE comment_id = $comment_id LIMIT 1"
                ))
                .bind(("comment_id", comment_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Ok(Self::decode_comments(rows)?.pop())
        })
    }

    fn delete_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let comment_id = comment_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            client
                .query("DELETE comment WHERE comment_id = $comment_id")
                .bind(("comment_id", comment_id))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(())
        })
    }
}
