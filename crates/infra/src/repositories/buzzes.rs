use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::buzzes::{Buzz, BuzzRecord, CommentRecord, LikeRef};
use fizzbuzz_domain::engagement::Comment;
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::feed::SortMode;
use fizzbuzz_domain::ports::BoxFuture;
use fizzbuzz_domain::ports::buzzes::BuzzRepository;
use fizzbuzz_domain::users::UserRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;

use super::memory::MemoryGateway;
use super::support::{invalid_row, map_surreal_error, one_or_many, parse_datetime_ms, to_rfc3339};
use super::users::SurrealUserRow;

pub struct InMemoryBuzzRepository {
    gateway: Arc<MemoryGateway>,
}

impl InMemoryBuzzRepository {
    pub fn new(gateway: Arc<MemoryGateway>) -> Self {
        Self { gateway }
    }
}

impl BuzzRepository for InMemoryBuzzRepository {
    fn create(&self, buzz: &Buzz) -> BoxFuture<'_, DomainResult<Buzz>> {
        let buzz = buzz.clone();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let mut buzzes = gateway.buzzes.lock().expect("lock");
            if buzzes.iter().any(|b| b.buzz_id == buzz.buzz_id) {
                return Err(DomainError::Conflict);
            }
            buzzes.push(buzz.clone());
            Ok(buzz)
        })
    }

    fn get(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<Option<BuzzRecord>>> {
        let buzz_id = buzz_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let buzz = gateway
                .buzzes
                .lock()
                .expect("lock")
                .iter()
                .find(|b| b.buzz_id == buzz_id)
                .cloned();
            Ok(buzz.map(|b| gateway.record_for(&b)))
        })
    }

    fn delete(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let buzz_id = buzz_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            gateway
                .buzzes
                .lock()
                .expect("lock")
                .retain(|b| b.buzz_id != buzz_id);
            gateway
                .likes
                .lock()
                .expect("lock")
                .retain(|l| l.buzz_id != buzz_id);
            gateway
                .comments
                .lock()
                .expect("lock")
                .retain(|c| c.buzz_id != buzz_id);
            Ok(())
        })
    }

    fn list_page(
        &self,
        mode: SortMode,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .sorted_buzzes(mode)
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|b| gateway.record_for(&b))
                .collect())
        })
    }

    fn list_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let author_id = author_id.to_string();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .sorted_buzzes(SortMode::Recent)
                .into_iter()
                .filter(|b| b.author_id == author_id)
                .map(|b| gateway.record_for(&b))
                .collect())
        })
    }

    fn search_content(&self, fragment: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let fragment = fragment.to_lowercase();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .sorted_buzzes(SortMode::Recent)
                .into_iter()
                .filter(|b| b.content.to_lowercase().contains(&fragment))
                .map(|b| gateway.record_for(&b))
                .collect())
        })
    }
}

pub struct SurrealBuzzRepository {
    client: Arc<Surreal<Client>>,
}

/// Hydrated projection: the buzz row plus author, like refs and comments as
/// embedded subqueries. Embeds decode through the list normalization in
/// `support`.
const BUZZ_RECORD_FIELDS: &str = "buzz_id, author_id, content, image_url, tags, like_count, \
     <string>created_at AS created_at, \
     (SELECT user_id, username, avatar_url, <string>created_at AS created_at \
        FROM user WHERE user_id = $parent.author_id) AS author, \
     (SELECT user_id FROM like WHERE buzz_id = $parent.buzz_id) AS likes, \
     (SELECT comment_id, buzz_id, author_id, content, <string>created_at AS created_at \
        FROM comment WHERE buzz_id = $parent.buzz_id ORDER BY created_at ASC) AS comments";

#[derive(Debug, Serialize)]
struct SurrealBuzzCreateRow {
    buzz_id: String,
    author_id: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    tags: Vec<String>,
    like_count: i64,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct SurrealLikeRefRow {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct SurrealCommentRow {
    comment_id: String,
    buzz_id: String,
    author_id: String,
    content: String,
    created_at: String,
}

impl SurrealCommentRow {
    fn into_comment(self) -> DomainResult<Comment> {
        Ok(Comment {
            comment_id: self.comment_id,
            buzz_id: self.buzz_id,
            author_id: self.author_id,
            content: self.content,
            created_at_ms: parse_datetime_ms(&self.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SurrealBuzzRow {
    buzz_id: String,
    author_id: String,
    content: String,
    image_url: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    like_count: Option<i64>,
    created_at: String,
    #[serde(default, deserialize_with = "one_or_many")]
    author: Vec<SurrealUserRow>,
    #[serde(default, deserialize_with = "one_or_many")]
    likes: Vec<SurrealLikeRefRow>,
    #[serde(default, deserialize_with = "one_or_many")]
    comments: Vec<SurrealCommentRow>,
}

impl SurrealBuzzRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn parse_rows(rows: Vec<Value>) -> DomainResult<Vec<SurrealBuzzRow>> {
        rows.into_iter()
            .map(|row| serde_json::from_value::<SurrealBuzzRow>(row).map_err(invalid_row))
            .collect()
    }

    /// Comment authors come from one follow-up query instead of a nested
    /// embed per comment.
    async fn fetch_user_refs(
        client: &Surreal<Client>,
        user_ids: Vec<String>,
    ) -> DomainResult<HashMap<String, UserRef>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut response = client
            .query(
                "SELECT user_id, username, avatar_url, <string>created_at AS created_at \
                 FROM user WHERE user_id IN $user_ids",
            )
            .bind(("user_ids", user_ids))
            .await
            .map_err(map_surreal_error)?;
        let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
        let mut refs = HashMap::new();
        for row in rows {
            let row: SurrealUserRow = serde_json::from_value(row).map_err(invalid_row)?;
            refs.insert(
                row.user_id.clone(),
                UserRef {
                    user_id: row.user_id,
                    username: row.username,
                    avatar_url: row.avatar_url,
                },
            );
        }
        Ok(refs)
    }

    async fn decode_records(
        client: &Surreal<Client>,
        rows: Vec<Value>,
    ) -> DomainResult<Vec<BuzzRecord>> {
        let rows = Self::parse_rows(rows)?;

        let comment_author_ids: Vec<String> = rows
            .iter()
            .flat_map(|row| row.comments.iter().map(|c| c.author_id.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let comment_authors = Self::fetch_user_refs(client, comment_author_ids).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let author = row.author.into_iter().next().map(|a| UserRef {
                user_id: a.user_id,
                username: a.username,
                avatar_url: a.avatar_url,
            });
            let likes = row
                .likes
                .into_iter()
                .map(|l| LikeRef { user_id: l.user_id })
                .collect();
            let mut comments = Vec::with_capacity(row.comments.len());
            for comment_row in row.comments {
                let comment = comment_row.into_comment()?;
                comments.push(CommentRecord {
                    author: comment_authors.get(&comment.author_id).cloned(),
                    comment,
                });
            }
            records.push(BuzzRecord {
                buzz: Buzz {
                    buzz_id: row.buzz_id,
                    author_id: row.author_id,
                    content: row.content,
                    image_url: row.image_url,
                    tags: row.tags,
                    like_count: row.like_count,
                    created_at_ms: parse_datetime_ms(&row.created_at)?,
                },
                author,
                likes,
                comments,
            });
        }
        Ok(records)
    }
}

impl BuzzRepository for SurrealBuzzRepository {
    fn create(&self, buzz: &Buzz) -> BoxFuture<'_, DomainResult<Buzz>> {
        let payload = SurrealBuzzCreateRow {
            buzz_id: buzz.buzz_id.clone(),
            author_id: buzz.author_id.clone(),
            content: buzz.content.clone(),
            image_url: buzz.image_url.clone(),
            tags: buzz.tags.clone(),
            like_count: buzz.like_count.unwrap_or(0),
            created_at: to_rfc3339(buzz.created_at_ms),
        };
        let buzz = buzz.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let payload = serde_json::to_value(payload).map_err(invalid_row)?;
            client
                .query(
                    "CREATE type::record('buzz', $buzz_id) SET \
                        buzz_id = $payload.buzz_id, \
                        author_id = $payload.author_id, \
                        content = $payload.content, \
                        image_url = $payload.image_url, \
                        tags = $payload.tags, \
                        like_count = $payload.like_count, \
                        created_at = <datetime>$payload.created_at",
                )
                .bind(("buzz_id", buzz.buzz_id.clone()))
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(buzz)
        })
    }

    fn get(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<Option<BuzzRecord>>> {
        let buzz_id = buzz_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {BUZZ_RECORD_FIELDS} FROM buzz WHERE buzz_id = $buzz_id LIMIT 1"
                ))
                .bind(("buzz_id", buzz_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Ok(Self::decode_records(&client, rows).await?.pop())
        })
    }

    fn delete(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let buzz_id = buzz_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            client
                .query(
                    "BEGIN TRANSACTION; \
                     DELETE buzz WHERE buzz_id = $buzz_id; \
                     DELETE like WHERE buzz_id = $buzz_id; \
                     DELETE comment WHERE buzz_id = $buzz_id; \
                     COMMIT TRANSACTION;",
                )
                .bind(("buzz_id", buzz_id))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(())
        })
    }

    fn list_page(
        &self,
        mode: SortMode,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let order = match mode {
            SortMode::Trending => "ORDER BY like_count DESC, created_at DESC, buzz_id DESC",
            SortMode::Recent => "ORDER BY created_at DESC, buzz_id DESC",
        };
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {BUZZ_RECORD_FIELDS} FROM buzz {order} LIMIT $limit START $offset"
                ))
                .bind(("limit", limit))
                .bind(("offset", offset))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_records(&client, rows).await
        })
    }

    fn list_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let author_id = author_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {BUZZ_RECORD_FIELDS} FROM buzz \
                     WHERE author_id = $author_id \
                     ORDER BY created_at DESC, buzz_id DESC"
                ))
                .bind(("author_id", author_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_records(&client, rows).await
        })
    }

    fn search_content(&self, fragment: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let fragment = fragment.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {BUZZ_RECORD_FIELDS} FROM buzz \
                     WHERE string::contains(string::lowercase(content), string::lowercase($fragment)) \
                     ORDER BY created_at DESC, buzz_id DESC"
                ))
                .bind(("fragment", fragment))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_records(&client, rows).await
        })
    }
}
