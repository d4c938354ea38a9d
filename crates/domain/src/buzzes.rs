use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::engagement::Comment;
use crate::error::DomainError;
use crate::identity::Viewer;
use crate::ports::buzzes::BuzzRepository;
use crate::users::UserRef;
use crate::util::now_ms;

const MAX_CONTENT_LENGTH: usize = 1_000;
const MAX_TAG_LENGTH: usize = 50;
const MAX_TAG_COUNT: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Buzz {
    pub buzz_id: String,
    pub author_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    /// Denormalized counter maintained by the gateway; a display hint, not
    /// ground truth. `None` when the gateway did not return it.
    pub like_count: Option<i64>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeRef {
    pub user_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<UserRef>,
}

/// A buzz row hydrated with its gateway joins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuzzRecord {
    #[serde(flatten)]
    pub buzz: Buzz,
    pub author: Option<UserRef>,
    pub likes: Vec<LikeRef>,
    pub comments: Vec<CommentRecord>,
}

#[derive(Clone, Debug)]
pub struct BuzzDraft {
    pub content: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Clone)]
pub struct BuzzService {
    buzzes: Arc<dyn BuzzRepository>,
}

impl BuzzService {
    pub fn new(buzzes: Arc<dyn BuzzRepository>) -> Self {
        Self { buzzes }
    }

    pub async fn compose(&self, viewer: &Viewer, draft: BuzzDraft) -> DomainResult<Buzz> {
        let draft = validate_draft(&draft)?;
        let buzz = Buzz {
            buzz_id: crate::util::uuid_v7_without_dashes(),
            author_id: viewer.user_id.clone(),
            content: draft.content,
            image_url: draft.image_url,
            tags: draft.tags,
            like_count: Some(0),
            created_at_ms: now_ms(),
        };
        self.buzzes.create(&buzz).await
    }

    pub async fn get(&self, buzz_id: &str) -> DomainResult<BuzzRecord> {
        self.buzzes.get(buzz_id).await?.ok_or(DomainError::NotFound)
    }

    pub async fn list_by_author(&self, author_id: &str) -> DomainResult<Vec<BuzzRecord>> {
        self.buzzes.list_by_author(author_id).await
    }
}

fn validate_draft(draft: &BuzzDraft) -> DomainResult<BuzzDraft> {
    let content = draft.content.trim().to_string();
    if content.is_empty() {
        return Err(DomainError::Validation("content is required".into()));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(DomainError::Validation(format!(
            "content exceeds max length of {MAX_CONTENT_LENGTH}"
        )));
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in &draft.tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(DomainError::Validation(format!(
                "tag exceeds max length of {MAX_TAG_LENGTH}"
            )));
        }
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.len() > MAX_TAG_COUNT {
        return Err(DomainError::Validation(format!(
            "at most {MAX_TAG_COUNT} tags are allowed"
        )));
    }

    if let Some(image_url) = &draft.image_url {
        if image_url.trim().is_empty() {
            return Err(DomainError::Validation("image_url cannot be empty".into()));
        }
    }

    Ok(BuzzDraft {
        content,
        tags,
        image_url: draft.image_url.clone(),
    })
}
