use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::feed::BuzzView;
use crate::identity::Viewer;
use crate::ports::buzzes::BuzzRepository;
use crate::ports::engagement::EngagementRepository;
use crate::util::now_ms;

const MAX_COMMENT_LENGTH: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Like {
    pub buzz_id: String,
    pub user_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub comment_id: String,
    pub buzz_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at_ms: i64,
}

/// A comment as a view renders it: the row plus the author's username when
/// the join (or the submitting viewer) resolved it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
}

#[derive(Clone)]
pub struct EngagementService {
    engagement: Arc<dyn EngagementRepository>,
    buzzes: Arc<dyn BuzzRepository>,
}

impl EngagementService {
    pub fn new(engagement: Arc<dyn EngagementRepository>, buzzes: Arc<dyn BuzzRepository>) -> Self {
        Self { engagement, buzzes }
    }

    /// Flips the (buzz, viewer) like pair. `currently_liked` comes from the
    /// caller's view state. A duplicate-insert conflict is success: the pair
    /// already holds, so the liked outcome stands.
    pub async fn toggle_like(
        &self,
        viewer: &Viewer,
        buzz_id: &str,
        currently_liked: bool,
    ) -> DomainResult<LikeToggle> {
        if currently_liked {
            self.engagement
                .delete_like(buzz_id, &viewer.user_id)
                .await?;
            return Ok(LikeToggle { liked: false });
        }

        let like = Like {
            buzz_id: buzz_id.to_string(),
            user_id: viewer.user_id.clone(),
        };
        match self.engagement.insert_like(&like).await {
            Ok(_) | Err(DomainError::Conflict) => Ok(LikeToggle { liked: true }),
            Err(err) => Err(err),
        }
    }

    pub async fn submit_comment(
        &self,
        viewer: &Viewer,
        buzz_id: &str,
        content: &str,
    ) -> DomainResult<CommentView> {
        let content = validate_comment_content(content)?;
        let comment = Comment {
            comment_id: crate::util::uuid_v7_without_dashes(),
            buzz_id: buzz_id.to_string(),
            author_id: viewer.user_id.clone(),
            content,
            created_at_ms: now_ms(),
        };
        let comment = self.engagement.insert_comment(&comment).await?;
        Ok(CommentView {
            comment,
            author_username: Some(viewer.username.clone()),
        })
    }

    pub async fn delete_comment(&self, viewer: &Viewer, comment_id: &str) -> DomainResult<()> {
        let comment = self
            .engagement
            .get_comment(comment_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if comment.author_id != viewer.user_id {
            return Err(DomainError::Forbidden);
        }
        self.engagement.delete_comment(comment_id).await
    }

    pub async fn delete_buzz(&self, viewer: &Viewer, buzz_id: &str) -> DomainResult<()> {
        let record = self
            .buzzes
            .get(buzz_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if record.buzz.author_id != viewer.user_id {
            return Err(DomainError::Forbidden);
        }
        self.buzzes.delete(buzz_id).await
    }
}

/// Applies engagement mutations to a view's local buzz array. The count flip
/// is exactly plus or minus one; no reload, so a like never reorders the feed.
#[derive(Clone)]
pub struct EngagementTracker {
    service: EngagementService,
}

impl EngagementTracker {
    pub fn new(service: EngagementService) -> Self {
        Self { service }
    }

    pub async fn toggle_like(
        &self,
        viewer: Option<&Viewer>,
        buzzes: &mut [BuzzView],
        buzz_id: &str,
    ) -> DomainResult<LikeToggle> {
        let viewer = viewer.ok_or(DomainError::AuthRequired)?;
        let view = buzzes
            .iter_mut()
            .find(|b| b.buzz_id == buzz_id)
            .ok_or(DomainError::NotFound)?;

        let outcome = self
            .service
            .toggle_like(viewer, buzz_id, view.liked_by_viewer)
            .await?;

        view.liked_by_viewer = outcome.liked;
        view.like_count += if outcome.liked { 1 } else { -1 };
        Ok(outcome)
    }

    pub async fn submit_comment(
        &self,
        viewer: Option<&Viewer>,
        buzzes: &mut [BuzzView],
        buzz_id: &str,
        content: &str,
    ) -> DomainResult<CommentView> {
        let viewer = viewer.ok_or(DomainError::AuthRequired)?;
        let comment = self.service.submit_comment(viewer, buzz_id, content).await?;
        if let Some(view) = buzzes.iter_mut().find(|b| b.buzz_id == buzz_id) {
            view.comments.push(comment.clone());
        }
        Ok(comment)
    }

    pub async fn delete_comment(
        &self,
        viewer: Option<&Viewer>,
        buzzes: &mut [BuzzView],
        comment_id: &str,
        buzz_id: &str,
    ) -> DomainResult<()> {
        let viewer = viewer.ok_or(DomainError::AuthRequired)?;
        self.service.delete_comment(viewer, comment_id).await?;
        if let Some(view) = buzzes.iter_mut().find(|b| b.buzz_id == buzz_id) {
            view.comments.retain(|c| c.comment.comment_id != comment_id);
        }
        Ok(())
    }

    pub async fn delete_buzz(
        &self,
        viewer: Option<&Viewer>,
        buzzes: &mut Vec<BuzzView>,
        buzz_id: &str,
    ) -> DomainResult<()> {
        let viewer = viewer.ok_or(DomainError::AuthRequired)?;
        self.service.delete_buzz(viewer, buzz_id).await?;
        buzzes.retain(|b| b.buzz_id != buzz_id);
        Ok(())
    }
}

fn validate_comment_content(content: &str) -> DomainResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DomainError::Validation("comment is required".into()));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(DomainError::Validation(format!(
            "comment exceeds max length of {MAX_COMMENT_LENGTH}"
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBuzzRepo, MockEngagementRepo};

    fn tracker(engagement: MockEngagementRepo) -> EngagementTracker {
        let buzzes = MockBuzzRepo::default();
        EngagementTracker::new(EngagementService::new(
            Arc::new(engagement),
            Arc::new(buzzes),
        ))
    }

    fn service(engagement: MockEngagementRepo, buzzes: MockBuzzRepo) -> EngagementService {
        EngagementService::new(Arc::new(engagement), Arc::new(buzzes))
    }

    fn view(buzz_id: &str, like_count: i64, liked: bool) -> BuzzView {
        BuzzView {
            buzz_id: buzz_id.to_string(),
            author: None,
            content: "hello".to_string(),
            image_url: None,
            tags: Vec::new(),
            like_count,
            liked_by_viewer: liked,
            comments: Vec::new(),
            created_at_ms: 1,
        }
    }

    #[tokio::test]
    async fn toggle_requires_a_viewer() {
        let tracker = tracker(MockEngagementRepo::default());
        let mut buzzes = vec![view("b1", 0, false)];
        let err = tracker
            .toggle_like(None, &mut buzzes, "b1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AuthRequired));
        assert_eq!(buzzes[0].like_count, 0);
    }

    #[tokio::test]
    async fn like_then_unlike_moves_the_count_by_exactly_one() {
        let tracker = tracker(MockEngagementRepo::default());
        let viewer = Viewer::with_user_id("user-1");
        let mut buzzes = vec![view("b1", 0, false)];

        tracker
            .toggle_like(Some(&viewer), &mut buzzes, "b1")
            .await
            .expect("like");
        assert!(buzzes[0].liked_by_viewer);
        assert_eq!(buzzes[0].like_count, 1);

        tracker
            .toggle_like(Some(&viewer), &mut buzzes, "b1")
            .await
            .expect("unlike");
        assert!(!buzzes[0].liked_by_viewer);
        assert_eq!(buzzes[0].like_count, 0);
    }

    #[tokio::test]
    async fn final_like_state_equals_toggle_parity() {
        let tracker = tracker(MockEngagementRepo::default());
        let viewer = Viewer::with_user_id("user-1");
        let mut buzzes = vec![view("b1", 3, false)];

        for _ in 0..5 {
            tracker
                .toggle_like(Some(&viewer), &mut buzzes, "b1")
                .await
                .expect("toggle");
        }
        assert!(buzzes[0].liked_by_viewer);
        assert_eq!(buzzes[0].like_count, 4);
    }

    #[tokio::test]
    async fn duplicate_like_insert_is_absorbed_as_success() {
        let repo = MockEngagementRepo::default();
        let service = service(repo, MockBuzzRepo::default());
        let viewer = Viewer::with_user_id("user-1");

        // Two rapid fires with stale local state: the second insert hits the
        // gateway unique constraint and must still report liked.
        let first = service.toggle_like(&viewer, "b1", false).await.expect("ok");
        let second = service.toggle_like(&viewer, "b1", false).await.expect("ok");
        assert!(first.liked);
        assert!(second.liked);
    }

    #[tokio::test]
    async fn blank_comment_is_rejected_before_any_gateway_call() {
        let repo = MockEngagementRepo::default();
        let tracker = tracker(repo.clone());
        let viewer = Viewer::with_user_id("user-1");
        let mut buzzes = vec![view("b1", 0, false)];

        let err = tracker
            .submit_comment(Some(&viewer), &mut buzzes, "b1", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(buzzes[0].comments.is_empty());
        assert_eq!(repo.comment_insert_count(), 0);
    }

    #[tokio::test]
    async fn submitted_comment_is_enriched_with_the_viewer_username() {
        let tracker = tracker(MockEngagementRepo::default());
        let viewer = Viewer {
            user_id: "user-1".to_string(),
            username: "ada".to_string(),
            avatar_url: None,
        };
        let mut buzzes = vec![view("b1", 0, false)];

        let comment = tracker
            .submit_comment(Some(&viewer), &mut buzzes, "b1", "  nice one  ")
            .await
            .expect("comment");
        assert_eq!(comment.author_username.as_deref(), Some("ada"));
        assert_eq!(comment.comment.content, "nice one");
        assert_eq!(buzzes[0].comments.len(), 1);
    }

    #[tokio::test]
    async fn comment_deletion_is_owner_only() {
        let repo = MockEngagementRepo::default();
        let service = service(repo, MockBuzzRepo::default());
        let author = Viewer::with_user_id("author");
        let stranger = Viewer::with_user_id("stranger");

        let comment = service
            .submit_comment(&author, "b1", "mine")
            .await
            .expect("comment");

        let err = service
            .delete_comment(&stranger, &comment.comment.comment_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        service
            .delete_comment(&author, &comment.comment.comment_id)
            .await
            .expect("owner delete");
    }

    #[tokio::test]
    async fn buzz_deletion_is_owner_only_and_removes_the_view() {
        let buzz_repo = MockBuzzRepo::default();
        buzz_repo.seed_simple("b1", "author", "hello", 5, 10);
        let tracker = EngagementTracker::new(EngagementService::new(
            Arc::new(MockEngagementRepo::default()),
            Arc::new(buzz_repo),
        ));

        let mut buzzes = vec![view("b1", 0, false)];
        let err = tracker
            .delete_buzz(
                Some(&Viewer::with_user_id("stranger")),
                &mut buzzes,
                "b1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
        assert_eq!(buzzes.len(), 1);

        tracker
            .delete_buzz(Some(&Viewer::with_user_id("author")), &mut buzzes, "b1")
            .await
            .expect("owner delete");
        assert!(buzzes.is_empty());
    }
}
