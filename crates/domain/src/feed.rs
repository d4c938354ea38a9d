use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::buzzes::BuzzRecord;
use crate::engagement::{CommentView, EngagementTracker, LikeToggle};
use crate::identity::Viewer;
use crate::ports::buzzes::BuzzRepository;
use crate::users::UserRef;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Like count descending, recency breaking ties.
    Trending,
    /// Creation time descending.
    Recent,
}

/// A buzz as a view renders it: hydrated row flattened to display fields,
/// with the viewer-dependent like state resolved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuzzView {
    pub buzz_id: String,
    pub author: Option<UserRef>,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at_ms: i64,
    pub like_count: i64,
    pub liked_by_viewer: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<BuzzView>,
    pub has_more: bool,
}

/// Display policy: the denormalized counter when the gateway returned one,
/// otherwise the length of the embedded like list. Never both.
pub fn display_like_count(record: &BuzzRecord) -> i64 {
    match record.buzz.like_count {
        Some(count) => count,
        None => record.likes.len() as i64,
    }
}

pub fn buzz_view(record: &BuzzRecord, viewer: Option<&Viewer>) -> BuzzView {
    let liked_by_viewer = viewer
        .map(|v| record.likes.iter().any(|like| like.user_id == v.user_id))
        .unwrap_or(false);
    BuzzView {
        buzz_id: record.buzz.buzz_id.clone(),
        author: record.author.clone(),
        content: record.buzz.content.clone(),
        image_url: record.buzz.image_url.clone(),
        tags: record.buzz.tags.clone(),
        created_at_ms: record.buzz.created_at_ms,
        like_count: display_like_count(record),
        liked_by_viewer,
        comments: record
            .comments
            .iter()
            .map(|c| CommentView {
                comment: c.comment.clone(),
                author_username: c.author.as_ref().map(|a| a.username.clone()),
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct FeedService {
    buzzes: Arc<dyn BuzzRepository>,
    page_size: usize,
}

impl FeedService {
    pub fn new(buzzes: Arc<dyn BuzzRepository>) -> Self {
        Self::with_page_size(buzzes, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(buzzes: Arc<dyn BuzzRepository>, page_size: usize) -> Self {
        Self {
            buzzes,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetches exactly one page. A short page means the sequence is
    /// exhausted.
    pub async fn load_page(
        &self,
        viewer: Option<&Viewer>,
        mode: SortMode,
        page: usize,
    ) -> DomainResult<FeedPage> {
        let offset = page * self.page_size;
        let records = self.buzzes.list_page(mode, offset, self.page_size).await?;
        let has_more = records.len() == self.page_size;
        let items = records.iter().map(|r| buzz_view(r, viewer)).collect();
        Ok(FeedPage { items, has_more })
    }

    pub async fn author_buzzes(
        &self,
        viewer: Option<&Viewer>,
        author_id: &str,
    ) -> DomainResult<Vec<BuzzView>> {
        let records = self.buzzes.list_by_author(author_id).await?;
        Ok(records.iter().map(|r| buzz_view(r, viewer)).collect())
    }

    pub async fn search_buzzes(
        &self,
        viewer: Option<&Viewer>,
        fragment: &str,
    ) -> DomainResult<Vec<BuzzView>> {
        let records = self.buzzes.search_content(fragment).await?;
        Ok(records.iter().map(|r| buzz_view(r, viewer)).collect())
    }
}

/// Per-view accumulator over the feed: an ordered, deduplicated,
/// incrementally extended buzz list. Single-writer; one instance per view.
pub struct FeedPager {
    service: FeedService,
    tracker: EngagementTracker,
    viewer: Option<Viewer>,
    mode: SortMode,
    next_page: usize,
    loading: bool,
    has_more: bool,
    buzzes: Vec<BuzzView>,
}

impl FeedPager {
    pub fn new(
        service: FeedService,
        tracker: EngagementTracker,
        viewer: Option<Viewer>,
        mode: SortMode,
    ) -> Self {
        Self {
            service,
            tracker,
            viewer,
            mode,
            next_page: 0,
            loading: false,
            has_more: true,
            buzzes: Vec::new(),
        }
    }

    pub fn buzzes(&self) -> &[BuzzView] {
        &self.buzzes
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn mode(&self) -> SortMode {
        self.mode
    }

    /// Loads the next page, or the first page again when `reset`. Returns
    /// whether a fetch actually ran: an in-flight load or an exhausted
    /// cursor suppresses the trigger until a reset.
    pub async fn load_page(&mut self, reset: bool) -> DomainResult<bool> {
        if self.loading || (!reset && !self.has_more) {
            return Ok(false);
        }
        if reset {
            self.clear();
        }

        self.loading = true;
        let result = self
            .service
            .load_page(self.viewer.as_ref(), self.mode, self.next_page)
            .await;
        self.loading = false;

        let page = result?;
        self.has_more = page.has_more;
        if page.has_more {
            self.next_page += 1;
        }
        for item in page.items {
            if !self.buzzes.iter().any(|b| b.buzz_id == item.buzz_id) {
                self.buzzes.push(item);
            }
        }
        Ok(true)
    }

    /// Switching sort mode discards all accumulated state; stale pages from
    /// another mode must never be shown.
    pub fn set_mode(&mut self, mode: SortMode) {
        if self.mode != mode {
            self.mode = mode;
            self.clear();
        }
    }

    /// Same contract as a mode switch: a different viewer invalidates the
    /// accumulated like states.
    pub fn set_viewer(&mut self, viewer: Option<Viewer>) {
        if self.viewer != viewer {
            self.viewer = viewer;
            self.clear();
        }
    }

    pub async fn toggle_like(&mut self, buzz_id: &str) -> DomainResult<LikeToggle> {
        self.tracker
            .toggle_like(self.viewer.as_ref(), &mut self.buzzes, buzz_id)
            .await
    }

    pub async fn submit_comment(
        &mut self,
        buzz_id: &str,
        content: &str,
    ) -> DomainResult<CommentView> {
        self.tracker
            .submit_comment(self.viewer.as_ref(), &mut self.buzzes, buzz_id, content)
            .await
    }

    pub async fn delete_comment(&mut self, comment_id: &str, buzz_id: &str) -> DomainResult<()> {
        self.tracker
            .delete_comment(self.viewer.as_ref(), &mut self.buzzes, comment_id, buzz_id)
            .await
    }

    pub async fn delete_buzz(&mut self, buzz_id: &str) -> DomainResult<()> {
        self.tracker
            .delete_buzz(self.viewer.as_ref(), &mut self.buzzes, buzz_id)
            .await
    }

    fn clear(&mut self) {
        self.buzzes.clear();
        self.next_page = 0;
        self.has_more = true;
        self.loading = false;
    }
}
