use std::sync::{Arc, Mutex};

use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::buzzes::{Buzz, BuzzRecord};
use fizzbuzz_domain::engagement::{Comment, EngagementService, EngagementTracker, Like};
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::feed::{FeedPager, FeedService, SortMode};
use fizzbuzz_domain::identity::Viewer;
use fizzbuzz_domain::ports::BoxFuture;
use fizzbuzz_domain::ports::buzzes::BuzzRepository;
use fizzbuzz_domain::ports::engagement::EngagementRepository;

#[derive(Clone, Default)]
struct FakeGateway {
    buzzes: Arc<Mutex<Vec<Buzz>>>,
    likes: Arc<Mutex<Vec<Like>>>,
}

impl FakeGateway {
    fn seed(&self, buzz_id: &str, like_count: i64, created_at_ms: i64) {
        self.buzzes.lock().expect("lock").push(Buzz {
            buzz_id: buzz_id.to_string(),
            author_id: "author".to_string(),
            content: format!("buzz {buzz_id}"),
            image_url: None,
            tags: Vec::new(),
            like_count: Some(like_count),
            created_at_ms,
        });
    }

    fn record(buzz: Buzz) -> BuzzRecord {
        BuzzRecord {
            author: None,
            likes: Vec::new(),
            comments: Vec::new(),
            buzz,
        }
    }
}

impl BuzzRepository for FakeGateway {
    fn create(&self, buzz: &Buzz) -> BoxFuture<'_, DomainResult<Buzz>> {
        let buzz = buzz.clone();
        let buzzes = self.buzzes.clone();
        Box::pin(async move {
            buzzes.lock().expect("lock").push(buzz.clone());
            Ok(buzz)
        })
    }

    fn get(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<Option<BuzzRecord>>> {
        let buzz_id = buzz_id.to_string();
        let buzzes = self.buzzes.clone();
        Box::pin(async move {
            Ok(buzzes
                .lock()
                .expect("lock")
                .iter()
                .find(|b| b.buzz_id == buzz_id)
                .cloned()
                .map(Self::record))
        })
    }

    fn delete(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let buzz_id = buzz_id.to_string();
        let buzzes = self.buzzes.clone();
        Box::pin(async move {
            buzzes.lock().expect("lock").retain(|b| b.buzz_id != buzz_id);
            Ok(())
        })
    }

    fn list_page(
        &self,
        mode: SortMode,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let buzzes = self.buzzes.clone();
        Box::pin(async move {
            let mut rows = buzzes.lock().expect("lock").clone();
            match mode {
                SortMode::Trending => rows.sort_by(|a, b| {
                    b.like_count
                        .unwrap_or(0)
                        .cmp(&a.like_count.unwrap_or(0))
                        .then_with(|| b.created_at_ms.cmp(&a.created_at_ms))
                }),
                SortMode::Recent => {
                    rows.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms))
                }
            }
            Ok(rows
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(Self::record)
                .collect())
        })
    }

    fn list_by_author(&self, _author_id: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn search_content(&self, _fragment: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        Box::pin(async move { Ok(Vec::new()) })
    }
}

impl EngagementRepository for FakeGateway {
    fn insert_like(&self, like: &Like) -> BoxFuture<'_, DomainResult<Like>> {
        let like = like.clone();
        let likes = self.likes.clone();
        Box::pin(async move {
            let mut likes = likes.lock().expect("lock");
            if likes.iter().any(|l| *l == like) {
                return Err(DomainError::Conflict);
            }
            likes.push(like.clone());
            Ok(like)
        })
    }

    fn delete_like(&self, buzz_id: &str, user_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let buzz_id = buzz_id.to_string();
        let user_id = user_id.to_string();
        let likes = self.likes.clone();
        Box::pin(async move {
            likes
                .lock()
                .expect("lock")
                .retain(|l| !(l.buzz_id == buzz_id && l.user_id == user_id));
            Ok(())
        })
    }

    fn insert_comment(&self, comment: &Comment) -> BoxFuture<'_, DomainResult<Comment>> {
        let comment = comment.clone();
        Box::pin(async move { Ok(comment) })
    }

    fn get_comment(&self, _comment_id: &str) -> BoxFuture<'_, DomainResult<Option<Comment>>> {
        Box::pin(async move { Ok(None) })
    }

    fn delete_comment(&self, _comment_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}

fn pager(gateway: &FakeGateway, page_size: usize, mode: SortMode) -> FeedPager {
    let buzzes: Arc<dyn BuzzRepository> = Arc::new(gateway.clone());
    let service = FeedService::with_page_size(buzzes.clone(), page_size);
    let tracker = EngagementTracker::new(EngagementService::new(
        Arc::new(gateway.clone()),
        buzzes,
    ));
    FeedPager::new(service, tracker, Some(Viewer::with_user_id("viewer")), mode)
}

#[tokio::test]
async fn three_posts_page_size_two_loads_in_two_pages() {
    let gateway = FakeGateway::default();
    gateway.seed("p1", 0, 3);
    gateway.seed("p2", 0, 2);
    gateway.seed("p3", 0, 1);

    let mut pager = pager(&gateway, 2, SortMode::Recent);
    pager.load_page(true).await.expect("first load");
    let ids: Vec<&str> = pager.buzzes().iter().map(|b| b.buzz_id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    assert!(pager.has_more());

    pager.load_page(false).await.expect("second load");
    let ids: Vec<&str> = pager.buzzes().iter().map(|b| b.buzz_id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert!(!pager.has_more());
}

#[tokio::test]
async fn like_then_unlike_keeps_the_view_consistent() {
    let gateway = FakeGateway::default();
    gateway.seed("p1", 0, 1);

    let mut pager = pager(&gateway, 10, SortMode::Trending);
    pager.load_page(true).await.expect("load");

    pager.toggle_like("p1").await.expect("like");
    assert!(pager.buzzes()[0].liked_by_viewer);
    assert_eq!(pager.buzzes()[0].like_count, 1);

    pager.toggle_like("p1").await.expect("unlike");
    assert!(!pager.buzzes()[0].liked_by_viewer);
    assert_eq!(pager.buzzes()[0].like_count, 0);

    assert_eq!(gateway.likes.lock().expect("lock").len(), 0);
}
