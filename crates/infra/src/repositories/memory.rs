use std::collections::HashMap;
use std::sync::Mutex;

use fizzbuzz_domain::buzzes::{Buzz, BuzzRecord, CommentRecord, LikeRef};
use fizzbuzz_domain::conversations::Message;
use fizzbuzz_domain::engagement::{Comment, Like};
use fizzbuzz_domain::feed::SortMode;
use fizzbuzz_domain::follows::Follow;
use fizzbuzz_domain::users::{User, UserRef};

/// Single-process stand-in for the hosted data gateway. All collections
/// live behind one store so hydrated reads see the same rows the mutation
/// paths wrote, including the denormalized like counter the gateway
/// maintains.
#[derive(Default)]
pub struct MemoryGateway {
    pub(crate) users: Mutex<HashMap<String, User>>,
    pub(crate) buzzes: Mutex<Vec<Buzz>>,
    pub(crate) likes: Mutex<Vec<Like>>,
    pub(crate) comments: Mutex<Vec<Comment>>,
    pub(crate) messages: Mutex<Vec<Message>>,
    pub(crate) follows: Mutex<Vec<Follow>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn user_ref(&self, user_id: &str) -> Option<UserRef> {
        self.users
            .lock()
            .expect("lock")
            .get(user_id)
            .map(UserRef::from_user)
    }

    pub(crate) fn record_for(&self, buzz: &Buzz) -> BuzzRecord {
        let likes: Vec<LikeRef> = self
            .likes
            .lock()
            .expect("lock")
            .iter()
            .filter(|l| l.buzz_id == buzz.buzz_id)
            .map(|l| LikeRef {
                user_id: l.user_id.clone(),
            })
            .collect();

        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .expect("lock")
            .iter()
            .filter(|c| c.buzz_id == buzz.buzz_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.comment_id.cmp(&b.comment_id))
        });
        let comments = comments
            .into_iter()
            .map(|comment| CommentRecord {
                author: self.user_ref(&comment.author_id),
                comment,
            })
            .collect();

        BuzzRecord {
            author: self.user_ref(&buzz.author_id),
            buzz: buzz.clone(),
            likes,
            comments,
        }
    }

    pub(crate) fn sorted_buzzes(&self, mode: SortMode) -> Vec<Buzz> {
        let mut buzzes = self.buzzes.lock().expect("lock").clone();
        match mode {
            SortMode::Trending => buzzes.sort_by(|a, b| {
                b.like_count
                    .unwrap_or(0)
                    .cmp(&a.like_count.unwrap_or(0))
                    .then_with(|| b.created_at_ms.cmp(&a.created_at_ms))
                    .then_with(|| b.buzz_id.cmp(&a.buzz_id))
            }),
            SortMode::Recent => buzzes.sort_by(|a, b| {
                b.created_at_ms
                    .cmp(&a.created_at_ms)
                    .then_with(|| b.buzz_id.cmp(&a.buzz_id))
            }),
        }
        buzzes
    }
}
