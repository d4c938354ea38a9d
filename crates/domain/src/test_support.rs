//! In-memory port fakes shared by the domain unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::DomainResult;
use crate::buzzes::{Buzz, BuzzRecord};
use crate::conversations::{ConversationKey, Message, MessageRecord};
use crate::engagement::{Comment, Like};
use crate::error::DomainError;
use crate::feed::SortMode;
use crate::follows::Follow;
use crate::ports::BoxFuture;
use crate::ports::buzzes::BuzzRepository;
use crate::ports::conversations::MessageRepository;
use crate::ports::engagement::EngagementRepository;
use crate::ports::follows::FollowRepository;
use crate::ports::users::UserRepository;
use crate::users::{User, UserRef};

#[derive(Clone, Default)]
pub struct MockUserRepo {
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl MockUserRepo {
    pub fn seed(&self, user: User) {
        self.users
            .lock()
            .expect("lock")
            .insert(user.user_id.clone(), user);
    }

    pub fn snapshot(&self) -> HashMap<String, User> {
        self.users.lock().expect("lock").clone()
    }
}

impl UserRepository for MockUserRepo {
    fn create(&self, user: &User) -> BoxFuture<'_, DomainResult<User>> {
        let user = user.clone();
        let users = self.users.clone();
        Box::pin(async move {
            let mut users = users.lock().expect("lock");
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
        let users = self.users.clone();
        Box::pin(async move { Ok(users.lock().expect("lock").get(&user_id).cloned()) })
    }

    fn get_by_username(&self, username: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
        let username = username.to_string();
        let users = self.users.clone();
        Box::pin(async move {
            Ok(users
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
        let users = self.users.clone();
        Box::pin(async move {
            let mut hits: Vec<User> = users
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

#[derive(Clone, Default)]
pub struct MockFollowRepo {
    follows: Arc<Mutex<Vec<Follow>>>,
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl MockFollowRepo {
    pub fn seed_follow(&self, follower_id: &str, followee_id: &str) {
        self.follows.lock().expect("lock").push(Follow {
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
        });
    }

    pub fn seed_user(&self, user: User) {
        self.users
            .lock()
            .expect("lock")
            .insert(user.user_id.clone(), user);
    }

    fn resolve(&self, user_id: &str) -> User {
        self.users
            .lock()
            .expect("lock")
            .get(user_id)
            .cloned()
            .unwrap_or(User {
                user_id: user_id.to_string(),
                username: user_id.to_string(),
                avatar_url: None,
                created_at_ms: 0,
            })
    }
}

impl FollowRepository for MockFollowRepo {
    fn insert(&self, follow: &Follow) -> BoxFuture<'_, DomainResult<Follow>> {
        let follow = follow.clone();
        let follows = self.follows.clone();
        Box::pin(async move {
            let mut follows = follows.lock().expect("lock");
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
        let follows = self.follows.clone();
        Box::pin(async move {
            follows
                .lock()
                .expect("lock")
                .retain(|f| !(f.follower_id == follower_id && f.followee_id == followee_id));
            Ok(())
        })
    }

    fn exists(&self, follower_id: &str, followee_id: &str) -> BoxFuture<'_, DomainResult<bool>> {
        let follower_id = follower_id.to_string();
        let followee_id = followee_id.to_string();
        let follows = self.follows.clone();
        Box::pin(async move {
            Ok(follows
                .lock()
                .expect("lock")
                .iter()
                .any(|f| f.follower_id == follower_id && f.followee_id == followee_id))
        })
    }

    fn count_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let follows = self.follows.clone();
        Box::pin(async move {
            Ok(follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.followee_id == user_id)
                .count() as u64)
        })
    }

    fn count_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let follows = self.follows.clone();
        Box::pin(async move {
            Ok(follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.follower_id == user_id)
                .count() as u64)
        })
    }

    fn list_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let user_id = user_id.to_string();
        let this = self.clone();
        Box::pin(async move {
            let follower_ids: Vec<String> = this
                .follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.followee_id == user_id)
                .map(|f| f.follower_id.clone())
                .collect();
            Ok(follower_ids.iter().map(|id| this.resolve(id)).collect())
        })
    }

    fn list_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let user_id = user_id.to_string();
        let this = self.clone();
        Box::pin(async move {
            let followee_ids: Vec<String> = this
                .follows
                .lock()
                .expect("lock")
                .iter()
                .filter(|f| f.follower_id == user_id)
                .map(|f| f.followee_id.clone())
                .collect();
            Ok(followee_ids.iter().map(|id| this.resolve(id)).collect())
        })
    }
}

#[derive(Clone, Default)]
pub struct MockBuzzRepo {
    records: Arc<Mutex<Vec<BuzzRecord>>>,
    page_queries: Arc<AtomicUsize>,
}

impl MockBuzzRepo {
    pub fn record(
        buzz_id: &str,
        author_id: &str,
        content: &str,
        like_count: i64,
        created_at_ms: i64,
    ) -> BuzzRecord {
        BuzzRecord {
            buzz: Buzz {
                buzz_id: buzz_id.to_string(),
                author_id: author_id.to_string(),
                content: content.to_string(),
                image_url: None,
                tags: Vec::new(),
                like_count: Some(like_count),
                created_at_ms,
            },
            author: Some(UserRef::unresolved(author_id)),
            likes: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn seed_simple(
        &self,
        buzz_id: &str,
        author_id: &str,
        content: &str,
        like_count: i64,
        created_at_ms: i64,
    ) {
        self.records
            .lock()
            .expect("lock")
            .push(Self::record(buzz_id, author_id, content, like_count, created_at_ms));
    }

    pub fn page_query_count(&self) -> usize {
        self.page_queries.load(Ordering::SeqCst)
    }

    fn sorted(&self, mode: SortMode) -> Vec<BuzzRecord> {
        let mut records = self.records.lock().expect("lock").clone();
        match mode {
            SortMode::Trending => records.sort_by(|a, b| {
                b.buzz
                    .like_count
                    .unwrap_or(0)
                    .cmp(&a.buzz.like_count.unwrap_or(0))
                    .then_with(|| b.buzz.created_at_ms.cmp(&a.buzz.created_at_ms))
                    .then_with(|| b.buzz.buzz_id.cmp(&a.buzz.buzz_id))
            }),
            SortMode::Recent => records.sort_by(|a, b| {
                b.buzz
                    .created_at_ms
                    .cmp(&a.buzz.created_at_ms)
                    .then_with(|| b.buzz.buzz_id.cmp(&a.buzz.buzz_id))
            }),
        }
        records
    }
}

impl BuzzRepository for MockBuzzRepo {
    fn create(&self, buzz: &Buzz) -> BoxFuture<'_, DomainResult<Buzz>> {
        let buzz = buzz.clone();
        let records = self.records.clone();
        Box::pin(async move {
            records.lock().expect("lock").push(BuzzRecord {
                author: Some(UserRef::unresolved(buzz.author_id.clone())),
                buzz: buzz.clone(),
                likes: Vec::new(),
                comments: Vec::new(),
            });
            Ok(buzz)
        })
    }

    fn get(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<Option<BuzzRecord>>> {
        let buzz_id = buzz_id.to_string();
        let records = self.records.clone();
        Box::pin(async move {
            Ok(records
                .lock()
                .expect("lock")
                .iter()
                .find(|r| r.buzz.buzz_id == buzz_id)
                .cloned())
        })
    }

    fn delete(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let buzz_id = buzz_id.to_string();
        let records = self.records.clone();
        Box::pin(async move {
            records
                .lock()
                .expect("lock")
                .retain(|r| r.buzz.buzz_id != buzz_id);
            Ok(())
        })
    }

    fn list_page(
        &self,
        mode: SortMode,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        self.page_queries.fetch_add(1, Ordering::SeqCst);
        let this = self.clone();
        Box::pin(async move {
            let sorted = this.sorted(mode);
            Ok(sorted.into_iter().skip(offset).take(limit).collect())
        })
    }

    fn list_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let author_id = author_id.to_string();
        let this = self.clone();
        Box::pin(async move {
            Ok(this
                .sorted(SortMode::Recent)
                .into_iter()
                .filter(|r| r.buzz.author_id == author_id)
                .collect())
        })
    }

    fn search_content(&self, fragment: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>> {
        let fragment = fragment.to_lowercase();
        let this = self.clone();
        Box::pin(async move {
            Ok(this
                .sorted(SortMode::Recent)
                .into_iter()
                .filter(|r| r.buzz.content.to_lowercase().contains(&fragment))
                .collect())
        })
    }
}

#[derive(Clone, Default)]
pub struct MockEngagementRepo {
    likes: Arc<Mutex<Vec<Like>>>,
    comments: Arc<Mutex<HashMap<String, Comment>>>,
    comment_inserts: Arc<AtomicUsize>,
}

impl MockEngagementRepo {
    pub fn comment_insert_count(&self) -> usize {
        self.comment_inserts.load(Ordering::SeqCst)
    }
}

impl EngagementRepository for MockEngagementRepo {
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
        self.comment_inserts.fetch_add(1, Ordering::SeqCst);
        let comment = comment.clone();
        let comments = self.comments.clone();
        Box::pin(async move {
            comments
                .lock()
                .expect("lock")
                .insert(comment.comment_id.clone(), comment.clone());
            Ok(comment)
        })
    }

    fn get_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<Option<Comment>>> {
        let comment_id = comment_id.to_string();
        let comments = self.comments.clone();
        Box::pin(async move { Ok(comments.lock().expect("lock").get(&comment_id).cloned()) })
    }

    fn delete_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let comment_id = comment_id.to_string();
        let comments = self.comments.clone();
        Box::pin(async move {
            comments.lock().expect("lock").remove(&comment_id);
            Ok(())
        })
    }
}

#[derive(Clone, Default)]
pub struct MockMessageRepo {
    messages: Arc<Mutex<Vec<Message>>>,
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl MockMessageRepo {
    pub fn seed_message(&self, message: Message) {
        self.messages.lock().expect("lock").push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().expect("lock").len()
    }

    /// Copies the user repo's current rows for sender/receiver embeds.
    pub fn link_users(&self, users: &MockUserRepo) {
        let mut map = self.users.lock().expect("lock");
        for (id, user) in users.snapshot() {
            map.insert(id, user);
        }
    }

    fn embed(&self, user_id: &str) -> Option<UserRef> {
        self.users
            .lock()
            .expect("lock")
            .get(user_id)
            .map(UserRef::from_user)
    }
}

impl MessageRepository for MockMessageRepo {
    fn create(&self, message: &Message) -> BoxFuture<'_, DomainResult<Message>> {
        let message = message.clone();
        let messages = self.messages.clone();
        Box::pin(async move {
            let mut messages = messages.lock().expect("lock");
            if messages.iter().any(|m| m.message_id == message.message_id) {
                return Err(DomainError::Conflict);
            }
            messages.push(message.clone());
            Ok(message)
        })
    }

    fn first_for_pair(
        &self,
        key: &ConversationKey,
    ) -> BoxFuture<'_, DomainResult<Option<Message>>> {
        let key = key.clone();
        let messages = self.messages.clone();
        Box::pin(async move {
            Ok(messages
                .lock()
                .expect("lock")
                .iter()
                .filter(|m| key.matches(&m.sender_id, &m.receiver_id))
                .min_by(|a, b| {
                    a.created_at_ms
                        .cmp(&b.created_at_ms)
                        .then_with(|| a.message_id.cmp(&b.message_id))
                })
                .cloned())
        })
    }

    fn list_for_pair(
        &self,
        key: &ConversationKey,
    ) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
        let key = key.clone();
        let messages = self.messages.clone();
        Box::pin(async move {
            let mut matching: Vec<Message> = messages
                .lock()
                .expect("lock")
                .iter()
                .filter(|m| key.matches(&m.sender_id, &m.receiver_id))
                .cloned()
                .collect();
            matching.sort_by(|a, b| {
                a.created_at_ms
                    .cmp(&b.created_at_ms)
                    .then_with(|| a.message_id.cmp(&b.message_id))
            });
            Ok(matching)
        })
    }

    fn list_for_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<MessageRecord>>> {
        let user_id = user_id.to_string();
        let this = self.clone();
        Box::pin(async move {
            let messages: Vec<Message> = this
                .messages
                .lock()
                .expect("lock")
                .iter()
                .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
                .cloned()
                .collect();
            Ok(messages
                .into_iter()
                .map(|message| MessageRecord {
                    sender: this.embed(&message.sender_id),
                    receiver: this.embed(&message.receiver_id),
                    message,
                })
                .collect())
        })
    }
}
