use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::Viewer;
use crate::ports::conversations::MessageRepository;
use crate::ports::users::UserRepository;
use crate::users::UserRef;
use crate::util::now_ms;

const MAX_MESSAGE_LENGTH: usize = 2_000;

/// Content of the seed message materializing a thread on first contact.
pub const SEED_MESSAGE_CONTENT: &str = "Conversation started";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<UserRef>,
    pub receiver: Option<UserRef>,
}

/// Canonical form of the unordered participant pair: `low` and `high` are
/// the two user ids in lexicographic order. A conversation has no identity
/// of its own; this key is how both sides address the same message set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    low: String,
    high: String,
}

impl ConversationKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let a = a.into();
        let b = b.into();
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    pub fn matches(&self, sender_id: &str, receiver_id: &str) -> bool {
        (sender_id == self.low && receiver_id == self.high)
            || (sender_id == self.high && receiver_id == self.low)
    }

    /// Deterministic id for the pair's seed message. Both participants
    /// derive the same id, so concurrent first contact collides on the
    /// gateway's unique-id constraint instead of forking the thread.
    pub fn seed_message_id(&self) -> String {
        format!("seed_{}_{}", self.low, self.high)
    }
}

/// Routing handle for a thread: the id of its first message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadHandle {
    pub message_id: String,
    pub other: UserRef,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub other: UserRef,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub other: UserRef,
    pub last_content: String,
    pub last_at_ms: i64,
}

#[derive(Clone)]
pub struct ConversationService {
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
}

impl ConversationService {
    pub fn new(messages: Arc<dyn MessageRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { messages, users }
    }

    /// Maps the (viewer, target) pair to its single thread, creating the
    /// seed message on first contact. Idempotent: repeated resolution from
    /// either side converges on the same handle.
    pub async fn resolve_or_create(
        &self,
        viewer: &Viewer,
        target_username: &str,
    ) -> DomainResult<ThreadHandle> {
        let target_username = target_username.trim();
        if target_username.is_empty() {
            return Err(DomainError::Validation("target username is required".into()));
        }
        let target = self
            .users
            .get_by_username(target_username)
            .await?
            .ok_or(DomainError::NotFound)?;
        let other = UserRef::from_user(&target);
        let key = ConversationKey::new(viewer.user_id.clone(), target.user_id.clone());

        if let Some(first) = self.messages.first_for_pair(&key).await? {
            return Ok(ThreadHandle {
                message_id: first.message_id,
                other,
            });
        }

        let seed = Message {
            message_id: key.seed_message_id(),
            sender_id: key.low().to_string(),
            receiver_id: key.high().to_string(),
            content: SEED_MESSAGE_CONTENT.to_string(),
            created_at_ms: now_ms(),
        };
        match self.messages.create(&seed).await {
            Ok(message) => Ok(ThreadHandle {
                message_id: message.message_id,
                other,
            }),
            Err(DomainError::Conflict) => {
                // Lost the seed race; the other participant's seed is the
                // thread now.
                let first = self
                    .messages
                    .first_for_pair(&key)
                    .await?
                    .ok_or(DomainError::Conflict)?;
                Ok(ThreadHandle {
                    message_id: first.message_id,
                    other,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// All messages between the viewer and the named counterpart, oldest
    /// first (chat-log order).
    pub async fn load_thread(&self, viewer: &Viewer, other_username: &str) -> DomainResult<Thread> {
        let other = self
            .users
            .get_by_username(other_username.trim())
            .await?
            .ok_or(DomainError::NotFound)?;
        let key = ConversationKey::new(viewer.user_id.clone(), other.user_id.clone());
        let messages = self.messages.list_for_pair(&key).await?;
        Ok(Thread {
            other: UserRef::from_user(&other),
            messages,
        })
    }

    pub async fn send_message(
        &self,
        viewer: &Viewer,
        receiver_id: &str,
        content: &str,
    ) -> DomainResult<Message> {
        let content = validate_message_content(content)?;
        let message = Message {
            message_id: crate::util::uuid_v7_without_dashes(),
            sender_id: viewer.user_id.clone(),
            receiver_id: receiver_id.to_string(),
            content,
            created_at_ms: now_ms(),
        };
        self.messages.create(&message).await
    }

    /// The viewer's conversation list: every message touching the viewer,
    /// grouped by counterpart, reduced to the most recent message each, and
    /// ordered by that message's timestamp descending. Recomputed per load.
    pub async fn list_conversations(
        &self,
        viewer: &Viewer,
    ) -> DomainResult<Vec<ConversationSummary>> {
        let records = self.messages.list_for_user(&viewer.user_id).await?;

        let mut latest: HashMap<String, ConversationSummary> = HashMap::new();
        for record in records {
            let (other_id, other_ref) = if record.message.sender_id == viewer.user_id {
                (record.message.receiver_id.clone(), record.receiver.clone())
            } else {
                (record.message.sender_id.clone(), record.sender.clone())
            };
            let other = other_ref.unwrap_or_else(|| UserRef::unresolved(other_id.clone()));

            let replace = latest
                .get(&other_id)
                .map(|existing| record.message.created_at_ms > existing.last_at_ms)
                .unwrap_or(true);
            if replace {
                latest.insert(
                    other_id,
                    ConversationSummary {
                        other,
                        last_content: record.message.content.clone(),
                        last_at_ms: record.message.created_at_ms,
                    },
                );
            }
        }

        let mut summaries: Vec<ConversationSummary> = latest.into_values().collect();
        summaries.sort_by(|a, b| {
            b.last_at_ms
                .cmp(&a.last_at_ms)
                .then_with(|| a.other.user_id.cmp(&b.other.user_id))
        });
        Ok(summaries)
    }
}

fn validate_message_content(content: &str) -> DomainResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DomainError::Validation("message is required".into()));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(DomainError::Validation(format!(
            "message exceeds max length of {MAX_MESSAGE_LENGTH}"
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockMessageRepo, MockUserRepo};
    use crate::users::User;

    fn service(messages: MockMessageRepo, users: MockUserRepo) -> ConversationService {
        ConversationService::new(Arc::new(messages), Arc::new(users))
    }

    fn seed_user(repo: &MockUserRepo, id: &str, name: &str) {
        repo.seed(User {
            user_id: id.to_string(),
            username: name.to_string(),
            avatar_url: None,
            created_at_ms: 1,
        });
    }

    fn viewer(id: &str, name: &str) -> Viewer {
        Viewer {
            user_id: id.to_string(),
            username: name.to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn unknown_target_yields_not_found_and_creates_nothing() {
        let messages = MockMessageRepo::default();
        let service = service(messages.clone(), MockUserRepo::default());
        let err = service
            .resolve_or_create(&viewer("a", "alice"), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
        assert_eq!(messages.message_count(), 0);
    }

    #[tokio::test]
    async fn resolution_from_both_sides_converges_on_one_thread() {
        let users = MockUserRepo::default();
        seed_user(&users, "a", "alice");
        seed_user(&users, "b", "bob");
        let messages = MockMessageRepo::default();
        let service = service(messages.clone(), users);

        let from_alice = service
            .resolve_or_create(&viewer("a", "alice"), "bob")
            .await
            .expect("alice resolves");
        let from_bob = service
            .resolve_or_create(&viewer("b", "bob"), "alice")
            .await
            .expect("bob resolves");

        assert_eq!(from_alice.message_id, from_bob.message_id);
        assert_eq!(messages.message_count(), 1);
    }

    #[tokio::test]
    async fn losing_the_seed_race_resolves_to_the_winner_seed() {
        let users = MockUserRepo::default();
        seed_user(&users, "a", "alice");
        seed_user(&users, "b", "bob");
        let messages = MockMessageRepo::default();

        // The counterpart's seed lands first under the canonical id.
        let key = ConversationKey::new("a", "b");
        messages.seed_message(Message {
            message_id: key.seed_message_id(),
            sender_id: "a".to_string(),
            receiver_id: "b".to_string(),
            content: SEED_MESSAGE_CONTENT.to_string(),
            created_at_ms: 5,
        });

        let service = service(messages.clone(), users);
        let handle = service
            .resolve_or_create(&viewer("b", "bob"), "alice")
            .await
            .expect("resolves to existing seed");
        assert_eq!(handle.message_id, key.seed_message_id());
        assert_eq!(messages.message_count(), 1);
    }

    #[tokio::test]
    async fn thread_loads_oldest_first_across_both_directions() {
        let users = MockUserRepo::default();
        seed_user(&users, "a", "alice");
        seed_user(&users, "b", "bob");
        let messages = MockMessageRepo::default();
        for (id, from, to, at) in [
            ("m2", "b", "a", 20),
            ("m1", "a", "b", 10),
            ("m3", "a", "b", 30),
            ("other", "a", "c", 15),
        ] {
            messages.seed_message(Message {
                message_id: id.to_string(),
                sender_id: from.to_string(),
                receiver_id: to.to_string(),
                content: id.to_string(),
                created_at_ms: at,
            });
        }

        let service = service(messages, users);
        let thread = service
            .load_thread(&viewer("a", "alice"), "bob")
            .await
            .expect("thread");
        let ids: Vec<_> = thread
            .messages
            .iter()
            .map(|m| m.message_id.as_str())
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_any_gateway_call() {
        let messages = MockMessageRepo::default();
        let service = service(messages.clone(), MockUserRepo::default());
        let err = service
            .send_message(&viewer("a", "alice"), "b", "  \n ")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(messages.message_count(), 0);
    }

    #[tokio::test]
    async fn conversation_list_keeps_latest_message_per_counterpart() {
        let users = MockUserRepo::default();
        for (id, name) in [("a", "alice"), ("b", "bob"), ("c", "carol")] {
            seed_user(&users, id, name);
        }
        let messages = MockMessageRepo::default();
        messages.link_users(&users);
        for (id, from, to, at) in [
            ("m1", "a", "b", 10),
            ("m2", "b", "a", 40),
            ("m3", "a", "c", 20),
            ("m4", "c", "a", 30),
            ("m5", "b", "c", 99),
        ] {
            messages.seed_message(Message {
                message_id: id.to_string(),
                sender_id: from.to_string(),
                receiver_id: to.to_string(),
                content: id.to_string(),
                created_at_ms: at,
            });
        }

        let service = service(messages, users);
        let summaries = service
            .list_conversations(&viewer("a", "alice"))
            .await
            .expect("summaries");

        let view: Vec<(&str, &str, i64)> = summaries
            .iter()
            .map(|s| (s.other.username.as_str(), s.last_content.as_str(), s.last_at_ms))
            .collect();
        assert_eq!(view, vec![("bob", "m2", 40), ("carol", "m4", 30)]);
    }
}
