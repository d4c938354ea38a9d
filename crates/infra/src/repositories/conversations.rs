use std::sync::Arc;

use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::conversations::{ConversationKey, Message, MessageRecord};
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::ports::BoxFuture;
use fizzbuzz_domain::ports::conversations::MessageRepository;
use fizzbuzz_domain::users::UserRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;

use super::memory::MemoryGateway;
use super::support::{invalid_row, map_surreal_error, one_or_many, parse_datetime_ms, to_rfc3339};
use super::users::SurrealUserRow;

pub struct InMemoryMessageRepository {
    gateway: Arc<MemoryGateway>,
}

impl InMemoryMessageRepository {
    pub fn new(gateway: Arc<MemoryGateway>) -> Self {
        Self { gateway }
    }
}

impl MessageRepository for InMemoryMessageRepository {
    fn create(&self, message: &Message) -> BoxFuture<'_, DomainResult<Message>> {
        let message = message.clone();
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let mut messages = gateway.messages.lock().expect("lock");
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
        let gateway = self.gateway.clone();
        Box::pin(async move {
            Ok(gateway
                .messages
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
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let mut matching: Vec<Message> = gateway
                .messages
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
        let gateway = self.gateway.clone();
        Box::pin(async move {
            let messages: Vec<Message> = gateway
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
                    sender: gateway.user_ref(&message.sender_id),
                    receiver: gateway.user_ref(&message.receiver_id),
                    message,
                })
                .collect())
        })
    }
}

pub struct SurrealMessageRepository {
    client: Arc<Surreal<Client>>,
}

const MESSAGE_FIELDS: &str =
    "message_id, sender_id, receiver_id, content, <string>created_at AS created_at";

/// Symmetric pair filter: either direction belongs to the same thread.
const PAIR_FILTER: &str = "((sender_id = $low AND receiver_id = $high) \
     OR (sender_id = $high AND receiver_id = $low))";

#[derive(Debug, Serialize)]
struct SurrealMessageCreateRow {
    message_id: String,
    sender_id: String,
    receiver_id: String,
    content: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct SurrealMessageRow {
    message_id: String,
    sender_id: String,
    receiver_id: String,
    content: String,
    created_at: String,
}

impl SurrealMessageRow {
    fn into_message(self) -> DomainResult<Message> {
        Ok(Message {
            message_id: self.message_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            created_at_ms: parse_datetime_ms(&self.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SurrealMessageRecordRow {
    #[serde(flatten)]
    message: SurrealMessageRow,
    #[serde(default, deserialize_with = "one_or_many")]
    sender: Vec<SurrealUserRow>,
    #[serde(default, deserialize_with = "one_or_many")]
    receiver: Vec<SurrealUserRow>,
}

impl SurrealMessageRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn decode_messages(rows: Vec<Value>) -> DomainResult<Vec<Message>> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<SurrealMessageRow>(row)
                    .map_err(invalid_row)
                    .and_then(SurrealMessageRow::into_message)
            })
            .collect()
    }

    fn user_ref(row: SurrealUserRow) -> UserRef {
        UserRef {
            user_id: row.user_id,
            username: row.username,
            avatar_url: row.avatar_url,
        }
    }
}

impl MessageRepository for SurrealMessageRepository {
    fn create(&self, message: &Message) -> BoxFuture<'_, DomainResult<Message>> {
        let payload = SurrealMessageCreateRow {
            message_id: message.message_id.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            created_at: to_rfc3339(message.created_at_ms),
        };
        let message_id = message.message_id.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let payload = serde_json::to_value(payload).map_err(invalid_row)?;
            let mut response = client
                .query(format!(
                    "CREATE type::record('message', $message_id) SET \
                        message_id = $payload.message_id, \
                        sender_id = $payload.sender_id, \
                        receiver_id = $payload.receiver_id, \
                        content = $payload.content, \
                        created_at = <datetime>$payload.created_at; \
                     SELECT {MESSAGE_FIELDS} FROM message WHERE message_id = $message_id LIMIT 1"
                ))
                .bind(("message_id", message_id))
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(1).map_err(map_surreal_error)?;
            Self::decode_messages(rows)?
                .pop()
                .ok_or_else(|| DomainError::Gateway("create returned no row".to_string()))
        })
    }

    fn first_for_pair(
        &self,
        key: &ConversationKey,
    ) -> BoxFuture<'_, DomainResult<Option<Message>>> {
        let low = key.low().to_string();
        let high = key.high().to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {MESSAGE_FIELDS} FROM message WHERE {PAIR_FILTER} \
                     ORDER BY created_at ASC, message_id ASC LIMIT 1"
                ))
                .bind(("low", low))
                .bind(("high", high))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Ok(Self::decode_messages(rows)?.pop())
        })
    }

    fn list_for_pair(
        &self,
        key: &ConversationKey,
    ) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
        let low = key.low().to_string();
        let high = key.high().to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {MESSAGE_FIELDS} FROM message WHERE {PAIR_FILTER} \
                     ORDER BY created_at ASC, message_id ASC"
                ))
                .bind(("low", low))
                .bind(("high", high))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            Self::decode_messages(rows)
        })
    }

    fn list_for_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<MessageRecord>>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {MESSAGE_FIELDS}, \
                        (SELECT user_id, username, avatar_url, <string>created_at AS created_at \
                           FROM user WHERE user_id = $parent.sender_id) AS sender, \
                        (SELECT user_id, username, avatar_url, <string>created_at AS created_at \
                           FROM user WHERE user_id = $parent.receiver_id) AS receiver \
                     FROM message \
                     WHERE sender_id = $user_id OR receiver_id = $user_id"
                ))
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            rows.into_iter()
                .map(|row| {
                    let row: SurrealMessageRecordRow =
                        serde_json::from_value(row).map_err(invalid_row)?;
                    Ok(MessageRecord {
                        message: row.message.into_message()?,
                        sender: row.sender.into_iter().next().map(Self::user_ref),
                        receiver: row.receiver.into_iter().next().map(Self::user_ref),
                    })
                })
                .collect()
        })
    }
}
