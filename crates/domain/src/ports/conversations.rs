use crate::DomainResult;
use crate::conversations::{ConversationKey, Message, MessageRecord};
use crate::ports::BoxFuture;

#[allow(clippy::needless_pass_by_value)]
pub trait MessageRepository: Send + Sync {
    /// Insert under the message's own id. An existing id yields `Conflict`
    /// (this is what makes deterministic seed ids race-free).
    fn create(&self, message: &Message) -> BoxFuture<'_, DomainResult<Message>>;

    /// Earliest message between the pair, in either sender/receiver order.
    fn first_for_pair(
        &self,
        key: &ConversationKey,
    ) -> BoxFuture<'_, DomainResult<Option<Message>>>;

    /// All messages between the pair, ascending by creation time.
    fn list_for_pair(&self, key: &ConversationKey)
        -> BoxFuture<'_, DomainResult<Vec<Message>>>;

    /// All messages the user sent or received, with sender/receiver embeds.
    fn list_for_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<MessageRecord>>>;
}
