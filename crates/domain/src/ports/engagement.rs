use crate::DomainResult;
use crate::engagement::{Comment, Like};
use crate::ports::BoxFuture;

#[allow(clippy::needless_pass_by_value)]
pub trait EngagementRepository: Send + Sync {
    /// Duplicate (buzz, user) pairs yield `Conflict`; callers treat that as
    /// success.
    fn insert_like(&self, like: &Like) -> BoxFuture<'_, DomainResult<Like>>;

    /// Deleting an absent pair is a no-op success.
    fn delete_like(&self, buzz_id: &str, user_id: &str) -> BoxFuture<'_, DomainResult<()>>;

    fn insert_comment(&self, comment: &Comment) -> BoxFuture<'_, DomainResult<Comment>>;

    fn get_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<Option<Comment>>>;

    fn delete_comment(&self, comment_id: &str) -> BoxFuture<'_, DomainResult<()>>;
}
