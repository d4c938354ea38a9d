use crate::DomainResult;
use crate::follows::Follow;
use crate::ports::BoxFuture;
use crate::users::User;

#[allow(clippy::needless_pass_by_value)]
pub trait FollowRepository: Send + Sync {
    /// Duplicate (follower, followee) pairs yield `Conflict`; callers treat
    /// that as success.
    fn insert(&self, follow: &Follow) -> BoxFuture<'_, DomainResult<Follow>>;

    /// Deleting an absent pair is a no-op success.
    fn delete(&self, follower_id: &str, followee_id: &str) -> BoxFuture<'_, DomainResult<()>>;

    fn exists(&self, follower_id: &str, followee_id: &str) -> BoxFuture<'_, DomainResult<bool>>;

    /// Count-only head queries; the two aggregates are independent.
    fn count_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>>;

    fn count_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<u64>>;

    /// User rows joined through the follow edge.
    fn list_followers(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>>;

    fn list_following(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<User>>>;
}
