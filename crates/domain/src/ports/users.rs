use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::users::User;

#[allow(clippy::needless_pass_by_value)]
pub trait UserRepository: Send + Sync {
    /// Insert a user row. Duplicate id or username yields `Conflict`.
    fn create(&self, user: &User) -> BoxFuture<'_, DomainResult<User>>;

    fn get_by_id(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>>;

    fn get_by_username(&self, username: &str) -> BoxFuture<'_, DomainResult<Option<User>>>;

    /// Case-insensitive substring match on username.
    fn search_by_username_fragment(
        &self,
        fragment: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<User>>>;
}
