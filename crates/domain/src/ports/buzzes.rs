use crate::DomainResult;
use crate::buzzes::{Buzz, BuzzRecord};
use crate::feed::SortMode;
use crate::ports::BoxFuture;

/// Hydrated buzz reads embed the author, like refs and comments through
/// gateway joins. Embedded relations are always lists, never a bare object;
/// adapters normalize before returning (part of the port contract).
#[allow(clippy::needless_pass_by_value)]
pub trait BuzzRepository: Send + Sync {
    fn create(&self, buzz: &Buzz) -> BoxFuture<'_, DomainResult<Buzz>>;

    fn get(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<Option<BuzzRecord>>>;

    /// Permanent delete; the gateway cascades the buzz's likes and comments.
    fn delete(&self, buzz_id: &str) -> BoxFuture<'_, DomainResult<()>>;

    /// One page, ordered by (like_count desc, created_at desc) for trending
    /// or (created_at desc) for recent. `offset` is a row offset.
    fn list_page(
        &self,
        mode: SortMode,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>>;

    fn list_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>>;

    /// Case-insensitive substring match on content.
    fn search_content(&self, fragment: &str) -> BoxFuture<'_, DomainResult<Vec<BuzzRecord>>>;
}
