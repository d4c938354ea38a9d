use crate::DomainResult;
use crate::ports::BoxFuture;

/// Object storage for buzz images. Implementations return a public URL for
/// the stored object.
#[allow(clippy::needless_pass_by_value)]
pub trait ObjectStorage: Send + Sync {
    fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, DomainResult<String>>;
}
