pub mod buzzes;
pub mod conversations;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod follows;
pub mod identity;
pub mod ports;
pub mod users;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub type DomainResult<T> = Result<T, error::DomainError>;
