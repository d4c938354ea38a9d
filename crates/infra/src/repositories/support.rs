use fizzbuzz_domain::DomainResult;
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::util::{format_ms_rfc3339, parse_rfc3339_ms};
use serde::{Deserialize, Deserializer};

pub(crate) fn to_rfc3339(timestamp_ms: i64) -> String {
    format_ms_rfc3339(timestamp_ms)
}

pub(crate) fn parse_datetime_ms(value: &str) -> DomainResult<i64> {
    parse_rfc3339_ms(value)
        .ok_or_else(|| DomainError::Gateway(format!("invalid datetime '{value}'")))
}

/// Unique-constraint violations surface as `Conflict`; everything else is a
/// transient gateway failure.
pub(crate) fn map_surreal_error(err: surrealdb::Error) -> DomainError {
    let error_message = err.to_string().to_lowercase();
    if error_message.contains("already exists")
        || error_message.contains("duplicate")
        || error_message.contains("unique")
        || error_message.contains("conflict")
    {
        return DomainError::Conflict;
    }
    DomainError::Gateway(format!("surreal query failed: {error_message}"))
}

pub(crate) fn invalid_row(err: impl std::fmt::Display) -> DomainError {
    DomainError::Gateway(format!("invalid gateway row: {err}"))
}

/// Embedded relations must always decode to a list. The gateway may hand
/// back a bare object for a single-row embed or nothing at all; both are
/// normalized here (part of the repository port contract).
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    let value = Option::<OneOrMany<T>>::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}
