use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod buzzes;
pub mod conversations;
pub mod db;
pub mod engagement;
pub mod follows;
pub mod storage;
pub mod users;
