use std::sync::Arc;

use fizzbuzz_domain::ports::buzzes::BuzzRepository;
use fizzbuzz_domain::ports::conversations::MessageRepository;
use fizzbuzz_domain::ports::engagement::EngagementRepository;
use fizzbuzz_domain::ports::follows::FollowRepository;
use fizzbuzz_domain::ports::storage::ObjectStorage;
use fizzbuzz_domain::ports::users::UserRepository;
use fizzbuzz_infra::config::AppConfig;
use fizzbuzz_infra::db::{DbConfig, SurrealAdapter, connect};
use fizzbuzz_infra::repositories::{
    InMemoryBuzzRepository, InMemoryEngagementRepository, InMemoryFollowRepository,
    InMemoryMessageRepository, InMemoryUserRepository, MemoryGateway, SurrealBuzzRepository,
    SurrealEngagementRepository, SurrealFollowRepository, SurrealMessageRepository,
    SurrealUserRepository,
};
use fizzbuzz_infra::storage::{InMemoryObjectStore, S3ObjectStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub user_repo: Arc<dyn UserRepository>,
    pub buzz_repo: Arc<dyn BuzzRepository>,
    pub engagement_repo: Arc<dyn EngagementRepository>,
    pub message_repo: Arc<dyn MessageRepository>,
    pub follow_repo: Arc<dyn FollowRepository>,
    pub object_store: Arc<dyn ObjectStorage>,
    pub db_adapter: Option<Arc<SurrealAdapter>>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        if config.data_backend.eq_ignore_ascii_case("surreal") {
            let db_config = DbConfig::from_app_config(&config);
            let client = connect(&db_config).await?;
            let object_store = build_object_store(&config).await;
            return Ok(Self {
                user_repo: Arc::new(SurrealUserRepository::with_client(client.clone())),
                buzz_repo: Arc::new(SurrealBuzzRepository::with_client(client.clone())),
                engagement_repo: Arc::new(SurrealEngagementRepository::with_client(client.clone())),
                message_repo: Arc::new(SurrealMessageRepository::with_client(client.clone())),
                follow_repo: Arc::new(SurrealFollowRepository::with_client(client)),
                object_store,
                db_adapter: Some(Arc::new(SurrealAdapter::new(db_config))),
                config,
            });
        }

        Ok(Self::with_memory_backend(config))
    }

    /// Everything in process: the memory gateway plus a memory object
    /// store. This is what the tests and local development run against.
    pub fn with_memory_backend(config: AppConfig) -> Self {
        let gateway = Arc::new(MemoryGateway::new());
        let object_store = Arc::new(InMemoryObjectStore::new(format!(
            "{}/{}",
            config.s3_public_base_url.trim_end_matches('/'),
            config.s3_bucket
        )));
        Self {
            user_repo: Arc::new(InMemoryUserRepository::new(gateway.clone())),
            buzz_repo: Arc::new(InMemoryBuzzRepository::new(gateway.clone())),
            engagement_repo: Arc::new(InMemoryEngagementRepository::new(gateway.clone())),
            message_repo: Arc::new(InMemoryMessageRepository::new(gateway.clone())),
            follow_repo: Arc::new(InMemoryFollowRepository::new(gateway)),
            object_store,
            db_adapter: None,
            config,
        }
    }
}

async fn build_object_store(config: &AppConfig) -> Arc<dyn ObjectStorage> {
    if config.storage_backend.eq_ignore_ascii_case("s3") {
        Arc::new(S3ObjectStore::from_app_config(config).await)
    } else {
        Arc::new(InMemoryObjectStore::new(format!(
            "{}/{}",
            config.s3_public_base_url.trim_end_matches('/'),
            config.s3_bucket
        )))
    }
}
