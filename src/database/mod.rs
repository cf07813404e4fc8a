use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    errors::Result,
    models::{Plan, Subscription, User, Variation, Video},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Mutation applied to a subscription while it is locked.
pub type SubscriptionChange<'a> = &'a (dyn Fn(&mut Subscription) -> Result<()> + Send + Sync);
/// Mutation applied to a variation while it is locked.
pub type VariationChange<'a> = &'a (dyn Fn(&mut Variation) -> Result<()> + Send + Sync);

#[async_trait]
pub trait Repository: Send + Sync {
    async fn health_check(&self) -> Result<()>;

    /// Creates the user together with a fresh subscription on `plan`.
    /// Either both rows exist afterwards or neither does.
    async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        plan: Plan,
    ) -> Result<(User, Subscription)>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>>;
    /// Runs `change` against the stored row under a lock and persists the
    /// result. Nothing is written when `change` fails.
    async fn modify_subscription(
        &self,
        user_id: Uuid,
        change: SubscriptionChange<'_>,
    ) -> Result<Subscription>;

    /// Drops the owner's previous variations and stores `variations` in their place.
    async fn replace_variations(&self, owner_id: Uuid, variations: &[Variation]) -> Result<()>;
    async fn list_variations(&self, owner_id: Uuid) -> Result<Vec<Variation>>;
    async fn get_variation(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Variation>>;
    /// Same contract as `modify_subscription`, for one of the owner's variations.
    async fn modify_variation(
        &self,
        owner_id: Uuid,
        id: Uuid,
        change: VariationChange<'_>,
    ) -> Result<Variation>;

    async fn insert_video(&self, video: &Video) -> Result<()>;
    /// Newest first.
    async fn list_videos(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Video>>;
}

pub type SharedRepository = Arc<dyn Repository>;

/// `memory` selects the in-process store; anything else is a Postgres URL.
pub async fn connect(database_url: &str) -> Result<SharedRepository> {
    if database_url == "memory" {
        tracing::warn!("Using in-memory repository; data is lost on restart");
        return Ok(Arc::new(MemoryRepository::new()));
    }

    let repository = PgRepository::new(database_url).await?;
    repository.migrate().await?;
    Ok(Arc::new(repository))
}
