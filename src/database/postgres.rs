use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    database::{Repository, SubscriptionChange, VariationChange},
    errors::{AppError, Result},
    models::{Overlay, Plan, Subscription, User, Variation, Video},
};

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
        Ok(())
    }
}

#[derive(FromRow)]
struct SubscriptionRow {
    user_id: Uuid,
    plan: String,
    monthly_quota: i32,
    quota_used: i32,
    credits_total: i32,
    credits_used: i32,
    renews_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = AppError;

    fn try_from(row: SubscriptionRow) -> Result<Self> {
        Ok(Subscription {
            user_id: row.user_id,
            plan: row.plan.parse().map_err(|e| AppError::Internal(anyhow::Error::new(e)))?,
            monthly_quota: row.monthly_quota,
            quota_used: row.quota_used,
            credits_total: row.credits_total,
            credits_used: row.credits_used,
            renews_at: row.renews_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct VariationRow {
    id: Uuid,
    owner_id: Uuid,
    idx: i32,
    image: String,
    phrase: String,
    overlay: Json<Overlay>,
    original: Json<Overlay>,
    created_at: DateTime<Utc>,
}

impl From<VariationRow> for Variation {
    fn from(row: VariationRow) -> Self {
        Variation {
            id: row.id,
            owner_id: row.owner_id,
            index: row.idx,
            image: row.image,
            phrase: row.phrase,
            overlay: row.overlay.0,
            original: row.original.0,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct VideoRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    thumbnail_url: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<VideoRow> for Video {
    type Error = AppError;

    fn try_from(row: VideoRow) -> Result<Self> {
        Ok(Video {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            thumbnail_url: row.thumbnail_url,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "user_id, plan, monthly_quota, quota_used, credits_total, credits_used, renews_at, updated_at";
const VARIATION_COLUMNS: &str = "id, owner_id, idx, image, phrase, overlay, original, created_at";
const VIDEO_COLUMNS: &str = "id, owner_id, title, thumbnail_url, status, created_at";

#[async_trait]
impl Repository for PgRepository {
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        plan: Plan,
    ) -> Result<(User, Subscription)> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await;

        let user = match result {
            Ok(user) => user,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::Validation(
                    "User with this email already exists".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        let subscription = Subscription::new(user.id, plan, Utc::now());
        sqlx::query(&format!(
            "INSERT INTO subscriptions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription.user_id)
        .bind(subscription.plan.as_str())
        .bind(subscription.monthly_quota)
        .bind(subscription.quota_used)
        .bind(subscription.credits_total)
        .bind(subscription.credits_used)
        .bind(subscription.renews_at)
        .bind(subscription.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((user, subscription))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn modify_subscription(
        &self,
        user_id: Uuid,
        change: SubscriptionChange<'_>,
    ) -> Result<Subscription> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 FOR UPDATE",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        let mut subscription = Subscription::try_from(row)?;
        change(&mut subscription)?;

        sqlx::query(
            r#"
            UPDATE subscriptions
            SET plan = $2, monthly_quota = $3, quota_used = $4, credits_total = $5,
                credits_used = $6, renews_at = $7, updated_at = $8
            WHERE user_id = $1
            "#,
        )
        .bind(subscription.user_id)
        .bind(subscription.plan.as_str())
        .bind(subscription.monthly_quota)
        .bind(subscription.quota_used)
        .bind(subscription.credits_total)
        .bind(subscription.credits_used)
        .bind(subscription.renews_at)
        .bind(subscription.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(subscription)
    }

    async fn replace_variations(&self, owner_id: Uuid, variations: &[Variation]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM variations WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        for variation in variations {
            sqlx::query(&format!(
                "INSERT INTO variations ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                VARIATION_COLUMNS
            ))
            .bind(variation.id)
            .bind(owner_id)
            .bind(variation.index)
            .bind(&variation.image)
            .bind(&variation.phrase)
            .bind(Json(&variation.overlay))
            .bind(Json(&variation.original))
            .bind(variation.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_variations(&self, owner_id: Uuid) -> Result<Vec<Variation>> {
        let rows = sqlx::query_as::<_, VariationRow>(&format!(
            "SELECT {} FROM variations WHERE owner_id = $1 ORDER BY idx",
            VARIATION_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Variation::from).collect())
    }

    async fn get_variation(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Variation>> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            "SELECT {} FROM variations WHERE owner_id = $1 AND id = $2",
            VARIATION_COLUMNS
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Variation::from))
    }

    async fn modify_variation(
        &self,
        owner_id: Uuid,
        id: Uuid,
        change: VariationChange<'_>,
    ) -> Result<Variation> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, VariationRow>(&format!(
            "SELECT {} FROM variations WHERE owner_id = $1 AND id = $2 FOR UPDATE",
            VARIATION_COLUMNS
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        let mut variation = Variation::from(row);
        change(&mut variation)?;

        sqlx::query("UPDATE variations SET overlay = $3, original = $4 WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .bind(Json(&variation.overlay))
            .bind(Json(&variation.original))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(variation)
    }

    async fn insert_video(&self, video: &Video) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO videos ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            VIDEO_COLUMNS
        ))
        .bind(video.id)
        .bind(video.owner_id)
        .bind(&video.title)
        .bind(&video.thumbnail_url)
        .bind(video.status.as_str())
        .bind(video.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_videos(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Video>> {
        let rows = sqlx::query_as::<_, VideoRow>(&format!(
            "SELECT {} FROM videos WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2",
            VIDEO_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Video::try_from).collect()
    }
}
