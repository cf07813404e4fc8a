use chrono::Utc;
use uuid::Uuid;

use crate::{
    database::SharedRepository,
    errors::{AppError, Result},
    models::{Subscription, UsageDenied},
};

fn denied(reason: UsageDenied) -> AppError {
    match reason {
        UsageDenied::NoCredits => AppError::InsufficientCredits(reason.message().to_string()),
        UsageDenied::QuotaReached => AppError::QuotaExceeded(reason.message().to_string()),
    }
}

/// Usage accounting on top of the repository. Every change goes through
/// `modify_subscription` so concurrent requests cannot overdraw.
#[derive(Clone)]
pub struct CreditService {
    repository: SharedRepository,
}

impl CreditService {
    pub fn new(repository: SharedRepository) -> Self {
        Self { repository }
    }

    /// Current usage, renewing the period first if it has lapsed.
    pub async fn usage(&self, user_id: Uuid) -> Result<Subscription> {
        let subscription = self
            .repository
            .get_subscription(user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if subscription.renews_at > Utc::now() {
            return Ok(subscription);
        }

        self.repository
            .modify_subscription(user_id, &|s: &mut Subscription| {
                s.roll_over(Utc::now());
                Ok(())
            })
            .await
    }

    pub async fn consume_credit(&self, user_id: Uuid) -> Result<Subscription> {
        let subscription = self
            .repository
            .modify_subscription(user_id, &|s: &mut Subscription| {
                s.consume_credit(Utc::now()).map_err(denied)
            })
            .await?;

        tracing::debug!(
            user_id = %user_id,
            credits_remaining = subscription.credits_remaining(),
            "Credit consumed"
        );
        Ok(subscription)
    }

    /// Gives back a credit taken for work that then failed.
    pub async fn refund_credit(&self, user_id: Uuid) -> Result<Subscription> {
        let subscription = self
            .repository
            .modify_subscription(user_id, &|s: &mut Subscription| {
                if s.credits_used > 0 {
                    s.credits_used -= 1;
                    s.updated_at = Utc::now();
                }
                Ok(())
            })
            .await?;

        tracing::info!(user_id = %user_id, "Credit refunded");
        Ok(subscription)
    }

    pub async fn consume_quota(&self, user_id: Uuid) -> Result<Subscription> {
        self.repository
            .modify_subscription(user_id, &|s: &mut Subscription| {
                s.consume_quota(Utc::now()).map_err(denied)
            })
            .await
    }

    pub async fn refund_quota(&self, user_id: Uuid) -> Result<Subscription> {
        self.repository
            .modify_subscription(user_id, &|s: &mut Subscription| {
                if s.quota_used > 0 {
                    s.quota_used -= 1;
                    s.updated_at = Utc::now();
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{database::MemoryRepository, models::Plan};
    use std::sync::Arc;

    async fn service_with_credits(credits: i32) -> (CreditService, Uuid) {
        let repository: SharedRepository = Arc::new(MemoryRepository::new());
        let (user, _) = repository.create_account("a@example.com", "hash", Plan::Free).await.unwrap();
        repository
            .modify_subscription(user.id, &move |s: &mut Subscription| {
                s.credits_total = credits;
                Ok(())
            })
            .await
            .unwrap();
        (CreditService::new(repository), user.id)
    }

    #[tokio::test]
    async fn test_consume_until_empty() {
        let (service, user_id) = service_with_credits(1).await;

        let after = service.consume_credit(user_id).await.unwrap();
        assert_eq!(after.credits_remaining(), 0);

        let err = service.consume_credit(user_id).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientCredits(_)));

        let usage = service.usage(user_id).await.unwrap();
        assert_eq!(usage.credits_used, 1);
    }

    #[tokio::test]
    async fn test_refund_restores_credit() {
        let (service, user_id) = service_with_credits(1).await;
        service.consume_credit(user_id).await.unwrap();
        let refunded = service.refund_credit(user_id).await.unwrap();
        assert_eq!(refunded.credits_remaining(), 1);

        // no credit outstanding, nothing to give back
        let again = service.refund_credit(user_id).await.unwrap();
        assert_eq!(again.credits_used, 0);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_maps_to_quota_error() {
        let (service, user_id) = service_with_credits(1).await;
        for _ in 0..Plan::Free.limits().monthly_quota {
            service.consume_quota(user_id).await.unwrap();
        }
        let err = service.consume_quota(user_id).await.unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_concurrent_consumption_never_overdraws() {
        let (service, user_id) = service_with_credits(3).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move { service.consume_credit(user_id).await.is_ok() }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 3);
    }

    #[tokio::test]
    async fn test_usage_for_unknown_user() {
        let (service, _) = service_with_credits(1).await;
        assert!(matches!(service.usage(Uuid::new_v4()).await, Err(AppError::NotFound)));
    }
}
