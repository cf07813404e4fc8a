use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    database::{Repository, SubscriptionChange, VariationChange},
    errors::{AppError, Result},
    models::{Plan, Subscription, User, Variation, Video},
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    subscriptions: HashMap<Uuid, Subscription>,
    variations: HashMap<Uuid, Vec<Variation>>,
    videos: Vec<Video>,
}

/// Process-local repository used by tests and database-less runs.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        plan: Plan,
    ) -> Result<(User, Subscription)> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == email) {
            return Err(AppError::Validation("User with this email already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        };
        let subscription = Subscription::new(user.id, plan, now);

        state.users.insert(user.id, user.clone());
        state.subscriptions.insert(user.id, subscription.clone());
        Ok((user, subscription))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        Ok(self.state.read().await.subscriptions.get(&user_id).cloned())
    }

    async fn modify_subscription(
        &self,
        user_id: Uuid,
        change: SubscriptionChange<'_>,
    ) -> Result<Subscription> {
        let mut state = self.state.write().await;
        let stored = state.subscriptions.get_mut(&user_id).ok_or(AppError::NotFound)?;

        let mut next = stored.clone();
        change(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    async fn replace_variations(&self, owner_id: Uuid, variations: &[Variation]) -> Result<()> {
        let mut state = self.state.write().await;
        state.variations.insert(owner_id, variations.to_vec());
        Ok(())
    }

    async fn list_variations(&self, owner_id: Uuid) -> Result<Vec<Variation>> {
        let state = self.state.read().await;
        let mut variations = state.variations.get(&owner_id).cloned().unwrap_or_default();
        variations.sort_by_key(|v| v.index);
        Ok(variations)
    }

    async fn get_variation(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Variation>> {
        let state = self.state.read().await;
        Ok(state
            .variations
            .get(&owner_id)
            .and_then(|set| set.iter().find(|v| v.id == id))
            .cloned())
    }

    async fn modify_variation(
        &self,
        owner_id: Uuid,
        id: Uuid,
        change: VariationChange<'_>,
    ) -> Result<Variation> {
        let mut state = self.state.write().await;
        let stored = state
            .variations
            .get_mut(&owner_id)
            .and_then(|set| set.iter_mut().find(|v| v.id == id))
            .ok_or(AppError::NotFound)?;

        let mut next = stored.clone();
        change(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    async fn insert_video(&self, video: &Video) -> Result<()> {
        self.state.write().await.videos.push(video.clone());
        Ok(())
    }

    async fn list_videos(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Video>> {
        let state = self.state.read().await;
        let mut videos: Vec<Video> = state
            .videos
            .iter()
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        videos.truncate(limit.max(0) as usize);
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Plan, VideoStatus};

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = MemoryRepository::new();
        repo.create_account("a@example.com", "hash", Plan::Free).await.unwrap();
        assert!(matches!(
            repo.create_account("a@example.com", "hash", Plan::Pro).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(repo.state.read().await.subscriptions.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_change_is_not_persisted() {
        let repo = MemoryRepository::new();
        let (user, _) = repo.create_account("a@example.com", "hash", Plan::Free).await.unwrap();
        let user_id = user.id;

        let result = repo
            .modify_subscription(user_id, &|s: &mut Subscription| {
                s.credits_used = 99;
                Err(AppError::NotFound)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(repo.get_subscription(user_id).await.unwrap().unwrap().credits_used, 0);
    }

    #[tokio::test]
    async fn test_replace_variations_discards_previous_set() {
        let repo = MemoryRepository::new();
        let owner = Uuid::new_v4();
        let first = Variation::new(owner, 0, "a".into(), "one".into());
        repo.replace_variations(owner, &[first.clone()]).await.unwrap();

        let second = vec![
            Variation::new(owner, 1, "c".into(), "three".into()),
            Variation::new(owner, 0, "b".into(), "two".into()),
        ];
        repo.replace_variations(owner, &second).await.unwrap();

        let listed = repo.list_variations(owner).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].phrase, "two");
        assert!(repo.get_variation(owner, first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_videos_listed_newest_first() {
        let repo = MemoryRepository::new();
        let owner = Uuid::new_v4();
        for (i, title) in ["old", "new"].iter().enumerate() {
            repo.insert_video(&Video {
                id: Uuid::new_v4(),
                owner_id: owner,
                title: title.to_string(),
                thumbnail_url: None,
                status: VideoStatus::Completed,
                created_at: Utc::now() + chrono::Duration::seconds(i as i64),
            })
            .await
            .unwrap();
        }

        let videos = repo.list_videos(owner, 10).await.unwrap();
        assert_eq!(videos[0].title, "new");
        assert_eq!(repo.list_videos(owner, 1).await.unwrap().len(), 1);
        assert!(repo.list_videos(Uuid::new_v4(), 10).await.unwrap().is_empty());
    }
}
