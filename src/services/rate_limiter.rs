use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use crate::{errors::Result, services::redis::RedisService};

/// Fixed-window request counter per user and endpoint group.
#[derive(Clone)]
pub struct RateLimiter {
    redis: RedisService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub current: u64,
    pub limit: u32,
}

impl RateLimiter {
    pub fn new(redis: RedisService) -> Self {
        Self { redis }
    }

    pub fn window_key(scope: &str, user_id: Uuid, window: Duration, now: i64) -> String {
        let window_secs = window.as_secs().max(1) as i64;
        format!("rate_limit:{}:{}:{}", scope, user_id, now / window_secs)
    }

    pub async fn check(
        &self,
        scope: &str,
        user_id: Uuid,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitResult> {
        let key = Self::window_key(scope, user_id, window, chrono::Utc::now().timestamp());
        let mut conn = self.redis.connection_manager().clone();

        let current: u64 = conn.incr(&key, 1u64).await?;
        if current == 1 {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(window.as_secs().max(1))
                .query_async::<_, ()>(&mut conn)
                .await?;
        }

        Ok(RateLimitResult {
            allowed: current <= limit as u64,
            current,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_key_buckets() {
        let user = Uuid::new_v4();
        let hour = Duration::from_secs(3600);

        let a = RateLimiter::window_key("generate", user, hour, 7_200);
        let b = RateLimiter::window_key("generate", user, hour, 10_799);
        let c = RateLimiter::window_key("generate", user, hour, 10_800);

        assert_eq!(a, b);
        assert_ne!(b, c);
        assert!(a.starts_with("rate_limit:generate:"));
    }
}
