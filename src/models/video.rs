use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::SubscriptionUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(VideoStatus::Processing),
            "completed" => Ok(VideoStatus::Completed),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(anyhow::anyhow!("Unknown video status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Video {
    pub id: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVideoRequest {
    pub variation_id: Uuid,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VideoListQuery {
    /// 1-100, default 20.
    pub limit: Option<i64>,
}

/// Engagement numbers are not collected yet; the dashboard shows zeros.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct AnalyticsSummary {
    pub views: u64,
    pub likes: u64,
    pub shares: u64,
    pub engagement_rate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub subscription: SubscriptionUsage,
    pub recent_videos: Vec<Video>,
    pub analytics: AnalyticsSummary,
}
