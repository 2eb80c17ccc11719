use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::overview::{request, VideoSummary};
use crate::error::FetchError;
use crate::Postiva;

const VIDEO_QUERY_PATH: &str = "/tiktok/video-query/";

/// A single video with its engagement counters.
pub type VideoDetail = VideoSummary;

#[derive(Deserialize, Default)]
#[serde(default)]
struct VideoQuery {
    #[serde(deserialize_with = "crate::de::null_as_default")]
    videos: Vec<VideoDetail>,
    #[serde(deserialize_with = "crate::de::null_as_default")]
    total_count: u64,
    #[serde(deserialize_with = "crate::de::null_as_default")]
    found_in_db: u64,
    #[serde(deserialize_with = "crate::de::null_as_default")]
    missing_from_db: u64,
}

/// State of the video detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoDetailState {
    /// A fetch is in flight.
    pub is_loading: bool,
    /// Message of the last failure.
    pub error: Option<String>,
    /// The fetched video. Cleared when a new fetch starts.
    pub video: Option<VideoDetail>,
    /// When the video was fetched.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fetches one video by id.
#[derive(Debug)]
pub struct VideoDetailFetcher {
    client: Postiva,
    state: VideoDetailState,
}

impl VideoDetailFetcher {
    pub(crate) fn new(client: Postiva) -> Self {
        Self {
            client,
            state: VideoDetailState::default(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &VideoDetailState {
        &self.state
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        self.state = VideoDetailState::default();
    }

    /// Fetches the video `video_id`. `force_refresh` makes the backend ask
    /// TikTok instead of its database.
    pub async fn fetch(
        &mut self,
        video_id: &str,
        force_refresh: bool,
    ) -> Result<VideoDetail, FetchError> {
        self.state.is_loading = true;
        self.state.error = None;
        self.state.video = None;

        let result = self.query(video_id, force_refresh).await;

        self.state.is_loading = false;
        match &result {
            Ok(video) => {
                self.state.video = Some(video.clone());
                self.state.last_updated = Some(Utc::now());
            }
            Err(error) => {
                tracing::error!(%error, video_id, "TikTok video detail error");
                self.state.error = Some(error.to_string());
            }
        }

        result
    }

    async fn query(&self, video_id: &str, force_refresh: bool) -> Result<VideoDetail, FetchError> {
        if video_id.is_empty() {
            return Err(FetchError::InvalidInput("video id is empty"));
        }

        let query: VideoQuery = request(
            &self.client,
            VIDEO_QUERY_PATH,
            vec![
                ("video_ids", video_id.to_string()),
                ("force_refresh", force_refresh.to_string()),
            ],
            "fetch video details",
        )
        .await?;

        tracing::debug!(
            total = query.total_count,
            found_in_db = query.found_in_db,
            missing_from_db = query.missing_from_db,
            "video query answered"
        );

        query.videos.into_iter().next().ok_or(FetchError::NotFound)
    }
}
