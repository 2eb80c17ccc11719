use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::FetchError;
use crate::{ApiEnvelope, Postiva};

const USER_PROFILE_PATH: &str = "/tiktok/user-profile/";
const USER_VIDEOS_PATH: &str = "/tiktok/user-videos/";

/// Profile of the linked TikTok account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// TikTok open id.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub open_id: String,
    /// TikTok union id.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub union_id: String,
    /// Avatar.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub avatar_url: String,
    /// Avatar, 100x100.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub avatar_url_100: String,
    /// Avatar, large.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub avatar_large_url: String,
    /// Display name.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub display_name: String,
    /// Bio.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub bio_description: String,
    /// Link to the profile in the TikTok app.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub profile_deep_link: String,
    /// Verified badge.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub is_verified: bool,
    /// Handle.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub username: String,
    /// Followers.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub follower_count: u64,
    /// Followed accounts.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub following_count: u64,
    /// Total likes.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub likes_count: u64,
    /// Published videos.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub video_count: u64,
}

/// A published video with its engagement counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VideoSummary {
    /// TikTok video id.
    pub id: String,
    /// Unix timestamp, in seconds.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub create_time: i64,
    /// Cover image.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub cover_image_url: String,
    /// Public link.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub share_url: String,
    /// Description.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub video_description: String,
    /// Duration in seconds.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub duration: u32,
    /// Height in pixels.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub height: u32,
    /// Width in pixels.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub width: u32,
    /// Title.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub title: String,
    /// Embed snippet.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub embed_html: String,
    /// Embed link.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub embed_link: String,
    /// Likes.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub like_count: u64,
    /// Comments.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub comment_count: u64,
    /// Shares.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub share_count: u64,
    /// Views.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub view_count: u64,
}

impl VideoSummary {
    /// Creation time, when the timestamp is valid.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.create_time, 0)
    }
}

/// A page of the account's videos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VideoPage {
    /// The videos.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub videos: Vec<VideoSummary>,
    /// Total number of videos of the account.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub total_count: u64,
    /// Paging cursor.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub cursor: i64,
    /// More videos can be fetched.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub has_more: bool,
}

#[derive(Deserialize)]
struct ProfilePayload {
    data: Option<UserProfile>,
    last_updated: Option<String>,
}

/// State of the overview page. Each fetch replaces its slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverviewState {
    /// A fetch is in flight.
    pub is_loading: bool,
    /// Message of the last failure.
    pub error: Option<String>,
    /// Last fetched profile.
    pub profile: Option<UserProfile>,
    /// Last fetched videos.
    pub videos: Vec<VideoSummary>,
    /// Total videos of the account.
    pub total_videos: u64,
    /// More videos can be fetched.
    pub has_more_videos: bool,
    /// When the backend last refreshed the profile from TikTok.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fetches the profile and videos of the linked TikTok account.
#[derive(Debug)]
pub struct Overview {
    client: Postiva,
    state: OverviewState,
}

impl Overview {
    pub(crate) fn new(client: Postiva) -> Self {
        Self {
            client,
            state: OverviewState::default(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &OverviewState {
        &self.state
    }

    /// Dismisses the error message.
    pub fn clear_error(&mut self) {
        self.state.error = None;
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        self.state = OverviewState::default();
    }

    /// Fetches the account profile. `refresh` asks the backend to bypass its cache.
    pub async fn fetch_profile(&mut self, refresh: bool) -> Result<UserProfile, FetchError> {
        self.begin();

        let result = request_profile(&self.client, refresh).await;
        self.apply_profile(&result);

        result.map(|(profile, _)| profile)
    }

    /// Fetches the account videos.
    ///
    /// # Example
    /// ```rust,ignore
    /// let page = overview.fetch_videos().max_count(10).refresh(true).call().await?;
    /// ```
    pub fn fetch_videos(&mut self) -> FetchVideosBuilder<'_> {
        FetchVideosBuilder {
            overview: self,
            max_count: 20,
            refresh: false,
        }
    }

    /// Fetches the profile and the first 20 videos concurrently.
    ///
    /// Each result is applied on its own; the first error is returned once
    /// both requests finished.
    pub async fn fetch_overview(&mut self, refresh: bool) -> Result<(), FetchError> {
        self.begin();

        let (profile, videos) = tokio::join!(
            request_profile(&self.client, refresh),
            request_videos(&self.client, 20, refresh)
        );

        self.apply_profile(&profile);
        self.apply_videos(&videos);

        match (profile, videos) {
            (Err(error), _) | (_, Err(error)) => Err(error),
            _ => Ok(()),
        }
    }

    fn begin(&mut self) {
        self.state.is_loading = true;
        self.state.error = None;
    }

    fn apply_profile(&mut self, result: &Result<(UserProfile, Option<DateTime<Utc>>), FetchError>) {
        self.state.is_loading = false;

        match result {
            Ok((profile, last_updated)) => {
                self.state.profile = Some(profile.clone());
                self.state.last_updated = *last_updated;
            }
            Err(error) => self.fail(error, "TikTok user profile error"),
        }
    }

    fn apply_videos(&mut self, result: &Result<VideoPage, FetchError>) {
        self.state.is_loading = false;

        match result {
            Ok(page) => {
                self.state.videos.clone_from(&page.videos);
                self.state.total_videos = page.total_count;
                self.state.has_more_videos = page.has_more;
            }
            Err(error) => self.fail(error, "TikTok user videos error"),
        }
    }

    fn fail(&mut self, error: &FetchError, context: &str) {
        tracing::error!(%error, "{context}");
        self.state.error = Some(error.to_string());
    }
}

/// Builder of [`Overview::fetch_videos`].
pub struct FetchVideosBuilder<'a> {
    overview: &'a mut Overview,
    max_count: u32,
    refresh: bool,
}

impl FetchVideosBuilder<'_> {
    /// Maximum number of videos. Defaults to 20.
    #[must_use]
    pub fn max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    /// Asks the backend to bypass its cache.
    #[must_use]
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Sends the request.
    pub async fn call(self) -> Result<VideoPage, FetchError> {
        self.overview.begin();

        let result = request_videos(&self.overview.client, self.max_count, self.refresh).await;
        self.overview.apply_videos(&result);

        result
    }
}

async fn request_profile(
    client: &Postiva,
    refresh: bool,
) -> Result<(UserProfile, Option<DateTime<Utc>>), FetchError> {
    let payload: ProfilePayload = request(
        client,
        USER_PROFILE_PATH,
        vec![("refresh", refresh.to_string())],
        "fetch user profile",
    )
    .await?;

    let profile = payload
        .data
        .ok_or_else(|| FetchError::Unsuccessful("Failed to fetch user profile".to_string()))?;

    Ok((profile, payload.last_updated.as_deref().and_then(parse_timestamp)))
}

async fn request_videos(
    client: &Postiva,
    max_count: u32,
    refresh: bool,
) -> Result<VideoPage, FetchError> {
    request(
        client,
        USER_VIDEOS_PATH,
        vec![
            ("max_count", max_count.to_string()),
            ("refresh", refresh.to_string()),
        ],
        "fetch user videos",
    )
    .await
}

/// Authenticated GET returning the `data` of a successful envelope.
pub(crate) async fn request<T: DeserializeOwned>(
    client: &Postiva,
    path: &str,
    params: Vec<(&str, String)>,
    action: &str,
) -> Result<T, FetchError> {
    let token = client.token().ok_or(FetchError::NotLoggedIn)?;
    let url = client.endpoint(path);

    let response = client
        .request_get(&url, Some(params), Some(&token))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(FetchError::from_response(response, action).await);
    }

    let envelope = response.json::<ApiEnvelope<T>>().await?;

    match envelope.data {
        Some(data) if envelope.success => Ok(data),
        _ if envelope.message.is_empty() => {
            Err(FetchError::Unsuccessful(format!("Failed to {action}")))
        }
        _ => Err(FetchError::Unsuccessful(envelope.message)),
    }
}

/// Backend timestamps come with or without an offset.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
        })
        .ok()
}
