use std::io;
use std::path::Path;

use reqwest::Url;
use reqwest::multipart::Part;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ProviderError, ValidationError};
use crate::{ApiEnvelope, Postiva};

pub mod status;
pub mod submit;

/// Represents errors of a content submission.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The draft failed local validation. Nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No bearer token is stored. Nothing was sent.
    #[error("No authentication token found. Please login first.")]
    NotLoggedIn,
    /// Communication with the backend was successful,
    /// but it returned a non-2xx HTTP status.
    ///
    /// `provider` carries the provider error from `data.error`, verbatim.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Backend message, or a generic fallback.
        message: String,
        /// Structured provider failure, when reported.
        provider: Option<ProviderError>,
    },
    /// A photo could not be uploaded to the image host before posting.
    #[error("Failed to upload image: {0}")]
    ImageUpload(String),
    /// Communication with the backend failed.
    #[error("The communication with the Postiva API failed: {0}")]
    Unreachable(String),
    /// The response could not be parsed into the expected data structure.
    #[error("Could not parse response into the expected data structure: {0}")]
    ParseError(String),
}

impl From<reqwest::Error> for SubmissionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

/// Publish immediately, or leave the post in the creator's inbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostMode {
    /// Published immediately.
    #[default]
    Direct,
    /// Placed in the creator's inbox for manual completion.
    Draft,
}

/// Who can see a direct photo post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyLevel {
    /// Everyone.
    #[default]
    PublicToEveryone,
    /// Mutual followers.
    MutualFollowFriends,
    /// Followers only.
    FollowerOfCreator,
    /// Only the creator.
    SelfOnly,
}

/// Options only sent with direct photo posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectPostOptions {
    /// Audience of the post.
    pub privacy_level: PrivacyLevel,
    /// Disable comments.
    pub disable_comment: bool,
    /// Let TikTok add background music.
    pub auto_add_music: bool,
    /// The post promotes a third-party brand.
    pub brand_content_toggle: bool,
    /// The post promotes the creator's own brand.
    pub brand_organic_toggle: bool,
}

/// A file to upload.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// File name sent with the multipart part.
    pub file_name: String,
    /// MIME type, e.g. `video/mp4`.
    pub content_type: String,
    /// File content.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl MediaFile {
    /// Wraps in-memory content.
    #[must_use]
    pub fn new(file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    /// Reads a file from disk, guessing the content type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;

        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());

        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_ascii_lowercase());

        Ok(Self {
            file_name,
            content_type: content_type_for(extension.as_deref()).to_string(),
            bytes,
        })
    }

    pub(crate) fn part(&self) -> Result<Part, ValidationError> {
        Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)
            .map_err(|_| ValidationError::InvalidContentType(self.content_type.clone()))
    }
}

fn content_type_for(extension: Option<&str>) -> &'static str {
    match extension {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Where the photos of a photo post come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// Already hosted images.
    Urls(Vec<String>),
    /// Local images, uploaded to the image host before posting.
    Files(Vec<MediaFile>),
}

impl PhotoSource {
    /// Number of photos.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Urls(urls) => urls.len(),
            Self::Files(files) => files.len(),
        }
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The media attached to a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    /// A local video.
    VideoFile(MediaFile),
    /// A video the backend downloads itself.
    VideoUrl(String),
    /// A photo carousel.
    Photos {
        /// The photos.
        source: PhotoSource,
        /// Index of the cover photo.
        cover_index: usize,
    },
}

/// The kind of media, which selects the endpoint together with the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// [`Media::VideoFile`].
    VideoFile,
    /// [`Media::VideoUrl`].
    VideoUrl,
    /// [`Media::Photos`].
    Photos,
}

impl Media {
    /// The kind of this media.
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        match self {
            Self::VideoFile(_) => MediaKind::VideoFile,
            Self::VideoUrl(_) => MediaKind::VideoUrl,
            Self::Photos { .. } => MediaKind::Photos,
        }
    }
}

/// The backend endpoint a draft is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionEndpoint {
    /// Multipart video, published.
    VideoDirectUpload,
    /// Multipart video, to the inbox.
    VideoDraftUpload,
    /// Video by URL, published.
    VideoDirectFromUrl,
    /// Video by URL, to the inbox.
    VideoDraftFromUrl,
    /// Photo carousel, published with privacy and content flags.
    PhotoDirectPost,
    /// Photo carousel, to the inbox.
    PhotoDraftPost,
}

impl SubmissionEndpoint {
    /// Path of the endpoint.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::VideoDirectUpload => "/tiktok/post/upload",
            Self::VideoDraftUpload => "/tiktok/draft-post/upload",
            Self::VideoDirectFromUrl => "/tiktok/post/upload-url",
            Self::VideoDraftFromUrl => "/tiktok/draft-post/upload-url",
            Self::PhotoDirectPost => "/tiktok/photo/direct/post",
            Self::PhotoDraftPost => "/tiktok/photo/draft/upload",
        }
    }
}

/// Dispatch rule of the submission workflow.
///
/// # Example
/// ```rust
/// use postiva_rs::{endpoint_for, MediaKind, PostMode, SubmissionEndpoint};
///
/// assert_eq!(
///     endpoint_for(MediaKind::VideoUrl, PostMode::Draft),
///     SubmissionEndpoint::VideoDraftFromUrl
/// );
/// ```
#[must_use]
pub const fn endpoint_for(kind: MediaKind, mode: PostMode) -> SubmissionEndpoint {
    match (kind, mode) {
        (MediaKind::VideoFile, PostMode::Direct) => SubmissionEndpoint::VideoDirectUpload,
        (MediaKind::VideoFile, PostMode::Draft) => SubmissionEndpoint::VideoDraftUpload,
        (MediaKind::VideoUrl, PostMode::Direct) => SubmissionEndpoint::VideoDirectFromUrl,
        (MediaKind::VideoUrl, PostMode::Draft) => SubmissionEndpoint::VideoDraftFromUrl,
        (MediaKind::Photos, PostMode::Direct) => SubmissionEndpoint::PhotoDirectPost,
        (MediaKind::Photos, PostMode::Draft) => SubmissionEndpoint::PhotoDraftPost,
    }
}

/// Content to submit: media, caption and mode.
///
/// # Example
/// ```rust,ignore
/// let draft = ContentDraft::photos(
///     PhotoSource::Urls(vec!["https://cdn.example.com/a.jpg".to_string()]),
///     0,
///     "Weekend",
/// )
/// .description("Two days at the lake")
/// .options(DirectPostOptions {
///     privacy_level: PrivacyLevel::FollowerOfCreator,
///     ..DirectPostOptions::default()
/// });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDraft {
    /// The media.
    pub media: Media,
    /// Caption, sent as `title`.
    pub caption: String,
    /// Photo post description.
    pub description: String,
    /// Direct or draft.
    pub mode: PostMode,
    /// Direct photo options; ignored for every other variant.
    pub options: DirectPostOptions,
}

impl ContentDraft {
    /// A draft with the given media, in direct mode.
    #[must_use]
    pub fn new(media: Media, caption: &str) -> Self {
        Self {
            media,
            caption: caption.to_string(),
            description: String::new(),
            mode: PostMode::Direct,
            options: DirectPostOptions::default(),
        }
    }

    /// A local video.
    #[must_use]
    pub fn video_file(file: MediaFile, caption: &str) -> Self {
        Self::new(Media::VideoFile(file), caption)
    }

    /// A video the backend downloads from `url`.
    #[must_use]
    pub fn video_url(url: &str, caption: &str) -> Self {
        Self::new(Media::VideoUrl(url.trim().to_string()), caption)
    }

    /// A photo carousel.
    #[must_use]
    pub fn photos(source: PhotoSource, cover_index: usize, caption: &str) -> Self {
        Self::new(
            Media::Photos {
                source,
                cover_index,
            },
            caption,
        )
    }

    /// Sets the mode.
    #[must_use]
    pub const fn mode(mut self, mode: PostMode) -> Self {
        self.mode = mode;
        self
    }

    /// Switches to draft mode.
    #[must_use]
    pub const fn draft(self) -> Self {
        self.mode(PostMode::Draft)
    }

    /// Sets the photo description.
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Sets the direct photo options.
    #[must_use]
    pub const fn options(mut self, options: DirectPostOptions) -> Self {
        self.options = options;
        self
    }

    /// The endpoint this draft is sent to.
    #[must_use]
    pub const fn endpoint(&self) -> SubmissionEndpoint {
        endpoint_for(self.media.kind(), self.mode)
    }

    /// Checks the preconditions enforced before any request.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.media {
            Media::VideoFile(file) if file.bytes.is_empty() => {
                return Err(ValidationError::MissingMedia);
            }
            Media::VideoUrl(url) if url.is_empty() => return Err(ValidationError::MissingMedia),
            Media::Photos { source, .. } if source.is_empty() => {
                return Err(ValidationError::MissingMedia);
            }
            _ => {}
        }

        if self.caption.trim().is_empty() {
            return Err(ValidationError::EmptyCaption);
        }

        match &self.media {
            Media::VideoUrl(url) => {
                Url::parse(url).map_err(|_| ValidationError::InvalidUrl(url.clone()))?;
            }
            Media::Photos {
                source,
                cover_index,
            } if *cover_index >= source.len() => {
                return Err(ValidationError::CoverIndexOutOfBounds {
                    index: *cover_index,
                    len: source.len(),
                });
            }
            _ => {}
        }

        Ok(())
    }
}

/// Upload details the backend reports for multipart uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    /// Stored file name.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub filename: String,
    /// Size in bytes.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub file_size: u64,
    /// Content type.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub content_type: String,
    /// Chunk size used towards TikTok.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub chunk_size: u64,
    /// Number of chunks.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub total_chunks: u32,
    /// Whether every chunk was transferred.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub upload_completed: bool,
}

/// `data` of a submission response. Fields depend on the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubmissionData {
    /// Identifier used to poll the publish status.
    pub publish_id: Option<String>,
    /// Upload URL handed out by TikTok.
    pub upload_url: Option<String>,
    /// Upload progress reported by the backend.
    pub upload_status: Option<String>,
    /// Human instructions, mostly for drafts.
    pub instructions: Option<String>,
    /// Number of photos posted.
    pub photo_count: Option<u32>,
    /// Multipart upload details.
    pub file_info: Option<FileInfo>,
    /// Provider failure.
    pub error: Option<ProviderError>,
}

/// Outcome of a submission that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    /// The backend accepted the post.
    pub success: bool,
    /// Backend message.
    pub message: String,
    /// Identifier to poll with [`crate::StatusPoller`].
    pub publish_id: Option<String>,
    /// Upload status reported by the backend.
    pub upload_status: Option<String>,
    /// Provider failure, verbatim.
    pub error_detail: Option<ProviderError>,
    /// The full payload.
    pub data: SubmissionData,
}

impl From<ApiEnvelope<SubmissionData>> for SubmissionResult {
    fn from(envelope: ApiEnvelope<SubmissionData>) -> Self {
        let data = envelope.data.unwrap_or_default();

        Self {
            success: envelope.success,
            message: envelope.message,
            publish_id: data.publish_id.clone(),
            upload_status: data.upload_status.clone(),
            error_detail: data.error.clone(),
            data,
        }
    }
}

/// State of the submission form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionState {
    /// A submission is in flight.
    pub is_loading: bool,
    /// Message of the last failure.
    pub error: Option<String>,
    /// `0` while in flight, `100` once the backend answered.
    pub upload_progress: u8,
    /// Publish id of the last accepted submission.
    pub publish_id: Option<String>,
    /// Upload status of the last accepted file upload.
    pub upload_status: Option<String>,
    /// The last backend answer.
    pub last_response: Option<SubmissionResult>,
}

impl SubmissionState {
    fn begin(&mut self) {
        self.is_loading = true;
        self.error = None;
        self.upload_progress = 0;
    }

    fn complete(&mut self, result: &SubmissionResult, kind: MediaKind) {
        self.is_loading = false;
        self.last_response = Some(result.clone());

        if result.success {
            if let Some(publish_id) = &result.publish_id {
                self.publish_id = Some(publish_id.clone());

                if kind == MediaKind::VideoFile {
                    self.upload_status = Some(
                        result
                            .upload_status
                            .clone()
                            .unwrap_or_else(|| "completed".to_string()),
                    );
                }
            }
        }

        self.upload_progress = 100;
    }

    fn fail(&mut self, error: &SubmissionError) {
        self.is_loading = false;
        self.error = Some(error.to_string());
    }
}

/// Content submission workflow: one live submission per instance.
///
/// Resetting the caller's form (files, previews, caption) after a success is
/// the caller's job.
#[derive(Debug)]
pub struct PostSubmission {
    client: Postiva,
    state: SubmissionState,
}

impl PostSubmission {
    pub(crate) fn new(client: Postiva) -> Self {
        Self {
            client,
            state: SubmissionState::default(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Dismisses the error message.
    pub fn clear_error(&mut self) {
        self.state.error = None;
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        self.state = SubmissionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> MediaFile {
        MediaFile::new("clip.mp4", "video/mp4", vec![0, 0, 0, 24])
    }

    #[test]
    fn dispatch_table() {
        let cases = [
            (MediaKind::VideoFile, PostMode::Direct, "/tiktok/post/upload"),
            (MediaKind::VideoFile, PostMode::Draft, "/tiktok/draft-post/upload"),
            (MediaKind::VideoUrl, PostMode::Direct, "/tiktok/post/upload-url"),
            (MediaKind::VideoUrl, PostMode::Draft, "/tiktok/draft-post/upload-url"),
            (MediaKind::Photos, PostMode::Direct, "/tiktok/photo/direct/post"),
            (MediaKind::Photos, PostMode::Draft, "/tiktok/photo/draft/upload"),
        ];

        for (kind, mode, path) in cases {
            assert_eq!(endpoint_for(kind, mode).path(), path, "{kind:?} {mode:?}");
        }
    }

    #[test]
    fn blank_caption_is_rejected() {
        let draft = ContentDraft::video_file(clip(), "   ");
        assert_eq!(draft.validate(), Err(ValidationError::EmptyCaption));
    }

    #[test]
    fn missing_media_is_checked_first() {
        let draft = ContentDraft::video_file(MediaFile::new("a.mp4", "video/mp4", vec![]), "");
        assert_eq!(draft.validate(), Err(ValidationError::MissingMedia));

        let draft = ContentDraft::photos(PhotoSource::Urls(vec![]), 0, "hello");
        assert_eq!(draft.validate(), Err(ValidationError::MissingMedia));
    }

    #[test]
    fn relative_video_url_is_rejected() {
        let draft = ContentDraft::video_url("not a url", "hello");
        assert_eq!(
            draft.validate(),
            Err(ValidationError::InvalidUrl("not a url".to_string()))
        );

        assert!(ContentDraft::video_url("https://cdn.example.com/v.mp4", "hello")
            .validate()
            .is_ok());
    }

    #[test]
    fn cover_index_must_be_in_bounds() {
        let photos = PhotoSource::Urls(vec!["a.jpg".to_string(), "b.jpg".to_string()]);

        assert_eq!(
            ContentDraft::photos(photos.clone(), 5, "hello").validate(),
            Err(ValidationError::CoverIndexOutOfBounds { index: 5, len: 2 })
        );
        assert!(ContentDraft::photos(photos, 1, "hello").validate().is_ok());
    }

    #[test]
    fn privacy_levels_use_backend_names() {
        assert_eq!(
            serde_json::to_value(PrivacyLevel::MutualFollowFriends).unwrap(),
            "MUTUAL_FOLLOW_FRIENDS"
        );
        assert_eq!(
            serde_json::to_value(PrivacyLevel::FollowerOfCreator).unwrap(),
            "FOLLOWER_OF_CREATOR"
        );
    }

    #[test]
    fn content_type_is_guessed_from_extension() {
        assert_eq!(content_type_for(Some("mp4")), "video/mp4");
        assert_eq!(content_type_for(Some("jpeg")), "image/jpeg");
        assert_eq!(content_type_for(None), "application/octet-stream");
    }

    #[test]
    fn file_upload_without_status_is_completed() {
        let mut state = SubmissionState::default();
        state.begin();

        let result = SubmissionResult {
            success: true,
            message: "ok".to_string(),
            publish_id: Some("PID1".to_string()),
            upload_status: None,
            error_detail: None,
            data: SubmissionData::default(),
        };
        state.complete(&result, MediaKind::VideoFile);

        assert_eq!(state.upload_progress, 100);
        assert_eq!(state.publish_id.as_deref(), Some("PID1"));
        assert_eq!(state.upload_status.as_deref(), Some("completed"));
        assert!(!state.is_loading);
    }
}
