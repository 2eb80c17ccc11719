use futures::future::try_join_all;
use reqwest::multipart::Form;
use reqwest::Response;
use serde::{Deserialize, Serialize};

use super::{
    ContentDraft, DirectPostOptions, Media, MediaFile, PhotoSource, PostMode, PostSubmission,
    SubmissionData, SubmissionError, SubmissionResult,
};
use crate::error::ErrorBody;
use crate::{ApiEnvelope, Postiva};

const IMAGE_UPLOAD_PATH: &str = "/upload/image";

#[derive(Serialize)]
struct VideoUrlForm<'a> {
    title: &'a str,
    video_url: &'a str,
}

#[derive(Serialize)]
struct PhotoPostBody<'a> {
    photo_urls: &'a [String],
    cover_index: usize,
    title: &'a str,
    description: &'a str,
    #[serde(flatten)]
    options: Option<&'a DirectPostOptions>,
}

#[derive(Deserialize)]
struct ImageUploadResponse {
    #[serde(default)]
    success: bool,
    url: Option<String>,
}

impl PostSubmission {
    /// Validates the draft, then sends it to the endpoint selected by its
    /// media kind and mode.
    ///
    /// Validation and the token check happen before any request. Photo files
    /// are uploaded to the image host first. A `2xx` answer is returned even
    /// when `success` is `false`; inspect [`SubmissionResult::error_detail`].
    ///
    /// # Example
    /// ```rust,ignore
    /// let draft = ContentDraft::video_url("https://cdn.example.com/clip.mp4", "hello").draft();
    ///
    /// let result = client.post_submission().submit(&draft).await?;
    /// println!("{:?}", result.data.instructions);
    /// ```
    pub async fn submit(
        &mut self,
        draft: &ContentDraft,
    ) -> Result<SubmissionResult, SubmissionError> {
        self.state.begin();

        let result = self.send(draft).await;

        match &result {
            Ok(result) => {
                tracing::info!(
                    endpoint = draft.endpoint().path(),
                    success = result.success,
                    publish_id = ?result.publish_id,
                    "content submitted"
                );
                self.state.complete(result, draft.media.kind());
            }
            Err(error) => {
                tracing::error!(
                    %error,
                    endpoint = draft.endpoint().path(),
                    "content submission failed"
                );
                self.state.fail(error);
            }
        }

        result
    }

    async fn send(&self, draft: &ContentDraft) -> Result<SubmissionResult, SubmissionError> {
        draft.validate()?;

        let token = self.client.token().ok_or(SubmissionError::NotLoggedIn)?;
        let url = self.client.endpoint(draft.endpoint().path());

        let request = match &draft.media {
            Media::VideoFile(file) => {
                let form = Form::new()
                    .part("file", file.part()?)
                    .text("title", draft.caption.clone());

                self.client.request_post_form(&url, form, Some(&token))
            }
            Media::VideoUrl(video_url) => self.client.request_post_urlencoded(
                &url,
                &VideoUrlForm {
                    title: &draft.caption,
                    video_url,
                },
                Some(&token),
            ),
            Media::Photos {
                source,
                cover_index,
            } => {
                let photo_urls = match source {
                    PhotoSource::Urls(urls) => urls.clone(),
                    PhotoSource::Files(files) => upload_images(&self.client, files, &token).await?,
                };

                let body = PhotoPostBody {
                    photo_urls: &photo_urls,
                    cover_index: *cover_index,
                    title: &draft.caption,
                    description: &draft.description,
                    options: match draft.mode {
                        PostMode::Direct => Some(&draft.options),
                        PostMode::Draft => None,
                    },
                };

                self.client.request_post_json(&url, &body, Some(&token))
            }
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let envelope = response.json::<ApiEnvelope<SubmissionData>>().await?;

        Ok(SubmissionResult::from(envelope))
    }
}

async fn rejected(response: Response) -> SubmissionError {
    let status = response.status().as_u16();
    let body = ErrorBody::read(response).await;

    SubmissionError::Rejected {
        status,
        message: body
            .message()
            .unwrap_or_else(|| format!("HTTP error! status: {status}")),
        provider: body.provider_error(),
    }
}

/// Uploads every photo to the image host concurrently. The first failure
/// wins; URLs keep the order of `files`.
async fn upload_images(
    client: &Postiva,
    files: &[MediaFile],
    token: &str,
) -> Result<Vec<String>, SubmissionError> {
    let endpoint = client.endpoint(IMAGE_UPLOAD_PATH);

    let urls = try_join_all(
        files
            .iter()
            .map(|file| upload_image(client, &endpoint, file, token)),
    )
    .await?;
    tracing::debug!(count = urls.len(), "uploaded photos to image host");

    Ok(urls)
}

async fn upload_image(
    client: &Postiva,
    endpoint: &str,
    file: &MediaFile,
    token: &str,
) -> Result<String, SubmissionError> {
    let form = Form::new().part("image", file.part()?);
    let response = client
        .request_post_form(endpoint, form, Some(token))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(rejected(response).await);
    }

    match response.json::<ImageUploadResponse>().await? {
        ImageUploadResponse {
            success: true,
            url: Some(url),
        } => Ok(url),
        _ => Err(SubmissionError::ImageUpload(file.file_name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrivacyLevel;

    #[test]
    fn direct_photo_body_flattens_options() {
        let urls = vec!["https://cdn.example.com/a.jpg".to_string()];
        let options = DirectPostOptions {
            privacy_level: PrivacyLevel::SelfOnly,
            disable_comment: true,
            ..DirectPostOptions::default()
        };

        let body = serde_json::to_value(PhotoPostBody {
            photo_urls: &urls,
            cover_index: 0,
            title: "t",
            description: "d",
            options: Some(&options),
        })
        .unwrap();

        assert_eq!(body["privacy_level"], "SELF_ONLY");
        assert_eq!(body["disable_comment"], true);
        assert_eq!(body["photo_urls"][0], "https://cdn.example.com/a.jpg");
    }

    #[test]
    fn draft_photo_body_has_no_privacy() {
        let urls = vec!["a".to_string()];

        let body = serde_json::to_value(PhotoPostBody {
            photo_urls: &urls,
            cover_index: 0,
            title: "t",
            description: "",
            options: None,
        })
        .unwrap();

        assert!(body.get("privacy_level").is_none());
        assert!(body.get("auto_add_music").is_none());
        assert_eq!(body["cover_index"], 0);
    }
}
