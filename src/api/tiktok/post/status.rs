use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::error::{ErrorBody, FetchError, PollError};
use crate::{ApiEnvelope, Postiva};

const POST_STATUS_PATH: &str = "/tiktok/post-status/fetch";

/// Default period of a [`StatusWatch`].
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest period a [`StatusWatch`] accepts. Shorter ones are raised to it.
pub const MIN_STATUS_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Publish status of a post, as reported by TikTok through the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// Still being processed or uploaded.
    Processing,
    /// Published.
    Completed,
    /// Publishing failed.
    Failed,
    /// Queued.
    Pending,
    /// Anything else, kept verbatim.
    Unknown(String),
}

impl PublishStatus {
    /// Parses a backend status, case-insensitively.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "processing" | "uploading" => Self::Processing,
            "completed" | "success" => Self::Completed,
            "failed" | "error" => Self::Failed,
            "pending" => Self::Pending,
            _ => Self::Unknown(status.to_string()),
        }
    }

    /// Whether the status can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Pending => "pending",
            Self::Unknown(status) => status,
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of a single status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostStatus {
    /// The query itself succeeded.
    pub success: bool,
    /// Backend message.
    pub message: String,
    /// Publish status; `Unknown("")` when the backend sent none.
    pub status: PublishStatus,
    /// The queried publish id.
    pub publish_id: String,
    /// Failure reason reported for the post.
    pub error: Option<String>,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    publish_id: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StatusData {
    status: Option<String>,
    publish_id: Option<String>,
    error: Option<String>,
}

/// Single-shot publish status query. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    client: Postiva,
}

impl StatusPoller {
    pub(crate) const fn new(client: Postiva) -> Self {
        Self { client }
    }

    /// Queries the publish status once.
    ///
    /// # Example
    /// ```rust,ignore
    /// let status = client.status_poller().check_status("v_pub_123").await?;
    /// if status.status.is_terminal() {
    ///     println!("done: {}", status.status);
    /// }
    /// ```
    pub async fn check_status(&self, publish_id: &str) -> Result<PostStatus, PollError> {
        if publish_id.is_empty() {
            return Err(FetchError::InvalidInput("publish id is empty"));
        }

        let token = self.client.token().ok_or(FetchError::NotLoggedIn)?;
        let url = self.client.endpoint(POST_STATUS_PATH);

        let response = self
            .client
            .request_post_json(&url, &StatusRequest { publish_id }, Some(&token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = ErrorBody::read(response).await;

            return Err(FetchError::Rejected {
                status,
                message: body
                    .message()
                    .unwrap_or_else(|| format!("HTTP error! status: {status}")),
            });
        }

        let envelope = response.json::<ApiEnvelope<StatusData>>().await?;
        let data = envelope.data.unwrap_or_default();

        let status = PostStatus {
            success: envelope.success,
            message: envelope.message,
            status: PublishStatus::parse(data.status.as_deref().unwrap_or_default()),
            publish_id: data.publish_id.unwrap_or_else(|| publish_id.to_string()),
            error: data.error,
        };

        tracing::debug!(publish_id, status = %status.status, "checked publish status");

        Ok(status)
    }
}

/// Receiving end of a [`StatusWatch`].
pub type StatusUpdates = mpsc::UnboundedReceiver<Result<PostStatus, PollError>>;

/// Caller-owned auto-refresh of a publish status.
///
/// At most one timer runs per watch. The first check happens one period after
/// [`StatusWatch::start`]. The watch keeps polling after a terminal status
/// until it is stopped, dropped, or its receiver is dropped.
///
/// # Example
/// ```rust,ignore
/// let mut watch = StatusWatch::new(client.status_poller());
/// let mut updates = watch.start("v_pub_123");
///
/// while let Some(update) = updates.recv().await {
///     if update?.status.is_terminal() {
///         watch.stop();
///         break;
///     }
/// }
/// ```
#[derive(Debug)]
pub struct StatusWatch {
    poller: StatusPoller,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl StatusWatch {
    /// A stopped watch polling every [`STATUS_POLL_INTERVAL`].
    #[must_use]
    pub const fn new(poller: StatusPoller) -> Self {
        Self::with_interval(poller, STATUS_POLL_INTERVAL)
    }

    /// A stopped watch with a custom period, at least
    /// [`MIN_STATUS_POLL_INTERVAL`].
    #[must_use]
    pub const fn with_interval(poller: StatusPoller, interval: Duration) -> Self {
        let interval = if interval.as_nanos() < MIN_STATUS_POLL_INTERVAL.as_nanos() {
            MIN_STATUS_POLL_INTERVAL
        } else {
            interval
        };

        Self {
            poller,
            interval,
            task: None,
        }
    }

    /// Starts polling `publish_id`, replacing any running timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, publish_id: &str) -> StatusUpdates {
        self.stop();

        let (sender, receiver) = mpsc::unbounded_channel();
        let poller = self.poller.clone();
        let period = self.interval;
        let publish_id = publish_id.to_string();

        tracing::debug!(%publish_id, ?period, "starting status watch");

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                ticker.tick().await;

                let result = poller.check_status(&publish_id).await;
                if let Err(error) = &result {
                    tracing::warn!(%publish_id, %error, "status check failed");
                }

                if sender.send(result).is_err() {
                    break;
                }
            }
        }));

        receiver
    }

    /// Stops a running watch, or starts one when stopped.
    ///
    /// Returns the new receiver when a watch was started.
    pub fn toggle(&mut self, publish_id: &str) -> Option<StatusUpdates> {
        if self.stop() {
            None
        } else {
            Some(self.start(publish_id))
        }
    }

    /// Stops the timer. Returns whether one was running.
    pub fn stop(&mut self) -> bool {
        self.task.take().is_some_and(|task| {
            let running = !task.is_finished();
            task.abort();
            running
        })
    }

    /// Period between two checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a timer is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for StatusWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_parse_case_insensitively() {
        assert_eq!(PublishStatus::parse("PROCESSING"), PublishStatus::Processing);
        assert_eq!(PublishStatus::parse("uploading"), PublishStatus::Processing);
        assert_eq!(PublishStatus::parse("Success"), PublishStatus::Completed);
        assert_eq!(PublishStatus::parse("error"), PublishStatus::Failed);
        assert_eq!(PublishStatus::parse("pending"), PublishStatus::Pending);
        assert_eq!(
            PublishStatus::parse("PUBLISH_COMPLETE"),
            PublishStatus::Unknown("PUBLISH_COMPLETE".to_string())
        );
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(PublishStatus::Completed.is_terminal());
        assert!(PublishStatus::Failed.is_terminal());
        assert!(!PublishStatus::Processing.is_terminal());
        assert!(!PublishStatus::Unknown(String::new()).is_terminal());
    }
}
