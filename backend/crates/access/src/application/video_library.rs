//! Video Library Use Case
//!
//! Lists active videos with a per-video access flag for the caller.

use platform::client::ClientContext;
use platform::clock::Clock;
use std::sync::Arc;

use crate::application::check_session::CheckSessionUseCase;
use crate::application::config::AccessConfig;
use crate::domain::entity::protected_video::ProtectedVideo;
use crate::domain::repository::{AnalyticsRepository, SessionRepository, VideoFilter, VideoRepository};
use crate::domain::services::can_access;
use crate::error::AccessResult;

/// One library row
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub video: ProtectedVideo,
    pub has_access: bool,
}

/// Library output
#[derive(Debug, Clone)]
pub struct VideoLibraryOutput {
    /// Minutes granted by the caller's session, if one is live
    pub session_minutes: Option<i32>,
    pub videos: Vec<LibraryEntry>,
    /// Matching videos across all pages
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Video library use case
pub struct VideoLibraryUseCase<R>
where
    R: SessionRepository + VideoRepository + AnalyticsRepository,
{
    videos: Arc<R>,
    check_session: CheckSessionUseCase<R>,
    config: Arc<AccessConfig>,
}

impl<R> VideoLibraryUseCase<R>
where
    R: SessionRepository + VideoRepository + AnalyticsRepository,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, config: Arc<AccessConfig>) -> Self {
        Self {
            videos: repo.clone(),
            check_session: CheckSessionUseCase::new(repo, clock),
            config,
        }
    }

    pub async fn execute(
        &self,
        mut filter: VideoFilter,
        session_token: Option<&str>,
        client: &ClientContext,
    ) -> AccessResult<VideoLibraryOutput> {
        filter.limit = match filter.limit {
            0 => self.config.library_limit,
            limit => limit.min(self.config.library_limit),
        };

        let total = self.videos.count_active(&filter).await?;
        let session = self.check_session.get_session(session_token, client).await?;
        let session_minutes = session.map(|s| s.duration_minutes);

        let videos = self
            .videos
            .list_active(&filter)
            .await?
            .into_iter()
            .map(|video| LibraryEntry {
                has_access: session_minutes
                    .is_some_and(|minutes| can_access(minutes, video.required_minutes)),
                video,
            })
            .collect();

        Ok(VideoLibraryOutput {
            session_minutes,
            videos,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }
}
