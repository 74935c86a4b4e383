//! HTTP Handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use std::net::SocketAddr;
use std::sync::Arc;

use platform::client::ClientContext;
use platform::clock::Clock;
use platform::cookie::{extract_cookie, set_cookie_header};
use platform::csrf::{CSRF_HEADER, CsrfGuard};
use platform::rate_limit::RateLimitStore;
use platform::secret_box::SecretCipher;

use crate::application::config::{AccessConfig, ProtectedAction};
use crate::application::{
    CheckSessionUseCase, RedeemCodeInput, RedeemCodeUseCase, RequestPlaybackInput,
    RequestPlaybackUseCase, SignOutUseCase, VideoLibraryUseCase,
};
use crate::domain::playback::ResolverRegistry;
use crate::domain::repository::{
    AnalyticsRepository, CodeRepository, RedemptionUnitOfWork, SessionRepository, VideoFilter,
    VideoRepository,
};
use crate::error::{AccessError, AccessResult};
use crate::presentation::dto::{
    CsrfTokensResponse, LibraryQuery, LibraryResponse, PlaybackRequest, RedeemRequest,
    RedeemResponse, SessionStatusResponse,
};

/// Shared state for access handlers
pub struct AccessAppState<R, L>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub limiter: Arc<L>,
    pub cipher: Arc<SecretCipher>,
    pub csrf: Arc<CsrfGuard>,
    pub resolvers: Arc<ResolverRegistry>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<AccessConfig>,
}

impl<R, L> Clone for AccessAppState<R, L>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            limiter: self.limiter.clone(),
            cipher: self.cipher.clone(),
            csrf: self.csrf.clone(),
            resolvers: self.resolvers.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R, L> AccessAppState<R, L>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    pub fn new(
        repo: R,
        limiter: Arc<L>,
        cipher: Arc<SecretCipher>,
        csrf: Arc<CsrfGuard>,
        resolvers: ResolverRegistry,
        config: AccessConfig,
    ) -> Self {
        Self {
            repo: Arc::new(repo),
            limiter,
            cipher,
            csrf,
            resolvers: Arc::new(resolvers),
            clock: Arc::new(platform::clock::SystemClock),
            config: Arc::new(config),
        }
    }

    /// Replace the wall clock, e.g. with a `ManualClock` in tests
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn client(&self, headers: &HeaderMap, addr: SocketAddr) -> ClientContext {
        ClientContext::from_request(headers, addr.ip(), self.config.trust_proxy_headers)
    }

    fn session_cookie(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.config.session_cookie_name)
    }
}

fn csrf_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Body is reported as unreadable by the use case, after the CSRF and rate
/// limit checks have run.
fn readable_body<T>(body: Result<Json<T>, JsonRejection>) -> Option<T> {
    match body {
        Ok(Json(value)) => Some(value),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            None
        }
    }
}

// ============================================================================
// CSRF
// ============================================================================

/// GET /api/access/csrf
pub async fn csrf_tokens<R, L>(
    State(state): State<AccessAppState<R, L>>,
) -> AccessResult<impl IntoResponse>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let mut tokens = std::collections::BTreeMap::new();
    for action in ProtectedAction::ALL {
        tokens.insert(action.as_str(), state.csrf.issue(action.as_str())?);
    }

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(CsrfTokensResponse {
            tokens,
            expires_in: state.csrf.ttl().num_seconds(),
        }),
    ))
}

// ============================================================================
// Redeem
// ============================================================================

/// POST /api/access/redeem
pub async fn redeem<R, L>(
    State(state): State<AccessAppState<R, L>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<RedeemRequest>, JsonRejection>,
) -> AccessResult<impl IntoResponse>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let client = state.client(&headers, addr);
    let req = readable_body(body);

    let use_case = RedeemCodeUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.cipher.clone(),
        state.csrf.clone(),
        state.clock.clone(),
        state.config.clone(),
    );

    let input = RedeemCodeInput {
        code: req.map(|r| r.code),
        csrf_token: csrf_header(&headers),
    };

    let output = use_case.execute(input, &client).await?;

    let cookie = state.config.cookie_config().build_set_cookie(
        output.session_token.expose(),
        Some(output.expires_at),
        state.clock.now(),
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, set_cookie_header(&cookie))],
        Json(RedeemResponse {
            duration_minutes: output.duration_minutes,
            expires_at: output.expires_at,
        }),
    ))
}

// ============================================================================
// Playback
// ============================================================================

/// POST /api/access/request-playback
pub async fn request_playback<R, L>(
    State(state): State<AccessAppState<R, L>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<PlaybackRequest>, JsonRejection>,
) -> AccessResult<impl IntoResponse>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let client = state.client(&headers, addr);
    let req = readable_body(body);

    let use_case = RequestPlaybackUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.resolvers.clone(),
        state.csrf.clone(),
        state.clock.clone(),
        state.config.clone(),
    );

    let input = RequestPlaybackInput {
        video_id: req.map(|r| r.video_id),
        session_token: state.session_cookie(&headers),
        csrf_token: csrf_header(&headers),
    };

    let output = use_case.execute(input, &client).await?;

    // Signed URLs are short-lived; never let a cache hand them out again
    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(output.descriptor),
    ))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /api/access/logout
pub async fn logout<R, L>(
    State(state): State<AccessAppState<R, L>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> AccessResult<impl IntoResponse>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let client = state.client(&headers, addr);

    let use_case = SignOutUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.csrf.clone(),
        state.clock.clone(),
        state.config.clone(),
    );

    let token = state.session_cookie(&headers);
    match use_case
        .execute(token.as_deref(), csrf_header(&headers).as_deref(), &client)
        .await
    {
        Ok(_) => {}
        Err(e @ AccessError::CsrfRejected(_)) => return Err(e),
        // Storage trouble still ends the session client-side
        Err(e) => tracing::warn!(error = %e, "Session invalidation failed"),
    }

    let cookie = state.config.cookie_config().build_delete_cookie();

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, set_cookie_header(&cookie))],
    ))
}

// ============================================================================
// Session Status
// ============================================================================

/// GET /api/access/session
pub async fn session_status<R, L>(
    State(state): State<AccessAppState<R, L>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> AccessResult<Json<SessionStatusResponse>>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let client = state.client(&headers, addr);
    let token = state.session_cookie(&headers);

    let use_case = CheckSessionUseCase::new(state.repo.clone(), state.clock.clone());
    let info = use_case.execute(token.as_deref(), &client).await?;

    Ok(Json(match info {
        Some(info) => SessionStatusResponse {
            active: true,
            duration_minutes: Some(info.duration_minutes),
            expires_at: Some(info.expires_at),
            remaining_minutes: Some(info.remaining_minutes),
        },
        None => SessionStatusResponse::inactive(),
    }))
}

// ============================================================================
// Video Library
// ============================================================================

/// GET /api/access/videos
pub async fn video_library<R, L>(
    State(state): State<AccessAppState<R, L>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    query: Result<Query<LibraryQuery>, QueryRejection>,
) -> AccessResult<Json<LibraryResponse>>
where
    R: CodeRepository
        + SessionRepository
        + RedemptionUnitOfWork
        + VideoRepository
        + AnalyticsRepository
        + Send
        + Sync
        + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let client = state.client(&headers, addr);
    let Query(query) = query
        .map_err(|_| AccessError::InvalidInput("Invalid library query.".to_string()))?;
    let token = state.session_cookie(&headers);

    let filter = VideoFilter {
        integration_type: non_blank(query.integration_type),
        search: non_blank(query.search),
        category: non_blank(query.category),
        limit: query.limit,
        offset: query.offset,
    };

    let use_case =
        VideoLibraryUseCase::new(state.repo.clone(), state.clock.clone(), state.config.clone());
    let output = use_case.execute(filter, token.as_deref(), &client).await?;

    Ok(Json(LibraryResponse::from(output)))
}
