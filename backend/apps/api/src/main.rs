//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use access::application::HousekeepingUseCase;
use access::resolvers::{
    DirectUrlResolver, EmbedResolver, PlaybackResolver, ResolverRegistry, SignedUrlResolver,
};
use access::{AccessAppState, AccessConfig, PgAccessRepository, access_router};
use anyhow::Context;
use axum::{
    Router, http,
    http::{HeaderName, Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use platform::clock::{Clock, SystemClock};
use platform::csrf::{CSRF_HEADER, CsrfGuard};
use platform::rate_limit::{FixedWindowStore, RateLimitConfig};
use platform::secret_box::SecretCipher;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,access=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url =
        env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = access_config()?;

    // Secrets
    let key_file = env::var("ACCESS_ENCRYPTION_KEY_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data/secret.key"));
    let cipher = SecretCipher::load_or_create(&key_file)
        .with_context(|| format!("cannot load encryption key from {}", key_file.display()))?;

    let csrf = CsrfGuard::new(csrf_secret()?, config.csrf_ttl, clock.clone());

    let limiter = Arc::new(FixedWindowStore::new(clock.clone()));
    let repo = PgAccessRepository::new(pool.clone());

    // Housekeeping: first tick runs immediately, i.e. at startup.
    // Failures are logged and never stop the server.
    let housekeeping = HousekeepingUseCase::new(
        Arc::new(repo.clone()),
        limiter.clone(),
        clock.clone(),
        Arc::new(config.clone()),
    );
    let interval_secs = env_parse("ACCESS_HOUSEKEEPING_INTERVAL_SECS", 86_400u64)?.max(60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = housekeeping.run().await {
                tracing::warn!(error = %e, "Housekeeping failed, continuing anyway");
            }
        }
    });

    let resolvers = playback_resolvers()?;
    tracing::info!(integration_types = ?resolvers.integration_types(), "Playback resolvers registered");

    let state = AccessAppState::new(
        repo,
        limiter,
        Arc::new(cipher),
        Arc::new(csrf),
        resolvers,
        config,
    )
    .with_clock(clock);

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/access", access_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env_parse("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 31113)))?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Parse an optional environment variable, falling back to `default` when unset
fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn access_config() -> anyhow::Result<AccessConfig> {
    let defaults = if cfg!(debug_assertions) {
        AccessConfig::development()
    } else {
        AccessConfig::default()
    };

    Ok(AccessConfig {
        session_cookie_name: env::var("ACCESS_COOKIE_NAME")
            .unwrap_or_else(|_| defaults.session_cookie_name.clone()),
        cookie_secure: env_parse("ACCESS_COOKIE_SECURE", defaults.cookie_secure)?,
        case_sensitive_codes: env_parse(
            "ACCESS_CASE_SENSITIVE_CODES",
            defaults.case_sensitive_codes,
        )?,
        trust_proxy_headers: env_parse(
            "ACCESS_TRUST_PROXY_HEADERS",
            defaults.trust_proxy_headers,
        )?,
        redeem_rate_limit: RateLimitConfig::new(
            env_parse("ACCESS_REDEEM_MAX_ATTEMPTS", defaults.redeem_rate_limit.max_requests)?,
            env_parse(
                "ACCESS_REDEEM_WINDOW_SECS",
                defaults.redeem_rate_limit.window.as_secs(),
            )?,
        ),
        playback_rate_limit: RateLimitConfig::new(
            env_parse(
                "ACCESS_PLAYBACK_MAX_ATTEMPTS",
                defaults.playback_rate_limit.max_requests,
            )?,
            env_parse(
                "ACCESS_PLAYBACK_WINDOW_SECS",
                defaults.playback_rate_limit.window.as_secs(),
            )?,
        ),
        analytics_retention: chrono::Duration::days(env_parse(
            "ACCESS_ANALYTICS_RETENTION_DAYS",
            defaults.analytics_retention.num_days(),
        )?),
        ..defaults
    })
}

fn csrf_secret() -> anyhow::Result<[u8; 32]> {
    let Ok(secret_b64) = env::var("ACCESS_CSRF_SECRET") else {
        if cfg!(debug_assertions) {
            tracing::warn!("ACCESS_CSRF_SECRET not set, using a random secret for this process");
            let bytes = platform::crypto::try_random_bytes(32)?;
            let mut secret = [0u8; 32];
            secret.copy_from_slice(&bytes);
            return Ok(secret);
        }
        anyhow::bail!("ACCESS_CSRF_SECRET must be set in production");
    };

    let secret_bytes = Engine::decode(&general_purpose::STANDARD, secret_b64.trim())?;
    secret_bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("ACCESS_CSRF_SECRET must decode to 32 bytes"))
}

fn playback_resolvers() -> anyhow::Result<ResolverRegistry> {
    let direct: Arc<dyn PlaybackResolver> = Arc::new(DirectUrlResolver::new("direct"));
    let mut registry = ResolverRegistry::new().register("direct", direct);

    if let Ok(player_base) = env::var("EMBED_PLAYER_BASE") {
        let embed: Arc<dyn PlaybackResolver> = Arc::new(EmbedResolver::new("presto", player_base));
        registry = registry
            .register("embed", embed.clone())
            .register("presto", embed);
    }

    if let (Ok(base_url), Ok(token_key)) =
        (env::var("SIGNED_URL_BASE"), env::var("SIGNED_URL_TOKEN_KEY"))
    {
        let ttl_secs = env_parse(
            "SIGNED_URL_TTL_SECS",
            access::resolvers::DEFAULT_SIGNED_URL_TTL_SECS,
        )?;
        let signed: Arc<dyn PlaybackResolver> =
            Arc::new(SignedUrlResolver::new("bunny", base_url, token_key, ttl_secs));
        registry = registry
            .register("signed_url", signed.clone())
            .register("bunny", signed);
    }

    Ok(registry)
}
