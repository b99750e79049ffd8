use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use climecast::axum_api::{app_router, AppState};
use climecast::cache::{create_cache, CacheAside};
use climecast::cron::CleanupService;
use climecast::upstream::{NewsApiClient, OpenWeatherClient};
use climecast::{AppConfig, AuthService, InMemoryOtpStore, InMemoryUserStore, LettreEmailSender};
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    if config.enable_magic_login {
        warn!("magic login enabled: every OTP is all zeros and no email is sent");
    }

    let otps = Arc::new(InMemoryOtpStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let email_sender = Arc::new(LettreEmailSender::new(&config)?);

    let cache = CacheAside::new(create_cache(&config)?);
    info!(backend = cache.store().backend_name(), "cache ready");

    let weather = Arc::new(OpenWeatherClient::new(
        &config.openweather_api_key,
        &config.openweather_base_url,
        &config.openweather_geo_url,
    )?);
    let news = Arc::new(NewsApiClient::new(
        &config.newsapi_key,
        &config.newsapi_base_url,
    )?);

    let cleanup = Arc::new(CleanupService::new(otps.clone()));
    let sweep_interval = Duration::from_secs(config.otp_sweep_interval_seconds);
    tokio::spawn(cleanup.start_scheduler(sweep_interval));

    let cors = build_cors_layer(&config.frontend_origin)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        auth_service: Arc::new(AuthService::new(
            config.as_ref().clone(),
            otps,
            users.clone(),
            email_sender,
        )),
        users,
        cache,
        weather,
        news,
    };

    let app = app_router(state)
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on port {}", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Credentialed CORS for the dashboard origin; the refresh cookie needs it.
fn build_cors_layer(origin: &str) -> Result<CorsLayer, BoxError> {
    let origin: HeaderValue = origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
