use anyhow::Context;
use pilgrim_api::{app, AppState, AuthConfig, Repositories};
use pilgrim_catalog::FeaturedPolicy;
use pilgrim_core::Notifier;
use pilgrim_order::DraftStore;
use pilgrim_store::{
    DbClient, EventProducer, InMemoryDraftStore, PgBookingRepository, PgConsultationRepository, PgTourRepository,
    RedisClient, RedisDraftStore, TracingNotifier,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pilgrim_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = pilgrim_store::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Pilgrim API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis, optional: drafts fall back to process memory
    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?,
        )),
        None => None,
    };
    let drafts: Arc<dyn DraftStore> = match &redis {
        Some(redis) => Arc::new(RedisDraftStore::new(redis.as_ref().clone())),
        None => {
            tracing::warn!("Redis not configured; drafts are kept in memory and rate limiting is off");
            Arc::new(InMemoryDraftStore::new())
        }
    };

    // Kafka, optional: notifications go to the log when disabled
    let notifier: Arc<dyn Notifier> = if config.kafka.enabled {
        Arc::new(
            EventProducer::new(
                &config.kafka.brokers,
                &config.kafka.booking_topic,
                &config.kafka.consultation_topic,
            )
            .context("Failed to create Kafka producer")?,
        )
    } else {
        tracing::info!("Kafka disabled; notifications are logged only");
        Arc::new(TracingNotifier)
    };

    let featured = FeaturedPolicy::new(config.booking.featured_cap);
    let repos = Repositories {
        tours: Arc::new(PgTourRepository::new(db.pool.clone(), featured)),
        bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
        consultations: Arc::new(PgConsultationRepository::new(db.pool.clone())),
        drafts,
    };

    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
    };
    let mut app_state = AppState::new(repos, notifier, &config.booking, auth).context("Failed to build app state")?;
    if let Some(redis) = redis {
        app_state = app_state.with_rate_limit(redis, config.rate_limit.clone());
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
