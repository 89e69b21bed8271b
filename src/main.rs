use std::net::SocketAddr;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finrem_citizen_ui::middleware::AppConfig;
use finrem_citizen_ui::session::{MemoryStore, RedisStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finrem_citizen_ui=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let app = if config.redis_enabled() {
        let url = config
            .redis_url()
            .expect("REDIS_CONNECTION_STRING must be set when FEATURE_REDIS is enabled");
        let store = RedisStore::connect(url, config.key_prefix())
            .await
            .expect("failed to connect to Redis session store");
        tracing::info!("Session configured with Redis store");
        finrem_citizen_ui::build_router(&config, store).expect("failed to build application")
    } else {
        tracing::info!("Session configured with in-memory store");
        finrem_citizen_ui::build_router(&config, MemoryStore::new())
            .expect("failed to build application")
    };

    let app = app.layer(TraceLayer::new_for_http());

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3100".into())
        .parse()
        .expect("PORT must be a number");

    let addr = SocketAddr::new(host.parse().expect("invalid HOST"), port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
