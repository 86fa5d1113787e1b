use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use vanish_api::error::ApiError;
use vanish_api::middleware::{decode_token, require_auth};
use vanish_api::state::{AppState, AppStateInner};
use vanish_api::{auth, messages, users};
use vanish_db::Database;
use vanish_gateway::{ChannelRegistry, connection};
use vanish_reaper::Reaper;
use vanish_types::config::ErasePolicy;
use vanish_vault::Vault;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vanish=debug,tower_http=debug".into()),
        )
        .init();

    // Config — read once, immutable afterwards
    let policy = ErasePolicy::from_env();
    let db_path = std::env::var("VANISH_DB_PATH").unwrap_or_else(|_| "vanish.db".into());
    let storage_dir = std::env::var("VANISH_STORAGE_DIR").unwrap_or_else(|_| "storage".into());
    let jwt_secret =
        std::env::var("VANISH_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let host = std::env::var("VANISH_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("VANISH_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let reaper_interval: u64 = std::env::var("REAPER_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".into())
        .parse()?;

    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    let vault = Arc::new(Vault::open(&storage_dir).await?);

    // `prune` runs one reaper cycle synchronously and exits; meant for an
    // external scheduler alongside (or instead of) the built-in loop.
    if std::env::args().nth(1).as_deref() == Some("prune") {
        let reaper = Reaper::new(db, vault, policy);
        let report = reaper.run_once().await?;
        println!(
            "Pruned {} expired messages ({} attachment failures, sanitized: {})",
            report.deleted, report.erasure_failures, report.sanitized
        );
        return Ok(());
    }

    let registry = ChannelRegistry::new();
    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        vault: vault.clone(),
        registry: registry.clone(),
        jwt_secret,
    });

    // Background reaper, single-flight on its interval
    let reaper = Arc::new(Reaper::new(db, vault, policy));
    tokio::spawn(reaper.run_loop(Duration::from_secs(reaper_interval)));
    info!(
        "Reaper scheduled every {}s (ttl {}m, {} wipe passes)",
        reaper_interval, policy.ttl_minutes, policy.wipe_passes
    );

    let app = router(state, &storage_dir);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Vanish server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, storage_dir: &str) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/find", get(users::find_user))
        .route("/messages", get(messages::list_messages))
        .route("/messages", post(messages::send_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service("/storage", ServeDir::new(storage_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct GatewayParams {
    token: String,
}

/// Authenticate at the upgrade so the socket loop only ever sees a known
/// identity; channel subscription is authorized separately per request.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<GatewayParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = decode_token(&params.token, &state.jwt_secret)?;
    let registry = state.registry.clone();

    Ok(ws.on_upgrade(move |socket| {
        connection::serve_connection(socket, registry, claims.username)
    }))
}
