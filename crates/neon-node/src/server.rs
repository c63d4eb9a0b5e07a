//! HTTP server assembly and lifecycle

use crate::api;
use crate::config::{NodeConfig, ServerSettings, StorageBackend, StorageSettings};
use crate::error::{ApiError, ServerError};
use crate::metrics::GameMetrics;
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use neon_auth::{AuthError, AuthGateway, Authenticated};
use neon_core::{Clock, GameError, SystemClock};
use neon_economics::GameEngine;
use neon_storage::{LedgerStore, MemoryStore, SqliteStore};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Response header carrying a freshly minted session token
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<GameEngine>,
    pub gateway: Arc<AuthGateway>,
    pub metrics: Arc<GameMetrics>,
}

impl AppState {
    /// Wire the engine, gateway and metrics over one store and clock
    pub fn new(
        config: &NodeConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        let engine = GameEngine::new(
            config.economy.clone(),
            config.leaderboard.clone(),
            store.clone(),
            clock.clone(),
        )?;
        let gateway = AuthGateway::new(config.auth.gateway_config(), store, clock);
        let metrics = GameMetrics::new()?;
        metrics.players.set(engine.player_count() as i64);

        Ok(Self {
            engine: Arc::new(engine),
            gateway: Arc::new(gateway),
            metrics: Arc::new(metrics),
        })
    }
}

/// Open the configured ledger store
pub fn open_store(settings: &StorageSettings) -> Result<Arc<dyn LedgerStore>, ServerError> {
    match settings.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, progress is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            if let Some(parent) = Path::new(&settings.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(Arc::new(SqliteStore::open(&settings.path)?))
        }
    }
}

/// Periodically drop expired sessions from the gateway cache and the store
///
/// The first tick fires immediately, so sessions left over from a previous
/// run are cleared at startup.
pub fn spawn_session_purge(gateway: Arc<AuthGateway>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let gateway = gateway.clone();
            match tokio::task::spawn_blocking(move || gateway.purge_expired_sessions()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!("Session purge failed: {}", err),
                Err(err) => tracing::error!("Session purge task panicked: {}", err),
            }
        }
    })
}

/// Build the application router
pub fn router(state: AppState, config: &NodeConfig) -> Router {
    let api = Router::new()
        .route("/api/state", get(api::get_state))
        .route("/api/user_upgrades", get(api::user_upgrades))
        .route("/api/producers", get(api::producers))
        .route("/api/production", get(api::production))
        .route("/api/click", post(api::click))
        .route("/api/upgrade_power", post(api::upgrade_power))
        .route("/api/buy_producer", post(api::buy_producer))
        .route("/api/leaderboard", get(api::leaderboard))
        .route(
            "/api/per_second_leaderboard",
            get(api::per_second_leaderboard),
        )
        .route("/api/clicks_leaderboard", get(api::clicks_leaderboard))
        .route("/api/donations/goals", get(api::donation_goals))
        .route("/api/donations/goal", get(api::donation_goal))
        .route("/api/donations/donate", post(api::donate))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let mut public = Router::new().route("/health", get(api::health));
    if config.metrics.enabled {
        public = public.route("/metrics", get(api::metrics));
    }

    public
        .merge(api)
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([SESSION_HEADER]);

    if settings.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Failure while resolving a caller
enum AuthOrGame {
    Auth(AuthError),
    Game(GameError),
}

impl From<AuthError> for AuthOrGame {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<GameError> for AuthOrGame {
    fn from(err: GameError) -> Self {
        Self::Game(err)
    }
}

/// Resolve the caller, create their player on first use and hand the
/// identity to the handler. A session minted on the way is returned in
/// `X-Session-ID`.
async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let gateway = state.gateway.clone();
    let engine = state.engine.clone();
    let resolved = api::blocking(move || -> Result<Authenticated, AuthOrGame> {
        let identity = gateway.authenticate(header.as_deref())?;
        engine.ensure_player(&identity.user_id)?;
        Ok(identity)
    })
    .await?;

    let identity = match resolved {
        Ok(identity) => identity,
        Err(AuthOrGame::Auth(err)) => {
            tracing::debug!("Authentication failed: {}", err);
            state
                .metrics
                .auth_failures_total
                .with_label_values(&[err.reason()])
                .inc();
            return Err(err.into());
        }
        Err(AuthOrGame::Game(err)) => return Err(err.into()),
    };
    state.metrics.players.set(state.engine.player_count() as i64);

    let minted = identity.session_token.clone().filter(|_| identity.minted);
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    if let Some(token) = minted {
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
            Err(err) => tracing::error!("Minted session id is not a valid header: {}", err),
        }
    }
    Ok(response)
}

/// Run the server until Ctrl+C
pub async fn serve(config: NodeConfig) -> Result<(), ServerError> {
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = open_store(&config.storage)?;
    let state = AppState::new(&config, store, clock)?;
    let purge = config
        .auth
        .session_purge_interval()
        .map(|every| spawn_session_purge(state.gateway.clone(), every));
    let app = router(state, &config);

    let addr: SocketAddr = config.server.listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Neon Clicker server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(purge) = purge {
        purge.abort();
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(err) => tracing::error!("Failed to listen for shutdown signal: {}", err),
    }
}
