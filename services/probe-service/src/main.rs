mod config;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use wp_api_types::{AssetsResponse, RequestResult, RequestStatusResponse, SessionSnapshot};
use wp_chain_eth::{JsonRpcClient, NodeWalletProvider};
use wp_session::{ProviderConfig, SessionError, SessionManager, SessionUpdate, WalletEvent};
use wp_wallet_core::{AccountAssets, RequestError, RequestOrchestrator};

use crate::config::Config;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    rpc: Arc<JsonRpcClient>,
    session: Arc<RwLock<SessionManager>>,
    orchestrator: Arc<RequestOrchestrator>,
    assets: Arc<AccountAssets>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Arc::new(Config::from_env()?);

    let rpc = Arc::new(JsonRpcClient::new(Some(config.rpc_url.clone())));
    let session = Arc::new(RwLock::new(SessionManager::new()));
    let orchestrator = Arc::new(RequestOrchestrator::new(rpc.clone(), session.clone()));
    let assets = Arc::new(AccountAssets::new(rpc.clone()));

    let state = AppState {
        config,
        rpc,
        session,
        orchestrator,
        assets,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/session/connect", post(session_connect))
        .route("/session", get(session_status))
        .route("/session/terminate", post(session_terminate))
        .route("/assets", get(assets_get))
        .route("/assets/refresh", post(assets_refresh))
        .route("/request/send-transaction", post(request_send_transaction))
        .route("/request/sign-transaction", post(request_sign_transaction))
        .route("/request/personal-sign", post(request_personal_sign))
        .route("/request", get(request_status))
        .route("/request/dismiss", post(request_dismiss))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let addr = state.config.listen_addr;
    info!("probe-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Single consumer for the wallet event stream: applies events in arrival
/// order and fans the resulting updates out to assets and the request
/// orchestrator.
fn spawn_event_loop(state: AppState, mut events: UnboundedReceiver<WalletEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let update = state.session.write().await.apply_event(event);
            match update {
                Some(SessionUpdate::AddressChanged(address)) => {
                    if let Err(err) = state.assets.refresh(&address).await {
                        warn!("asset refresh after account change failed: {err}");
                    }
                }
                Some(SessionUpdate::ChainChanged(_)) => {
                    let address = state.session.read().await.snapshot().address;
                    if address.is_empty() {
                        continue;
                    }
                    if let Err(err) = state.assets.refresh(&address).await {
                        warn!("asset refresh after chain change failed: {err}");
                    }
                }
                Some(SessionUpdate::Disconnected { .. }) => {
                    state.orchestrator.handle_disconnect().await;
                    state.assets.clear().await;
                }
                None => {}
            }
        }
        info!("wallet event stream closed");
    });
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "probe-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "probe-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn session_connect(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    let provider_config =
        ProviderConfig::new(state.config.project_id.clone()).map_err(internal_error)?;
    let provider = Arc::new(NodeWalletProvider::new(provider_config, state.rpc.clone()));

    let events = state
        .session
        .write()
        .await
        .initiate(provider)
        .await
        .map_err(session_error)?;

    spawn_event_loop(state.clone(), events);
    Ok(Json(state.session.read().await.snapshot()))
}

async fn session_status(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.read().await.snapshot())
}

async fn session_terminate(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    state
        .session
        .write()
        .await
        .terminate()
        .await
        .map_err(session_error)?;

    state.orchestrator.handle_disconnect().await;
    state.assets.clear().await;
    Ok(Json(state.session.read().await.snapshot()))
}

async fn assets_get(State(state): State<AppState>) -> Json<AssetsResponse> {
    Json(AssetsResponse {
        fetching: state.assets.fetching(),
        assets: state.assets.current().await,
    })
}

async fn assets_refresh(State(state): State<AppState>) -> ApiResult<AssetsResponse> {
    let address = state.session.read().await.snapshot().address;
    if address.is_empty() {
        return Err(bad_request("no authorized account"));
    }

    state
        .assets
        .refresh(&address)
        .await
        .map_err(bad_gateway)?;

    Ok(Json(AssetsResponse {
        fetching: state.assets.fetching(),
        assets: state.assets.current().await,
    }))
}

async fn request_send_transaction(State(state): State<AppState>) -> ApiResult<RequestStatusResponse> {
    let outcome = state.orchestrator.send_transaction().await;
    request_reply(&state, outcome).await
}

async fn request_sign_transaction(State(state): State<AppState>) -> ApiResult<RequestStatusResponse> {
    let outcome = state.orchestrator.sign_transaction().await;
    request_reply(&state, outcome).await
}

async fn request_personal_sign(State(state): State<AppState>) -> ApiResult<RequestStatusResponse> {
    let outcome = state.orchestrator.sign_personal_message().await;
    request_reply(&state, outcome).await
}

async fn request_status(State(state): State<AppState>) -> Json<RequestStatusResponse> {
    Json(state.orchestrator.status().await)
}

async fn request_dismiss(State(state): State<AppState>) -> ApiResult<RequestStatusResponse> {
    match state.orchestrator.dismiss().await {
        Ok(()) => Ok(Json(state.orchestrator.status().await)),
        Err(RequestError::Busy) => Err(conflict("a request is still pending")),
        Err(other) => Err(internal_error(other)),
    }
}

/// A wallet rejection is a normal outcome, reported through the request
/// status; only precondition failures map to error codes.
async fn request_reply(
    state: &AppState,
    outcome: Result<RequestResult, RequestError>,
) -> ApiResult<RequestStatusResponse> {
    match outcome {
        Ok(_) | Err(RequestError::Rejected(_)) => Ok(Json(state.orchestrator.status().await)),
        Err(RequestError::NoSession) => Err(bad_request("no connected wallet session")),
        Err(RequestError::Busy) => Err(conflict("another request is already pending")),
    }
}

fn session_error(err: SessionError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        SessionError::AlreadyActive => conflict("a session is already active"),
        SessionError::NotConnected => bad_request("no active session"),
        other => bad_gateway(other),
    }
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn conflict(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn bad_gateway(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
