use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use rebalancer_core::analysis::{AnalysisOutcome, Analyzer};
use rebalancer_core::domain::portfolio::{Artifact, RiskProfile};
use rebalancer_core::llm::gemini::GeminiClient;
use rebalancer_core::llm::LlmClient;
use rebalancer_core::session::Session;
use rebalancer_core::views;

mod error;
mod sessions;

use error::ApiError;
use sessions::SessionRegistry;

const PURGE_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = rebalancer_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let analyzer: Option<SharedAnalyzer> = match GeminiClient::from_settings(&settings) {
        Ok(client) => {
            tracing::info!(model = client.model(), "Gemini client configured");
            let client: Arc<dyn LlmClient> = Arc::new(client);
            Some(Arc::new(
                Analyzer::new(client).with_allocation_tolerance(settings.allocation_tolerance_pct),
            ))
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "Gemini API key missing; analysis disabled");
            None
        }
    };

    let sessions = SessionRegistry::new(Duration::from_secs(settings.session_ttl_secs));
    spawn_session_purger(sessions.clone());

    let state = AppState {
        sessions,
        analyzer,
        max_upload_bytes: settings.max_upload_bytes,
    };
    let app = app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

type SharedAnalyzer = Arc<Analyzer<Arc<dyn LlmClient>>>;

#[derive(Clone)]
struct AppState {
    sessions: SessionRegistry,
    analyzer: Option<SharedAnalyzer>,
    max_upload_bytes: usize,
}

fn app(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", axum::routing::delete(end_session))
        .route(
            "/sessions/:id/analysis",
            post(run_analysis).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/sessions/:id/report", get(get_report).delete(clear_report))
        .route(
            "/sessions/:id/report/sector-allocation",
            get(sector_allocation_page),
        )
        .route(
            "/sessions/:id/report/diversification",
            get(diversification_page),
        )
        .route(
            "/sessions/:id/report/recommendations",
            get(recommendations_page),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct SessionCreated {
    session_id: Uuid,
    created_at: DateTime<Utc>,
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session = state.sessions.create();
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id,
            created_at: session.created_at,
        }),
    )
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound)
    }
}

fn session(state: &AppState, id: Uuid) -> Result<Arc<Session>, ApiError> {
    state.sessions.get(id).ok_or(ApiError::SessionNotFound)
}

async fn run_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<AnalysisOutcome>, ApiError> {
    let session = session(&state, id)?;
    let analyzer = state.analyzer.as_ref().ok_or(ApiError::NotConfigured)?;

    let (artifact, risk) = read_upload(multipart, state.max_upload_bytes).await?;
    tracing::info!(
        session_id = %id,
        file_name = %artifact.file_name,
        bytes = artifact.bytes.len(),
        %risk,
        "analysis requested"
    );

    let outcome = analyzer.run(&artifact, risk, session.store()).await?;
    Ok(Json(outcome))
}

async fn read_upload(
    mut multipart: Multipart,
    limit: usize,
) -> Result<(Artifact, RiskProfile), ApiError> {
    let mut artifact: Option<Artifact> = None;
    let mut risk: Option<RiskProfile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "invalid multipart body", limit))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "failed to read upload", limit))?;
                artifact = Some(Artifact::new(file_name, content_type, bytes.to_vec()));
            }
            Some("risk_profile") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, "failed to read risk_profile", limit))?;
                risk = Some(
                    text.parse::<RiskProfile>()
                        .map_err(|e| ApiError::BadRequest(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let artifact = artifact
        .filter(|a| !a.bytes.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("Please upload your portfolio file or screenshot.".to_string())
        })?;
    let risk = risk
        .ok_or_else(|| ApiError::BadRequest("Please select your risk profile.".to_string()))?;
    Ok((artifact, risk))
}

fn multipart_error(err: MultipartError, context: &str, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadRequest(format!("{context}: {}", err.body_text()))
    }
}

async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let session = session(&state, id)?;
    Ok(match session.store().get() {
        Some(report) => Json(report).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": views::NOT_ANALYZED_MESSAGE })),
        )
            .into_response(),
    })
}

async fn clear_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    session(&state, id)?.store().clear();
    Ok(StatusCode::NO_CONTENT)
}

async fn sector_allocation_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<views::PageView<views::SectorAllocationView>>, ApiError> {
    let report = session(&state, id)?.store().get();
    Ok(Json(views::sector_allocation_view(report.as_deref())))
}

async fn diversification_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<views::PageView<views::DiversificationView>>, ApiError> {
    let report = session(&state, id)?.store().get();
    Ok(Json(views::diversification_view(report.as_deref())))
}

async fn recommendations_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<views::PageView<views::RecommendationsView>>, ApiError> {
    let report = session(&state, id)?.store().get();
    Ok(Json(views::recommendations_view(report.as_deref())))
}

fn spawn_session_purger(sessions: SessionRegistry) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(PURGE_INTERVAL_SECS));
        loop {
            tick.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::info!(purged, remaining = sessions.len(), "expired sessions purged");
            }
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &rebalancer_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
