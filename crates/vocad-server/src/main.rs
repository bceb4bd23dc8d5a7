use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vocad_api::state::{AppState, AppStateInner};
use vocad_api::{health, iterate, jobs, narration, shape, transcribe};
use vocad_gen::codegen::{CodeGenClient, CodeGenerator};
use vocad_gen::jobs::{JobTracker, JobTrackerConfig};
use vocad_gen::orchestrator::Orchestrator;
use vocad_gen::router::{RouterClient, TextRouter};
use vocad_gen::shape::ShapeClient;
use vocad_speech::SpeechClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vocad=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("VOCAD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("VOCAD_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;
    let db_path = std::env::var("VOCAD_DB_PATH").unwrap_or_else(|_| "vocad.db".into());
    let debug = std::env::var("VOCAD_DEBUG")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    let production = std::env::var("VOCAD_ENV").as_deref() == Ok("production");

    // Init database
    let db = Arc::new(vocad_db::Database::open(&PathBuf::from(&db_path))?);

    // External clients, each optional by credential
    let speech = SpeechClient::from_env().map(Arc::new);
    let router = RouterClient::from_env().map(|c| Arc::new(c) as Arc<dyn TextRouter>);
    let codegen = CodeGenClient::from_env().map(|c| Arc::new(c) as Arc<dyn CodeGenerator>);
    let shape_client = Arc::new(ShapeClient::from_env());

    let orchestrator = Arc::new(Orchestrator::new(
        router,
        codegen,
        speech.clone(),
        db.clone(),
    ));

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        speech,
        orchestrator,
        jobs: JobTracker::new(JobTrackerConfig::default()),
        shape: shape_client,
        debug,
    });

    // Routes
    let app = Router::new()
        .route("/api/transcribe", post(transcribe::transcribe))
        .route("/api/iterate", post(iterate::iterate))
        .route("/api/generation/job/{job_id}", get(jobs::get_job))
        .route("/api/hunyuan/generate", post(shape::generate_shape))
        .route("/api/getresponse", get(narration::get_response))
        .route(
            "/api/generate-model-summary",
            post(narration::generate_model_summary),
        )
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors_layer(production))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("vocad server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Permissive CORS in production deployments (clients arrive from rotating
/// preview hosts); a configured origin list during development.
fn cors_layer(production: bool) -> CorsLayer {
    if production {
        return CorsLayer::permissive();
    }

    let origins = std::env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| {
            "http://localhost:5173,http://localhost:5174,http://localhost:3000".into()
        })
        .split(',')
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
