//! HTTP API for signature analysis, calibrated generation, and scoring.
//!
//! Thin JSON layer over [`ScribeEngine`]; every handler validates, calls
//! the engine on a blocking task, and maps the engine's error kinds onto
//! HTTP status codes. No pipeline logic lives here.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use stealthscribe_core::{
    AegisRating, AuthorialSignature, Error, GenerationOutcome, GenerationRequest, ScoreWeights,
    ScribeEngine, Tone,
};

/// Shared server state. The engine is internally synchronized, so handlers
/// share one instance without an outer lock.
struct AppState {
    engine: Arc<ScribeEngine>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(err: Error) -> (StatusCode, Json<ErrorBody>) {
    let status = match &err {
        Error::InvalidInput(_) | Error::InvalidTone(_) => StatusCode::BAD_REQUEST,
        Error::InsufficientSample { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::SignatureNotFound { .. } => StatusCode::NOT_FOUND,
        Error::GenerationUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Io(_) | Error::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.kind(),
            message: err.to_string(),
        }),
    )
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

/// Engine calls run the calibration loop on std threads; keep them off the
/// async runtime.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(Json(value)),
        Ok(Err(err)) => Err(error_response(err)),
        Err(join_err) => Err(error_response(Error::GenerationUnavailable(format!(
            "worker task failed: {join_err}"
        )))),
    }
}

// ---------------------------------------------------------------------------
// /api/v1/analyze
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AnalyzeBody {
    user: String,
    /// One or more writing samples; word minimums apply to the total.
    samples: Vec<String>,
}

async fn handle_analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnalyzeBody>,
) -> ApiResult<AuthorialSignature> {
    let engine = Arc::clone(&state.engine);
    blocking(move || {
        let refs: Vec<&str> = body.samples.iter().map(String::as_str).collect();
        engine.analyze(&body.user, &refs)
    })
    .await
}

// ---------------------------------------------------------------------------
// /api/v1/generate
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GenerateBody {
    user: Option<String>,
    version: Option<u32>,
    prompt: String,
    /// formal | casual | persuasive | narrative | technical
    tone: String,
    target_words: Option<usize>,
    seed: Option<u64>,
    /// Per-request acceptance threshold override (0-100).
    threshold: Option<f64>,
    /// Per-request iteration budget override.
    max_iterations: Option<u32>,
    /// Per-request sub-metric weight override
    /// (`{fidelity, detectability, fluency}`).
    weights: Option<ScoreWeights>,
    /// Per-request attempts-per-iteration override.
    breadth: Option<usize>,
    /// Per-request generation deadline override, in seconds.
    timeout_secs: Option<f64>,
}

async fn handle_generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateBody>,
) -> ApiResult<GenerationOutcome> {
    let engine = Arc::clone(&state.engine);
    blocking(move || {
        let tone: Tone = body.tone.parse()?;
        let request = GenerationRequest {
            user: body.user,
            version: body.version,
            prompt: body.prompt,
            tone,
            target_words: body.target_words,
            seed: body.seed,
            threshold: body.threshold,
            max_iterations: body.max_iterations,
            weights: body.weights,
            breadth: body.breadth,
            timeout_secs: body.timeout_secs,
        };
        // HTTP requests have no interactive cancel path.
        let cancel = AtomicBool::new(false);
        engine.generate(&request, &cancel)
    })
    .await
}

// ---------------------------------------------------------------------------
// /api/v1/score
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ScoreBody {
    text: String,
    user: Option<String>,
    version: Option<u32>,
}

async fn handle_score(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScoreBody>,
) -> ApiResult<AegisRating> {
    let engine = Arc::clone(&state.engine);
    blocking(move || engine.score(&body.text, body.user.as_deref(), body.version)).await
}

// ---------------------------------------------------------------------------
// /api/v1/signatures/{user}
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SignatureParams {
    version: Option<u32>,
}

#[derive(Serialize)]
struct SignaturesResponse {
    user: String,
    versions: Vec<u32>,
    signature: AuthorialSignature,
}

async fn handle_signatures(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Query(params): Query<SignatureParams>,
) -> ApiResult<SignaturesResponse> {
    let engine = Arc::clone(&state.engine);
    blocking(move || {
        let signature = engine.store().get(&user, params.version)?;
        Ok(SignaturesResponse {
            versions: engine.store().versions(&user),
            user,
            signature,
        })
    })
    .await
}

// ---------------------------------------------------------------------------
// / and /health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    users: usize,
    generator: &'static str,
    version: &'static str,
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        users: state.engine.store().users().len(),
        generator: state.engine.generator_name(),
        version: stealthscribe_core::VERSION,
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "StealthScribe Server",
        "version": stealthscribe_core::VERSION,
        "generator": state.engine.generator_name(),
        "endpoints": {
            "/": "This API index",
            "/api/v1/analyze": {
                "method": "POST",
                "description": "Extract a signature from writing samples",
                "body": {
                    "user": "User id ([A-Za-z0-9._-])",
                    "samples": "List of sample texts (>= 50 words total)",
                }
            },
            "/api/v1/generate": {
                "method": "POST",
                "description": "Generate calibrated text via the calibration loop",
                "body": {
                    "prompt": "What to write about",
                    "tone": "formal | casual | persuasive | narrative | technical",
                    "user": "Optional signature owner",
                    "version": "Optional signature version (default: latest)",
                    "target_words": "Optional word budget",
                    "seed": "Optional base seed for reproducibility",
                    "threshold": "Optional acceptance threshold override (0-100)",
                    "max_iterations": "Optional iteration budget override",
                    "weights": "Optional {fidelity, detectability, fluency} weight override",
                    "breadth": "Optional candidates-per-iteration override",
                    "timeout_secs": "Optional generation deadline override, in seconds",
                }
            },
            "/api/v1/score": {
                "method": "POST",
                "description": "Aegis-score text, optionally against a signature",
                "body": { "text": "Text to score", "user": "Optional", "version": "Optional" }
            },
            "/api/v1/signatures/{user}": "GET stored signature (query: ?version=N)",
            "/health": "Health check",
        }
    }))
}

/// Build the axum router.
fn build_router(engine: Arc<ScribeEngine>) -> Router {
    let state = Arc::new(AppState { engine });

    Router::new()
        .route("/", get(handle_index))
        .route("/api/v1/analyze", post(handle_analyze))
        .route("/api/v1/generate", post(handle_generate))
        .route("/api/v1/score", post(handle_score))
        .route("/api/v1/signatures/{user}", get(handle_signatures))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Run the HTTP server until the process exits.
pub async fn run_server(engine: Arc<ScribeEngine>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(engine);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app).await
}
