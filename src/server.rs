use crate::api::rollups;
use crate::api::state::AppState;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = build_dashboard_cors(state.config.dashboard_origin.as_deref());
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let api_routes = Router::new()
        .route("/sources", get(rollups::list_sources))
        .route("/rollups/preview", post(rollups::preview_rollup))
        .route("/rollups/{source}", get(rollups::get_rollup))
        .route("/rollups/{source}/yoy", get(rollups::get_yoy))
        .route("/rollups/{source}/breakdown", get(rollups::get_breakdown))
        .route("/combined/weekly", get(rollups::get_combined_weekly))
        // Preview bodies carry whole pasted sheets.
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            count_requests,
        ))
        .layer(CompressionLayer::new())
        .layer(cors);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
        .route("/metrics", get(prometheus_metrics))
        .nest("/api", api_routes)
        .layer(axum::middleware::map_response(add_security_headers))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn count_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    state.requests_total.fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

/// Inject security headers on every HTTP response.
async fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// Build CORS layer for API routes based on configured origin.
fn build_dashboard_cors(dashboard_origin: Option<&str>) -> CorsLayer {
    dashboard_origin.map_or_else(
        || {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any)
        },
        |origin| {
            let allowed_origin = origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("*"));
            CorsLayer::new()
                .allow_origin(allowed_origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
        },
    )
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}

/// GET /health/detailed - Configured sources and cache state.
async fn detailed_health_check(
    State(state): State<Arc<AppState>>,
) -> axum::Json<serde_json::Value> {
    let sources: Vec<&str> = state
        .config
        .sources
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": sources,
        "combined_sources": state.config.combined.sources,
        "cache_ttl_secs": state.cache.ttl().as_secs(),
        "cache_entries": state.cache.len(),
    }))
}

/// GET /metrics - Prometheus-compatible metrics endpoint.
async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    use std::fmt::Write;

    let cache_entries = state.cache.len();
    let sources = state.config.sources.len();
    let requests = state.requests_total.load(Ordering::Relaxed);
    let rows_parsed = state.rows_parsed_total.load(Ordering::Relaxed);
    let rows_skipped = state.rows_skipped_total.load(Ordering::Relaxed);

    let mut out = String::with_capacity(1024);
    let _ = writeln!(
        out,
        "# HELP sheet_rollup_cache_entries Number of cached rollup responses"
    );
    let _ = writeln!(out, "# TYPE sheet_rollup_cache_entries gauge");
    let _ = writeln!(out, "sheet_rollup_cache_entries {cache_entries}");
    let _ = writeln!(
        out,
        "# HELP sheet_rollup_sources Number of configured sheet sources"
    );
    let _ = writeln!(out, "# TYPE sheet_rollup_sources gauge");
    let _ = writeln!(out, "sheet_rollup_sources {sources}");
    let _ = writeln!(
        out,
        "# HELP sheet_rollup_requests_total API requests received since startup"
    );
    let _ = writeln!(out, "# TYPE sheet_rollup_requests_total counter");
    let _ = writeln!(out, "sheet_rollup_requests_total {requests}");
    let _ = writeln!(
        out,
        "# HELP sheet_rollup_rows_parsed_total Sheet rows turned into records"
    );
    let _ = writeln!(out, "# TYPE sheet_rollup_rows_parsed_total counter");
    let _ = writeln!(out, "sheet_rollup_rows_parsed_total {rows_parsed}");
    let _ = writeln!(
        out,
        "# HELP sheet_rollup_rows_skipped_total Sheet rows skipped for a missing or invalid date or as duplicates"
    );
    let _ = writeln!(out, "# TYPE sheet_rollup_rows_skipped_total counter");
    let _ = writeln!(out, "sheet_rollup_rows_skipped_total {rows_skipped}");

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], out)
}
