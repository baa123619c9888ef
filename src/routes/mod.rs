mod upload;
mod webform;

use crate::config::Config;
use crate::middlewares::trace_id::{TraceId, TraceIdLayer};
use crate::state::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::{Router, routing::get, routing::post};
use std::time::Duration;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tracing::Span;

pub fn build(config: &Config) -> Router<AppState> {
    // stored files are served as-is, directories are never listed
    let stored_files_service =
        ServeDir::new(&config.storage.dir).append_index_html_on_directories(false);
    let root = post(upload::upload).put(upload::upload);
    let router = if config.server.enable_webform {
        Router::new()
            .route("/", root.get(webform::index))
            .route("/style.css", get(webform::style))
            .route("/scripts.js", get(webform::scripts))
    } else {
        Router::new().route("/", root.get(|| async { StatusCode::NOT_FOUND }))
    };
    router
        .route("/health", get(|| async { StatusCode::OK }))
        .fallback_service(stored_files_service)
        .layer(TimeoutLayer::new(config.server.request_timeout))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let trace_id = request
                        .extensions()
                        .get::<TraceId>()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    tracing::info_span!("request", trace_id = %trace_id)
                })
                .on_request(|req: &Request<Body>, _span: &Span| {
                    tracing::debug!(
                        method = %req.method(),
                        uri = %req.uri(),
                        version = ?req.version(),
                        "started processing request"
                    );
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        latency = %format!("{}ms", latency.as_millis()),
                        "finished processing request"
                    );
                }),
        )
        .layer(TraceIdLayer)
}
