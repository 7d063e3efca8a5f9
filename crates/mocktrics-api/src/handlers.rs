//! Management API handlers.
//!
//! Handlers mutate the in-memory registry first; when a store is configured
//! the change is mirrored afterwards. A failed mirror is logged and the
//! request still succeeds.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use mocktrics_core::config::MetricConfig;
use mocktrics_core::units::parse_seconds_or_duration;
use mocktrics_core::{MetricRecord, ValueSpec};
use mocktrics_metrics::MetricError;
use mocktrics_metrics::exporter::CONTENT_TYPE;

use crate::ApiState;

/// Bounds for an interval set through the API, in seconds.
const MIN_INTERVAL: u64 = 1;
const MAX_INTERVAL: u64 = 3600;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Status for a value whose label count differs from its metric's.
fn label_count_status() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY)
}

fn status_for(err: &MetricError) -> StatusCode {
    match err {
        MetricError::Validation { .. } | MetricError::InvalidParameter(_) => {
            StatusCode::BAD_REQUEST
        }
        MetricError::ReadOnly(_) => StatusCode::FORBIDDEN,
        MetricError::NotFound(_) => StatusCode::NOT_FOUND,
        MetricError::DuplicateLabelset | MetricError::AlreadyExists(_) => StatusCode::CONFLICT,
        MetricError::LabelCountMismatch { .. } => label_count_status(),
        MetricError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn metric_error(err: MetricError) -> Response {
    error_response(&err.to_string(), status_for(&err))
}

#[derive(serde::Serialize)]
struct Action<'a> {
    name: &'a str,
    action: &'static str,
}

// ── Collect interval ───────────────────────────────────────────

#[derive(serde::Serialize)]
struct IntervalInfo {
    seconds: u64,
    editable: bool,
}

/// GET /collect-interval
pub async fn get_collect_interval(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(IntervalInfo {
        seconds: state.scheduler.get_interval(),
        editable: !state.scheduler.interval_is_read_only(),
    })
    .into_response()
}

/// POST /collect-interval/{interval}
pub async fn set_collect_interval(
    State(state): State<ApiState>,
    Path(interval): Path<String>,
) -> Response {
    if state.scheduler.interval_is_read_only() {
        return error_response(
            "collect interval is set in the configuration file (read-only)",
            StatusCode::FORBIDDEN,
        );
    }
    let seconds = match parse_seconds_or_duration(&interval) {
        Ok(seconds) => seconds,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST),
    };
    if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&seconds) {
        return error_response(
            &format!("interval must be between {MIN_INTERVAL} and {MAX_INTERVAL} seconds"),
            StatusCode::BAD_REQUEST,
        );
    }
    match state.scheduler.set_interval(seconds) {
        Ok(()) => ApiResponse::ok(IntervalInfo {
            seconds,
            editable: true,
        })
        .into_response(),
        Err(e) => metric_error(e),
    }
}

// ── Metrics ────────────────────────────────────────────────────

/// POST /metric
pub async fn create_metric(
    State(state): State<ApiState>,
    Json(req): Json<MetricConfig>,
) -> Response {
    if state.registry.contains(&req.name) {
        return error_response("metric already exists", StatusCode::CONFLICT);
    }
    let record = MetricRecord {
        read_only: false,
        ..req.to_record()
    };
    let name = match state.registry.create(record) {
        Ok(name) => name,
        Err(e) => return metric_error(e),
    };

    if let (Some(store), Some(metric)) = (&state.store, state.registry.get(&name)) {
        if let Err(e) = store.save(&metric.serialize()) {
            warn!(%name, error = %e, "failed to persist metric");
        }
    }
    info!(%name, "metric created via api");
    (
        StatusCode::CREATED,
        ApiResponse::ok(Action {
            name: &name,
            action: "created",
        }),
    )
        .into_response()
}

/// GET /metric/all
pub async fn list_metrics(State(state): State<ApiState>) -> Response {
    let metrics: BTreeMap<String, MetricRecord> = state
        .registry
        .list()
        .into_iter()
        .map(|(name, metric)| (name, metric.serialize()))
        .collect();
    ApiResponse::ok(metrics).into_response()
}

/// GET /metric/{name}
pub async fn get_metric(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(metric) => ApiResponse::ok(metric.serialize()).into_response(),
        None => error_response("requested metric does not exist", StatusCode::NOT_FOUND),
    }
}

/// DELETE /metric/{name}
pub async fn delete_metric(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    if let Err(e) = state.registry.delete(&name) {
        return metric_error(e);
    }
    if let Some(store) = &state.store {
        if let Err(e) = store.delete(&name) {
            warn!(%name, error = %e, "failed to delete persisted metric");
        }
    }
    ApiResponse::ok(Action {
        name: &name,
        action: "deleted",
    })
    .into_response()
}

// ── Values ─────────────────────────────────────────────────────

/// POST /metric/{name}/value
pub async fn add_metric_value(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(value): Json<ValueSpec>,
) -> Response {
    let metric = match state.registry.require(&name) {
        Ok(metric) => metric,
        Err(e) => return metric_error(e),
    };
    if let Err(e) = metric.add_value(value.clone()) {
        return metric_error(e);
    }
    if let Some(store) = &state.store {
        if let Err(e) = store.save_value(&name, &value) {
            warn!(%name, error = %e, "failed to persist metric value");
        }
    }
    (
        StatusCode::CREATED,
        ApiResponse::ok(Action {
            name: &name,
            action: "created",
        }),
    )
        .into_response()
}

/// DELETE /metric/{name}/value?labels=a&labels=b
pub async fn delete_metric_value(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let labels: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "labels")
        .map(|(_, value)| value)
        .collect();

    let metric = match state.registry.require(&name) {
        Ok(metric) => metric,
        Err(e) => return metric_error(e),
    };
    if let Err(e) = metric.remove_value(&labels) {
        return metric_error(e);
    }
    if let Some(store) = &state.store {
        if let Err(e) = store.delete_value(&name, &labels) {
            warn!(%name, error = %e, "failed to delete persisted metric value");
        }
    }
    ApiResponse::ok(Action {
        name: &name,
        action: "deleted",
    })
    .into_response()
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> Response {
    match state.registry.exporter().render() {
        Ok(body) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response(),
        Err(e) => metric_error(e),
    }
}
