//! mocktrics-api — management API and scrape endpoint.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/collect-interval` | Current interval and whether it is editable |
//! | POST | `/collect-interval/{interval}` | Change the interval (seconds or `<n><s|m|h|d>`) |
//! | POST | `/metric` | Create a metric |
//! | GET | `/metric/all` | All metrics keyed by name |
//! | GET | `/metric/{name}` | One metric |
//! | DELETE | `/metric/{name}` | Delete a metric |
//! | POST | `/metric/{name}/value` | Add a labeled value |
//! | DELETE | `/metric/{name}/value?labels=..` | Remove a labeled value |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use mocktrics_metrics::{MetricRegistry, Scheduler};
use mocktrics_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: MetricRegistry,
    pub scheduler: Scheduler,
    /// Mirror for API-created metrics; `None` keeps everything in memory.
    pub store: Option<StateStore>,
}

/// Build the complete router (management API + scrape endpoint).
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/collect-interval", get(handlers::get_collect_interval))
        .route("/collect-interval/{interval}", post(handlers::set_collect_interval))
        .route("/metric", post(handlers::create_metric))
        .route("/metric/all", get(handlers::list_metrics))
        .route("/metric/{name}", get(handlers::get_metric).delete(handlers::delete_metric))
        .route(
            "/metric/{name}/value",
            post(handlers::add_metric_value).delete(handlers::delete_metric_value),
        )
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}
