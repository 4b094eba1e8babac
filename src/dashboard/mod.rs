//! Dashboard - read-only JSON and HTML views served with axum
//!
//! JSON routes return the stored rows as-is. HTML routes render the
//! [`Inspector`] tables. Both share one store behind an async mutex.

pub mod render;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::error;

use crate::experiment::{
    CheckpointRecord, EvaluationMetricRecord, ExperimentId, ExperimentRecord, ExperimentStore,
    TrainingMetricRecord,
};
use crate::inspect::{columns, Inspector};
use crate::Error;

/// Thread-safe shared store reference for axum handlers.
pub type SharedStore = Arc<Mutex<ExperimentStore>>;

/// Wrap a store for [`router`].
#[must_use]
pub fn shared(store: ExperimentStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Build the dashboard router.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/api/experiments/", get(api_experiments))
        .route("/api/experiments/{id}", get(api_experiment))
        .route("/api/experiments/{id}/training-metrics", get(api_training_metrics))
        .route("/api/experiments/{id}/evaluation-metrics", get(api_evaluation_metrics))
        .route("/api/experiments/{id}/checkpoints", get(api_checkpoints))
        .route("/experiments", get(experiments_page))
        .route("/experiments/{id}", get(experiment_page))
        .route("/experiments/{id}/properties", get(properties_page))
        .route("/experiments/{id}/parameters", get(parameters_page))
        .route("/experiments/{id}/training-metrics", get(training_metrics_page))
        .route("/experiments/{id}/evaluation-metrics", get(evaluation_metrics_page))
        .with_state(store)
}

/// Handler error: unknown experiments become 404, anything else 500.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct Detail {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = if self.0.is_not_found() {
            (StatusCode::NOT_FOUND, "Experiment not found".to_string())
        } else {
            error!(error = %self.0, "dashboard request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
        };
        (status, Json(Detail { detail })).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn found<T>(id: ExperimentId, value: Option<T>) -> ApiResult<T> {
    value.ok_or_else(|| ApiError(Error::ExperimentNotFound(id)))
}

fn require(store: &ExperimentStore, id: ExperimentId) -> ApiResult<()> {
    if store.experiment_exists(id)? {
        Ok(())
    } else {
        Err(ApiError(Error::ExperimentNotFound(id)))
    }
}

// JSON

async fn api_experiments(
    State(store): State<SharedStore>,
) -> ApiResult<Json<Vec<ExperimentRecord>>> {
    let store = store.lock().await;
    Ok(Json(store.list_experiments()?))
}

async fn api_experiment(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Json<ExperimentRecord>> {
    let store = store.lock().await;
    Ok(Json(found(id, store.get_experiment(id)?)?))
}

async fn api_training_metrics(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Json<Vec<TrainingMetricRecord>>> {
    let store = store.lock().await;
    require(&store, id)?;
    Ok(Json(store.training_metrics(id)?))
}

async fn api_evaluation_metrics(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Json<Vec<EvaluationMetricRecord>>> {
    let store = store.lock().await;
    require(&store, id)?;
    Ok(Json(store.evaluation_metrics(id)?))
}

async fn api_checkpoints(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Json<Vec<CheckpointRecord>>> {
    let store = store.lock().await;
    require(&store, id)?;
    Ok(Json(store.checkpoints(id)?))
}

// HTML

async fn experiments_page(State(store): State<SharedStore>) -> ApiResult<Html<String>> {
    let store = store.lock().await;
    let table = Inspector::new(&store).list_experiments()?;
    Ok(Html(render::table(&table, Some(columns::ID))?))
}

async fn experiment_page(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Html<String>> {
    let store = store.lock().await;
    let sections = [
        properties_html(&store, id)?,
        parameters_html(&store, id)?,
        evaluation_metrics_html(&store, id)?,
        training_metrics_html(&store, id)?,
    ];
    Ok(Html(sections.join("\n")))
}

async fn properties_page(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Html<String>> {
    Ok(Html(properties_html(&*store.lock().await, id)?))
}

async fn parameters_page(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Html<String>> {
    Ok(Html(parameters_html(&*store.lock().await, id)?))
}

async fn training_metrics_page(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Html<String>> {
    Ok(Html(training_metrics_html(&*store.lock().await, id)?))
}

async fn evaluation_metrics_page(
    State(store): State<SharedStore>,
    Path(id): Path<ExperimentId>,
) -> ApiResult<Html<String>> {
    Ok(Html(evaluation_metrics_html(&*store.lock().await, id)?))
}

fn properties_html(store: &ExperimentStore, id: ExperimentId) -> ApiResult<String> {
    let table = found(id, Inspector::new(store).properties(id)?)?;
    Ok(render::section(&format!("Experiment {id}"), &table, None)?)
}

fn parameters_html(store: &ExperimentStore, id: ExperimentId) -> ApiResult<String> {
    let table = found(id, Inspector::new(store).parameters(id)?)?;
    Ok(render::section("Parameters", &table, None)?)
}

fn training_metrics_html(store: &ExperimentStore, id: ExperimentId) -> ApiResult<String> {
    let table = found(id, Inspector::new(store).training_metrics(id)?)?;
    Ok(render::section("Training Metrics", &table, None)?)
}

fn evaluation_metrics_html(store: &ExperimentStore, id: ExperimentId) -> ApiResult<String> {
    let table = found(id, Inspector::new(store).evaluation_metrics(id)?)?;
    Ok(render::section("Evaluation Metrics", &table, None)?)
}
