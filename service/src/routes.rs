use axum::{
    Router,
    routing::{get, post},
    response::IntoResponse,
    http::StatusCode,
    extract::{Path, State, Multipart},
    Json,
};
use crate::models::{apply_option, ImportSummary, RecalculateRequest, RecalculateResponse, StoredImport};
use crate::storage::{ImportStorage, StorageError};
use chrono::Utc;
use scorecard_parser::{ParseOptions, ValidationConfig};
use std::sync::Arc;
use tracing::{info, debug, warn, error, instrument};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<ImportStorage>,
    pub validation: Arc<ValidationConfig>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/imports", post(create_import))
        .route("/imports/:id", get(get_import).delete(delete_import))
        .route("/imports/:id/recalculate", post(recalculate_import))
        .with_state(state)
}

fn storage_error(e: StorageError) -> (StatusCode, String) {
    match e {
        StorageError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        other => {
            error!("Storage failure: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[instrument(skip(state, multipart))]
async fn create_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportSummary>, (StatusCode, String)> {
    info!("Received result file upload");

    let mut file_data = Vec::new();
    let mut filename = String::new();
    let mut options = ParseOptions::default();

    while let Some(field) = multipart.next_field().await
        .map_err(|e| {
            error!("Multipart error: {}", e);
            (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
        })?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            filename = field.file_name().unwrap_or("unknown").to_string();
            info!("Receiving file: {}", filename);

            let data = field.bytes().await
                .map_err(|e| {
                    error!("Failed to read file data: {}", e);
                    (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                })?;
            file_data = data.to_vec();
            info!("File data received: {} bytes", file_data.len());
        } else {
            let value = field.text().await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read field {}: {}", name, e)))?;
            debug!("Option {} = {}", name, value);
            apply_option(&mut options, &name, &value)
                .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
        }
    }

    if file_data.is_empty() {
        error!("No file data provided in request");
        return Err((StatusCode::BAD_REQUEST, "No file provided".to_string()));
    }

    let validation = state.validation.clone();
    let (data, name, opts) = (file_data.clone(), filename.clone(), options.clone());
    let outcome = tokio::task::spawn_blocking(move || {
        scorecard_parser::import(&data, Some(&name), &opts, &validation)
    })
    .await
    .map_err(|e| {
        error!("Import task failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Import task failed: {}", e))
    })?
    .map_err(|e| {
        warn!("Parse error for file '{}': {}", filename, e);
        (StatusCode::BAD_REQUEST, format!("Parse error: {}", e))
    })?;

    let import_id = state.storage.create_import()
        .map_err(|e| {
            error!("Failed to create import directory: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to create import: {}", e))
        })?;

    let stored = StoredImport {
        import_id: import_id.clone(),
        filename,
        created_at: Utc::now(),
        options,
        outcome,
    };
    state.storage.write_upload(&import_id, &file_data).map_err(storage_error)?;
    state.storage.write_import(&stored).map_err(storage_error)?;

    info!("Stored import {}", import_id);
    Ok(Json(ImportSummary::from(&stored)))
}

async fn get_import(
    State(state): State<AppState>,
    Path(import_id): Path<String>,
) -> Result<Json<StoredImport>, (StatusCode, String)> {
    let stored = state.storage.read_import(&import_id).map_err(storage_error)?;
    Ok(Json(stored))
}

#[instrument(skip(state, request))]
async fn recalculate_import(
    State(state): State<AppState>,
    Path(import_id): Path<String>,
    Json(request): Json<RecalculateRequest>,
) -> Result<Json<RecalculateResponse>, (StatusCode, String)> {
    let mut stored = state.storage.read_import(&import_id).map_err(storage_error)?;

    stored.outcome.score_data.round_continuous_vp_draws = request.round_continuous_vp_draws;
    stored.outcome.refresh(&state.validation);
    info!(
        "Recalculated import {}: {} changes",
        import_id,
        stored.outcome.changes.len()
    );

    state.storage.write_import(&stored).map_err(storage_error)?;
    Ok(Json(RecalculateResponse {
        changes: stored.outcome.changes,
        report: stored.outcome.report,
    }))
}

async fn delete_import(
    State(state): State<AppState>,
    Path(import_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.storage.delete_import(&import_id).map_err(storage_error)?;
    info!("Deleted import {}", import_id);
    Ok(StatusCode::NO_CONTENT)
}
