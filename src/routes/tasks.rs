//! Task endpoints
//!
//! - POST /api/tasks - store a task definition
//! - POST /api/tasks/open - record that a user opened a task's post
//! - GET /api/tasks/{userId} - every recorded task state for a user

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{error_response, json_response};
use crate::server::AppState;
use crate::task::{Task, TaskRecord, TaskState};
use crate::types::EngineError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTaskRequest {
    pub task_id: String,
    pub user_id: u64,
}

#[derive(Debug, Serialize)]
pub struct OpenTaskResponse {
    pub state: TaskState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub user_id: u64,
    pub completed: usize,
    pub tasks: BTreeMap<String, TaskRecord>,
}

fn engine_error_response(error: &EngineError) -> Response<Full<Bytes>> {
    let status = match error {
        EngineError::InvalidInput(_) | EngineError::Transition(_) => StatusCode::BAD_REQUEST,
        _ if error.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &error.to_string())
}

pub async fn handle_register_task(state: Arc<AppState>, body: &[u8]) -> Response<Full<Bytes>> {
    let task: Task = match serde_json::from_slice(body) {
        Ok(task) => task,
        Err(e) => {
            warn!("Task definition JSON parse error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"));
        }
    };

    let task_id = task.id.clone();
    match state.engine.register_task(task).await {
        Ok(()) => json_response(StatusCode::CREATED, &serde_json::json!({ "taskId": task_id })),
        Err(e) => engine_error_response(&e),
    }
}

pub async fn handle_open_task(state: Arc<AppState>, body: &[u8]) -> Response<Full<Bytes>> {
    let request: OpenTaskRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Open task JSON parse error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"));
        }
    };

    match state.engine.open_task(request.user_id, &request.task_id).await {
        Ok(task_state) => {
            info!(user_id = request.user_id, task_id = %request.task_id, state = ?task_state, "Task opened");
            json_response(StatusCode::OK, &OpenTaskResponse { state: task_state })
        }
        Err(e) => engine_error_response(&e),
    }
}

pub async fn handle_progress(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    let Ok(user_id) = user_id.parse::<u64>() else {
        return error_response(StatusCode::BAD_REQUEST, "userId must be a positive integer");
    };

    match state.engine.progress(user_id).await {
        Ok(progress) => json_response(
            StatusCode::OK,
            &ProgressResponse {
                user_id,
                completed: progress.completed_count(),
                tasks: progress.tasks,
            },
        ),
        Err(e) => engine_error_response(&e),
    }
}
