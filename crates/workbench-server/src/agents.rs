//! Agent Task Dispatcher endpoints.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use workbench::Workbench;
use workbench::dispatch::{DispatchError, Task};
use workbench::project::FileError;

use crate::error::ApiError;

/// Body of `POST /agents/:agent_name/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteTask {
    /// The task to run
    pub task: Task,
}

/// `GET /agents`
pub async fn list_agents(State(workbench): State<Workbench>) -> Json<Value> {
    Json(json!({ "agents": workbench.dispatcher().list() }))
}

/// `POST /agents/:agent_name/execute`
///
/// Unknown agents are 404 and malformed tasks 400. Unsupported variants and
/// file-level conditions are reported in `task_status`.
pub async fn execute_task(
    State(workbench): State<Workbench>,
    Path(agent_name): Path<String>,
    Json(body): Json<ExecuteTask>,
) -> Result<Json<Value>, ApiError> {
    match workbench.execute_task(&agent_name, body.task).await {
        Ok(output) => Ok(Json(json!({
            "agent_name": agent_name,
            "task_type": output.kind,
            "response": output.data,
            "task_status": "completed",
        }))),
        Err(e) if reported_in_body(&e) => Ok(Json(json!({
            "agent_name": agent_name,
            "response": null,
            "task_status": e.code(),
            "error": e.to_string(),
        }))),
        Err(e) => Err(e.into()),
    }
}

fn reported_in_body(e: &DispatchError) -> bool {
    match e {
        DispatchError::Unsupported(_) => true,
        DispatchError::File(f) => !matches!(
            f,
            FileError::NotFound(_) | FileError::AlreadyExists(_) | FileError::Io(_)
        ),
        _ => false,
    }
}
