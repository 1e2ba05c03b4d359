//! File Tool endpoints.
//!
//! Missing projects and files are 404, an existing `create` target is 409.
//! Every other File Tool condition (path escape, text not found, directory
//! targets, hidden paths) comes back as a 200 whose `status` field names it.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use workbench::Workbench;
use workbench::project::{FileError, ProjectFiles, WriteMode};

use crate::error::ApiError;

/// Body of `POST /files/read`.
#[derive(Debug, Deserialize)]
pub struct ReadFileRequest {
    /// Project id
    pub project_id: String,
    /// Path relative to the project root
    pub file_path: String,
}

/// Body of `POST /files/create`.
#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    /// Project id
    pub project_id: String,
    /// Path relative to the project root
    pub file_path: String,
    /// Initial content
    #[serde(default)]
    pub content: String,
}

/// Body of `POST /files/edit`.
#[derive(Debug, Deserialize)]
pub struct EditFileRequest {
    /// Project id
    pub project_id: String,
    /// Path relative to the project root
    pub file_path: String,
    /// Content to write
    pub content: String,
    /// `replace`, `append` or `prepend`
    #[serde(default = "default_operation")]
    pub operation: String,
}

fn default_operation() -> String {
    WriteMode::Replace.to_string()
}

/// Body of `POST /files/search-replace`.
#[derive(Debug, Deserialize)]
pub struct SearchReplaceRequest {
    /// Project id
    pub project_id: String,
    /// Path relative to the project root
    pub file_path: String,
    /// Text to find
    pub search_text: String,
    /// Replacement text
    pub replace_text: String,
}

/// Query of `GET /files/list/:project_id`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Directory relative to the project root; the root when absent
    #[serde(default)]
    pub directory: String,
}

/// Query of `GET /files/autocomplete/:project_id`.
#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteQuery {
    /// Substring to look for
    #[serde(default)]
    pub query: String,
}

async fn project_files(workbench: &Workbench, project_id: &str) -> Result<ProjectFiles, ApiError> {
    Ok(workbench.projects().files(project_id).await?)
}

/// Turn a File Tool result into a response body, or an HTTP error for the
/// conditions that have one.
fn outcome<T>(
    file_path: &str,
    result: Result<T, FileError>,
    success: impl FnOnce(T) -> Value,
) -> Result<Json<Value>, ApiError> {
    match result {
        Ok(value) => {
            let mut body = success(value);
            if let Value::Object(map) = &mut body {
                map.insert("status".to_string(), json!("success"));
                map.insert("file_path".to_string(), json!(file_path));
            }
            Ok(Json(body))
        }
        Err(e @ (FileError::NotFound(_) | FileError::AlreadyExists(_) | FileError::Io(_))) => {
            Err(e.into())
        }
        Err(e) => Ok(Json(json!({
            "status": e.code(),
            "file_path": file_path,
            "result": e.to_string(),
        }))),
    }
}

/// `POST /files/read`
pub async fn read_file(
    State(workbench): State<Workbench>,
    Json(req): Json<ReadFileRequest>,
) -> Result<Json<Value>, ApiError> {
    let files = project_files(&workbench, &req.project_id).await?;
    let result = files.read(&req.file_path).await;
    outcome(&req.file_path, result, |content| json!({ "content": content }))
}

/// `POST /files/create`
pub async fn create_file(
    State(workbench): State<Workbench>,
    Json(req): Json<CreateFileRequest>,
) -> Result<Json<Value>, ApiError> {
    let files = project_files(&workbench, &req.project_id).await?;
    let result = files.create(&req.file_path, &req.content).await;
    outcome(&req.file_path, result, |()| {
        json!({ "result": format!("File created: {}", req.file_path) })
    })
}

/// `POST /files/edit`
pub async fn edit_file(
    State(workbench): State<Workbench>,
    Json(req): Json<EditFileRequest>,
) -> Result<Json<Value>, ApiError> {
    let mode: WriteMode = req.operation.parse().map_err(ApiError::bad_request)?;
    let files = project_files(&workbench, &req.project_id).await?;
    let result = files.write(&req.file_path, &req.content, mode).await;
    outcome(&req.file_path, result, |()| {
        json!({
            "operation": mode,
            "result": format!("{mode} applied to {}", req.file_path),
        })
    })
}

/// `POST /files/search-replace`
pub async fn search_replace(
    State(workbench): State<Workbench>,
    Json(req): Json<SearchReplaceRequest>,
) -> Result<Json<Value>, ApiError> {
    let files = project_files(&workbench, &req.project_id).await?;
    let result = files
        .search_replace(&req.file_path, &req.search_text, &req.replace_text)
        .await;
    outcome(&req.file_path, result, |count| {
        json!({
            "replacements": count,
            "result": format!("Replaced {count} occurrence(s) in {}", req.file_path),
        })
    })
}

/// `GET /files/list/:project_id?directory=`
pub async fn list_files(
    State(workbench): State<Workbench>,
    Path(project_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let files = project_files(&workbench, &project_id).await?;
    let result = files.list(&query.directory).await;
    outcome(&query.directory, result, |entries| {
        json!({ "directory": query.directory, "files": entries })
    })
}

/// `GET /files/tree/:project_id`
pub async fn file_tree(
    State(workbench): State<Workbench>,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let files = project_files(&workbench, &project_id).await?;
    let tree = files.tree().await?;
    Ok(Json(json!({
        "project_id": project_id,
        "count": tree.len(),
        "files": tree,
    })))
}

/// `GET /files/autocomplete/:project_id?query=`
pub async fn autocomplete(
    State(workbench): State<Workbench>,
    Path(project_id): Path<String>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Value>, ApiError> {
    let files = project_files(&workbench, &project_id).await?;
    let suggestions = files.autocomplete(&query.query).await?;
    Ok(Json(json!({
        "query": query.query,
        "suggestions": suggestions,
    })))
}
