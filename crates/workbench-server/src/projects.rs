//! Project and conversation endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use workbench::conversation::Conversation;
use workbench::project::{NewProject, Project, ProjectDetails};
use workbench::{Reply, Workbench};

use crate::error::ApiError;

/// `POST /projects`
pub async fn create_project(
    State(workbench): State<Workbench>,
    Json(new): Json<NewProject>,
) -> Result<Json<Project>, ApiError> {
    if new.name.trim().is_empty() {
        return Err(ApiError::bad_request("project name must not be empty"));
    }
    Ok(Json(workbench.create_project(new).await?))
}

/// `GET /projects`
pub async fn list_projects(State(workbench): State<Workbench>) -> Result<Json<Value>, ApiError> {
    let projects = workbench.projects().list().await?;
    Ok(Json(json!({ "projects": projects })))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(workbench): State<Workbench>,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetails>, ApiError> {
    Ok(Json(workbench.project_details(&id).await?))
}

/// Body of `POST /conversations`.
#[derive(Debug, Deserialize)]
pub struct NewConversation {
    /// Owning project
    pub project_id: String,
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// First user message
    #[serde(default)]
    pub initial_message: Option<String>,
}

/// Query of `GET /conversations`.
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFilter {
    /// Only conversations of this project
    #[serde(default)]
    pub project_id: Option<String>,
}

/// `POST /conversations`
pub async fn create_conversation(
    State(workbench): State<Workbench>,
    Json(new): Json<NewConversation>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = workbench
        .create_conversation(&new.project_id, new.title, new.initial_message)
        .await?;
    Ok(Json(conversation))
}

/// `GET /conversations?project_id=`
pub async fn list_conversations(
    State(workbench): State<Workbench>,
    Query(filter): Query<ConversationFilter>,
) -> Result<Json<Value>, ApiError> {
    let conversations = workbench
        .conversations()
        .list(filter.project_id.as_deref())
        .await?;
    Ok(Json(json!({ "conversations": conversations })))
}

/// `GET /conversations/:id`
pub async fn get_conversation(
    State(workbench): State<Workbench>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(workbench.conversations().get(&id).await?))
}

/// Body of `POST /conversations/:id/messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessage {
    /// Free-form user text
    pub message: String,
}

/// `POST /conversations/:id/messages`
pub async fn send_message(
    State(workbench): State<Workbench>,
    Path(id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Result<Json<Reply>, ApiError> {
    Ok(Json(workbench.send_message(&id, &body.message).await?))
}
