//! Handler-level tests for the HTTP API.
//!
//! Handlers are called directly with extractor values; the sandbox runs
//! against a runtime binary that does not exist, so it reports `disabled`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde_json::json;

use workbench::dispatch::Task;
use workbench::project::NewProject;
use workbench::{Workbench, WorkbenchConfig};
use workbench_server::{agents, files, health, projects};

struct Harness {
    _dir: tempfile::TempDir,
    workbench: Workbench,
    project_id: String,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = WorkbenchConfig {
        projects_root: dir.path().to_path_buf(),
        ..Default::default()
    };
    config.sandbox.runtime_binary = "definitely-not-a-container-runtime".to_string();
    let workbench = Workbench::connect(config).await;

    let Json(project) = projects::create_project(
        State(workbench.clone()),
        Json(NewProject {
            name: "p1".to_string(),
            ..Default::default()
        }),
    )
    .await
    .expect("create project");

    let harness = Harness {
        _dir: dir,
        workbench,
        project_id: project.id,
    };
    files::create_file(
        State(harness.workbench.clone()),
        Json(files::CreateFileRequest {
            project_id: harness.project_id.clone(),
            file_path: "a.txt".to_string(),
            content: "hello world".to_string(),
        }),
    )
    .await
    .expect("seed a.txt");
    harness
}

impl Harness {
    fn state(&self) -> State<Workbench> {
        State(self.workbench.clone())
    }
}

// =============================================================================
// File Endpoint Tests
// =============================================================================

mod file_endpoints {
    use super::*;

    #[tokio::test]
    async fn test_search_replace_then_read() {
        let h = harness().await;

        let Json(body) = files::search_replace(
            h.state(),
            Json(files::SearchReplaceRequest {
                project_id: h.project_id.clone(),
                file_path: "a.txt".to_string(),
                search_text: "hello".to_string(),
                replace_text: "hi".to_string(),
            }),
        )
        .await
        .expect("search-replace");
        assert_eq!(body["status"], "success");
        assert!(body["result"].as_str().expect("result").contains("a.txt"));

        let Json(body) = files::read_file(
            h.state(),
            Json(files::ReadFileRequest {
                project_id: h.project_id.clone(),
                file_path: "a.txt".to_string(),
            }),
        )
        .await
        .expect("read");
        assert_eq!(body["content"], "hi world");
    }

    #[tokio::test]
    async fn test_missing_file_and_project_are_404() {
        let h = harness().await;

        let err = files::read_file(
            h.state(),
            Json(files::ReadFileRequest {
                project_id: h.project_id.clone(),
                file_path: "nope.txt".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = files::read_file(
            h.state(),
            Json(files::ReadFileRequest {
                project_id: "no-such-project".to_string(),
                file_path: "a.txt".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_existing_is_409() {
        let h = harness().await;

        let err = files::create_file(
            h.state(),
            Json(files::CreateFileRequest {
                project_id: h.project_id.clone(),
                file_path: "a.txt".to_string(),
                content: "other".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_path_escape_is_reported_in_body() {
        let h = harness().await;

        let Json(body) = files::read_file(
            h.state(),
            Json(files::ReadFileRequest {
                project_id: h.project_id.clone(),
                file_path: "../../etc/passwd".to_string(),
            }),
        )
        .await
        .expect("200 with status");

        assert_eq!(body["status"], "path_escape");
    }

    #[tokio::test]
    async fn test_text_not_found_is_reported_in_body() {
        let h = harness().await;

        let Json(body) = files::search_replace(
            h.state(),
            Json(files::SearchReplaceRequest {
                project_id: h.project_id.clone(),
                file_path: "a.txt".to_string(),
                search_text: "absent".to_string(),
                replace_text: "x".to_string(),
            }),
        )
        .await
        .expect("200 with status");

        assert_eq!(body["status"], "text_not_found");
    }

    #[tokio::test]
    async fn test_edit_rejects_unknown_operation() {
        let h = harness().await;

        let err = files::edit_file(
            h.state(),
            Json(files::EditFileRequest {
                project_id: h.project_id.clone(),
                file_path: "a.txt".to_string(),
                content: "x".to_string(),
                operation: "insert".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_edit_append() {
        let h = harness().await;

        files::edit_file(
            h.state(),
            Json(files::EditFileRequest {
                project_id: h.project_id.clone(),
                file_path: "a.txt".to_string(),
                content: "again".to_string(),
                operation: "append".to_string(),
            }),
        )
        .await
        .expect("edit");

        let Json(body) = files::read_file(
            h.state(),
            Json(files::ReadFileRequest {
                project_id: h.project_id.clone(),
                file_path: "a.txt".to_string(),
            }),
        )
        .await
        .expect("read");
        assert_eq!(body["content"], "hello world\nagain");
    }

    #[tokio::test]
    async fn test_tree_list_and_autocomplete() {
        let h = harness().await;

        let Json(tree) = files::file_tree(h.state(), Path(h.project_id.clone()))
            .await
            .expect("tree");
        let paths: Vec<_> = tree["files"]
            .as_array()
            .expect("files")
            .iter()
            .map(|f| f["path"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(paths, vec!["README.md", "a.txt"]);

        let Json(listing) = files::list_files(
            h.state(),
            Path(h.project_id.clone()),
            Query(files::ListQuery::default()),
        )
        .await
        .expect("list");
        assert_eq!(listing["files"].as_array().expect("files").len(), 2);

        let Json(found) = files::autocomplete(
            h.state(),
            Path(h.project_id.clone()),
            Query(files::AutocompleteQuery {
                query: "READ".to_string(),
            }),
        )
        .await
        .expect("autocomplete");
        assert_eq!(found["suggestions"], json!(["README.md"]));
    }
}

// =============================================================================
// Conversation Endpoint Tests
// =============================================================================

mod conversation_endpoints {
    use super::*;

    #[tokio::test]
    async fn test_message_round_trip() {
        let h = harness().await;

        let Json(conversation) = projects::create_conversation(
            h.state(),
            Json(projects::NewConversation {
                project_id: h.project_id.clone(),
                title: None,
                initial_message: None,
            }),
        )
        .await
        .expect("conversation");

        let Json(reply) = projects::send_message(
            h.state(),
            Path(conversation.id.clone()),
            Json(projects::SendMessage {
                message: "show @a.txt".to_string(),
            }),
        )
        .await
        .expect("message");
        assert_eq!(reply.file_tags, vec!["a.txt"]);
        assert!(reply.response.contains("hello world"));

        let Json(conversation) = projects::get_conversation(h.state(), Path(conversation.id))
            .await
            .expect("get");
        assert_eq!(conversation.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_conversation_for_unknown_project_is_404() {
        let h = harness().await;

        let err = projects::create_conversation(
            h.state(),
            Json(projects::NewConversation {
                project_id: "ghost".to_string(),
                title: None,
                initial_message: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = projects::send_message(
            h.state(),
            Path("ghost".to_string()),
            Json(projects::SendMessage {
                message: "hi".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_project_details_and_health() {
        let h = harness().await;

        let Json(details) = projects::get_project(h.state(), Path(h.project_id.clone()))
            .await
            .expect("details");
        assert_eq!(details.files.len(), 2);

        let Json(health) = health(h.state()).await.expect("health");
        assert_eq!(health.projects, 1);
        assert!(!health.sandbox_enabled);
    }
}

// =============================================================================
// Agent Endpoint Tests
// =============================================================================

mod agent_endpoints {
    use super::*;

    #[tokio::test]
    async fn test_unknown_agent_is_404() {
        let h = harness().await;

        let err = agents::execute_task(
            h.state(),
            Path("research".to_string()),
            Json(agents::ExecuteTask {
                task: Task::new("search"),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_execute_code_reports_disabled_sandbox() {
        let h = harness().await;

        let Json(body) = agents::execute_task(
            h.state(),
            Path("developer".to_string()),
            Json(agents::ExecuteTask {
                task: Task::new("execute_code").with_param("code", "print(1)"),
            }),
        )
        .await
        .expect("execute");

        assert_eq!(body["task_status"], "completed");
        assert_eq!(body["response"]["status"], "disabled");
    }

    #[tokio::test]
    async fn test_files_agent_and_unsupported_framework() {
        let h = harness().await;

        let Json(body) = agents::execute_task(
            h.state(),
            Path("files".to_string()),
            Json(agents::ExecuteTask {
                task: Task::new("read_file")
                    .with_param("project_id", h.project_id.clone())
                    .with_param("file_path", "a.txt"),
            }),
        )
        .await
        .expect("read_file");
        assert_eq!(body["response"]["content"], "hello world");

        let Json(body) = agents::execute_task(
            h.state(),
            Path("developer".to_string()),
            Json(agents::ExecuteTask {
                task: Task::new("create_api")
                    .with_param("api_spec", json!({ "framework": "django" })),
            }),
        )
        .await
        .expect("reported in body");
        assert_eq!(body["task_status"], "unsupported");
    }

    #[tokio::test]
    async fn test_list_agents() {
        let h = harness().await;

        let Json(body) = agents::list_agents(h.state()).await;

        assert_eq!(body["agents"].as_array().expect("agents").len(), 5);
    }
}
