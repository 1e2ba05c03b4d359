//! Built-in capability providers.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{CapabilityProvider, DispatchError, Task};
use crate::project::{ProjectFiles, ProjectRegistry, WriteMode};
use crate::sandbox::{ExecutionEngine, ExecutionRequest};
use crate::store::{MemoryStore, Record, Store};

fn name_or<'a>(map: &'a Map<String, Value>, keys: &[&str], default: &'a str) -> &'a str {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .unwrap_or(default)
}

// ==================== developer ====================

/// Code execution plus project and API scaffolding.
#[derive(Debug, Clone)]
pub struct DeveloperProvider {
    engine: Arc<ExecutionEngine>,
}

impl DeveloperProvider {
    /// Provider executing code on `engine`.
    pub fn new(engine: Arc<ExecutionEngine>) -> Self {
        Self { engine }
    }

    async fn execute_code(&self, task: &Task) -> Result<Value, DispatchError> {
        let code = task.str_param("code")?;
        let language = task.opt_str_param("language")?.unwrap_or("python");
        let mut request = ExecutionRequest::new(code, language);
        if let Some(ms) = task.param("timeout_ms") {
            let ms = ms.as_u64().ok_or_else(|| DispatchError::InvalidParameter {
                name: "timeout_ms".to_string(),
                reason: "expected a non-negative integer".to_string(),
            })?;
            request = request.with_time_limit(Duration::from_millis(ms));
        }
        let result = self.engine.execute(request).await;
        Ok(serde_json::to_value(result)?)
    }

    fn generate_structure(task: &Task) -> Result<Value, DispatchError> {
        let plan = task.object_param("project_plan")?;
        let name = name_or(&plan, &["project_name", "name"], "default_project");
        let description = name_or(&plan, &["description"], "");

        Ok(json!({
            "project_name": name,
            "directories": ["src/", "tests/", "docs/", "config/", "scripts/"],
            "files": {
                "README.md": format!("# {name}\n\n{description}\n"),
                "requirements.txt": "fastapi\nuvicorn\npytest\n",
                "main.py": format!("def main():\n    print(\"{name}\")\n\n\nif __name__ == \"__main__\":\n    main()\n"),
                "tests/test_main.py": "from main import main\n\n\ndef test_main():\n    main()\n",
                ".gitignore": "__pycache__/\n.venv/\n.env\n",
            },
            "status": "generated",
        }))
    }

    fn create_api(task: &Task) -> Result<Value, DispatchError> {
        let spec = task.object_param("api_spec")?;
        let name = name_or(&spec, &["name"], "api");
        let framework = name_or(&spec, &["framework"], "fastapi").to_lowercase();
        let endpoints: Vec<Endpoint> = match spec.get("endpoints") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                DispatchError::InvalidParameter {
                    name: "api_spec.endpoints".to_string(),
                    reason: e.to_string(),
                }
            })?,
            None => Vec::new(),
        };

        let code = match framework.as_str() {
            "fastapi" => fastapi_app(name, &endpoints),
            "flask" => flask_app(name, &endpoints),
            other => {
                return Err(DispatchError::Unsupported(format!(
                    "framework '{other}' (expected fastapi or flask)"
                )));
            }
        };

        Ok(json!({
            "api_name": name,
            "framework": framework,
            "endpoints": endpoints,
            "code": code,
            "status": "generated",
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Endpoint {
    #[serde(default = "Endpoint::default_method")]
    method: String,
    path: String,
}

impl Endpoint {
    fn default_method() -> String {
        "GET".to_string()
    }

    fn handler_name(&self) -> String {
        let mut name = self.method.to_lowercase();
        for part in self.path.split(|c: char| !c.is_ascii_alphanumeric()) {
            if !part.is_empty() {
                name.push('_');
                name.push_str(&part.to_lowercase());
            }
        }
        if name == self.method.to_lowercase() {
            name.push_str("_root");
        }
        name
    }
}

fn fastapi_app(name: &str, endpoints: &[Endpoint]) -> String {
    let mut code = format!("from fastapi import FastAPI\n\napp = FastAPI(title=\"{name}\")\n");
    for endpoint in endpoints {
        let _ = write!(
            code,
            "\n\n@app.{}(\"{}\")\nasync def {}():\n    return {{\"status\": \"ok\"}}\n",
            endpoint.method.to_lowercase(),
            endpoint.path,
            endpoint.handler_name()
        );
    }
    code
}

fn flask_app(name: &str, endpoints: &[Endpoint]) -> String {
    let mut code = format!("from flask import Flask, jsonify\n\napp = Flask(\"{name}\")\n");
    for endpoint in endpoints {
        let _ = write!(
            code,
            "\n\n@app.route(\"{}\", methods=[\"{}\"])\ndef {}():\n    return jsonify(status=\"ok\")\n",
            endpoint.path,
            endpoint.method.to_uppercase(),
            endpoint.handler_name()
        );
    }
    code
}

#[async_trait]
impl CapabilityProvider for DeveloperProvider {
    fn name(&self) -> &str {
        "developer"
    }

    fn description(&self) -> &str {
        "Runs code in the sandbox and scaffolds project structures and APIs"
    }

    fn task_kinds(&self) -> &[&str] {
        &["execute_code", "generate_structure", "create_api"]
    }

    async fn execute(&self, task: &Task) -> Result<Value, DispatchError> {
        match task.kind.as_str() {
            "execute_code" => self.execute_code(task).await,
            "generate_structure" => Self::generate_structure(task),
            "create_api" => Self::create_api(task),
            other => Err(DispatchError::UnknownTaskKind {
                agent: self.name().to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

// ==================== files ====================

/// The File Tool exposed as tasks.
#[derive(Debug, Clone)]
pub struct FilesProvider {
    projects: Arc<ProjectRegistry>,
}

impl FilesProvider {
    /// Provider over the projects in `projects`.
    pub fn new(projects: Arc<ProjectRegistry>) -> Self {
        Self { projects }
    }

    async fn files(&self, task: &Task) -> Result<ProjectFiles, DispatchError> {
        Ok(self.projects.files(task.str_param("project_id")?).await?)
    }
}

#[async_trait]
impl CapabilityProvider for FilesProvider {
    fn name(&self) -> &str {
        "files"
    }

    fn description(&self) -> &str {
        "Reads, lists, creates and edits files inside a project"
    }

    fn task_kinds(&self) -> &[&str] {
        &["read_file", "list_files", "create_file", "edit_file", "search_replace"]
    }

    async fn execute(&self, task: &Task) -> Result<Value, DispatchError> {
        let files = self.files(task).await?;
        match task.kind.as_str() {
            "read_file" => {
                let path = task.str_param("file_path")?;
                let content = files.read(path).await?;
                Ok(json!({ "file_path": path, "content": content }))
            }
            "list_files" => {
                let directory = task.opt_str_param("directory")?.unwrap_or_default();
                let entries = files.list(directory).await?;
                Ok(json!({ "directory": directory, "files": entries }))
            }
            "create_file" => {
                let path = task.str_param("file_path")?;
                files.create(path, task.str_param("content")?).await?;
                Ok(json!({ "file_path": path, "result": format!("created {path}") }))
            }
            "edit_file" => {
                let path = task.str_param("file_path")?;
                let mode = match task.opt_str_param("operation")? {
                    Some(op) => op.parse::<WriteMode>().map_err(|reason| {
                        DispatchError::InvalidParameter {
                            name: "operation".to_string(),
                            reason,
                        }
                    })?,
                    None => WriteMode::Replace,
                };
                files.write(path, task.str_param("content")?, mode).await?;
                Ok(json!({ "file_path": path, "result": format!("{mode} applied to {path}") }))
            }
            "search_replace" => {
                let path = task.str_param("file_path")?;
                let count = files
                    .search_replace(
                        path,
                        task.str_param("search_text")?,
                        task.str_param("replace_text")?,
                    )
                    .await?;
                Ok(json!({
                    "file_path": path,
                    "replacements": count,
                    "result": format!("replaced {count} occurrence(s) in {path}"),
                }))
            }
            other => Err(DispatchError::UnknownTaskKind {
                agent: self.name().to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

// ==================== project_manager ====================

/// A plan recorded by [`ProjectManagerProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    /// Project the plan is for
    pub project_name: String,
    /// Ordered phases
    pub phases: Vec<String>,
    /// Current phase name
    pub current_phase: String,
    /// When the plan was made
    pub created_at: DateTime<Utc>,
}

impl Record for PlanRecord {
    fn key(&self) -> &str {
        &self.project_name
    }
}

const PLAN_PHASES: &[&str] = &["Planning", "Development", "Testing", "Deployment"];

const NEXT_STEPS: &[&str] = &[
    "Initialize project repository",
    "Set up development environment",
    "Create initial project structure",
    "Configure CI/CD pipeline",
    "Begin core development tasks",
];

/// Project planning and progress tracking.
pub struct ProjectManagerProvider {
    plans: Arc<dyn Store<PlanRecord>>,
}

impl std::fmt::Debug for ProjectManagerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectManagerProvider").finish_non_exhaustive()
    }
}

impl Default for ProjectManagerProvider {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

impl ProjectManagerProvider {
    /// Provider keeping plans in `plans`.
    pub fn new(plans: Arc<dyn Store<PlanRecord>>) -> Self {
        Self { plans }
    }

    async fn create_plan(&self, task: &Task) -> Result<Value, DispatchError> {
        let requirements = task.object_param("requirements")?;
        let name = name_or(&requirements, &["name"], "default");
        let description = name_or(&requirements, &["description"], "");

        let record = PlanRecord {
            project_name: name.to_string(),
            phases: PLAN_PHASES.iter().map(|p| p.to_string()).collect(),
            current_phase: PLAN_PHASES[0].to_string(),
            created_at: Utc::now(),
        };
        self.plans
            .put(record.clone())
            .await?;

        let mut plan = format!("# Plan: {name}\n\n");
        if !description.is_empty() {
            let _ = writeln!(plan, "{description}\n");
        }
        for (i, phase) in record.phases.iter().enumerate() {
            let _ = writeln!(plan, "{}. {phase}", i + 1);
        }

        Ok(json!({
            "project_name": name,
            "plan": plan,
            "phases": record.phases,
            "status": "planned",
            "next_steps": NEXT_STEPS,
        }))
    }

    async fn monitor(&self, task: &Task) -> Result<Value, DispatchError> {
        let name = task.str_param("project_name")?;
        let record = self
            .plans
            .get(name)
            .await?;

        Ok(match record {
            Some(record) => json!({
                "project_name": record.project_name,
                "status": "planned",
                "created_at": record.created_at,
                "current_phase": record.current_phase,
                "completion_percentage": 0.0,
                "next_milestones": record.phases.iter().skip(1).collect::<Vec<_>>(),
                "blockers": [],
            }),
            None => json!({
                "project_name": name,
                "status": "not_found",
                "error": "no plan recorded for this project",
            }),
        })
    }
}

#[async_trait]
impl CapabilityProvider for ProjectManagerProvider {
    fn name(&self) -> &str {
        "project_manager"
    }

    fn description(&self) -> &str {
        "Creates project plans and reports their progress"
    }

    fn task_kinds(&self) -> &[&str] {
        &["create_plan", "monitor"]
    }

    async fn execute(&self, task: &Task) -> Result<Value, DispatchError> {
        match task.kind.as_str() {
            "create_plan" => self.create_plan(task).await,
            "monitor" => self.monitor(task).await,
            other => Err(DispatchError::UnknownTaskKind {
                agent: self.name().to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

// ==================== qa ====================

/// Test-suite scaffolding.
#[derive(Debug, Clone, Default)]
pub struct QaProvider;

#[async_trait]
impl CapabilityProvider for QaProvider {
    fn name(&self) -> &str {
        "qa"
    }

    fn description(&self) -> &str {
        "Generates test suite skeletons"
    }

    fn task_kinds(&self) -> &[&str] {
        &["create_tests"]
    }

    async fn execute(&self, task: &Task) -> Result<Value, DispatchError> {
        let structure = task.object_param("code_structure")?;
        let name = name_or(&structure, &["project_name", "name"], "default_project");

        Ok(json!({
            "project_name": name,
            "test_types": {
                "unit_tests": {
                    "tests/test_unit.py": "def test_placeholder():\n    assert True\n",
                },
                "api_tests": {
                    "tests/test_api.py": "def test_health(test_client):\n    response = test_client.get(\"/health\")\n    assert response.status_code == 200\n",
                },
            },
            "test_config": {
                "pytest.ini": "[pytest]\ntestpaths = tests\n",
                "conftest.py": "import pytest\nfrom fastapi.testclient import TestClient\n\nfrom main import app\n\n\n@pytest.fixture\ndef test_client():\n    return TestClient(app)\n",
            },
            "quality_checks": { "coverage_target": 90 },
            "status": "generated",
        }))
    }
}

// ==================== devops ====================

/// Deployment artifact scaffolding.
#[derive(Debug, Clone, Default)]
pub struct DevopsProvider;

#[async_trait]
impl CapabilityProvider for DevopsProvider {
    fn name(&self) -> &str {
        "devops"
    }

    fn description(&self) -> &str {
        "Generates container and CI deployment configuration"
    }

    fn task_kinds(&self) -> &[&str] {
        &["create_deployment"]
    }

    async fn execute(&self, task: &Task) -> Result<Value, DispatchError> {
        let spec = task.object_param("project_spec")?;
        let name = name_or(&spec, &["name"], "default_project");
        let port = spec.get("port").and_then(Value::as_u64).unwrap_or(8000);

        Ok(json!({
            "project_name": name,
            "docker": {
                "dockerfile": format!(
                    "FROM python:3.11-slim\n\nWORKDIR /app\n\nCOPY requirements.txt .\nRUN pip install -r requirements.txt\n\nCOPY . .\n\nEXPOSE {port}\n\nCMD [\"python\", \"main.py\"]\n"
                ),
                "dockerignore": "__pycache__\n.venv\n.git\n.env\n",
            },
            "ci_cd": {
                "github_actions": "name: CI\non: [push, pull_request]\njobs:\n  test:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4\n      - uses: actions/setup-python@v5\n        with:\n          python-version: \"3.11\"\n      - run: pip install -r requirements.txt\n      - run: pytest\n",
            },
            "status": "generated",
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_names() {
        let endpoint = |method: &str, path: &str| Endpoint {
            method: method.to_string(),
            path: path.to_string(),
        };
        assert_eq!(endpoint("GET", "/").handler_name(), "get_root");
        assert_eq!(endpoint("POST", "/users/{id}").handler_name(), "post_users_id");
    }

    #[tokio::test]
    async fn test_create_api_frameworks() {
        let task = Task::new("create_api").with_param(
            "api_spec",
            json!({ "name": "todo", "framework": "Flask", "endpoints": [{ "path": "/todos" }] }),
        );
        let value = DeveloperProvider::create_api(&task).unwrap();
        assert_eq!(value["framework"], "flask");
        assert!(value["code"].as_str().unwrap().contains("@app.route(\"/todos\", methods=[\"GET\"])"));

        let task = Task::new("create_api").with_param("api_spec", json!({ "framework": "rails" }));
        assert!(matches!(
            DeveloperProvider::create_api(&task),
            Err(DispatchError::Unsupported(_))
        ));
    }

    #[test]
    fn test_generate_structure_defaults() {
        let value = DeveloperProvider::generate_structure(&Task::new("generate_structure")).unwrap();
        assert_eq!(value["project_name"], "default_project");
        assert_eq!(value["status"], "generated");
        assert!(value["files"]["README.md"].is_string());
    }

    #[tokio::test]
    async fn test_plan_then_monitor() {
        let provider = ProjectManagerProvider::default();

        let plan = provider
            .execute(&Task::new("create_plan").with_param("requirements", json!({ "name": "shop" })))
            .await
            .unwrap();
        assert_eq!(plan["status"], "planned");

        let status = provider
            .execute(&Task::new("monitor").with_param("project_name", "shop"))
            .await
            .unwrap();
        assert_eq!(status["current_phase"], "Planning");

        let missing = provider
            .execute(&Task::new("monitor").with_param("project_name", "other"))
            .await
            .unwrap();
        assert_eq!(missing["status"], "not_found");
    }

    #[tokio::test]
    async fn test_devops_port() {
        let value = DevopsProvider
            .execute(&Task::new("create_deployment").with_param("project_spec", json!({ "name": "svc", "port": 9000 })))
            .await
            .unwrap();
        assert!(value["docker"]["dockerfile"].as_str().unwrap().contains("EXPOSE 9000"));
    }

    #[tokio::test]
    async fn test_qa_project_name() {
        let value = QaProvider
            .execute(&Task::new("create_tests").with_param("code_structure", json!({ "project_name": "shop" })))
            .await
            .unwrap();
        assert_eq!(value["project_name"], "shop");
    }
}
