use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use workbench::{Health, Workbench};

use crate::error::ApiError;
use crate::{agents, files, projects};

/// Build the application router over `workbench`.
pub fn router(workbench: Workbench) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/:id", get(projects::get_project))
        .route(
            "/conversations",
            get(projects::list_conversations).post(projects::create_conversation),
        )
        .route("/conversations/:id", get(projects::get_conversation))
        .route("/conversations/:id/messages", post(projects::send_message))
        .route("/files/read", post(files::read_file))
        .route("/files/create", post(files::create_file))
        .route("/files/edit", post(files::edit_file))
        .route("/files/search-replace", post(files::search_replace))
        .route("/files/list/:project_id", get(files::list_files))
        .route("/files/tree/:project_id", get(files::file_tree))
        .route("/files/autocomplete/:project_id", get(files::autocomplete))
        .route("/agents", get(agents::list_agents))
        .route("/agents/:agent_name/execute", post(agents::execute_task))
        .with_state(workbench)
        .layer(cors)
}

/// `GET /health`
pub async fn health(State(workbench): State<Workbench>) -> Result<Json<Health>, ApiError> {
    workbench
        .health()
        .await
        .map(Json)
        .map_err(ApiError::from)
}

/// HTTP server hosting one [`Workbench`].
#[derive(Debug)]
pub struct WorkbenchServer {
    addr: SocketAddr,
    workbench: Workbench,
}

impl WorkbenchServer {
    /// Create a server that will listen on `addr`.
    pub fn new(addr: SocketAddr, workbench: Workbench) -> Self {
        Self { addr, workbench }
    }

    /// Run the server until Ctrl+C or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Starting HTTP server on {}", listener.local_addr()?);

        axum::serve(listener, router(self.workbench))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM. A handler that cannot be
/// installed never fires.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Ctrl+C handler unavailable");
                std::future::pending::<()>().await;
            }
            "ctrl-c"
        }
        () = terminate => "sigterm",
    };
    tracing::info!(signal = received, "shutting down workbench server");
}
