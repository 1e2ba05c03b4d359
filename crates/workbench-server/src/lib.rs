//! Workbench HTTP server
//!
//! Exposes projects, conversations, the File Tool and the agent dispatcher
//! of a [`workbench::Workbench`] as a JSON API. Handlers are public so they
//! can be exercised without a listening socket.

pub mod agents;
pub mod files;
pub mod projects;

mod error;
mod server;

pub use error::{ApiError, ApiErrorBody, ApiErrorResponse};
pub use server::{WorkbenchServer, health, router};
