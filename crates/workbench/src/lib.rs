//! Workbench: project files, sandboxed execution and chat-driven commands
//!
//! A long-running service hosts many projects, each a rooted directory tree.
//! Free-form conversation messages are interpreted into confined file
//! operations or code runs inside disposable containers, and higher-level
//! callers reach the same capabilities through a named-agent dispatcher.

pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod interpreter;
pub mod limits;
pub mod policy;
pub mod project;
pub mod sandbox;
pub mod store;

mod service;

pub use config::{SandboxConfig, WorkbenchConfig};
pub use conversation::{Conversation, ConversationError, ConversationLog, Message, Role};
pub use dispatch::{AgentDispatcher, CapabilityProvider, DispatchError, Task, TaskOutput};
pub use interpreter::{CommandInterpreter, Intent, InterpreterError, Reply};
pub use limits::ResourceLimits;
pub use project::{FileError, NewProject, Project, ProjectError, ProjectFiles, ProjectRegistry, WriteMode};
pub use sandbox::{ExecutionEngine, ExecutionRequest, ExecutionResult, ExecutionStatus};
pub use service::{Health, Workbench, WorkbenchError};
