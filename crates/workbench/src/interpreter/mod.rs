//! Command Interpreter.
//!
//! Maps one free-form message onto File Tool and Execution Engine calls and
//! writes exactly one assistant reply for it. The user message is appended
//! to the conversation before any work starts; failures inside a turn are
//! reported in the reply text rather than returned as errors.

mod intent;
mod markup;

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

pub use intent::{
    INTENT_RULES, Intent, IntentRule, MessageScan, ReplaceDirective, classify,
    parse_replace_directive,
};
pub use markup::{CodeBlock, TAG_MARKER, extract_file_tags, first_code_block, strip_code_blocks};

use crate::conversation::{ConversationError, ConversationLog, Message};
use crate::project::{FileError, ProjectError, ProjectFiles, ProjectRegistry};
use crate::sandbox::{ExecutionEngine, ExecutionRequest, ExecutionResult};

/// Language assumed for a fenced block without an info string.
pub const DEFAULT_LANGUAGE: &str = "python";

/// Most files listed in a reply before eliding the rest.
const LISTING_LIMIT: usize = 50;

const REPLACE_HINT: &str = "To change text, send: replace \"old text\" with \"new text\" in @path/to/file";

/// Errors that prevent a turn from being recorded at all.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// Unknown conversation
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    /// The conversation's project no longer exists
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    /// Conversation log failure
    #[error(transparent)]
    Conversation(ConversationError),
    /// Project registry failure
    #[error(transparent)]
    Project(ProjectError),
}

impl From<ConversationError> for InterpreterError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::NotFound(id) => InterpreterError::ConversationNotFound(id),
            other => InterpreterError::Conversation(other),
        }
    }
}

impl From<ProjectError> for InterpreterError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::NotFound(id) => InterpreterError::ProjectNotFound(id),
            other => InterpreterError::Project(other),
        }
    }
}

/// The assistant's answer to one message.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    /// Id of the appended assistant message
    pub message_id: String,
    /// Reply text
    pub response: String,
    /// File references found in the user message
    pub file_tags: Vec<String>,
    /// How the message was classified
    pub intent: Intent,
}

/// Interprets conversation messages against their project.
pub struct CommandInterpreter {
    projects: Arc<ProjectRegistry>,
    conversations: Arc<ConversationLog>,
    engine: Arc<ExecutionEngine>,
}

impl std::fmt::Debug for CommandInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandInterpreter")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl CommandInterpreter {
    /// Create an interpreter over shared registries and engine.
    pub fn new(
        projects: Arc<ProjectRegistry>,
        conversations: Arc<ConversationLog>,
        engine: Arc<ExecutionEngine>,
    ) -> Self {
        Self {
            projects,
            conversations,
            engine,
        }
    }

    /// Handle one user message in `conversation_id`.
    ///
    /// Appends the user message, then exactly one assistant message.
    pub async fn handle_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<Reply, InterpreterError> {
        let conversation = self.conversations.get(conversation_id).await?;
        let project = self.projects.get(&conversation.project_id).await?;

        let user = self
            .conversations
            .append(conversation_id, Message::user(text))
            .await?;
        let file_tags = user.file_tags;
        let intent = classify(text);

        let response = match project.files() {
            Ok(files) => self.respond(&files, intent, text, &file_tags).await,
            Err(e) => {
                tracing::warn!(project_id = %project.id, error = %e, "project files unavailable");
                format!(
                    "I couldn't open the files of project '{}': {e}. Please check that the project directory still exists.",
                    project.name
                )
            }
        };

        let reply = self
            .conversations
            .append(conversation_id, Message::assistant(response))
            .await?;
        tracing::debug!(conversation_id, ?intent, tags = file_tags.len(), "handled message");

        Ok(Reply {
            message_id: reply.id,
            response: reply.content,
            file_tags,
            intent,
        })
    }

    async fn respond(&self, files: &ProjectFiles, intent: Intent, text: &str, tags: &[String]) -> String {
        match intent {
            Intent::Edit => preview_for_edit(files, tags).await,
            Intent::View => view(files, tags).await,
            Intent::Analyze => analyze(files, tags).await,
            Intent::Replace => replace(files, text, tags).await,
            Intent::Run => self.run(files, text, tags).await,
            Intent::Fallback => fallback(files, tags).await,
        }
    }

    async fn run(&self, files: &ProjectFiles, text: &str, tags: &[String]) -> String {
        if let Some(block) = first_code_block(text) {
            let language = block.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
            let result = self
                .engine
                .execute(ExecutionRequest::new(block.code, language))
                .await;
            return format_execution("code block", &result);
        }

        if tags.is_empty() {
            return "What should I run? Paste code in a fenced block (```python ... ```) \
                    or reference a script with @, for example: run @main.py"
                .to_string();
        }

        let mut out = String::new();
        for tag in tags {
            let extension = Path::new(tag)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some(runner) = self.engine.runners().for_extension(&extension) else {
                let _ = writeln!(out, "❌ {tag}: no runner for this file type\n");
                continue;
            };
            match files.read(tag).await {
                Ok(code) => {
                    let request = ExecutionRequest::new(code, runner.language());
                    let result = self.engine.execute(request).await;
                    out.push_str(&format_execution(tag, &result));
                    out.push('\n');
                }
                Err(e) => {
                    let _ = writeln!(out, "❌ {tag}: {}\n", describe_file_error(&e));
                }
            }
        }
        out.trim_end().to_string()
    }
}

async fn preview_for_edit(files: &ProjectFiles, tags: &[String]) -> String {
    if tags.is_empty() {
        return format!(
            "Which file should I edit? Reference it with @, for example: edit @src/app.py\n\n{REPLACE_HINT}"
        );
    }

    let mut out = String::from("Here is the current content. Nothing has been changed yet.\n\n");
    for tag in tags {
        out.push_str(&render_file(files, tag).await);
    }
    out.push_str(REPLACE_HINT);
    out
}

async fn view(files: &ProjectFiles, tags: &[String]) -> String {
    if tags.is_empty() {
        return format!(
            "Which file would you like to see? Reference it with @, for example: show @README.md\n\n{}",
            listing(files).await
        );
    }

    let mut out = String::new();
    for tag in tags {
        out.push_str(&render_file(files, tag).await);
    }
    out.trim_end().to_string()
}

async fn analyze(files: &ProjectFiles, tags: &[String]) -> String {
    if tags.is_empty() {
        return match files.tree().await {
            Ok(tree) => {
                let total: u64 = tree.iter().map(|f| f.size).sum();
                format!(
                    "The project has {} files ({total} bytes). Reference files with @ to analyze them, for example: analyze @src/app.py",
                    tree.len()
                )
            }
            Err(e) => format!("I couldn't walk the project: {}", describe_file_error(&e)),
        };
    }

    let mut out = String::new();
    for tag in tags {
        match files.read(tag).await {
            Ok(content) => {
                let _ = write!(
                    out,
                    "📊 {tag}: {} lines, {} bytes",
                    content.lines().count(),
                    content.len()
                );
                let counts = structure_counts(tag, &content);
                if !counts.is_empty() {
                    let parts: Vec<_> = counts.iter().map(|(label, n)| format!("{label}: {n}")).collect();
                    let _ = write!(out, "; {}", parts.join(", "));
                }
                out.push('\n');
            }
            Err(e) => {
                let _ = writeln!(out, "❌ {tag}: {}", describe_file_error(&e));
            }
        }
    }
    out.trim_end().to_string()
}

async fn replace(files: &ProjectFiles, text: &str, tags: &[String]) -> String {
    let Some(directive) = parse_replace_directive(text) else {
        return format!("I couldn't parse that replace command.\n\n{REPLACE_HINT}");
    };
    if tags.is_empty() {
        return format!(
            "Which files should I change? Tag them with @.\n\n{REPLACE_HINT}"
        );
    }

    let mut out = String::new();
    for tag in tags {
        // Each file is independent; a failure is reported and the rest proceed.
        match files
            .search_replace(tag, &directive.search, &directive.replace)
            .await
        {
            Ok(count) => {
                let noun = if count == 1 { "occurrence" } else { "occurrences" };
                let _ = writeln!(out, "✅ {tag}: replaced {count} {noun}");
            }
            Err(e) => {
                let _ = writeln!(out, "❌ {tag}: {}", describe_file_error(&e));
            }
        }
    }
    out.trim_end().to_string()
}

async fn fallback(files: &ProjectFiles, tags: &[String]) -> String {
    let mut out = String::from(
        "I can work with the files of this project:\n\
         • show @file to view it\n\
         • analyze @file for line, size and structure counts\n\
         • edit @file to preview it before changing it\n\
         • replace \"old\" with \"new\" in @file to change text\n\
         • run @script.py, or a fenced code block, to execute code in the sandbox\n\n",
    );
    if tags.is_empty() {
        out.push_str(&listing(files).await);
    } else {
        let _ = write!(
            out,
            "You referenced {}. What would you like me to do with {}?",
            tags.join(", "),
            if tags.len() == 1 { "it" } else { "them" }
        );
    }
    out
}

async fn render_file(files: &ProjectFiles, tag: &str) -> String {
    match files.read(tag).await {
        Ok(content) => {
            let fence_language = Path::new(tag)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            let newline = if content.ends_with('\n') { "" } else { "\n" };
            format!("📄 {tag}\n```{fence_language}\n{content}{newline}```\n\n")
        }
        Err(e) => format!("❌ {tag}: {}\n\n", describe_file_error(&e)),
    }
}

async fn listing(files: &ProjectFiles) -> String {
    match files.tree().await {
        Ok(tree) if tree.is_empty() => "The project has no files yet.".to_string(),
        Ok(tree) => {
            let mut out = String::from("Available files in your project:\n");
            for file in tree.iter().take(LISTING_LIMIT) {
                let _ = writeln!(out, "📄 {} ({} bytes)", file.path, file.size);
            }
            if tree.len() > LISTING_LIMIT {
                let _ = writeln!(out, "... and {} more", tree.len() - LISTING_LIMIT);
            }
            out.trim_end().to_string()
        }
        Err(e) => format!("I couldn't list the project files: {}", describe_file_error(&e)),
    }
}

fn format_execution(label: &str, result: &ExecutionResult) -> String {
    let mut out = format!("▶ {label} ({}): {}\n", result.language, result.status);
    if !result.output.is_empty() {
        let newline = if result.output.ends_with('\n') { "" } else { "\n" };
        let _ = write!(out, "```\n{}{newline}```\n", result.output);
    }
    if let Some(error) = &result.error
        && !result.is_success()
        && !result.output.contains(error.as_str())
    {
        let _ = writeln!(out, "{error}");
    }
    out
}

/// User-facing text for a File Tool failure.
fn describe_file_error(e: &FileError) -> String {
    match e {
        FileError::NotFound(_) => "file not found".to_string(),
        FileError::IsDirectory(_) => "is a directory".to_string(),
        FileError::NotADirectory(_) => "not a directory".to_string(),
        FileError::PathEscape(_) => "path is outside the project".to_string(),
        FileError::AlreadyExists(_) => "already exists".to_string(),
        FileError::TextNotFound(_) => "text not found".to_string(),
        FileError::EmptySearch => "search text is empty".to_string(),
        FileError::Denied(_) => "access to this path is not allowed".to_string(),
        FileError::Io(e) => format!("I/O error ({e})"),
    }
}

/// Literal keywords counted per file extension.
const STRUCTURE_PATTERNS: &[(&[&str], &[(&str, &str)])] = &[
    (&["py"], &[("functions", "def "), ("classes", "class ")]),
    (
        &["js", "mjs", "cjs", "jsx", "ts", "tsx"],
        &[("functions", "function "), ("classes", "class ")],
    ),
    (&["rs"], &[("functions", "fn "), ("structs", "struct "), ("enums", "enum ")]),
    (&["go"], &[("functions", "func "), ("types", "type ")]),
    (&["java", "kt", "cs"], &[("classes", "class "), ("interfaces", "interface ")]),
    (&["rb"], &[("methods", "def "), ("classes", "class ")]),
];

/// Naive structural counts for recognized source files.
///
/// Advisory only: counts literal keyword occurrences, so comments and
/// strings are included.
pub fn structure_counts(path: &str, content: &str) -> Vec<(&'static str, usize)> {
    let Some(extension) = Path::new(path).extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return Vec::new();
    };
    STRUCTURE_PATTERNS
        .iter()
        .find(|(extensions, _)| extensions.contains(&extension.as_str()))
        .map(|(_, patterns)| {
            patterns
                .iter()
                .map(|(label, needle)| (*label, content.matches(*needle).count()))
                .collect()
        })
        .unwrap_or_default()
}
