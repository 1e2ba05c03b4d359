//! Per-language runners.
//!
//! A runner knows which container image hosts its language and how to turn
//! a source snippet into the container's command line. Adding a language
//! means adding one [`LanguageRunner`] and registering it.

use std::fmt;
use std::sync::Arc;

/// How to run snippets of one language inside a container.
pub trait LanguageRunner: Send + Sync + fmt::Debug {
    /// Canonical language name reported in results (`python`, `javascript`).
    fn language(&self) -> &str;

    /// Other names accepted for this language.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// File extensions (without the dot) holding source in this language.
    fn extensions(&self) -> &[&str] {
        &[]
    }

    /// Container image providing the interpreter.
    fn image(&self) -> &str;

    /// Command that evaluates `code` inside the container.
    fn command(&self, code: &str) -> Vec<String>;

    /// Whether `name` refers to this runner's language.
    fn accepts(&self, name: &str) -> bool {
        self.language().eq_ignore_ascii_case(name)
            || self.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Python 3 via `python -c`.
#[derive(Debug, Clone)]
pub struct PythonRunner {
    image: String,
}

impl PythonRunner {
    /// Default image.
    pub const IMAGE: &'static str = "python:3.11-slim";

    /// Use a custom image.
    pub fn with_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl Default for PythonRunner {
    fn default() -> Self {
        Self::with_image(Self::IMAGE)
    }
}

impl LanguageRunner for PythonRunner {
    fn language(&self) -> &str {
        "python"
    }

    fn aliases(&self) -> &[&str] {
        &["py", "python3"]
    }

    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn image(&self) -> &str {
        &self.image
    }

    fn command(&self, code: &str) -> Vec<String> {
        vec!["python".to_string(), "-c".to_string(), code.to_string()]
    }
}

/// JavaScript on Node.js via `node -e`.
#[derive(Debug, Clone)]
pub struct NodeRunner {
    image: String,
}

impl NodeRunner {
    /// Default image.
    pub const IMAGE: &'static str = "node:18-slim";

    /// Use a custom image.
    pub fn with_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl Default for NodeRunner {
    fn default() -> Self {
        Self::with_image(Self::IMAGE)
    }
}

impl LanguageRunner for NodeRunner {
    fn language(&self) -> &str {
        "javascript"
    }

    fn aliases(&self) -> &[&str] {
        &["js", "node", "nodejs"]
    }

    fn extensions(&self) -> &[&str] {
        &["js", "mjs", "cjs"]
    }

    fn image(&self) -> &str {
        &self.image
    }

    fn command(&self, code: &str) -> Vec<String> {
        vec!["node".to_string(), "-e".to_string(), code.to_string()]
    }
}

/// Table of registered runners, searched in registration order.
#[derive(Debug, Clone, Default)]
pub struct RunnerRegistry {
    runners: Vec<Arc<dyn LanguageRunner>>,
}

impl RunnerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Python and JavaScript runners.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(PythonRunner::default())
            .with(NodeRunner::default())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, runner: impl LanguageRunner + 'static) -> Self {
        self.register(Arc::new(runner));
        self
    }

    /// Add a runner. Earlier registrations win on name clashes.
    pub fn register(&mut self, runner: Arc<dyn LanguageRunner>) {
        self.runners.push(runner);
    }

    /// Runner for a language name or alias.
    pub fn get(&self, language: &str) -> Option<Arc<dyn LanguageRunner>> {
        let language = language.trim();
        self.runners.iter().find(|r| r.accepts(language)).cloned()
    }

    /// Runner for a file extension (with or without the leading dot).
    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn LanguageRunner>> {
        let extension = extension.trim_start_matches('.');
        self.runners
            .iter()
            .find(|r| {
                r.extensions()
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(extension))
            })
            .cloned()
    }

    /// Canonical names of all registered languages.
    pub fn languages(&self) -> Vec<String> {
        self.runners.iter().map(|r| r.language().to_string()).collect()
    }
}
