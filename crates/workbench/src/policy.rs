//! Visibility policy for project files.
//!
//! Paths are checked relative to the project root (`src/main.py`, never
//! absolute). Rules are evaluated in order and the first match decides.

/// The kind of access being checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Reading file contents
    Read,
    /// Seeing an entry in a listing, tree or autocomplete result
    List,
    /// Creating or modifying a file
    Write,
}

impl Operation {
    const ALL: &'static [Operation] = &[Operation::Read, Operation::List, Operation::Write];
    const WRITES: &'static [Operation] = &[Operation::Write];
}

/// Outcome of checking one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Access granted
    Allow,
    /// Access refused, with a message naming the path
    Deny(String),
}

impl PolicyDecision {
    /// Shorthand for `matches!(self, PolicyDecision::Allow)`.
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }
}

/// Decides which project-relative paths an operation may touch.
///
/// Consulted for every file operation and for every entry of a directory
/// walk.
pub trait PolicyHandler: Send + Sync + std::fmt::Debug {
    /// Check whether `operation` may touch the project-relative `path`.
    fn check_access(&self, path: &str, operation: Operation) -> PolicyDecision;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Effect {
    Allow,
    Deny,
}

#[derive(Clone, Debug)]
struct Rule {
    pattern: glob::Pattern,
    applies_to: &'static [Operation],
    effect: Effect,
}

/// Ordered glob rules with a fallback effect.
#[derive(Clone, Debug)]
pub struct Policy {
    rules: Vec<Rule>,
    fallback: Effect,
}

impl Policy {
    /// Everything inside a project is visible except dot-entries, at any
    /// depth.
    pub fn project() -> Self {
        PolicyBuilder::allow_by_default().hide(".*").build()
    }

    /// What survives copying a directory into a new project: no
    /// dot-entries and no build or dependency caches.
    pub fn import() -> Self {
        BUILD_CACHE_DIRS
            .iter()
            .fold(PolicyBuilder::allow_by_default().hide(".*"), |b, dir| {
                b.hide(dir)
            })
            .build()
    }
}

/// Directory names skipped when importing a project.
pub const BUILD_CACHE_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    "target",
    "dist",
    "build",
    ".venv",
    "venv",
];

impl PolicyHandler for Policy {
    fn check_access(&self, path: &str, operation: Operation) -> PolicyDecision {
        let effect = self
            .rules
            .iter()
            .find(|rule| rule.applies_to.contains(&operation) && rule.pattern.matches(path))
            .map_or(self.fallback, |rule| rule.effect);

        match effect {
            Effect::Allow => PolicyDecision::Allow,
            Effect::Deny => PolicyDecision::Deny(format!("{path} is not accessible")),
        }
    }
}

/// Fluent construction of a [`Policy`].
///
/// ```rust
/// use workbench::policy::{Operation, PolicyBuilder, PolicyHandler};
///
/// let policy = PolicyBuilder::allow_by_default()
///     .hide(".*")
///     .read_only("docs/**")
///     .build();
///
/// assert!(!policy.check_access("src/.env", Operation::Read).is_allowed());
/// assert!(policy.check_access("docs/a.md", Operation::Read).is_allowed());
/// assert!(!policy.check_access("docs/a.md", Operation::Write).is_allowed());
/// ```
#[derive(Clone, Debug)]
pub struct PolicyBuilder {
    rules: Vec<Rule>,
    fallback: Effect,
}

impl PolicyBuilder {
    /// Paths no rule mentions are refused.
    pub fn deny_by_default() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Effect::Deny,
        }
    }

    /// Paths no rule mentions are accessible.
    pub fn allow_by_default() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Effect::Allow,
        }
    }

    fn rule(mut self, pattern: &str, applies_to: &'static [Operation], effect: Effect) -> Self {
        match glob::Pattern::new(pattern) {
            Ok(pattern) => self.rules.push(Rule {
                pattern,
                applies_to,
                effect,
            }),
            Err(e) => tracing::warn!(%pattern, error = %e, "ignoring invalid policy pattern"),
        }
        self
    }

    /// Grant every operation on paths matching `pattern`.
    pub fn allow(self, pattern: &str) -> Self {
        self.rule(pattern, Operation::ALL, Effect::Allow)
    }

    /// Refuse writes to paths matching `pattern`.
    pub fn read_only(self, pattern: &str) -> Self {
        self.rule(pattern, Operation::WRITES, Effect::Deny)
    }

    /// Hide every entry whose name matches `name`, at any depth, together
    /// with everything beneath it.
    ///
    /// `hide(".*")` covers `.git`, `src/.env` and `.git/config` alike.
    pub fn hide(self, name: &str) -> Self {
        [
            name.to_string(),
            format!("{name}/**"),
            format!("**/{name}"),
            format!("**/{name}/**"),
        ]
        .iter()
        .fold(self, |b, p| b.rule(p, Operation::ALL, Effect::Deny))
    }

    /// Finish the policy.
    pub fn build(self) -> Policy {
        Policy {
            rules: self.rules,
            fallback: self.fallback,
        }
    }
}
