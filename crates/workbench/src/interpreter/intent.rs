//! Intent classification.
//!
//! A message is classified by walking [`INTENT_RULES`] in order; the first
//! rule whose keyword family appears in the message wins. Keywords match
//! whole words, case-insensitively, in the message's prose only: file
//! references, quoted spans and fenced code blocks are ignored.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use super::markup::{TAG_MARKER, strip_code_blocks};

/// What a message asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Preview files before an edit
    Edit,
    /// Show file contents
    View,
    /// Report file statistics
    Analyze,
    /// Apply a `replace "x" with "y"` directive
    Replace,
    /// Execute code in the sandbox
    Run,
    /// Nothing matched
    Fallback,
}

/// One row of the classification table.
#[derive(Debug)]
pub struct IntentRule {
    /// Intent selected when this rule matches
    pub intent: Intent,
    /// Whole-word keywords, lowercase
    pub keywords: &'static [&'static str],
}

impl IntentRule {
    /// Whether any keyword occurs in the scanned message.
    pub fn matches(&self, scan: &MessageScan) -> bool {
        self.keywords.iter().any(|k| scan.has_word(k))
    }
}

/// Classification rules, highest priority first.
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Edit,
        keywords: &["edit", "modify", "change", "update", "refactor", "rename", "fix"],
    },
    IntentRule {
        intent: Intent::View,
        keywords: &["show", "view", "display", "open", "read", "cat"],
    },
    IntentRule {
        intent: Intent::Analyze,
        keywords: &["analyze", "analyse", "analysis", "inspect", "review", "stats", "structure"],
    },
    IntentRule {
        intent: Intent::Replace,
        keywords: &["replace"],
    },
    IntentRule {
        intent: Intent::Run,
        keywords: &["run", "execute"],
    },
];

/// Lowercased prose words of a message.
#[derive(Debug, Default)]
pub struct MessageScan {
    words: HashSet<String>,
}

impl MessageScan {
    /// Scan `message`, skipping code blocks, quoted spans and `@` tokens.
    pub fn new(message: &str) -> Self {
        let prose = strip_code_blocks(message);
        let prose = strip_quoted(&prose);
        let words = prose
            .split_whitespace()
            .filter(|token| !token.starts_with(TAG_MARKER))
            .flat_map(|token| token.split(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { words }
    }

    /// Whether `word` occurs as a whole word.
    pub fn has_word(&self, word: &str) -> bool {
        self.words.contains(word)
    }
}

/// Classify a message.
pub fn classify(message: &str) -> Intent {
    let scan = MessageScan::new(message);
    INTENT_RULES
        .iter()
        .find(|rule| rule.matches(&scan))
        .map_or(Intent::Fallback, |rule| rule.intent)
}

/// A parsed `replace "<search>" with "<replace>"` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceDirective {
    /// Text to look for
    pub search: String,
    /// Text to put in its place
    pub replace: String,
}

static REPLACE_DIRECTIVE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)\breplace\s+"([^"]*)"\s+with\s+"([^"]*)""#).ok());

/// Parse the first replace directive in a message.
pub fn parse_replace_directive(message: &str) -> Option<ReplaceDirective> {
    let captures = REPLACE_DIRECTIVE.as_ref()?.captures(message)?;
    Some(ReplaceDirective {
        search: captures.get(1)?.as_str().to_string(),
        replace: captures.get(2)?.as_str().to_string(),
    })
}

/// Remove `"..."` and `` `...` `` spans. An unmatched quote is kept.
fn strip_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(['"', '`']) {
        let quote = &rest[start..start + 1];
        let after = &rest[start + 1..];
        let Some(end) = after.find(quote) else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push(' ');
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
