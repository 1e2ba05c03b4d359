//! Lightweight message markup: `@file` references and fenced code blocks.

/// Marker that starts a file reference token.
pub const TAG_MARKER: char = '@';

const FENCE: &str = "```";

/// Punctuation trimmed from the end of a reference token.
const TRAILING_PUNCTUATION: &[char] = &[',', ';', ':', '!', '?', ')', '.'];

/// A fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string after the opening fence, if any (`python`, `js`)
    pub language: Option<String>,
    /// Block contents
    pub code: String,
}

/// Extract file references (`@path` tokens) from a message.
///
/// References are deduplicated but keep their first-seen order. Tokens
/// inside fenced code blocks are ignored, so decorators like
/// `@app.route` in pasted code are not mistaken for files.
pub fn extract_file_tags(message: &str) -> Vec<String> {
    let prose = strip_code_blocks(message);
    let mut tags: Vec<String> = Vec::new();
    for token in prose.split_whitespace() {
        let Some(path) = token.strip_prefix(TAG_MARKER) else {
            continue;
        };
        let path = path.trim_end_matches(TRAILING_PUNCTUATION);
        if path.is_empty() || tags.iter().any(|t| t == path) {
            continue;
        }
        tags.push(path.to_string());
    }
    tags
}

/// The first fenced code block in a message.
pub fn first_code_block(message: &str) -> Option<CodeBlock> {
    let start = message.find(FENCE)? + FENCE.len();
    let rest = &message[start..];
    let (info, body) = rest.split_once('\n').unwrap_or(("", rest));
    let end = body.find(FENCE)?;
    let language = info.trim();
    Some(CodeBlock {
        language: (!language.is_empty()).then(|| language.to_lowercase()),
        code: body[..end].to_string(),
    })
}

/// The message with every fenced code block removed. An unterminated fence
/// swallows the rest of the message.
pub fn strip_code_blocks(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(start) = rest.find(FENCE) {
        out.push_str(&rest[..start]);
        out.push(' ');
        let after = &rest[start + FENCE.len()..];
        match after.find(FENCE) {
            Some(end) => rest = &after[end + FENCE.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_dedup_in_order() {
        assert_eq!(
            extract_file_tags("compare @b.py with @a.py and again @b.py"),
            vec!["b.py", "a.py"]
        );
    }

    #[test]
    fn test_tags_trim_trailing_punctuation() {
        assert_eq!(
            extract_file_tags("look at @src/app.py, @lib.rs. (and @x.txt)"),
            vec!["src/app.py", "lib.rs", "x.txt"]
        );
    }

    #[test]
    fn test_tags_require_token_prefix() {
        assert!(extract_file_tags("mail me at user@example.com").is_empty());
        assert!(extract_file_tags("a lone @ sign").is_empty());
    }

    #[test]
    fn test_tags_ignore_code_blocks() {
        let message = "run @main.py\n```python\n@app.route('/')\ndef index(): pass\n```";
        assert_eq!(extract_file_tags(message), vec!["main.py"]);
    }

    #[test]
    fn test_first_code_block() {
        let block = first_code_block("please run\n```Python\nprint('hi')\n```\nthanks").unwrap_or_else(|| {
            panic!("expected a code block")
        });
        assert_eq!(block.language.as_deref(), Some("python"));
        assert_eq!(block.code, "print('hi')\n");
    }

    #[test]
    fn test_code_block_without_language() {
        let block = first_code_block("```\n1 + 1\n```");
        assert_eq!(
            block,
            Some(CodeBlock {
                language: None,
                code: "1 + 1\n".to_string()
            })
        );
    }

    #[test]
    fn test_unterminated_block() {
        assert_eq!(first_code_block("```python\nprint(1)"), None);
        assert_eq!(strip_code_blocks("before ```python\nprint(1)").trim(), "before");
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(
            strip_code_blocks("a ```x``` b ```y``` c").split_whitespace().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }
}
