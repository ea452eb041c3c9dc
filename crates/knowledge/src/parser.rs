//! Source file parsing and text extraction.
//!
//! Form feed characters (`\x0c`) split a file into pages; page numbers are
//! 1-based and survive blank pages being dropped.

use grounded_core::{AppError, AppResult};
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    Code,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("rs") | Some("py") | Some("js") | Some("ts") | Some("go") | Some("c")
            | Some("cpp") | Some("java") | Some("sh") | Some("yaml") | Some("yml")
            | Some("json") | Some("toml") => Self::Code,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Code => "code",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

/// Cleaned text of one source file.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub content_type: ContentType,
    /// Non-empty pages in order
    pub pages: Vec<Page>,
}

impl ParsedDocument {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Parse raw file contents already read from `path`.
pub fn parse_text(path: &Path, raw: &str) -> AppResult<ParsedDocument> {
    let content_type = ContentType::from_path(path);

    if content_type == ContentType::Unknown && !is_likely_text(raw) {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Knowledge(format!(
            "Binary file not supported: {:?}",
            path
        )));
    }

    let pages = raw
        .split('\u{000C}')
        .enumerate()
        .map(|(i, page)| Page {
            number: i as u32 + 1,
            text: clean(content_type, page),
        })
        .filter(|page| !page.text.is_empty())
        .collect();

    Ok(ParsedDocument {
        content_type,
        pages,
    })
}

/// Read and parse a source file.
pub fn parse_file(path: &Path) -> AppResult<ParsedDocument> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;
    parse_text(path, &raw)
}

fn clean(content_type: ContentType, text: &str) -> String {
    match content_type {
        ContentType::Markdown => clean_markdown(text),
        ContentType::Html => clean_html(text),
        ContentType::Code => clean_code(text),
        ContentType::PlainText | ContentType::Unknown => text.trim().to_string(),
    }
}

/// Drop heading markers, rules and fences, keep prose.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Strip tags plus script and style bodies, collapse whitespace.
fn clean_html(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skip_body = false;

    for (i, ch) in text.char_indices() {
        match ch {
            '<' => {
                in_tag = true;
                let rest = &lower[i..];
                if rest.starts_with("<script") || rest.starts_with("<style") {
                    skip_body = true;
                } else if rest.starts_with("</script") || rest.starts_with("</style") {
                    skip_body = false;
                }
            }
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag && !skip_body => result.push(ch),
            _ => {}
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove blank lines and whole-line comments.
fn clean_code(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            ContentType::from_path(Path::new("file.MD")),
            ContentType::Markdown
        );
        assert_eq!(
            ContentType::from_path(Path::new("file.rs")),
            ContentType::Code
        );
        assert_eq!(
            ContentType::from_path(Path::new("file.txt")),
            ContentType::PlainText
        );
        assert_eq!(
            ContentType::from_path(Path::new("file.bin")),
            ContentType::Unknown
        );
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.contains("Header"));
        assert!(output.contains("Some text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><head><style>p { color: red; }</style></head><body><p>Hello <b>world</b></p></body></html>";
        assert_eq!(clean_html(input), "Hello world");
    }

    #[test]
    fn test_clean_html_non_ascii() {
        let input = "<p>Garantia é de <b>2 anos</b></p>";
        assert_eq!(clean_html(input), "Garantia é de 2 anos");
    }

    #[test]
    fn test_clean_code() {
        let input = "// Comment\nfn main() {\n    println!(\"hello\");\n}";
        let output = clean_code(input);
        assert!(!output.contains("// Comment"));
        assert!(output.contains("fn main()"));
    }

    #[test]
    fn test_form_feed_pages() {
        let doc = parse_text(
            Path::new("manual.txt"),
            "Intro page\u{000C}\u{000C}Warranty is 2 years",
        )
        .unwrap();

        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].number, 1);
        assert_eq!(doc.pages[1].number, 3);
        assert_eq!(doc.pages[1].text, "Warranty is 2 years");
    }

    #[test]
    fn test_binary_unknown_rejected() {
        assert!(parse_text(Path::new("blob.bin"), "abc\0def").is_err());
        assert!(parse_text(Path::new("notes"), "plain words").is_ok());
    }
}
