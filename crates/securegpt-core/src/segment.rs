//! Splitting model output into prose and fenced code spans

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Language reported for a fence without a tag
pub const DEFAULT_LANGUAGE: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    Code,
}

/// One span of a segmented response, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub content: String,
    /// Only set for code segments
    pub language: Option<String>,
}

impl Segment {
    fn text(content: &str) -> Self {
        Self {
            kind: SegmentKind::Text,
            content: content.to_string(),
            language: None,
        }
    }

    fn code(content: &str, language: &str) -> Self {
        let language = if language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            language
        };
        Self {
            kind: SegmentKind::Code,
            content: content.to_string(),
            language: Some(language.to_string()),
        }
    }

    pub fn is_code(&self) -> bool {
        self.kind == SegmentKind::Code
    }
}

/// Opening fence with optional tag, body, closing fence on its own line start.
/// The body is optional and tried last, so an empty block closes at its own
/// fence instead of running into the next one.
fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*([\w+#.-]*)[ \t]*\r?\n(?:(.*?)\r?\n)??```")
            .expect("fence pattern is valid")
    })
}

/// Byte ranges of every complete fenced block, delimiters included
pub fn fenced_ranges(text: &str) -> Vec<Range<usize>> {
    fence_regex().find_iter(text).map(|m| m.range()).collect()
}

/// Split `text` into alternating prose and code segments.
///
/// Empty prose between or around fences is omitted. A fence without a
/// matching closing fence is left as prose.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last_end = 0;

    for caps in fence_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };

        let before = &text[last_end..whole.start()];
        if !before.is_empty() {
            segments.push(Segment::text(before));
        }

        let language = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        segments.push(Segment::code(body, language));

        last_end = whole.end();
    }

    if last_end < text.len() {
        segments.push(Segment::text(&text[last_end..]));
    }

    segments
}

/// Only the code segments of `text`, in document order
pub fn code_blocks(text: &str) -> Vec<Segment> {
    segment(text).into_iter().filter(Segment::is_code).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(segments: &[Segment]) -> String {
        segments.iter().map(|s| s.content.as_str()).collect()
    }

    #[test]
    fn test_no_fences_is_single_text_segment() {
        let input = "Use a salted hash.\nNever store plaintext.";
        let segments = segment(input);
        assert_eq!(segments, vec![Segment::text(input)]);
    }

    #[test]
    fn test_empty_input_has_no_segments() {
        assert!(segment("").is_empty());
    }

    #[test]
    fn test_only_a_code_block() {
        let segments = segment("```python\nprint(1)\n```");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, SegmentKind::Code);
        assert_eq!(segments[0].content, "print(1)");
        assert_eq!(segments[0].language.as_deref(), Some("python"));
    }

    #[test]
    fn test_prose_around_code() {
        let input = "Intro\n```rust\nfn main() {}\n```\nOutro";
        let segments = segment(input);
        let kinds: Vec<_> = segments.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SegmentKind::Text, SegmentKind::Code, SegmentKind::Text]);
        assert_eq!(segments[0].content, "Intro\n");
        assert_eq!(segments[2].content, "\nOutro");
        assert_eq!(joined(&segments), "Intro\nfn main() {}\nOutro");
    }

    #[test]
    fn test_untagged_fence_uses_default_language() {
        let segments = segment("```\nls -la\n```");
        assert_eq!(segments[0].language.as_deref(), Some(DEFAULT_LANGUAGE));
    }

    #[test]
    fn test_unterminated_fence_stays_text() {
        let input = "Here:\n```bash\necho hi\n";
        assert_eq!(segment(input), vec![Segment::text(input)]);
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let input = "a\n```c\nint x;\n```\nb\n```c++\nauto y = 1;\n```";
        let segments = segment(input);
        let langs: Vec<_> = segments
            .iter()
            .filter_map(|s| s.language.as_deref())
            .collect();
        assert_eq!(langs, vec!["c", "c++"]);
        assert_eq!(joined(&segments), "a\nint x;\nb\nauto y = 1;");
    }

    #[test]
    fn test_multiline_body_is_preserved() {
        let body = "import bcrypt\n\nhashed = bcrypt.hashpw(pw, bcrypt.gensalt())";
        let input = format!("```python\n{}\n```", body);
        assert_eq!(code_blocks(&input)[0].content, body);
    }

    #[test]
    fn test_empty_block_does_not_swallow_next_block() {
        let segments = segment("```\n```\ntext\n```py\nx\n```");
        assert_eq!(
            segments,
            vec![
                Segment::code("", ""),
                Segment::text("\ntext\n"),
                Segment::code("x", "py"),
            ]
        );
    }

    #[test]
    fn test_fenced_ranges_cover_delimiters() {
        let input = "x ```sh\nid\n``` y";
        let ranges = fenced_ranges(input);
        assert_eq!(ranges.len(), 1);
        assert_eq!(&input[ranges[0].clone()], "```sh\nid\n```");
    }
}
