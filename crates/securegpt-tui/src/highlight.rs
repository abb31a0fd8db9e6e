use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const THEME_NAME: &str = "base16-ocean.dark";

/// Syntax definitions and theme, loaded once
struct SyntectAssets {
    syntax_set: SyntaxSet,
    theme: Theme,
}

fn assets() -> &'static SyntectAssets {
    static ASSETS: OnceLock<SyntectAssets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .get(THEME_NAME)
            .or_else(|| theme_set.themes.values().next())
            .cloned()
            .unwrap_or_default();
        SyntectAssets { syntax_set, theme }
    })
}

/// Map fence tags people actually write to names syntect knows
fn normalize_language(lang: &str) -> String {
    match lang.to_lowercase().as_str() {
        "py" | "python3" => "python".to_string(),
        "js" | "node" => "javascript".to_string(),
        "ts" => "typescript".to_string(),
        "rs" => "rust".to_string(),
        "sh" | "shell" | "zsh" | "console" => "bash".to_string(),
        "yml" => "yaml".to_string(),
        "ps1" | "powershell" => "ps1".to_string(),
        "cpp" | "c++" => "cpp".to_string(),
        "cs" | "csharp" => "cs".to_string(),
        "rb" => "ruby".to_string(),
        "golang" => "go".to_string(),
        other => other.to_string(),
    }
}

fn to_ratatui(style: syntect::highlighting::Style) -> Style {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    out
}

fn plain_line(line: &str) -> Line<'static> {
    Line::from(Span::styled(
        line.trim_end_matches(['\n', '\r']).to_string(),
        Style::default().fg(Color::Gray),
    ))
}

/// Highlight a whole code block, one ratatui line per source line
pub fn highlight_block(code: &str, language: &str) -> Vec<Line<'static>> {
    let assets = assets();
    let lang = normalize_language(language);
    let syntax = assets
        .syntax_set
        .find_syntax_by_token(&lang)
        .or_else(|| assets.syntax_set.find_syntax_by_extension(&lang));

    let Some(syntax) = syntax else {
        return code.lines().map(plain_line).collect();
    };

    let mut highlighter = HighlightLines::new(syntax, &assets.theme);
    LinesWithEndings::from(code)
        .map(|line| match highlighter.highlight_line(line, &assets.syntax_set) {
            Ok(ranges) => Line::from(
                ranges
                    .into_iter()
                    .filter_map(|(style, text)| {
                        let text = text.trim_end_matches(['\n', '\r']);
                        (!text.is_empty()).then(|| Span::styled(text.to_string(), to_ratatui(style)))
                    })
                    .collect::<Vec<_>>(),
            ),
            Err(_) => plain_line(line),
        })
        .collect()
}

fn cache_key(code: &str, language: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    (language, code).hash(&mut hasher);
    hasher.finish()
}

/// Highlighted blocks keyed by content, so redraws don't re-run syntect
#[derive(Default)]
pub struct HighlightCache {
    entries: HashMap<u64, Vec<Line<'static>>>,
}

impl HighlightCache {
    pub fn get(&mut self, code: &str, language: &str) -> &[Line<'static>] {
        self.entries
            .entry(cache_key(code, language))
            .or_insert_with(|| highlight_block(code, language))
    }

    /// Keep only the given `(language, code)` blocks
    pub fn retain_blocks<'a>(&mut self, blocks: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let keep: HashSet<u64> = blocks
            .into_iter()
            .map(|(language, code)| cache_key(code, language))
            .collect();
        self.entries.retain(|key, _| keep.contains(key));
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_language_gets_colored_spans() {
        let lines = highlight_block("fn main() {\n    println!(\"hi\");\n}", "rust");
        assert_eq!(lines.len(), 3);
        assert!(lines[0].spans.len() > 1);
        assert!(lines[0]
            .spans
            .iter()
            .all(|s| matches!(s.style.fg, Some(Color::Rgb(..)))));
    }

    #[test]
    fn test_unknown_language_is_plain() {
        let lines = highlight_block("a\nb", "not-a-language");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].spans[0].content, "b");
    }

    #[test]
    fn test_aliases() {
        assert_eq!(normalize_language("PY"), "python");
        assert_eq!(normalize_language("sh"), "bash");
        assert_eq!(normalize_language("text"), "text");
    }

    #[test]
    fn test_cache_returns_same_lines() {
        let mut cache = HighlightCache::default();
        let first = cache.get("print(1)", "python").to_vec();
        let second = cache.get("print(1)", "python").to_vec();
        assert_eq!(first, second);
        assert_eq!(cache.entries.len(), 1);
    }

    #[test]
    fn test_retain_blocks_evicts_others() {
        let mut cache = HighlightCache::default();
        cache.get("print(1)", "python");
        cache.get("ls", "bash");
        cache.retain_blocks([("bash", "ls")]);
        assert_eq!(cache.entries.len(), 1);
        assert!(cache.entries.contains_key(&cache_key("ls", "bash")));

        cache.retain_blocks(Vec::<(&str, &str)>::new());
        assert!(cache.entries.is_empty());
    }
}
