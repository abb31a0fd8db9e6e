//! Response filter that keeps the assistant on its configured identity
//!
//! Self-identification answers in prose are replaced wholesale by a fixed sentence.
//! Anything else gets product-name, attribution, and disclaimer phrases
//! scrubbed from its prose, then whitespace tidied. Fenced code is copied
//! through byte for byte.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::OnceLock;

use crate::segment::fenced_ranges;

pub const PRODUCT_NAME: &str = "SecureGPT";
pub const AUTHOR_NAME: &str = "Shoaib Shaikh";

/// The only answer given to "who are you" style output
pub const IDENTITY_RESPONSE: &str =
    "I am SecureGPT, a cybersecurity assistant designed by Shoaib Shaikh.";

struct Patterns {
    identity: Vec<Regex>,
    product: Regex,
    attribution: Regex,
    author: Regex,
    disclaimer: Regex,
    blank_runs: Regex,
    space_before_punct: Regex,
    trailing_space: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("filter pattern is valid")
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        identity: vec![
            compile(r"(?i)\b(?:I\s+am|I['’]m|my\s+name\s+is)\s+SecureGPT\b"),
            compile(r"(?i)\bI\s+(?:was|have\s+been)\s+(?:developed|designed|created)\s+by\b"),
            compile(r"(?i)\b(?:developed|designed|created)\s+by\s+Shoaib\b"),
        ],
        product: compile(r"(?i)\bSecureGPT\b"),
        attribution: compile(r"(?i)\b(?:developed|designed|created)\s+by\s+[^.,;:!?\n]*"),
        author: compile(r"(?i)\bShoaib(?:\s+Shaikh)?\b"),
        disclaimer: compile(
            r"(?i)\bI(?:\s+am|['’]m)\s+(?:just\s+|only\s+|merely\s+)?an?\s+(?:AI|artificial\s+intelligence|assistant|(?:language\s+)?model)\b[^.!?\n]*[.!?]?",
        ),
        blank_runs: compile(r"[ \t]+"),
        space_before_punct: compile(r"[ \t]+([.,;:!?])"),
        trailing_space: compile(r"(?m)[ \t]+$"),
    })
}

/// Sanitize raw model output.
///
/// The identity check runs first and short-circuits every other rule, so
/// `filter(IDENTITY_RESPONSE) == IDENTITY_RESPONSE`.
pub fn filter(raw: &str) -> String {
    let p = patterns();
    let fenced = fenced_ranges(raw);
    let prose = prose_parts(raw, &fenced);
    if prose
        .iter()
        .any(|part| p.identity.iter().any(|re| re.is_match(part)))
    {
        return IDENTITY_RESPONSE.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut product_seen = false;

    for (i, part) in prose.iter().enumerate() {
        out.push_str(&rewrite_prose(part, &mut product_seen));
        if let Some(range) = fenced.get(i) {
            out.push_str(&raw[range.clone()]);
        }
    }

    let out = capitalize_first(out.trim());
    if out.is_empty() && !raw.trim().is_empty() {
        // Nothing but identity talk survived
        return IDENTITY_RESPONSE.to_string();
    }
    out
}

/// The text around each fenced block; always one more part than `fenced`
fn prose_parts<'a>(raw: &'a str, fenced: &[Range<usize>]) -> Vec<&'a str> {
    let mut parts = Vec::with_capacity(fenced.len() + 1);
    let mut last_end = 0;
    for range in fenced {
        parts.push(&raw[last_end..range.start]);
        last_end = range.end;
    }
    parts.push(&raw[last_end..]);
    parts
}

fn rewrite_prose(prose: &str, product_seen: &mut bool) -> String {
    let p = patterns();

    let text = p.product.replace_all(prose, |caps: &Captures| {
        if *product_seen {
            "I".to_string()
        } else {
            *product_seen = true;
            caps[0].to_string()
        }
    });
    let text = p.attribution.replace_all(&text, "");
    let text = p.author.replace_all(&text, "");
    let text = p.disclaimer.replace_all(&text, "");

    let text = p.blank_runs.replace_all(&text, " ");
    let text = p.space_before_punct.replace_all(&text, "$1");
    let text = p.trailing_space.replace_all(&text, "");
    text.into_owned()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_identification_returns_canned_sentence() {
        assert_eq!(filter("Hello! I am SecureGPT, here to help you."), IDENTITY_RESPONSE);
        assert_eq!(filter("i'm securegpt"), IDENTITY_RESPONSE);
        assert_eq!(filter("My name is SecureGPT."), IDENTITY_RESPONSE);
        assert_eq!(filter("I was created by a team at DeepSeek."), IDENTITY_RESPONSE);
        assert_eq!(filter("This bot was designed by Shoaib Shaikh."), IDENTITY_RESPONSE);
    }

    #[test]
    fn test_canned_sentence_is_a_fixed_point() {
        assert_eq!(filter(IDENTITY_RESPONSE), IDENTITY_RESPONSE);
        assert_eq!(filter(&filter(IDENTITY_RESPONSE)), IDENTITY_RESPONSE);
    }

    #[test]
    fn test_plain_answer_passes_through() {
        assert_eq!(filter("Use bcrypt."), "Use bcrypt.");
    }

    #[test]
    fn test_repeated_product_name_becomes_pronoun() {
        assert_eq!(
            filter("SecureGPT can help. SecureGPT suggests argon2."),
            "SecureGPT can help. I suggests argon2."
        );
    }

    #[test]
    fn test_attribution_clause_is_stripped() {
        assert_eq!(
            filter("Nmap is a scanner developed by Gordon Lyon, and it is free."),
            "Nmap is a scanner, and it is free."
        );
    }

    #[test]
    fn test_author_token_is_stripped() {
        assert_eq!(filter("Thanks to Shoaib Shaikh for the tip."), "Thanks to for the tip.");
    }

    #[test]
    fn test_disclaimer_is_stripped() {
        assert_eq!(filter("I am an AI language model. Use bcrypt."), "Use bcrypt.");
        assert_eq!(
            filter("Salt your hashes. I'm just an assistant, so verify this."),
            "Salt your hashes."
        );
    }

    #[test]
    fn test_whitespace_is_normalized() {
        assert_eq!(filter("hello   world !  "), "Hello world!");
        assert_eq!(filter("first line   \nsecond\tline ,ok"), "First line\nsecond line,ok");
    }

    #[test]
    fn test_code_blocks_are_untouched() {
        let input = "run this:\n```bash\nls    -la   ;\n```";
        assert_eq!(filter(input), "Run this:\n```bash\nls    -la   ;\n```");
    }

    #[test]
    fn test_identity_text_inside_code_is_not_canned() {
        let input = "Here:\n```python\nprint('I am SecureGPT')\n```";
        assert_eq!(filter(input), input);
    }

    #[test]
    fn test_fully_stripped_answer_falls_back_to_identity() {
        assert_eq!(filter("I am an AI assistant."), IDENTITY_RESPONSE);
    }

    #[test]
    fn test_empty_input_stays_empty() {
        assert_eq!(filter(""), "");
        assert_eq!(filter("   "), "");
    }
}
