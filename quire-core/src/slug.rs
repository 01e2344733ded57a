//! Slug generation for output paths.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

static HYPHEN_RUNS: OnceLock<Regex> = OnceLock::new();

fn hyphen_runs() -> &'static Regex {
    HYPHEN_RUNS.get_or_init(|| Regex::new(r"-+").expect("hyphen regex is valid"))
}

/// Convert a string to a URL-safe slug
///
/// Lowercases, turns whitespace and underscores into hyphens, drops
/// punctuation, then collapses and trims hyphens. Unicode letters survive.
///
/// # Examples
///
/// ```
/// use quire_core::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("Rust & Safety"), "rust-safety");
/// ```
pub fn slugify(input: &str) -> String {
    let cleaned: String = input
        .to_lowercase()
        .graphemes(true)
        .filter_map(|g| {
            let c = g.chars().next()?;
            if g.chars().all(char::is_whitespace) || c == '_' || c == '-' || c == '/' {
                Some("-")
            } else if c.is_alphanumeric() {
                Some(g)
            } else {
                None
            }
        })
        .collect();

    hyphen_runs()
        .replace_all(&cleaned, "-")
        .trim_matches('-')
        .to_string()
}

/// Slug for a source file: its content-relative path without extension
///
/// `notes/My First Post.md` becomes `notes-my-first-post`.
pub fn slug_from_path(relative: &Path) -> String {
    let stem = relative.with_extension("");
    slugify(&stem.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Rust Programming"), "rust-programming");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(slugify("C++ Programming"), "c-programming");
        assert_eq!(slugify("Node.js Tips"), "nodejs-tips");
        assert_eq!(slugify("What's new?"), "whats-new");
    }

    #[test]
    fn test_unicode() {
        assert_eq!(slugify("Café"), "café");
        assert_eq!(slugify("naïve"), "naïve");
    }

    #[test]
    fn test_separators_collapse() {
        assert_eq!(slugify("Hello    World"), "hello-world");
        assert_eq!(slugify("rust_lang_basics"), "rust-lang-basics");
        assert_eq!(slugify("  -Leading and trailing-  "), "leading-and-trailing");
    }

    #[test]
    fn test_empty_and_special_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slug_from_path() {
        assert_eq!(
            slug_from_path(Path::new("notes/My First Post.md")),
            "notes-my-first-post"
        );
        assert_eq!(slug_from_path(Path::new("index.md")), "index");
    }
}
