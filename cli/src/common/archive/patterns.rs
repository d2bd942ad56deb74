//! # podctx Ignore Patterns (`common::archive::patterns`)
//!
//! File: cli/src/common/archive/patterns.rs
//!
//! ## Overview
//!
//! `.containerignore`/`.dockerignore` style exclusion rules evaluated against
//! slash-separated paths relative to the primary context root.
//!
//! ## Semantics
//!
//! - Patterns are trimmed and lexically cleaned (`a//b/./c/` becomes `a/b/c`).
//!   Empty patterns are ignored.
//! - `*` and `?` never cross a `/`; `**` spans any number of directories;
//!   `[...]` classes and `\` escapes are supported.
//! - A leading `!` turns a rule into an exception that re-includes paths.
//! - Rules are evaluated in order and the last matching rule wins.
//! - A rule also matches every descendant of a path it matches (`docs`
//!   excludes `docs/a.md`), which is why the archiver must still visit the
//!   children of excluded directories: `!docs/keep.md` can bring one back.
//!
use crate::core::error::{PodctxError, Result};
use anyhow::Context;
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::Path;

/// One compiled ignore rule.
#[derive(Debug, Clone)]
struct Pattern {
    matcher: GlobMatcher,
    /// Number of `/`-separated components in the cleaned pattern.
    depth: usize,
    exclusion: bool,
}

/// Compiled, immutable set of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<Pattern>,
}

impl PatternMatcher {
    /// Compiles `patterns` in order.
    ///
    /// # Errors
    ///
    /// Returns `PodctxError::InvalidPattern` for a lone `!` or a pattern that
    /// is not a valid glob. The error lists the whole pattern set.
    pub fn new<I, S>(patterns: I) -> std::result::Result<Self, PodctxError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        let invalid = |reason: String| PodctxError::InvalidPattern {
            patterns: raw.clone(),
            reason,
        };

        let mut compiled = Vec::new();
        for original in &raw {
            let trimmed = original.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut cleaned = clean_slash_path(trimmed);
            let exclusion = cleaned.starts_with('!');
            if exclusion {
                if cleaned.len() == 1 {
                    return Err(invalid("illegal exclusion pattern: \"!\"".to_string()));
                }
                cleaned.remove(0);
            }

            let matcher = GlobBuilder::new(&cleaned)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|e| invalid(format!("pattern '{cleaned}': {e}")))?
                .compile_matcher();

            compiled.push(Pattern {
                depth: cleaned.split('/').count(),
                matcher,
                exclusion,
            });
        }

        Ok(Self { patterns: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns `true` when `name` (slash separated, relative) is excluded.
    pub fn matches(&self, name: &str) -> bool {
        let parent_dirs: Vec<&str> = match name.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => parent.split('/').collect(),
            _ => Vec::new(),
        };

        let mut matched = false;
        for pattern in &self.patterns {
            // Inclusions only matter until something matched, exceptions only after.
            if pattern.exclusion != matched {
                continue;
            }

            let mut hit = pattern.matcher.is_match(name);
            if !hit && !parent_dirs.is_empty() && pattern.depth <= parent_dirs.len() {
                let ancestor = parent_dirs[..pattern.depth].join("/");
                hit = pattern.matcher.is_match(ancestor.as_str());
            }

            if hit {
                matched = !pattern.exclusion;
            }
        }
        matched
    }
}

/// Escapes glob metacharacters so `literal` only ever matches itself.
///
/// Leading and trailing whitespace is written as one-character classes
/// (`" foo"` becomes `"[ ]foo"`) so it survives the matcher's trimming.
pub fn escape_literal(literal: &str) -> String {
    let first_kept = literal.len() - literal.trim_start().len();
    let last_kept = literal.trim_end().len();
    let mut escaped = String::with_capacity(literal.len());
    for (offset, ch) in literal.char_indices() {
        if offset < first_kept || offset >= last_kept {
            escaped.push('[');
            escaped.push(ch);
            escaped.push(']');
            continue;
        }
        let special =
            matches!(ch, '*' | '?' | '[' | ']' | '{' | '}' | '\\') || (offset == 0 && ch == '!');
        if special {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Parses the contents of an ignore file into patterns.
///
/// Comment lines start with `#`. Leading `/` is stripped so absolute-looking
/// patterns apply relative to the context root, and the `!` prefix survives
/// cleaning.
pub fn parse_ignore_file(content: &str) -> Vec<String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut patterns = Vec::new();
    for line in content.lines() {
        if line.starts_with('#') {
            continue;
        }
        let mut pattern = line.trim();
        if pattern.is_empty() {
            continue;
        }
        let invert = pattern.starts_with('!');
        if invert {
            pattern = pattern[1..].trim();
        }
        let mut cleaned = String::new();
        if !pattern.is_empty() {
            cleaned = clean_slash_path(pattern);
            if cleaned.len() > 1 && cleaned.starts_with('/') {
                cleaned.remove(0);
            }
        }
        if invert {
            cleaned.insert(0, '!');
        }
        patterns.push(cleaned);
    }
    patterns
}

/// Reads and parses an ignore file from disk.
pub fn read_ignore_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ignore file {}", path.display()))?;
    Ok(parse_ignore_file(&content))
}

/// Lexically cleans a slash-separated path: collapses repeated separators,
/// drops `.` segments, resolves `..` where possible and removes a trailing `/`.
fn clean_slash_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
