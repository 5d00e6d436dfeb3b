//! File patterns (`src/entities/**/*.sql`).
//!
//! Supports `*`, `**`, `?` and `{a,b}` alternatives.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use walkdir::WalkDir;

use crate::error::{DbkitError, DbkitResult};

/// A compiled file pattern.
#[derive(Debug, Clone)]
pub struct FilePattern {
    base: PathBuf,
    regex: Regex,
}

impl FilePattern {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> DbkitResult<Self> {
        let regex = Regex::new(&format!("^{}$", glob_to_regex(pattern)))
            .map_err(|e| DbkitError::config(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            base: literal_prefix(pattern),
            regex,
        })
    }

    /// Directory the walk starts from.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether `path` matches.
    pub fn matches(&self, path: &Path) -> bool {
        self.regex.is_match(&path.to_string_lossy())
    }

    /// Files matching the pattern, sorted.
    pub fn files(&self) -> DbkitResult<Vec<PathBuf>> {
        if !self.base.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.base).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Files matching any of `patterns`, sorted and without duplicates.
pub fn collect_files(patterns: &[String]) -> DbkitResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        files.extend(FilePattern::new(pattern)?.files()?);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_glob(component: &str) -> bool {
    component.contains(['*', '?', '{', '['])
}

fn literal_prefix(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        if is_glob(&component.as_os_str().to_string_lossy()) {
            break;
        }
        base.push(component);
    }
    base
}

/// Translate a glob into a regular expression body.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();
    let mut in_group = false;

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            c => out.push_str(&regex_lite::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out
}
