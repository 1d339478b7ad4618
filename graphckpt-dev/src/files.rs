//! Target set computation
//!
//! A target set starts as a list of path entries (from `SOURCE_FILES`, the
//! config, or `git diff`) and is expanded to the Rust source files rustfmt
//! should see.

use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_SOURCE_FILES: &str = ".";

/// Entries of a whitespace-separated `SOURCE_FILES` value
pub fn split_entries(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Changed Rust files from `git diff --name-only` output
pub fn parse_diff(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.ends_with(".rs"))
        .map(str::to_string)
        .collect()
}

fn is_rust_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rs")
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    // The root entry is never skipped, even when it is `.`
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == "target" || name.starts_with('.')
}

/// Expand directories to the `.rs` files below them
///
/// `target/` and hidden directories are not descended into. Missing paths and
/// non-Rust files are dropped. The result is sorted and free of duplicates.
pub fn expand(entries: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in entries {
        let path = Path::new(entry);
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .into_iter()
                    .filter_entry(|e| !is_skipped_dir(e))
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && is_rust_file(e.path()))
                    .map(DirEntry::into_path),
            );
        } else if path.is_file() && is_rust_file(path) {
            files.push(path.to_path_buf());
        } else if !path.exists() {
            warn!("Skipping missing path {}", entry);
        }
    }
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_split_entries() {
        assert_eq!(split_entries(" a.rs  src\tb "), vec!["a.rs", "src", "b"]);
        assert!(split_entries("   ").is_empty());
    }

    #[test]
    fn test_parse_diff_keeps_rust_files() {
        let stdout = "src/lib.rs\nREADME.md\n\ntests/x.rs\nCargo.toml\n";
        assert_eq!(parse_diff(stdout), vec!["src/lib.rs", "tests/x.rs"]);
        assert!(parse_diff("").is_empty());
    }

    #[test]
    fn test_expand_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("src/lib.rs"));
        touch(&root.join("src/nested/mod.rs"));
        touch(&root.join("src/notes.md"));
        touch(&root.join("target/debug/build.rs"));
        touch(&root.join(".git/hooks/hook.rs"));

        let files = expand(&[root.display().to_string()]);
        assert_eq!(
            files,
            vec![root.join("src/lib.rs"), root.join("src/nested/mod.rs")]
        );
    }

    #[test]
    fn test_expand_files_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.rs");
        touch(&file);
        touch(&dir.path().join("b.txt"));

        let entries = vec![
            file.display().to_string(),
            file.display().to_string(),
            dir.path().join("b.txt").display().to_string(),
            dir.path().join("gone.rs").display().to_string(),
        ];
        assert_eq!(expand(&entries), vec![file]);
        assert!(expand(&[]).is_empty());
    }
}
