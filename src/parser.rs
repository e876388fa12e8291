use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// AST parser for Rust source files.
///
/// Parsing keeps the original source text next to the syntax tree: the static
/// rule parser reads method bodies line by line, and `syn` spans (with
/// `proc-macro2`'s `span-locations`) give the line range of each method.
pub struct AstParser;

/// A successfully parsed Rust file.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module path derived from the file location (e.g. `crate::handlers::users`)
    pub module_path: String,
    /// The raw source text
    pub source: String,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedFile {
    /// Parses in-memory source text, as if it lived at `path`.
    pub fn from_source(path: &Path, source: &str) -> Result<ParsedFile> {
        let syntax_tree = syn::parse_file(source)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            module_path: module_path_for(path),
            source: source.to_string(),
            syntax_tree,
        })
    }

    /// Returns the 1-based, inclusive line range of the source.
    pub fn lines(&self, start: usize, end: usize) -> Vec<String> {
        self.source
            .lines()
            .skip(start.saturating_sub(1))
            .take(end.saturating_sub(start) + 1)
            .map(str::to_string)
            .collect()
    }
}

impl AstParser {
    /// Reads and parses a single Rust source file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid Rust syntax.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let parsed = ParsedFile::from_source(path, &content)?;
        debug!("Parsed {} as {}", path.display(), parsed.module_path);
        Ok(parsed)
    }

    /// Parses multiple files, continuing past failures.
    ///
    /// Files that fail to parse are logged as warnings; the caller decides
    /// whether a partial result is acceptable.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                Self::parse_file(path).map_err(|e| {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    e
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}

/// Derives a module path from a file location.
///
/// Components after the last `src` directory become module segments;
/// `lib.rs`, `main.rs` and `mod.rs` name their parent module.
pub fn module_path_for(path: &Path) -> String {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    let start = components
        .iter()
        .rposition(|c| c == "src")
        .map(|i| i + 1)
        .unwrap_or_else(|| components.len().saturating_sub(1));

    let mut segments = vec!["crate".to_string()];
    let tail = &components[start.min(components.len())..];
    for (i, component) in tail.iter().enumerate() {
        let is_last = i + 1 == tail.len();
        if is_last {
            let stem = component.trim_end_matches(".rs");
            if !matches!(stem, "lib" | "main" | "mod") {
                segments.push(stem.to_string());
            }
        } else {
            segments.push(component.clone());
        }
    }

    segments.join("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_parse_valid_rust_file_keeps_source() {
        let temp_dir = TempDir::new().unwrap();
        let code = "pub struct CreateUser {\n    pub name: String,\n}\n";

        let file_path = create_temp_file(&temp_dir, "src/requests.rs", code);
        let parsed = AstParser::parse_file(&file_path).unwrap();

        assert_eq!(parsed.path, file_path);
        assert_eq!(parsed.source, code);
        assert_eq!(parsed.module_path, "crate::requests");
        assert_eq!(parsed.syntax_tree.items.len(), 1);
    }

    #[test]
    fn test_parse_invalid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(&temp_dir, "invalid.rs", "fn broken( {");

        let err = AstParser::parse_file(&file_path).unwrap_err().to_string();
        assert!(err.contains("Failed to parse Rust syntax"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let err = AstParser::parse_file(Path::new("/nonexistent/file.rs"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Failed to read file"));
    }

    #[test]
    fn test_parse_files_batch_continues_past_failures() {
        let temp_dir = TempDir::new().unwrap();
        let good = create_temp_file(&temp_dir, "good.rs", "pub fn hello() {}");
        let bad = create_temp_file(&temp_dir, "bad.rs", "pub fn broken( {");

        let results = AstParser::parse_files(&[good.clone(), bad]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().path, good);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_lines_range_is_inclusive_and_one_based() {
        let parsed =
            ParsedFile::from_source(Path::new("src/a.rs"), "fn a() {}\nfn b() {}\nfn c() {}\n")
                .unwrap();
        assert_eq!(parsed.lines(2, 3), vec!["fn b() {}", "fn c() {}"]);
    }

    #[test]
    fn test_module_path_for() {
        assert_eq!(module_path_for(Path::new("/p/src/main.rs")), "crate");
        assert_eq!(module_path_for(Path::new("/p/src/lib.rs")), "crate");
        assert_eq!(
            module_path_for(Path::new("/p/src/handlers/mod.rs")),
            "crate::handlers"
        );
        assert_eq!(
            module_path_for(Path::new("/p/src/handlers/users.rs")),
            "crate::handlers::users"
        );
        assert_eq!(module_path_for(Path::new("users.rs")), "crate::users");
    }
}
