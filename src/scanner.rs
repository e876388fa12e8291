use anyhow::{bail, Result};
use log::{debug, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directory names never descended into.
const DEFAULT_SKIPPED_DIRS: &[&str] = &["target", "node_modules", "vendor"];

/// Walks a project directory collecting Rust source files.
///
/// Hidden directories and build/vendor directories are skipped.
///
/// # Example
///
/// ```no_run
/// use api_auto_docs::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let result = FileScanner::new(PathBuf::from("./my-project")).scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    skipped_dirs: Vec<String>,
}

/// Result of a directory scan.
pub struct ScanResult {
    /// Paths to all discovered `.rs` files, in walk order
    pub rust_files: Vec<PathBuf>,
    /// Inaccessible entries encountered while walking
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            skipped_dirs: DEFAULT_SKIPPED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Adds a directory name to skip in addition to the defaults.
    pub fn skip_dir(mut self, name: impl Into<String>) -> Self {
        self.skipped_dirs.push(name.into());
        self
    }

    /// Scans the directory tree and collects all `.rs` files.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not an accessible directory. Failures
    /// below the root are recorded as warnings and scanning continues.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            bail!("Not a directory: {}", self.root_path.display());
        }

        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        let walker = WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && !self.skipped_dirs.iter().any(|d| *d == name)
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file()
                        && path.extension().and_then(|s| s.to_str()) == Some("rs")
                    {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        debug!(
            "Scanned {}: {} Rust files",
            self.root_path.display(),
            rust_files.len()
        );

        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }
}
