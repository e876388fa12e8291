use crate::catalog::Framework;
use crate::parser::ParsedFile;
use log::debug;
use std::collections::BTreeSet;
use syn::{Item, UseTree};

/// Crate roots that identify each framework in `use` declarations.
const FRAMEWORK_CRATES: &[(&str, Framework)] =
    &[("axum", Framework::Axum), ("actix_web", Framework::ActixWeb)];

/// Detects which web frameworks a project uses by examining its `use`
/// declarations, including those inside inline modules.
pub struct FrameworkDetector;

/// Result of framework detection.
pub struct DetectionResult {
    /// Detected frameworks, in a stable order
    pub frameworks: Vec<Framework>,
}

impl FrameworkDetector {
    /// Detects web frameworks used in the provided parsed files.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use api_auto_docs::detector::FrameworkDetector;
    /// use api_auto_docs::parser::AstParser;
    /// use std::path::Path;
    ///
    /// let parsed = AstParser::parse_file(Path::new("src/main.rs")).unwrap();
    /// let result = FrameworkDetector::detect(&[parsed]);
    /// println!("Detected {} framework(s)", result.frameworks.len());
    /// ```
    pub fn detect(parsed_files: &[ParsedFile]) -> DetectionResult {
        let mut detected = BTreeSet::new();

        for parsed_file in parsed_files {
            Self::check_items(&parsed_file.syntax_tree.items, &mut detected);
        }

        let frameworks: Vec<Framework> = detected.into_iter().collect();
        debug!("Detected frameworks: {:?}", frameworks);

        DetectionResult { frameworks }
    }

    fn check_items(items: &[Item], detected: &mut BTreeSet<Framework>) {
        for item in items {
            match item {
                Item::Use(use_item) => Self::check_use_tree(&use_item.tree, detected),
                Item::Mod(item_mod) => {
                    if let Some((_, items)) = &item_mod.content {
                        Self::check_items(items, detected);
                    }
                }
                _ => {}
            }
        }
    }

    fn check_ident(ident: &syn::Ident, detected: &mut BTreeSet<Framework>) {
        for (root, framework) in FRAMEWORK_CRATES {
            if ident == root {
                detected.insert(*framework);
            }
        }
    }

    /// Only the root segment of a path names a crate.
    fn check_use_tree(tree: &UseTree, detected: &mut BTreeSet<Framework>) {
        match tree {
            UseTree::Path(path) => Self::check_ident(&path.ident, detected),
            UseTree::Rename(rename) => Self::check_ident(&rename.ident, detected),
            UseTree::Name(name) => Self::check_ident(&name.ident, detected),
            UseTree::Group(group) => {
                for item in &group.items {
                    Self::check_use_tree(item, detected);
                }
            }
            UseTree::Glob(_) => {}
        }
    }
}
