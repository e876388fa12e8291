use crate::parser::ParsedFile;
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;
use syn::visit::Visit;

/// Source text of one method, located by span line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSource {
    pub path: PathBuf,
    /// 1-based line of the `fn` keyword
    pub start_line: usize,
    /// 1-based line of the closing brace
    pub end_line: usize,
    pub lines: Vec<String>,
}

/// Maps `(type name, method name)` to the method's source lines.
///
/// Both inherent and trait impls are indexed under the short name of the
/// implementing type. When two types share a short name, the first one
/// indexed wins.
#[derive(Debug, Default)]
pub struct SourceIndex {
    methods: HashMap<(String, String), MethodSource>,
}

impl SourceIndex {
    pub fn new(parsed_files: &[ParsedFile]) -> Self {
        let mut index = SourceIndex::default();
        for parsed_file in parsed_files {
            let mut collector = MethodCollector {
                file: parsed_file,
                current_type: None,
                found: Vec::new(),
            };
            collector.visit_file(&parsed_file.syntax_tree);

            for (key, source) in collector.found {
                if index.methods.contains_key(&key) {
                    debug!("{}::{} already indexed, ignoring {}", key.0, key.1, source.path.display());
                    continue;
                }
                index.methods.insert(key, source);
            }
        }
        debug!("Indexed {} impl methods", index.methods.len());
        index
    }

    pub fn get(&self, type_name: &str, method: &str) -> Option<&MethodSource> {
        self.methods.get(&(type_name.to_string(), method.to_string()))
    }

    pub fn method_lines(&self, type_name: &str, method: &str) -> Option<&[String]> {
        self.get(type_name, method).map(|m| m.lines.as_slice())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

struct MethodCollector<'a> {
    file: &'a ParsedFile,
    current_type: Option<String>,
    found: Vec<((String, String), MethodSource)>,
}

impl<'ast> Visit<'ast> for MethodCollector<'_> {
    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        let type_name = match &*node.self_ty {
            syn::Type::Path(type_path) => type_path.path.segments.last().map(|s| s.ident.to_string()),
            _ => None,
        };
        let previous = std::mem::replace(&mut self.current_type, type_name);
        syn::visit::visit_item_impl(self, node);
        self.current_type = previous;
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        if let Some(type_name) = &self.current_type {
            let start_line = node.sig.fn_token.span.start().line;
            let end_line = node.block.brace_token.span.close().end().line;
            self.found.push((
                (type_name.clone(), node.sig.ident.to_string()),
                MethodSource {
                    path: self.file.path.clone(),
                    start_line,
                    end_line,
                    lines: self.file.lines(start_line, end_line),
                },
            ));
        }
        syn::visit::visit_impl_item_fn(self, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const REQUESTS: &str = r#"use std::collections::HashMap;

pub struct CreatePost;

impl CreatePost {
    pub fn rules() -> Vec<(&'static str, &'static str)> {
        vec![
            ("title", "required|string"),
        ]
    }
}

impl Validate for UpdatePost {
    fn rules(&self) -> Rules {
        rules! { "title" => "string" }
    }
}
"#;

    fn index() -> SourceIndex {
        let parsed = ParsedFile::from_source(Path::new("src/requests.rs"), REQUESTS).unwrap();
        SourceIndex::new(&[parsed])
    }

    #[test]
    fn test_inherent_method_lines() {
        let index = index();
        let source = index.get("CreatePost", "rules").unwrap();

        assert_eq!(source.start_line, 6);
        assert_eq!(source.end_line, 10);
        assert_eq!(source.lines.len(), 5);
        assert_eq!(source.lines[2].trim(), r#"("title", "required|string"),"#);
    }

    #[test]
    fn test_trait_impl_methods_are_indexed() {
        let index = index();
        let lines = index.method_lines("UpdatePost", "rules").unwrap();
        assert_eq!(lines[1].trim(), r#"rules! { "title" => "string" }"#);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_missing_method() {
        assert!(index().get("CreatePost", "messages").is_none());
        assert!(SourceIndex::default().is_empty());
    }
}
