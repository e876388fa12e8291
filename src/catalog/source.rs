//! Route discovery from Rust source code.
//!
//! [`SourceProject`] scans and parses a project; [`HandlerIndex`] records every
//! function that could serve as a handler; framework extractors turn router
//! definitions into [`RouteHandle`]s; [`SourceRouteCatalog`] puts it together.

use super::{
    actix::ActixExtractor, axum::AxumExtractor, register_route, Framework, HandlerRef,
    HandlerSignature, NamedHandler, RouteCatalog, RouteHandle, TypeRef,
};
use crate::detector::FrameworkDetector;
use crate::parser::{AstParser, ParsedFile};
use crate::scanner::FileScanner;
use anyhow::{bail, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use syn::visit::Visit;

/// Trait for extracting routes from parsed Rust files.
///
/// Implementations know how a specific framework declares routes.
pub trait RouteExtractor {
    /// Extracts every route declared across `parsed_files`, resolving handler
    /// names through `handlers`.
    fn extract_routes(&self, parsed_files: &[ParsedFile], handlers: &HandlerIndex)
        -> Vec<RouteHandle>;
}

/// The parsed sources of one project.
pub struct SourceProject {
    pub root: PathBuf,
    pub files: Vec<ParsedFile>,
}

impl SourceProject {
    /// Scans `root` and parses every Rust file, skipping files with syntax errors.
    ///
    /// # Errors
    ///
    /// Fails when the root cannot be scanned or no file parses.
    pub fn load(root: &Path) -> Result<Self> {
        let scan = FileScanner::new(root.to_path_buf()).scan()?;
        for warning in &scan.warnings {
            warn!("{}", warning);
        }
        if scan.rust_files.is_empty() {
            bail!("No Rust files found in {}", root.display());
        }

        let files: Vec<ParsedFile> = AstParser::parse_files(&scan.rust_files)
            .into_iter()
            .filter_map(|r| match r {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("Skipping file due to parse error: {}", e);
                    None
                }
            })
            .collect();

        if files.is_empty() {
            bail!("No files could be parsed successfully");
        }

        info!("Parsed {} of {} Rust files", files.len(), scan.rust_files.len());
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn from_files(files: Vec<ParsedFile>) -> Self {
        Self {
            root: PathBuf::new(),
            files,
        }
    }
}

/// Routes discovered from a project's source.
pub struct SourceRouteCatalog {
    routes: Vec<RouteHandle>,
    frameworks: Vec<Framework>,
}

impl SourceRouteCatalog {
    /// Extracts routes using `frameworks`, or the detected frameworks when `None`.
    pub fn discover(project: &SourceProject, frameworks: Option<Vec<Framework>>) -> Self {
        let frameworks = frameworks.unwrap_or_else(|| FrameworkDetector::detect(&project.files).frameworks);
        if frameworks.is_empty() {
            warn!("No supported web framework detected");
        }

        let handlers = HandlerIndex::build(&project.files);
        let mut routes = Vec::new();

        for framework in &frameworks {
            let extractor: Box<dyn RouteExtractor> = match framework {
                Framework::Axum => Box::new(AxumExtractor),
                Framework::ActixWeb => Box::new(ActixExtractor),
            };
            let found = extractor.extract_routes(&project.files, &handlers);
            debug!("Extracted {} routes for {:?}", found.len(), framework);
            for route in found {
                register_route(&mut routes, route);
            }
        }

        info!("Discovered {} routes", routes.len());
        Self { routes, frameworks }
    }

    pub fn frameworks(&self) -> &[Framework] {
        &self.frameworks
    }
}

impl RouteCatalog for SourceRouteCatalog {
    fn routes(&self) -> &[RouteHandle] {
        &self.routes
    }
}

#[derive(Debug, Clone)]
struct HandlerDef {
    module_path: String,
    name: String,
    signature: HandlerSignature,
}

/// Every free function and inherent/trait method found in the project,
/// used to resolve handler expressions like `users::index` or
/// `UserController::store`.
#[derive(Debug, Default)]
pub struct HandlerIndex {
    functions: HashMap<String, Vec<HandlerDef>>,
    methods: HashMap<String, HandlerDef>,
}

impl HandlerIndex {
    pub fn build(parsed_files: &[ParsedFile]) -> Self {
        let mut collector = HandlerCollector {
            index: HandlerIndex::default(),
            modules: ModuleStack::default(),
            current_impl: None,
        };
        for parsed_file in parsed_files {
            collector.modules = ModuleStack::new(&parsed_file.module_path);
            collector.visit_file(&parsed_file.syntax_tree);
        }
        debug!(
            "Indexed {} functions and {} methods",
            collector.index.functions.values().map(Vec::len).sum::<usize>(),
            collector.index.methods.len()
        );
        collector.index
    }

    /// Resolves a handler path such as `["users", "index"]` as written in a
    /// router declared in `from_module`.
    ///
    /// `Type::method` pairs are looked up first; otherwise the last segment is
    /// matched against free functions, preferring the one whose module path
    /// ends with the qualifier (or the router's own module when unqualified).
    pub fn resolve(&self, segments: &[String], from_module: &str) -> HandlerRef {
        let Some((name, qualifier)) = segments.split_last() else {
            return HandlerRef::Anonymous;
        };

        if let Some(owner) = qualifier.last() {
            if let Some(def) = self.methods.get(&format!("{}::{}", owner, name)) {
                return HandlerRef::Named(NamedHandler {
                    type_path: format!("{}::{}", def.module_path, owner),
                    method: def.name.clone(),
                    signature: def.signature.clone(),
                });
            }
        }

        let suffix = qualifier
            .iter()
            .map(String::as_str)
            .skip_while(|s| matches!(*s, "crate" | "self" | "super"))
            .collect::<Vec<_>>()
            .join("::");
        let candidates = self.functions.get(name).map(Vec::as_slice).unwrap_or_default();
        let chosen = candidates
            .iter()
            .find(|def| {
                if suffix.is_empty() {
                    def.module_path == from_module
                } else {
                    def.module_path.ends_with(&format!("::{}", suffix))
                }
            })
            .or_else(|| candidates.first());

        match chosen {
            Some(def) => HandlerRef::Named(NamedHandler {
                type_path: def.module_path.clone(),
                method: def.name.clone(),
                signature: def.signature.clone(),
            }),
            None => {
                debug!("Unknown handler: {}", segments.join("::"));
                HandlerRef::Named(NamedHandler {
                    type_path: if suffix.is_empty() { "crate".to_string() } else { suffix },
                    method: name.clone(),
                    signature: HandlerSignature::default(),
                })
            }
        }
    }
}

struct HandlerCollector {
    index: HandlerIndex,
    modules: ModuleStack,
    current_impl: Option<String>,
}

impl<'ast> Visit<'ast> for HandlerCollector {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let def = HandlerDef {
            module_path: self.modules.current(),
            name: node.sig.ident.to_string(),
            signature: signature_of(&node.sig, &node.attrs),
        };
        self.index.functions.entry(def.name.clone()).or_default().push(def);
        syn::visit::visit_item_fn(self, node);
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        let owner = match &*node.self_ty {
            syn::Type::Path(type_path) => type_path.path.segments.last().map(|s| s.ident.to_string()),
            _ => None,
        };
        let previous = std::mem::replace(&mut self.current_impl, owner);
        syn::visit::visit_item_impl(self, node);
        self.current_impl = previous;
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        if let Some(owner) = &self.current_impl {
            let def = HandlerDef {
                module_path: self.modules.current(),
                name: node.sig.ident.to_string(),
                signature: signature_of(&node.sig, &node.attrs),
            };
            self.index.methods.insert(format!("{}::{}", owner, def.name), def);
        }
        syn::visit::visit_impl_item_fn(self, node);
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.modules.push(&node.ident);
        syn::visit::visit_item_mod(self, node);
        self.modules.pop();
    }
}

/// Tracks the module path while visiting nested inline modules.
#[derive(Debug, Default, Clone)]
pub(crate) struct ModuleStack {
    segments: Vec<String>,
}

impl ModuleStack {
    pub(crate) fn new(file_module: &str) -> Self {
        Self {
            segments: file_module.split("::").map(str::to_string).collect(),
        }
    }

    pub(crate) fn push(&mut self, ident: &syn::Ident) {
        self.segments.push(ident.to_string());
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }

    pub(crate) fn current(&self) -> String {
        if self.segments.is_empty() {
            "crate".to_string()
        } else {
            self.segments.join("::")
        }
    }
}

/// Builds a [`HandlerSignature`] from a function signature and its attributes.
pub(crate) fn signature_of(sig: &syn::Signature, attrs: &[syn::Attribute]) -> HandlerSignature {
    let inputs = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            syn::FnArg::Typed(pat_type) => Some(type_ref(&pat_type.ty)),
            syn::FnArg::Receiver(_) => None,
        })
        .collect();

    let output = match &sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => response_type(ty),
    };

    HandlerSignature {
        inputs,
        output,
        docs: doc_lines(attrs),
    }
}

/// Collects `///` doc comment lines.
pub(crate) fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => {
                    let value = s.value();
                    Some(value.strip_prefix(' ').unwrap_or(&value).to_string())
                }
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Converts a `syn::Type` to a [`TypeRef`], unwrapping generic wrappers.
pub(crate) fn type_ref(ty: &syn::Type) -> TypeRef {
    match ty {
        syn::Type::Path(type_path) => {
            let Some(segment) = type_path.path.segments.last() else {
                return TypeRef::new("unknown");
            };
            let ident = segment.ident.to_string();

            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(inner) = args.args.iter().find_map(|arg| match arg {
                    syn::GenericArgument::Type(inner) => Some(inner),
                    _ => None,
                }) {
                    let inner_ref = type_ref(inner);
                    return match ident.as_str() {
                        "Option" | "Vec" | "Box" | "Arc" => inner_ref,
                        _ => TypeRef::wrapped(ident, inner_ref),
                    };
                }
            }

            let path = type_path
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect::<Vec<_>>()
                .join("::");
            TypeRef {
                wrapper: None,
                name: ident,
                path,
                elements: Vec::new(),
            }
        }
        syn::Type::Tuple(tuple) if !tuple.elems.is_empty() => {
            TypeRef::tuple(tuple.elems.iter().map(|e| type_ref(e).name).collect())
        }
        syn::Type::Reference(reference) => type_ref(&reference.elem),
        syn::Type::Paren(paren) => type_ref(&paren.elem),
        syn::Type::Group(group) => type_ref(&group.elem),
        _ => TypeRef::new("unknown"),
    }
}

/// Determines the response type of a handler return type.
///
/// `Result<T, E>` yields `T`'s response type, tuples yield their `Json<T>`
/// element, `impl Trait` yields nothing.
fn response_type(ty: &syn::Type) -> Option<TypeRef> {
    match ty {
        syn::Type::ImplTrait(_) => None,
        syn::Type::Reference(reference) => Some(type_ref(&reference.elem)),
        syn::Type::Tuple(tuple) => tuple
            .elems
            .iter()
            .map(type_ref)
            .find(|t| t.wrapper.as_deref() == Some("Json")),
        syn::Type::Path(type_path) => {
            let segment = type_path.path.segments.last()?;
            if segment.ident == "Result" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(ok)) = args.args.first() {
                        return response_type(ok);
                    }
                }
            }
            Some(type_ref(ty))
        }
        _ => None,
    }
}

/// Collects the segments of a handler path expression; closures and other
/// expressions are anonymous.
pub(crate) fn handler_segments(expr: &syn::Expr) -> Option<Vec<String>> {
    match expr {
        syn::Expr::Path(path) => Some(
            path.path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect(),
        ),
        syn::Expr::Paren(paren) => handler_segments(&paren.expr),
        _ => None,
    }
}

pub(crate) fn string_literal(expr: &syn::Expr) -> Option<String> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(s),
            ..
        }) => Some(s.value()),
        _ => None,
    }
}

/// Joins a prefix and a path with exactly one slash between them.
pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{}", path),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HttpMethod;

    fn parse(path: &str, code: &str) -> ParsedFile {
        ParsedFile::from_source(Path::new(path), code).unwrap()
    }

    #[test]
    fn test_type_ref_unwraps_extractors() {
        let ty: syn::Type = syn::parse_str("axum::Json<requests::CreateUser>").unwrap();
        let t = type_ref(&ty);
        assert_eq!(t.wrapper.as_deref(), Some("Json"));
        assert_eq!(t.name, "CreateUser");
        assert_eq!(t.path, "requests::CreateUser");

        let ty: syn::Type = syn::parse_str("Path<(u32, String)>").unwrap();
        let t = type_ref(&ty);
        assert_eq!(t.elements, vec!["u32", "String"]);

        let ty: syn::Type = syn::parse_str("Option<Query<Filter>>").unwrap();
        assert_eq!(type_ref(&ty).schema_name(), Some("Filter"));
    }

    #[test]
    fn test_response_type_of_result_and_tuple() {
        let ty: syn::Type = syn::parse_str("Result<Json<UserResource>, AppError>").unwrap();
        assert_eq!(response_type(&ty).unwrap().name, "UserResource");

        let ty: syn::Type = syn::parse_str("(StatusCode, Json<PostResource>)").unwrap();
        assert_eq!(response_type(&ty).unwrap().name, "PostResource");

        let ty: syn::Type = syn::parse_str("impl IntoResponse").unwrap();
        assert!(response_type(&ty).is_none());
    }

    #[test]
    fn test_handler_index_resolves_methods_and_functions() {
        let handlers = parse(
            "src/handlers/users.rs",
            r#"
            /// List users.
            pub async fn index() -> Json<Vec<UserResource>> { todo!() }

            pub struct UserController;
            impl UserController {
                pub async fn store(Json(body): Json<CreateUser>) {}
            }
            "#,
        );
        let index = HandlerIndex::build(&[handlers]);

        let HandlerRef::Named(f) = index.resolve(&["users".to_string(), "index".to_string()], "crate") else {
            panic!("expected a named handler");
        };
        assert_eq!(f.type_path, "crate::handlers::users");
        assert_eq!(f.signature.docs, vec!["List users."]);
        assert_eq!(f.signature.output.unwrap().name, "UserResource");

        let HandlerRef::Named(m) = index.resolve(&["UserController".to_string(), "store".to_string()], "crate") else {
            panic!("expected a named handler");
        };
        assert_eq!(m.type_path, "crate::handlers::users::UserController");
        assert_eq!(m.signature.inputs[0].schema_name(), Some("CreateUser"));
    }

    #[test]
    fn test_handler_index_prefers_matching_module() {
        let a = parse("src/admin.rs", "pub fn index() {}");
        let b = parse("src/users.rs", "pub fn index() {}");
        let index = HandlerIndex::build(&[a, b]);

        let HandlerRef::Named(named) = index.resolve(&["users".to_string(), "index".to_string()], "crate") else {
            panic!("expected a named handler");
        };
        assert_eq!(named.type_path, "crate::users");
    }

    #[test]
    fn test_unknown_handler_keeps_its_name() {
        let index = HandlerIndex::default();
        let HandlerRef::Named(named) = index.resolve(&["missing".to_string(), "show".to_string()], "crate") else {
            panic!("expected a named handler");
        };
        assert_eq!(named.type_path, "missing");
        assert_eq!(named.method, "show");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("", "users"), "/users");
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("/api", "/"), "/api");
    }

    #[test]
    fn test_discover_detects_framework() {
        let project = SourceProject::from_files(vec![parse(
            "src/main.rs",
            r#"
            use axum::{Router, routing::get};
            async fn health() -> &'static str { "ok" }
            fn app() -> Router { Router::new().route("/health", get(health)) }
            "#,
        )]);

        let catalog = SourceRouteCatalog::discover(&project, None);
        assert_eq!(catalog.frameworks(), &[Framework::Axum]);
        assert_eq!(catalog.routes().len(), 1);
        assert_eq!(catalog.routes()[0].methods, vec![HttpMethod::Get]);
    }
}
