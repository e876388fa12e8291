//! Route catalog: the registered routes the documentation pipeline reads.
//!
//! A catalog exposes [`RouteHandle`]s: URI template, HTTP methods, middleware
//! names and a reference to the handler. Two implementations are provided:
//!
//! - [`StaticRouteCatalog`]: routes registered programmatically
//! - [`source::SourceRouteCatalog`]: routes discovered by parsing an Axum or
//!   Actix-Web project (see [`axum::AxumExtractor`] and [`actix::ActixExtractor`])
//!
//! # Example
//!
//! ```
//! use api_auto_docs::catalog::{HttpMethod, RouteCatalog, RouteHandle, StaticRouteCatalog};
//!
//! let mut catalog = StaticRouteCatalog::new();
//! catalog.add(RouteHandle::named("/users/{id}", &[HttpMethod::Get], "handlers::UserController", "show"));
//! assert_eq!(catalog.routes()[0].uri, "users/{id}");
//! ```

pub mod actix;
pub mod axum;
mod router;
pub mod source;

use clap::ValueEnum;
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Read access to the application's route table.
pub trait RouteCatalog {
    /// All registered routes in registration order.
    fn routes(&self) -> &[RouteHandle];
}

/// Supported web frameworks for source discovery
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Framework {
    /// Axum framework
    Axum,
    /// Actix-Web framework
    #[value(name = "actix-web")]
    ActixWeb,
}

/// HTTP methods a route can answer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// The methods the documentation pipeline knows how to show, in priority order.
    pub const DOCUMENTED: [HttpMethod; 6] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Case-insensitive parse of a method name.
    pub fn parse(method: &str) -> Option<HttpMethod> {
        match method.to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "patch" => Some(HttpMethod::Patch),
            "delete" => Some(HttpMethod::Delete),
            "head" => Some(HttpMethod::Head),
            "options" => Some(HttpMethod::Options),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::parse(s).ok_or_else(|| format!("unknown HTTP method: {}", s))
    }
}

/// A type as it appears in a handler signature.
///
/// `Json<CreateUser>` is recorded as wrapper `Json`, name `CreateUser`;
/// `Path<(u32, String)>` as wrapper `Path` with tuple elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeRef {
    /// Extractor or response wrapper (`Json`, `Form`, `Query`, `Path`, ...)
    pub wrapper: Option<String>,
    /// Innermost type name (last path segment)
    pub name: String,
    /// The innermost type path as written (e.g. `requests::CreateUser`)
    pub path: String,
    /// Element type names when the innermost type is a tuple
    pub elements: Vec<String>,
}

/// Wrappers that never carry an input schema.
const NON_INPUT_WRAPPERS: &[&str] = &[
    "State",
    "Extension",
    "Data",
    "HttpRequest",
    "Request",
    "HeaderMap",
    "TypedHeader",
    "ConnectInfo",
];

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            wrapper: None,
            path: name.clone(),
            name,
            elements: Vec::new(),
        }
    }

    pub fn wrapped(wrapper: impl Into<String>, inner: TypeRef) -> Self {
        Self {
            wrapper: Some(wrapper.into()),
            ..inner
        }
    }

    pub fn tuple(elements: Vec<String>) -> Self {
        Self {
            wrapper: None,
            name: String::new(),
            path: String::new(),
            elements,
        }
    }

    /// True for scalar types that can never expose rules.
    pub fn is_primitive(&self) -> bool {
        is_primitive_name(&self.name)
    }

    pub fn is_tuple(&self) -> bool {
        self.name.is_empty() && !self.elements.is_empty()
    }

    /// The schema type name worth asking for rules, if any.
    pub fn schema_name(&self) -> Option<&str> {
        if let Some(wrapper) = &self.wrapper {
            if NON_INPUT_WRAPPERS.contains(&wrapper.as_str()) {
                return None;
            }
        }
        if self.name.is_empty() || self.is_primitive() || NON_INPUT_WRAPPERS.contains(&self.name.as_str()) {
            return None;
        }
        Some(&self.name)
    }
}

pub(crate) fn is_primitive_name(name: &str) -> bool {
    matches!(
        name,
        "String"
            | "str"
            | "i8"
            | "i16"
            | "i32"
            | "i64"
            | "i128"
            | "isize"
            | "u8"
            | "u16"
            | "u32"
            | "u64"
            | "u128"
            | "usize"
            | "f32"
            | "f64"
            | "bool"
            | "char"
            | "Uuid"
            | "Value"
            | "Bytes"
            | "unknown"
    )
}

/// What the catalog knows about a handler function's signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandlerSignature {
    pub inputs: Vec<TypeRef>,
    pub output: Option<TypeRef>,
    /// Doc comment lines, without the leading `///`
    pub docs: Vec<String>,
}

/// A handler reachable by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedHandler {
    /// Owning type or module path (e.g. `crate::handlers::UserController`)
    pub type_path: String,
    /// Handler function name
    pub method: String,
    pub signature: HandlerSignature,
}

impl NamedHandler {
    /// The last segment of the type path.
    pub fn short_name(&self) -> &str {
        self.type_path.rsplit("::").next().unwrap_or(&self.type_path)
    }

    /// Key used by the static response override store.
    pub fn action_key(&self) -> String {
        format!("{}@{}", self.short_name(), self.method)
    }
}

/// Reference to the unit handling a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerRef {
    Named(NamedHandler),
    /// Closure handlers cannot be introspected
    Anonymous,
}

impl HandlerRef {
    pub fn as_named(&self) -> Option<&NamedHandler> {
        match self {
            HandlerRef::Named(named) => Some(named),
            HandlerRef::Anonymous => None,
        }
    }
}

/// One registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHandle {
    /// Normalized URI template (see [`normalize_uri`])
    pub uri: String,
    /// Ordered, deduplicated methods
    pub methods: Vec<HttpMethod>,
    pub middlewares: Vec<String>,
    pub handler: HandlerRef,
}

impl RouteHandle {
    pub fn new(uri: &str, methods: &[HttpMethod], handler: HandlerRef) -> Self {
        let mut unique = Vec::with_capacity(methods.len());
        for method in methods {
            if !unique.contains(method) {
                unique.push(*method);
            }
        }
        Self {
            uri: normalize_uri(uri),
            methods: unique,
            middlewares: Vec::new(),
            handler,
        }
    }

    /// A route served by `type_path::method` with an empty signature.
    pub fn named(uri: &str, methods: &[HttpMethod], type_path: &str, method: &str) -> Self {
        Self::new(
            uri,
            methods,
            HandlerRef::Named(NamedHandler {
                type_path: type_path.to_string(),
                method: method.to_string(),
                signature: HandlerSignature::default(),
            }),
        )
    }

    pub fn anonymous(uri: &str, methods: &[HttpMethod]) -> Self {
        Self::new(uri, methods, HandlerRef::Anonymous)
    }

    pub fn with_middleware(mut self, middleware: impl Into<String>) -> Self {
        self.middlewares.push(middleware.into());
        self
    }

    /// Adds an input type to a named handler's signature.
    pub fn with_input(mut self, input: TypeRef) -> Self {
        if let HandlerRef::Named(named) = &mut self.handler {
            named.signature.inputs.push(input);
        }
        self
    }

    pub fn with_output(mut self, output: TypeRef) -> Self {
        if let HandlerRef::Named(named) = &mut self.handler {
            named.signature.output = Some(output);
        }
        self
    }

    pub fn with_docs(mut self, docs: &[&str]) -> Self {
        if let HandlerRef::Named(named) = &mut self.handler {
            named.signature.docs = docs.iter().map(|d| d.to_string()).collect();
        }
        self
    }

    /// Names of the `{param}` segments, in order.
    pub fn path_parameter_names(&self) -> Vec<String> {
        self.uri
            .split('/')
            .filter(|s| s.starts_with('{') && s.ends_with('}'))
            .map(|s| s.trim_matches(|c| c == '{' || c == '}').trim_end_matches('?').to_string())
            .collect()
    }
}

/// Normalizes a URI template.
///
/// Leading and trailing slashes are dropped (the root becomes `/`), and the
/// Axum `:param` / `*param` forms are rewritten as `{param}`.
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim().trim_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    trimmed
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').or_else(|| segment.strip_prefix('*')) {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix("{*") {
                format!("{{{}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Inserts a route so that each (uri, method) pair has one registration.
///
/// An earlier route with the same method set is replaced in place. Otherwise
/// the new route takes over its methods from earlier routes on the same uri,
/// and routes left without methods are dropped.
pub(crate) fn register_route(routes: &mut Vec<RouteHandle>, route: RouteHandle) {
    if let Some(existing) = routes
        .iter_mut()
        .find(|r| r.uri == route.uri && r.methods == route.methods)
    {
        log::debug!("Route {} re-registered, keeping the last registration", route.uri);
        *existing = route;
        return;
    }

    for earlier in routes.iter_mut().filter(|r| r.uri == route.uri) {
        let before = earlier.methods.len();
        earlier.methods.retain(|m| !route.methods.contains(m));
        if earlier.methods.len() != before {
            log::debug!("Route {} re-registered for some methods, keeping the last registration", route.uri);
        }
    }
    routes.retain(|r| r.uri != route.uri || !r.methods.is_empty());
    routes.push(route);
}

/// Routes registered in code.
#[derive(Debug, Clone, Default)]
pub struct StaticRouteCatalog {
    routes: Vec<RouteHandle>,
}

impl StaticRouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: RouteHandle) -> &mut Self {
        register_route(&mut self.routes, route);
        self
    }

    /// Registers the five conventional resource routes (`index`, `store`,
    /// `show`, `update`, `destroy`) for `name`.
    pub fn resource(&mut self, name: &str, type_path: &str) -> &mut Self {
        let base = normalize_uri(name);
        let param = base
            .rsplit('/')
            .next()
            .unwrap_or(&base)
            .trim_end_matches('s')
            .to_snake_case();
        let item = format!("{}/{{{}}}", base, param);

        self.add(RouteHandle::named(&base, &[HttpMethod::Get, HttpMethod::Head], type_path, "index"));
        self.add(RouteHandle::named(&base, &[HttpMethod::Post], type_path, "store"));
        self.add(RouteHandle::named(&item, &[HttpMethod::Get, HttpMethod::Head], type_path, "show"));
        self.add(RouteHandle::named(&item, &[HttpMethod::Put, HttpMethod::Patch], type_path, "update"));
        self.add(RouteHandle::named(&item, &[HttpMethod::Delete], type_path, "destroy"));
        self
    }
}

impl RouteCatalog for StaticRouteCatalog {
    fn routes(&self) -> &[RouteHandle] {
        &self.routes
    }
}

impl FromIterator<RouteHandle> for StaticRouteCatalog {
    fn from_iter<T: IntoIterator<Item = RouteHandle>>(iter: T) -> Self {
        let mut catalog = StaticRouteCatalog::new();
        for route in iter {
            catalog.add(route);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uri() {
        assert_eq!(normalize_uri("/"), "/");
        assert_eq!(normalize_uri(""), "/");
        assert_eq!(normalize_uri("/api/v1/users/"), "api/v1/users");
        assert_eq!(normalize_uri("/users/:id"), "users/{id}");
        assert_eq!(normalize_uri("/files/*path"), "files/{path}");
        assert_eq!(normalize_uri("/files/{*path}"), "files/{path}");
        assert_eq!(normalize_uri("users/{id}"), "users/{id}");
    }

    #[test]
    fn test_http_method_parse_and_display() {
        assert_eq!(HttpMethod::parse("get"), Some(HttpMethod::Get));
        assert_eq!("DELETE".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(serde_json::to_string(&HttpMethod::Head).unwrap(), "\"HEAD\"");
    }

    #[test]
    fn test_route_handle_dedups_methods() {
        let route = RouteHandle::anonymous(
            "/closure",
            &[HttpMethod::Get, HttpMethod::Post, HttpMethod::Get],
        );
        assert_eq!(route.methods, vec![HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(route.handler.as_named(), None);
    }

    #[test]
    fn test_named_handler_short_name_and_action_key() {
        let route = RouteHandle::named("/", &[HttpMethod::Get], "crate::handlers::WelcomeController", "index");
        let named = route.handler.as_named().unwrap();
        assert_eq!(named.short_name(), "WelcomeController");
        assert_eq!(named.action_key(), "WelcomeController@index");
    }

    #[test]
    fn test_path_parameter_names() {
        let route = RouteHandle::anonymous("/posts/{post}/comments/:comment", &[HttpMethod::Get]);
        assert_eq!(route.path_parameter_names(), vec!["post", "comment"]);
    }

    #[test]
    fn test_type_ref_schema_name() {
        let json = TypeRef::wrapped("Json", TypeRef::new("CreateUser"));
        assert_eq!(json.schema_name(), Some("CreateUser"));

        let state = TypeRef::wrapped("State", TypeRef::new("AppState"));
        assert_eq!(state.schema_name(), None);

        let id = TypeRef::wrapped("Path", TypeRef::new("u32"));
        assert_eq!(id.schema_name(), None);

        let tuple = TypeRef::wrapped("Path", TypeRef::tuple(vec!["u32".into(), "String".into()]));
        assert!(tuple.is_tuple());
        assert_eq!(tuple.schema_name(), None);
    }

    #[test]
    fn test_duplicate_registration_keeps_last_in_place() {
        let mut catalog = StaticRouteCatalog::new();
        catalog.add(RouteHandle::named("/a", &[HttpMethod::Get], "First", "index"));
        catalog.add(RouteHandle::named("/b", &[HttpMethod::Get], "Other", "index"));
        catalog.add(RouteHandle::named("/a", &[HttpMethod::Get], "Second", "index"));

        let routes = catalog.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].handler.as_named().unwrap().type_path, "Second");
        assert_eq!(routes[1].uri, "b");
    }

    #[test]
    fn test_partial_method_overlap_moves_methods_to_last() {
        let mut catalog = StaticRouteCatalog::new();
        catalog.add(RouteHandle::named("/users", &[HttpMethod::Get, HttpMethod::Head], "First", "index"));
        catalog.add(RouteHandle::named("/users", &[HttpMethod::Get], "Second", "index"));

        let routes = catalog.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].methods, vec![HttpMethod::Head]);
        assert_eq!(routes[1].handler.as_named().unwrap().type_path, "Second");

        catalog.add(RouteHandle::named("/users", &[HttpMethod::Get, HttpMethod::Head], "Third", "index"));
        let routes = catalog.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].handler.as_named().unwrap().type_path, "Third");
    }

    #[test]
    fn test_resource_routes() {
        let mut catalog = StaticRouteCatalog::new();
        catalog.resource("accounts", "AccountController");
        catalog.resource("accounts", "AccountController");

        let routes = catalog.routes();
        assert_eq!(routes.len(), 5);
        assert_eq!(routes[2].uri, "accounts/{account}");
        assert_eq!(routes[3].methods, vec![HttpMethod::Put, HttpMethod::Patch]);
    }
}
