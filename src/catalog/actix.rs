use super::router::{middleware_name, resolve_mounts, PendingRoute, RouterFn, RouterParts};
use super::source::{handler_segments, string_literal, HandlerIndex, ModuleStack, RouteExtractor};
use super::{HandlerRef, HttpMethod, RouteHandle};
use crate::parser::ParsedFile;
use log::debug;
use syn::punctuated::Punctuated;
use syn::{visit::Visit, Attribute, Expr, ExprMethodCall, Token};

/// App, scope and service-config methods that register routes.
const REGISTRATION_METHODS: &[&str] = &["service", "route", "configure", "wrap", "default_service"];

/// Actix-Web route extractor.
///
/// Functions annotated with `#[get("/path")]` (or `#[route(...)]`) declare a
/// route; `.service(handler)` calls inside `web::scope("/prefix")` chains
/// mount it under the scope. Handlers never registered through a scope are
/// served at their attribute path. `.configure(f)` mounts everything `f`
/// registers on its `ServiceConfig`.
pub struct ActixExtractor;

impl RouteExtractor for ActixExtractor {
    fn extract_routes(&self, parsed_files: &[ParsedFile], handlers: &HandlerIndex) -> Vec<RouteHandle> {
        let mut visitor = ActixVisitor {
            handlers,
            modules: ModuleStack::default(),
            current: None,
            router_fns: Vec::new(),
        };

        for parsed_file in parsed_files {
            visitor.modules = ModuleStack::new(&parsed_file.module_path);
            visitor.visit_file(&parsed_file.syntax_tree);
        }

        debug!("Found {} Actix route declarations", visitor.router_fns.len());
        resolve_mounts(&visitor.router_fns)
    }
}

struct ActixVisitor<'a> {
    handlers: &'a HandlerIndex,
    modules: ModuleStack,
    current: Option<RouterFn>,
    router_fns: Vec<RouterFn>,
}

impl ActixVisitor<'_> {
    fn enter_fn(&mut self, ident: &syn::Ident, attrs: &[Attribute]) -> Option<RouterFn> {
        let module_path = self.modules.current();
        let name = ident.to_string();

        let mut declared = RouterParts::default();
        for attr in attrs {
            if let Some(route) = self.route_attribute(attr, &name) {
                declared.routes.push(route);
            }
        }
        if !declared.is_empty() {
            self.router_fns.push(RouterFn {
                module_path: module_path.clone(),
                name: name.clone(),
                parts: declared,
            });
        }

        self.current.replace(RouterFn {
            module_path,
            name,
            parts: RouterParts::default(),
        })
    }

    fn leave_fn(&mut self, previous: Option<RouterFn>) {
        if let Some(finished) = std::mem::replace(&mut self.current, previous) {
            if !finished.parts.is_empty() {
                self.router_fns.push(finished);
            }
        }
    }

    /// Parses `#[get("/path")]`, `#[route("/path", method = "GET", method = "POST")]`
    /// and their `wrap = "..."` arguments.
    fn route_attribute(&self, attr: &Attribute, fn_name: &str) -> Option<PendingRoute> {
        let attr_name = attr.path().segments.last()?.ident.to_string();
        let mut methods = match attr_name.as_str() {
            "route" => Vec::new(),
            other => vec![HttpMethod::parse(other)?],
        };

        let args = attr
            .parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated)
            .ok()?;
        let mut args = args.iter();
        let path = args.next().and_then(string_literal)?;

        let mut middlewares = Vec::new();
        for arg in args {
            let Expr::Assign(assign) = arg else { continue };
            let Some(value) = string_literal(&assign.right) else { continue };
            match handler_segments(&assign.left).as_deref() {
                Some([key]) if key == "method" => methods.extend(HttpMethod::parse(&value)),
                Some([key]) if key == "wrap" => {
                    if let Some(name) = syn::parse_str::<Expr>(&value).ok().as_ref().and_then(middleware_name) {
                        middlewares.push(name);
                    }
                }
                _ => {}
            }
        }

        if methods.is_empty() {
            debug!("Route attribute on {} declares no method", fn_name);
            return None;
        }

        Some(PendingRoute {
            path,
            methods,
            handler: self
                .handlers
                .resolve(&[fn_name.to_string()], &self.modules.current()),
            middlewares,
        })
    }

    /// Walks an `App`, scope or `ServiceConfig` registration chain.
    fn walk(&self, expr: &Expr) -> RouterParts {
        match expr {
            Expr::MethodCall(call) => {
                let mut parts = self.walk(&call.receiver);
                let first = call.args.first();
                match call.method.to_string().as_str() {
                    "service" | "default_service" => {
                        if let Some(arg) = first {
                            parts.extend(self.service(arg));
                        }
                    }
                    "configure" => {
                        if let Some(target) = first.and_then(handler_segments) {
                            parts.extend(RouterParts::mount(target));
                        }
                    }
                    "route" if call.args.len() == 2 => {
                        if let (Some(path), Some(def)) =
                            (first.and_then(string_literal), call.args.iter().nth(1))
                        {
                            parts.routes.extend(self.route_definition(def, &path));
                        }
                    }
                    "route" => {
                        if let Some(def) = first {
                            parts.routes.extend(self.route_definition(def, ""));
                        }
                    }
                    "to" => {
                        // web::resource("/p").to(handler) answers every method
                        if let Some(handler) = first {
                            parts.routes.push(PendingRoute {
                                path: String::new(),
                                methods: HttpMethod::DOCUMENTED.to_vec(),
                                handler: self.handler(handler),
                                middlewares: Vec::new(),
                            });
                        }
                    }
                    _ => {}
                }
                parts
            }
            Expr::Call(call) => match handler_segments(&call.func) {
                Some(segments) if !is_builder(&segments) => RouterParts::mount(segments),
                _ => RouterParts::default(),
            },
            Expr::Paren(paren) => self.walk(&paren.expr),
            _ => RouterParts::default(),
        }
    }

    /// Walks a whole chain; `.wrap(...)` covers everything the chain
    /// registers, wherever it appears.
    fn registration(&self, expr: &Expr) -> RouterParts {
        let mut parts = self.walk(expr);
        for middleware in chain_wraps(expr) {
            parts.apply_layer(&middleware);
        }
        parts
    }

    /// A `.service(...)` argument: an attribute-routed handler, or a
    /// scope/resource chain whose prefix applies to everything it registers.
    fn service(&self, arg: &Expr) -> RouterParts {
        if let Expr::Path(_) = arg {
            return handler_segments(arg).map(RouterParts::mount).unwrap_or_default();
        }

        let parts = self.registration(arg);
        match chain_prefix(arg) {
            Some(prefix) => parts.nested_under(&prefix),
            None => parts,
        }
    }

    /// `web::get().to(handler)`, `web::route().method(Method::PUT).to(handler)`.
    fn route_definition(&self, expr: &Expr, path: &str) -> Option<PendingRoute> {
        let mut methods = Vec::new();
        let mut handler = None;
        let mut current = expr;

        loop {
            match current {
                Expr::MethodCall(call) => {
                    match call.method.to_string().as_str() {
                        "to" => handler = call.args.first().map(|h| self.handler(h)),
                        "method" => methods.extend(
                            call.args
                                .first()
                                .and_then(handler_segments)
                                .and_then(|s| s.last().and_then(|m| HttpMethod::parse(m))),
                        ),
                        _ => {}
                    }
                    current = &call.receiver;
                }
                Expr::Call(call) => {
                    methods.extend(
                        handler_segments(&call.func)
                            .and_then(|s| s.last().and_then(|m| HttpMethod::parse(m))),
                    );
                    break;
                }
                _ => break,
            }
        }

        if methods.is_empty() {
            methods = HttpMethod::DOCUMENTED.to_vec();
        } else {
            methods.reverse();
        }

        Some(PendingRoute {
            path: path.to_string(),
            methods,
            handler: handler?,
            middlewares: Vec::new(),
        })
    }

    fn handler(&self, expr: &Expr) -> HandlerRef {
        match handler_segments(expr) {
            Some(segments) => self.handlers.resolve(&segments, &self.modules.current()),
            None => HandlerRef::Anonymous,
        }
    }
}

impl<'ast> Visit<'ast> for ActixVisitor<'_> {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let previous = self.enter_fn(&node.sig.ident, &node.attrs);
        syn::visit::visit_item_fn(self, node);
        self.leave_fn(previous);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let previous = self.enter_fn(&node.sig.ident, &node.attrs);
        syn::visit::visit_impl_item_fn(self, node);
        self.leave_fn(previous);
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.modules.push(&node.ident);
        syn::visit::visit_item_mod(self, node);
        self.modules.pop();
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        if self.current.is_some() && REGISTRATION_METHODS.contains(&node.method.to_string().as_str()) {
            let parts = self.registration(&Expr::MethodCall(node.clone()));
            if !parts.is_empty() {
                if let Some(current) = &mut self.current {
                    current.parts.extend(parts);
                }
                return;
            }
        }
        syn::visit::visit_expr_method_call(self, node);
    }
}

/// Constructors that start a chain rather than mount another function.
fn is_builder(segments: &[String]) -> bool {
    matches!(
        segments.last().map(String::as_str),
        Some("new" | "default" | "scope" | "resource")
    ) || segments
        .last()
        .and_then(|s| HttpMethod::parse(s))
        .is_some()
}

/// Middleware names from `.wrap(...)` calls along a chain, in call order.
fn chain_wraps(expr: &Expr) -> Vec<String> {
    let mut wraps = Vec::new();
    let mut current = expr;
    while let Expr::MethodCall(call) = current {
        if matches!(call.method.to_string().as_str(), "wrap" | "wrap_fn") {
            wraps.extend(call.args.first().and_then(middleware_name));
        }
        current = &call.receiver;
    }
    wraps.reverse();
    wraps
}

/// The path of the `web::scope(...)` / `web::resource(...)` call a chain
/// starts from.
fn chain_prefix(expr: &Expr) -> Option<String> {
    let mut current = expr;
    while let Expr::MethodCall(call) = current {
        current = &call.receiver;
    }
    let Expr::Call(call) = current else { return None };
    let segments = handler_segments(&call.func)?;
    match segments.last().map(String::as_str) {
        Some("scope" | "resource") => call.args.first().and_then(string_literal),
        _ => None,
    }
}
