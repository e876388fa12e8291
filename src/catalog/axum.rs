use super::router::{middleware_name, resolve_mounts, PendingRoute, RouterFn, RouterParts};
use super::source::{handler_segments, string_literal, HandlerIndex, ModuleStack, RouteExtractor};
use super::{HandlerRef, HttpMethod, RouteHandle};
use crate::parser::ParsedFile;
use log::debug;
use syn::{visit::Visit, Expr, ExprMethodCall};

/// Router builder methods that mark the outermost call of a router chain.
const ROUTER_METHODS: &[&str] = &[
    "route",
    "nest",
    "merge",
    "layer",
    "route_layer",
    "with_state",
    "fallback",
];

/// Axum route extractor.
///
/// Router chains are collected per function. `.nest("/p", other())` and
/// `.merge(other())` mount the routes built by `other` under the prefix, so
/// routers split across modules get their full URI.
pub struct AxumExtractor;

impl RouteExtractor for AxumExtractor {
    fn extract_routes(&self, parsed_files: &[ParsedFile], handlers: &HandlerIndex) -> Vec<RouteHandle> {
        let mut visitor = AxumVisitor {
            handlers,
            modules: ModuleStack::default(),
            current: None,
            router_fns: Vec::new(),
        };

        for parsed_file in parsed_files {
            visitor.modules = ModuleStack::new(&parsed_file.module_path);
            visitor.visit_file(&parsed_file.syntax_tree);
        }

        debug!("Found {} functions building Axum routers", visitor.router_fns.len());
        resolve_mounts(&visitor.router_fns)
    }
}

struct AxumVisitor<'a> {
    handlers: &'a HandlerIndex,
    modules: ModuleStack,
    current: Option<RouterFn>,
    router_fns: Vec<RouterFn>,
}

impl AxumVisitor<'_> {
    fn enter_fn(&mut self, ident: &syn::Ident) -> Option<RouterFn> {
        self.current.replace(RouterFn {
            module_path: self.modules.current(),
            name: ident.to_string(),
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

    /// Walks a router chain from its outermost call.
    fn walk(&self, expr: &Expr) -> RouterParts {
        match expr {
            Expr::MethodCall(call) => {
                let mut parts = self.walk(&call.receiver);
                match call.method.to_string().as_str() {
                    "route" => {
                        if let (Some(path), Some(router)) =
                            (call.args.first().and_then(string_literal), call.args.iter().nth(1))
                        {
                            for (methods, handler) in self.method_router(router) {
                                parts.routes.push(PendingRoute {
                                    path: path.clone(),
                                    methods,
                                    handler,
                                    middlewares: Vec::new(),
                                });
                            }
                        }
                    }
                    "nest" => {
                        if let (Some(path), Some(inner)) =
                            (call.args.first().and_then(string_literal), call.args.iter().nth(1))
                        {
                            parts.extend(self.walk(inner).nested_under(&path));
                        }
                    }
                    "merge" => {
                        if let Some(inner) = call.args.first() {
                            parts.extend(self.walk(inner));
                        }
                    }
                    "layer" | "route_layer" => {
                        if let Some(name) = call.args.first().and_then(middleware_name) {
                            parts.apply_layer(&name);
                        }
                    }
                    _ => {}
                }
                parts
            }
            Expr::Call(call) => match handler_segments(&call.func) {
                Some(segments) if !is_router_constructor(&segments) => RouterParts::mount(segments),
                _ => RouterParts::default(),
            },
            Expr::Paren(paren) => self.walk(&paren.expr),
            _ => RouterParts::default(),
        }
    }

    /// Splits a method router such as `get(index).post(store)` into one
    /// entry per distinct handler, keeping first-seen order.
    fn method_router(&self, expr: &Expr) -> Vec<(Vec<HttpMethod>, HandlerRef)> {
        let mut pairs = Vec::new();
        collect_methods(expr, &mut pairs);

        let mut groups: Vec<(Vec<HttpMethod>, Option<Vec<String>>)> = Vec::new();
        for (method, handler) in pairs {
            let existing = handler
                .as_ref()
                .and_then(|h| groups.iter_mut().find(|(_, g)| g.as_ref() == Some(h)));
            match existing {
                Some((methods, _)) => methods.extend(method),
                None => groups.push((method, handler)),
            }
        }

        groups
            .into_iter()
            .map(|(methods, handler)| {
                let handler = match handler {
                    Some(segments) => self.handlers.resolve(&segments, &self.modules.current()),
                    None => HandlerRef::Anonymous,
                };
                (methods, handler)
            })
            .collect()
    }
}

impl<'ast> Visit<'ast> for AxumVisitor<'_> {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let previous = self.enter_fn(&node.sig.ident);
        syn::visit::visit_item_fn(self, node);
        self.leave_fn(previous);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let previous = self.enter_fn(&node.sig.ident);
        syn::visit::visit_impl_item_fn(self, node);
        self.leave_fn(previous);
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.modules.push(&node.ident);
        syn::visit::visit_item_mod(self, node);
        self.modules.pop();
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        if self.current.is_some() && ROUTER_METHODS.contains(&node.method.to_string().as_str()) {
            let parts = self.walk(&Expr::MethodCall(node.clone()));
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

fn is_router_constructor(segments: &[String]) -> bool {
    segments.len() >= 2 && segments[segments.len() - 2] == "Router"
}

/// Collects `(methods, handler path)` pairs from a method router expression.
/// `*_service` routers and closures have no handler path.
fn collect_methods(expr: &Expr, pairs: &mut Vec<(Vec<HttpMethod>, Option<Vec<String>>)>) {
    match expr {
        Expr::Call(call) => {
            if let Some(name) = handler_segments(&call.func).and_then(|s| s.last().cloned()) {
                push_method(&name, call.args.first(), pairs);
            }
        }
        Expr::MethodCall(call) => {
            collect_methods(&call.receiver, pairs);
            push_method(&call.method.to_string(), call.args.first(), pairs);
        }
        Expr::Paren(paren) => collect_methods(&paren.expr, pairs),
        _ => {}
    }
}

fn push_method(
    name: &str,
    handler: Option<&Expr>,
    pairs: &mut Vec<(Vec<HttpMethod>, Option<Vec<String>>)>,
) {
    let (name, is_service) = match name.strip_suffix("_service") {
        Some(stripped) => (stripped, true),
        None => (name, false),
    };
    let methods = match name {
        "any" => HttpMethod::DOCUMENTED.to_vec(),
        other => match HttpMethod::parse(other) {
            Some(method) => vec![method],
            None => return,
        },
    };
    let handler = if is_service { None } else { handler.and_then(handler_segments) };
    pairs.push((methods, handler));
}
