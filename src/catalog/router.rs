//! Router chains shared by the framework extractors.
//!
//! Extractors reduce each function to the routes it declares and the other
//! functions it mounts (`.nest(...)`, `.service(...)`, `.configure(...)`).
//! [`resolve_mounts`] then expands mounted functions under every prefix
//! they are reachable from.

use super::source::{handler_segments, join_paths};
use super::{HandlerRef, HttpMethod, RouteHandle};
use log::debug;
use syn::Expr;

/// Nesting deeper than this is treated as a cycle.
const MAX_MOUNT_DEPTH: usize = 8;

/// A route relative to the router chain that declared it.
#[derive(Debug, Clone)]
pub(crate) struct PendingRoute {
    pub(crate) path: String,
    pub(crate) methods: Vec<HttpMethod>,
    pub(crate) handler: HandlerRef,
    pub(crate) middlewares: Vec<String>,
}

/// A reference to another function whose routes are mounted into this one.
#[derive(Debug, Clone)]
pub(crate) struct Mount {
    target: Vec<String>,
    prefix: String,
    middlewares: Vec<String>,
}

/// Routes and mounts collected from one router chain.
#[derive(Debug, Clone, Default)]
pub(crate) struct RouterParts {
    pub(crate) routes: Vec<PendingRoute>,
    pub(crate) mounts: Vec<Mount>,
}

impl RouterParts {
    pub(crate) fn mount(target: Vec<String>) -> Self {
        Self {
            routes: Vec::new(),
            mounts: vec![Mount {
                target,
                prefix: String::new(),
                middlewares: Vec::new(),
            }],
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.mounts.is_empty()
    }

    pub(crate) fn extend(&mut self, other: RouterParts) {
        self.routes.extend(other.routes);
        self.mounts.extend(other.mounts);
    }

    pub(crate) fn nested_under(mut self, prefix: &str) -> Self {
        for route in &mut self.routes {
            route.path = join_paths(prefix, &route.path);
        }
        for mount in &mut self.mounts {
            mount.prefix = join_paths(prefix, &mount.prefix);
        }
        self
    }

    pub(crate) fn apply_layer(&mut self, middleware: &str) {
        for route in &mut self.routes {
            route.middlewares.push(middleware.to_string());
        }
        for mount in &mut self.mounts {
            mount.middlewares.push(middleware.to_string());
        }
    }
}

/// A function whose body (or route attribute) declares routes.
#[derive(Debug)]
pub(crate) struct RouterFn {
    pub(crate) module_path: String,
    pub(crate) name: String,
    pub(crate) parts: RouterParts,
}

/// Names a middleware from a `.layer(...)` or `.wrap(...)` argument.
pub(crate) fn middleware_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Call(call) => {
            let func = handler_segments(&call.func)?;
            let last = func.last()?;
            if last.starts_with("from_fn") || last.starts_with("from_extractor") {
                return call.args.last().and_then(handler_segments).and_then(|s| s.last().cloned());
            }
            if func.len() >= 2 {
                Some(func[func.len() - 2].clone())
            } else {
                Some(last.clone())
            }
        }
        Expr::MethodCall(call) => middleware_name(&call.receiver),
        Expr::Path(_) => handler_segments(expr).and_then(|s| s.last().cloned()),
        Expr::Paren(paren) => middleware_name(&paren.expr),
        _ => None,
    }
}

/// Finds the router function a mount points at, preferring the caller's
/// module for unqualified calls.
fn find_target(router_fns: &[RouterFn], caller: &RouterFn, target: &[String]) -> Option<usize> {
    let (name, qualifier) = target.split_last()?;
    let qualifier: Vec<&str> = qualifier
        .iter()
        .map(String::as_str)
        .skip_while(|s| matches!(*s, "crate" | "self" | "super"))
        .collect();
    let qualifier = qualifier.join("::");

    let named = || router_fns.iter().enumerate().filter(|(_, f)| &f.name == name);
    let found = if qualifier.is_empty() {
        named().find(|(_, f)| f.module_path == caller.module_path)
    } else {
        named().find(|(_, f)| f.module_path.ends_with(&format!("::{}", qualifier)))
    };
    found.or_else(|| named().next()).map(|(i, _)| i)
}

/// Every (prefix, middlewares) context a router function is mounted under.
/// Middlewares are listed innermost first.
fn contexts(
    index: usize,
    referrers: &[Vec<(usize, Mount)>],
    depth: usize,
) -> Vec<(String, Vec<String>)> {
    if referrers[index].is_empty() {
        return vec![(String::new(), Vec::new())];
    }
    if depth >= MAX_MOUNT_DEPTH {
        debug!("Router mount depth exceeded, ignoring deeper mounts");
        return Vec::new();
    }

    let mut found = Vec::new();
    for (parent, mount) in &referrers[index] {
        for (prefix, middlewares) in contexts(*parent, referrers, depth + 1) {
            let mut combined = mount.middlewares.clone();
            combined.extend(middlewares);
            found.push((join_paths(&prefix, &mount.prefix), combined));
        }
    }
    found
}

/// Expands every router function under each prefix it is mounted at.
/// Functions nothing mounts are served from the root.
pub(crate) fn resolve_mounts(router_fns: &[RouterFn]) -> Vec<RouteHandle> {
    let mut referrers: Vec<Vec<(usize, Mount)>> = vec![Vec::new(); router_fns.len()];
    for (parent, router_fn) in router_fns.iter().enumerate() {
        for mount in &router_fn.parts.mounts {
            match find_target(router_fns, router_fn, &mount.target) {
                Some(child) if child != parent => referrers[child].push((parent, mount.clone())),
                Some(_) => {}
                None => debug!("Mounted router {} not found", mount.target.join("::")),
            }
        }
    }

    let mut routes = Vec::new();
    for (index, router_fn) in router_fns.iter().enumerate() {
        let mut mounted_under = contexts(index, &referrers, 0);
        if mounted_under.is_empty() {
            mounted_under.push((String::new(), Vec::new()));
        }

        for (prefix, middlewares) in &mounted_under {
            for pending in &router_fn.parts.routes {
                let mut route = RouteHandle::new(
                    &join_paths(prefix, &pending.path),
                    &pending.methods,
                    pending.handler.clone(),
                );
                route.middlewares = pending.middlewares.iter().chain(middlewares).cloned().collect();
                routes.push(route);
            }
        }
    }
    routes
}
