//! Builds [`Doc`] records from catalog routes.

use crate::catalog::{HandlerRef, HttpMethod, NamedHandler, RouteHandle, TypeRef};
use crate::config::DocsConfig;
use crate::doc::{doc_id, Doc};
use crate::error::{Error, Result};
use crate::mock::EntityRegistry;
use crate::rules::RuleExtractor;
use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use log::debug;
use regex::Regex;

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Decides which routes, and which of their methods, are documented.
#[derive(Debug, Clone)]
pub struct RouteFilter {
    prefix: String,
    hidden: Vec<Regex>,
    allowed: Vec<HttpMethod>,
}

impl RouteFilter {
    /// `prefix` is matched against normalized URIs, so a leading `/` is
    /// ignored.
    pub fn new(prefix: &str, hide_matching: &[String], allowed: Vec<HttpMethod>) -> Result<Self> {
        Ok(Self {
            prefix: prefix.trim_start_matches('/').to_string(),
            hidden: hide_matching.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            allowed,
        })
    }

    pub fn from_config(config: &DocsConfig) -> Result<Self> {
        Self::new(
            &config.only_route_uri_start_with,
            &config.hide_matching,
            config.allowed_methods(),
        )
    }

    pub fn with_allowed(mut self, allowed: Vec<HttpMethod>) -> Self {
        self.allowed = allowed;
        self
    }

    /// The route's methods that survive filtering, or `None` when the route
    /// is dropped.
    pub fn methods_for(&self, route: &RouteHandle) -> Option<Vec<HttpMethod>> {
        if !self.prefix.is_empty() && !route.uri.starts_with(&self.prefix) {
            return None;
        }
        if let Some(pattern) = self.hidden.iter().find(|re| re.is_match(&route.uri)) {
            debug!("Hiding {} (matches {})", route.uri, pattern.as_str());
            return None;
        }

        let methods: Vec<HttpMethod> = route
            .methods
            .iter()
            .filter(|m| self.allowed.contains(*m))
            .copied()
            .collect();
        (!methods.is_empty()).then_some(methods)
    }

    /// The first route, its surviving methods and the method whose
    /// `md5("{uri}:{METHOD}")` is `id`.
    pub fn find<'r>(&self, routes: &'r [RouteHandle], id: &str) -> Option<(&'r RouteHandle, Vec<HttpMethod>, HttpMethod)> {
        routes.iter().find_map(|route| {
            let methods = self.methods_for(route)?;
            let method = methods.iter().copied().find(|m| doc_id(&route.uri, *m) == id)?;
            Some((route, methods, method))
        })
    }
}

/// Turns routes into documentation records.
pub struct DocAssembler<'a> {
    config: &'a DocsConfig,
    filter: RouteFilter,
    rules: RuleExtractor<'a>,
    entities: &'a EntityRegistry,
    model_pattern: Regex,
}

impl<'a> DocAssembler<'a> {
    pub fn new(config: &'a DocsConfig, rules: RuleExtractor<'a>, entities: &'a EntityRegistry) -> Result<Self> {
        Ok(Self {
            config,
            filter: RouteFilter::from_config(config)?,
            rules,
            entities,
            model_pattern: compile(&config.pattern_model_from_controller_name)?,
        })
    }

    /// Restricts the documented methods further than the configuration does.
    pub fn with_allowed_methods(mut self, allowed: Vec<HttpMethod>) -> Self {
        self.filter = self.filter.with_allowed(allowed);
        self
    }

    /// One Doc per surviving route, with rules attached. Not yet split.
    pub fn list_docs(&self, routes: &[RouteHandle]) -> Vec<Doc> {
        routes
            .iter()
            .filter_map(|route| {
                let methods = self.filter.methods_for(route)?;
                let mut doc = self.create_doc(route, methods);
                self.append_rules(&mut doc, route);
                Some(doc)
            })
            .collect()
    }

    /// The Doc for `id`, built from the first route and method producing it.
    pub fn doc_by_id(&self, routes: &[RouteHandle], id: &str) -> Option<Doc> {
        let (route, methods, method) = self.filter.find(routes, id)?;
        let mut doc = self.create_doc(route, methods).for_method(method);
        self.append_rules(&mut doc, route);
        Some(doc)
    }

    pub fn filter(&self) -> &RouteFilter {
        &self.filter
    }

    pub fn create_doc(&self, route: &RouteHandle, methods: Vec<HttpMethod>) -> Doc {
        let mut doc = Doc::new(route.uri.clone(), methods);
        doc.rules_order = self.config.rules_order.clone();
        doc.path_parameters = path_parameters(route);

        if let HandlerRef::Named(named) = &route.handler {
            let (summary, description) = split_docs(&named.signature.docs);
            doc.summary = summary;
            doc.description = description;

            if !self.config.hide_meta_data {
                doc.middlewares = route.middlewares.clone();
                doc.controller = named.short_name().to_string();
                doc.controller_full_path = named.type_path.clone();
                doc.method = named.method.clone();
            }
        }
        doc
    }

    /// Merges rules, field info and factory examples for every schema input.
    pub fn append_rules(&self, doc: &mut Doc, route: &RouteHandle) {
        let Some(named) = route.handler.as_named() else {
            return;
        };

        for schema in named.signature.inputs.iter().filter_map(TypeRef::schema_name) {
            let extraction = self.rules.extract(schema);
            for failure in &extraction.failures {
                debug!("{} {}: {}", route.uri, schema, failure);
            }
            let found_rules = !extraction.rules.is_empty();
            doc.merge_rules(extraction.rules);

            if self.config.use_factory && found_rules {
                self.append_example(doc, named);
            }
            if let Some(field_info) = extraction.field_info {
                doc.field_info = field_info;
            }
        }
    }

    /// Adds an in-memory instance of the handler's entity as field examples.
    fn append_example(&self, doc: &mut Doc, named: &NamedHandler) {
        let stripped = self.model_pattern.replace(named.short_name(), "").to_string();
        let camel = stripped.to_upper_camel_case();
        let candidates = [stripped.clone(), camel.clone(), camel.trim_end_matches('s').to_string()];

        let Some(model) = candidates.iter().find(|c| !c.is_empty() && self.entities.contains(c)) else {
            return;
        };

        match self.entities.make(model) {
            Ok(Some(attributes)) => {
                let examples: IndexMap<_, _> = attributes
                    .into_iter()
                    .filter(|(field, _)| !self.config.exclude_fields.contains(field))
                    .collect();
                doc.merge_examples(examples);
            }
            Ok(None) => {}
            Err(e) => debug!("No example for {}: {}", model, e),
        }
    }
}

/// One Doc per method, each narrowed to that method.
pub fn split_by_methods(docs: Vec<Doc>) -> Vec<Doc> {
    docs.iter()
        .flat_map(|doc| doc.methods.iter().map(move |method| doc.for_method(*method)))
        .collect()
}

/// `{name}` segments as `name => ["required|<type>"]`, typed from the
/// handler's `Path` extractor.
fn path_parameters(route: &RouteHandle) -> IndexMap<String, Vec<String>> {
    let names = route.path_parameter_names();
    let path_input = route.handler.as_named().and_then(|named| {
        named
            .signature
            .inputs
            .iter()
            .find(|input| input.wrapper.as_deref() == Some("Path"))
    });

    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let type_name = match path_input {
                Some(input) if input.is_tuple() => input.elements.get(i).map(String::as_str),
                Some(input) if names.len() == 1 => Some(input.name.as_str()),
                _ => None,
            };
            (name.clone(), vec![format!("required|{}", rule_type(type_name))])
        })
        .collect()
}

fn rule_type(type_name: Option<&str>) -> &'static str {
    match type_name {
        Some("i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128" | "usize") => {
            "integer"
        }
        Some("f32" | "f64") => "numeric",
        Some("bool") => "boolean",
        _ => "string",
    }
}

/// First paragraph as summary, the rest as description.
fn split_docs(lines: &[String]) -> (String, String) {
    let mut paragraphs = lines.split(|line| line.trim().is_empty()).filter(|p| !p.is_empty());
    let summary = paragraphs
        .next()
        .map(|p| p.iter().map(|l| l.trim()).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let description = paragraphs
        .map(|p| p.iter().map(|l| l.trim_end()).collect::<Vec<_>>().join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n");
    (summary, description)
}
