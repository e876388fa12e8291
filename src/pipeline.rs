//! The public operations: documentation listing, route list, route details
//! and example responses.

use crate::assembler::{split_by_methods, DocAssembler};
use crate::catalog::source::{SourceProject, SourceRouteCatalog};
use crate::catalog::{Framework, HttpMethod, RouteCatalog, RouteHandle};
use crate::config::DocsConfig;
use crate::doc::{Doc, DocDetail};
use crate::error::{Error, Result};
use crate::grouping::{sort_docs, GroupBy, GroupingEngine, SortBy};
use crate::mock::{EntityDef, EntityRegistry};
use crate::overrides::StaticOverrides;
use crate::response::{ResourceRegistry, ResponseGenerator};
use crate::rules::live::SchemaRegistry;
use crate::rules::source::SourceRuleParser;
use crate::rules::RuleExtractor;
use crate::source_index::SourceIndex;
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use serde_json::Value;

/// Options for [`ApiDocs::docs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocsQuery {
    pub sort: Option<SortBy>,
    pub group_by: Option<GroupBy>,
    /// Further restricts the configured methods
    pub methods: Option<Vec<HttpMethod>>,
}

impl DocsQuery {
    /// Builds a query from raw request parameters. Unknown sort or group
    /// modes are ignored.
    pub fn from_params(sort: Option<&str>, group_by: Option<&str>) -> Self {
        let sort = sort.and_then(|s| {
            s.parse::<SortBy>()
                .map_err(|e| debug!("Ignoring sort parameter: {}", e))
                .ok()
        });
        let group_by = group_by.and_then(|g| {
            g.parse::<GroupBy>()
                .map_err(|e| debug!("Ignoring group parameter: {}", e))
                .ok()
        });
        Self {
            sort,
            group_by,
            methods: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub id: String,
    pub uri: String,
    pub methods: Vec<HttpMethod>,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteGroup {
    pub group: String,
    pub routes: Vec<RouteSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    pub title: String,
    pub default_headers: IndexMap<String, String>,
    pub responses: IndexMap<String, Value>,
}

/// Documentation for one application.
///
/// Nothing is cached: every call reads the catalog and runs the providers
/// again.
pub struct ApiDocs {
    config: DocsConfig,
    catalog: Box<dyn RouteCatalog>,
    schemas: SchemaRegistry,
    source_index: SourceIndex,
    entities: EntityRegistry,
    resources: ResourceRegistry,
    overrides: StaticOverrides,
    grouping: GroupingEngine,
}

impl ApiDocs {
    /// # Errors
    ///
    /// Fails when a configured pattern is not a valid regular expression.
    pub fn new(config: DocsConfig, catalog: impl RouteCatalog + 'static) -> Result<Self> {
        let grouping = GroupingEngine::new(&config.group_by.uri_patterns)?;
        let entities = config.entities.iter().cloned().map(|e| e.into_def()).collect();
        let overrides = StaticOverrides::resolve(config.custom_responses.as_deref());

        let docs = Self {
            config,
            catalog: Box::new(catalog),
            schemas: SchemaRegistry::new(),
            source_index: SourceIndex::default(),
            entities,
            resources: ResourceRegistry::new(),
            overrides,
            grouping,
        };
        docs.assembler()?;
        Ok(docs)
    }

    /// Discovers routes from a parsed project and indexes its methods for
    /// source rule parsing.
    pub fn from_project(
        config: DocsConfig,
        project: &SourceProject,
        frameworks: Option<Vec<Framework>>,
    ) -> Result<Self> {
        let catalog = SourceRouteCatalog::discover(project, frameworks);
        let source_index = SourceIndex::new(&project.files);
        Ok(Self::new(config, catalog)?.with_source_index(source_index))
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn with_source_index(mut self, source_index: SourceIndex) -> Self {
        self.source_index = source_index;
        self
    }

    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.register(entity);
        self
    }

    pub fn with_resources(mut self, resources: ResourceRegistry) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_overrides(mut self, overrides: StaticOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config(&self) -> &DocsConfig {
        &self.config
    }

    pub fn routes(&self) -> &[RouteHandle] {
        self.catalog.routes()
    }

    fn assembler(&self) -> Result<DocAssembler<'_>> {
        let rules = RuleExtractor::new(self.config.rules_methods.clone())
            .with_provider(&self.schemas)
            .with_provider(SourceRuleParser::new(&self.source_index));
        DocAssembler::new(&self.config, rules, &self.entities)
    }

    /// Filter, attach rules, split by method, sort, then group.
    pub fn docs(&self, query: &DocsQuery) -> Result<Vec<Doc>> {
        let mut assembler = self.assembler()?;
        if let Some(methods) = &query.methods {
            let allowed = self
                .config
                .allowed_methods()
                .into_iter()
                .filter(|m| methods.contains(m))
                .collect();
            assembler = assembler.with_allowed_methods(allowed);
        }

        let docs = assembler.list_docs(self.routes());
        debug!("Assembled {} docs", docs.len());
        let docs = split_by_methods(docs);
        let docs = sort_docs(docs, query.sort);
        Ok(self.grouping.group(docs, query.group_by))
    }

    /// Routes grouped for navigation, groups and routes sorted by name.
    pub fn routes_list(&self) -> Result<Vec<RouteGroup>> {
        let docs = split_by_methods(self.assembler()?.list_docs(self.routes()));

        let mut groups: IndexMap<String, Vec<RouteSummary>> = IndexMap::new();
        for doc in docs {
            let Some(id) = doc.id() else { continue };
            let group = navigation_group(&doc.uri);
            groups.entry(group.clone()).or_default().push(RouteSummary {
                id,
                uri: doc.uri,
                methods: doc.methods,
                group,
            });
        }

        let mut list: Vec<RouteGroup> = groups
            .into_iter()
            .map(|(group, mut routes)| {
                routes.sort_by(|a, b| a.uri.cmp(&b.uri));
                RouteGroup { group, routes }
            })
            .collect();
        list.sort_by(|a, b| a.group.cmp(&b.group));
        Ok(list)
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] when no documented route has this id.
    pub fn route_details(&self, id: &str) -> Result<DocDetail> {
        let doc = self
            .assembler()?
            .doc_by_id(self.routes(), id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(DocDetail {
            id: id.to_string(),
            doc,
        })
    }

    /// An example response body; `Ok(None)` when none can be produced.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no documented route has this id.
    pub fn example_response(&self, id: &str) -> Result<Option<Value>> {
        let assembler = self.assembler()?;
        let (route, _, _) = assembler
            .filter()
            .find(self.routes(), id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let generator = ResponseGenerator::new(
            &self.overrides,
            &self.entities,
            &self.resources,
            &self.config.skip_relations,
        );
        Ok(generator.generate(route))
    }

    pub fn config_summary(&self) -> ConfigSummary {
        ConfigSummary {
            title: self.config.title.clone(),
            default_headers: self.config.default_headers.clone(),
            responses: self.config.responses.clone(),
        }
    }
}

/// `api/user-accounts/{id}` -> `User Accounts`.
fn navigation_group(uri: &str) -> String {
    let mut parts = uri.split('/');
    let first = parts.next().unwrap_or_default();
    let segment = if first == "api" { parts.next().unwrap_or_default() } else { first };

    let words: Vec<String> = segment
        .replace(['-', '_'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    let group = words.join(" ");
    if group.trim().is_empty() {
        "default".to_string()
    } else {
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{StaticRouteCatalog, TypeRef};
    use crate::doc::doc_id;
    use crate::mock::{FieldFactory, FieldKind, RelationKind, RelationMeta};
    use crate::rules::live::RuleSchema;
    use crate::rules::RawRules;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct StoreAccount;

    impl RuleSchema for StoreAccount {
        fn call(&self, method: &str) -> Option<anyhow::Result<RawRules>> {
            (method == "rules").then(|| {
                Ok(RawRules::from([
                    ("email".to_string(), "required|email".into()),
                    ("tags.*".to_string(), "string".into()),
                ]))
            })
        }
    }

    fn catalog() -> StaticRouteCatalog {
        let mut catalog = StaticRouteCatalog::new();
        catalog.resource("api/v1/accounts", "handlers::AccountController");
        catalog.add(
            RouteHandle::named("/api/v1/accounts", &[HttpMethod::Post], "handlers::AccountController", "store")
                .with_input(TypeRef::wrapped("Json", TypeRef::new("StoreAccount")))
                .with_output(TypeRef::wrapped("Json", TypeRef::new("AccountResource"))),
        );
        catalog.add(RouteHandle::named("/api/user-settings", &[HttpMethod::Get], "handlers::SettingsController", "show"));
        catalog.add(RouteHandle::anonymous("/", &[HttpMethod::Get]));
        catalog.add(RouteHandle::anonymous("/telescope", &[HttpMethod::Get]));
        catalog
    }

    fn api_docs() -> ApiDocs {
        let mut schemas = SchemaRegistry::new();
        schemas.register::<StoreAccount>("StoreAccount");
        ApiDocs::new(DocsConfig::default(), catalog())
            .unwrap()
            .with_schemas(schemas)
            .with_entity(
                EntityDef::new("Account")
                    .with_factory(FieldFactory::default().field("email", FieldKind::Email))
                    .with_relation(RelationMeta::new("sessions", RelationKind::HasMany, "Session")),
            )
            .with_entity(EntityDef::new("Session").with_factory(FieldFactory::default().field("token", FieldKind::Uuid)))
            .with_overrides(StaticOverrides::new())
    }

    #[test]
    fn test_docs_split_sort_group() {
        let api_docs = api_docs();
        let docs = api_docs
            .docs(&DocsQuery {
                sort: Some(SortBy::MethodNames),
                group_by: Some(GroupBy::ApiUri),
                methods: None,
            })
            .unwrap();

        // 5 resource routes expand to 8 methods, plus settings and root
        assert_eq!(docs.len(), 10);
        assert!(docs.iter().all(|d| d.http_method.is_some() && d.methods.len() == 1));
        assert!(docs.iter().all(|d| !d.uri.starts_with("telescope")));

        let accounts: Vec<_> = docs.iter().filter(|d| d.group == "api/v1/accounts").collect();
        assert_eq!(accounts.len(), 8);
        assert_eq!(accounts.iter().map(|d| d.group_index).collect::<Vec<_>>(), (0..8).collect::<Vec<_>>());
        assert_eq!(accounts[0].http_method, Some(HttpMethod::Get));

        let store = docs.iter().find(|d| d.method == "store").unwrap();
        assert_eq!(store.rules["tags"], vec!["string"]);
        assert!(store.examples.contains_key("email"));
    }

    #[test]
    fn test_query_from_params_ignores_unknown_modes() {
        assert_eq!(
            DocsQuery::from_params(Some("method_names"), Some("by_color")),
            DocsQuery {
                sort: Some(SortBy::MethodNames),
                group_by: None,
                methods: None,
            }
        );
        assert_eq!(DocsQuery::from_params(None, None), DocsQuery::default());
    }

    #[test]
    fn test_docs_are_recomputed_equal() {
        let api_docs = api_docs();
        let query = DocsQuery::default();
        assert_eq!(api_docs.docs(&query).unwrap(), api_docs.docs(&query).unwrap());
    }

    #[test]
    fn test_method_query() {
        let docs = api_docs()
            .docs(&DocsQuery {
                methods: Some(vec![HttpMethod::Delete]),
                ..DocsQuery::default()
            })
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].uri, "api/v1/accounts/{account}");
    }

    #[test]
    fn test_routes_list() {
        let list = api_docs().routes_list().unwrap();
        let names: Vec<&str> = list.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(names, vec!["User Settings", "V1", "default"]);

        let v1 = &list[1];
        assert_eq!(v1.routes.len(), 8);
        assert_eq!(v1.routes[0].uri, "api/v1/accounts");
        assert_eq!(v1.routes[0].id, doc_id(&v1.routes[0].uri, v1.routes[0].methods[0]));
    }

    #[test]
    fn test_route_details() {
        let api_docs = api_docs();
        let id = doc_id("api/v1/accounts/{account}", HttpMethod::Patch);
        let detail = api_docs.route_details(&id).unwrap();

        assert_eq!(detail.id, id);
        assert_eq!(detail.doc.http_method, Some(HttpMethod::Patch));
        assert_eq!(detail.doc.method, "update");

        let err = api_docs.route_details("missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_reregistered_method_resolves_to_last_route() {
        let mut catalog = StaticRouteCatalog::new();
        catalog.add(RouteHandle::named("/users", &[HttpMethod::Get, HttpMethod::Head], "First", "index"));
        catalog.add(RouteHandle::named("/users", &[HttpMethod::Get], "Second", "index"));
        let api_docs = ApiDocs::new(DocsConfig::default(), catalog).unwrap();

        let docs = api_docs.docs(&DocsQuery::default()).unwrap();
        let gets: Vec<&str> = docs
            .iter()
            .filter(|d| d.http_method == Some(HttpMethod::Get))
            .map(|d| d.controller.as_str())
            .collect();
        assert_eq!(gets, vec!["Second"]);

        let detail = api_docs.route_details(&doc_id("users", HttpMethod::Get)).unwrap();
        assert_eq!(detail.doc.controller, "Second");
        let head = api_docs.route_details(&doc_id("users", HttpMethod::Head)).unwrap();
        assert_eq!(head.doc.controller, "First");
    }

    #[test]
    fn test_example_response() {
        let api_docs = api_docs();
        let store = doc_id("api/v1/accounts", HttpMethod::Post);
        let body = api_docs.example_response(&store).unwrap().unwrap();
        assert_eq!(body["sessions"].as_array().map(Vec::len), Some(3));

        let settings = doc_id("api/user-settings", HttpMethod::Get);
        assert_eq!(api_docs.example_response(&settings).unwrap(), None);
        assert!(api_docs.example_response("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_override_bypasses_entities() {
        let mut overrides = StaticOverrides::new();
        overrides.insert("AccountController@store", json!({"static": true}));
        let api_docs = api_docs().with_overrides(overrides);

        let body = api_docs.example_response(&doc_id("api/v1/accounts", HttpMethod::Post)).unwrap();
        assert_eq!(body, Some(json!({"static": true})));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = DocsConfig {
            hide_matching: vec!["[".to_string()],
            ..DocsConfig::default()
        };
        assert!(ApiDocs::new(config, StaticRouteCatalog::new()).is_err());
    }

    #[test]
    fn test_navigation_group() {
        assert_eq!(navigation_group("api/user-accounts/{id}"), "User Accounts");
        assert_eq!(navigation_group("posts_archive"), "Posts Archive");
        assert_eq!(navigation_group("api"), "default");
        assert_eq!(navigation_group("/"), "default");
    }

    #[test]
    fn test_config_summary() {
        let summary = api_docs().config_summary();
        assert_eq!(summary.title, "API Documentation");
        assert!(summary.responses.contains_key("404"));
    }
}
