//! Example response generation for a single route.
//!
//! Order of resolution: a static override for the handler, otherwise the
//! handler's resource type, its backing entity, a materialized entity graph,
//! and finally the resource's projection of that graph.

use crate::catalog::{RouteHandle, TypeRef};
use crate::mock::graph::RelationGraphBuilder;
use crate::mock::{EntityRegistry, FakeInstance};
use crate::overrides::StaticOverrides;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;

/// Suffixes removed from a resource name to find its entity, longest first.
const RESOURCE_SUFFIXES: &[&str] = &["JsonResource", "ApiResource", "Resource"];

/// Shapes a materialized entity the way a resource type would.
pub trait ResourceProjector {
    fn project(&self, instance: &FakeInstance) -> anyhow::Result<Value>;
}

impl<F> ResourceProjector for F
where
    F: Fn(&FakeInstance) -> anyhow::Result<Value>,
{
    fn project(&self, instance: &FakeInstance) -> anyhow::Result<Value> {
        self(instance)
    }
}

/// Projections by resource type name. Unregistered resources serialize the
/// instance as is.
#[derive(Default)]
pub struct ResourceRegistry {
    projectors: IndexMap<String, Box<dyn ResourceProjector>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: &str, projector: impl ResourceProjector + 'static) -> &mut Self {
        self.projectors.insert(resource.to_string(), Box::new(projector));
        self
    }

    pub fn project(&self, resource: &str, instance: &FakeInstance) -> anyhow::Result<Value> {
        match self.projectors.get(resource) {
            Some(projector) => projector.project(instance),
            None => Ok(serde_json::to_value(instance)?),
        }
    }
}

pub struct ResponseGenerator<'a> {
    overrides: &'a StaticOverrides,
    entities: &'a EntityRegistry,
    resources: &'a ResourceRegistry,
    skip_relations: &'a [String],
}

impl<'a> ResponseGenerator<'a> {
    pub fn new(
        overrides: &'a StaticOverrides,
        entities: &'a EntityRegistry,
        resources: &'a ResourceRegistry,
        skip_relations: &'a [String],
    ) -> Self {
        Self {
            overrides,
            entities,
            resources,
            skip_relations,
        }
    }

    /// An example body for `route`, or `None` when none can be produced.
    pub fn generate(&self, route: &RouteHandle) -> Option<Value> {
        let named = route.handler.as_named()?;

        if let Some(body) = self.overrides.get(&named.action_key()) {
            debug!("Using static response for {}", named.action_key());
            return Some(body.clone());
        }

        let resource = named.signature.output.as_ref().filter(|output| output.schema_name().is_some())?;
        let entity = self.entity_for_resource(resource)?;

        let materialized = RelationGraphBuilder::new(self.entities)
            .with_skip_relations(self.skip_relations)
            .materialize(entity)?;
        for skipped in &materialized.skipped {
            warn!("{} example is missing relation {}: {}", resource.name, skipped.name, skipped.reason);
        }

        match self.resources.project(&resource.name, &materialized.root) {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("Projecting {} failed: {:#}", resource.name, e);
                None
            }
        }
    }

    /// The registered entity backing `resource`.
    ///
    /// Tried in order: the resource's own module, the sibling `models` module
    /// when the resource lives under `resources`, then the bare name.
    fn entity_for_resource(&self, resource: &TypeRef) -> Option<&'a str> {
        let model = model_name(&resource.name);
        let module = resource.path.rsplit_once("::").map(|(module, _)| module);

        let mut candidates = Vec::new();
        if let Some(module) = module {
            candidates.push(format!("{}::{}", module, model));
            if module.contains("resources") {
                candidates.push(format!("{}::{}", module.replacen("resources", "models", 1), model));
            }
        }
        candidates.push(model.to_string());

        for candidate in &candidates {
            if let Some(def) = self.entities.get_exact(candidate) {
                return Some(&def.name);
            }
        }
        let found = self.entities.get(model).map(|def| def.name.as_str());
        if found.is_none() {
            debug!("No entity found for resource {} (tried {:?})", resource.name, candidates);
        }
        found
    }
}

/// `UserResource` -> `User`.
fn model_name(resource: &str) -> &str {
    RESOURCE_SUFFIXES
        .iter()
        .find_map(|suffix| resource.strip_suffix(suffix).filter(|m| !m.is_empty()))
        .unwrap_or(resource)
}
