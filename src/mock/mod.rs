//! Fake entity graphs for example responses.
//!
//! Entities are registered in an [`EntityRegistry`], either in code or from
//! the `entities` section of the configuration. An entity with a [`Factory`]
//! can be materialized by [`graph::RelationGraphBuilder`] into a
//! [`FakeInstance`] with its declared relations populated, against a
//! disposable [`store::ScratchStore`].

pub mod faker;
pub mod graph;
pub mod store;

use heck::ToSnakeCase;
use indexmap::IndexMap;
use log::debug;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub use faker::{FieldFactory, FieldKind};

/// Column values of one record.
pub type Attributes = IndexMap<String, Value>;

/// Produces the default attributes of a fake record.
///
/// `seq` increases with every record created during one materialization and
/// can be used to keep generated values distinct.
pub trait Factory {
    fn definition(&self, seq: u64) -> anyhow::Result<Attributes>;
}

impl<F> Factory for F
where
    F: Fn(u64) -> anyhow::Result<Attributes>,
{
    fn definition(&self, seq: u64) -> anyhow::Result<Attributes> {
        self(seq)
    }
}

/// Cardinality and ownership of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    HasOne,
    BelongsTo,
    HasMany,
    BelongsToMany,
    MorphOne,
    MorphMany,
    MorphToMany,
    /// Inverse polymorphic side; loaded but never populated
    MorphTo,
}

impl RelationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            RelationKind::HasMany
                | RelationKind::BelongsToMany
                | RelationKind::MorphMany
                | RelationKind::MorphToMany
        )
    }
}

/// A relation declared on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMeta {
    /// Accessor name, also the key in serialized output
    pub name: String,
    pub kind: RelationKind,
    /// Name of the related entity
    pub related: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morph_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot_table: Option<String>,
}

impl RelationMeta {
    pub fn new(name: &str, kind: RelationKind, related: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            related: related.to_string(),
            foreign_key: None,
            morph_name: None,
            pivot_table: None,
        }
    }

    pub fn with_foreign_key(mut self, column: &str) -> Self {
        self.foreign_key = Some(column.to_string());
        self
    }

    pub fn with_morph_name(mut self, name: &str) -> Self {
        self.morph_name = Some(name.to_string());
        self
    }

    pub fn with_pivot_table(mut self, table: &str) -> Self {
        self.pivot_table = Some(table.to_string());
        self
    }

    /// Foreign key column.
    ///
    /// For `BelongsTo` it lives on the owner (`{relation}_id`); otherwise on
    /// the related table (`{owner}_id`).
    pub fn foreign_key_column(&self, owner: &EntityDef) -> String {
        if let Some(column) = &self.foreign_key {
            return column.clone();
        }
        match self.kind {
            RelationKind::BelongsTo => format!("{}_id", self.name.to_snake_case()),
            _ => format!("{}_id", owner.snake_name()),
        }
    }

    /// Polymorphic column prefix: `{morph}_id` and `{morph}_type`.
    pub fn morph_prefix(&self) -> String {
        match &self.morph_name {
            Some(name) => name.clone(),
            None if self.kind == RelationKind::MorphTo => self.name.to_snake_case(),
            None => format!("{}able", self.related.rsplit("::").next().unwrap_or(&self.related).to_snake_case()),
        }
    }

    /// Join table of a many-to-many relation.
    pub fn pivot_table_name(&self, owner: &EntityDef, related: &EntityDef) -> String {
        if let Some(table) = &self.pivot_table {
            return table.clone();
        }
        match self.kind {
            RelationKind::MorphToMany => format!("{}s", self.morph_prefix()),
            _ => {
                let mut names = [owner.snake_name(), related.snake_name()];
                names.sort();
                names.join("_")
            }
        }
    }
}

/// Why an entity or relation could not be materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    UnknownEntity(String),
    NoFactory(String),
    /// The factory returned an error
    Factory { entity: String, message: String },
    /// The factory panicked
    Panicked { entity: String },
    Store(String),
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockError::UnknownEntity(name) => write!(f, "unknown entity: {}", name),
            MockError::NoFactory(name) => write!(f, "entity {} has no factory", name),
            MockError::Factory { entity, message } => {
                write!(f, "factory for {} failed: {}", entity, message)
            }
            MockError::Panicked { entity } => write!(f, "factory for {} panicked", entity),
            MockError::Store(message) => write!(f, "scratch store error: {}", message),
        }
    }
}

impl std::error::Error for MockError {}

/// An entity type: its table, key, relations and optional factory.
pub struct EntityDef {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub relations: Vec<RelationMeta>,
    factory: Option<Box<dyn Factory>>,
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("relations", &self.relations)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

impl EntityDef {
    /// An entity stored in `{snake_name}s` keyed by `id`.
    pub fn new(name: &str) -> Self {
        let mut def = Self {
            name: name.to_string(),
            table: String::new(),
            primary_key: "id".to_string(),
            relations: Vec::new(),
            factory: None,
        };
        def.table = format!("{}s", def.snake_name());
        def
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn with_primary_key(mut self, column: &str) -> Self {
        self.primary_key = column.to_string();
        self
    }

    pub fn with_relation(mut self, relation: RelationMeta) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_factory(mut self, factory: impl Factory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    pub fn snake_name(&self) -> String {
        self.name.rsplit("::").next().unwrap_or(&self.name).to_snake_case()
    }

    /// Runs the factory for one record, containing errors and panics.
    pub fn make(&self, seq: u64) -> Result<Attributes, MockError> {
        let Some(factory) = &self.factory else {
            return Err(MockError::NoFactory(self.name.clone()));
        };
        match catch_unwind(AssertUnwindSafe(|| factory.definition(seq))) {
            Ok(Ok(attributes)) => Ok(attributes),
            Ok(Err(e)) => Err(MockError::Factory {
                entity: self.name.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(MockError::Panicked {
                entity: self.name.clone(),
            }),
        }
    }
}

/// Declarative entity, as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Field generators; an entity without fields has no factory
    #[serde(default)]
    pub fields: IndexMap<String, FieldKind>,
    #[serde(default)]
    pub relations: Vec<RelationMeta>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl EntityConfig {
    pub fn into_def(self) -> EntityDef {
        let mut def = EntityDef::new(&self.name).with_primary_key(&self.primary_key);
        if let Some(table) = &self.table {
            def = def.with_table(table);
        }
        def.relations = self.relations;
        if !self.fields.is_empty() {
            def = def.with_factory(FieldFactory::new(self.fields));
        }
        def
    }
}

/// All known entities, looked up by exact name, then by short name.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: IndexMap<String, EntityDef>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: EntityDef) -> &mut Self {
        debug!("Registering entity {} ({})", def.name, def.table);
        self.entities.insert(def.name.clone(), def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.get_exact(name).or_else(|| {
            let short = name.rsplit("::").next().unwrap_or(name);
            self.entities
                .values()
                .find(|def| def.name.rsplit("::").next() == Some(short))
        })
    }

    pub fn get_exact(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// An in-memory instance of `name` that is never persisted.
    ///
    /// `Ok(None)` when the entity is unknown or has no factory.
    pub fn make(&self, name: &str) -> Result<Option<Attributes>, MockError> {
        match self.get(name) {
            Some(def) if def.has_factory() => def.make(1).map(Some),
            _ => Ok(None),
        }
    }
}

impl FromIterator<EntityDef> for EntityRegistry {
    fn from_iter<T: IntoIterator<Item = EntityDef>>(iter: T) -> Self {
        let mut registry = EntityRegistry::new();
        for def in iter {
            registry.register(def);
        }
        registry
    }
}

/// A relation as loaded onto an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Loaded {
    One(Option<FakeInstance>),
    Many(Vec<FakeInstance>),
}

impl Loaded {
    pub fn len(&self) -> usize {
        match self {
            Loaded::One(one) => usize::from(one.is_some()),
            Loaded::Many(many) => many.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A materialized record with its loaded relations.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeInstance {
    pub entity: String,
    pub attributes: Attributes,
    pub relations: IndexMap<String, Loaded>,
}

impl FakeInstance {
    pub fn new(entity: &str, attributes: Attributes) -> Self {
        Self {
            entity: entity.to_string(),
            attributes,
            relations: IndexMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    pub fn relation(&self, name: &str) -> Option<&Loaded> {
        self.relations.get(name)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Attributes first, then relations by name.
impl Serialize for FakeInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + self.relations.len()))?;
        for (column, value) in &self.attributes {
            map.serialize_entry(column, value)?;
        }
        for (name, loaded) in &self.relations {
            map.serialize_entry(name, loaded)?;
        }
        map.end()
    }
}
