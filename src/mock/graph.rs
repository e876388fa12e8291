use super::store::{with_scratch_store, ScratchStore};
use super::{Attributes, EntityDef, EntityRegistry, FakeInstance, Loaded, MockError, RelationKind, RelationMeta};
use log::{debug, warn};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Relations never populated unless configured otherwise.
pub const DEFAULT_SKIP_RELATIONS: &[&str] = &["audits"];

/// Records created for every to-many relation.
pub const TO_MANY_COUNT: usize = 3;

/// A relation that could not be populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRelation {
    pub name: String,
    pub reason: MockError,
}

/// The populated root and whatever had to be left out.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub root: FakeInstance,
    pub skipped: Vec<SkippedRelation>,
}

type Populate = fn(&Context<'_>, &RelationMeta, &EntityDef, &mut ScratchStore) -> Result<(), MockError>;

/// Owner-side state shared by the per-kind handlers.
struct Context<'a> {
    owner: &'a EntityDef,
    key: Value,
}

/// Builds a fake entity with its relations populated.
pub struct RelationGraphBuilder<'a> {
    registry: &'a EntityRegistry,
    skip: Vec<String>,
}

impl<'a> RelationGraphBuilder<'a> {
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self {
            registry,
            skip: DEFAULT_SKIP_RELATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_skip_relations(mut self, skip: &[String]) -> Self {
        self.skip = skip.to_vec();
        self
    }

    /// Materializes `entity` inside a fresh scratch store.
    ///
    /// Returns `None` when the entity is unknown, has no factory, or its root
    /// record cannot be created. Relation failures never abort: they are
    /// reported in [`Materialized::skipped`].
    pub fn materialize(&self, entity: &str) -> Option<Materialized> {
        let Some(def) = self.registry.get(entity) else {
            debug!("No entity registered for {}", entity);
            return None;
        };
        if !def.has_factory() {
            debug!("Entity {} has no factory, nothing to materialize", def.name);
            return None;
        }

        with_scratch_store(self.registry, |store| self.build(def, store))
    }

    fn build(&self, def: &EntityDef, store: &mut ScratchStore) -> Option<Materialized> {
        let root = match create(def, store, Attributes::new()) {
            Ok(root) => root,
            Err(e) => {
                warn!("Could not create {}: {}", def.name, e);
                return None;
            }
        };
        let context = Context {
            owner: def,
            key: root.get(&def.primary_key).cloned().unwrap_or(Value::Null),
        };

        let mut populated = Vec::new();
        let mut skipped = Vec::new();

        for relation in &def.relations {
            if self.skip.contains(&relation.name) {
                debug!("Skipping relation {}.{}", def.name, relation.name);
                continue;
            }
            let Some(related) = self.registry.get(&relation.related) else {
                debug!("Relation {}.{} targets unknown entity {}", def.name, relation.name, relation.related);
                continue;
            };
            if !related.has_factory() && relation.kind != RelationKind::MorphTo {
                debug!("Relation {}.{}: {} has no factory", def.name, relation.name, related.name);
                continue;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| populate(relation.kind)(&context, relation, related, store)));
            match outcome {
                Ok(Ok(())) => populated.push(relation),
                Ok(Err(reason)) => {
                    warn!("Skipping relation {}.{}: {}", def.name, relation.name, reason);
                    skipped.push(SkippedRelation {
                        name: relation.name.clone(),
                        reason,
                    });
                }
                Err(_) => {
                    warn!("Skipping relation {}.{}: populating it panicked", def.name, relation.name);
                    skipped.push(SkippedRelation {
                        name: relation.name.clone(),
                        reason: MockError::Panicked {
                            entity: related.name.clone(),
                        },
                    });
                }
            }
        }

        // BelongsTo handlers update the root row, so read it back
        let attributes = store.find(&def.table, &context.key).cloned().unwrap_or(root);
        let mut instance = FakeInstance::new(&def.name, attributes);
        for relation in populated {
            let loaded = self.load(def, &instance, relation, store);
            instance.relations.insert(relation.name.clone(), loaded);
        }

        Some(Materialized { root: instance, skipped })
    }

    /// Reads a relation of `root` back from the store.
    fn load(&self, owner: &EntityDef, root: &FakeInstance, relation: &RelationMeta, store: &ScratchStore) -> Loaded {
        let key = root.get(&owner.primary_key).cloned().unwrap_or(Value::Null);
        let owner_type = Value::from(owner.name.clone());
        let instance = |def: &EntityDef, row: &Attributes| FakeInstance::new(&def.name, row.clone());

        if relation.kind == RelationKind::MorphTo {
            let prefix = relation.morph_prefix();
            let target = root
                .get(&format!("{}_type", prefix))
                .and_then(Value::as_str)
                .and_then(|name| self.registry.get(name));
            let id = root.get(&format!("{}_id", prefix));
            let found = target.zip(id).and_then(|(def, id)| store.find(&def.table, id).map(|row| instance(def, row)));
            return Loaded::One(found);
        }

        let Some(related) = self.registry.get(&relation.related) else {
            return Loaded::One(None);
        };

        match relation.kind {
            RelationKind::HasOne | RelationKind::HasMany => {
                let column = relation.foreign_key_column(owner);
                let rows = store.where_all(&related.table, &[(column.as_str(), &key)]);
                collect(relation.kind, rows.into_iter().map(|row| instance(related, row)))
            }
            RelationKind::MorphOne | RelationKind::MorphMany => {
                let prefix = relation.morph_prefix();
                let (id_column, type_column) = (format!("{}_id", prefix), format!("{}_type", prefix));
                let rows = store.where_all(
                    &related.table,
                    &[(id_column.as_str(), &key), (type_column.as_str(), &owner_type)],
                );
                collect(relation.kind, rows.into_iter().map(|row| instance(related, row)))
            }
            RelationKind::BelongsTo => {
                let column = relation.foreign_key_column(owner);
                let found = root
                    .get(&column)
                    .and_then(|id| store.find(&related.table, id))
                    .map(|row| instance(related, row));
                Loaded::One(found)
            }
            RelationKind::BelongsToMany | RelationKind::MorphToMany => {
                let pivot = relation.pivot_table_name(owner, related);
                let (owner_column, morph_type) = owner_pivot_columns(relation, owner);
                let related_column = format!("{}_id", related.snake_name());
                let related_rows = store
                    .pivot_rows(&pivot)
                    .iter()
                    .filter(|row| row.get(&owner_column) == Some(&key))
                    .filter(|row| match &morph_type {
                        Some((column, _)) => row.get(column) == Some(&owner_type),
                        None => true,
                    })
                    .filter_map(|row| row.get(&related_column))
                    .filter_map(|id| store.find(&related.table, id))
                    .map(|row| instance(related, row))
                    .collect();
                Loaded::Many(related_rows)
            }
            RelationKind::MorphTo => Loaded::One(None),
        }
    }
}

fn collect(kind: RelationKind, instances: impl Iterator<Item = FakeInstance>) -> Loaded {
    if kind.is_to_many() {
        Loaded::Many(instances.collect())
    } else {
        Loaded::One(instances.into_iter().next())
    }
}

/// The handler populating one relation kind.
fn populate(kind: RelationKind) -> Populate {
    match kind {
        RelationKind::HasOne | RelationKind::MorphOne => populate_one,
        RelationKind::BelongsTo => populate_belongs_to,
        RelationKind::HasMany | RelationKind::MorphMany => populate_many,
        RelationKind::BelongsToMany | RelationKind::MorphToMany => populate_pivot,
        RelationKind::MorphTo => populate_nothing,
    }
}

/// Runs the factory, applies `overrides` and persists the record.
fn create(def: &EntityDef, store: &mut ScratchStore, overrides: Attributes) -> Result<Attributes, MockError> {
    let seq = store.next_sequence();
    let mut attributes = def.make(seq)?;
    attributes.extend(overrides);
    store.insert(&def.table, attributes)
}

/// Columns on the related side pointing back to the owner.
fn owner_columns(context: &Context<'_>, relation: &RelationMeta) -> Attributes {
    let mut columns = Attributes::new();
    match relation.kind {
        RelationKind::MorphOne | RelationKind::MorphMany => {
            let prefix = relation.morph_prefix();
            columns.insert(format!("{}_id", prefix), context.key.clone());
            columns.insert(format!("{}_type", prefix), Value::from(context.owner.name.clone()));
        }
        _ => {
            columns.insert(relation.foreign_key_column(context.owner), context.key.clone());
        }
    }
    columns
}

/// Owner key column in a pivot row, plus the morph type column when polymorphic.
fn owner_pivot_columns(relation: &RelationMeta, owner: &EntityDef) -> (String, Option<(String, String)>) {
    if relation.kind == RelationKind::MorphToMany {
        let prefix = relation.morph_prefix();
        (
            format!("{}_id", prefix),
            Some((format!("{}_type", prefix), owner.name.clone())),
        )
    } else {
        (relation.foreign_key_column(owner), None)
    }
}

fn populate_one(
    context: &Context<'_>,
    relation: &RelationMeta,
    related: &EntityDef,
    store: &mut ScratchStore,
) -> Result<(), MockError> {
    create(related, store, owner_columns(context, relation))?;
    Ok(())
}

fn populate_belongs_to(
    context: &Context<'_>,
    relation: &RelationMeta,
    related: &EntityDef,
    store: &mut ScratchStore,
) -> Result<(), MockError> {
    let parent = create(related, store, Attributes::new())?;
    let parent_key = parent.get(&related.primary_key).cloned().unwrap_or(Value::Null);
    let column = relation.foreign_key_column(context.owner);
    store.update(&context.owner.table, &context.key, Attributes::from([(column, parent_key)]))?;
    Ok(())
}

fn populate_many(
    context: &Context<'_>,
    relation: &RelationMeta,
    related: &EntityDef,
    store: &mut ScratchStore,
) -> Result<(), MockError> {
    for _ in 0..TO_MANY_COUNT {
        create(related, store, owner_columns(context, relation))?;
    }
    Ok(())
}

fn populate_pivot(
    context: &Context<'_>,
    relation: &RelationMeta,
    related: &EntityDef,
    store: &mut ScratchStore,
) -> Result<(), MockError> {
    let pivot = relation.pivot_table_name(context.owner, related);
    let (owner_column, morph_type) = owner_pivot_columns(relation, context.owner);
    let related_column = format!("{}_id", related.snake_name());

    let mut created = Vec::with_capacity(TO_MANY_COUNT);
    for _ in 0..TO_MANY_COUNT {
        let row = create(related, store, Attributes::new())?;
        created.push(row.get(&related.primary_key).cloned().unwrap_or(Value::Null));
    }

    for related_key in created {
        let mut row = Attributes::new();
        row.insert(owner_column.clone(), context.key.clone());
        if let Some((column, owner_type)) = &morph_type {
            row.insert(column.clone(), Value::from(owner_type.clone()));
        }
        row.insert(related_column.clone(), related_key);
        store.attach(&pivot, row);
    }
    Ok(())
}

fn populate_nothing(
    _context: &Context<'_>,
    _relation: &RelationMeta,
    _related: &EntityDef,
    _store: &mut ScratchStore,
) -> Result<(), MockError> {
    Ok(())
}
