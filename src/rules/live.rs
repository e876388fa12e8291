use super::{ConstraintProvider, FieldInfoMap, RawRules, RuleError};
use indexmap::IndexMap;
use log::debug;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A request schema that can report its own validation rules.
///
/// ```
/// use api_auto_docs::rules::live::{RuleSchema, SchemaRegistry};
/// use api_auto_docs::rules::{ConstraintProvider, RawRules};
///
/// #[derive(Default)]
/// struct CreateUser;
///
/// impl RuleSchema for CreateUser {
///     fn call(&self, method: &str) -> Option<anyhow::Result<RawRules>> {
///         match method {
///             "rules" => Some(Ok(RawRules::from([("name".into(), "required|string".into())]))),
///             _ => None,
///         }
///     }
/// }
///
/// let mut registry = SchemaRegistry::new();
/// registry.register::<CreateUser>("CreateUser");
/// assert!(registry.provide("CreateUser", "rules").unwrap().is_some());
/// ```
pub trait RuleSchema {
    /// Invokes the named rule method; `None` when the schema has no such method.
    fn call(&self, method: &str) -> Option<anyhow::Result<RawRules>>;

    fn field_descriptions(&self) -> Option<FieldInfoMap> {
        None
    }
}

type Constructor = Box<dyn Fn() -> anyhow::Result<Box<dyn RuleSchema>>>;

struct Registration {
    construct: Constructor,
    /// Builds the schema without running constructor logic
    bare: Option<Constructor>,
}

/// Schema types registered in code, invoked directly.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Registration>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema built with `Default`.
    pub fn register<T>(&mut self, name: &str) -> &mut Self
    where
        T: RuleSchema + Default + 'static,
    {
        self.register_with(
            name,
            || Ok(Box::new(T::default()) as Box<dyn RuleSchema>),
            None::<fn() -> anyhow::Result<Box<dyn RuleSchema>>>,
        )
    }

    /// Registers a schema with a fallible constructor and an optional bare
    /// constructor used when the first one fails.
    pub fn register_with<C, B>(&mut self, name: &str, construct: C, bare: Option<B>) -> &mut Self
    where
        C: Fn() -> anyhow::Result<Box<dyn RuleSchema>> + 'static,
        B: Fn() -> anyhow::Result<Box<dyn RuleSchema>> + 'static,
    {
        self.schemas.insert(
            name.to_string(),
            Registration {
                construct: Box::new(construct),
                bare: bare.map(|b| Box::new(b) as Constructor),
            },
        );
        self
    }

    pub fn contains(&self, schema: &str) -> bool {
        self.lookup(schema).is_some()
    }

    /// Finds a registration by exact name, then by last path segment.
    fn lookup(&self, schema: &str) -> Option<&Registration> {
        if let Some(registration) = self.schemas.get(schema) {
            return Some(registration);
        }
        let short = short_name(schema);
        self.schemas
            .iter()
            .find(|(name, _)| short_name(name) == short)
            .map(|(_, registration)| registration)
    }

    fn instantiate(&self, schema: &str, registration: &Registration) -> Result<Box<dyn RuleSchema>, RuleError> {
        let message = match catch_unwind(AssertUnwindSafe(|| (registration.construct)())) {
            Ok(Ok(instance)) => return Ok(instance),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "panic during construction".to_string(),
        };
        debug!("Constructing {} failed ({}), trying bare construction", schema, message);

        let Some(bare) = &registration.bare else {
            return Err(RuleError::Construction {
                schema: schema.to_string(),
                message,
            });
        };
        match catch_unwind(AssertUnwindSafe(|| bare())) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(e)) => Err(RuleError::Construction {
                schema: schema.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(RuleError::Construction {
                schema: schema.to_string(),
                message: "panic during bare construction".to_string(),
            }),
        }
    }
}

impl ConstraintProvider for SchemaRegistry {
    fn provide(&self, schema: &str, method: &str) -> Result<Option<RawRules>, RuleError> {
        let Some(registration) = self.lookup(schema) else {
            return Ok(None);
        };
        let instance = self.instantiate(schema, registration)?;

        match catch_unwind(AssertUnwindSafe(|| instance.call(method))) {
            Ok(None) => Ok(None),
            Ok(Some(Ok(rules))) => Ok(Some(rules)),
            Ok(Some(Err(e))) => Err(RuleError::Invocation {
                schema: schema.to_string(),
                method: method.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(RuleError::Panicked {
                schema: schema.to_string(),
                method: method.to_string(),
            }),
        }
    }

    fn field_info(&self, schema: &str) -> Option<FieldInfoMap> {
        let registration = self.lookup(schema)?;
        let instance = self.instantiate(schema, registration).ok()?;
        catch_unwind(AssertUnwindSafe(|| instance.field_descriptions()))
            .ok()
            .flatten()
    }
}

fn short_name(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::FieldInfo;
    use anyhow::bail;

    #[derive(Default)]
    struct StoreUser;

    impl RuleSchema for StoreUser {
        fn call(&self, method: &str) -> Option<anyhow::Result<RawRules>> {
            match method {
                "rules" => Some(Ok(RawRules::from([
                    ("name".to_string(), "required|string".into()),
                    ("roles.*".to_string(), vec!["string"].into()),
                ]))),
                "broken_rules" => Some(Err(anyhow::anyhow!("database unavailable"))),
                "panicking_rules" => panic!("boom"),
                _ => None,
            }
        }

        fn field_descriptions(&self) -> Option<FieldInfoMap> {
            Some(FieldInfoMap::from([(
                "name".to_string(),
                FieldInfo {
                    description: "Display name".into(),
                    example: None,
                },
            )]))
        }
    }

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register::<StoreUser>("crate::requests::StoreUser");
        registry
    }

    #[test]
    fn test_provide_by_short_name() {
        let rules = registry().provide("StoreUser", "rules").unwrap().unwrap();
        assert_eq!(rules.len(), 2);
        assert!(registry().contains("other::StoreUser"));
    }

    #[test]
    fn test_unknown_schema_or_method_is_absent() {
        assert_eq!(registry().provide("Missing", "rules").unwrap(), None);
        assert_eq!(registry().provide("StoreUser", "messages").unwrap(), None);
    }

    #[test]
    fn test_invocation_error_and_panic_are_contained() {
        let err = registry().provide("StoreUser", "broken_rules").unwrap_err();
        assert!(matches!(err, RuleError::Invocation { .. }));
        assert!(err.to_string().contains("database unavailable"));

        let err = registry().provide("StoreUser", "panicking_rules").unwrap_err();
        assert!(matches!(err, RuleError::Panicked { .. }));
    }

    #[test]
    fn test_bare_constructor_used_when_construction_fails() {
        let mut registry = SchemaRegistry::new();
        registry.register_with(
            "StoreUser",
            || bail!("missing request context"),
            Some(|| Ok(Box::new(StoreUser) as Box<dyn RuleSchema>)),
        );
        assert!(registry.provide("StoreUser", "rules").unwrap().is_some());

        let mut without_bare = SchemaRegistry::new();
        without_bare.register_with(
            "StoreUser",
            || bail!("missing request context"),
            None::<fn() -> anyhow::Result<Box<dyn RuleSchema>>>,
        );
        let err = without_bare.provide("StoreUser", "rules").unwrap_err();
        assert!(matches!(err, RuleError::Construction { .. }));
    }

    #[test]
    fn test_field_info() {
        let info = registry().field_info("StoreUser").unwrap();
        assert_eq!(info["name"].description, "Display name");
    }
}
