//! Validation rule extraction.
//!
//! Rules for a schema type are produced by a chain of [`ConstraintProvider`]s:
//! the live [`SchemaRegistry`](live::SchemaRegistry) first, then the
//! [`SourceRuleParser`](source::SourceRuleParser) reading the method's source
//! text. Whatever produced them, raw rules go through [`flatten_rules`].

pub mod live;
pub mod source;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A rule as a schema declares it: `"required|string"` or
/// `["required", "string"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Pipe(String),
    List(Vec<String>),
}

impl RuleValue {
    /// The pipe-delimited form.
    pub fn to_pipe(&self) -> String {
        match self {
            RuleValue::Pipe(rule) => rule.clone(),
            RuleValue::List(rules) => rules.join("|"),
        }
    }
}

impl From<&str> for RuleValue {
    fn from(rule: &str) -> Self {
        RuleValue::Pipe(rule.to_string())
    }
}

impl From<String> for RuleValue {
    fn from(rule: String) -> Self {
        RuleValue::Pipe(rule)
    }
}

impl From<Vec<&str>> for RuleValue {
    fn from(rules: Vec<&str>) -> Self {
        RuleValue::List(rules.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for RuleValue {
    fn from(rules: Vec<String>) -> Self {
        RuleValue::List(rules)
    }
}

/// Rules as returned by a provider, keyed by field.
pub type RawRules = IndexMap<String, RuleValue>;

/// Flattened rules: one pipe-delimited entry per field.
pub type Rules = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

pub type FieldInfoMap = IndexMap<String, FieldInfo>;

/// Why a provider could not produce rules for one schema method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The schema could not be constructed, even without constructor logic
    Construction { schema: String, message: String },
    /// The rule method returned an error
    Invocation {
        schema: String,
        method: String,
        message: String,
    },
    /// The rule method panicked
    Panicked { schema: String, method: String },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::Construction { schema, message } => {
                write!(f, "Failed to construct {}: {}", schema, message)
            }
            RuleError::Invocation {
                schema,
                method,
                message,
            } => write!(f, "{}::{} failed: {}", schema, method, message),
            RuleError::Panicked { schema, method } => write!(f, "{}::{} panicked", schema, method),
        }
    }
}

impl std::error::Error for RuleError {}

/// A source of validation rules for named schema types.
pub trait ConstraintProvider {
    /// Rules returned by `schema`'s `method`; `Ok(None)` when the schema or
    /// method is unknown to this provider.
    fn provide(&self, schema: &str, method: &str) -> Result<Option<RawRules>, RuleError>;

    /// Per-field descriptions, when the schema declares them.
    fn field_info(&self, _schema: &str) -> Option<FieldInfoMap> {
        None
    }
}

impl<T: ConstraintProvider + ?Sized> ConstraintProvider for &T {
    fn provide(&self, schema: &str, method: &str) -> Result<Option<RawRules>, RuleError> {
        (**self).provide(schema, method)
    }

    fn field_info(&self, schema: &str) -> Option<FieldInfoMap> {
        (**self).field_info(schema)
    }
}

/// Joins pipe pieces, dropping empties and repeats (first occurrence wins).
fn dedup_pieces<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for piece in pieces {
        if !piece.is_empty() && !unique.contains(&piece) {
            unique.push(piece);
        }
    }
    unique.join("|")
}

/// Normalizes raw rules.
///
/// Every value becomes a pipe string; `.*` is removed from field names so
/// `items.*` merges into `items`; pieces are deduplicated in first-seen order.
/// Each field maps to a single-element list.
///
/// ```
/// use api_auto_docs::rules::{flatten_rules, RawRules};
///
/// let mut raw = RawRules::new();
/// raw.insert("items".into(), "required|array".into());
/// raw.insert("items.*".into(), vec!["integer", "required"].into());
///
/// let rules = flatten_rules(&raw);
/// assert_eq!(rules["items"], vec!["required|array|integer"]);
/// ```
pub fn flatten_rules(raw: &RawRules) -> Rules {
    let mut merged: IndexMap<String, Vec<String>> = IndexMap::new();
    for (field, value) in raw {
        merged
            .entry(field.replace(".*", ""))
            .or_default()
            .push(value.to_pipe());
    }

    merged
        .into_iter()
        .map(|(field, values)| {
            let joined = dedup_pieces(values.iter().flat_map(|v| v.split('|')));
            (field, vec![joined])
        })
        .collect()
}

/// Merges `incoming` into `target` with the same dedup semantics as
/// [`flatten_rules`].
pub fn merge_rules(target: &mut Rules, incoming: Rules) {
    for (field, values) in incoming {
        let entry = target.entry(field).or_default();
        let joined = dedup_pieces(entry.iter().chain(&values).flat_map(|v| v.split('|')));
        *entry = vec![joined];
    }
}

/// Result of extracting rules for one schema type.
#[derive(Debug, Default)]
pub struct Extraction {
    pub rules: Rules,
    pub field_info: Option<FieldInfoMap>,
    /// Provider failures that were skipped over
    pub failures: Vec<RuleError>,
}

/// Runs the provider chain for every configured rule method.
pub struct RuleExtractor<'a> {
    providers: Vec<Box<dyn ConstraintProvider + 'a>>,
    methods: Vec<String>,
}

impl<'a> RuleExtractor<'a> {
    pub fn new(methods: Vec<String>) -> Self {
        Self {
            providers: Vec::new(),
            methods,
        }
    }

    /// Appends a provider; earlier providers take precedence.
    pub fn with_provider(mut self, provider: impl ConstraintProvider + 'a) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Extracts rules for `schema`.
    ///
    /// For each rule method, the first provider answering `Ok(Some(..))`
    /// wins. Errors are collected and the next provider is tried.
    pub fn extract(&self, schema: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for method in &self.methods {
            for provider in &self.providers {
                match provider.provide(schema, method) {
                    Ok(Some(raw)) => {
                        merge_rules(&mut extraction.rules, flatten_rules(&raw));
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!("Rule provider failed, trying the next one: {}", e);
                        extraction.failures.push(e);
                    }
                }
            }
        }

        extraction.field_info = self.providers.iter().find_map(|p| p.field_info(schema));
        extraction
    }
}
