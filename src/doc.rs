use crate::catalog::HttpMethod;
use crate::rules::{merge_rules, FieldInfoMap, Rules};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One documentation record for a route, or for a single (route, method)
/// pair once split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    pub uri: String,
    pub methods: Vec<HttpMethod>,
    /// Set when the record has been split to a single method
    pub http_method: Option<HttpMethod>,
    pub middlewares: Vec<String>,
    /// Handler owner short name
    pub controller: String,
    pub controller_full_path: String,
    /// Handler method name; blank for anonymous handlers
    pub method: String,
    pub summary: String,
    pub description: String,
    pub path_parameters: IndexMap<String, Vec<String>>,
    pub rules: Rules,
    pub examples: IndexMap<String, Value>,
    pub field_info: FieldInfoMap,
    pub rules_order: Vec<String>,
    pub group: String,
    pub group_index: usize,
    pub tag: String,
}

impl Doc {
    pub fn new(uri: impl Into<String>, methods: Vec<HttpMethod>) -> Self {
        Self {
            uri: uri.into(),
            methods,
            http_method: None,
            middlewares: Vec::new(),
            controller: String::new(),
            controller_full_path: String::new(),
            method: String::new(),
            summary: String::new(),
            description: String::new(),
            path_parameters: IndexMap::new(),
            rules: Rules::new(),
            examples: IndexMap::new(),
            field_info: FieldInfoMap::new(),
            rules_order: Vec::new(),
            group: String::new(),
            group_index: 0,
            tag: String::new(),
        }
    }

    /// The external id, once the record is bound to one method.
    pub fn id(&self) -> Option<String> {
        self.http_method.map(|method| doc_id(&self.uri, method))
    }

    /// A copy narrowed to `method`.
    pub fn for_method(&self, method: HttpMethod) -> Doc {
        Doc {
            methods: vec![method],
            http_method: Some(method),
            ..self.clone()
        }
    }

    pub fn merge_rules(&mut self, rules: Rules) {
        merge_rules(&mut self.rules, rules);
    }

    /// Adds example values; later values replace earlier ones per field.
    pub fn merge_examples(&mut self, examples: IndexMap<String, Value>) {
        self.examples.extend(examples);
    }
}

/// A Doc with its id, as returned by detail lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocDetail {
    pub id: String,
    #[serde(flatten)]
    pub doc: Doc,
}

/// `md5("{uri}:{METHOD}")` as lowercase hex.
pub fn doc_id(uri: &str, method: HttpMethod) -> String {
    format!("{:x}", md5::compute(format!("{}:{}", uri, method)))
}
