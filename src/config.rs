//! Documentation settings.
//!
//! Every key is optional; missing keys take the defaults below. Files are
//! read as YAML (`.yaml`, `.yml`) or JSON (anything else).

use crate::catalog::HttpMethod;
use crate::mock::EntityConfig;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    pub title: String,
    pub default_headers: IndexMap<String, String>,
    pub show_get: bool,
    pub show_post: bool,
    pub show_put: bool,
    pub show_patch: bool,
    pub show_delete: bool,
    pub show_head: bool,
    /// Only routes starting with this prefix are documented
    pub only_route_uri_start_with: String,
    /// Routes matching any of these regexes are hidden
    pub hide_matching: Vec<String>,
    /// Blank out middlewares and handler identity
    pub hide_meta_data: bool,
    pub rules_methods: Vec<String>,
    pub rules_order: Vec<String>,
    pub group_by: GroupByConfig,
    pub use_factory: bool,
    /// Stripped from a handler's short name to find its entity
    pub pattern_model_from_controller_name: String,
    pub exclude_fields: Vec<String>,
    pub custom_responses: Option<PathBuf>,
    pub skip_relations: Vec<String>,
    /// Default error responses, shown alongside every route
    pub responses: IndexMap<String, Value>,
    pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupByConfig {
    pub uri_patterns: Vec<String>,
}

impl Default for GroupByConfig {
    fn default() -> Self {
        Self {
            uri_patterns: vec![r"^api/v[\d]+/".to_string(), "^api/".to_string()],
        }
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            title: "API Documentation".to_string(),
            default_headers: IndexMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]),
            show_get: true,
            show_post: true,
            show_put: true,
            show_patch: true,
            show_delete: true,
            show_head: true,
            only_route_uri_start_with: String::new(),
            hide_matching: vec!["^telescope".to_string(), "^docs-api".to_string(), "^_debug".to_string()],
            hide_meta_data: false,
            rules_methods: vec!["rules".to_string()],
            rules_order: Vec::new(),
            group_by: GroupByConfig::default(),
            use_factory: true,
            pattern_model_from_controller_name: "(?i)(Controller|Handlers?)$".to_string(),
            exclude_fields: Vec::new(),
            custom_responses: None,
            skip_relations: vec!["audits".to_string()],
            responses: default_responses(),
            entities: Vec::new(),
        }
    }
}

fn default_responses() -> IndexMap<String, Value> {
    IndexMap::from([
        ("400".to_string(), json!({"message": "Bad request."})),
        ("401".to_string(), json!({"message": "Unauthenticated."})),
        ("403".to_string(), json!({"message": "This action is unauthorized."})),
        ("404".to_string(), json!({"message": "Not found."})),
        ("422".to_string(), json!({"message": "The given data was invalid.", "errors": {}})),
        ("500".to_string(), json!({"message": "Server error."})),
    ])
}

impl DocsConfig {
    /// Reads a configuration file, selecting the format by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DocsConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML config: {}", path.display()))?,
            _ => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config: {}", path.display()))?,
        };

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Methods enabled by the `show_*` switches, in priority order.
    pub fn allowed_methods(&self) -> Vec<HttpMethod> {
        let switches = [
            self.show_get,
            self.show_post,
            self.show_put,
            self.show_patch,
            self.show_delete,
            self.show_head,
        ];
        HttpMethod::DOCUMENTED
            .into_iter()
            .zip(switches)
            .filter_map(|(method, shown)| shown.then_some(method))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = DocsConfig::default();
        assert_eq!(config.rules_methods, vec!["rules"]);
        assert_eq!(config.allowed_methods(), HttpMethod::DOCUMENTED.to_vec());
        assert_eq!(config.skip_relations, vec!["audits"]);
        assert!(config.custom_responses.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.yaml");
        fs::write(
            &path,
            r#"
title: Shop API
show_head: false
show_delete: false
hide_matching: ["^internal"]
group_by:
  uri_patterns: ['^api/v[\d]+/']
entities:
  - name: Product
    fields:
      name: { kind: word }
"#,
        )
        .unwrap();

        let config = DocsConfig::load(&path).unwrap();
        assert_eq!(config.title, "Shop API");
        assert_eq!(
            config.allowed_methods(),
            vec![HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch]
        );
        assert_eq!(config.hide_matching, vec!["^internal"]);
        assert_eq!(config.group_by.uri_patterns.len(), 1);
        assert_eq!(config.rules_methods, vec!["rules"]);
        assert_eq!(config.entities[0].name, "Product");
    }

    #[test]
    fn test_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.json");
        fs::write(&path, r#"{"use_factory": false, "rules_methods": ["rules", "extra_rules"]}"#).unwrap();

        let config = DocsConfig::load(&path).unwrap();
        assert!(!config.use_factory);
        assert_eq!(config.rules_methods.len(), 2);
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.json");
        fs::write(&path, "{").unwrap();

        let err = DocsConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("docs.json"));
    }
}
