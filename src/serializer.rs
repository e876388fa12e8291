//! Serialization of documentation output to YAML or JSON.
//!
//! Any `Serialize` value can be written: Doc listings, route groups, route
//! details and example responses alike.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Serializes a value to YAML.
///
/// # Arguments
///
/// * `value` - The value to serialize
///
/// # Errors
///
/// Returns an error if serialization fails.
///
/// # Example
///
/// ```
/// use api_auto_docs::catalog::HttpMethod;
/// use api_auto_docs::doc::Doc;
/// use api_auto_docs::serializer::serialize_yaml;
///
/// let doc = Doc::new("users", vec![HttpMethod::Get]);
/// let yaml = serialize_yaml(&doc).unwrap();
/// assert!(yaml.contains("uri: users"));
/// ```
pub fn serialize_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    debug!("Serializing output to YAML");
    serde_yaml::to_string(value).context("Failed to serialize output to YAML")
}

/// Serializes a value to pretty-printed JSON.
///
/// # Arguments
///
/// * `value` - The value to serialize
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    debug!("Serializing output to JSON");
    serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")
}

/// Writes string content to a file.
///
/// Creates the file and any missing parent directories, or overwrites the
/// file if it exists.
///
/// # Arguments
///
/// * `content` - The string content to write
/// * `path` - The file path to write to
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HttpMethod;
    use crate::doc::{Doc, DocDetail};
    use crate::pipeline::{RouteGroup, RouteSummary};
    use tempfile::TempDir;

    fn detail() -> DocDetail {
        let mut doc = Doc::new("api/users", vec![HttpMethod::Post]).for_method(HttpMethod::Post);
        doc.rules.insert("email".into(), vec!["required|email".into()]);
        DocDetail {
            id: doc.id().unwrap(),
            doc,
        }
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&detail()).unwrap();

        assert!(yaml.contains("id:"));
        assert!(yaml.contains("uri: api/users"));
        assert!(yaml.contains("http_method: POST"));
        assert!(yaml.contains("email:"));
        assert!(yaml.contains("required|email"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&detail()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["uri"], "api/users");
        assert_eq!(parsed["methods"][0], "POST");
        assert_eq!(parsed["rules"]["email"][0], "required|email");
    }

    #[test]
    fn test_serialize_json_pretty_format() {
        let json = serialize_json(&detail()).unwrap();

        assert!(json.contains('\n'));
        assert!(json.contains("  "));
        assert!(json.lines().count() > 5, "Pretty printed JSON should have multiple lines");
    }

    #[test]
    fn test_serialize_route_groups_in_order() {
        let groups = vec![RouteGroup {
            group: "Users".into(),
            routes: vec![RouteSummary {
                id: "abc".into(),
                uri: "api/users".into(),
                methods: vec![HttpMethod::Get],
                group: "Users".into(),
            }],
        }];

        let json = serialize_json(&groups).unwrap();
        let group_at = json.find("\"group\"").unwrap();
        let routes_at = json.find("\"routes\"").unwrap();
        assert!(group_at < routes_at);
        assert!(json.contains("\"methods\": [\n"));
    }

    #[test]
    fn test_write_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("docs.yaml");

        write_to_file("test content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "test content");
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("nested").join("docs.json");

        write_to_file("{}", &file_path).unwrap();

        assert!(file_path.exists());
    }

    #[test]
    fn test_write_to_file_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("docs.yaml");

        write_to_file("initial content", &file_path).unwrap();
        write_to_file("new content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_write_json_file_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("detail.json");

        write_to_file(&serialize_json(&detail()).unwrap(), &file_path).unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["http_method"], "POST");
    }
}
