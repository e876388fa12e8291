//! Grouping and ordering of documentation records.

use crate::catalog::HttpMethod;
use crate::doc::Doc;
use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// How records are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// By URI prefix pattern plus the first segment after it
    ApiUri,
    /// By the handler's full type path
    ControllerFullPath,
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "api_uri" => Ok(GroupBy::ApiUri),
            "controller_full_path" => Ok(GroupBy::ControllerFullPath),
            other => Err(format!("unknown group mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    RouteNames,
    MethodNames,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "route_names" => Ok(SortBy::RouteNames),
            "method_names" => Ok(SortBy::MethodNames),
            other => Err(format!("unknown sort mode: {}", other)),
        }
    }
}

/// Assigns groups and orders records.
#[derive(Debug, Clone, Default)]
pub struct GroupingEngine {
    /// Alternation of the configured URI prefix patterns
    prefix: Option<Regex>,
}

impl GroupingEngine {
    /// Combines `uri_patterns` into a single `(p1|p2|...)` prefix matcher.
    pub fn new(uri_patterns: &[String]) -> Result<Self> {
        if uri_patterns.is_empty() {
            return Ok(Self::default());
        }
        let combined = format!("({})", uri_patterns.join("|"));
        let prefix = Regex::new(&combined).map_err(|e| Error::InvalidPattern {
            pattern: combined.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { prefix: Some(prefix) })
    }

    /// Sets `group` and `group_index` on every record, then orders by
    /// group (natural order) and index. `None` leaves records untouched.
    pub fn group(&self, mut docs: Vec<Doc>, mode: Option<GroupBy>) -> Vec<Doc> {
        let Some(mode) = mode else {
            return docs;
        };

        let mut counters: HashMap<String, usize> = HashMap::new();
        for doc in &mut docs {
            let group = match mode {
                GroupBy::ApiUri => self.uri_group(&doc.uri),
                GroupBy::ControllerFullPath => doc.controller_full_path.clone(),
            };
            let counter = counters.entry(group.clone()).or_insert(0);
            doc.group = group;
            doc.group_index = *counter;
            *counter += 1;
        }

        docs.sort_by(|a, b| natural_cmp(&a.group, &b.group).then(a.group_index.cmp(&b.group_index)));
        docs
    }

    fn uri_group(&self, uri: &str) -> String {
        let prefix = self
            .prefix
            .as_ref()
            .and_then(|re| re.find(uri))
            .map(|m| m.as_str())
            .unwrap_or("");

        if prefix.is_empty() {
            return uri.split('/').next().unwrap_or_default().to_string();
        }
        let after = uri.split_once(prefix).map(|(_, rest)| rest).unwrap_or(uri);
        format!("{}{}", prefix, after.split('/').next().unwrap_or_default())
    }
}

/// Orders records; `None` leaves them untouched. Both sorts are stable.
pub fn sort_docs(mut docs: Vec<Doc>, mode: Option<SortBy>) -> Vec<Doc> {
    match mode {
        Some(SortBy::RouteNames) => docs.sort_by(|a, b| a.uri.cmp(&b.uri)),
        Some(SortBy::MethodNames) => docs.sort_by_key(|doc| method_priority(doc.http_method)),
        None => {}
    }
    docs
}

/// Position in `GET, POST, PUT, PATCH, DELETE, HEAD`; anything else sorts last.
fn method_priority(method: Option<HttpMethod>) -> usize {
    method
        .and_then(|m| HttpMethod::DOCUMENTED.iter().position(|d| *d == m))
        .unwrap_or(HttpMethod::DOCUMENTED.len())
}

/// Compares strings with digit runs ordered by numeric value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let l_trimmed = l_run.trim_start_matches('0');
                let r_trimmed = r_run.trim_start_matches('0');
                let ordering = l_trimmed
                    .len()
                    .cmp(&r_trimmed.len())
                    .then_with(|| l_trimmed.cmp(r_trimmed))
                    .then_with(|| l_run.len().cmp(&r_run.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(uri: &str, method: HttpMethod) -> Doc {
        Doc::new(uri, vec![method]).for_method(method)
    }

    fn engine() -> GroupingEngine {
        GroupingEngine::new(&[r"^api/v[0-9]+/".to_string()]).unwrap()
    }

    fn groups(docs: &[Doc]) -> Vec<(&str, usize)> {
        docs.iter().map(|d| (d.group.as_str(), d.group_index)).collect()
    }

    #[test]
    fn test_group_by_uri_prefix() {
        let docs = vec![
            doc("api/v1/users", HttpMethod::Get),
            doc("api/v1/orders", HttpMethod::Get),
            doc("api/v2/users", HttpMethod::Get),
            doc("api/v1/users/{user}", HttpMethod::Get),
        ];

        let grouped = engine().group(docs, Some(GroupBy::ApiUri));
        assert_eq!(
            groups(&grouped),
            vec![("api/v1/orders", 0), ("api/v1/users", 0), ("api/v1/users", 1), ("api/v2/users", 0)]
        );
    }

    #[test]
    fn test_group_without_prefix_uses_first_segment() {
        let grouped = engine().group(
            vec![doc("welcome", HttpMethod::Get), doc("users/{id}", HttpMethod::Get)],
            Some(GroupBy::ApiUri),
        );
        assert_eq!(groups(&grouped), vec![("users", 0), ("welcome", 0)]);
    }

    #[test]
    fn test_group_by_controller() {
        let mut a = doc("a", HttpMethod::Get);
        a.controller_full_path = "handlers::UserController".into();
        let mut b = doc("b", HttpMethod::Post);
        b.controller_full_path = "handlers::AccountController".into();
        let mut c = doc("c", HttpMethod::Put);
        c.controller_full_path = "handlers::UserController".into();

        let grouped = GroupingEngine::default().group(vec![a, b, c], Some(GroupBy::ControllerFullPath));
        assert_eq!(
            groups(&grouped),
            vec![
                ("handlers::AccountController", 0),
                ("handlers::UserController", 0),
                ("handlers::UserController", 1)
            ]
        );
        assert_eq!(grouped[2].uri, "c");
    }

    #[test]
    fn test_unknown_modes_are_no_ops() {
        assert!("by_color".parse::<GroupBy>().is_err());
        assert!("by_color".parse::<SortBy>().is_err());

        let docs = vec![doc("b", HttpMethod::Post), doc("a", HttpMethod::Get)];
        let untouched = sort_docs(engine().group(docs.clone(), None), None);
        assert_eq!(untouched, docs);
    }

    #[test]
    fn test_sort_by_method_priority_is_stable() {
        let docs = vec![
            doc("x", HttpMethod::Head),
            doc("a", HttpMethod::Delete),
            doc("b", HttpMethod::Get),
            doc("c", HttpMethod::Post),
            doc("d", HttpMethod::Get),
            doc("e", HttpMethod::Options),
            doc("f", HttpMethod::Patch),
            doc("g", HttpMethod::Put),
        ];

        let sorted = sort_docs(docs, Some(SortBy::MethodNames));
        let uris: Vec<&str> = sorted.iter().map(|d| d.uri.as_str()).collect();
        assert_eq!(uris, vec!["b", "d", "c", "g", "f", "a", "x", "e"]);
    }

    #[test]
    fn test_sort_by_route_names() {
        let sorted = sort_docs(
            vec![doc("users", HttpMethod::Get), doc("accounts", HttpMethod::Get)],
            Some(SortBy::RouteNames),
        );
        assert_eq!(sorted[0].uri, "accounts");
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("api/v2/users", "api/v10/users"), Ordering::Less);
        assert_eq!(natural_cmp("item9", "item10"), Ordering::Less);
        assert_eq!(natural_cmp("b", "a"), Ordering::Greater);
        assert_eq!(natural_cmp("v01", "v1"), Ordering::Greater);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = GroupingEngine::new(&["(".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
