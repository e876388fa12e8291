use super::{ConstraintProvider, RawRules, RuleError, RuleValue};
use crate::source_index::SourceIndex;
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

/// A line opening with a quoted key followed by `=>`, `:` or `,`.
static ASSOCIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\(?\s*["'][^"']*["']\s*(?:=>|:|,)"#).expect("association pattern is valid")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'].*?["']"#).expect("quoted literal pattern is valid"));

/// Reads rules from the source text of a schema's rule method.
///
/// Only single-line associations are understood:
///
/// ```text
/// ("email", "required|email"),
/// "name" => "required|string",
/// "tags": ["array", "max:5"],
/// ```
///
/// The first quoted literal is the field, the rest are rule pieces. Comment
/// lines and lines with fewer than two literals are skipped; a field declared
/// twice keeps its last declaration.
pub struct SourceRuleParser<'a> {
    index: &'a SourceIndex,
}

impl<'a> SourceRuleParser<'a> {
    pub fn new(index: &'a SourceIndex) -> Self {
        Self { index }
    }
}

impl ConstraintProvider for SourceRuleParser<'_> {
    fn provide(&self, schema: &str, method: &str) -> Result<Option<RawRules>, RuleError> {
        let short = schema.rsplit("::").next().unwrap_or(schema);
        let Some(lines) = self.index.method_lines(short, method) else {
            return Ok(None);
        };

        let rules = parse_rule_lines(lines);
        debug!("Parsed {} rules from {}::{} source", rules.len(), short, method);
        Ok(Some(rules))
    }
}

/// Extracts `field => pieces` pairs from source lines.
pub fn parse_rule_lines<S: AsRef<str>>(lines: &[S]) -> RawRules {
    let mut rules = RawRules::new();

    for line in lines {
        let line = line.as_ref();
        let trimmed = line.trim();
        if trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        if !ASSOCIATION.is_match(line) {
            continue;
        }

        let mut tokens = QUOTED
            .find_iter(strip_trailing_comment(line))
            .map(|m| m.as_str().replace(['"', '\''], ""));
        let Some(field) = tokens.next() else { continue };
        let pieces: Vec<String> = tokens.collect();
        if pieces.is_empty() {
            continue;
        }

        rules.insert(field, RuleValue::List(pieces));
    }

    rules
}

/// Cuts a `//` comment that starts outside any quoted literal.
fn strip_trailing_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '/' && matches!(chars.peek(), Some((_, '/'))) => return &line[..i],
            None => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use crate::rules::flatten_rules;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_parses_tuple_arrow_and_colon_styles() {
        let rules = parse_rule_lines(&[
            r#"    ("email", "required|email"),"#,
            r#"    "name" => "required|string","#,
            r#"    "tags": ["array", "max:5"],"#,
        ]);

        assert_eq!(rules.keys().collect::<Vec<_>>(), vec!["email", "name", "tags"]);
        assert_eq!(rules["tags"], RuleValue::List(vec!["array".into(), "max:5".into()]));
    }

    #[test]
    fn test_skips_comments_and_single_token_lines() {
        let rules = parse_rule_lines(&[
            r#"// ("password", "required"),"#,
            r#"# "secret" => "required","#,
            r#"("nickname", ),"#,
            r#"let title = "x";"#,
            r#"("title", "required"),"#,
        ]);

        assert_eq!(rules.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_trailing_comment_is_ignored() {
        let rules = parse_rule_lines(&[
            r#"    ("bio", "nullable|string"), // don't forget it's optional"#,
            r#"    "site" => "url|regex:/^https?:\/\//", // "quoted" note"#,
        ]);

        assert_eq!(rules["bio"], RuleValue::List(vec!["nullable|string".into()]));
        assert_eq!(rules["site"].to_pipe(), r#"url|regex:/^https?:\/\//"#);
    }

    #[test]
    fn test_repeated_field_keeps_last_line() {
        let rules = parse_rule_lines(&[r#"("age", "integer"),"#, r#"("age", "nullable|numeric"),"#]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules["age"].to_pipe(), "nullable|numeric");
    }

    #[test]
    fn test_provides_rules_from_indexed_method() {
        let source = r#"
pub struct StorePost;

impl StorePost {
    pub fn rules() -> Vec<(&'static str, &'static str)> {
        vec![
            // ("draft", "boolean"),
            ("title", "required|string|max:255"),
            ("tags.*", "string"),
            ("tags", "array"),
        ]
    }
}
"#;
        let parsed = ParsedFile::from_source(Path::new("src/requests/posts.rs"), source).unwrap();
        let index = SourceIndex::new(&[parsed]);
        let parser = SourceRuleParser::new(&index);

        let raw = parser.provide("crate::requests::StorePost", "rules").unwrap().unwrap();
        let rules = flatten_rules(&raw);

        assert_eq!(rules["title"], vec!["required|string|max:255"]);
        assert_eq!(rules["tags"], vec!["string|array"]);
        assert!(!rules.contains_key("draft"));
        assert_eq!(parser.provide("StorePost", "messages").unwrap(), None);
    }
}
