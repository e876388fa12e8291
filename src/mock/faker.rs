use super::{Attributes, Factory};
use chrono::{Duration, NaiveDate, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Grace", "Alan", "Barbara", "Dennis", "Frances", "Ken", "Margaret", "Linus", "Radia",
];
const LAST_NAMES: &[&str] = &[
    "Lovelace", "Hopper", "Turing", "Liskov", "Ritchie", "Allen", "Thompson", "Hamilton", "Torvalds", "Perlman",
];
const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do", "eiusmod",
    "tempor", "incididunt", "labore", "magna", "aliqua",
];

/// How one field's value is generated.
///
/// Values depend only on the record sequence number, so the same
/// materialization always yields the same output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Name,
    FirstName,
    LastName,
    Email,
    Word,
    Sentence {
        #[serde(default = "default_sentence_words")]
        words: usize,
    },
    Paragraph,
    Integer {
        #[serde(default)]
        min: i64,
        #[serde(default = "default_max")]
        max: i64,
    },
    Float {
        #[serde(default)]
        min: f64,
        #[serde(default = "default_max_float")]
        max: f64,
    },
    Boolean,
    Date,
    DateTime,
    Uuid,
    Url,
    Phone,
    /// `{prefix}{seq}`
    Sequence {
        #[serde(default)]
        prefix: String,
    },
    Constant {
        value: Value,
    },
}

fn default_sentence_words() -> usize {
    6
}

fn default_max() -> i64 {
    1000
}

fn default_max_float() -> f64 {
    1000.0
}

fn pick(list: &[&'static str], n: u64) -> &'static str {
    list[(n % list.len() as u64) as usize]
}

fn words(seq: u64, count: usize) -> Vec<&'static str> {
    (0..count as u64).map(|i| pick(WORDS, seq * 7 + i)).collect()
}

impl FieldKind {
    pub fn generate(&self, seq: u64) -> Value {
        match self {
            FieldKind::Name => json!(format!("{} {}", pick(FIRST_NAMES, seq), pick(LAST_NAMES, seq / 3 + seq))),
            FieldKind::FirstName => json!(pick(FIRST_NAMES, seq)),
            FieldKind::LastName => json!(pick(LAST_NAMES, seq)),
            FieldKind::Email => json!(format!("{}{}@example.com", pick(FIRST_NAMES, seq).to_lowercase(), seq)),
            FieldKind::Word => json!(pick(WORDS, seq)),
            FieldKind::Sentence { words: count } => {
                let mut sentence = words(seq, (*count).max(1)).join(" ");
                if let Some(first) = sentence.get(..1).map(str::to_uppercase) {
                    sentence.replace_range(..1, &first);
                }
                json!(format!("{}.", sentence))
            }
            FieldKind::Paragraph => {
                let sentences: Vec<String> = (0..3)
                    .map(|i| match (FieldKind::Sentence { words: 8 }).generate(seq + i) {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                json!(sentences.join(" "))
            }
            FieldKind::Integer { min, max } => {
                let (low, high) = (i128::from(*min.min(max)), i128::from(*min.max(max)));
                let offset = (i128::from(seq) * 37) % (high - low + 1);
                json!(i64::try_from(low + offset).unwrap_or(*max))
            }
            FieldKind::Float { min, max } => {
                let fraction = ((seq * 37) % 100) as f64 / 100.0;
                json!(((min + (max - min) * fraction) * 100.0).round() / 100.0)
            }
            FieldKind::Boolean => json!(seq % 2 == 1),
            FieldKind::Date => json!(date(seq).format("%Y-%m-%d").to_string()),
            FieldKind::DateTime => {
                let time = NaiveTime::from_hms_opt(((seq * 5) % 24) as u32, ((seq * 13) % 60) as u32, 0)
                    .unwrap_or(NaiveTime::MIN);
                json!(date(seq).and_time(time).and_utc().to_rfc3339())
            }
            FieldKind::Uuid => json!(Uuid::from_u128(0x5eed_0000_0000_4000_8000_0000_0000_0000 | u128::from(seq)).to_string()),
            FieldKind::Url => json!(format!("https://example.com/{}/{}", pick(WORDS, seq), seq)),
            FieldKind::Phone => json!(format!("+1-555-{:04}", (seq * 7919) % 10_000)),
            FieldKind::Sequence { prefix } => json!(format!("{}{}", prefix, seq)),
            FieldKind::Constant { value } => value.clone(),
        }
    }
}

fn date(seq: u64) -> NaiveDate {
    let base = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or(NaiveDate::MIN);
    base + Duration::days((seq % 365) as i64)
}

/// A [`Factory`] built from per-field generators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldFactory {
    pub fields: IndexMap<String, FieldKind>,
}

impl FieldFactory {
    pub fn new(fields: IndexMap<String, FieldKind>) -> Self {
        Self { fields }
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.insert(name.to_string(), kind);
        self
    }
}

impl Factory for FieldFactory {
    fn definition(&self, seq: u64) -> anyhow::Result<Attributes> {
        Ok(self
            .fields
            .iter()
            .map(|(name, kind)| (name.clone(), kind.generate(seq)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_deterministic() {
        let factory = FieldFactory::default()
            .field("name", FieldKind::Name)
            .field("email", FieldKind::Email)
            .field("published_at", FieldKind::DateTime);

        assert_eq!(factory.definition(3).unwrap(), factory.definition(3).unwrap());
        assert_ne!(factory.definition(3).unwrap()["email"], factory.definition(4).unwrap()["email"]);
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(FieldKind::Sequence { prefix: "SKU-".into() }.generate(12), json!("SKU-12"));
        assert_eq!(FieldKind::Constant { value: json!({"a": 1}) }.generate(5), json!({"a": 1}));
        assert_eq!(FieldKind::Date.generate(0), json!("2024-01-15"));

        let n = FieldKind::Integer { min: 10, max: 20 }.generate(9).as_i64().unwrap();
        assert!((10..=20).contains(&n));

        let wide = FieldKind::Integer { min: i64::MIN, max: i64::MAX };
        assert_eq!(wide.generate(0), json!(i64::MIN));
        assert_eq!(wide.generate(2).as_i64(), Some(i64::MIN + 74));
        let reversed = FieldKind::Integer { min: 5, max: -5 }.generate(3).as_i64().unwrap();
        assert!((-5..=5).contains(&reversed));

        let sentence = FieldKind::Sentence { words: 3 }.generate(1);
        let sentence = sentence.as_str().unwrap();
        assert!(sentence.ends_with('.'));
        assert!(sentence.chars().next().unwrap().is_uppercase());

        let uuid = FieldKind::Uuid.generate(1);
        assert!(Uuid::parse_str(uuid.as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_deserializes_from_config() {
        let fields: IndexMap<String, FieldKind> = serde_json::from_str(
            r#"{"title": {"kind": "sentence", "words": 4}, "views": {"kind": "integer", "max": 50}, "active": {"kind": "boolean"}}"#,
        )
        .unwrap();

        assert_eq!(fields["title"], FieldKind::Sentence { words: 4 });
        assert_eq!(fields["views"], FieldKind::Integer { min: 0, max: 50 });
        assert_eq!(fields.len(), 3);
    }
}
