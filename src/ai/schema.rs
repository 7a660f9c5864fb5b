//! Explicit result schemas and the conform/default pass
//!
//! Every task declares its fields once, as static data. The same declaration
//! drives prompt contracts ([`TaskSchema::describe`]) and validation of the
//! provider's object ([`TaskSchema::conform`]).

use serde_json::{Map, Number, Value};
use std::fmt::Write as _;

/// Value shape accepted for a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Whole number within the inclusive range; whole-valued reals are accepted
    Integer { min: i64, max: i64 },
    /// Finite number within the inclusive range
    Real { min: f64, max: f64 },
    /// One of the listed lowercase names, matched case-insensitively
    Enum(&'static [&'static str]),
    /// Non-blank string
    Text,
    /// Array of non-blank strings
    TextList,
    /// Array of objects, each conforming to the nested fields
    ObjectList(&'static [FieldSpec]),
}

/// Documented fallback for a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Real(f64),
    Str(&'static str),
    EmptyList,
    Null,
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Int(n) => Value::from(n),
            DefaultValue::Real(x) => Number::from_f64(x).map_or(Value::Null, Value::Number),
            DefaultValue::Str(s) => Value::from(s),
            DefaultValue::EmptyList => Value::Array(Vec::new()),
            DefaultValue::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: DefaultValue,
    pub about: &'static str,
}

impl FieldSpec {
    pub const fn required(
        name: &'static str,
        kind: FieldKind,
        default: DefaultValue,
        about: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: true,
            default,
            about,
        }
    }

    pub const fn optional(
        name: &'static str,
        kind: FieldKind,
        default: DefaultValue,
        about: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            default,
            about,
        }
    }
}

/// Outcome of conforming a provider object to a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Conformed {
    /// Every schema field, each valid or defaulted
    pub object: Map<String, Value>,
    /// Dotted paths of fields that were defaulted or had elements dropped
    pub defaulted: Vec<String>,
}

/// The declared fields of one task's result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSchema {
    pub fields: &'static [FieldSpec],
}

impl TaskSchema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// An object holding every field's documented default
    pub fn defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| (field.name.to_string(), field.default.to_value()))
            .collect()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.to_string()).collect()
    }

    /// Validate `input` field by field, substituting defaults where needed
    ///
    /// A missing required field, or any present field that fails its kind or
    /// range check, is replaced by its default and reported. A missing
    /// optional field takes its default silently. Unknown members of `input`
    /// are discarded.
    pub fn conform(&self, input: &Map<String, Value>) -> Conformed {
        let mut defaulted = Vec::new();
        let object = conform_fields(self.fields, input, "", &mut defaulted);
        Conformed { object, defaulted }
    }

    /// Human-readable JSON contract, one line per field
    pub fn describe(&self) -> String {
        let mut out = String::new();
        describe_fields(self.fields, 0, &mut out);
        out
    }
}

fn conform_fields(
    fields: &[FieldSpec],
    input: &Map<String, Value>,
    prefix: &str,
    defaulted: &mut Vec<String>,
) -> Map<String, Value> {
    let mut object = Map::new();

    for field in fields {
        let path = format!("{}{}", prefix, field.name);
        let value = match input.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    defaulted.push(path);
                }
                field.default.to_value()
            }
            Some(raw) => match conform_value(&field.kind, raw, &path, defaulted) {
                Some(valid) => valid,
                None => {
                    defaulted.push(path);
                    field.default.to_value()
                }
            },
        };
        object.insert(field.name.to_string(), value);
    }

    object
}

/// The normalized value, or `None` if `raw` does not fit `kind`
fn conform_value(
    kind: &FieldKind,
    raw: &Value,
    path: &str,
    defaulted: &mut Vec<String>,
) -> Option<Value> {
    match kind {
        FieldKind::Integer { min, max } => {
            let n = as_whole_number(raw)?;
            (*min..=*max).contains(&n).then(|| Value::from(n))
        }
        FieldKind::Real { min, max } => {
            let x = raw.as_f64().filter(|x| x.is_finite())?;
            (*min..=*max).contains(&x).then(|| raw.clone())
        }
        FieldKind::Enum(names) => {
            let candidate = raw.as_str()?.trim().to_lowercase();
            names
                .iter()
                .find(|name| **name == candidate)
                .map(|name| Value::from(*name))
        }
        FieldKind::Text => non_blank(raw),
        FieldKind::TextList => {
            let items = raw.as_array()?;
            let kept: Vec<Value> = items.iter().filter_map(non_blank).collect();
            if kept.len() != items.len() {
                defaulted.push(path.to_string());
            }
            Some(Value::Array(kept))
        }
        FieldKind::ObjectList(nested) => {
            let items = raw.as_array()?;
            let mut kept = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let element_prefix = format!("{}[{}].", path, index);
                match item.as_object() {
                    Some(element) => {
                        if let Some(conformed) =
                            conform_element(nested, element, &element_prefix, defaulted)
                        {
                            kept.push(Value::Object(conformed));
                        }
                    }
                    None => defaulted.push(format!("{}[{}]", path, index)),
                }
            }
            Some(Value::Array(kept))
        }
    }
}

/// Conform one list element; elements missing a valid required field are dropped
fn conform_element(
    fields: &[FieldSpec],
    element: &Map<String, Value>,
    prefix: &str,
    defaulted: &mut Vec<String>,
) -> Option<Map<String, Value>> {
    let conformed = conform_fields(fields, element, prefix, defaulted);

    let missing_required = fields.iter().any(|field| {
        field.required
            && match element.get(field.name) {
                None | Some(Value::Null) => true,
                Some(raw) => conform_value(&field.kind, raw, "", &mut Vec::new()).is_none(),
            }
    });

    if missing_required {
        None
    } else {
        Some(conformed)
    }
}

fn as_whole_number(raw: &Value) -> Option<i64> {
    if let Some(n) = raw.as_i64() {
        return Some(n);
    }
    let x = raw.as_f64()?;
    (x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x <= i64::MAX as f64)
        .then(|| x as i64)
}

fn non_blank(raw: &Value) -> Option<Value> {
    raw.as_str()
        .filter(|s| !s.trim().is_empty())
        .map(|s| Value::from(s.trim()))
}

fn describe_fields(fields: &[FieldSpec], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for field in fields {
        let requirement = if field.required { "required" } else { "optional" };
        let _ = writeln!(
            out,
            "{}- {} ({}, {}): {}",
            indent,
            field.name,
            describe_kind(&field.kind),
            requirement,
            field.about
        );
        if let FieldKind::ObjectList(nested) = field.kind {
            describe_fields(nested, depth + 1, out);
        }
    }
}

fn describe_kind(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Integer { min, max } => format!("integer {}-{}", min, max),
        FieldKind::Real { min, max } => format!("number {}-{}", min, max),
        FieldKind::Enum(names) => format!("one of {}", quoted(names)),
        FieldKind::Text => "string".to_string(),
        FieldKind::TextList => "array of strings".to_string(),
        FieldKind::ObjectList(_) => "array of objects".to_string(),
    }
}

fn quoted(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ITEM_FIELDS: &[FieldSpec] = &[
        FieldSpec::required("message", FieldKind::Text, DefaultValue::Null, "what happened"),
        FieldSpec::optional(
            "level",
            FieldKind::Enum(&["low", "high"]),
            DefaultValue::Str("low"),
            "how bad",
        ),
    ];

    const SCHEMA: TaskSchema = TaskSchema::new(&[
        FieldSpec::required(
            "score",
            FieldKind::Integer { min: 0, max: 100 },
            DefaultValue::Int(50),
            "overall score",
        ),
        FieldSpec::required(
            "confidence",
            FieldKind::Real { min: 0.0, max: 1.0 },
            DefaultValue::Real(0.0),
            "certainty",
        ),
        FieldSpec::required(
            "trend",
            FieldKind::Enum(&["rising", "falling", "stable"]),
            DefaultValue::Str("stable"),
            "direction",
        ),
        FieldSpec::optional("notes", FieldKind::TextList, DefaultValue::EmptyList, "notes"),
        FieldSpec::optional("summary", FieldKind::Text, DefaultValue::Null, "summary"),
        FieldSpec::optional(
            "items",
            FieldKind::ObjectList(ITEM_FIELDS),
            DefaultValue::EmptyList,
            "items",
        ),
    ]);

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_valid_input_passes_through() {
        let input = object(json!({
            "score": 85,
            "confidence": 0.9,
            "trend": "Rising",
            "notes": ["a", "b"],
            "summary": "fine",
            "items": [{"message": "m", "level": "HIGH"}],
            "extra": true
        }));

        let conformed = SCHEMA.conform(&input);
        assert!(conformed.defaulted.is_empty());
        assert_eq!(conformed.object["score"], json!(85));
        assert_eq!(conformed.object["trend"], json!("rising"));
        assert_eq!(conformed.object["items"][0]["level"], json!("high"));
        assert!(conformed.object.get("extra").is_none());
    }

    #[test]
    fn test_missing_required_is_flagged_optional_is_not() {
        let conformed = SCHEMA.conform(&Map::new());
        assert_eq!(conformed.defaulted, vec!["score", "confidence", "trend"]);
        assert_eq!(conformed.object, SCHEMA.defaults());
    }

    #[test]
    fn test_invalid_values_are_defaulted_and_flagged() {
        let input = object(json!({
            "score": 150,
            "confidence": "high",
            "trend": "sideways",
            "summary": "   ",
        }));

        let conformed = SCHEMA.conform(&input);
        assert_eq!(conformed.object["score"], json!(50));
        assert_eq!(conformed.object["confidence"], json!(0.0));
        assert_eq!(conformed.object["trend"], json!("stable"));
        assert_eq!(conformed.object["summary"], Value::Null);
        assert_eq!(
            conformed.defaulted,
            vec!["score", "confidence", "trend", "summary"]
        );
    }

    #[test]
    fn test_whole_valued_reals_are_integers() {
        let conformed = SCHEMA.conform(&object(json!({"score": 72.0})));
        assert_eq!(conformed.object["score"], json!(72));

        let conformed = SCHEMA.conform(&object(json!({"score": 72.5})));
        assert_eq!(conformed.object["score"], json!(50));
    }

    #[test]
    fn test_bad_list_elements_are_dropped() {
        let input = object(json!({
            "score": 10,
            "confidence": 0.5,
            "trend": "stable",
            "notes": ["keep", 3, "", "also"],
            "items": [
                {"message": "ok"},
                {"level": "high"},
                "not an object",
                {"message": "bad level", "level": "extreme"}
            ]
        }));

        let conformed = SCHEMA.conform(&input);
        assert_eq!(conformed.object["notes"], json!(["keep", "also"]));
        assert_eq!(
            conformed.object["items"],
            json!([
                {"message": "ok", "level": "low"},
                {"message": "bad level", "level": "low"}
            ])
        );
        assert_eq!(
            conformed.defaulted,
            vec!["notes", "items[1].message", "items[2]", "items[3].level"]
        );
    }

    #[test]
    fn test_describe_lists_every_field() {
        let contract = SCHEMA.describe();
        assert!(contract.contains("- score (integer 0-100, required): overall score"));
        assert!(contract.contains("- trend (one of \"rising\", \"falling\", \"stable\", required)"));
        assert!(contract.contains("  - message (string, required): what happened"));
        assert!(contract.contains("- notes (array of strings, optional)"));
    }
}
