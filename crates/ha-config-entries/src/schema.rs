//! Form schemas for config and options flows
//!
//! A [`Schema`] is an ordered list of fields, each backed by a [`Selector`]
//! that both describes the widget and validates/coerces the submitted value.

use std::collections::HashMap;

use ha_core::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Submitted or validated form values
pub type FlowInput = HashMap<String, Value>;

pub const ERROR_REQUIRED: &str = "required";
pub const ERROR_INVALID: &str = "invalid";
pub const ERROR_EXTRA_KEY: &str = "extra_keys_not_allowed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumberMode {
    #[default]
    Box,
    Slider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selector {
    /// Entity id(s), optionally restricted to some domains
    Entity {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        domains: Vec<String>,
        #[serde(default)]
        multiple: bool,
    },
    Text,
    /// A float in `min..=max`; integers and numeric strings are coerced
    Number {
        min: f64,
        max: f64,
        step: f64,
        #[serde(default)]
        mode: NumberMode,
    },
    /// One of a fixed list of strings
    Select { options: Vec<String> },
}

impl Selector {
    pub fn entity(domains: &[&str], multiple: bool) -> Self {
        Selector::Entity {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            multiple,
        }
    }

    pub fn select(options: &[&str]) -> Self {
        Selector::Select {
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    /// Validate a submitted value, returning its normalized form
    pub fn validate(&self, value: &Value) -> Option<Value> {
        match self {
            Selector::Entity { domains, multiple } => {
                let valid = |v: &Value| {
                    let id = v.as_str()?.parse::<EntityId>().ok()?;
                    (domains.is_empty() || domains.iter().any(|d| d == id.domain()))
                        .then(|| Value::String(id.to_string()))
                };
                if *multiple {
                    value
                        .as_array()?
                        .iter()
                        .map(valid)
                        .collect::<Option<Vec<_>>>()
                        .map(Value::Array)
                } else {
                    valid(value)
                }
            }
            Selector::Text => value.as_str().map(|s| Value::String(s.to_string())),
            Selector::Number { min, max, .. } => {
                let n = match value {
                    Value::Number(n) => n.as_f64()?,
                    Value::String(s) => s.trim().parse::<f64>().ok()?,
                    _ => return None,
                };
                if !(*min..=*max).contains(&n) {
                    return None;
                }
                serde_json::Number::from_f64(n).map(Value::Number)
            }
            Selector::Select { options } => {
                let s = value.as_str()?;
                options
                    .iter()
                    .any(|o| o == s)
                    .then(|| Value::String(s.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(rename = "name")]
    pub key: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Pre-filled in the form but not applied when the field is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<Value>,
    pub selector: Selector,
}

impl SchemaField {
    pub fn required(key: impl Into<String>, selector: Selector) -> Self {
        Self {
            key: key.into(),
            required: true,
            default: None,
            suggested_value: None,
            selector,
        }
    }

    pub fn optional(key: impl Into<String>, selector: Selector) -> Self {
        Self {
            required: false,
            ..Self::required(key, selector)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    pub fn field(&self, key: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    pub fn suggested_value(&self, key: &str) -> Option<&Value> {
        self.field(key).and_then(|f| f.suggested_value.as_ref())
    }

    /// Copy of the schema without one field
    pub fn without(&self, key: &str) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| f.key != key)
                .cloned()
                .collect(),
        }
    }

    /// Copy of the schema with suggested values taken from `values`;
    /// fields missing from `values` keep what they had
    pub fn with_suggested_values(&self, values: &FlowInput) -> Self {
        let mut schema = self.clone();
        for field in &mut schema.fields {
            if let Some(value) = values.get(&field.key) {
                field.suggested_value = Some(value.clone());
            }
        }
        schema
    }

    /// Validate submitted input
    ///
    /// Defaults are filled in for omitted optional fields and then validated
    /// like submitted values. On failure returns one error code per
    /// offending key.
    pub fn validate(&self, input: &FlowInput) -> Result<FlowInput, HashMap<String, String>> {
        let mut errors = HashMap::new();
        let mut output = FlowInput::new();

        for key in input.keys() {
            if self.field(key).is_none() {
                errors.insert(key.clone(), ERROR_EXTRA_KEY.to_string());
            }
        }

        for field in &self.fields {
            let value = input.get(&field.key).or(field.default.as_ref());
            match value {
                Some(value) => match field.selector.validate(value) {
                    Some(valid) => {
                        output.insert(field.key.clone(), valid);
                    }
                    None => {
                        errors.insert(field.key.clone(), ERROR_INVALID.to_string());
                    }
                },
                None if field.required => {
                    errors.insert(field.key.clone(), ERROR_REQUIRED.to_string());
                }
                None => {}
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(vec![
            SchemaField::required("name", Selector::Text),
            SchemaField::required(
                "entity_ids",
                Selector::entity(&["sensor", "number"], true),
            ),
            SchemaField::required("type", Selector::select(&["min", "max"])),
            SchemaField::optional(
                "round_digits",
                Selector::Number {
                    min: 0.0,
                    max: 6.0,
                    step: 1.0,
                    mode: NumberMode::Box,
                },
            )
            .with_default(json!(2)),
        ])
    }

    fn input(value: Value) -> FlowInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_applies_and_coerces_defaults() {
        let out = schema()
            .validate(&input(json!({
                "name": "My min_max",
                "entity_ids": ["sensor.a", "number.b"],
                "type": "max",
            })))
            .unwrap();

        assert_eq!(out["round_digits"], json!(2.0));
        assert_eq!(out["entity_ids"], json!(["sensor.a", "number.b"]));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_number_coercion_and_range() {
        let schema = schema();
        let number = &schema.fields[3].selector;
        assert_eq!(number.validate(&json!(0)), Some(json!(0.0)));
        assert_eq!(number.validate(&json!("3")), Some(json!(3.0)));
        assert_eq!(number.validate(&json!(7)), None);
        assert_eq!(number.validate(&json!(-1)), None);
        assert_eq!(number.validate(&json!(true)), None);
    }

    #[test]
    fn test_validate_reports_errors_per_key() {
        let errors = schema()
            .validate(&input(json!({
                "entity_ids": ["light.kitchen"],
                "type": "median",
                "bogus": 1,
            })))
            .unwrap_err();

        assert_eq!(errors["name"], ERROR_REQUIRED);
        assert_eq!(errors["entity_ids"], ERROR_INVALID);
        assert_eq!(errors["type"], ERROR_INVALID);
        assert_eq!(errors["bogus"], ERROR_EXTRA_KEY);
        assert!(!errors.contains_key("round_digits"));
    }

    #[test]
    fn test_entity_selector_shapes() {
        let single = Selector::entity(&[], false);
        assert_eq!(single.validate(&json!("sensor.a")), Some(json!("sensor.a")));
        assert_eq!(single.validate(&json!(["sensor.a"])), None);
        assert_eq!(single.validate(&json!("not an id")), None);

        let multiple = Selector::entity(&["sensor"], true);
        assert_eq!(multiple.validate(&json!([])), Some(json!([])));
        assert_eq!(multiple.validate(&json!("sensor.a")), None);
    }

    #[test]
    fn test_suggested_values_and_without() {
        let current = input(json!({"name": "x", "type": "min", "round_digits": 0.0}));
        let schema = schema().without("name").with_suggested_values(&current);

        assert!(schema.field("name").is_none());
        assert_eq!(schema.suggested_value("type"), Some(&json!("min")));
        assert_eq!(schema.suggested_value("round_digits"), Some(&json!(0.0)));
        assert_eq!(schema.suggested_value("entity_ids"), None);
        assert_eq!(
            schema.keys().collect::<Vec<_>>(),
            vec!["entity_ids", "type", "round_digits"]
        );
    }

    #[test]
    fn test_schema_serializes_as_field_list() {
        let json = serde_json::to_value(schema()).unwrap();
        assert_eq!(json[0]["name"], "name");
        assert_eq!(json[0]["selector"]["type"], "text");
        assert_eq!(json[3]["selector"]["mode"], "box");
        assert_eq!(json[3]["default"], 2);
    }
}
