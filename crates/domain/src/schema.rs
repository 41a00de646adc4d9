//! Data schemas — the validation metadata attached to properties, action
//! inputs, and event payloads.
//!
//! This is deliberately not a full JSON-Schema implementation: it covers the
//! constraint set the runtime actually enforces (type, minimum/maximum,
//! enumeration, required object members) and nothing more.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// JSON value type a schema accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean => f.write_str("boolean"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::Array => f.write_str("array"),
            Self::Object => f.write_str("object"),
        }
    }
}

/// Name of a JSON value's type, as used in validation error messages.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Type plus constraints for one value.
///
/// Serialises to the property/input schema shape of a Thing Description
/// (`type`, `minimum`, `enum`, `readOnly`, …).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSchema {
    /// Accepted JSON value type. `None` leaves the type unconstrained, as in
    /// JSON Schema.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    /// Human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Longer human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit of measurement (e.g. `"percent"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Inclusive lower bound for numeric values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numeric values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Closed set of allowed values, compared by JSON equality.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    /// Whether writes through the client-facing path are rejected.
    #[serde(rename = "readOnly", default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    /// Required member names, for `Object` schemas.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Member schemas, for `Object` schemas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, DataSchema>>,
}

impl DataSchema {
    /// Create a schema accepting the given type, with no other constraints.
    #[must_use]
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::default()
        }
    }

    /// Schema accepting only `null`.
    #[must_use]
    pub fn null() -> Self {
        Self::new(DataType::Null)
    }

    /// Schema accepting booleans.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(DataType::Boolean)
    }

    /// Schema accepting integers (floats are rejected).
    #[must_use]
    pub fn integer() -> Self {
        Self::new(DataType::Integer)
    }

    /// Schema accepting any JSON number.
    #[must_use]
    pub fn number() -> Self {
        Self::new(DataType::Number)
    }

    /// Schema accepting strings.
    #[must_use]
    pub fn string() -> Self {
        Self::new(DataType::String)
    }

    /// Schema accepting arrays.
    #[must_use]
    pub fn array() -> Self {
        Self::new(DataType::Array)
    }

    /// Schema accepting objects.
    #[must_use]
    pub fn object() -> Self {
        Self::new(DataType::Object)
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit of measurement.
    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the inclusive lower bound.
    #[must_use]
    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Set the inclusive upper bound.
    #[must_use]
    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    /// Restrict values to a closed set of alternatives.
    #[must_use]
    pub fn enumeration(mut self, values: Vec<Value>) -> Self {
        self.enumeration = Some(values);
        self
    }

    /// Mark the value as read-only for the client-facing write path.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark an object member as required.
    #[must_use]
    pub fn required(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    /// Declare a member schema for an `Object` schema.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, schema: DataSchema) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema);
        self
    }

    /// Check `value` against this schema.
    ///
    /// Type is checked first, then range, enumeration, and (for objects)
    /// required members and member schemas. An integer JSON number satisfies
    /// `Number`; a float does not satisfy `Integer`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.check_type(value)?;

        if let Some(number) = value.as_f64() {
            if let Some(minimum) = self.minimum {
                if number < minimum {
                    return Err(ValidationError::BelowMinimum {
                        minimum,
                        found: number,
                    });
                }
            }
            if let Some(maximum) = self.maximum {
                if number > maximum {
                    return Err(ValidationError::AboveMaximum {
                        maximum,
                        found: number,
                    });
                }
            }
        }

        if let Some(allowed) = &self.enumeration {
            if !allowed.iter().any(|candidate| candidate == value) {
                return Err(ValidationError::NotInEnumeration);
            }
        }

        if let Value::Object(members) = value {
            for field in &self.required {
                if !members.contains_key(field) {
                    return Err(ValidationError::MissingRequired {
                        field: field.clone(),
                    });
                }
            }
            if let Some(schemas) = &self.properties {
                for (name, member) in members {
                    if let Some(schema) = schemas.get(name) {
                        schema.validate(member)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn check_type(&self, value: &Value) -> Result<(), ValidationError> {
        let Some(expected) = self.data_type else {
            return Ok(());
        };
        let matches = match expected {
            DataType::Null => value.is_null(),
            DataType::Boolean => value.is_boolean(),
            DataType::Integer => value.as_number().is_some_and(|n| n.is_i64() || n.is_u64()),
            DataType::Number => value.is_number(),
            DataType::String => value.is_string(),
            DataType::Array => value.is_array(),
            DataType::Object => value.is_object(),
        };
        if matches {
            Ok(())
        } else {
            Err(ValidationError::TypeMismatch {
                expected,
                found: json_type_name(value),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_accept_value_of_declared_type() {
        assert!(DataSchema::boolean().validate(&json!(true)).is_ok());
        assert!(DataSchema::integer().validate(&json!(42)).is_ok());
        assert!(DataSchema::number().validate(&json!(21.5)).is_ok());
        assert!(DataSchema::string().validate(&json!("on")).is_ok());
        assert!(DataSchema::array().validate(&json!([1, 2])).is_ok());
        assert!(DataSchema::object().validate(&json!({"a": 1})).is_ok());
        assert!(DataSchema::null().validate(&Value::Null).is_ok());
    }

    #[test]
    fn should_reject_value_of_wrong_type() {
        let result = DataSchema::integer().validate(&json!("fifty"));
        assert!(matches!(
            result,
            Err(ValidationError::TypeMismatch {
                expected: DataType::Integer,
                found: "string"
            })
        ));
    }

    #[test]
    fn should_accept_any_type_when_none_is_declared() {
        let schema = DataSchema::default();
        assert!(schema.validate(&json!(true)).is_ok());
        assert!(schema.validate(&json!("anything")).is_ok());
        let constrained = DataSchema::default().minimum(0.0);
        assert!(matches!(
            constrained.validate(&json!(-1)),
            Err(ValidationError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn should_accept_integer_where_number_is_declared() {
        assert!(DataSchema::number().validate(&json!(42)).is_ok());
    }

    #[test]
    fn should_reject_float_where_integer_is_declared() {
        let result = DataSchema::integer().validate(&json!(42.5));
        assert!(matches!(result, Err(ValidationError::TypeMismatch { .. })));
    }

    #[test]
    fn should_enforce_minimum_and_maximum() {
        let schema = DataSchema::integer().minimum(0.0).maximum(100.0);
        assert!(schema.validate(&json!(0)).is_ok());
        assert!(schema.validate(&json!(100)).is_ok());
        assert!(matches!(
            schema.validate(&json!(-1)),
            Err(ValidationError::BelowMinimum { .. })
        ));
        assert!(matches!(
            schema.validate(&json!(101)),
            Err(ValidationError::AboveMaximum { .. })
        ));
    }

    #[test]
    fn should_enforce_enumeration_by_json_equality() {
        let schema = DataSchema::string().enumeration(vec![json!("ON"), json!("OFF")]);
        assert!(schema.validate(&json!("ON")).is_ok());
        assert!(matches!(
            schema.validate(&json!("on")),
            Err(ValidationError::NotInEnumeration)
        ));
    }

    #[test]
    fn should_enforce_required_members_on_objects() {
        let schema = DataSchema::object()
            .required("brightness")
            .required("duration");
        assert!(schema.validate(&json!({"brightness": 50, "duration": 1000})).is_ok());
        assert!(matches!(
            schema.validate(&json!({"brightness": 50})),
            Err(ValidationError::MissingRequired { field }) if field == "duration"
        ));
    }

    #[test]
    fn should_recurse_into_declared_member_schemas() {
        let schema = DataSchema::object()
            .property("brightness", DataSchema::integer().minimum(0.0).maximum(100.0));
        assert!(schema.validate(&json!({"brightness": 50})).is_ok());
        assert!(matches!(
            schema.validate(&json!({"brightness": 150})),
            Err(ValidationError::AboveMaximum { .. })
        ));
    }

    #[test]
    fn should_ignore_undeclared_members_on_objects() {
        let schema = DataSchema::object().property("known", DataSchema::integer());
        assert!(schema.validate(&json!({"known": 1, "extra": "anything"})).is_ok());
    }

    #[test]
    fn should_default_read_only_to_false() {
        assert!(!DataSchema::number().read_only);
        assert!(DataSchema::number().read_only().read_only);
    }

    #[test]
    fn should_serialize_with_wire_field_names() {
        let schema = DataSchema::integer()
            .minimum(0.0)
            .maximum(100.0)
            .enumeration(vec![json!(0), json!(50), json!(100)])
            .read_only();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "integer");
        assert_eq!(json["minimum"], 0.0);
        assert_eq!(json["maximum"], 100.0);
        assert_eq!(json["enum"], json!([0, 50, 100]));
        assert_eq!(json["readOnly"], true);
    }

    #[test]
    fn should_omit_unset_constraints_when_serializing() {
        let json = serde_json::to_value(DataSchema::string()).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["type"], "string");
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let schema = DataSchema::object()
            .title("Fade input")
            .required("brightness")
            .property("brightness", DataSchema::integer().minimum(0.0).maximum(100.0))
            .property("duration", DataSchema::integer().unit("millisecond"));
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: DataSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }
}
