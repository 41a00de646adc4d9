//! Automation rules: premises over property values, conclusions that write
//! properties or request actions.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::id::{RuleId, ThingId};

/// Comparison applied between an observed property value and a premise's
/// expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
        }
    }

    /// Compare `actual` against `expected`.
    ///
    /// When both sides are numbers they are compared numerically, so an
    /// integer `50` equals a float `50.0`. Otherwise `eq`/`ne` fall back to
    /// JSON equality and the ordering operators are simply false.
    #[must_use]
    pub fn evaluate(self, actual: &Value, expected: &Value) -> bool {
        if let (Some(lhs), Some(rhs)) = (actual.as_f64(), expected.as_f64()) {
            let Some(ordering) = lhs.partial_cmp(&rhs) else {
                return false;
            };
            return match self {
                Self::Eq => ordering == Ordering::Equal,
                Self::Ne => ordering != Ordering::Equal,
                Self::Lt => ordering == Ordering::Less,
                Self::Le => ordering != Ordering::Greater,
                Self::Gt => ordering == Ordering::Greater,
                Self::Ge => ordering != Ordering::Less,
            };
        }
        match self {
            Self::Eq => actual == expected,
            Self::Ne => actual != expected,
            _ => false,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One condition over one thing's property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Premise {
    #[serde(rename = "thing")]
    pub thing_id: ThingId,
    pub property: String,
    pub op: ComparisonOp,
    pub value: Value,
}

impl Premise {
    #[must_use]
    pub fn new(
        thing_id: impl Into<ThingId>,
        property: impl Into<String>,
        op: ComparisonOp,
        value: Value,
    ) -> Self {
        Self {
            thing_id: thing_id.into(),
            property: property.into(),
            op,
            value,
        }
    }
}

/// How a rule's premises combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// What a conclusion does to its target thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum Effect {
    SetProperty {
        property: String,
        value: Value,
    },
    RequestAction {
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
}

/// One consequence applied when a rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conclusion {
    #[serde(rename = "thing")]
    pub thing_id: ThingId,
    #[serde(flatten)]
    pub effect: Effect,
}

impl Conclusion {
    /// Conclusion that writes a property on `thing_id`.
    #[must_use]
    pub fn set_property(
        thing_id: impl Into<ThingId>,
        property: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            thing_id: thing_id.into(),
            effect: Effect::SetProperty {
                property: property.into(),
                value,
            },
        }
    }

    /// Conclusion that requests an action on `thing_id`.
    #[must_use]
    pub fn request_action(
        thing_id: impl Into<ThingId>,
        action: impl Into<String>,
        input: Option<Value>,
    ) -> Self {
        Self {
            thing_id: thing_id.into(),
            effect: Effect::RequestAction {
                action: action.into(),
                input,
            },
        }
    }
}

/// A complete automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: RuleId,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub combinator: Combinator,
    pub premises: Vec<Premise>,
    pub conclusions: Vec<Conclusion>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// Start building a rule with the given name. Rules are enabled and
    /// combine premises with `and` unless told otherwise.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder {
            name: name.into(),
            enabled: true,
            combinator: Combinator::And,
            premises: Vec::new(),
            conclusions: Vec::new(),
        }
    }

    /// Check structural soundness.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or the rule has no premise or no
    /// conclusion.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.premises.is_empty() {
            return Err(ValidationError::NoPremises);
        }
        if self.conclusions.is_empty() {
            return Err(ValidationError::NoConclusions);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RuleBuilder {
    name: String,
    enabled: bool,
    combinator: Combinator,
    premises: Vec<Premise>,
    conclusions: Vec<Conclusion>,
}

impl RuleBuilder {
    #[must_use]
    pub fn combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[must_use]
    pub fn premise(mut self, premise: Premise) -> Self {
        self.premises.push(premise);
        self
    }

    #[must_use]
    pub fn conclusion(mut self, conclusion: Conclusion) -> Self {
        self.conclusions.push(conclusion);
        self
    }

    /// # Errors
    ///
    /// Fails when the rule would not pass [`Rule::validate`].
    pub fn build(self) -> Result<Rule, ValidationError> {
        let rule = Rule {
            id: RuleId::new(),
            name: self.name,
            enabled: self.enabled,
            combinator: self.combinator,
            premises: self.premises,
            conclusions: self.conclusions,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_compare_numbers_numerically() {
        assert!(ComparisonOp::Eq.evaluate(&json!(50), &json!(50.0)));
        assert!(ComparisonOp::Lt.evaluate(&json!(21.5), &json!(22)));
        assert!(ComparisonOp::Ge.evaluate(&json!(100), &json!(100)));
        assert!(!ComparisonOp::Gt.evaluate(&json!(100), &json!(100)));
    }

    #[test]
    fn should_compare_non_numbers_by_json_equality() {
        assert!(ComparisonOp::Eq.evaluate(&json!("ON"), &json!("ON")));
        assert!(ComparisonOp::Ne.evaluate(&json!("ON"), &json!("OFF")));
        assert!(ComparisonOp::Eq.evaluate(&json!(true), &json!(true)));
    }

    #[test]
    fn should_refuse_to_order_non_numbers() {
        assert!(!ComparisonOp::Lt.evaluate(&json!("a"), &json!("b")));
        assert!(!ComparisonOp::Ge.evaluate(&json!(true), &json!(false)));
    }

    #[test]
    fn should_build_enabled_rule_with_and_combinator() {
        let rule = Rule::builder("night light")
            .premise(Premise::new("sensor", "dark", ComparisonOp::Eq, json!(true)))
            .conclusion(Conclusion::set_property("lamp", "on", json!(true)))
            .build()
            .unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.combinator, Combinator::And);
        assert_eq!(rule.name, "night light");
    }

    #[test]
    fn should_reject_rule_without_premises() {
        let result = Rule::builder("no trigger")
            .conclusion(Conclusion::set_property("lamp", "on", json!(true)))
            .build();
        assert!(matches!(result, Err(ValidationError::NoPremises)));
    }

    #[test]
    fn should_reject_rule_without_conclusions() {
        let result = Rule::builder("no effect")
            .premise(Premise::new("sensor", "dark", ComparisonOp::Eq, json!(true)))
            .build();
        assert!(matches!(result, Err(ValidationError::NoConclusions)));
    }

    #[test]
    fn should_reject_blank_name() {
        let result = Rule::builder("  ")
            .premise(Premise::new("sensor", "dark", ComparisonOp::Eq, json!(true)))
            .conclusion(Conclusion::set_property("lamp", "on", json!(true)))
            .build();
        assert!(matches!(result, Err(ValidationError::EmptyName)));
    }

    #[test]
    fn should_serialize_conclusion_with_flattened_effect() {
        let conclusion = Conclusion::request_action("lamp", "fade", Some(json!({"brightness": 0})));
        let json = serde_json::to_value(&conclusion).unwrap();
        assert_eq!(json["thing"], "lamp");
        assert_eq!(json["effect"], "requestAction");
        assert_eq!(json["action"], "fade");
        assert_eq!(json["input"], json!({"brightness": 0}));
    }

    #[test]
    fn should_deserialize_premise_from_wire_shape() {
        let premise: Premise = serde_json::from_value(json!({
            "thing": "A",
            "property": "state",
            "op": "eq",
            "value": "ON",
        }))
        .unwrap();
        assert_eq!(premise.thing_id.as_str(), "A");
        assert_eq!(premise.op, ComparisonOp::Eq);
        assert_eq!(premise.value, json!("ON"));
    }

    #[test]
    fn should_mint_an_id_when_deserializing_without_one() {
        let rule: Rule = serde_json::from_value(json!({
            "name": "night light",
            "premises": [
                {"thing": "sensor", "property": "dark", "op": "eq", "value": true},
            ],
            "conclusions": [
                {"thing": "lamp", "effect": "setProperty", "property": "on", "value": true},
            ],
        }))
        .unwrap();
        let again: Rule = serde_json::from_value(json!({
            "name": "night light",
            "premises": [
                {"thing": "sensor", "property": "dark", "op": "eq", "value": true},
            ],
            "conclusions": [
                {"thing": "lamp", "effect": "setProperty", "property": "on", "value": true},
            ],
        }))
        .unwrap();
        assert!(rule.enabled);
        assert_ne!(rule.id, again.id);
    }
}
