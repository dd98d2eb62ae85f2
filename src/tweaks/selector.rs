//! Node Selectors and Tweaks

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SelectorError;

/// Identifies exactly one node, by id or by display title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Node id in canonical string form (`346` and `"346"` are equal)
    Id(String),
    /// Display title (`title` / `_meta.title`)
    Name(String),
}

impl Selector {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Builds a selector from a `{id: ...}` or `{name: ...}` mapping.
    ///
    /// Keys other than `id` and `name` are ignored. Exactly one of the two
    /// must be present.
    pub fn from_mapping(mapping: &Map<String, Value>) -> Result<Self, SelectorError> {
        match (mapping.get("id"), mapping.get("name")) {
            (Some(id), None) => scalar_string(id)
                .map(Self::Id)
                .ok_or_else(|| SelectorError::Invalid(format!("unsupported id value {}", id))),
            (None, Some(name)) => scalar_string(name)
                .map(Self::Name)
                .ok_or_else(|| SelectorError::Invalid(format!("unsupported name value {}", name))),
            (None, None) => Err(SelectorError::Invalid(
                "tweak must have a selector with an `id` or a `name`".to_string(),
            )),
            (Some(_), Some(_)) => Err(SelectorError::Invalid(
                "tweak must have only one of `id` and `name`".to_string(),
            )),
        }
    }
}

/// Written as a one-entry `{id: ...}` / `{name: ...}` mapping, the same
/// shape [`Selector::from_mapping`] reads.
impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Id(id) => map.serialize_entry("id", id)?,
            Self::Name(name) => map.serialize_entry("name", name)?,
        }
        map.end()
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id \"{}\"", id),
            Self::Name(name) => write!(f, "name \"{}\"", name),
        }
    }
}

/// A selector with the field values to write on the selected node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tweak {
    selector: Selector,
    changes: Map<String, Value>,
}

impl Tweak {
    pub fn new(selector: Selector, changes: Map<String, Value>) -> Self {
        Self { selector, changes }
    }

    /// Validates a raw `selector` mapping and pairs it with `changes`.
    pub fn from_parts(
        selector: &Map<String, Value>,
        changes: Map<String, Value>,
    ) -> Result<Self, SelectorError> {
        Ok(Self::new(Selector::from_mapping(selector)?, changes))
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Field name to new value, in document order.
    pub fn changes(&self) -> &Map<String, Value> {
        &self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_id_is_stringified() {
        let from_int = Selector::from_mapping(&mapping(json!({"id": 346}))).unwrap();
        let from_str = Selector::from_mapping(&mapping(json!({"id": "346"}))).unwrap();
        assert_eq!(from_int, Selector::id("346"));
        assert_eq!(from_int, from_str);
    }

    #[test]
    fn test_name_selector() {
        let selector = Selector::from_mapping(&mapping(json!({"name": "KSampler"}))).unwrap();
        assert_eq!(selector, Selector::name("KSampler"));
    }

    #[test]
    fn test_zero_or_two_keys_rejected() {
        assert!(matches!(
            Selector::from_mapping(&mapping(json!({}))),
            Err(SelectorError::Invalid(_))
        ));
        assert!(matches!(
            Selector::from_mapping(&mapping(json!({"id": 1, "name": "x"}))),
            Err(SelectorError::Invalid(_))
        ));
    }

    #[test]
    fn test_unrelated_keys_ignored() {
        let selector =
            Selector::from_mapping(&mapping(json!({"id": 3, "comment": "seed node"}))).unwrap();
        assert_eq!(selector, Selector::id("3"));
        assert!(Selector::from_mapping(&mapping(json!({"comment": "x"}))).is_err());
    }

    #[test]
    fn test_non_scalar_id_rejected() {
        assert!(Selector::from_mapping(&mapping(json!({"id": [1, 2]}))).is_err());
        assert!(Selector::from_mapping(&mapping(json!({"name": null}))).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Selector::id("12").to_string(), "id \"12\"");
        assert_eq!(Selector::name("Prompt").to_string(), "name \"Prompt\"");
    }

    #[test]
    fn test_serializes_as_mapping() {
        let tweak = Tweak::new(
            Selector::id("5"),
            mapping(json!({"seed": 42})),
        );
        let value = serde_json::to_value(&tweak).unwrap();
        assert_eq!(value, json!({"selector": {"id": "5"}, "changes": {"seed": 42}}));
    }

    #[test]
    fn test_yaml_selector_is_a_mapping() {
        let yaml = serde_yaml::to_string(&Selector::name("Positive Prompt")).unwrap();
        assert_eq!(yaml, "name: Positive Prompt\n");

        let parsed: Map<String, Value> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            Selector::from_mapping(&parsed).unwrap(),
            Selector::name("Positive Prompt")
        );
    }
}
