//! Event schema registry and validator.
//!
//! An [`EventSchema`] maps each known event type to the ordered list of
//! field names its `data` object must contain. The schema is built once at
//! startup and never changes afterwards.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Event types accepted when the configuration does not define its own.
pub const BUILTIN_EVENT_TYPES: &[(&str, &[&str])] = &[
    ("event_1", &["field1", "field2"]),
    ("event_2", &["fieldA", "fieldB"]),
    ("event_3", &["paramX", "paramY", "paramZ"]),
    ("event_4", &["status", "description"]),
    ("event_5", &["username", "action"]),
];

/// Reasons an event is rejected by [`EventSchema::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid event type: {0}")]
    UnknownEventType(String),

    /// Required fields absent from `data`, in schema order.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

/// Immutable mapping from event type to required field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchema {
    types: HashMap<String, Box<[String]>>,
}

impl EventSchema {
    /// The five built-in event types.
    pub fn builtin() -> Self {
        Self::from_definitions(BUILTIN_EVENT_TYPES.iter().map(|(name, fields)| {
            (
                name.to_string(),
                fields.iter().map(|f| f.to_string()).collect(),
            )
        }))
    }

    /// Build a schema from `(event_type, required_fields)` pairs.
    ///
    /// Field order is preserved; a later definition of the same type
    /// replaces an earlier one.
    pub fn from_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let types = definitions
            .into_iter()
            .map(|(name, fields)| (name, fields.into_boxed_slice()))
            .collect();
        Self { types }
    }

    /// Required fields for `event_type`, or `None` if the type is unknown.
    pub fn required_fields(&self, event_type: &str) -> Option<&[String]> {
        self.types.get(event_type).map(|fields| &fields[..])
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.types.contains_key(event_type)
    }

    /// Registered event type names, in no particular order.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Check that `event_type` is known and every required field is a key
    /// of `data`. Values are not inspected; `null` satisfies presence.
    pub fn validate(&self, event_type: &str, data: &Map<String, Value>) -> Result<(), ValidationError> {
        let required = self
            .required_fields(event_type)
            .ok_or_else(|| ValidationError::UnknownEventType(event_type.to_owned()))?;

        let missing: Vec<String> = required
            .iter()
            .filter(|field| !data.contains_key(field.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFields(missing))
        }
    }
}

impl Default for EventSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test data must be an object"),
        }
    }

    #[test]
    fn test_builtin_types_accept_complete_data() {
        let schema = EventSchema::builtin();
        assert_eq!(schema.len(), 5);
        for (name, fields) in BUILTIN_EVENT_TYPES {
            let payload: Map<String, Value> = fields
                .iter()
                .map(|f| (f.to_string(), json!("x")))
                .collect();
            assert_eq!(schema.validate(name, &payload), Ok(()), "{name}");
        }
    }

    #[test]
    fn test_unknown_type_rejected_before_fields() {
        let schema = EventSchema::builtin();
        let err = schema.validate("event_9", &Map::new()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownEventType("event_9".into()));
        assert_eq!(err.to_string(), "invalid event type: event_9");
    }

    #[test]
    fn test_missing_fields_in_schema_order() {
        let schema = EventSchema::builtin();
        let err = schema
            .validate("event_3", &data(json!({"paramY": 1, "extra": true})))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["paramX".into(), "paramZ".into()])
        );
        assert_eq!(err.to_string(), "missing required fields: paramX, paramZ");
    }

    #[test]
    fn test_presence_ignores_value_shape() {
        let schema = EventSchema::builtin();
        let payload = data(json!({"status": null, "description": [1, 2, 3]}));
        assert_eq!(schema.validate("event_4", &payload), Ok(()));
    }

    #[test]
    fn test_custom_definitions_replace_builtin() {
        let schema = EventSchema::from_definitions([(
            "login".to_string(),
            vec!["user".to_string(), "ip".to_string()],
        )]);
        assert!(schema.contains("login"));
        assert!(!schema.contains("event_1"));
        assert_eq!(
            schema.required_fields("login"),
            Some(&["user".to_string(), "ip".to_string()][..])
        );
    }
}
