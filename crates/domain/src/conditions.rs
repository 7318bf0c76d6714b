use std::collections::BTreeMap;

use serde_json::Value;
use teamgrid_core::{AppError, AppResult};

/// Runtime values a caller supplies for condition evaluation.
pub type ConditionContext = BTreeMap<String, Value>;

/// Structured predicate attached to a grant, parsed once at write time.
///
/// Evaluation fails closed: a key missing from the call context, or a payload
/// that could not be interpreted when read back from storage, always denies.
#[derive(Debug, Clone, PartialEq)]
pub enum GrantConditions {
    /// Every key must equal the corresponding value in the call context.
    Equals(BTreeMap<String, Value>),
    /// Recorded payload could not be interpreted; evaluates to false.
    Unsatisfiable,
}

impl GrantConditions {
    /// Parses a write-path conditions payload, rejecting anything that is not
    /// a JSON object.
    pub fn from_json(value: &Value) -> AppResult<Self> {
        match value {
            Value::Object(entries) => Ok(Self::Equals(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            )),
            other => Err(AppError::Validation(format!(
                "grant conditions must be a JSON object, got {other}"
            ))),
        }
    }

    /// Interprets a stored conditions payload, mapping malformed data to
    /// [`GrantConditions::Unsatisfiable`] instead of failing the read.
    #[must_use]
    pub fn from_stored(value: &Value) -> Self {
        Self::from_json(value).unwrap_or(Self::Unsatisfiable)
    }

    /// Evaluates the predicate against a call context.
    #[must_use]
    pub fn evaluate(&self, context: &ConditionContext) -> bool {
        match self {
            Self::Equals(entries) => entries
                .iter()
                .all(|(key, expected)| context.get(key) == Some(expected)),
            Self::Unsatisfiable => false,
        }
    }

    /// Returns whether this predicate can never be satisfied.
    #[must_use]
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::Unsatisfiable)
    }

    /// Returns a storage representation of the predicate.
    ///
    /// `Unsatisfiable` round-trips through a non-object value so a reloaded
    /// grant keeps denying.
    #[must_use]
    pub fn storage_value(&self) -> Value {
        match self {
            Self::Equals(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            Self::Unsatisfiable => Value::Bool(false),
        }
    }
}
