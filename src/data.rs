use crate::common::{Float, Int, Number};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value resolvable through an `@path` reference.
///
/// Numbers splice straight into the formula; text splices an unresolved
/// fragment that the simplifier reclassifies before evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Number(Number),
    Text(String),
}

impl From<Int> for DataValue {
    fn from(x: Int) -> Self {
        Self::Number(x.into())
    }
}

impl From<Float> for DataValue {
    fn from(x: Float) -> Self {
        Self::Number(x.into())
    }
}

impl From<Number> for DataValue {
    fn from(x: Number) -> Self {
        Self::Number(x)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Flat key/value environment backing `@path` references.
///
/// The engine only ever reads from it; parsing consumes the values it needs
/// and the resulting roll keeps no reference back to the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollData(HashMap<String, DataValue>);

impl RollData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<DataValue>) {
        self.0.insert(path.into(), value.into());
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.insert(path, value);
        self
    }

    pub fn get(&self, path: &str) -> Option<&DataValue> {
        self.0.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let data = RollData::new().with("abilities.str.mod", 3).with("label", "2d6");
        assert_eq!(data.get("abilities.str.mod"), Some(&DataValue::Number(Number::Int(3))));
        assert_eq!(data.get("label"), Some(&DataValue::Text("2d6".to_owned())));
        assert_eq!(data.get("missing"), None);
    }
}
