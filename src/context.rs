use crate::value::{Mapping, Value};
use serde::{Deserialize, Deserializer};

/// Named values a template is rendered against.
///
/// Keys are unique; inserting an existing name replaces its value and keeps
/// its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context(Mapping);

impl Context {
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name, value)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }
}

impl From<Mapping> for Context {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(Self(object.into_iter().collect()))
    }
}
