//! Typed access to tool call arguments.

use crate::error::SageError;
use crate::types::ToolArgumentMap;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    map: ToolArgumentMap,
}

impl ToolArguments {
    pub fn new(map: ToolArgumentMap) -> Self {
        Self { map }
    }

    /// The raw argument map.
    pub fn raw(&self) -> &ToolArgumentMap {
        &self.map
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str, SageError> {
        self.get_str_opt(key)
            .ok_or_else(|| SageError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional boolean argument.
    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        self.map.get(key).and_then(|v| v.as_bool())
    }

    /// Get an optional non-negative integer argument. Accepts whole floats,
    /// which some models emit for integer parameters.
    pub fn get_u64_opt(&self, key: &str) -> Option<u64> {
        let value = self.map.get(key)?;
        value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, SageError> {
        serde_json::from_value(serde_json::Value::Object(self.map.clone())).map_err(|e| {
            SageError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

impl From<ToolArgumentMap> for ToolArguments {
    fn from(map: ToolArgumentMap) -> Self {
        Self::new(map)
    }
}
