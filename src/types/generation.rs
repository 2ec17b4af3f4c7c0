//! Generation settings.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded to the hosted API.
///
/// CLI backends ignore these; they run with their own defaults.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationSettings {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.max_output_tokens.is_none()
    }
}
