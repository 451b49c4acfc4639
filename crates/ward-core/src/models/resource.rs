//! Minimal references to EMR-owned resources.

use serde::{Deserialize, Serialize};

/// A `{uuid, display}` reference to a resource owned by the EMR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct ResourceRef {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ResourceRef {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            display: None,
        }
    }

    pub fn with_display(uuid: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            display: Some(display.into()),
        }
    }

    /// Display text, falling back to the uuid.
    pub fn label(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.uuid)
    }
}
