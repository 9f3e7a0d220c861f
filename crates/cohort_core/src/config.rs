//! # Context Configuration
//!
//! Context metadata and sizing, loadable from TOML once at startup.
//!
//! ```toml
//! name = "game"
//! component_names = ["Position", "Velocity", "Health"]
//! entity_capacity = 4096
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};

/// Descriptive metadata of a context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
    /// Context name, used in logs.
    pub name: String,
    /// One name per component slot, in slot order.
    pub component_names: Vec<String>,
}

impl ContextInfo {
    /// Creates metadata from a name and slot names.
    pub fn new<S: Into<String>>(name: impl Into<String>, component_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            component_names: component_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Placeholder metadata naming slots by their index.
    #[must_use]
    pub fn unnamed(total_components: usize) -> Self {
        Self {
            name: "Unnamed Context".to_owned(),
            component_names: (0..total_components).map(|i| format!("Index {i}")).collect(),
        }
    }

    /// Name of a slot, if the slot exists.
    #[must_use]
    pub fn component_name(&self, slot: usize) -> Option<&str> {
        self.component_names.get(slot).map(String::as_str)
    }
}

/// Startup configuration of a context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Context name.
    pub name: String,
    /// One name per component slot.
    pub component_names: Vec<String>,
    /// Slot count; defaults to the number of component names.
    pub total_components: Option<usize>,
    /// First creation index handed out.
    pub start_creation_index: u32,
    /// Entity records to reserve up front.
    pub entity_capacity: usize,
    /// Scratch lists to prewarm for batched group updates.
    pub scratch_lists: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Context".to_owned(),
            component_names: Vec::new(),
            total_components: None,
            start_creation_index: 0,
            entity_capacity: 0,
            scratch_lists: 4,
        }
    }
}

impl ContextConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidConfig`] for malformed TOML or
    /// unknown keys.
    pub fn from_toml_str(text: &str) -> ContextResult<Self> {
        toml::from_str(text).map_err(|e| ContextError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidConfig`] if the file cannot be read
    /// or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ContextResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContextError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Effective slot count.
    #[must_use]
    pub fn total_components(&self) -> usize {
        self.total_components.unwrap_or(self.component_names.len())
    }

    /// Metadata described by this configuration.
    #[must_use]
    pub fn info(&self) -> ContextInfo {
        ContextInfo {
            name: self.name.clone(),
            component_names: self.component_names.clone(),
        }
    }
}
