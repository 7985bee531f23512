//! Export configuration
//!
//! Every field has a default, so a configuration file only needs the values it changes:
//!
//! ```json
//! {
//!   "expansion": { "unit_timeout_ms": 3000 },
//!   "output": { "directory": "exports", "filename_prefix": "gemini-chat" },
//!   "layout": { "container": ["main .thread"] }
//! }
//! ```

use crate::chat::PageLayout;
use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where things live on the chat page
    pub layout: PageLayout,

    pub expansion: ExpansionConfig,

    pub output: OutputConfig,
}

impl ExportConfig {
    /// Load a JSON configuration file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ExportError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ExportError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.layout.container.is_empty() {
            return Err(ExportError::InvalidConfig("layout.container needs at least one selector".to_string()));
        }
        if self.layout.units.is_empty() {
            return Err(ExportError::InvalidConfig("layout.units needs at least one selector".to_string()));
        }
        self.expansion.validate()?;
        self.output.validate()
    }
}

/// Timing of the expansion stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Longest wait for a single unit to leave the collapsed state
    pub unit_timeout_ms: u64,

    /// Delay before re-reading a unit whose expansion produced no mutation
    pub recheck_delay_ms: u64,
}

impl ExpansionConfig {
    pub fn unit_timeout(&self) -> Duration {
        Duration::from_millis(self.unit_timeout_ms)
    }

    pub fn recheck_delay(&self) -> Duration {
        Duration::from_millis(self.recheck_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.unit_timeout_ms == 0 {
            return Err(ExportError::InvalidConfig("expansion.unit_timeout_ms must be positive".to_string()));
        }
        if self.recheck_delay_ms >= self.unit_timeout_ms {
            return Err(ExportError::InvalidConfig(format!(
                "expansion.recheck_delay_ms ({}) must be shorter than unit_timeout_ms ({})",
                self.recheck_delay_ms, self.unit_timeout_ms
            )));
        }
        Ok(())
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            unit_timeout_ms: 2000,
            recheck_delay_ms: 50,
        }
    }
}

/// Where and how exported documents are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory exported documents are saved to
    pub directory: PathBuf,

    /// Prefix of the fallback filename used when the conversation has no usable title
    pub filename_prefix: String,

    /// Longest filename, extension excluded
    pub max_filename_length: usize,

    /// Heading used for user messages in rendered documents
    pub user_label: String,

    /// Heading used for agent messages in rendered documents
    pub agent_label: String,
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.filename_prefix.trim().is_empty() {
            return Err(ExportError::InvalidConfig("output.filename_prefix must not be empty".to_string()));
        }
        if self.filename_prefix.contains(['/', '\\']) {
            return Err(ExportError::InvalidConfig("output.filename_prefix must not contain path separators".to_string()));
        }
        if self.max_filename_length < 16 {
            return Err(ExportError::InvalidConfig(format!(
                "output.max_filename_length must be at least 16, got {}",
                self.max_filename_length
            )));
        }
        Ok(())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            filename_prefix: "chat-export".to_string(),
            max_filename_length: 100,
            user_label: "You".to_string(),
            agent_label: "Assistant".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.expansion.unit_timeout(), Duration::from_millis(2000));
        assert_eq!(config.expansion.recheck_delay(), Duration::from_millis(50));
        assert_eq!(config.output.max_filename_length, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let dir = std::env::temp_dir().join(format!("chat-export-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"expansion": {"unit_timeout_ms": 5000}, "output": {"filename_prefix": "gemini"}}"#)
            .unwrap();

        let config = ExportConfig::from_file(&path).unwrap();
        assert_eq!(config.expansion.unit_timeout_ms, 5000);
        assert_eq!(config.expansion.recheck_delay_ms, 50);
        assert_eq!(config.output.filename_prefix, "gemini");
        assert_eq!(config.layout, PageLayout::default());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = ExportConfig::from_file("/nonexistent/chat-export.json").unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfig(_)));
    }

    #[test]
    fn test_bad_selector_in_file_is_config_error() {
        let err = serde_json::from_str::<ExportConfig>(r#"{"layout": {"units": ["a >"]}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_validation_rejects_unusable_values() {
        let mut config = ExportConfig::default();
        config.expansion.recheck_delay_ms = 5000;
        assert!(config.validate().is_err());

        let mut config = ExportConfig::default();
        config.output.filename_prefix = "a/b".to_string();
        assert!(config.validate().is_err());

        let mut config = ExportConfig::default();
        config.layout.units.clear();
        assert!(config.validate().is_err());
    }
}
