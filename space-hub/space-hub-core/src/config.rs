use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a [`SpaceSession`](crate::session::SpaceSession).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Quiet window before a preference change is persisted (default 500ms)
    #[serde(default = "default_debounce_ms")]
    pub preference_debounce_ms: u64,

    /// Horizontal pixels per depth level when projecting a drop (default 16)
    #[serde(default = "default_indent_width")]
    pub indent_width: f32,

    /// Row height used when laying out a tree without live geometry (default 28)
    #[serde(default = "default_row_height")]
    pub row_height: f32,
}

fn default_debounce_ms() -> u64 { 500 }
fn default_indent_width() -> f32 { 16.0 }
fn default_row_height() -> f32 { 28.0 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preference_debounce_ms: default_debounce_ms(),
            indent_width: default_indent_width(),
            row_height: default_row_height(),
        }
    }
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.preference_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: SessionConfig = serde_json::from_str(r#"{"indent_width": 24.0}"#).unwrap();
        assert_eq!(cfg.indent_width, 24.0);
        assert_eq!(cfg.preference_debounce_ms, 500);
        assert_eq!(cfg.row_height, 28.0);
        assert_eq!(cfg.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn empty_object_equals_default() {
        let cfg: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, SessionConfig::default());
    }
}
