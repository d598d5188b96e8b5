//! Gameplay tuning loaded from JSON.
//!
//! Every field has a default, so a config file only needs to name the values
//! it overrides:
//!
//! ```
//! use delve_engine::config::GameConfig;
//!
//! let config = GameConfig::from_json_str(r#"{ "melee_reach": 6.0 }"#).unwrap();
//! assert_eq!(config.melee_reach, 6.0);
//! assert_eq!(config.tile_size, 16.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors produced while loading a [`GameConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field parsed but holds an unusable value.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Gameplay constants shared by the partition, the solver and the responders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Edge length of one map tile, in pixels.
    pub tile_size: f64,
    /// Tiles per spatial-grid cell along each axis.
    pub bucket_span: u32,
    /// Melee adjacency slack around the player's hitbox, in pixels.
    pub melee_reach: f64,
    /// Seconds between player melee attacks.
    pub attack_cooldown: f64,
    /// Lock duration after touching a stair.
    pub stair_lock: f64,
    /// Seconds before a fired one-shot trigger re-arms.
    pub trigger_rearm: f64,
    /// Lock duration after entering a portal.
    pub portal_lock: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_size: 16.0,
            bucket_span: 4,
            melee_reach: 4.0,
            attack_cooldown: 0.5,
            stair_lock: 1.0,
            trigger_rearm: 2.0,
            portal_lock: 1.0,
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Cell edge length of the spatial grid, in pixels.
    pub fn cell_size(&self) -> f64 {
        self.tile_size * f64::from(self.bucket_span)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tile_size > 0.0 && self.tile_size.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "tile_size",
                reason: format!("must be positive and finite, got {}", self.tile_size),
            });
        }
        if self.bucket_span == 0 {
            return Err(ConfigError::Invalid {
                field: "bucket_span",
                reason: "must be at least 1".to_owned(),
            });
        }
        let durations = [
            ("melee_reach", self.melee_reach),
            ("attack_cooldown", self.attack_cooldown),
            ("stair_lock", self.stair_lock),
            ("trigger_rearm", self.trigger_rearm),
            ("portal_lock", self.portal_lock),
        ];
        for (field, value) in durations {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be finite and non-negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
