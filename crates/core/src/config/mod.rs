use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    scene::{Camera, Color},
    GlobalDefaults, Result,
};

/// Top-level configuration structure for a stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub engine: EngineConfig,
    /// Values the global defaults start from, and return to on `clear`.
    pub defaults: GlobalDefaults,
    pub scene: SceneConfig,
}

impl StageConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Engine tunables shared by every rig.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trail ghosts are emitted on every `trail_interval`-th scheduler tick.
    pub trail_interval: u64,
    /// Opacity a fresh ghost starts at.
    pub trail_life: f32,
    /// Reverse playback rewinds to the clip end once the clock is this close
    /// to zero.
    pub reverse_epsilon: f32,
    pub asset_root: String,
    pub asset_extension: String,
    /// Multiplier from landmark units (metres) into scene units.
    pub landmark_unit_scale: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trail_interval: 6,
            trail_life: 0.6,
            reverse_epsilon: 1e-4,
            asset_root: "./assets/".to_string(),
            asset_extension: "bvh".to_string(),
            landmark_unit_scale: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: Color,
    pub camera: Camera,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: Color::BACKGROUND,
            camera: Camera {
                position: Vec3::new(0.0, 200.0, 450.0),
                target: Vec3::new(0.0, 120.0, 0.0),
            },
        }
    }
}
