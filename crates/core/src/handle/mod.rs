//! User-facing rig handles.
//!
//! A handle is plain configuration: building and tweaking one never touches
//! the stage. Only `Stage::play` turns a handle into a registered rig, so a
//! duplicate can be adjusted freely before it is activated.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{params::RigOverrides, scene::Color, Result, StageError};

/// What drives a rig's pose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RigKind {
    /// Plays a motion clip resolved by the clip loader.
    Clip { source: String },
    /// Mirrors the live landmark feed.
    Live,
}

/// Static intent of one rig: placement plus parameter overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    pub overrides: RigOverrides,
}

#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct RigHandle {
    kind: RigKind,
    config: RigConfig,
}

impl RigHandle {
    pub fn clip(source: impl Into<String>) -> Self {
        Self::with_config(
            RigKind::Clip {
                source: source.into(),
            },
            RigConfig::default(),
        )
    }

    pub fn live() -> Self {
        Self::with_config(RigKind::Live, RigConfig::default())
    }

    pub fn with_config(kind: RigKind, config: RigConfig) -> Self {
        Self { kind, config }
    }

    pub fn kind(&self) -> &RigKind {
        &self.kind
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn overrides(&self) -> &RigOverrides {
        &self.config.overrides
    }

    pub fn source_id(&self) -> Option<&str> {
        match &self.kind {
            RigKind::Clip { source } => Some(source),
            RigKind::Live => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.kind, RigKind::Live)
    }

    pub fn x(mut self, x: f32) -> Self {
        self.config.position.x = x;
        self
    }

    pub fn y(mut self, y: f32) -> Self {
        self.config.position.y = y;
        self
    }

    pub fn z(mut self, z: f32) -> Self {
        self.config.position.z = z;
        self
    }

    pub fn pos(mut self, x: f32, y: f32, z: f32) -> Self {
        self.config.position = Vec3::new(x, y, z);
        self
    }

    pub fn rot_x(mut self, radians: f32) -> Self {
        self.config.rotation.x = radians;
        self
    }

    pub fn rot_y(mut self, radians: f32) -> Self {
        self.config.rotation.y = radians;
        self
    }

    pub fn rot_z(mut self, radians: f32) -> Self {
        self.config.rotation.z = radians;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.overrides.scale = Some(scale);
        self
    }

    pub fn skeleton(mut self, visible: bool) -> Self {
        self.config.overrides.skeleton_visible = Some(visible);
        self
    }

    pub fn speed(mut self, speed: f32) -> Self {
        self.config.overrides.speed = Some(speed);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.config.overrides.reverse = Some(reverse);
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.config.overrides.color = Some(color);
        self
    }

    /// Ghost lifetime in scheduler ticks.
    pub fn trail(mut self, length: f32) -> Self {
        self.config.overrides.trail_length = Some(length);
        self
    }

    /// Seconds to wait after activation before moving.
    pub fn delay(mut self, seconds: f32) -> Self {
        self.config.overrides.start_delay = Some(seconds);
        self
    }
}

/// Builds a fresh, unregistered handle of the same kind and source carrying a
/// copy of every override. The caller still has to play it.
pub fn duplicate(source: &RigHandle) -> Result<RigHandle> {
    let kind = match &source.kind {
        RigKind::Clip { source: id } if id.trim().is_empty() => {
            return Err(StageError::InvalidDuplicate(
                "clip handle has no source identifier".to_string(),
            ))
        }
        RigKind::Clip { source: id } => RigKind::Clip { source: id.clone() },
        RigKind::Live => RigKind::Live,
    };

    Ok(RigHandle {
        kind,
        config: RigConfig {
            position: source.config.position,
            rotation: source.config.rotation,
            overrides: source.config.overrides.clone(),
        },
    })
}
