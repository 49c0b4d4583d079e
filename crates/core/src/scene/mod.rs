use std::{fmt, str::FromStr};

use glam::{Affine3A, EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::{config::SceneConfig, StageError};

/// Packed `0xRRGGBB` colour as used by script calls and the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(u32);

impl Color {
    pub const WHITE: Color = Color(0xffffff);
    /// Line colour of live-feed rigs without a colour override.
    pub const LIVE: Color = Color(0x00ffcc);
    pub const BACKGROUND: Color = Color(0x111111);

    pub const fn from_hex(hex: u32) -> Self {
        Self(hex & 0x00ff_ffff)
    }

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub fn hex(self) -> u32 {
        self.0
    }

    /// Channels normalised to `[0, 1]`.
    pub fn to_rgb_f32(self) -> [f32; 3] {
        let r = (self.0 >> 16) & 0xff;
        let g = (self.0 >> 8) & 0xff;
        let b = self.0 & 0xff;
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }

    fn named(name: &str) -> Option<Self> {
        let hex = match name {
            "black" => 0x000000,
            "white" => 0xffffff,
            "red" => 0xff0000,
            "green" => 0x008000,
            "lime" => 0x00ff00,
            "blue" => 0x0000ff,
            "yellow" => 0xffff00,
            "cyan" | "aqua" => 0x00ffff,
            "magenta" | "fuchsia" => 0xff00ff,
            "orange" => 0xffa500,
            "purple" => 0x800080,
            "pink" => 0xffc0cb,
            "gray" | "grey" => 0x808080,
            _ => return None,
        };
        Some(Self(hex))
    }
}

impl FromStr for Color {
    type Err = StageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some(color) = Self::named(&lower) {
            return Ok(color);
        }

        let digits = lower
            .strip_prefix('#')
            .or_else(|| lower.strip_prefix("0x"))
            .unwrap_or(&lower);
        if digits.len() != 6 {
            return Err(StageError::msg(format!("unrecognised colour `{trimmed}`")));
        }

        u32::from_str_radix(digits, 16)
            .map(Self::from_hex)
            .map_err(|_| StageError::msg(format!("unrecognised colour `{trimmed}`")))
    }
}

impl TryFrom<String> for Color {
    type Error = StageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Placement of a rig's root node: a positioned, uniformly scaled group with a
/// rotation pivot underneath it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootTransform {
    pub position: Vec3,
    /// Euler angles in radians, applied in XYZ order.
    pub rotation: Vec3,
    pub scale: f32,
}

impl Default for RootTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

impl RootTransform {
    pub fn affine(&self) -> Affine3A {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Affine3A::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, self.position)
    }
}

/// One drawn line of a skeleton.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
}

impl Segment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    pub fn transformed(&self, transform: &Affine3A) -> Self {
        Self {
            start: transform.transform_point3(self.start),
            end: transform.transform_point3(self.end),
        }
    }
}

/// What the renderer currently shows for one rig.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonView {
    /// Segments in the rig's local space.
    pub segments: Vec<Segment>,
    pub world: Affine3A,
    pub color: Color,
    pub visible: bool,
}

impl SkeletonView {
    pub fn empty(color: Color) -> Self {
        Self {
            segments: Vec::new(),
            world: Affine3A::IDENTITY,
            color,
            visible: true,
        }
    }

    /// World-space copy of the displayed segments.
    pub fn world_segments(&self) -> Vec<Segment> {
        self.segments
            .iter()
            .map(|segment| segment.transformed(&self.world))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub size: f32,
    pub divisions: u32,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            size: 400.0,
            divisions: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutoRotate {
    pub enabled: bool,
    pub speed: f32,
}

/// Process-wide scene chrome that script calls may change and `clear` resets.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub background: Color,
    pub grids: Vec<Grid>,
    pub camera: Camera,
    pub auto_rotate: AutoRotate,
    defaults: SceneConfig,
}

impl SceneState {
    pub fn new(defaults: SceneConfig) -> Self {
        Self {
            background: defaults.background,
            grids: Vec::new(),
            camera: defaults.camera,
            auto_rotate: AutoRotate::default(),
            defaults,
        }
    }

    /// Drops grids, stops camera auto-rotation and restores the default
    /// background. The camera placement is kept.
    pub fn reset_transient(&mut self) {
        self.grids.clear();
        self.auto_rotate = AutoRotate::default();
        self.background = self.defaults.background;
    }
}
