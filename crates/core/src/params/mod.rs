//! Two-layer parameters: per-rig overrides on top of process-wide defaults.
//!
//! Nothing here caches a resolved value. The scheduler calls
//! [`EffectiveParams::resolve`] for every rig on every tick, so a change to a
//! global default reaches every rig without a local override on the very next
//! frame, including rigs created before the change.

use serde::{Deserialize, Serialize};

use crate::{scene::Color, Result, StageError};

/// Process-wide defaults, mutated only through the stage's global setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalDefaults {
    pub speed: f32,
    pub paused: bool,
    pub skeleton_visible: bool,
    pub global_scale: f32,
    pub rotation_speed: f32,
    pub reverse: bool,
    pub color: Option<Color>,
    /// Ghost lifetime in scheduler ticks; zero disables trails.
    pub trail_length: f32,
    /// Seconds a rig waits after registration before its clock moves.
    pub start_delay: f32,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            speed: 1.0,
            paused: false,
            skeleton_visible: true,
            global_scale: 1.0,
            rotation_speed: 0.0,
            reverse: false,
            color: None,
            trail_length: 0.0,
            start_delay: 0.0,
        }
    }
}

impl GlobalDefaults {
    /// Copies every field from `baseline` in place.
    pub fn reset_to(&mut self, baseline: &GlobalDefaults) {
        self.speed = baseline.speed;
        self.paused = baseline.paused;
        self.skeleton_visible = baseline.skeleton_visible;
        self.global_scale = baseline.global_scale;
        self.rotation_speed = baseline.rotation_speed;
        self.reverse = baseline.reverse;
        self.color = baseline.color;
        self.trail_length = baseline.trail_length;
        self.start_delay = baseline.start_delay;
    }

    /// Generic setter used by scripted `global` commands.
    pub fn set(&mut self, param: Param, value: ParamValue) -> Result<()> {
        match (param, value) {
            (Param::Scale, ParamValue::Float(v)) => self.global_scale = v,
            (Param::SkeletonVisible, ParamValue::Bool(v)) => self.skeleton_visible = v,
            (Param::Speed, ParamValue::Float(v)) => self.speed = v,
            (Param::Reverse, ParamValue::Bool(v)) => self.reverse = v,
            (Param::Color, ParamValue::Color(v)) => self.color = v,
            (Param::TrailLength, ParamValue::Float(v)) => self.trail_length = v,
            (Param::StartDelay, ParamValue::Float(v)) => self.start_delay = v,
            (param, value) => {
                return Err(StageError::msg(format!(
                    "value {value:?} does not fit parameter `{}`",
                    param.name()
                )))
            }
        }
        Ok(())
    }
}

/// Local overrides of one rig. `None` defers to [`GlobalDefaults`] at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigOverrides {
    pub scale: Option<f32>,
    pub skeleton_visible: Option<bool>,
    pub speed: Option<f32>,
    pub reverse: Option<bool>,
    pub color: Option<Color>,
    pub trail_length: Option<f32>,
    pub start_delay: Option<f32>,
}

/// Parameters a rig may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    Scale,
    SkeletonVisible,
    Speed,
    Reverse,
    Color,
    TrailLength,
    StartDelay,
}

impl Param {
    pub const ALL: [Param; 7] = [
        Param::Scale,
        Param::SkeletonVisible,
        Param::Speed,
        Param::Reverse,
        Param::Color,
        Param::TrailLength,
        Param::StartDelay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Param::Scale => "scale",
            Param::SkeletonVisible => "skeleton_visible",
            Param::Speed => "speed",
            Param::Reverse => "reverse",
            Param::Color => "color",
            Param::TrailLength => "trail_length",
            Param::StartDelay => "start_delay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Float(f32),
    Color(Option<Color>),
}

impl ParamValue {
    pub fn as_f32(self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_color(self) -> Option<Option<Color>> {
        match self {
            ParamValue::Color(v) => Some(v),
            _ => None,
        }
    }
}

/// Resolves a single parameter for one rig.
///
/// The local speed override is a multiplier on the global speed, so an unset
/// local speed resolves to `1.0` rather than to the global value.
pub fn resolve(param: Param, overrides: &RigOverrides, defaults: &GlobalDefaults) -> ParamValue {
    match param {
        Param::Scale => ParamValue::Float(overrides.scale.unwrap_or(defaults.global_scale)),
        Param::SkeletonVisible => {
            ParamValue::Bool(overrides.skeleton_visible.unwrap_or(defaults.skeleton_visible))
        }
        Param::Speed => ParamValue::Float(overrides.speed.unwrap_or(1.0)),
        Param::Reverse => ParamValue::Bool(overrides.reverse.unwrap_or(defaults.reverse)),
        Param::Color => ParamValue::Color(overrides.color.or(defaults.color)),
        Param::TrailLength => {
            ParamValue::Float(overrides.trail_length.unwrap_or(defaults.trail_length))
        }
        Param::StartDelay => {
            ParamValue::Float(overrides.start_delay.unwrap_or(defaults.start_delay))
        }
    }
}

/// All parameters of one rig for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveParams {
    pub scale: f32,
    pub skeleton_visible: bool,
    pub local_speed: f32,
    pub reverse: bool,
    pub color: Option<Color>,
    pub trail_length: f32,
    pub start_delay: f32,
    /// Global speed times local speed, negated while reversed.
    pub time_scale: f32,
}

impl EffectiveParams {
    /// Runs [`resolve`] for every parameter and derives the time scale.
    pub fn resolve(overrides: &RigOverrides, defaults: &GlobalDefaults) -> Self {
        let value = |param| resolve(param, overrides, defaults);
        // `resolve` always answers a parameter with the same value kind.
        let float = |param| value(param).as_f32().unwrap_or_default();
        let flag = |param| value(param).as_bool().unwrap_or_default();

        let local_speed = float(Param::Speed);
        let reverse = flag(Param::Reverse);
        let direction = if reverse { -1.0 } else { 1.0 };
        Self {
            scale: float(Param::Scale),
            skeleton_visible: flag(Param::SkeletonVisible),
            local_speed,
            reverse,
            color: value(Param::Color).as_color().flatten(),
            trail_length: float(Param::TrailLength),
            start_delay: float(Param::StartDelay),
            time_scale: defaults.speed * local_speed * direction,
        }
    }
}
