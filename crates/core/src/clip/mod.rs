//! Skeletal motion clips and the clock that plays them.
//!
//! A [`Skeleton`] and a [`MotionClip`] are loaded once and shared between every
//! rig that plays the same source; each rig owns only its [`AnimationPlayer`].

pub mod bvh;

use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};

use crate::{scene::Segment, Result, StageError};

pub use bvh::parse_bvh;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    XPosition,
    YPosition,
    ZPosition,
    XRotation,
    YRotation,
    ZRotation,
}

impl Channel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "xposition" => Some(Self::XPosition),
            "yposition" => Some(Self::YPosition),
            "zposition" => Some(Self::ZPosition),
            "xrotation" => Some(Self::XRotation),
            "yrotation" => Some(Self::YRotation),
            "zrotation" => Some(Self::ZRotation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Index of the parent joint; always lower than this joint's own index.
    pub parent: Option<usize>,
    pub offset: Vec3,
    pub channels: Vec<Channel>,
    /// Position of this joint's first channel inside a frame row.
    pub channel_offset: usize,
}

/// Local transform of one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPose {
    pub translation: Vec3,
    pub rotation: Quat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub joints: Vec<JointPose>,
}

impl Pose {
    fn blend(&self, other: &Pose, t: f32) -> Pose {
        let joints = self
            .joints
            .iter()
            .zip(&other.joints)
            .map(|(a, b)| JointPose {
                translation: a.translation.lerp(b.translation, t),
                rotation: a.rotation.slerp(b.rotation, t),
            })
            .collect();
        Pose { joints }
    }
}

/// Joint hierarchy in depth-first order.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    joints: Vec<Joint>,
    channel_count: usize,
}

impl Skeleton {
    pub fn new(joints: Vec<Joint>) -> Result<Self> {
        if joints.is_empty() {
            return Err(StageError::InvalidInput("skeleton requires at least one joint"));
        }

        let mut channel_count = 0;
        for (index, joint) in joints.iter().enumerate() {
            if joint.parent.is_some_and(|parent| parent >= index) {
                return Err(StageError::msg(format!(
                    "joint `{}` is listed before its parent",
                    joint.name
                )));
            }
            if joint.channel_offset != channel_count {
                return Err(StageError::msg(format!(
                    "joint `{}` has a misaligned channel offset",
                    joint.name
                )));
            }
            channel_count += joint.channels.len();
        }

        Ok(Self {
            joints,
            channel_count,
        })
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn root(&self) -> &Joint {
        &self.joints[0]
    }

    /// Number of values in one frame row.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Builds the local joint transforms for one row of channel values.
    pub fn pose_from_frame(&self, frame: &[f32]) -> Pose {
        let joints = self
            .joints
            .iter()
            .map(|joint| {
                let mut translation = joint.offset;
                let mut rotation = Quat::IDENTITY;
                for (slot, channel) in joint.channels.iter().enumerate() {
                    let value = frame
                        .get(joint.channel_offset + slot)
                        .copied()
                        .unwrap_or_default();
                    match channel {
                        Channel::XPosition => translation.x += value,
                        Channel::YPosition => translation.y += value,
                        Channel::ZPosition => translation.z += value,
                        Channel::XRotation => {
                            rotation *= Quat::from_rotation_x(value.to_radians())
                        }
                        Channel::YRotation => {
                            rotation *= Quat::from_rotation_y(value.to_radians())
                        }
                        Channel::ZRotation => {
                            rotation *= Quat::from_rotation_z(value.to_radians())
                        }
                    }
                }
                JointPose {
                    translation,
                    rotation,
                }
            })
            .collect();
        Pose { joints }
    }

    /// Joint positions relative to the skeleton's root node.
    pub fn joint_positions(&self, pose: &Pose) -> Vec<Vec3> {
        let mut world: Vec<Affine3A> = Vec::with_capacity(self.joints.len());
        for (joint, local) in self.joints.iter().zip(&pose.joints) {
            let local = Affine3A::from_rotation_translation(local.rotation, local.translation);
            let transform = match joint.parent {
                Some(parent) => world[parent] * local,
                None => local,
            };
            world.push(transform);
        }
        world.iter().map(|transform| transform.translation.into()).collect()
    }

    /// One segment per parent to child link, like a skeleton helper draws it.
    pub fn segments(&self, pose: &Pose) -> Vec<Segment> {
        let positions = self.joint_positions(pose);
        self.joints
            .iter()
            .enumerate()
            .filter_map(|(index, joint)| {
                joint
                    .parent
                    .map(|parent| Segment::new(positions[parent], positions[index]))
            })
            .collect()
    }
}

/// Sampled channel data for a skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionClip {
    pub name: String,
    frame_time: f32,
    frames: Vec<Vec<f32>>,
}

impl MotionClip {
    pub fn new(name: impl Into<String>, frame_time: f32, frames: Vec<Vec<f32>>) -> Result<Self> {
        if frames.is_empty() {
            return Err(StageError::InvalidInput("motion clip requires at least one frame"));
        }
        if !frame_time.is_finite() || frame_time <= 0.0 {
            return Err(StageError::InvalidInput("frame time must be positive"));
        }
        Ok(Self {
            name: name.into(),
            frame_time,
            frames,
        })
    }

    pub fn frame_time(&self) -> f32 {
        self.frame_time
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Time of the last keyframe, never shorter than one frame.
    pub fn duration(&self) -> f32 {
        let span = (self.frames.len().saturating_sub(1)) as f32 * self.frame_time;
        span.max(self.frame_time)
    }

    /// Interpolated pose at `time`, clamped to the clip's range.
    pub fn sample(&self, skeleton: &Skeleton, time: f32) -> Pose {
        let last = self.frames.len() - 1;
        let position = (time / self.frame_time).max(0.0);
        let lower = (position.floor() as usize).min(last);
        let upper = (lower + 1).min(last);
        let t = (position - lower as f32).clamp(0.0, 1.0);

        let a = skeleton.pose_from_frame(&self.frames[lower]);
        if upper == lower || t <= f32::EPSILON {
            return a;
        }
        let b = skeleton.pose_from_frame(&self.frames[upper]);
        a.blend(&b, t)
    }
}

/// A skeleton and clip produced by a loader.
#[derive(Debug, Clone)]
pub struct LoadedClip {
    pub skeleton: Arc<Skeleton>,
    pub clip: Arc<MotionClip>,
}

/// The clock of one clip-backed rig. Loops with repeat semantics in either
/// direction.
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    clip: Arc<MotionClip>,
    time: f32,
    time_scale: f32,
    running: bool,
}

impl AnimationPlayer {
    pub fn new(clip: Arc<MotionClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            running: true,
        }
    }

    pub fn clip(&self) -> &MotionClip {
        &self.clip
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    pub fn duration(&self) -> f32 {
        self.clip.duration()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advances the clock by `dt` seconds scaled by the current time scale.
    pub fn update(&mut self, dt: f32) {
        if !self.running {
            return;
        }
        let duration = self.duration();
        self.time += dt * self.time_scale;
        // The clip end is a valid resting point for a clock running backwards.
        let past_end = self.time > duration || (self.time == duration && self.time_scale > 0.0);
        if past_end || self.time < 0.0 {
            self.time = self.time.rem_euclid(duration);
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.time = 0.0;
    }

    pub fn pose(&self, skeleton: &Skeleton) -> Pose {
        self.clip.sample(skeleton, self.time)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Two-bone arm that swings about Z over a one second clip.
    pub const ARM_BVH: &str = "\
HIERARCHY
ROOT Hips
{
  OFFSET 0.0 0.0 0.0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Arm
  {
    OFFSET 0.0 10.0 0.0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0.0 5.0 0.0
    }
  }
}
MOTION
Frames: 3
Frame Time: 0.5
0 0 0 0 0 0 0 0 0
0 0 0 0 0 0 90 0 0
0 0 0 0 0 0 180 0 0
";

    pub fn arm_clip() -> LoadedClip {
        parse_bvh("arm", ARM_BVH).expect("fixture parses")
    }
}
