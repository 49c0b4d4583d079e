use std::sync::Arc;

use crate::{
    clip::{AnimationPlayer, LoadedClip, Skeleton},
    handle::RigConfig,
    live::LandmarkSet,
    params::{EffectiveParams, GlobalDefaults, RigOverrides},
    scene::{Color, RootTransform, SkeletonView},
    trail::TrailPool,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RigId(u64);

impl RigId {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDirection {
    Forward,
    Reverse,
}

/// Pose source of a registered rig.
#[derive(Debug, Clone)]
pub enum RigBody {
    Clip {
        source_id: String,
        skeleton: Arc<Skeleton>,
        player: AnimationPlayer,
    },
    Live,
}

/// Runtime state of one playing rig. Owned exclusively by the registry.
#[derive(Debug, Clone)]
pub struct RigRecord {
    id: Option<RigId>,
    config: RigConfig,
    pub(crate) body: RigBody,
    view: SkeletonView,
    /// Seconds since registration, paused time excluded.
    pub(crate) time_alive: f64,
    pub(crate) direction: ClockDirection,
}

impl RigRecord {
    /// Record for a freshly loaded clip. A rig that starts out reversed starts
    /// at the end of its clip.
    pub fn clip(
        source_id: impl Into<String>,
        config: RigConfig,
        loaded: LoadedClip,
        defaults: &GlobalDefaults,
    ) -> Self {
        let effective = EffectiveParams::resolve(&config.overrides, defaults);
        let mut player = AnimationPlayer::new(loaded.clip);
        let direction = if effective.reverse {
            player.set_time(player.duration());
            ClockDirection::Reverse
        } else {
            ClockDirection::Forward
        };

        let mut record = Self {
            id: None,
            config,
            body: RigBody::Clip {
                source_id: source_id.into(),
                skeleton: loaded.skeleton,
                player,
            },
            view: SkeletonView::empty(Color::WHITE),
            time_alive: 0.0,
            direction,
        };
        record.apply_presentation(&effective);
        record.refresh_pose();
        record
    }

    /// Record for a live-feed rig; blank until landmarks arrive.
    pub fn live(config: RigConfig, defaults: &GlobalDefaults) -> Self {
        let effective = EffectiveParams::resolve(&config.overrides, defaults);
        let mut record = Self {
            id: None,
            config,
            body: RigBody::Live,
            view: SkeletonView::empty(Color::LIVE),
            time_alive: 0.0,
            direction: ClockDirection::Forward,
        };
        record.apply_presentation(&effective);
        record
    }

    /// Assigned on registration.
    pub fn id(&self) -> Option<RigId> {
        self.id
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn overrides(&self) -> &RigOverrides {
        &self.config.overrides
    }

    pub fn body(&self) -> &RigBody {
        &self.body
    }

    pub fn view(&self) -> &SkeletonView {
        &self.view
    }

    pub fn time_alive(&self) -> f64 {
        self.time_alive
    }

    pub fn direction(&self) -> ClockDirection {
        self.direction
    }

    pub fn is_live(&self) -> bool {
        matches!(self.body, RigBody::Live)
    }

    pub fn source_id(&self) -> Option<&str> {
        match &self.body {
            RigBody::Clip { source_id, .. } => Some(source_id),
            RigBody::Live => None,
        }
    }

    /// Current animation clock, for clip-backed rigs.
    pub fn clock(&self) -> Option<f32> {
        match &self.body {
            RigBody::Clip { player, .. } => Some(player.time()),
            RigBody::Live => None,
        }
    }

    pub fn player(&self) -> Option<&AnimationPlayer> {
        match &self.body {
            RigBody::Clip { player, .. } => Some(player),
            RigBody::Live => None,
        }
    }

    /// Pushes placement, scale, visibility and colour onto the view. Live rigs
    /// carry their scale in the segment coordinates instead of the transform.
    pub(crate) fn apply_presentation(&mut self, effective: &EffectiveParams) {
        let live = self.is_live();
        let transform = RootTransform {
            position: self.config.position,
            rotation: self.config.rotation,
            scale: if live { 1.0 } else { effective.scale },
        };
        self.view.world = transform.affine();
        self.view.visible = effective.skeleton_visible;
        self.view.color = effective
            .color
            .unwrap_or(if live { Color::LIVE } else { Color::WHITE });
    }

    pub(crate) fn apply_landmarks(&mut self, landmarks: &LandmarkSet, scale: f32) {
        self.view.segments = landmarks.segments(scale);
    }

    /// Re-samples the clip at the current clock.
    pub(crate) fn refresh_pose(&mut self) {
        if let RigBody::Clip {
            skeleton, player, ..
        } = &self.body
        {
            let pose = player.pose(skeleton);
            self.view.segments = skeleton.segments(&pose);
        }
    }

    fn release(&mut self) {
        if let RigBody::Clip { player, .. } = &mut self.body {
            player.stop();
        }
        self.view.segments.clear();
        self.view.visible = false;
    }
}

/// All currently playing rigs, in registration order.
#[derive(Debug, Default)]
pub struct RigRegistry {
    records: Vec<RigRecord>,
    next_id: u64,
}

impl RigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mut record: RigRecord) -> RigId {
        let id = RigId(self.next_id);
        self.next_id += 1;
        record.id = Some(id);
        self.records.push(record);
        id
    }

    /// Stops and releases every rig and empties the trail pool with it.
    pub fn clear(&mut self, trails: &mut TrailPool) {
        for record in &mut self.records {
            record.release();
        }
        let released = self.records.len();
        self.records.clear();
        let ghosts = trails.len();
        trails.clear();
        tracing::debug!(released, ghosts, "registry cleared");
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RigId) -> Option<&RigRecord> {
        self.records.iter().find(|record| record.id == Some(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigRecord> {
        self.records.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RigRecord> {
        self.records.iter_mut()
    }
}
