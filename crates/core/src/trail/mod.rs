//! Fading ghost copies of rig poses.
//!
//! Ghosts live in a [`TrailPool`] that is aged once per frame, independently
//! of the rigs that produced them: turning a rig's trail off, or pausing,
//! never cuts short the ghosts it already emitted.

use crate::{
    params::EffectiveParams,
    registry::RigRecord,
    scene::{Color, Segment},
};

/// Remaining life at or below this is treated as zero.
pub const LIFE_EPSILON: f64 = 1e-9;

/// Immutable world-space snapshot of a rig's drawn skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailGhost {
    segments: Vec<Segment>,
    color: Color,
    remaining_life: f64,
    decay_per_frame: f64,
}

impl TrailGhost {
    /// `trail_length` is the ghost's lifetime in frames: it loses
    /// `life / trail_length` every frame.
    pub fn new(segments: Vec<Segment>, color: Color, life: f32, trail_length: f32) -> Self {
        Self {
            segments,
            color,
            remaining_life: f64::from(life),
            decay_per_frame: f64::from(life) / f64::from(trail_length.max(f32::EPSILON)),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn remaining_life(&self) -> f32 {
        self.remaining_life as f32
    }

    pub fn decay_per_frame(&self) -> f32 {
        self.decay_per_frame as f32
    }

    /// Display opacity; fades linearly with remaining life.
    pub fn opacity(&self) -> f32 {
        self.remaining_life.max(0.0) as f32
    }

    fn is_spent(&self) -> bool {
        self.remaining_life <= LIFE_EPSILON
    }
}

#[derive(Debug, Default)]
pub struct TrailPool {
    ghosts: Vec<TrailGhost>,
}

impl TrailPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ghost: TrailGhost) {
        self.ghosts.push(ghost);
    }

    /// Decays every ghost by one frame and drops the spent ones. Returns how
    /// many were removed.
    pub fn age(&mut self) -> usize {
        let mut removed = 0;
        for index in (0..self.ghosts.len()).rev() {
            let ghost = &mut self.ghosts[index];
            ghost.remaining_life -= ghost.decay_per_frame;
            if ghost.is_spent() {
                self.ghosts.remove(index);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.ghosts.clear();
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrailGhost> {
        self.ghosts.iter()
    }
}

/// Decides when rigs leave ghosts behind and takes the snapshots.
///
/// Cadence is counted in scheduler ticks, so ghost spacing follows the frame
/// rate rather than wall-clock time.
#[derive(Debug, Clone)]
pub struct TrailEmitter {
    interval: u64,
    life: f32,
}

impl TrailEmitter {
    pub fn new(interval: u64, life: f32) -> Self {
        Self {
            interval: interval.max(1),
            life,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn is_emission_tick(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    /// Snapshot of `record` if its effective trail length asks for one.
    /// Rigs with nothing drawn yet produce no ghost.
    pub fn snapshot(&self, record: &RigRecord, effective: &EffectiveParams) -> Option<TrailGhost> {
        if effective.trail_length <= 0.0 || record.view().segments.is_empty() {
            return None;
        }
        Some(TrailGhost::new(
            record.view().world_segments(),
            record.view().color,
            self.life,
            effective.trail_length,
        ))
    }
}
