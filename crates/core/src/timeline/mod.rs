//! Per-frame playback scheduling.
//!
//! Every tick the [`Scheduler`] walks the registry in order and, for each rig:
//!
//! 1. applies the effective scale, visibility and colour (even while paused),
//! 2. copies the latest landmark set into live rigs, when one exists,
//! 3. stops here while globally paused,
//! 4. accumulates alive time and holds the clock until the start delay passes,
//! 5. advances the animation clock forward or backward,
//! 6. leaves a trail ghost behind on emission ticks.
//!
//! Only after the sweep is the trail pool aged.

use std::time::Instant;

use crate::{
    config::EngineConfig,
    live::LandmarkSet,
    params::{EffectiveParams, GlobalDefaults},
    registry::{ClockDirection, RigBody, RigRecord, RigRegistry},
    trail::{TrailEmitter, TrailPool},
};

/// Source of frame deltas.
#[derive(Debug, Clone)]
pub enum FrameClock {
    /// Measures real time between calls.
    Realtime { last: Option<Instant> },
    /// Reports the same step every frame.
    Fixed { step: f32 },
}

impl FrameClock {
    pub fn realtime() -> Self {
        Self::Realtime { last: None }
    }

    pub fn fixed(step: f32) -> Self {
        Self::Fixed {
            step: step.max(0.0),
        }
    }

    /// Seconds since the previous call; zero on the first realtime call.
    pub fn delta(&mut self) -> f32 {
        match self {
            Self::Realtime { last } => {
                let now = Instant::now();
                let delta = last.map(|prev| (now - prev).as_secs_f32()).unwrap_or(0.0);
                *last = Some(now);
                delta
            }
            Self::Fixed { step } => *step,
        }
    }

    pub fn reset(&mut self) {
        if let Self::Realtime { last } = self {
            *last = None;
        }
    }
}

/// What one tick did, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Clip clocks that moved this tick.
    pub advanced: usize,
    pub emitted: usize,
    pub expired: usize,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    tick: u64,
    emitter: TrailEmitter,
    reverse_epsilon: f32,
    landmark_unit_scale: f32,
}

impl Scheduler {
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            tick: 0,
            emitter: TrailEmitter::new(engine.trail_interval, engine.trail_life),
            reverse_epsilon: engine.reverse_epsilon,
            landmark_unit_scale: engine.landmark_unit_scale,
        }
    }

    /// Ticks run so far, paused ones included.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn emitter(&self) -> &TrailEmitter {
        &self.emitter
    }

    pub fn tick(
        &mut self,
        dt: f32,
        registry: &mut RigRegistry,
        trails: &mut TrailPool,
        defaults: &GlobalDefaults,
        landmarks: Option<&LandmarkSet>,
    ) -> TickReport {
        self.tick += 1;
        let dt = dt.max(0.0);
        let emission_tick = self.emitter.is_emission_tick(self.tick);
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };

        for record in registry.iter_mut() {
            let effective = EffectiveParams::resolve(record.overrides(), defaults);
            record.apply_presentation(&effective);

            if record.is_live() {
                if let Some(set) = landmarks {
                    record.apply_landmarks(set, effective.scale * self.landmark_unit_scale);
                }
            }

            if defaults.paused {
                continue;
            }

            let Some(active_dt) = gate(record, dt, effective.start_delay) else {
                continue;
            };

            if self.advance_clock(record, &effective, active_dt) {
                report.advanced += 1;
            }

            if emission_tick {
                if let Some(ghost) = self.emitter.snapshot(record, &effective) {
                    trails.push(ghost);
                    report.emitted += 1;
                }
            }
        }

        report.expired = trails.age();
        tracing::trace!(
            tick = report.tick,
            advanced = report.advanced,
            emitted = report.emitted,
            expired = report.expired,
            ghosts = trails.len(),
            "scheduler tick"
        );
        report
    }

    /// Moves a clip clock by `active_dt` at the rig's time scale. Reversed
    /// clocks that have run down to zero restart from the clip end.
    fn advance_clock(
        &self,
        record: &mut RigRecord,
        effective: &EffectiveParams,
        active_dt: f32,
    ) -> bool {
        let RigBody::Clip { player, .. } = &mut record.body else {
            return false;
        };

        player.set_time_scale(effective.time_scale);
        if effective.reverse && player.time() <= self.reverse_epsilon {
            player.set_time(player.duration());
        }
        player.update(active_dt);

        record.direction = if effective.reverse {
            ClockDirection::Reverse
        } else {
            ClockDirection::Forward
        };
        record.refresh_pose();
        true
    }
}

/// Accumulates alive time and returns how much of `dt` the clock may use.
///
/// `None` while the rig is still waiting out its delay. On the tick the delay
/// runs out only the overshoot past the delay is returned.
fn gate(record: &mut RigRecord, dt: f32, delay: f32) -> Option<f32> {
    let delay = f64::from(delay);
    let previous = record.time_alive;
    record.time_alive += f64::from(dt);
    if record.time_alive < delay {
        return None;
    }
    if previous < delay {
        Some((record.time_alive - delay) as f32)
    } else {
        Some(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clip::fixtures::arm_clip,
        handle::RigConfig,
        live::fixtures::diagonal_set,
        params::RigOverrides,
        registry::RigId,
    };

    struct Rig {
        registry: RigRegistry,
        trails: TrailPool,
        scheduler: Scheduler,
        defaults: GlobalDefaults,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                registry: RigRegistry::new(),
                trails: TrailPool::new(),
                scheduler: Scheduler::new(&EngineConfig::default()),
                defaults: GlobalDefaults::default(),
            }
        }

        fn add_clip(&mut self, overrides: RigOverrides) -> RigId {
            let config = RigConfig {
                overrides,
                ..Default::default()
            };
            let record = RigRecord::clip("arm", config, arm_clip(), &self.defaults);
            self.registry.register(record)
        }

        fn step(&mut self, dt: f32) -> TickReport {
            self.scheduler
                .tick(dt, &mut self.registry, &mut self.trails, &self.defaults, None)
        }

        fn record(&self, id: RigId) -> &RigRecord {
            self.registry.get(id).unwrap()
        }

        fn set_clock(&mut self, id: RigId, time: f32) {
            let record = self
                .registry
                .iter_mut()
                .find(|record| record.id() == Some(id))
                .unwrap();
            if let RigBody::Clip { player, .. } = &mut record.body {
                player.set_time(time);
            }
        }
    }

    #[test]
    fn fixed_clock_repeats_its_step() {
        let mut clock = FrameClock::fixed(0.25);
        assert_eq!(clock.delta(), 0.25);
        assert_eq!(clock.delta(), 0.25);

        let mut realtime = FrameClock::realtime();
        assert_eq!(realtime.delta(), 0.0);
        assert!(realtime.delta() >= 0.0);
        realtime.reset();
        assert_eq!(realtime.delta(), 0.0);
    }

    #[test]
    fn delay_gate_uses_only_the_overshoot() {
        let mut rig = Rig::new();
        let id = rig.add_clip(RigOverrides {
            start_delay: Some(0.25),
            ..Default::default()
        });

        rig.step(0.1);
        rig.step(0.1);
        assert_eq!(rig.record(id).clock(), Some(0.0));

        rig.step(0.1);
        let first = rig.record(id).clock().unwrap();
        assert!(first > 0.0 && first < 0.1);
        assert!((first - 0.05).abs() < 1e-5);

        rig.step(0.1);
        let second = rig.record(id).clock().unwrap();
        assert!((second - first - 0.1).abs() < 1e-5);
    }

    #[test]
    fn pause_freezes_time_but_not_presentation() {
        let mut rig = Rig::new();
        let id = rig.add_clip(RigOverrides::default());
        rig.step(0.1);
        let alive = rig.record(id).time_alive();
        let clock = rig.record(id).clock();

        rig.defaults.paused = true;
        rig.defaults.skeleton_visible = false;
        let report = rig.step(0.1);

        assert_eq!(report.advanced, 0);
        assert_eq!(rig.record(id).time_alive(), alive);
        assert_eq!(rig.record(id).clock(), clock);
        assert!(!rig.record(id).view().visible);
    }

    #[test]
    fn alive_time_keeps_growing_in_long_sessions() {
        let mut rig = Rig::new();
        let id = rig.add_clip(RigOverrides::default());
        let start = 524_288.0;
        rig.registry
            .iter_mut()
            .for_each(|record| record.time_alive = start);

        let dt = 1.0 / 60.0;
        rig.step(dt);
        rig.step(dt);
        let grown = rig.record(id).time_alive() - start;
        assert!((grown - 2.0 * f64::from(dt)).abs() < 1e-9, "grew by {grown}");
    }

    #[test]
    fn global_changes_reach_existing_rigs_next_tick() {
        let mut rig = Rig::new();
        let id = rig.add_clip(RigOverrides::default());
        let pinned = rig.add_clip(RigOverrides {
            speed: Some(1.0),
            reverse: Some(false),
            ..Default::default()
        });
        rig.step(0.1);

        rig.defaults.reverse = true;
        rig.step(0.1);

        assert_eq!(rig.record(id).direction(), ClockDirection::Reverse);
        assert_eq!(rig.record(pinned).direction(), ClockDirection::Forward);
    }

    #[test]
    fn reverse_rewinds_from_zero_to_the_clip_end() {
        let mut rig = Rig::new();
        let id = rig.add_clip(RigOverrides {
            reverse: Some(true),
            ..Default::default()
        });
        let duration = rig.record(id).player().unwrap().duration();

        let mut previous = rig.record(id).clock().unwrap();
        let mut wraps = 0;
        for _ in 0..60 {
            rig.step(0.1);
            let now = rig.record(id).clock().unwrap();
            if now > previous {
                wraps += 1;
            }
            assert!(now <= duration + 1e-6);
            previous = now;
        }
        assert!(wraps >= 5, "backward loop keeps wrapping, saw {wraps}");
    }

    #[test]
    fn reverse_clock_near_zero_restarts_from_the_end() {
        let mut rig = Rig::new();
        let id = rig.add_clip(RigOverrides {
            reverse: Some(true),
            ..Default::default()
        });
        let duration = rig.record(id).player().unwrap().duration();

        // Within the epsilon: jumps to the end first, then steps back a full dt.
        rig.set_clock(id, 5e-5);
        rig.step(0.1);
        let clock = rig.record(id).clock().unwrap();
        assert!((clock - (duration - 0.1)).abs() < 1e-6, "clock was {clock}");

        // Just above it: runs past zero and wraps, keeping the remainder.
        rig.set_clock(id, 2e-4);
        rig.step(0.1);
        let clock = rig.record(id).clock().unwrap();
        assert!((clock - (duration - 0.0998)).abs() < 1e-6, "clock was {clock}");
    }

    #[test]
    fn trails_follow_cadence_and_delay() {
        let mut rig = Rig::new();
        rig.add_clip(RigOverrides {
            trail_length: Some(12.0),
            start_delay: Some(1.0),
            ..Default::default()
        });

        let mut emitted = 0;
        for _ in 0..12 {
            emitted += rig.step(0.05).emitted;
        }
        assert_eq!(emitted, 0, "no ghosts while delayed");

        for _ in 0..12 {
            emitted += rig.step(0.1).emitted;
        }
        assert_eq!(emitted, 2);
        assert_eq!(rig.trails.len(), 2);
    }

    #[test]
    fn live_rigs_freeze_without_landmarks() {
        let mut rig = Rig::new();
        let id = rig
            .registry
            .register(RigRecord::live(RigConfig::default(), &rig.defaults));

        rig.step(0.1);
        assert!(rig.record(id).view().segments.is_empty());

        let set = diagonal_set();
        rig.scheduler
            .tick(0.1, &mut rig.registry, &mut rig.trails, &rig.defaults, Some(&set));
        let drawn = rig.record(id).view().segments.clone();
        assert!(!drawn.is_empty());

        rig.step(0.1);
        assert_eq!(rig.record(id).view().segments, drawn);
        assert!(rig.record(id).clock().is_none());
    }
}
