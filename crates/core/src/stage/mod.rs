//! The engine facade driven by script calls and the frame loop.
//!
//! Script calls and [`Stage::tick`] both take `&mut self`, so a `clear` can
//! never interleave with a frame sweep: every frame sees either the whole
//! registry or an empty one.

use std::collections::HashMap;

use glam::Vec3;

use crate::{
    config::StageConfig,
    handle::{self, RigConfig, RigHandle, RigKind},
    live::LandmarkFeed,
    loader::{ClipLoader, ClipSource, Epoch, LoadCompletion, LoadTicket},
    params::{GlobalDefaults, Param, ParamValue},
    registry::{RigId, RigRecord, RigRegistry},
    render::DrawList,
    scene::{AutoRotate, Camera, Color, Grid, SceneState},
    timeline::{Scheduler, TickReport},
    trail::TrailPool,
    Result, StageError,
};

/// Camera orbit speed per unit of `rot`.
const AUTO_ROTATE_GAIN: f32 = 20.0;

/// Result of activating a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The rig is in the registry already.
    Registered(RigId),
    /// The clip is loading; the rig appears once the loader completes.
    Pending(LoadTicket),
}

#[derive(Debug)]
struct PendingPlay {
    config: RigConfig,
}

#[derive(Debug)]
pub struct Stage<L> {
    config: StageConfig,
    loader: L,
    feed: LandmarkFeed,
    defaults: GlobalDefaults,
    scene: SceneState,
    registry: RigRegistry,
    trails: TrailPool,
    scheduler: Scheduler,
    epoch: Epoch,
    next_request: u64,
    pending: HashMap<u64, PendingPlay>,
    errors: Vec<StageError>,
}

impl<L: ClipLoader> Stage<L> {
    pub fn new(config: StageConfig, loader: L) -> Self {
        Self {
            defaults: config.defaults.clone(),
            scene: SceneState::new(config.scene.clone()),
            scheduler: Scheduler::new(&config.engine),
            config,
            loader,
            feed: LandmarkFeed::new(),
            registry: RigRegistry::new(),
            trails: TrailPool::new(),
            epoch: Epoch::default(),
            next_request: 0,
            pending: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Reads live rigs from `feed` instead of a private one.
    pub fn with_feed(mut self, feed: LandmarkFeed) -> Self {
        self.feed = feed;
        self
    }

    /// Tears everything down so the next script starts from a known state.
    ///
    /// Invalidates outstanding loads, stops and releases every rig and ghost,
    /// drops grids, stops camera rotation, restores the background and puts
    /// the global defaults back to their configured values.
    pub fn clear(&mut self) -> &mut Self {
        self.epoch = self.epoch.next();
        let cancelled = self.pending.len();
        self.pending.clear();
        self.registry.clear(&mut self.trails);
        self.scene.reset_transient();
        self.defaults.reset_to(&self.config.defaults);
        tracing::info!(epoch = self.epoch.value(), cancelled, "stage cleared");
        self
    }

    pub fn grid(&mut self, size: f32, divisions: u32) -> &mut Self {
        self.scene.grids.push(Grid { size, divisions });
        self
    }

    pub fn cam(&mut self, position: Vec3, target: Vec3) -> &mut Self {
        self.scene.camera = Camera { position, target };
        self
    }

    pub fn background(&mut self, color: Color) -> &mut Self {
        self.scene.background = color;
        self
    }

    pub fn bg(&mut self, color: Color) -> &mut Self {
        self.background(color)
    }

    /// New clip-backed handle. Nothing happens until it is played.
    pub fn bvh(&self, source: impl Into<String>) -> RigHandle {
        RigHandle::clip(source)
    }

    /// New live-feed handle. Nothing happens until it is played.
    pub fn live(&self) -> RigHandle {
        RigHandle::live()
    }

    pub fn duplicate(&self, source: &RigHandle) -> Result<RigHandle> {
        handle::duplicate(source)
    }

    /// Activates a handle. Live rigs register at once; clip rigs register
    /// when their load completes in the current epoch.
    pub fn play(&mut self, handle: &RigHandle) -> Result<PlayOutcome> {
        let config = handle.config().clone();
        match handle.kind() {
            RigKind::Live => {
                let id = self
                    .registry
                    .register(RigRecord::live(config, &self.defaults));
                tracing::info!(rig = id.value(), "live rig registered");
                Ok(PlayOutcome::Registered(id))
            }
            RigKind::Clip { source } => {
                if source.trim().is_empty() {
                    return Err(StageError::InvalidInput("clip handles need a source identifier"));
                }
                let ticket = LoadTicket {
                    epoch: self.epoch,
                    request: self.next_request,
                };
                self.next_request += 1;
                let source = ClipSource::resolve(source, &self.config.engine);
                tracing::debug!(
                    id = %source.id,
                    url = %source.url,
                    request = ticket.request,
                    "requesting clip"
                );
                self.pending.insert(ticket.request, PendingPlay { config });
                self.loader.request(ticket, source);
                Ok(PlayOutcome::Pending(ticket))
            }
        }
    }

    pub fn speed(&mut self, speed: f32) -> &mut Self {
        self.defaults.speed = speed;
        self
    }

    pub fn pause(&mut self, paused: bool) -> &mut Self {
        self.defaults.paused = paused;
        self
    }

    pub fn skeleton(&mut self, visible: bool) -> &mut Self {
        self.defaults.skeleton_visible = visible;
        self
    }

    pub fn scale(&mut self, scale: f32) -> &mut Self {
        self.defaults.global_scale = scale;
        self
    }

    /// Sets the rotation speed and orbits the camera while it is non-zero.
    pub fn rot(&mut self, speed: f32) -> &mut Self {
        self.defaults.rotation_speed = speed;
        self.scene.auto_rotate = if speed != 0.0 {
            AutoRotate {
                enabled: true,
                speed: speed * AUTO_ROTATE_GAIN,
            }
        } else {
            AutoRotate::default()
        };
        self
    }

    pub fn reverse(&mut self, reverse: bool) -> &mut Self {
        self.defaults.reverse = reverse;
        self
    }

    pub fn color(&mut self, color: Option<Color>) -> &mut Self {
        self.defaults.color = color;
        self
    }

    pub fn trail(&mut self, length: f32) -> &mut Self {
        self.defaults.trail_length = length;
        self
    }

    pub fn delay(&mut self, seconds: f32) -> &mut Self {
        self.defaults.start_delay = seconds;
        self
    }

    pub fn set_global(&mut self, param: Param, value: ParamValue) -> Result<&mut Self> {
        self.defaults.set(param, value)?;
        Ok(self)
    }

    /// Runs one frame: registers finished loads, then sweeps every rig.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        self.poll_loads();

        let landmarks = match self.feed.latest() {
            Ok(latest) => latest,
            Err(err) => {
                tracing::warn!(%err, "landmark feed unavailable");
                None
            }
        };

        self.scheduler.tick(
            dt,
            &mut self.registry,
            &mut self.trails,
            &self.defaults,
            landmarks.as_deref(),
        )
    }

    /// Collects finished loads. Completions from an older epoch are dropped.
    pub fn poll_loads(&mut self) {
        for completion in self.loader.poll() {
            self.complete(completion);
        }
    }

    fn complete(&mut self, completion: LoadCompletion) {
        let LoadCompletion {
            ticket,
            source,
            outcome,
        } = completion;

        if ticket.epoch != self.epoch {
            tracing::debug!(
                id = %source.id,
                requested = ticket.epoch.value(),
                current = self.epoch.value(),
                "discarding stale clip load"
            );
            return;
        }
        let Some(pending) = self.pending.remove(&ticket.request) else {
            tracing::debug!(request = ticket.request, "completion without a pending play");
            return;
        };

        match outcome {
            Ok(loaded) => {
                let record =
                    RigRecord::clip(source.id.clone(), pending.config, loaded, &self.defaults);
                let id = self.registry.register(record);
                tracing::info!(rig = id.value(), id = %source.id, "clip rig registered");
            }
            Err(reason) => {
                tracing::warn!(id = %source.id, url = %source.url, %reason, "clip failed to load");
                self.errors.push(StageError::Load {
                    source_id: source.id,
                    url: source.url,
                    reason,
                });
            }
        }
    }

    /// Drains the load failures reported since the last call.
    pub fn take_errors(&mut self) -> Vec<StageError> {
        std::mem::take(&mut self.errors)
    }

    pub fn draw_list(&self) -> DrawList {
        DrawList::collect(&self.scene, &self.registry, &self.trails)
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn defaults(&self) -> &GlobalDefaults {
        &self.defaults
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn registry(&self) -> &RigRegistry {
        &self.registry
    }

    pub fn trails(&self) -> &TrailPool {
        &self.trails
    }

    pub fn feed(&self) -> &LandmarkFeed {
        &self.feed
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::ClipLibrary,
        clip::fixtures::ARM_BVH,
        live::fixtures::diagonal_set,
        registry::{ClockDirection, RigRecord},
    };

    fn stage() -> Stage<ClipLibrary> {
        let mut library = ClipLibrary::new();
        library.register_bvh("arm", ARM_BVH).unwrap();
        Stage::new(StageConfig::default(), library)
    }

    fn clock_of(stage: &Stage<ClipLibrary>, index: usize) -> f32 {
        stage
            .registry()
            .iter()
            .nth(index)
            .and_then(RigRecord::clock)
            .unwrap()
    }

    #[test]
    fn clip_rigs_register_after_the_load_completes() {
        let mut stage = stage();
        let handle = stage.bvh("arm").pos(10.0, 0.0, 0.0);

        let outcome = stage.play(&handle).unwrap();
        assert!(matches!(outcome, PlayOutcome::Pending(_)));
        assert!(stage.registry().is_empty());
        assert_eq!(stage.pending_loads(), 1);

        stage.tick(0.016);
        assert_eq!(stage.registry().len(), 1);
        assert_eq!(stage.pending_loads(), 0);
        assert_eq!(stage.registry().iter().next().unwrap().config().position.x, 10.0);
    }

    #[test]
    fn load_failures_are_reported_without_stopping_other_rigs() {
        let mut stage = stage();
        stage.play(&stage.bvh("arm")).unwrap();
        stage.play(&stage.bvh("missing")).unwrap();

        stage.tick(0.1);
        stage.tick(0.1);

        assert_eq!(stage.registry().len(), 1);
        assert!(clock_of(&stage, 0) > 0.0);

        let errors = stage.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].source_id(), Some("missing"));
        assert!(errors[0].to_string().contains("./assets/missing.bvh"));
        assert!(stage.take_errors().is_empty());
    }

    #[test]
    fn blank_clip_sources_are_rejected() {
        let mut stage = stage();
        let err = stage.play(&RigHandle::clip("")).unwrap_err();
        assert!(matches!(err, StageError::InvalidInput(_)));
        assert_eq!(stage.pending_loads(), 0);
    }

    #[test]
    fn clear_discards_loads_from_the_previous_epoch() {
        let mut stage = stage();
        stage.play(&stage.bvh("arm")).unwrap();
        stage.trail(5.0).grid(400.0, 10).rot(1.0);

        stage.clear();
        stage.tick(0.1);

        assert!(stage.registry().is_empty());
        assert!(stage.trails().is_empty());
        assert!(stage.take_errors().is_empty());
        assert_eq!(stage.epoch().value(), 1);
        assert!(stage.scene().grids.is_empty());
        assert!(!stage.scene().auto_rotate.enabled);
        assert_eq!(stage.defaults().trail_length, 0.0);
    }

    #[test]
    fn stale_completions_are_ignored_even_when_delivered_late() {
        let mut stage = stage();
        let PlayOutcome::Pending(ticket) = stage.play(&stage.bvh("arm")).unwrap() else {
            panic!("clip plays are deferred");
        };
        stage.clear();

        let loaded = stage.loader().get("arm").cloned().unwrap();
        stage.complete(LoadCompletion {
            ticket,
            source: ClipSource::resolve("arm", &stage.config().engine),
            outcome: Ok(loaded),
        });

        assert!(stage.registry().is_empty());
        assert!(stage.take_errors().is_empty());
    }

    #[test]
    fn clear_empties_registry_and_trails() {
        let mut stage = stage();
        stage.play(&stage.bvh("arm").trail(50.0)).unwrap();
        for _ in 0..12 {
            stage.tick(0.016);
        }
        assert!(!stage.trails().is_empty());

        stage.clear();
        assert!(stage.registry().is_empty());
        assert!(stage.trails().is_empty());
    }

    #[test]
    fn duplicate_then_reverse_runs_both_directions() {
        let mut stage = stage();
        let a = stage
            .bvh("arm")
            .pos(-160.0, 0.0, 0.0)
            .trail(100.0)
            .delay(0.0)
            .reverse(false);
        let b = stage.duplicate(&a).unwrap().reverse(true);
        stage.play(&a).unwrap();
        stage.play(&b).unwrap();
        assert_eq!(a.overrides().reverse, Some(false));

        stage.tick(0.0);
        let duration = stage.registry().iter().next().unwrap().player().unwrap().duration();

        let (mut prev_a, mut prev_b) = (clock_of(&stage, 0), clock_of(&stage, 1));
        let (mut wraps_a, mut wraps_b) = (0, 0);
        for _ in 0..40 {
            stage.tick(0.07);
            let (now_a, now_b) = (clock_of(&stage, 0), clock_of(&stage, 1));
            if now_a < prev_a {
                wraps_a += 1;
            } else {
                assert!(now_a > prev_a);
            }
            if now_b > prev_b {
                wraps_b += 1;
            } else {
                assert!(now_b < prev_b);
            }
            assert!(now_a < duration && now_b <= duration);
            prev_a = now_a;
            prev_b = now_b;
        }

        assert!(wraps_a >= 2 && wraps_b >= 2);
        let records: Vec<_> = stage.registry().iter().collect();
        assert_eq!(records[0].direction(), ClockDirection::Forward);
        assert_eq!(records[1].direction(), ClockDirection::Reverse);
        assert_eq!(records[1].config().position.x, -160.0);
    }

    #[test]
    fn zero_global_trail_stops_new_ghosts_but_old_ones_fade_out() {
        let mut stage = stage();
        stage.trail(30.0);
        stage.play(&stage.bvh("arm")).unwrap();
        for _ in 0..12 {
            stage.tick(0.016);
        }
        let before = stage.trails().len();
        assert!(before > 0);

        stage.trail(0.0);
        let report = stage.tick(0.016);
        assert_eq!(report.emitted, 0);
        assert_eq!(stage.trails().len(), before);

        let mut emitted = 0;
        for _ in 0..40 {
            emitted += stage.tick(0.016).emitted;
        }
        assert_eq!(emitted, 0);
        assert!(stage.trails().is_empty());
    }

    #[test]
    fn live_rigs_register_immediately_and_follow_the_feed() {
        let feed = LandmarkFeed::new();
        let mut stage = stage().with_feed(feed.clone());
        let handle = stage.live().pos(0.0, 100.0, 0.0).trail(10.0);
        let outcome = stage.play(&handle).unwrap();
        let PlayOutcome::Registered(id) = outcome else {
            panic!("live rigs register synchronously");
        };

        stage.tick(0.016);
        assert!(stage.registry().get(id).unwrap().view().segments.is_empty());

        feed.publish(diagonal_set()).unwrap();
        for _ in 0..6 {
            stage.tick(0.016);
        }
        let record = stage.registry().get(id).unwrap();
        assert_eq!(record.view().segments.len(), crate::live::POSE_CONNECTIONS.len());
        assert!(!stage.trails().is_empty());

        let copy = stage.duplicate(&handle).unwrap();
        assert!(copy.is_live());
    }

    #[test]
    fn global_setters_mirror_rig_overrides() {
        let mut stage = stage();
        stage
            .speed(2.0)
            .pause(true)
            .skeleton(false)
            .scale(3.0)
            .reverse(true)
            .color(Some(Color::WHITE))
            .trail(4.0)
            .delay(1.0)
            .rot(0.5);

        let defaults = stage.defaults();
        assert_eq!(defaults.speed, 2.0);
        assert!(defaults.paused);
        assert!(!defaults.skeleton_visible);
        assert_eq!(defaults.global_scale, 3.0);
        assert!(defaults.reverse);
        assert_eq!(defaults.color, Some(Color::WHITE));
        assert_eq!(defaults.trail_length, 4.0);
        assert_eq!(defaults.start_delay, 1.0);
        assert_eq!(stage.scene().auto_rotate.speed, 10.0);

        stage
            .set_global(Param::StartDelay, ParamValue::Float(0.0))
            .unwrap();
        assert_eq!(stage.defaults().start_delay, 0.0);
        stage.rot(0.0);
        assert!(!stage.scene().auto_rotate.enabled);
    }

    #[test]
    fn scene_chrome_setters() {
        let mut stage = stage();
        stage
            .bg(Color::WHITE)
            .cam(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO)
            .grid(200.0, 4);

        assert_eq!(stage.scene().background, Color::WHITE);
        assert_eq!(stage.scene().camera.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(stage.scene().grids.len(), 1);

        stage.clear();
        assert_eq!(stage.scene().background, Color::BACKGROUND);
        assert_eq!(stage.scene().camera.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
