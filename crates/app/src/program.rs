//! Stage programs: a JSON list of script calls replayed against a [`Stage`].

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use glam::Vec3;
use mocap_stage_core::{
    ClipLoader, Color, FrameClock, LandmarkSet, Param, ParamValue, RigConfig, RigHandle, RigKind,
    RigOverrides, Stage, StageError,
};
use serde::{Deserialize, Serialize};

/// How long `advance` waits for outstanding clip loads before running frames.
const LOAD_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Clear,
    Grid {
        #[serde(default = "default_grid_size")]
        size: f32,
        #[serde(default = "default_grid_divisions")]
        divisions: u32,
    },
    Cam {
        position: Vec3,
        target: Vec3,
    },
    Background {
        color: Color,
    },
    Pause {
        #[serde(default = "yes")]
        value: bool,
    },
    Rot {
        value: f32,
    },
    /// Any global default that mirrors a rig override.
    Global {
        param: Param,
        value: ParamValue,
    },
    /// Builds a handle; `source` for clip rigs, none for a live rig.
    Spawn {
        name: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        config: RigConfig,
        #[serde(default)]
        play: bool,
    },
    Duplicate {
        from: String,
        name: String,
        #[serde(default)]
        position: Option<Vec3>,
        #[serde(default)]
        overrides: RigOverrides,
        #[serde(default)]
        play: bool,
    },
    Play {
        name: String,
    },
    PublishLandmarks {
        points: Vec<Vec3>,
    },
    Advance {
        frames: u32,
    },
}

fn default_grid_size() -> f32 {
    400.0
}

fn default_grid_divisions() -> u32 {
    10
}

fn yes() -> bool {
    true
}

pub fn parse(json: &str) -> mocap_stage_core::Result<Vec<Command>> {
    Ok(serde_json::from_str(json)?)
}

/// End-of-run snapshot printed by the `run` subcommand.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub epoch: u64,
    pub rigs: Vec<RigSummary>,
    pub ghosts: usize,
    pub lines: usize,
    pub background: Color,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RigSummary {
    pub id: Option<u64>,
    pub source: Option<String>,
    pub time_alive: f64,
    pub clock: Option<f32>,
    pub direction: String,
    pub visible: bool,
}

/// Replays commands against a stage, keeping named handles around.
pub struct Runner<L> {
    stage: Stage<L>,
    clock: FrameClock,
    handles: HashMap<String, RigHandle>,
    errors: Vec<StageError>,
}

impl<L: ClipLoader> Runner<L> {
    pub fn new(stage: Stage<L>, fps: f32) -> Self {
        Self {
            stage,
            clock: FrameClock::fixed(1.0 / fps.max(1.0)),
            handles: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn stage(&self) -> &Stage<L> {
        &self.stage
    }

    pub fn run(&mut self, commands: &[Command]) -> mocap_stage_core::Result<()> {
        for command in commands {
            self.execute(command)?;
        }
        Ok(())
    }

    pub fn execute(&mut self, command: &Command) -> mocap_stage_core::Result<()> {
        tracing::debug!(?command, "executing");
        match command {
            Command::Clear => {
                self.stage.clear();
                self.handles.clear();
            }
            Command::Grid { size, divisions } => {
                self.stage.grid(*size, *divisions);
            }
            Command::Cam { position, target } => {
                self.stage.cam(*position, *target);
            }
            Command::Background { color } => {
                self.stage.background(*color);
            }
            Command::Pause { value } => {
                self.stage.pause(*value);
            }
            Command::Rot { value } => {
                self.stage.rot(*value);
            }
            Command::Global { param, value } => {
                self.stage.set_global(*param, *value)?;
            }
            Command::Spawn {
                name,
                source,
                config,
                play,
            } => {
                let kind = match source {
                    Some(source) => RigKind::Clip {
                        source: source.clone(),
                    },
                    None => RigKind::Live,
                };
                let handle = RigHandle::with_config(kind, config.clone());
                self.keep(name, handle, *play)?;
            }
            Command::Duplicate {
                from,
                name,
                position,
                overrides,
                play,
            } => {
                let original = self.handle(from)?;
                let mut handle = self.stage.duplicate(original)?;
                if let Some(position) = position {
                    handle = handle.pos(position.x, position.y, position.z);
                }
                handle = apply_overrides(handle, overrides);
                self.keep(name, handle, *play)?;
            }
            Command::Play { name } => {
                let handle = self.handle(name)?.clone();
                self.stage.play(&handle)?;
            }
            Command::PublishLandmarks { points } => {
                self.stage
                    .feed()
                    .publish(LandmarkSet::new(points.clone())?)?;
            }
            Command::Advance { frames } => self.advance(*frames),
        }
        Ok(())
    }

    /// Lets outstanding loads land, then runs `frames` fixed-step frames.
    pub fn advance(&mut self, frames: u32) {
        self.settle_loads();
        for _ in 0..frames {
            let dt = self.clock.delta();
            self.stage.tick(dt);
        }
        self.errors.extend(self.stage.take_errors());
    }

    pub fn summary(&mut self) -> Summary {
        self.errors.extend(self.stage.take_errors());
        let stage = &self.stage;
        let rigs = stage
            .registry()
            .iter()
            .map(|record| RigSummary {
                id: record.id().map(|id| id.value()),
                source: record.source_id().map(str::to_string),
                time_alive: record.time_alive(),
                clock: record.clock(),
                direction: format!("{:?}", record.direction()),
                visible: record.view().visible,
            })
            .collect();
        let draw = stage.draw_list();

        Summary {
            ticks: stage.ticks(),
            epoch: stage.epoch().value(),
            rigs,
            ghosts: stage.trails().len(),
            lines: draw.lines.len(),
            background: draw.background,
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }

    fn keep(&mut self, name: &str, handle: RigHandle, play: bool) -> mocap_stage_core::Result<()> {
        if play {
            self.stage.play(&handle)?;
        }
        self.handles.insert(name.to_string(), handle);
        Ok(())
    }

    fn handle(&self, name: &str) -> mocap_stage_core::Result<&RigHandle> {
        self.handles
            .get(name)
            .ok_or_else(|| StageError::msg(format!("no handle named `{name}`")))
    }

    fn settle_loads(&mut self) {
        let deadline = Instant::now() + LOAD_SETTLE_TIMEOUT;
        loop {
            self.stage.poll_loads();
            if self.stage.pending_loads() == 0 {
                return;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    pending = self.stage.pending_loads(),
                    "clip loads still outstanding, continuing without them"
                );
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

fn apply_overrides(mut handle: RigHandle, overrides: &RigOverrides) -> RigHandle {
    if let Some(scale) = overrides.scale {
        handle = handle.scale(scale);
    }
    if let Some(visible) = overrides.skeleton_visible {
        handle = handle.skeleton(visible);
    }
    if let Some(speed) = overrides.speed {
        handle = handle.speed(speed);
    }
    if let Some(reverse) = overrides.reverse {
        handle = handle.reverse(reverse);
    }
    if let Some(color) = overrides.color {
        handle = handle.color(color);
    }
    if let Some(length) = overrides.trail_length {
        handle = handle.trail(length);
    }
    if let Some(delay) = overrides.start_delay {
        handle = handle.delay(delay);
    }
    handle
}
