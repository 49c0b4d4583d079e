//! Core library for the mocap stage.
//!
//! A stage plays many skeletal performers at once, each one either a motion
//! clip or the live pose feed. Script calls build [`RigHandle`]s and play
//! them; every frame the [`Scheduler`] resolves each rig's parameters against
//! the [`GlobalDefaults`], moves its clock (honouring start delays and reverse
//! playback) and leaves fading [`TrailGhost`]s behind. Geometry, rendering and
//! pose estimation stay outside; the crate only produces the data they need.

pub mod assets;
pub mod clip;
pub mod config;
pub mod error;
pub mod handle;
pub mod live;
pub mod loader;
pub mod params;
pub mod registry;
pub mod render;
pub mod scene;
pub mod stage;
pub mod timeline;
pub mod trail;

pub use assets::ClipLibrary;
pub use clip::{parse_bvh, AnimationPlayer, LoadedClip, MotionClip, Skeleton};
pub use config::{EngineConfig, SceneConfig, StageConfig};
pub use error::{Result, StageError};
pub use handle::{duplicate, RigConfig, RigHandle, RigKind};
pub use live::{LandmarkFeed, LandmarkSet, POSE_CONNECTIONS};
pub use loader::{BvhFileLoader, ClipLoader, ClipSource, Epoch, LoadCompletion, LoadTicket};
pub use params::{resolve, EffectiveParams, GlobalDefaults, Param, ParamValue, RigOverrides};
pub use registry::{ClockDirection, RigId, RigRecord, RigRegistry};
pub use render::{DrawLine, DrawList};
pub use scene::{Color, SceneState, Segment, SkeletonView};
pub use stage::{PlayOutcome, Stage};
pub use timeline::{FrameClock, Scheduler, TickReport};
pub use trail::{TrailEmitter, TrailGhost, TrailPool};
