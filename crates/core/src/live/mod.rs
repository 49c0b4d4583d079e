use std::sync::{Arc, Mutex, MutexGuard};

use glam::Vec3;

use crate::{scene::Segment, Result, StageError};

/// Points per published landmark set.
pub const LANDMARK_COUNT: usize = 33;

/// Landmark index pairs drawn as the live stick figure.
pub const POSE_CONNECTIONS: [(usize, usize); 29] = [
    // torso
    (11, 12),
    (23, 24),
    (11, 23),
    (12, 24),
    // left arm and hand
    (11, 13),
    (13, 15),
    (15, 17),
    (17, 19),
    (19, 15),
    (15, 21),
    // right arm and hand
    (12, 14),
    (14, 16),
    (16, 18),
    (18, 20),
    (20, 16),
    (16, 22),
    // left leg and foot
    (23, 25),
    (25, 27),
    (27, 29),
    (29, 31),
    (31, 27),
    // right leg and foot
    (24, 26),
    (26, 28),
    (28, 30),
    (30, 32),
    (32, 28),
    // head
    (0, 11),
    (0, 12),
    (7, 8),
];

/// One complete frame of pose-estimation output, in metres with Y down.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Vec3>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Vec3>) -> Result<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(StageError::msg(format!(
                "landmark sets hold {LANDMARK_COUNT} points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Stick-figure segments with Y and Z flipped into scene orientation.
    pub fn segments(&self, scale: f32) -> Vec<Segment> {
        let to_scene = |point: Vec3| Vec3::new(point.x, -point.y, -point.z) * scale;
        POSE_CONNECTIONS
            .iter()
            .map(|&(a, b)| Segment::new(to_scene(self.points[a]), to_scene(self.points[b])))
            .collect()
    }
}

/// Shared slot holding the most recent landmark set. Producers replace the
/// whole set; readers only ever see complete sets.
#[derive(Clone, Default)]
pub struct LandmarkFeed {
    latest: Arc<Mutex<Option<Arc<LandmarkSet>>>>,
}

impl LandmarkFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, set: LandmarkSet) -> Result<()> {
        let mut slot = self.lock()?;
        *slot = Some(Arc::new(set));
        Ok(())
    }

    /// The latest set, or `None` when nothing has been published yet.
    pub fn latest(&self) -> Result<Option<Arc<LandmarkSet>>> {
        let slot = self.lock()?;
        Ok(slot.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Arc<LandmarkSet>>>> {
        self.latest
            .lock()
            .map_err(|_| StageError::msg("landmark feed has been poisoned"))
    }
}

impl std::fmt::Debug for LandmarkFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandmarkFeed").finish()
    }
}
