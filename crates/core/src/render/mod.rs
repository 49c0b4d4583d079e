use crate::{
    registry::RigRegistry,
    scene::{Color, SceneState, Segment},
    trail::TrailPool,
};

/// A world-space line for the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawLine {
    pub segment: Segment,
    pub color: Color,
    pub opacity: f32,
}

/// Everything an external renderer needs for one frame. Rig lines come first
/// in registry order, ghost lines after them.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawList {
    pub background: Color,
    pub lines: Vec<DrawLine>,
    pub rig_lines: usize,
    pub ghost_lines: usize,
}

impl DrawList {
    pub fn collect(scene: &SceneState, registry: &RigRegistry, trails: &TrailPool) -> Self {
        let mut lines = Vec::new();

        for record in registry.iter().filter(|record| record.view().visible) {
            let view = record.view();
            lines.extend(view.world_segments().into_iter().map(|segment| DrawLine {
                segment,
                color: view.color,
                opacity: 1.0,
            }));
        }
        let rig_lines = lines.len();

        for ghost in trails.iter() {
            lines.extend(ghost.segments().iter().map(|&segment| DrawLine {
                segment,
                color: ghost.color(),
                opacity: ghost.opacity(),
            }));
        }
        let ghost_lines = lines.len() - rig_lines;

        Self {
            background: scene.background,
            lines,
            rig_lines,
            ghost_lines,
        }
    }
}
