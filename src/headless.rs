//! In-memory renderer
//!
//! Tracks what a real backend would display without drawing anything. Used by
//! the demo and the test suite.

use std::collections::BTreeMap;
use std::time::Duration;

use log::trace;
use nalgebra::Point3;

use crate::render_loop::FrameContext;
use crate::scene::{EntityId, Renderer, VisualEntity};

#[derive(Debug, Clone)]
struct LiveEntity {
    entity: VisualEntity,
    submitted_at: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderer {
    live: BTreeMap<EntityId, LiveEntity>,
    submission_batches: usize,
    removal_batches: usize,
    frames: u64,
    clock: Duration,
    settled: usize,
    last_eye: Option<Point3<f64>>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_entities(&self) -> impl Iterator<Item = &VisualEntity> {
        self.live.values().map(|live| &live.entity)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn submission_batches(&self) -> usize {
        self.submission_batches
    }

    pub fn removal_batches(&self) -> usize {
        self.removal_batches
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Entities whose transition had finished (or that had none) at the last frame.
    pub fn settled(&self) -> usize {
        self.settled
    }

    pub fn last_eye(&self) -> Option<Point3<f64>> {
        self.last_eye
    }
}

impl Renderer for HeadlessRenderer {
    fn submit(&mut self, entities: &[VisualEntity]) {
        self.submission_batches += 1;
        for entity in entities {
            self.live.insert(
                entity.id,
                LiveEntity {
                    entity: entity.clone(),
                    submitted_at: self.clock,
                },
            );
        }
    }

    fn remove(&mut self, ids: &[EntityId]) {
        self.removal_batches += 1;
        for id in ids {
            self.live.remove(id);
        }
    }

    fn render_frame(&mut self, frame: &FrameContext) {
        self.frames += 1;
        self.clock = frame.elapsed;
        self.last_eye = Some(frame.camera.eye);
        self.settled = self
            .live
            .values()
            .filter(|live| match &live.entity.transition {
                Some(transition) => {
                    transition.is_settled(frame.elapsed.saturating_sub(live.submitted_at))
                }
                None => true,
            })
            .count();
        trace!(
            "frame {}: {} live, {} settled",
            frame.frame,
            self.live.len(),
            self.settled
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnimationConfig, SceneLayout};
    use crate::render_loop::{CameraPose, FrameContext};
    use crate::scene::SceneLifecycleManager;
    use crate::scenario::{ExperimentKind, ScenarioRegistry};
    use crate::random::seeded;
    use crate::sim::simulate;

    fn frame_at(frame: u64, elapsed: Duration) -> FrameContext {
        FrameContext {
            frame,
            elapsed,
            camera: CameraPose {
                eye: Point3::new(0.0, 10.0, 10.0),
                target: Point3::origin(),
            },
        }
    }

    #[test]
    fn transitions_settle_after_their_total_duration() {
        let mut scene = SceneLifecycleManager::new(
            HeadlessRenderer::new(),
            SceneLayout::default(),
            AnimationConfig::default(),
        );
        let registry = ScenarioRegistry::builtin();
        let result = simulate(&registry, ExperimentKind::CoinToss, &mut seeded(1)).unwrap();

        scene.render_frame(&frame_at(0, Duration::from_millis(500)));
        scene.materialize(&result).unwrap();

        scene.render_frame(&frame_at(1, Duration::from_millis(500)));
        assert_eq!(scene.renderer().settled(), 0);

        // last entity: 49 * 25 ms delay + 900 ms duration after submission
        scene.render_frame(&frame_at(2, Duration::from_millis(500 + 49 * 25 + 900)));
        assert_eq!(scene.renderer().settled(), 50);
        assert_eq!(scene.renderer().frames(), 3);
        assert!(scene.renderer().last_eye().is_some());
    }
}
