//! Scene lifecycle manager
//!
//! Owns the visual entities of the current run. Entities are created from
//! simulated trials, handed to the renderer, and removed in bulk before the
//! next run or at teardown.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::time::Duration;

use log::{debug, error};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::{AnimationConfig, SceneLayout};
use crate::render_loop::FrameContext;
use crate::scenario::OutcomeLabel;
use crate::sim::{ExperimentResult, TrialAttributes, TrialOutcome};
use crate::LabError;

/// Maximum coin tilt derived from the flip draw [rad]
const COIN_WOBBLE: f64 = 0.15;
/// Inner ring for conditional trials that reached the dependent branch.
const DEPENDENT_RING_FACTOR: f64 = 0.6;
const DIE_HALF_EXTENT: f64 = 0.5;

const HEADS_COLOR: Color = Color(0xFF_D7_00);
const TAILS_COLOR: Color = Color(0xC0_C0_C0);
const INDEPENDENT_COLOR: Color = Color(0x3B_82_F6);
const DEPENDENT_COLOR: Color = Color(0xEF_44_44);
const NO_EVENT_COLOR: Color = Color(0x9C_A3_AF);
const FACE_PALETTE: [Color; 6] = [
    Color(0xF8_71_71),
    Color(0xFB_BF_24),
    Color(0x34_D3_99),
    Color(0x60_A5_FA),
    Color(0xA7_8B_FA),
    Color(0xF4_72_B6),
];

/// Identifier of a visual entity, unique for the lifetime of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transform {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Coin,
    Die,
    Orb,
}

/// 24-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    pub shape: Shape,
    pub color: Color,
    pub opacity: f64,
    /// Pip count shown on top of a die.
    pub marker: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    QuadraticOut,
    BounceOut,
}

impl Easing {
    /// Map linear progress in [0, 1] to eased progress in [0, 1].
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let eased = match self {
            Easing::Linear => t,
            Easing::QuadraticOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::BounceOut => bounce_out(t),
        };
        eased.clamp(0.0, 1.0)
    }
}

fn bounce_out(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;

    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

/// Tween consumed by the animation backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: Transform,
    pub to: Transform,
    pub duration_ms: u32,
    pub delay_ms: u32,
    pub easing: Easing,
}

impl Transition {
    pub fn total(&self) -> Duration {
        Duration::from_millis(u64::from(self.delay_ms) + u64::from(self.duration_ms))
    }

    pub fn is_settled(&self, elapsed: Duration) -> bool {
        elapsed >= self.total()
    }

    /// Interpolated transform `elapsed` after the entity was submitted.
    pub fn sample(&self, elapsed: Duration) -> Transform {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let active_ms = elapsed_ms - f64::from(self.delay_ms);
        if active_ms <= 0.0 {
            return self.from.clone();
        }
        if self.duration_ms == 0 || active_ms >= f64::from(self.duration_ms) {
            return self.to.clone();
        }

        let progress = self.easing.apply(active_ms / f64::from(self.duration_ms));
        Transform {
            position: self.from.position + (self.to.position - self.from.position) * progress,
            orientation: self
                .from
                .orientation
                .try_slerp(&self.to.orientation, progress, 1.0e-9)
                .unwrap_or(self.to.orientation),
            scale: self.from.scale + (self.to.scale - self.from.scale) * progress,
        }
    }
}

/// One rendered trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualEntity {
    pub id: EntityId,
    pub owner_trial_index: usize,
    pub transform: Transform,
    pub style: Style,
    pub transition: Option<Transition>,
}

impl VisualEntity {
    /// Same placement and look, ignoring identity.
    pub fn same_appearance(&self, other: &VisualEntity) -> bool {
        self.owner_trial_index == other.owner_trial_index
            && self.transform == other.transform
            && self.style == other.style
            && self.transition == other.transition
    }
}

/// Opaque rendering backend.
pub trait Renderer {
    fn submit(&mut self, entities: &[VisualEntity]);
    fn remove(&mut self, ids: &[EntityId]);
    fn render_frame(&mut self, frame: &FrameContext);
}

/// Rest transform and style for a trial.
pub fn place_trial(
    trial: &TrialOutcome,
    trial_count: u32,
    layout: &SceneLayout,
) -> (Transform, Style) {
    match trial.attributes {
        TrialAttributes::Coin { draw } => place_coin(trial, draw, trial_count, layout),
        TrialAttributes::Die { draw } => place_die(trial, draw, trial_count, layout),
        TrialAttributes::Conditional {
            dependent_branch, ..
        } => place_orb(trial, dependent_branch, trial_count, layout),
    }
}

/// Entity for a trial, including its drop-in transition when enabled.
pub fn entity_for_trial(
    id: EntityId,
    trial: &TrialOutcome,
    trial_count: u32,
    layout: &SceneLayout,
    animation: &AnimationConfig,
) -> VisualEntity {
    let (transform, style) = place_trial(trial, trial_count, layout);

    let transition = animation.enabled.then(|| {
        let mut from = transform.clone();
        from.position += Vector3::y() * animation.drop_height;
        Transition {
            from,
            to: transform.clone(),
            duration_ms: animation.duration_ms,
            delay_ms: animation
                .stagger_ms
                .saturating_mul(u32::try_from(trial.index).unwrap_or(u32::MAX)),
            easing: animation.easing,
        }
    });

    VisualEntity {
        id,
        owner_trial_index: trial.index,
        transform,
        style,
        transition,
    }
}

fn ring_angle(index: usize, trial_count: u32) -> f64 {
    index as f64 / f64::from(trial_count.max(1)) * TAU
}

fn yaw(angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle)
}

fn place_coin(
    trial: &TrialOutcome,
    draw: f64,
    trial_count: u32,
    layout: &SceneLayout,
) -> (Transform, Style) {
    let angle = ring_angle(trial.index, trial_count);
    let r = layout.coin_ring_radius;

    let wobble = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), (draw - 0.5) * COIN_WOBBLE);
    let flip = if trial.label == OutcomeLabel::Tails {
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI)
    } else {
        UnitQuaternion::identity()
    };

    let transform = Transform {
        position: Point3::new(r * angle.cos(), layout.coin_height, r * angle.sin()),
        orientation: yaw(-angle) * wobble * flip,
        scale: 1.0,
    };
    let color = if trial.label == OutcomeLabel::Heads {
        HEADS_COLOR
    } else {
        TAILS_COLOR
    };

    (
        transform,
        Style {
            shape: Shape::Coin,
            color,
            opacity: 1.0,
            marker: None,
        },
    )
}

/// Tilt that brings `face` to +y. The die model carries 1 on +y, 6 on -y,
/// 2/5 on +z/-z and 3/4 on +x/-x.
fn face_up(face: u8) -> UnitQuaternion<f64> {
    match face {
        2 => UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2),
        3 => UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        4 => UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -FRAC_PI_2),
        5 => UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
        6 => UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI),
        _ => UnitQuaternion::identity(),
    }
}

fn place_die(
    trial: &TrialOutcome,
    draw: f64,
    trial_count: u32,
    layout: &SceneLayout,
) -> (Transform, Style) {
    let face = match trial.label {
        OutcomeLabel::Face(face) => face,
        _ => 1,
    };

    let columns = layout.dice_columns.max(1);
    let rows = (trial_count as usize).div_ceil(columns).max(1);
    let col = trial.index % columns;
    let row = trial.index / columns;
    let x = (col as f64 - (columns - 1) as f64 / 2.0) * layout.dice_spacing;
    let z = (row as f64 - (rows - 1) as f64 / 2.0) * layout.dice_spacing;

    // position of the draw inside its face bucket, up to a quarter turn
    let spin = (draw * f64::from(OutcomeLabel::DIE_FACES)).fract() * FRAC_PI_2;

    let transform = Transform {
        position: Point3::new(x, DIE_HALF_EXTENT, z),
        orientation: yaw(spin) * face_up(face),
        scale: 1.0,
    };
    let palette_idx = usize::from(face.clamp(1, 6) - 1);

    (
        transform,
        Style {
            shape: Shape::Die,
            color: FACE_PALETTE[palette_idx],
            opacity: 1.0,
            marker: Some(face),
        },
    )
}

fn place_orb(
    trial: &TrialOutcome,
    dependent_branch: bool,
    trial_count: u32,
    layout: &SceneLayout,
) -> (Transform, Style) {
    let angle = ring_angle(trial.index, trial_count);
    let radius = if dependent_branch {
        layout.orb_ring_radius * DEPENDENT_RING_FACTOR
    } else {
        layout.orb_ring_radius
    };

    let (height, scale, color, opacity) = match trial.label {
        OutcomeLabel::DependentEvent => (
            layout.orb_height + layout.dependent_lift,
            1.0,
            DEPENDENT_COLOR,
            1.0,
        ),
        OutcomeLabel::NoEvent => (layout.orb_height, 0.6, NO_EVENT_COLOR, 0.5),
        _ => (layout.orb_height, 1.0, INDEPENDENT_COLOR, 1.0),
    };

    (
        Transform {
            position: Point3::new(radius * angle.cos(), height, radius * angle.sin()),
            orientation: UnitQuaternion::identity(),
            scale,
        },
        Style {
            shape: Shape::Orb,
            color,
            opacity,
            marker: None,
        },
    )
}

/// Exclusive owner of the entities shown for the current run.
pub struct SceneLifecycleManager<R> {
    renderer: R,
    layout: SceneLayout,
    animation: AnimationConfig,
    owned: Vec<VisualEntity>,
    next_id: u64,
}

impl<R: Renderer> SceneLifecycleManager<R> {
    pub fn new(renderer: R, layout: SceneLayout, animation: AnimationConfig) -> Self {
        Self {
            renderer,
            layout,
            animation,
            owned: Vec::new(),
            next_id: 0,
        }
    }

    /// Remove every owned entity. Calling this on an empty scene does nothing.
    pub fn clear(&mut self) {
        if self.owned.is_empty() {
            return;
        }

        let ids: Vec<EntityId> = self.owned.iter().map(|entity| entity.id).collect();
        self.renderer.remove(&ids);
        self.owned.clear();
        debug!("scene cleared: {} entities removed", ids.len());
    }

    /// Create one entity per trial, in draw order, and submit them.
    ///
    /// The scene must be empty; a populated scene means a run skipped
    /// `clear()` and nothing is submitted.
    pub fn materialize(&mut self, result: &ExperimentResult) -> Result<&[VisualEntity], LabError> {
        if !self.owned.is_empty() {
            error!(
                "materialize called on a scene that still owns {} entities",
                self.owned.len()
            );
            return Err(LabError::SceneNotCleared {
                owned: self.owned.len(),
            });
        }

        let entities: Vec<VisualEntity> = result
            .trials
            .iter()
            .map(|trial| {
                let id = EntityId(self.next_id);
                self.next_id += 1;
                entity_for_trial(
                    id,
                    trial,
                    result.total_trials,
                    &self.layout,
                    &self.animation,
                )
            })
            .collect();

        self.renderer.submit(&entities);
        self.owned = entities;
        debug!(
            "materialized {} entities for {}",
            self.owned.len(),
            result.kind
        );
        Ok(&self.owned)
    }

    pub fn render_frame(&mut self, frame: &FrameContext) {
        self.renderer.render_frame(frame);
    }

    /// Release everything the scene owns.
    pub fn teardown(&mut self) {
        self.clear();
        debug!("scene torn down");
    }

    pub fn entities(&self) -> &[VisualEntity] {
        &self.owned
    }

    pub fn len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessRenderer;
    use crate::random::{seeded, ScriptedSource};
    use crate::scenario::{ExperimentKind, ScenarioRegistry};
    use crate::sim::simulate;
    use approx::assert_abs_diff_eq;

    fn manager() -> SceneLifecycleManager<HeadlessRenderer> {
        SceneLifecycleManager::new(
            HeadlessRenderer::new(),
            SceneLayout::default(),
            AnimationConfig::default(),
        )
    }

    fn coin_result() -> ExperimentResult {
        let registry = ScenarioRegistry::builtin();
        simulate(&registry, ExperimentKind::CoinToss, &mut seeded(5)).unwrap()
    }

    #[test]
    fn clear_is_idempotent_before_any_run() {
        let mut scene = manager();
        scene.clear();
        scene.clear();
        assert!(scene.is_empty());
        assert_eq!(scene.renderer().removal_batches(), 0);
    }

    #[test]
    fn materialize_creates_one_entity_per_trial() {
        let mut scene = manager();
        let result = coin_result();
        scene.clear();
        let entities = scene.materialize(&result).unwrap();
        assert_eq!(entities.len(), 50);
        for (idx, entity) in entities.iter().enumerate() {
            assert_eq!(entity.owner_trial_index, idx);
        }
        assert_eq!(scene.renderer().live_count(), 50);
    }

    #[test]
    fn materialize_without_clear_is_rejected() {
        let mut scene = manager();
        let result = coin_result();
        scene.materialize(&result).unwrap();
        let err = scene.materialize(&result).unwrap_err();
        assert!(matches!(err, LabError::SceneNotCleared { owned: 50 }));
        assert_eq!(scene.len(), 50);
        assert_eq!(scene.renderer().submission_batches(), 1);
    }

    #[test]
    fn materialize_is_deterministic() {
        let mut scene = manager();
        let result = coin_result();
        let first = scene.materialize(&result).unwrap().to_vec();
        scene.clear();
        let second = scene.materialize(&result).unwrap().to_vec();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert!(a.same_appearance(b));
            assert_ne!(a.id, b.id);
        }
    }

    #[test]
    fn clear_removes_every_entity_from_the_renderer() {
        let mut scene = manager();
        scene.materialize(&coin_result()).unwrap();
        scene.clear();
        assert!(scene.is_empty());
        assert_eq!(scene.renderer().live_count(), 0);
        assert_eq!(scene.renderer().removal_batches(), 1);
    }

    #[test]
    fn coins_sit_on_the_ring_and_tails_are_flipped() {
        let registry = ScenarioRegistry::builtin();
        let mut rng = ScriptedSource::new(vec![0.25, 0.75]);
        let result = simulate(&registry, ExperimentKind::CoinToss, &mut rng).unwrap();
        let layout = SceneLayout::default();

        let (heads, heads_style) = place_trial(&result.trials[0], 50, &layout);
        let (tails, tails_style) = place_trial(&result.trials[1], 50, &layout);

        assert_abs_diff_eq!(heads.position.x, layout.coin_ring_radius, epsilon = 1e-12);
        assert_abs_diff_eq!(heads.position.z, 0.0, epsilon = 1e-12);
        let radial = (tails.position.x.powi(2) + tails.position.z.powi(2)).sqrt();
        assert_abs_diff_eq!(radial, layout.coin_ring_radius, epsilon = 1e-12);

        let up = Vector3::y();
        assert!((heads.orientation * up).y > 0.9);
        assert!((tails.orientation * up).y < -0.9);
        assert_eq!(heads_style.color, HEADS_COLOR);
        assert_eq!(tails_style.color, TAILS_COLOR);
    }

    #[test]
    fn rolled_face_points_up() {
        let model_normals = [
            (1, Vector3::y()),
            (2, Vector3::z()),
            (3, Vector3::x()),
            (4, -Vector3::x()),
            (5, -Vector3::z()),
            (6, -Vector3::y()),
        ];
        for (face, normal) in model_normals {
            let rotated = face_up(face) * normal;
            assert_abs_diff_eq!(rotated.y, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn dice_grid_is_centred() {
        let registry = ScenarioRegistry::builtin();
        let result = simulate(&registry, ExperimentKind::DiceToss, &mut seeded(9)).unwrap();
        let layout = SceneLayout::default();
        let mean_x: f64 = result
            .trials
            .iter()
            .map(|trial| place_trial(trial, result.total_trials, &layout).0.position.x)
            .sum::<f64>()
            / result.trials.len() as f64;
        assert_abs_diff_eq!(mean_x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn dependent_orbs_are_lifted() {
        let registry = ScenarioRegistry::builtin();
        // miss then dependent, every trial
        let mut rng = ScriptedSource::new(vec![0.9, 0.1]);
        let result =
            simulate(&registry, ExperimentKind::ConditionalProbability, &mut rng).unwrap();
        let layout = SceneLayout::default();
        let (transform, style) = place_trial(&result.trials[0], 40, &layout);
        assert_eq!(result.trials[0].label, OutcomeLabel::DependentEvent);
        assert_abs_diff_eq!(
            transform.position.y,
            layout.orb_height + layout.dependent_lift,
            epsilon = 1e-12
        );
        assert_eq!(style.color, DEPENDENT_COLOR);
    }

    #[test]
    fn transition_clamps_at_both_ends() {
        let result = coin_result();
        let animation = AnimationConfig::default();
        let entity = entity_for_trial(
            EntityId(0),
            &result.trials[4],
            50,
            &SceneLayout::default(),
            &animation,
        );
        let transition = entity.transition.expect("animation enabled by default");
        assert_eq!(transition.delay_ms, 4 * animation.stagger_ms);

        assert_eq!(transition.sample(Duration::ZERO), transition.from);
        assert_eq!(transition.sample(transition.total()), entity.transform);
        assert!(transition.is_settled(transition.total()));

        let mid = transition.sample(Duration::from_millis(u64::from(transition.delay_ms) + 300));
        assert!(mid.position.y <= transition.from.position.y);
        assert!(mid.position.y >= transition.to.position.y);
    }

    #[test]
    fn disabled_animation_renders_statically() {
        let result = coin_result();
        let animation = AnimationConfig {
            enabled: false,
            ..AnimationConfig::default()
        };
        let entity = entity_for_trial(
            EntityId(0),
            &result.trials[0],
            50,
            &SceneLayout::default(),
            &animation,
        );
        assert!(entity.transition.is_none());
    }

    #[test]
    fn easings_stay_in_unit_range() {
        for easing in [Easing::Linear, Easing::QuadraticOut, Easing::BounceOut] {
            assert_abs_diff_eq!(easing.apply(0.0), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(easing.apply(1.0), 1.0, epsilon = 1e-9);
            for step in 0..=100 {
                let value = easing.apply(step as f64 / 100.0);
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn color_splits_into_channels() {
        assert_eq!(Color(0x12_34_56).rgb(), (0x12, 0x34, 0x56));
    }
}
