//! Lab configuration
//!
//! Scene layout, drop-in animation and render loop settings, loaded from TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scene::Easing;
use crate::LabError;

/// Top-level lab configuration, usually read from `configs/default.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Fixed RNG seed; runs draw from OS entropy when unset.
    pub seed: Option<u64>,
    pub layout: SceneLayout,
    pub animation: AnimationConfig,
    pub render: RenderConfig,
}

/// Where trial entities are placed in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneLayout {
    pub coin_ring_radius: f64,
    pub coin_height: f64,
    pub dice_columns: usize,
    pub dice_spacing: f64,
    pub orb_ring_radius: f64,
    pub orb_height: f64,
    pub dependent_lift: f64,
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self {
            coin_ring_radius: 6.0,
            coin_height: 0.5,
            dice_columns: 10,
            dice_spacing: 1.4,
            orb_ring_radius: 7.0,
            orb_height: 0.6,
            dependent_lift: 2.5,
        }
    }
}

/// Drop-in transition attached to every materialized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub enabled: bool,
    pub drop_height: f64,
    pub duration_ms: u32,
    pub stagger_ms: u32,
    pub easing: Easing,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            drop_height: 8.0,
            duration_ms: 900,
            stagger_ms: 25,
            easing: Easing::BounceOut,
        }
    }
}

/// Render loop pacing and orbit camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub frame_interval_ms: u64,
    pub camera_radius: f64,
    pub camera_height: f64,
    /// Auto-orbit speed [rad/s]
    pub orbit_speed: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            camera_radius: 18.0,
            camera_height: 12.0,
            orbit_speed: 0.15,
        }
    }
}

impl RenderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl LabConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, LabError> {
        let config: LabConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, LabError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), LabError> {
        let layout = &self.layout;
        let lengths = [
            ("coin_ring_radius", layout.coin_ring_radius),
            ("dice_spacing", layout.dice_spacing),
            ("orb_ring_radius", layout.orb_ring_radius),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value <= 0.0 {
                return Err(LabError::InvalidConfig(format!("{name} must be > 0")));
            }
        }

        if !layout.coin_height.is_finite()
            || !layout.orb_height.is_finite()
            || !layout.dependent_lift.is_finite()
        {
            return Err(LabError::InvalidConfig(
                "coin_height, orb_height and dependent_lift must be finite".to_string(),
            ));
        }

        if layout.dice_columns == 0 {
            return Err(LabError::InvalidConfig(
                "dice_columns must be > 0".to_string(),
            ));
        }

        if !self.animation.drop_height.is_finite() || self.animation.drop_height < 0.0 {
            return Err(LabError::InvalidConfig(
                "drop_height must be finite and >= 0".to_string(),
            ));
        }

        if self.animation.enabled && self.animation.duration_ms == 0 {
            return Err(LabError::InvalidConfig(
                "duration_ms must be > 0 when animation is enabled".to_string(),
            ));
        }

        if self.render.frame_interval_ms == 0 {
            return Err(LabError::InvalidConfig(
                "frame_interval_ms must be > 0".to_string(),
            ));
        }

        if !self.render.camera_radius.is_finite() || self.render.camera_radius <= 0.0 {
            return Err(LabError::InvalidConfig(
                "camera_radius must be > 0".to_string(),
            ));
        }

        if !self.render.camera_height.is_finite() || !self.render.orbit_speed.is_finite() {
            return Err(LabError::InvalidConfig(
                "camera_height and orbit_speed must be finite".to_string(),
            ));
        }

        Ok(())
    }
}
