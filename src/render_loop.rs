//! Per-frame render loop
//!
//! A background thread advances the orbit camera and asks the scene to draw
//! whatever it currently owns, then sleeps until the next frame. The thread is
//! only stopped at teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};
use nalgebra::Point3;

use crate::config::RenderConfig;
use crate::scene::{Renderer, SceneLifecycleManager};
use crate::{lock, LabError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub eye: Point3<f64>,
    pub target: Point3<f64>,
}

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub frame: u64,
    /// Time since the loop started.
    pub elapsed: Duration,
    pub camera: CameraPose,
}

/// Camera controls: a slow auto-orbit around the scene centre.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub radius: f64,
    pub height: f64,
    pub azimuth: f64,
    pub angular_speed: f64,
}

impl OrbitCamera {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            radius: config.camera_radius,
            height: config.camera_height,
            azimuth: 0.0,
            angular_speed: config.orbit_speed,
        }
    }

    pub fn advance(&mut self, dt: Duration) {
        self.azimuth = (self.azimuth + self.angular_speed * dt.as_secs_f64())
            .rem_euclid(std::f64::consts::TAU);
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            eye: Point3::new(
                self.radius * self.azimuth.cos(),
                self.height,
                self.radius * self.azimuth.sin(),
            ),
            target: Point3::origin(),
        }
    }
}

/// Frame counter and camera state, advanced once per tick.
#[derive(Debug, Clone)]
pub struct FrameClock {
    camera: OrbitCamera,
    frame: u64,
    elapsed: Duration,
}

impl FrameClock {
    pub fn new(camera: OrbitCamera) -> Self {
        Self {
            camera,
            frame: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Advance by `dt` and draw one frame of `scene`.
    pub fn tick<R: Renderer>(&mut self, scene: &mut SceneLifecycleManager<R>, dt: Duration) {
        self.camera.advance(dt);
        self.elapsed += dt;
        let context = FrameContext {
            frame: self.frame,
            elapsed: self.elapsed,
            camera: self.camera.pose(),
        };
        scene.render_frame(&context);
        self.frame += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }
}

/// Handle to the background render thread.
pub struct RenderLoop {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl RenderLoop {
    pub fn spawn<R>(
        scene: Arc<Mutex<SceneLifecycleManager<R>>>,
        config: &RenderConfig,
    ) -> Result<Self, LabError>
    where
        R: Renderer + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let interval = config.frame_interval();
        let mut clock = FrameClock::new(OrbitCamera::from_config(config));

        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("chance-lab-render".to_string())
            .spawn(move || {
                let mut last = Instant::now();
                while !thread_stop.load(Ordering::Acquire) {
                    let started = Instant::now();
                    let dt = started.duration_since(last);
                    last = started;

                    clock.tick(&mut lock(&scene), dt);

                    // the only suspension point in the frame
                    thread::sleep(interval.saturating_sub(started.elapsed()));
                }
                clock.frames()
            })?;

        debug!("render loop started ({} ms per frame)", interval.as_millis());
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop scheduling frames and wait for the thread. Returns frames rendered.
    pub fn shutdown(mut self) -> u64 {
        self.halt()
    }

    fn halt(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return 0;
        };

        match handle.join() {
            Ok(frames) => {
                debug!("render loop stopped after {frames} frames");
                frames
            }
            Err(_) => {
                warn!("render thread panicked before shutdown");
                0
            }
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.halt();
    }
}
