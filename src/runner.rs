//! Experiment run state machine
//!
//! `Idle -> Running -> Idle`. A run resets the published statistics, clears
//! the scene, simulates, materializes and publishes the new statistics while
//! holding the scene lock, so no frame ever shows a half-built run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::config::LabConfig;
use crate::random::{self, RandomSource};
use crate::scenario::{ExperimentKind, ScenarioDefinition, ScenarioRegistry};
use crate::scene::{Renderer, SceneLifecycleManager};
use crate::sim::simulate;
use crate::stats::{to_display_statistics, DisplayStatistics};
use crate::{lock, LabError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Marks a run as in flight for as long as it lives.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ExperimentRunner<R> {
    registry: ScenarioRegistry,
    rng: Mutex<Box<dyn RandomSource + Send>>,
    scene: Arc<Mutex<SceneLifecycleManager<R>>>,
    statistics: Mutex<DisplayStatistics>,
    in_flight: AtomicBool,
}

impl<R: Renderer> ExperimentRunner<R> {
    pub fn new<S>(registry: ScenarioRegistry, scene: SceneLifecycleManager<R>, rng: S) -> Self
    where
        S: RandomSource + Send + 'static,
    {
        Self {
            registry,
            rng: Mutex::new(Box::new(rng)),
            scene: Arc::new(Mutex::new(scene)),
            statistics: Mutex::new(DisplayStatistics::empty()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Builtin scenarios, scene layout from `config`, and a seeded generator
    /// when the config carries a seed.
    pub fn from_config(config: &LabConfig, renderer: R) -> Self {
        let scene =
            SceneLifecycleManager::new(renderer, config.layout.clone(), config.animation.clone());
        let registry = ScenarioRegistry::builtin();
        match config.seed {
            Some(seed) => Self::new(registry, scene, random::seeded(seed)),
            None => Self::new(registry, scene, random::from_entropy()),
        }
    }

    pub fn list_scenarios(&self) -> &[ScenarioDefinition] {
        self.registry.list_scenarios()
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Run one experiment end to end and publish its statistics.
    ///
    /// Fails with `ExperimentInProgress` while another run is in flight; the
    /// rejected call leaves scene and statistics untouched. Any other failure
    /// leaves the scene cleared and the statistics empty.
    pub fn run_experiment(&self, kind: ExperimentKind) -> Result<DisplayStatistics, LabError> {
        let Some(_guard) = RunGuard::acquire(&self.in_flight) else {
            warn!("rejected {kind} run: another run is in progress");
            return Err(LabError::ExperimentInProgress);
        };

        info!("starting {kind} run");
        *lock(&self.statistics) = DisplayStatistics::empty();

        let mut scene = lock(&self.scene);
        scene.clear();

        let result = {
            let mut rng = lock(&self.rng);
            simulate(&self.registry, kind, &mut **rng)?
        };

        if let Err(err) = scene.materialize(&result) {
            scene.clear();
            return Err(err);
        }

        let stats = to_display_statistics(&result);
        *lock(&self.statistics) = stats.clone();
        info!(
            "{kind} run complete: {} trials, {} entities",
            stats.total_trials,
            scene.len()
        );
        Ok(stats)
    }

    /// Run an experiment selected by name, e.g. `"coinToss"`.
    ///
    /// A name that is not an experiment kind is rejected before the run
    /// starts, leaving scene and statistics as they were. A valid kind the
    /// registry lacks fails inside the run like `run_experiment` does.
    pub fn run_named(&self, name: &str) -> Result<DisplayStatistics, LabError> {
        self.run_experiment(name.parse()?)
    }

    pub fn state(&self) -> RunState {
        if self.in_flight.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Statistics published by the last run.
    pub fn statistics(&self) -> DisplayStatistics {
        lock(&self.statistics).clone()
    }

    /// Shared handle to the scene, for the render loop.
    pub fn scene(&self) -> Arc<Mutex<SceneLifecycleManager<R>>> {
        Arc::clone(&self.scene)
    }

    /// Release every owned entity and reset the statistics.
    pub fn teardown(&self) {
        lock(&self.scene).teardown();
        *lock(&self.statistics) = DisplayStatistics::empty();
    }
}
