//! Lab session
//!
//! Entry point for a UI shell: list the scenarios, run one, and tear the
//! whole thing down. Owns the experiment runner and the render loop.

use std::sync::Arc;

use log::info;

use crate::config::LabConfig;
use crate::render_loop::RenderLoop;
use crate::runner::ExperimentRunner;
use crate::scenario::{ExperimentKind, ScenarioDefinition};
use crate::scene::Renderer;
use crate::stats::DisplayStatistics;
use crate::LabError;

pub struct LabSession<R: Renderer + Send + 'static> {
    runner: Arc<ExperimentRunner<R>>,
    render_loop: Option<RenderLoop>,
}

impl<R: Renderer + Send + 'static> LabSession<R> {
    /// Validate `config`, build the runner and start rendering.
    pub fn start(config: &LabConfig, renderer: R) -> Result<Self, LabError> {
        config.validate()?;
        let runner = ExperimentRunner::from_config(config, renderer);
        Self::with_runner(runner, config)
    }

    /// Start rendering for a runner built by the caller.
    pub fn with_runner(runner: ExperimentRunner<R>, config: &LabConfig) -> Result<Self, LabError> {
        let render_loop = RenderLoop::spawn(runner.scene(), &config.render)?;
        info!("lab session started");
        Ok(Self {
            runner: Arc::new(runner),
            render_loop: Some(render_loop),
        })
    }

    pub fn list_scenarios(&self) -> &[ScenarioDefinition] {
        self.runner.list_scenarios()
    }

    pub fn run_experiment(&self, kind: ExperimentKind) -> Result<DisplayStatistics, LabError> {
        self.runner.run_experiment(kind)
    }

    pub fn run_named(&self, name: &str) -> Result<DisplayStatistics, LabError> {
        self.runner.run_named(name)
    }

    /// Shared runner, for callers that trigger runs from other threads.
    pub fn runner(&self) -> &Arc<ExperimentRunner<R>> {
        &self.runner
    }

    pub fn is_rendering(&self) -> bool {
        self.render_loop
            .as_ref()
            .is_some_and(RenderLoop::is_running)
    }

    /// Stop the render loop and release every entity. Returns frames rendered.
    pub fn teardown(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        let Some(render_loop) = self.render_loop.take() else {
            return 0;
        };
        let frames = render_loop.shutdown();
        self.runner.teardown();
        info!("lab session torn down after {frames} frames");
        frames
    }
}

impl<R: Renderer + Send + 'static> Drop for LabSession<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
