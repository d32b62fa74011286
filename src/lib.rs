//! Chance Lab - randomized probability experiments as scene objects
//!
//! Runs coin toss, dice roll and conditional-event experiments, tallies the
//! outcomes into display statistics, and maps every simulated trial onto a
//! transient visual entity owned by a scene lifecycle manager.

pub mod config;
pub mod headless;
pub mod random;
pub mod render_loop;
pub mod runner;
pub mod scenario;
pub mod scene;
pub mod session;
pub mod sim;
pub mod stats;

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

// Re-export main types
pub use config::{AnimationConfig, LabConfig, RenderConfig, SceneLayout};
pub use headless::HeadlessRenderer;
pub use random::{RandomSource, ScriptedSource};
pub use render_loop::{FrameContext, RenderLoop};
pub use runner::{ExperimentRunner, RunState};
pub use scenario::{ExperimentKind, OutcomeLabel, ScenarioDefinition, ScenarioRegistry};
pub use scene::{Renderer, SceneLifecycleManager, VisualEntity};
pub use session::LabSession;
pub use sim::{simulate, ExperimentResult, TrialOutcome};
pub use stats::{to_display_statistics, DisplayStatistics};

#[derive(Debug, Error)]
pub enum LabError {
    #[error("unknown experiment kind: {0}")]
    UnknownExperimentKind(String),
    #[error("scene still owns {owned} entities; clear() must run before materialize()")]
    SceneNotCleared { owned: usize },
    #[error("an experiment run is already in progress")]
    ExperimentInProgress,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
