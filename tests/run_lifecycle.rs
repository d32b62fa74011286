use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chance_lab::random::{seeded, ScriptedSource};
use chance_lab::scene::{EntityId, Shape};
use chance_lab::{
    AnimationConfig, ExperimentKind, ExperimentRunner, FrameContext, HeadlessRenderer, LabConfig,
    LabError, LabSession, RenderConfig, Renderer, RunState, ScenarioRegistry, SceneLayout,
    SceneLifecycleManager, VisualEntity,
};

/// Renderer that parks the first submission until the test releases it.
struct GatedRenderer {
    inner: HeadlessRenderer,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl Renderer for GatedRenderer {
    fn submit(&mut self, entities: &[VisualEntity]) {
        if let Some((entered, release)) = self.gate.take() {
            entered.send(()).expect("test is listening");
            release.recv().expect("test releases the run");
        }
        self.inner.submit(entities);
    }

    fn remove(&mut self, ids: &[EntityId]) {
        self.inner.remove(ids);
    }

    fn render_frame(&mut self, frame: &FrameContext) {
        self.inner.render_frame(frame);
    }
}

#[test]
fn overlapping_run_is_rejected() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let renderer = GatedRenderer {
        inner: HeadlessRenderer::new(),
        gate: Some((entered_tx, release_rx)),
    };
    let scene = SceneLifecycleManager::new(
        renderer,
        SceneLayout::default(),
        AnimationConfig::default(),
    );
    let runner = Arc::new(ExperimentRunner::new(
        ScenarioRegistry::builtin(),
        scene,
        seeded(99),
    ));

    let first = {
        let runner = Arc::clone(&runner);
        thread::spawn(move || runner.run_experiment(ExperimentKind::CoinToss))
    };

    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first run reaches the renderer");
    assert_eq!(runner.state(), RunState::Running);

    let second = runner.run_experiment(ExperimentKind::DiceToss);
    assert!(matches!(second, Err(LabError::ExperimentInProgress)));

    release_tx.send(()).unwrap();
    let stats = first.join().unwrap().expect("first run completes");
    assert_eq!(stats.total_trials, 50);
    assert_eq!(runner.state(), RunState::Idle);

    let scene = runner.scene();
    let guard = scene.lock().unwrap();
    assert_eq!(guard.len(), 50);
    assert_eq!(guard.renderer().inner.live_count(), 50);
    assert!(guard
        .entities()
        .iter()
        .all(|entity| entity.style.shape == Shape::Coin));
}

#[test]
fn every_kind_runs_back_to_back() {
    let scene = SceneLifecycleManager::new(
        HeadlessRenderer::new(),
        SceneLayout::default(),
        AnimationConfig::default(),
    );
    let runner = ExperimentRunner::new(
        ScenarioRegistry::builtin(),
        scene,
        ScriptedSource::new(vec![0.05, 0.95, 0.55]),
    );

    for kind in ExperimentKind::ALL {
        let stats = runner.run_experiment(kind).unwrap();
        let scenario = runner.registry().get_scenario(kind).unwrap();
        assert_eq!(stats.total_trials, scenario.trial_count);
        let counted: u32 = stats.per_outcome.values().map(|stat| stat.count).sum();
        assert_eq!(counted, scenario.trial_count);
    }
}

#[test]
fn session_teardown_releases_entities_and_halts_rendering() {
    let config = LabConfig {
        seed: Some(2026),
        render: RenderConfig {
            frame_interval_ms: 1,
            ..RenderConfig::default()
        },
        ..LabConfig::default()
    };
    let session = LabSession::start(&config, HeadlessRenderer::new()).unwrap();
    assert!(session.is_rendering());
    assert_eq!(session.list_scenarios().len(), 3);

    let stats = session.run_named("conditionalProbability").unwrap();
    assert_eq!(stats.total_trials, 40);

    let session_scene = session.runner().scene();
    let deadline = Instant::now() + Duration::from_secs(5);
    while session_scene.lock().unwrap().renderer().frames() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(session_scene.lock().unwrap().renderer().live_count(), 40);

    let frames = session.teardown();
    assert!(frames > 0);

    let guard = session_scene.lock().unwrap();
    assert!(guard.is_empty());
    assert_eq!(guard.renderer().live_count(), 0);
    let frames_at_teardown = guard.renderer().frames();
    drop(guard);

    thread::sleep(Duration::from_millis(10));
    assert_eq!(
        session_scene.lock().unwrap().renderer().frames(),
        frames_at_teardown
    );
}

#[test]
fn seeded_sessions_reproduce_statistics() {
    let config = LabConfig {
        seed: Some(7),
        ..LabConfig::default()
    };
    let a = LabSession::start(&config, HeadlessRenderer::new()).unwrap();
    let b = LabSession::start(&config, HeadlessRenderer::new()).unwrap();
    for kind in ExperimentKind::ALL {
        assert_eq!(a.run_experiment(kind).unwrap(), b.run_experiment(kind).unwrap());
    }
}
