//! Runs every scenario once against the headless renderer and prints the
//! resulting statistics.
//!
//! ```text
//! RUST_LOG=debug cargo run --example headless_session
//! ```

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chance_lab::{HeadlessRenderer, LabConfig, LabError, LabSession};

fn load_config() -> Result<LabConfig, LabError> {
    let local = PathBuf::from("configs").join("default.toml");
    let path = if local.exists() {
        local
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("configs")
            .join("default.toml")
    };

    if path.exists() {
        LabConfig::from_toml_file(&path)
    } else {
        Ok(LabConfig::default())
    }
}

fn main() -> Result<(), LabError> {
    env_logger::init();

    let config = load_config()?;
    let session = LabSession::start(&config, HeadlessRenderer::new())?;

    for scenario in session.list_scenarios() {
        println!(
            "{} ({:?}, {} trials)",
            scenario.title, scenario.complexity, scenario.trial_count
        );
        println!("  {}", scenario.description);

        let stats = session.run_experiment(scenario.kind)?;
        for (label, stat) in &stats.per_outcome {
            let expected = scenario.probability_of(*label) * 100.0;
            println!(
                "  {:>16}: {:>3} ({:>6.2}%, expected {expected:.2}%)",
                label.to_string(),
                stat.count,
                stat.percentage
            );
        }

        // let a few frames go by so the drop-in transitions play out
        thread::sleep(Duration::from_millis(100));
    }

    let frames = session.teardown();
    println!("Rendered {frames} frames");
    Ok(())
}
