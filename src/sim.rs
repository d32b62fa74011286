//! Experiment simulator
//!
//! Draws the trials of one experiment and tallies their outcomes. Every call
//! starts from a fresh tally; the only side effect is consuming randomness.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::random::RandomSource;
use crate::scenario::{ExperimentKind, OutcomeLabel, ScenarioDefinition, ScenarioRegistry};
use crate::LabError;

/// Kind-specific data carried by a trial for visual placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrialAttributes {
    /// `draw` is the uniform value that decided the flip.
    Coin { draw: f64 },
    /// `draw` is the uniform value that decided the face.
    Die { draw: f64 },
    /// `dependent_branch` is set when the independent event missed and the
    /// trial went on to test the dependent event.
    Conditional { gate: f64, dependent_branch: bool },
}

/// One simulated draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialOutcome {
    pub index: usize,
    pub label: OutcomeLabel,
    pub attributes: TrialAttributes,
}

/// Tally and per-trial record of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentResult {
    pub kind: ExperimentKind,
    pub total_trials: u32,
    /// Every label from the scenario's table, including unobserved ones.
    pub outcomes: BTreeMap<OutcomeLabel, u32>,
    /// Trials in draw order.
    pub trials: Vec<TrialOutcome>,
}

impl ExperimentResult {
    /// Result carrying only a tally, with no per-trial record.
    pub fn from_tally(kind: ExperimentKind, outcomes: BTreeMap<OutcomeLabel, u32>) -> Self {
        Self {
            kind,
            total_trials: outcomes.values().sum(),
            outcomes,
            trials: Vec::new(),
        }
    }

    pub fn count(&self, label: OutcomeLabel) -> u32 {
        self.outcomes.get(&label).copied().unwrap_or(0)
    }

    pub fn tally_total(&self) -> u32 {
        self.outcomes.values().sum()
    }
}

/// Run the trials of `kind` as described by the registry.
pub fn simulate<R>(
    registry: &ScenarioRegistry,
    kind: ExperimentKind,
    rng: &mut R,
) -> Result<ExperimentResult, LabError>
where
    R: RandomSource + ?Sized,
{
    let scenario = registry.get_scenario(kind)?;
    Ok(simulate_scenario(scenario, rng))
}

/// Run the trials of an already resolved scenario.
pub fn simulate_scenario<R>(scenario: &ScenarioDefinition, rng: &mut R) -> ExperimentResult
where
    R: RandomSource + ?Sized,
{
    let mut outcomes: BTreeMap<OutcomeLabel, u32> = scenario
        .expected_probability
        .keys()
        .map(|&label| (label, 0))
        .collect();
    let mut trials = Vec::with_capacity(scenario.trial_count as usize);

    for index in 0..scenario.trial_count as usize {
        let (label, attributes) = match scenario.kind {
            ExperimentKind::CoinToss => toss_coin(scenario, rng),
            ExperimentKind::DiceToss => roll_die(scenario, rng),
            ExperimentKind::ConditionalProbability => draw_conditional(scenario, rng),
        };

        *outcomes.entry(label).or_insert(0) += 1;
        trials.push(TrialOutcome {
            index,
            label,
            attributes,
        });
    }

    ExperimentResult {
        kind: scenario.kind,
        total_trials: scenario.trial_count,
        outcomes,
        trials,
    }
}

fn toss_coin<R>(scenario: &ScenarioDefinition, rng: &mut R) -> (OutcomeLabel, TrialAttributes)
where
    R: RandomSource + ?Sized,
{
    let draw = rng.next_unit();
    let label = if draw < scenario.probability_of(OutcomeLabel::Heads) {
        OutcomeLabel::Heads
    } else {
        OutcomeLabel::Tails
    };
    (label, TrialAttributes::Coin { draw })
}

/// Walks the cumulative face table; a draw past the last bucket lands on the
/// top face.
fn roll_die<R>(scenario: &ScenarioDefinition, rng: &mut R) -> (OutcomeLabel, TrialAttributes)
where
    R: RandomSource + ?Sized,
{
    let draw = rng.next_unit();
    let mut cumulative = 0.0;
    let mut face = OutcomeLabel::DIE_FACES;
    for candidate in 1..=OutcomeLabel::DIE_FACES {
        cumulative += scenario.probability_of(OutcomeLabel::Face(candidate));
        if draw < cumulative {
            face = candidate;
            break;
        }
    }
    (OutcomeLabel::Face(face), TrialAttributes::Die { draw })
}

/// The dependent event is only tested when the independent event misses.
/// Its conditional probability is chosen so the marginal frequencies match
/// the scenario table: P(dep | miss) = P(dep) / (1 - P(indep)).
fn draw_conditional<R>(
    scenario: &ScenarioDefinition,
    rng: &mut R,
) -> (OutcomeLabel, TrialAttributes)
where
    R: RandomSource + ?Sized,
{
    let p_independent = scenario.probability_of(OutcomeLabel::IndependentEvent);
    let p_dependent = scenario.probability_of(OutcomeLabel::DependentEvent);

    let gate = rng.next_unit();
    if gate < p_independent {
        return (
            OutcomeLabel::IndependentEvent,
            TrialAttributes::Conditional {
                gate,
                dependent_branch: false,
            },
        );
    }

    let miss_mass = 1.0 - p_independent;
    let p_given_miss = if miss_mass > 0.0 {
        (p_dependent / miss_mass).min(1.0)
    } else {
        0.0
    };
    let label = if rng.next_unit() < p_given_miss {
        OutcomeLabel::DependentEvent
    } else {
        OutcomeLabel::NoEvent
    };

    (
        label,
        TrialAttributes::Conditional {
            gate,
            dependent_branch: true,
        },
    )
}
