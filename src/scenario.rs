//! Scenario registry
//!
//! Static catalog of the experiments the lab can run, keyed by experiment kind.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LabError;

/// Tolerance for the expected-probability table summing to one.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-9;

/// Closed set of experiment kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExperimentKind {
    CoinToss,
    DiceToss,
    ConditionalProbability,
}

impl ExperimentKind {
    pub const ALL: [ExperimentKind; 3] = [
        ExperimentKind::CoinToss,
        ExperimentKind::DiceToss,
        ExperimentKind::ConditionalProbability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentKind::CoinToss => "coinToss",
            ExperimentKind::DiceToss => "diceToss",
            ExperimentKind::ConditionalProbability => "conditionalProbability",
        }
    }

    /// Labels a trial of this kind can produce.
    pub fn outcome_labels(&self) -> Vec<OutcomeLabel> {
        match self {
            ExperimentKind::CoinToss => vec![OutcomeLabel::Heads, OutcomeLabel::Tails],
            ExperimentKind::DiceToss => (1..=OutcomeLabel::DIE_FACES)
                .map(OutcomeLabel::Face)
                .collect(),
            ExperimentKind::ConditionalProbability => vec![
                OutcomeLabel::IndependentEvent,
                OutcomeLabel::DependentEvent,
                OutcomeLabel::NoEvent,
            ],
        }
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentKind {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExperimentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| LabError::UnknownExperimentKind(s.to_string()))
    }
}

/// Discrete result of a single trial.
///
/// Labels serialize as their display strings (`"heads"`, `"4"`,
/// `"dependentEvent"`) so they can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum OutcomeLabel {
    Heads,
    Tails,
    /// Die face, 1 through 6.
    Face(u8),
    IndependentEvent,
    DependentEvent,
    NoEvent,
}

impl OutcomeLabel {
    pub const DIE_FACES: u8 = 6;

    pub fn face(value: u8) -> Option<Self> {
        (1..=Self::DIE_FACES)
            .contains(&value)
            .then_some(OutcomeLabel::Face(value))
    }
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeLabel::Heads => f.write_str("heads"),
            OutcomeLabel::Tails => f.write_str("tails"),
            OutcomeLabel::Face(face) => write!(f, "{face}"),
            OutcomeLabel::IndependentEvent => f.write_str("independentEvent"),
            OutcomeLabel::DependentEvent => f.write_str("dependentEvent"),
            OutcomeLabel::NoEvent => f.write_str("noEvent"),
        }
    }
}

impl From<OutcomeLabel> for String {
    fn from(label: OutcomeLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for OutcomeLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "heads" => Ok(OutcomeLabel::Heads),
            "tails" => Ok(OutcomeLabel::Tails),
            "independentEvent" => Ok(OutcomeLabel::IndependentEvent),
            "dependentEvent" => Ok(OutcomeLabel::DependentEvent),
            "noEvent" => Ok(OutcomeLabel::NoEvent),
            other => other
                .parse::<u8>()
                .ok()
                .and_then(OutcomeLabel::face)
                .ok_or_else(|| format!("unknown outcome label: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Basic,
    Intermediate,
    Advanced,
}

/// Immutable description of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub kind: ExperimentKind,
    pub title: String,
    pub description: String,
    /// Outcome label to probability, summing to one.
    pub expected_probability: BTreeMap<OutcomeLabel, f64>,
    pub complexity: Complexity,
    pub trial_count: u32,
}

impl ScenarioDefinition {
    pub fn coin_toss() -> Self {
        Self {
            kind: ExperimentKind::CoinToss,
            title: "Coin Toss".to_string(),
            description: "Flip a fair coin and watch heads and tails settle around a ring."
                .to_string(),
            expected_probability: BTreeMap::from([
                (OutcomeLabel::Heads, 0.5),
                (OutcomeLabel::Tails, 0.5),
            ]),
            complexity: Complexity::Basic,
            trial_count: 50,
        }
    }

    pub fn dice_toss() -> Self {
        let sixth = 1.0 / f64::from(OutcomeLabel::DIE_FACES);
        Self {
            kind: ExperimentKind::DiceToss,
            title: "Dice Roll".to_string(),
            description: "Roll a fair six-sided die; every face is equally likely.".to_string(),
            expected_probability: (1..=OutcomeLabel::DIE_FACES)
                .map(|face| (OutcomeLabel::Face(face), sixth))
                .collect(),
            complexity: Complexity::Intermediate,
            trial_count: 60,
        }
    }

    pub fn conditional_probability() -> Self {
        Self {
            kind: ExperimentKind::ConditionalProbability,
            title: "Conditional Probability".to_string(),
            description: "An independent event fires half the time; when it misses, a \
                          dependent event may fire in its place."
                .to_string(),
            expected_probability: BTreeMap::from([
                (OutcomeLabel::IndependentEvent, 0.5),
                (OutcomeLabel::DependentEvent, 0.3),
                (OutcomeLabel::NoEvent, 0.2),
            ]),
            complexity: Complexity::Advanced,
            trial_count: 40,
        }
    }

    /// Probability listed for `label`, zero when the label is not in the table.
    pub fn probability_of(&self, label: OutcomeLabel) -> f64 {
        self.expected_probability.get(&label).copied().unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), LabError> {
        if self.trial_count == 0 {
            return Err(LabError::InvalidConfig(format!(
                "{}: trial_count must be greater than zero",
                self.kind
            )));
        }

        if self.expected_probability.is_empty() {
            return Err(LabError::InvalidConfig(format!(
                "{}: expected_probability must be non-empty",
                self.kind
            )));
        }

        let allowed = self.kind.outcome_labels();
        if let Some(label) = self
            .expected_probability
            .keys()
            .find(|label| !allowed.contains(label))
        {
            return Err(LabError::InvalidConfig(format!(
                "{}: {label} is not an outcome of this experiment",
                self.kind
            )));
        }
        if let Some(label) = allowed
            .iter()
            .find(|label| !self.expected_probability.contains_key(label))
        {
            return Err(LabError::InvalidConfig(format!(
                "{}: expected_probability is missing {label}",
                self.kind
            )));
        }

        if let Some((label, p)) = self
            .expected_probability
            .iter()
            .find(|(_, p)| !p.is_finite() || !(0.0..=1.0).contains(*p))
        {
            return Err(LabError::InvalidConfig(format!(
                "{}: probability for {label} must be in [0, 1], got {p}",
                self.kind
            )));
        }

        let sum: f64 = self.expected_probability.values().sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(LabError::InvalidConfig(format!(
                "{}: expected probabilities must sum to 1, got {sum}",
                self.kind
            )));
        }

        Ok(())
    }
}

/// Lookup table of scenario definitions.
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    scenarios: Vec<ScenarioDefinition>,
}

impl ScenarioRegistry {
    /// The three scenarios shipped with the lab.
    pub fn builtin() -> Self {
        Self {
            scenarios: vec![
                ScenarioDefinition::coin_toss(),
                ScenarioDefinition::dice_toss(),
                ScenarioDefinition::conditional_probability(),
            ],
        }
    }

    pub fn from_definitions(definitions: Vec<ScenarioDefinition>) -> Result<Self, LabError> {
        for (idx, definition) in definitions.iter().enumerate() {
            definition.validate()?;
            if definitions[..idx].iter().any(|d| d.kind == definition.kind) {
                return Err(LabError::InvalidConfig(format!(
                    "duplicate scenario definition for {}",
                    definition.kind
                )));
            }
        }

        Ok(Self {
            scenarios: definitions,
        })
    }

    pub fn get_scenario(&self, kind: ExperimentKind) -> Result<&ScenarioDefinition, LabError> {
        self.scenarios
            .iter()
            .find(|scenario| scenario.kind == kind)
            .ok_or_else(|| LabError::UnknownExperimentKind(kind.to_string()))
    }

    pub fn get_scenario_by_name(&self, name: &str) -> Result<&ScenarioDefinition, LabError> {
        self.get_scenario(name.parse()?)
    }

    pub fn list_scenarios(&self) -> &[ScenarioDefinition] {
        &self.scenarios
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
