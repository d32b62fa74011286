//! Statistics aggregator
//!
//! Turns a run's tally into counts and percentages for display.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scenario::OutcomeLabel;
use crate::sim::ExperimentResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStat {
    pub count: u32,
    /// Share of all trials, in percent, rounded to two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayStatistics {
    pub total_trials: u32,
    pub per_outcome: BTreeMap<OutcomeLabel, OutcomeStat>,
}

impl DisplayStatistics {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_trials == 0 && self.per_outcome.is_empty()
    }

    pub fn get(&self, label: OutcomeLabel) -> Option<&OutcomeStat> {
        self.per_outcome.get(&label)
    }

    pub fn percentage_sum(&self) -> f64 {
        self.per_outcome.values().map(|stat| stat.percentage).sum()
    }
}

pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn to_display_statistics(result: &ExperimentResult) -> DisplayStatistics {
    if result.total_trials == 0 {
        return DisplayStatistics::empty();
    }

    let total = f64::from(result.total_trials);
    let per_outcome = result
        .outcomes
        .iter()
        .map(|(&label, &count)| {
            let percentage = round_to_hundredths(f64::from(count) / total * 100.0);
            (label, OutcomeStat { count, percentage })
        })
        .collect();

    DisplayStatistics {
        total_trials: result.total_trials,
        per_outcome,
    }
}
