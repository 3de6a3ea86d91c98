use indexmap::IndexMap;
use std::fmt::Display;
use strum::Display as StrumDisplay;
use tracing::{debug, warn};

/// This module provides the per-unit record of recurring numerical warnings. The first
/// occurrence of each kind is logged prominently, later ones are only counted, and a
/// summary of the counts is logged when the run finishes.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum WarningKind {
    CyclingIterationLimit,
    CyclingBracketFailure,
    SpeedRatioIterationLimit,
    SpeedRatioBracketFailure,
    HotWaterFlowIterationLimit,
    HotWaterFlowBracketFailure,
    OutletTemperatureIterationLimit,
    OutletTemperatureBracketFailure,
    SpeedOverrideAboveMaximum,
    UnavailableDuringCall,
}

#[derive(Clone, Debug)]
pub struct Diagnostics {
    unit: String,
    occurrences: IndexMap<WarningKind, usize>,
    warmup: bool,
}

impl Diagnostics {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_owned(),
            occurrences: Default::default(),
            warmup: false,
        }
    }

    /// Warnings raised while warming up are neither logged nor counted.
    pub fn set_warmup(&mut self, warmup: bool) {
        self.warmup = warmup;
    }

    pub fn is_warmup(&self) -> bool {
        self.warmup
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl Display) {
        if self.warmup {
            return;
        }
        let count = self.occurrences.entry(kind).or_insert(0);
        *count += 1;
        if *count == 1 {
            warn!(unit = %self.unit, %kind, "{message}");
        } else {
            debug!(unit = %self.unit, %kind, occurrence = *count, "{message}");
        }
    }

    pub fn occurrences(&self, kind: WarningKind) -> usize {
        self.occurrences.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_occurrences(&self) -> usize {
        self.occurrences.values().sum()
    }

    /// Log one line per warning kind that recurred during the run.
    pub fn summarise(&self) {
        for (kind, count) in self.occurrences.iter().filter(|(_, count)| **count > 1) {
            warn!(unit = %self.unit, %kind, "warning continued; {count} occurrences in total");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn diagnostics() -> Diagnostics {
        Diagnostics::new("heat pump 1")
    }

    #[rstest]
    fn should_count_recurring_warnings(mut diagnostics: Diagnostics) {
        diagnostics.warn(WarningKind::CyclingIterationLimit, "iteration limit");
        diagnostics.warn(WarningKind::CyclingIterationLimit, "iteration limit");
        diagnostics.warn(WarningKind::SpeedRatioIterationLimit, "iteration limit");

        assert_eq!(diagnostics.occurrences(WarningKind::CyclingIterationLimit), 2);
        assert_eq!(diagnostics.occurrences(WarningKind::SpeedRatioIterationLimit), 1);
        assert_eq!(diagnostics.occurrences(WarningKind::HotWaterFlowBracketFailure), 0);
        assert_eq!(diagnostics.total_occurrences(), 3);
    }

    #[rstest]
    fn should_ignore_warnings_during_warmup(mut diagnostics: Diagnostics) {
        diagnostics.set_warmup(true);
        diagnostics.warn(WarningKind::CyclingBracketFailure, "bracket failure");

        assert_eq!(diagnostics.total_occurrences(), 0);
    }

    #[rstest]
    fn should_name_warning_kinds() {
        assert_eq!(
            WarningKind::HotWaterFlowIterationLimit.to_string(),
            "hot_water_flow_iteration_limit"
        );
    }
}
