use crate::core::hvac::device::TrialOperatingPoint;
use crate::core::hvac::{FanOperation, HeatCoolMode};
use serde::Deserialize;

/// Air flow a continuously running fan supplies while the compressor is off.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum OffCycleFlow {
    /// The speed 1 flow of the last mode the unit ran in
    #[default]
    UseCompressorOnFlow,
    /// The unit's configured no-load flow
    UseCompressorOffFlow,
}

/// Supply air flows of a unit, in kg/s.
#[derive(Clone, Debug, PartialEq)]
pub struct AirFlowRates {
    /// Flow while the compressor runs, per cooling speed (lowest first)
    pub cooling: Vec<f64>,
    /// Flow while the compressor runs, per heating speed (lowest first)
    pub heating: Vec<f64>,
    /// Flow while neither heating nor cooling
    pub idle: f64,
    pub off_cycle_flow: OffCycleFlow,
    pub fan_operation: FanOperation,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AverageAirFlow {
    /// Flow while the compressor is on, in kg/s
    pub on_cycle: f64,
    /// Flow while the compressor is off, in kg/s
    pub off_cycle: f64,
    /// Timestep average, in kg/s
    pub average: f64,
    /// Ratio of the on-cycle flow to the average flow
    pub on_off_ratio: f64,
}

impl AirFlowRates {
    fn speeds_for(&self, mode: HeatCoolMode) -> &[f64] {
        match mode {
            HeatCoolMode::Cooling => &self.cooling,
            HeatCoolMode::Heating => &self.heating,
            HeatCoolMode::Off => &[],
        }
    }

    /// Flow while the compressor runs at a speed, blending with the speed below by `ratio`
    pub fn on_cycle_flow(&self, mode: HeatCoolMode, speed: usize, speed_ratio: f64) -> f64 {
        let flows = self.speeds_for(mode);
        if flows.is_empty() || speed == 0 {
            return self.idle;
        }
        let speed = speed.min(flows.len());
        if speed == 1 {
            flows[0]
        } else {
            speed_ratio * flows[speed - 1] + (1. - speed_ratio) * flows[speed - 2]
        }
    }

    /// Flow while the compressor is off; `last_mode` is the last mode the unit ran in
    pub fn off_cycle_flow(&self, last_mode: HeatCoolMode) -> f64 {
        match (self.fan_operation, self.off_cycle_flow) {
            (FanOperation::Cycling, _) => 0.,
            (FanOperation::Continuous, OffCycleFlow::UseCompressorOffFlow) => self.idle,
            (FanOperation::Continuous, OffCycleFlow::UseCompressorOnFlow) => {
                self.speeds_for(last_mode).first().copied().unwrap_or(self.idle)
            }
        }
    }

    /// Average supply air flow over a timestep.
    ///
    /// Arguments:
    /// * `mode` - mode the unit runs in this timestep
    /// * `last_mode` - last heating or cooling mode the unit ran in
    /// * `trial` - operating point of the compressor
    /// * `available` - whether the unit is scheduled on
    pub fn average(
        &self,
        mode: HeatCoolMode,
        last_mode: HeatCoolMode,
        trial: TrialOperatingPoint,
        available: bool,
    ) -> AverageAirFlow {
        if !available {
            return Default::default();
        }

        let on_cycle = match trial {
            TrialOperatingPoint::Off => self.speeds_for(mode).first().copied().unwrap_or(self.idle),
            _ => self.on_cycle_flow(mode, trial.speed_number(), trial.speed_ratio()),
        };
        let off_cycle = self.off_cycle_flow(last_mode);
        let average = if trial.speed_number() > 1 {
            on_cycle
        } else {
            let part_load_fraction = trial.part_load_fraction();
            part_load_fraction * on_cycle + (1. - part_load_fraction) * off_cycle
        };
        let on_off_ratio = if average > 0. { on_cycle / average } else { 0. };

        AverageAirFlow {
            on_cycle,
            off_cycle,
            average,
            on_off_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn flows() -> AirFlowRates {
        AirFlowRates {
            cooling: vec![0.4, 0.6, 0.8],
            heating: vec![0.3, 0.5],
            idle: 0.2,
            off_cycle_flow: OffCycleFlow::UseCompressorOnFlow,
            fan_operation: FanOperation::Cycling,
        }
    }

    #[rstest]
    fn should_interpolate_on_cycle_flow_between_speeds(flows: AirFlowRates) {
        assert_relative_eq!(flows.on_cycle_flow(HeatCoolMode::Cooling, 3, 0.25), 0.65);
        assert_eq!(flows.on_cycle_flow(HeatCoolMode::Heating, 1, 0.), 0.3);
        assert_eq!(flows.on_cycle_flow(HeatCoolMode::Off, 2, 0.5), 0.2);
    }

    #[rstest]
    fn should_average_cycling_flow_with_fan_off(flows: AirFlowRates) {
        let average = flows.average(
            HeatCoolMode::Cooling,
            HeatCoolMode::Cooling,
            TrialOperatingPoint::cycling(0.5),
            true,
        );

        assert_eq!(average.on_cycle, 0.4);
        assert_eq!(average.off_cycle, 0.);
        assert_relative_eq!(average.average, 0.2);
        assert_relative_eq!(average.on_off_ratio, 2.);
    }

    #[rstest]
    fn should_use_last_mode_speed_one_flow_when_fan_runs_on(mut flows: AirFlowRates) {
        flows.fan_operation = FanOperation::Continuous;
        let average = flows.average(
            HeatCoolMode::Off,
            HeatCoolMode::Heating,
            TrialOperatingPoint::Off,
            true,
        );

        assert_eq!(average.off_cycle, 0.3);
        assert_eq!(average.average, 0.3);
    }

    #[rstest]
    fn should_use_idle_flow_when_configured(mut flows: AirFlowRates) {
        flows.fan_operation = FanOperation::Continuous;
        flows.off_cycle_flow = OffCycleFlow::UseCompressorOffFlow;
        let average = flows.average(
            HeatCoolMode::Cooling,
            HeatCoolMode::Cooling,
            TrialOperatingPoint::cycling(0.25),
            true,
        );

        assert_relative_eq!(average.average, 0.25 * 0.4 + 0.75 * 0.2);
    }

    #[rstest]
    fn should_use_on_cycle_flow_above_speed_one(flows: AirFlowRates) {
        let average = flows.average(
            HeatCoolMode::Cooling,
            HeatCoolMode::Cooling,
            TrialOperatingPoint::interpolating(2, 0.5),
            true,
        );

        assert_relative_eq!(average.average, 0.5);
        assert_relative_eq!(average.on_off_ratio, 1.);
    }

    #[rstest]
    fn should_have_no_flow_when_unavailable(flows: AirFlowRates) {
        let average = flows.average(
            HeatCoolMode::Cooling,
            HeatCoolMode::Cooling,
            TrialOperatingPoint::full_at_speed(3),
            false,
        );

        assert_eq!(average, AverageAirFlow::default());
    }

    #[rstest]
    fn should_give_zero_ratio_without_flow(flows: AirFlowRates) {
        let average = flows.average(
            HeatCoolMode::Cooling,
            HeatCoolMode::Cooling,
            TrialOperatingPoint::Off,
            true,
        );

        assert_eq!(average.average, 0.);
        assert_eq!(average.on_off_ratio, 0.);
    }
}
