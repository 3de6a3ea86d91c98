use crate::core::hvac::SMALL_LOAD;
use crate::core::material_properties::MaterialProperties;
use serde::Deserialize;
use std::sync::LazyLock;
use strum::Display as StrumDisplay;

/// This module provides the operating-mode state machines of the unit controllers: the
/// dwell timer that pins a mode once it has changed, and the mode selection rules of the
/// integrated heat pump.

/// Holds a newly chosen mode for a minimum time, so that a unit cannot toggle between modes
/// on successive iterations.
#[derive(Clone, Debug, PartialEq)]
pub struct ModeDwellTimer {
    min_mode_change_time: f64,
    change_over_time: Option<f64>,
    last_day: Option<u32>,
}

impl ModeDwellTimer {
    /// Arguments:
    /// * `min_mode_change_time` - minimum time a mode is held after it changes, in hours
    ///                            (zero disables the timer)
    pub fn new(min_mode_change_time: f64) -> Self {
        Self {
            min_mode_change_time,
            change_over_time: None,
            last_day: None,
        }
    }

    /// Whether a mode chosen before `now` (hours) must still be held.
    pub fn is_locked(&self, now: f64) -> bool {
        self.min_mode_change_time > 0.
            && self
                .change_over_time
                .is_some_and(|change_over_time| now <= change_over_time)
    }

    pub fn start(&mut self, now: f64) {
        self.change_over_time = Some(now + self.min_mode_change_time);
    }

    /// During warm-up the same day is simulated repeatedly, so the timer is cleared whenever
    /// a new warm-up day starts.
    pub fn reset_on_new_warmup_day(&mut self, warmup: bool, day: u32) {
        if warmup && self.last_day != Some(day) {
            self.change_over_time = None;
        }
        self.last_day = Some(day);
    }
}

/// A mode together with the dwell timer guarding it.
#[derive(Clone, Debug)]
pub struct ModeStateMachine<M> {
    timer: ModeDwellTimer,
    current: M,
    previous: M,
}

impl<M: Copy + PartialEq> ModeStateMachine<M> {
    pub fn new(initial: M, min_mode_change_time: f64) -> Self {
        Self {
            timer: ModeDwellTimer::new(min_mode_change_time),
            current: initial,
            previous: initial,
        }
    }

    pub fn current(&self) -> M {
        self.current
    }

    /// The mode in force before the latest change
    pub fn previous(&self) -> M {
        self.previous
    }

    pub fn timer(&self) -> &ModeDwellTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut ModeDwellTimer {
        &mut self.timer
    }

    /// Re-evaluate the mode at time `now` (hours). While the dwell timer is running the
    /// current mode is kept and `evaluate` is not called.
    pub fn update(&mut self, now: f64, evaluate: impl FnOnce() -> M) -> M {
        if self.timer.is_locked(now) {
            return self.current;
        }
        let candidate = evaluate();
        if candidate != self.current {
            self.previous = self.current;
            self.current = candidate;
            self.timer.start(now);
        }
        self.current
    }
}

/// Operating modes of an integrated air-source heat pump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, StrumDisplay)]
pub enum IhpOperationMode {
    #[default]
    Idle,
    SpaceClg,
    SpaceHtg,
    DedicatedWaterHtg,
    /// Simultaneous cooling and water heating, with the speed chosen to match the cooling load
    ScwhMatchSc,
    /// Simultaneous cooling and water heating, with the speed chosen to match water heating
    ScwhMatchWh,
    /// Space cooling with a small amount of dedicated water heating
    SpaceClgDedicatedWaterHtg,
    ShdwhElecHeatOff,
    ShdwhElecHeatOn,
}

impl IhpOperationMode {
    pub fn heats_water(&self) -> bool {
        !matches!(self, Self::Idle | Self::SpaceClg | Self::SpaceHtg)
    }
}

/// Which service sets the speed when cooling and water heating run together.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum WaterHeatingMatch {
    #[default]
    MatchSpaceCooling,
    MatchWaterHeating,
}

/// Water at the temperature of the accumulated tank draw
static DRAW_WATER: LazyLock<MaterialProperties> =
    LazyLock::new(|| MaterialProperties::new(983.0, 4184.0));

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IhpModeThresholds {
    /// Indoor temperature above which overcooling the space is allowed, in degC
    pub indoor_over_cool_allow: f64,
    /// Ambient temperature above which overcooling the space is allowed, in degC
    pub ambient_over_cool_allow: f64,
    /// Indoor temperature above which water heating takes priority, in degC
    pub indoor_water_heating_high_priority: f64,
    /// Ambient temperature above which water heating takes priority, in degC
    pub ambient_water_heating_high_priority: f64,
    /// Largest water volume heated in the small water heating mode, in m3
    pub water_volume_scdwh: f64,
    /// Time after which space and water heating brings in the electric heater, in seconds
    pub time_limit_shdwh: f64,
    pub match_scwh: WaterHeatingMatch,
}

/// Counters carried between timesteps by the integrated heat pump mode selection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IhpModeCounters {
    /// Time spent in combined space and water heating, in seconds
    pub shdwh_run_time: f64,
    /// Water volume heated in the small water heating mode so far, in m3
    pub water_flow_accumulated_volume: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IhpModeInputs {
    /// Sensible load on the zone, in W
    pub sensible_load: f64,
    /// Latent load on the zone, in W
    pub latent_load: f64,
    pub water_heating_call: bool,
    pub indoor_temperature: f64,
    pub outdoor_temperature: f64,
    /// Water flow through the tank side of the heat pump last timestep, in kg/s
    pub tank_mass_flow_rate: f64,
    /// Length of the timestep, in seconds
    pub timestep_seconds: f64,
}

/// Choose the operating mode of an integrated heat pump for the coming timestep.
///
/// Arguments:
/// * `thresholds` - temperature, volume and time thresholds from the unit configuration
/// * `counters` - run time and volume counters, reset and updated by this call
/// * `current` - mode in force during the previous timestep
/// * `inputs` - loads and conditions for the coming timestep
pub fn decide_work_mode(
    thresholds: &IhpModeThresholds,
    counters: &mut IhpModeCounters,
    current: IhpOperationMode,
    inputs: &IhpModeInputs,
) -> IhpOperationMode {
    let saved_run_time = counters.shdwh_run_time;
    let saved_volume = if current == IhpOperationMode::SpaceClgDedicatedWaterHtg {
        counters.water_flow_accumulated_volume
            + DRAW_WATER.volume_flow_rate(inputs.tank_mass_flow_rate) * inputs.timestep_seconds
    } else {
        0.
    };
    *counters = IhpModeCounters::default();

    let cooling_call = inputs.sensible_load < -SMALL_LOAD || inputs.latent_load < -SMALL_LOAD;
    let over_cool_allowed = inputs.indoor_temperature > thresholds.indoor_over_cool_allow
        && inputs.outdoor_temperature > thresholds.ambient_over_cool_allow;

    if !inputs.water_heating_call {
        return if cooling_call {
            IhpOperationMode::SpaceClg
        } else if inputs.sensible_load > SMALL_LOAD {
            if over_cool_allowed {
                IhpOperationMode::Idle
            } else {
                IhpOperationMode::SpaceHtg
            }
        } else {
            IhpOperationMode::Idle
        };
    }

    if cooling_call {
        if saved_volume < thresholds.water_volume_scdwh {
            counters.water_flow_accumulated_volume = saved_volume;
            return IhpOperationMode::SpaceClgDedicatedWaterHtg;
        }
        return match thresholds.match_scwh {
            WaterHeatingMatch::MatchWaterHeating => IhpOperationMode::ScwhMatchWh,
            WaterHeatingMatch::MatchSpaceCooling => IhpOperationMode::ScwhMatchSc,
        };
    }

    if over_cool_allowed {
        IhpOperationMode::ScwhMatchWh
    } else if inputs.indoor_temperature > thresholds.indoor_water_heating_high_priority
        && inputs.outdoor_temperature > thresholds.ambient_water_heating_high_priority
    {
        IhpOperationMode::DedicatedWaterHtg
    } else if inputs.sensible_load > SMALL_LOAD {
        counters.shdwh_run_time = saved_run_time + inputs.timestep_seconds;
        if saved_run_time > thresholds.time_limit_shdwh {
            IhpOperationMode::ShdwhElecHeatOn
        } else {
            IhpOperationMode::ShdwhElecHeatOff
        }
    } else {
        IhpOperationMode::DedicatedWaterHtg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hvac::HeatCoolMode;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn thresholds() -> IhpModeThresholds {
        IhpModeThresholds {
            indoor_over_cool_allow: 27.,
            ambient_over_cool_allow: 30.,
            indoor_water_heating_high_priority: 20.,
            ambient_water_heating_high_priority: 28.,
            water_volume_scdwh: 0.02,
            time_limit_shdwh: 3600.,
            match_scwh: WaterHeatingMatch::MatchSpaceCooling,
        }
    }

    fn inputs(sensible_load: f64, water_heating_call: bool) -> IhpModeInputs {
        IhpModeInputs {
            sensible_load,
            latent_load: 0.,
            water_heating_call,
            indoor_temperature: 22.,
            outdoor_temperature: 10.,
            tank_mass_flow_rate: 0.,
            timestep_seconds: 900.,
        }
    }

    #[rstest]
    fn should_hold_mode_inside_dwell_window() {
        let mut machine = ModeStateMachine::new(HeatCoolMode::Off, 0.5);

        assert_eq!(machine.update(1.0, || HeatCoolMode::Cooling), HeatCoolMode::Cooling);
        assert_eq!(machine.update(1.25, || HeatCoolMode::Heating), HeatCoolMode::Cooling);
        assert_eq!(machine.update(1.5, || HeatCoolMode::Off), HeatCoolMode::Cooling);
        assert_eq!(machine.update(1.75, || HeatCoolMode::Heating), HeatCoolMode::Heating);
        assert_eq!(machine.previous(), HeatCoolMode::Cooling);
    }

    #[rstest]
    fn should_change_freely_without_dwell_time() {
        let mut machine = ModeStateMachine::new(HeatCoolMode::Off, 0.);

        assert_eq!(machine.update(1.0, || HeatCoolMode::Cooling), HeatCoolMode::Cooling);
        assert_eq!(machine.update(1.0, || HeatCoolMode::Heating), HeatCoolMode::Heating);
    }

    #[rstest]
    fn should_clear_timer_on_new_warmup_day() {
        let mut timer = ModeDwellTimer::new(2.);
        timer.reset_on_new_warmup_day(true, 1);
        timer.start(23.5);
        assert!(timer.is_locked(0.5));

        timer.reset_on_new_warmup_day(true, 2);
        assert!(!timer.is_locked(0.5));
    }

    #[rstest]
    fn should_not_lock_before_first_mode_change() {
        let timer = ModeDwellTimer::new(2.);
        assert!(!timer.is_locked(0.));
        assert!(!timer.is_locked(1.));

        let mut machine = ModeStateMachine::new(HeatCoolMode::Off, 2.);
        assert_eq!(machine.update(0., || HeatCoolMode::Heating), HeatCoolMode::Heating);
    }

    #[rstest]
    fn should_keep_timer_after_warmup() {
        let mut timer = ModeDwellTimer::new(2.);
        timer.reset_on_new_warmup_day(false, 1);
        timer.start(10.);
        timer.reset_on_new_warmup_day(false, 2);
        assert!(timer.is_locked(11.));
    }

    #[rstest]
    #[case(-1500., IhpOperationMode::SpaceClg)]
    #[case(2000., IhpOperationMode::SpaceHtg)]
    #[case(0.5, IhpOperationMode::Idle)]
    fn should_choose_space_modes_without_water_heating_call(
        thresholds: IhpModeThresholds,
        #[case] sensible_load: f64,
        #[case] expected: IhpOperationMode,
    ) {
        let mut counters = IhpModeCounters::default();
        assert_eq!(
            decide_work_mode(
                &thresholds,
                &mut counters,
                IhpOperationMode::Idle,
                &inputs(sensible_load, false)
            ),
            expected
        );
    }

    #[rstest]
    fn should_idle_rather_than_heat_when_overcooling_allowed(thresholds: IhpModeThresholds) {
        let mut counters = IhpModeCounters::default();
        let warm = IhpModeInputs {
            indoor_temperature: 28.,
            outdoor_temperature: 32.,
            ..inputs(2000., false)
        };
        assert_eq!(
            decide_work_mode(&thresholds, &mut counters, IhpOperationMode::Idle, &warm),
            IhpOperationMode::Idle
        );
    }

    #[rstest]
    fn should_start_small_water_heating_during_cooling(thresholds: IhpModeThresholds) {
        let mut counters = IhpModeCounters::default();
        let mode = decide_work_mode(
            &thresholds,
            &mut counters,
            IhpOperationMode::SpaceClg,
            &inputs(-1500., true),
        );
        assert_eq!(mode, IhpOperationMode::SpaceClgDedicatedWaterHtg);
        assert_eq!(counters.water_flow_accumulated_volume, 0.);
    }

    #[rstest]
    fn should_accumulate_volume_in_small_water_heating_mode(thresholds: IhpModeThresholds) {
        let mut counters = IhpModeCounters {
            shdwh_run_time: 0.,
            water_flow_accumulated_volume: 0.005,
        };
        let step = IhpModeInputs {
            tank_mass_flow_rate: 0.00983,
            ..inputs(-1500., true)
        };
        let mode = decide_work_mode(
            &thresholds,
            &mut counters,
            IhpOperationMode::SpaceClgDedicatedWaterHtg,
            &step,
        );
        assert_eq!(mode, IhpOperationMode::SpaceClgDedicatedWaterHtg);
        assert_relative_eq!(counters.water_flow_accumulated_volume, 0.014);
    }

    #[rstest]
    #[case(WaterHeatingMatch::MatchSpaceCooling, IhpOperationMode::ScwhMatchSc)]
    #[case(WaterHeatingMatch::MatchWaterHeating, IhpOperationMode::ScwhMatchWh)]
    fn should_switch_to_combined_mode_once_volume_exceeded(
        thresholds: IhpModeThresholds,
        #[case] match_scwh: WaterHeatingMatch,
        #[case] expected: IhpOperationMode,
    ) {
        let thresholds = IhpModeThresholds {
            match_scwh,
            ..thresholds
        };
        let mut counters = IhpModeCounters {
            shdwh_run_time: 0.,
            water_flow_accumulated_volume: 0.03,
        };
        let mode = decide_work_mode(
            &thresholds,
            &mut counters,
            IhpOperationMode::SpaceClgDedicatedWaterHtg,
            &inputs(-1500., true),
        );
        assert_eq!(mode, expected);
        assert_eq!(counters.water_flow_accumulated_volume, 0.);
    }

    #[rstest]
    fn should_prioritise_water_heating_when_warm(thresholds: IhpModeThresholds) {
        let mut counters = IhpModeCounters::default();
        let warm = IhpModeInputs {
            indoor_temperature: 23.,
            outdoor_temperature: 29.,
            ..inputs(800., true)
        };
        assert_eq!(
            decide_work_mode(&thresholds, &mut counters, IhpOperationMode::Idle, &warm),
            IhpOperationMode::DedicatedWaterHtg
        );
    }

    #[rstest]
    fn should_escalate_to_electric_heat_after_time_limit(thresholds: IhpModeThresholds) {
        let mut counters = IhpModeCounters::default();
        let mut mode = IhpOperationMode::Idle;
        let mut modes = vec![];
        for _ in 0..6 {
            mode = decide_work_mode(&thresholds, &mut counters, mode, &inputs(2000., true));
            modes.push(mode);
        }

        assert_eq!(
            modes,
            vec![
                IhpOperationMode::ShdwhElecHeatOff,
                IhpOperationMode::ShdwhElecHeatOff,
                IhpOperationMode::ShdwhElecHeatOff,
                IhpOperationMode::ShdwhElecHeatOff,
                IhpOperationMode::ShdwhElecHeatOff,
                IhpOperationMode::ShdwhElecHeatOn,
            ]
        );
        assert_eq!(counters.shdwh_run_time, 5400.);
    }

    #[rstest]
    fn should_heat_water_only_without_space_call(thresholds: IhpModeThresholds) {
        let mut counters = IhpModeCounters::default();
        assert_eq!(
            decide_work_mode(
                &thresholds,
                &mut counters,
                IhpOperationMode::Idle,
                &inputs(0., true)
            ),
            IhpOperationMode::DedicatedWaterHtg
        );
    }
}
