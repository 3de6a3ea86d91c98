use crate::core::hvac::coils::{Coil, CoilMode, CoilOutput, CoilRequest, DxCoil, DxService};
use crate::core::hvac::device::{DeviceEvaluationResult, DeviceSimulation, TrialOperatingPoint};
use crate::core::hvac::diagnostics::Diagnostics;
use crate::core::hvac::operating_mode::{
    decide_work_mode, IhpModeCounters, IhpModeInputs, IhpModeThresholds, IhpOperationMode,
    ModeStateMachine,
};
use crate::core::hvac::report::{combined_efficiency_ratio, energy_in_kwh, UnitReportRow};
use crate::core::hvac::speed_solver::{SpeedSolveRequest, SpeedSolver};
use crate::core::hvac::{AirNode, HeatCoolMode, OutdoorConditions, SMALL_LOAD};
use crate::core::material_properties::{HOT_WATER, STANDARD_AIR};
use crate::core::solvers::BracketFailurePolicy;
use crate::errors::ConfigurationError;
use strum::{EnumIter, IntoEnumIterator};
use tracing::debug;

/// This module provides the control of an integrated air-source heat pump: one compressor
/// serving space cooling, space heating and water heating through a set of coils, one per
/// service combination. Each timestep an operating mode picks the coils that run; the
/// others are held off.

/// The coils of an integrated heat pump, one per service combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter)]
pub enum IhpCoilSlot {
    SpaceCooling,
    SpaceHeating,
    DedicatedWaterHeating,
    CoolingWithWaterHeating,
    /// Cooling side of space cooling with a small amount of dedicated water heating
    ScdwhCooling,
    ScdwhWaterHeating,
    /// Heating side of combined space and water heating
    ShdwhHeating,
    ShdwhWaterHeating,
}

impl IhpCoilSlot {
    fn expected_service(&self) -> DxService {
        match self {
            Self::SpaceCooling | Self::ScdwhCooling => DxService::Cooling,
            Self::SpaceHeating | Self::ShdwhHeating => DxService::Heating,
            Self::DedicatedWaterHeating | Self::ScdwhWaterHeating | Self::ShdwhWaterHeating => {
                DxService::WaterHeating
            }
            Self::CoolingWithWaterHeating => DxService::CoolingWithWaterHeating,
        }
    }

    fn role(&self) -> &'static str {
        match self {
            Self::SpaceCooling => "space cooling coil",
            Self::SpaceHeating => "space heating coil",
            Self::DedicatedWaterHeating => "dedicated water heating coil",
            Self::CoolingWithWaterHeating => "cooling with water heating coil",
            Self::ScdwhCooling => "cooling coil of cooling with small water heating",
            Self::ScdwhWaterHeating => "water heating coil of cooling with small water heating",
            Self::ShdwhHeating => "heating coil of space and water heating",
            Self::ShdwhWaterHeating => "water heating coil of space and water heating",
        }
    }
}

#[derive(Clone, Debug)]
pub struct IhpCoils {
    pub space_cooling: DxCoil,
    pub space_heating: DxCoil,
    pub dedicated_water_heating: DxCoil,
    pub cooling_with_water_heating: DxCoil,
    pub scdwh_cooling: DxCoil,
    pub scdwh_water_heating: DxCoil,
    pub shdwh_heating: DxCoil,
    pub shdwh_water_heating: DxCoil,
}

impl IhpCoils {
    pub fn coil(&self, slot: IhpCoilSlot) -> &DxCoil {
        match slot {
            IhpCoilSlot::SpaceCooling => &self.space_cooling,
            IhpCoilSlot::SpaceHeating => &self.space_heating,
            IhpCoilSlot::DedicatedWaterHeating => &self.dedicated_water_heating,
            IhpCoilSlot::CoolingWithWaterHeating => &self.cooling_with_water_heating,
            IhpCoilSlot::ScdwhCooling => &self.scdwh_cooling,
            IhpCoilSlot::ScdwhWaterHeating => &self.scdwh_water_heating,
            IhpCoilSlot::ShdwhHeating => &self.shdwh_heating,
            IhpCoilSlot::ShdwhWaterHeating => &self.shdwh_water_heating,
        }
    }

    fn coil_mut(&mut self, slot: IhpCoilSlot) -> &mut DxCoil {
        match slot {
            IhpCoilSlot::SpaceCooling => &mut self.space_cooling,
            IhpCoilSlot::SpaceHeating => &mut self.space_heating,
            IhpCoilSlot::DedicatedWaterHeating => &mut self.dedicated_water_heating,
            IhpCoilSlot::CoolingWithWaterHeating => &mut self.cooling_with_water_heating,
            IhpCoilSlot::ScdwhCooling => &mut self.scdwh_cooling,
            IhpCoilSlot::ScdwhWaterHeating => &mut self.scdwh_water_heating,
            IhpCoilSlot::ShdwhHeating => &mut self.shdwh_heating,
            IhpCoilSlot::ShdwhWaterHeating => &mut self.shdwh_water_heating,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntegratedHeatPumpConfig {
    pub name: String,
    pub thresholds: IhpModeThresholds,
    /// Minimum time a mode is held once chosen, in hours
    pub min_mode_change_time: f64,
    /// Lowest speeds of the combined modes
    pub min_speed_scwh: usize,
    pub min_speed_scdwh: usize,
    pub min_speed_shdwh: usize,
    /// Scale on the rated air flows when serving the space
    pub cooling_volume_flow_scale: f64,
    pub heating_volume_flow_scale: f64,
    /// in kg/s
    pub max_cooling_air_mass_flow_rate: f64,
    pub max_heating_air_mass_flow_rate: f64,
    /// Electric water heater brought in once space and water heating has run too long, in W
    pub aux_water_heater_capacity: f64,
}

/// Service whose output sets the compressor speed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlSide {
    Air,
    Water,
}

/// Coils and control target of one operating mode.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ModeDispatch {
    primary: IhpCoilSlot,
    /// Coil run alongside the primary one at the same operating point
    secondary: Option<IhpCoilSlot>,
    /// Coil whose rated water flows apply
    water_side: Option<IhpCoilSlot>,
    side: ControlSide,
    direction: HeatCoolMode,
}

fn dispatch(mode: IhpOperationMode) -> Option<ModeDispatch> {
    use IhpCoilSlot::*;
    let air = |primary, direction| ModeDispatch {
        primary,
        secondary: None,
        water_side: None,
        side: ControlSide::Air,
        direction,
    };
    match mode {
        IhpOperationMode::Idle => None,
        IhpOperationMode::SpaceClg => Some(air(SpaceCooling, HeatCoolMode::Cooling)),
        IhpOperationMode::SpaceHtg => Some(air(SpaceHeating, HeatCoolMode::Heating)),
        IhpOperationMode::DedicatedWaterHtg => Some(ModeDispatch {
            water_side: Some(DedicatedWaterHeating),
            side: ControlSide::Water,
            ..air(DedicatedWaterHeating, HeatCoolMode::Heating)
        }),
        IhpOperationMode::ScwhMatchSc => Some(ModeDispatch {
            water_side: Some(CoolingWithWaterHeating),
            ..air(CoolingWithWaterHeating, HeatCoolMode::Cooling)
        }),
        IhpOperationMode::ScwhMatchWh => Some(ModeDispatch {
            water_side: Some(CoolingWithWaterHeating),
            side: ControlSide::Water,
            ..air(CoolingWithWaterHeating, HeatCoolMode::Heating)
        }),
        IhpOperationMode::SpaceClgDedicatedWaterHtg => Some(ModeDispatch {
            secondary: Some(ScdwhWaterHeating),
            water_side: Some(ScdwhWaterHeating),
            ..air(ScdwhCooling, HeatCoolMode::Cooling)
        }),
        IhpOperationMode::ShdwhElecHeatOff | IhpOperationMode::ShdwhElecHeatOn => {
            Some(ModeDispatch {
                secondary: Some(ShdwhWaterHeating),
                water_side: Some(ShdwhWaterHeating),
                ..air(ShdwhHeating, HeatCoolMode::Heating)
            })
        }
    }
}

/// A rated per-speed flow at an operating point: the speed 1 flow while cycling, blended
/// with the speed below above it.
fn rated_flow_at(flows: &[f64], trial: TrialOperatingPoint) -> f64 {
    if flows.is_empty() {
        return 0.;
    }
    let speed = trial.speed_number().clamp(1, flows.len());
    if speed == 1 {
        flows[0]
    } else {
        let ratio = trial.speed_ratio();
        ratio * flows[speed - 1] + (1. - ratio) * flows[speed - 2]
    }
}

#[derive(Clone, Copy, Debug)]
struct FlowLimits {
    scale: f64,
    max_air_mass_flow_rate: f64,
}

/// Delivered rates of one timestep, in W.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IhpRates {
    pub cooling: f64,
    pub space_heating: f64,
    pub water_heating: f64,
    pub latent: f64,
    /// Heat exchanged with the outdoor air or the evaporator air stream
    pub source: f64,
    pub electric_power: f64,
    /// Part of `electric_power` drawn by the auxiliary water heater
    pub aux_heater_power: f64,
    pub cop: f64,
    /// in kWh
    pub latent_energy: f64,
    pub source_energy: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IhpConditions {
    /// Hours since the start of the run
    pub time: f64,
    pub day: u32,
    pub warmup: bool,
    /// The mode is chosen on the first call of a timestep only
    pub first_iteration: bool,
    pub timestep_seconds: f64,
    /// Air entering the unit
    pub inlet: AirNode,
    pub sensible_load: f64,
    pub latent_load: f64,
    pub water_heating_call: bool,
    /// Heat the tank asks for, in W
    pub water_heating_load: f64,
    pub indoor_temperature: f64,
    pub outdoor: OutdoorConditions,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IhpStepOutput {
    pub mode: IhpOperationMode,
    pub trial: TrialOperatingPoint,
    pub air_mass_flow_rate: f64,
    pub water_mass_flow_rate: f64,
    pub outlet: AirNode,
    pub rates: IhpRates,
    pub row: UnitReportRow,
}

#[derive(Clone, Copy, Debug, Default)]
struct IhpState {
    counters: IhpModeCounters,
    /// Tank side flow of the last timestep, in kg/s
    water_mass_flow_rate: f64,
}

#[derive(Clone, Debug)]
pub struct IntegratedHeatPump {
    config: IntegratedHeatPumpConfig,
    coils: IhpCoils,
    mode: ModeStateMachine<IhpOperationMode>,
    state: IhpState,
    diagnostics: Diagnostics,
}

impl IntegratedHeatPump {
    pub fn new(config: IntegratedHeatPumpConfig, coils: IhpCoils) -> Result<Self, ConfigurationError> {
        let unit = config.name.clone();

        for slot in IhpCoilSlot::iter() {
            if coils.coil(slot).service() != slot.expected_service() {
                return Err(ConfigurationError::UnsupportedCoil {
                    unit,
                    coil: "DX coil with a different service",
                    role: slot.role(),
                });
            }
        }
        for (service, cooling_or_heating, water_heating) in [
            (
                "cooling with small water heating",
                IhpCoilSlot::ScdwhCooling,
                IhpCoilSlot::ScdwhWaterHeating,
            ),
            (
                "space and water heating",
                IhpCoilSlot::ShdwhHeating,
                IhpCoilSlot::ShdwhWaterHeating,
            ),
        ] {
            let expected = coils.coil(cooling_or_heating).number_of_speeds();
            let found = coils.coil(water_heating).number_of_speeds();
            if expected != found {
                return Err(ConfigurationError::InconsistentSpeedCount {
                    unit,
                    service,
                    expected,
                    found,
                });
            }
        }
        for (min_speed, slot) in [
            (config.min_speed_scwh, IhpCoilSlot::CoolingWithWaterHeating),
            (config.min_speed_scdwh, IhpCoilSlot::ScdwhCooling),
            (config.min_speed_shdwh, IhpCoilSlot::ShdwhHeating),
        ] {
            let speeds = coils.coil(slot).number_of_speeds();
            if min_speed < 1 || min_speed > speeds {
                return Err(ConfigurationError::Invalid {
                    unit,
                    message: format!(
                        "minimum speed {min_speed} of the {} is outside 1 to {speeds}",
                        slot.role()
                    ),
                });
            }
        }

        let diagnostics = Diagnostics::new(&config.name);
        let mode = ModeStateMachine::new(IhpOperationMode::Idle, config.min_mode_change_time);
        Ok(Self {
            config,
            coils,
            mode,
            state: Default::default(),
            diagnostics,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn mode(&self) -> IhpOperationMode {
        self.mode.current()
    }

    pub fn coils(&self) -> &IhpCoils {
        &self.coils
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn summarise_warnings(&self) {
        self.diagnostics.summarise();
    }

    /// Lowest speed the compressor runs at in a mode
    pub fn lowest_speed(&self, mode: IhpOperationMode) -> usize {
        match mode {
            IhpOperationMode::ScwhMatchSc | IhpOperationMode::ScwhMatchWh => {
                self.config.min_speed_scwh
            }
            IhpOperationMode::SpaceClgDedicatedWaterHtg => self.config.min_speed_scdwh,
            IhpOperationMode::ShdwhElecHeatOff | IhpOperationMode::ShdwhElecHeatOn => {
                self.config.min_speed_shdwh
            }
            _ => 1,
        }
    }

    /// Highest speed of the coil that runs in a mode
    pub fn max_speed(&self, mode: IhpOperationMode) -> usize {
        let slot = dispatch(mode).map_or(IhpCoilSlot::SpaceCooling, |dispatch| dispatch.primary);
        self.coils.coil(slot).number_of_speeds()
    }

    fn flow_limits(&self, mode: IhpOperationMode) -> FlowLimits {
        let scale = match mode {
            IhpOperationMode::Idle => 0.,
            IhpOperationMode::DedicatedWaterHtg => 1.,
            IhpOperationMode::SpaceHtg
            | IhpOperationMode::ShdwhElecHeatOff
            | IhpOperationMode::ShdwhElecHeatOn => self.config.heating_volume_flow_scale,
            _ => self.config.cooling_volume_flow_scale,
        };
        FlowLimits {
            scale,
            max_air_mass_flow_rate: self
                .config
                .max_cooling_air_mass_flow_rate
                .min(self.config.max_heating_air_mass_flow_rate),
        }
    }

    /// Control the heat pump for one timestep.
    pub fn simulate(&mut self, conditions: &IhpConditions) -> anyhow::Result<IhpStepOutput> {
        if conditions.first_iteration {
            self.diagnostics.set_warmup(conditions.warmup);
            self.mode
                .timer_mut()
                .reset_on_new_warmup_day(conditions.warmup, conditions.day);

            let inputs = IhpModeInputs {
                sensible_load: conditions.sensible_load,
                latent_load: conditions.latent_load,
                water_heating_call: conditions.water_heating_call,
                indoor_temperature: conditions.indoor_temperature,
                outdoor_temperature: conditions.outdoor.temperature,
                tank_mass_flow_rate: self.state.water_mass_flow_rate,
                timestep_seconds: conditions.timestep_seconds,
            };
            let current = self.mode.current();
            let thresholds = &self.config.thresholds;
            let counters = &mut self.state.counters;
            let mode = self.mode.update(conditions.time, || {
                decide_work_mode(thresholds, counters, current, &inputs)
            });
            if mode != current {
                debug!(unit = %self.config.name, from = %current, to = %mode, "mode change");
            }
        }
        let mode = self.mode.current();

        let Some(dispatch) = dispatch(mode) else {
            for slot in IhpCoilSlot::iter() {
                self.coils
                    .coil_mut(slot)
                    .simulate(&conditions.inlet, CoilRequest::Off, &conditions.outdoor)?;
            }
            self.state.water_mass_flow_rate = 0.;
            return Ok(self.report(conditions, mode, TrialOperatingPoint::Off, 0., 0., conditions.inlet));
        };

        for slot in IhpCoilSlot::iter()
            .filter(|slot| *slot != dispatch.primary && Some(*slot) != dispatch.secondary)
        {
            self.coils
                .coil_mut(slot)
                .simulate(&conditions.inlet, CoilRequest::Off, &conditions.outdoor)?;
        }

        let load = match dispatch.side {
            ControlSide::Air => conditions.sensible_load,
            ControlSide::Water => conditions.water_heating_load,
        };
        let demanded = match dispatch.direction {
            HeatCoolMode::Cooling => load < -SMALL_LOAD,
            _ => load > SMALL_LOAD,
        };

        let lowest_speed = self.lowest_speed(mode);
        let max_speed = self.max_speed(mode);
        let limits = self.flow_limits(mode);
        let mut device = IhpDevice {
            coils: &mut self.coils,
            dispatch,
            limits,
            inlet: conditions.inlet,
            outdoor: conditions.outdoor,
            primary: Default::default(),
            secondary: Default::default(),
            air_mass_flow_rate: 0.,
        };

        let trial = if demanded {
            let request = SpeedSolveRequest::new(load, dispatch.direction, max_speed)
                .with_policy(BracketFailurePolicy::Extrapolate);
            SpeedSolver::new(&mut self.diagnostics).scan_and_solve(&mut device, &request, lowest_speed)?
        } else {
            TrialOperatingPoint::Off
        };
        device.simulate(trial)?;

        let air_mass_flow_rate = device.air_mass_flow_rate;
        let outlet = device.primary.outlet;
        let water_mass_flow_rate = match (dispatch.water_side, trial) {
            (_, TrialOperatingPoint::Off) | (None, _) => 0.,
            (Some(slot), _) => {
                let flows: Vec<f64> = self
                    .coils
                    .coil(slot)
                    .speeds()
                    .iter()
                    .map(|speed| speed.water_volume_flow_rate)
                    .collect();
                HOT_WATER.mass_flow_rate(rated_flow_at(&flows, trial))
            }
        };
        self.state.water_mass_flow_rate = water_mass_flow_rate;

        Ok(self.report(conditions, mode, trial, air_mass_flow_rate, water_mass_flow_rate, outlet))
    }

    /// Rates and energies of the coils that ran, by mode
    fn rates(&self, mode: IhpOperationMode, water_heating_load: f64, timestep_seconds: f64) -> IhpRates {
        let output = |slot: IhpCoilSlot| *self.coils.coil(slot).last_output();
        let mut rates = IhpRates::default();

        match dispatch(mode) {
            None => {}
            Some(dispatch) => {
                let primary = output(dispatch.primary);
                let secondary = dispatch.secondary.map(output).unwrap_or_default();
                rates.electric_power =
                    primary.total_electrical_power() + secondary.total_electrical_power();

                match mode {
                    IhpOperationMode::SpaceClg => {
                        rates.cooling = -primary.total_capacity;
                        rates.latent = -primary.latent_capacity;
                        rates.source = rates.cooling + primary.electrical_power;
                    }
                    IhpOperationMode::SpaceHtg => {
                        rates.space_heating = primary.total_capacity;
                        rates.source = rates.space_heating - primary.electrical_power;
                    }
                    IhpOperationMode::DedicatedWaterHtg => {
                        rates.water_heating = primary.water_heating;
                        rates.source = -primary.total_capacity;
                    }
                    IhpOperationMode::ScwhMatchSc | IhpOperationMode::ScwhMatchWh => {
                        rates.cooling = -primary.total_capacity;
                        rates.latent = -primary.latent_capacity;
                        rates.water_heating = primary.water_heating;
                    }
                    IhpOperationMode::SpaceClgDedicatedWaterHtg => {
                        rates.cooling = -primary.total_capacity;
                        rates.latent = -primary.latent_capacity;
                        rates.source = rates.cooling + primary.electrical_power;
                        rates.water_heating = secondary.water_heating;
                    }
                    IhpOperationMode::ShdwhElecHeatOff | IhpOperationMode::ShdwhElecHeatOn => {
                        rates.space_heating = primary.total_capacity;
                        rates.source = rates.space_heating - primary.electrical_power;
                        rates.water_heating = secondary.water_heating;
                    }
                    IhpOperationMode::Idle => {}
                }
            }
        }

        if mode == IhpOperationMode::ShdwhElecHeatOn {
            rates.aux_heater_power = (water_heating_load - rates.water_heating)
                .max(0.)
                .min(self.config.aux_water_heater_capacity);
            rates.water_heating += rates.aux_heater_power;
            rates.electric_power += rates.aux_heater_power;
        }

        rates.cop = combined_efficiency_ratio(
            rates.cooling,
            rates.space_heating,
            rates.water_heating,
            rates.electric_power,
        );
        rates.latent_energy = energy_in_kwh(rates.latent, timestep_seconds);
        rates.source_energy = energy_in_kwh(rates.source, timestep_seconds);
        rates
    }

    fn report(
        &self,
        conditions: &IhpConditions,
        mode: IhpOperationMode,
        trial: TrialOperatingPoint,
        air_mass_flow_rate: f64,
        water_mass_flow_rate: f64,
        outlet: AirNode,
    ) -> IhpStepOutput {
        let rates = self.rates(mode, conditions.water_heating_load, conditions.timestep_seconds);
        let row = UnitReportRow {
            time: conditions.time,
            mode: mode.to_string(),
            speed: trial.speed_number(),
            speed_ratio: trial.speed_ratio(),
            part_load_fraction: trial.part_load_fraction(),
            total_heating_rate: rates.space_heating,
            total_cooling_rate: rates.cooling,
            latent_cooling_rate: rates.latent,
            water_heating_rate: rates.water_heating,
            electric_power: rates.electric_power,
            air_mass_flow_rate,
            water_mass_flow_rate,
            outlet_temperature: outlet.temperature,
            combined_efficiency_ratio: rates.cop,
            ..Default::default()
        }
        .with_energies(conditions.timestep_seconds);

        IhpStepOutput {
            mode,
            trial,
            air_mass_flow_rate,
            water_mass_flow_rate,
            outlet,
            rates,
            row,
        }
    }
}

/// The coils of one mode run together at a trial operating point. The secondary water
/// heating coil draws its heat from outdoor air at the same flow.
struct IhpDevice<'a> {
    coils: &'a mut IhpCoils,
    dispatch: ModeDispatch,
    limits: FlowLimits,
    inlet: AirNode,
    outdoor: OutdoorConditions,
    primary: CoilOutput,
    secondary: CoilOutput,
    air_mass_flow_rate: f64,
}

impl IhpDevice<'_> {
    fn air_mass_flow_rate(&self, trial: TrialOperatingPoint) -> f64 {
        let flows: Vec<f64> = self
            .coils
            .coil(self.dispatch.primary)
            .speeds()
            .iter()
            .map(|speed| speed.air_volume_flow_rate)
            .collect();
        let flow = STANDARD_AIR.mass_flow_rate(rated_flow_at(&flows, trial)) * self.limits.scale;
        flow.min(self.limits.max_air_mass_flow_rate)
    }
}

impl DeviceSimulation for IhpDevice<'_> {
    fn simulate(&mut self, trial: TrialOperatingPoint) -> anyhow::Result<DeviceEvaluationResult> {
        self.air_mass_flow_rate = self.air_mass_flow_rate(trial);
        let request = CoilRequest::from_trial(trial, CoilMode::Normal);

        let inlet = self.inlet.with_mass_flow_rate(self.air_mass_flow_rate);
        self.primary = self
            .coils
            .coil_mut(self.dispatch.primary)
            .simulate(&inlet, request, &self.outdoor)?;
        if let Some(slot) = self.dispatch.secondary {
            let outdoor_air = AirNode::new(
                self.outdoor.temperature,
                self.outdoor.humidity_ratio,
                self.air_mass_flow_rate,
            );
            self.secondary = self
                .coils
                .coil_mut(slot)
                .simulate(&outdoor_air, request, &self.outdoor)?;
        }

        let sensible = match self.dispatch.side {
            ControlSide::Air => self.primary.sensible_capacity,
            ControlSide::Water => self.primary.water_heating,
        };
        Ok(DeviceEvaluationResult {
            sensible,
            total: self.primary.total_capacity,
            electrical_power: self.primary.total_electrical_power()
                + self.secondary.total_electrical_power(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hvac::coils::DxSpeed;
    use crate::core::hvac::operating_mode::WaterHeatingMatch;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn speed(capacity: f64, sensible_heat_ratio: f64, air: f64, water: f64) -> DxSpeed {
        DxSpeed {
            capacity,
            cop: 3.,
            sensible_heat_ratio,
            air_volume_flow_rate: air,
            water_volume_flow_rate: water,
        }
    }

    fn coil(name: &str, service: DxService, capacities: [f64; 2], water: [f64; 2]) -> DxCoil {
        DxCoil::new(
            name,
            service,
            vec![
                speed(capacities[0], 0.8, 0.25, water[0]),
                speed(capacities[1], 0.75, 0.4, water[1]),
            ],
        )
        .unwrap()
    }

    #[fixture]
    fn coils() -> IhpCoils {
        IhpCoils {
            space_cooling: coil("sc", DxService::Cooling, [3000., 6000.], [0., 0.]),
            space_heating: coil("sh", DxService::Heating, [3500., 7000.], [0., 0.]),
            dedicated_water_heating: coil(
                "dwh",
                DxService::WaterHeating,
                [2000., 4000.],
                [0.0001, 0.0002],
            ),
            cooling_with_water_heating: coil(
                "scwh",
                DxService::CoolingWithWaterHeating,
                [3000., 6000.],
                [0.0001, 0.0002],
            ),
            scdwh_cooling: coil("scdwh cooling", DxService::Cooling, [3000., 6000.], [0., 0.]),
            scdwh_water_heating: coil(
                "scdwh water",
                DxService::WaterHeating,
                [800., 1600.],
                [0.00005, 0.0001],
            ),
            shdwh_heating: coil("shdwh heating", DxService::Heating, [3500., 7000.], [0., 0.]),
            shdwh_water_heating: coil(
                "shdwh water",
                DxService::WaterHeating,
                [1000., 2000.],
                [0.00005, 0.0001],
            ),
        }
    }

    #[fixture]
    fn config() -> IntegratedHeatPumpConfig {
        IntegratedHeatPumpConfig {
            name: "integrated heat pump".to_string(),
            thresholds: IhpModeThresholds {
                indoor_over_cool_allow: 27.,
                ambient_over_cool_allow: 30.,
                indoor_water_heating_high_priority: 20.,
                ambient_water_heating_high_priority: 28.,
                water_volume_scdwh: 0.,
                time_limit_shdwh: 3600.,
                match_scwh: WaterHeatingMatch::MatchSpaceCooling,
            },
            min_mode_change_time: 0.,
            min_speed_scwh: 1,
            min_speed_scdwh: 2,
            min_speed_shdwh: 1,
            cooling_volume_flow_scale: 1.,
            heating_volume_flow_scale: 1.,
            max_cooling_air_mass_flow_rate: 0.6,
            max_heating_air_mass_flow_rate: 0.6,
            aux_water_heater_capacity: 4000.,
        }
    }

    fn conditions(sensible_load: f64, water_heating_call: bool, water_heating_load: f64) -> IhpConditions {
        IhpConditions {
            time: 1.,
            day: 1,
            warmup: false,
            first_iteration: true,
            timestep_seconds: 900.,
            inlet: AirNode::new(24., 0.009, 0.),
            sensible_load,
            latent_load: 0.,
            water_heating_call,
            water_heating_load,
            indoor_temperature: 22.,
            outdoor: OutdoorConditions::new(10., 0.005),
        }
    }

    #[rstest]
    fn should_cool_space_to_sensible_load(config: IntegratedHeatPumpConfig, coils: IhpCoils) {
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();
        let output = unit.simulate(&conditions(-3000., false, 0.)).unwrap();

        assert_eq!(output.mode, IhpOperationMode::SpaceClg);
        assert_eq!(output.trial.speed_number(), 2);
        assert_relative_eq!(
            unit.coils().space_cooling.last_output().sensible_capacity,
            -3000.,
            max_relative = 1e-3
        );
        assert_eq!(output.water_mass_flow_rate, 0.);
        assert_relative_eq!(output.rates.cop, 3., max_relative = 1e-9);
        assert!(output.rates.latent > 0.);
        assert_eq!(output.row.mode, "SpaceClg");
    }

    #[rstest]
    fn should_idle_without_demand(config: IntegratedHeatPumpConfig, coils: IhpCoils) {
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();
        let output = unit.simulate(&conditions(0., false, 0.)).unwrap();

        assert_eq!(output.mode, IhpOperationMode::Idle);
        assert_eq!(output.trial, TrialOperatingPoint::Off);
        assert_eq!(output.air_mass_flow_rate, 0.);
        assert_eq!(output.rates, IhpRates::default());
    }

    #[rstest]
    fn should_match_water_heating_demand(config: IntegratedHeatPumpConfig, coils: IhpCoils) {
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();
        let output = unit.simulate(&conditions(0., true, 3000.)).unwrap();

        assert_eq!(output.mode, IhpOperationMode::DedicatedWaterHtg);
        assert_relative_eq!(output.rates.water_heating, 3000., max_relative = 1e-3);
        assert_relative_eq!(output.water_mass_flow_rate, 0.00015 * 986., max_relative = 1e-2);
        assert_relative_eq!(output.air_mass_flow_rate, 0.325 * 1.2, max_relative = 1e-2);
        assert_eq!(output.rates.cooling, 0.);
        assert!(output.rates.source > 0.);
    }

    #[rstest]
    fn should_cool_and_heat_water_together(config: IntegratedHeatPumpConfig, coils: IhpCoils) {
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();
        let output = unit.simulate(&conditions(-3000., true, 3000.)).unwrap();

        assert_eq!(output.mode, IhpOperationMode::ScwhMatchSc);
        assert_relative_eq!(
            unit.coils().cooling_with_water_heating.last_output().sensible_capacity,
            -3000.,
            max_relative = 1e-3
        );
        // all of the condenser heat goes to the water
        assert_relative_eq!(
            output.rates.water_heating,
            output.rates.cooling * 4. / 3.,
            max_relative = 1e-9
        );
        assert!(output.water_mass_flow_rate > 0.);
        assert_eq!(unit.coils().space_cooling.last_output().electrical_power, 0.);
    }

    #[rstest]
    fn should_start_small_water_heating_at_its_lowest_speed(
        mut config: IntegratedHeatPumpConfig,
        coils: IhpCoils,
    ) {
        config.thresholds.water_volume_scdwh = 0.02;
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();
        let output = unit.simulate(&conditions(-3000., true, 3000.)).unwrap();

        assert_eq!(output.mode, IhpOperationMode::SpaceClgDedicatedWaterHtg);
        assert_eq!(output.trial, TrialOperatingPoint::full_at_speed(2));
        assert_relative_eq!(output.rates.cooling, 6000.);
        assert_relative_eq!(output.rates.water_heating, 1600.);
        assert_relative_eq!(output.rates.electric_power, 2000. + 1600. / 3.);
    }

    #[rstest]
    fn should_bring_in_aux_heater_after_time_limit(
        mut config: IntegratedHeatPumpConfig,
        coils: IhpCoils,
    ) {
        config.thresholds.time_limit_shdwh = 0.;
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();

        let first = unit.simulate(&conditions(3000., true, 3000.)).unwrap();
        assert_eq!(first.mode, IhpOperationMode::ShdwhElecHeatOff);
        assert_eq!(first.rates.aux_heater_power, 0.);

        let mut next = conditions(3000., true, 3000.);
        next.time = 1.25;
        let second = unit.simulate(&next).unwrap();
        assert_eq!(second.mode, IhpOperationMode::ShdwhElecHeatOn);
        let part_load_fraction = 3000. / 3500.;
        assert_relative_eq!(
            second.rates.aux_heater_power,
            3000. - 1000. * part_load_fraction,
            max_relative = 1e-2
        );
        assert_relative_eq!(second.rates.water_heating, 3000., max_relative = 1e-9);
    }

    #[rstest]
    fn should_cap_air_flow(mut config: IntegratedHeatPumpConfig, coils: IhpCoils) {
        config.max_heating_air_mass_flow_rate = 0.3;
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();
        let output = unit.simulate(&conditions(-8000., false, 0.)).unwrap();

        assert_eq!(output.trial, TrialOperatingPoint::full_at_speed(2));
        assert_eq!(output.air_mass_flow_rate, 0.3);
    }

    #[rstest]
    fn should_keep_mode_between_iterations(config: IntegratedHeatPumpConfig, coils: IhpCoils) {
        let mut unit = IntegratedHeatPump::new(config, coils).unwrap();
        unit.simulate(&conditions(-3000., false, 0.)).unwrap();

        let mut later_iteration = conditions(3000., false, 0.);
        later_iteration.first_iteration = false;
        let output = unit.simulate(&later_iteration).unwrap();

        assert_eq!(output.mode, IhpOperationMode::SpaceClg);
        assert_eq!(output.trial, TrialOperatingPoint::Off);
    }

    #[rstest]
    fn should_reject_coil_with_wrong_service(config: IntegratedHeatPumpConfig, mut coils: IhpCoils) {
        coils.space_heating = coil("sh", DxService::Cooling, [3500., 7000.], [0., 0.]);
        let result = IntegratedHeatPump::new(config, coils);

        assert_eq!(
            result.err(),
            Some(ConfigurationError::UnsupportedCoil {
                unit: "integrated heat pump".to_string(),
                coil: "DX coil with a different service",
                role: "space heating coil",
            })
        );
    }

    #[rstest]
    fn should_reject_minimum_speed_above_coil_speeds(
        mut config: IntegratedHeatPumpConfig,
        coils: IhpCoils,
    ) {
        config.min_speed_shdwh = 3;

        assert!(matches!(
            IntegratedHeatPump::new(config, coils),
            Err(ConfigurationError::Invalid { .. })
        ));
    }
}
