use crate::compare_floats::max_of_2;
use crate::core::hvac::air_flow::{AirFlowRates, AverageAirFlow};
use crate::core::hvac::coils::{
    compressor_allowed, Coil, CoilMode, CoilOutput, CoilRequest, DxCoil, DxService, HeatingCoil,
    HeatingCoilFamily,
};
use crate::core::hvac::device::{
    run_stack, sensible_output, total_output, AirPath, ComponentStack, DeviceEvaluationResult,
    DeviceSimulation, StackStage, ThermostatMode, TrialOperatingPoint,
};
use crate::core::hvac::diagnostics::{Diagnostics, WarningKind};
use crate::core::hvac::fan::Fan;
use crate::core::hvac::report::{combined_efficiency_ratio, split_by_sign, UnitReportRow};
use crate::core::hvac::speed_solver::{SpeedSolution, SpeedSolveRequest, SpeedSolver};
use crate::core::hvac::supplemental_heater::{
    clamp_supply_temperature, control_non_dx_coil, trim_load, SupplementalHeaterState,
    TrimmableDevice,
};
use crate::core::hvac::{
    AirNode, FanOperation, FanPlacement, HeatCoolMode, OutdoorConditions, SMALL_LOAD,
};
use crate::core::material_properties::WATER;
use crate::errors::ConfigurationError;

/// This module provides the control of an air-to-air heat pump with multi-speed DX cooling
/// and heating coils, a supply fan and an optional supplemental heater. Each timestep the
/// speed and part-load fraction meeting the zone load are searched for, any heating the
/// heat pump cannot deliver is passed to the supplemental heater, and the results are
/// reported.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatRecoveryConfig {
    /// Highest water temperature leaving the heat recovery exchanger, in degC
    pub max_outlet_temperature: f64,
    /// Fraction of compressor power rejected to the heat recovery water
    pub compressor_heat_rejection_fraction: f64,
}

#[derive(Clone, Debug)]
pub struct MultiSpeedHeatPumpConfig {
    pub name: String,
    pub fan_placement: FanPlacement,
    pub air_flows: AirFlowRates,
    /// Highest supply air temperature the supplemental heater may produce, in degC
    pub max_supply_air_temperature: f64,
    /// The supplemental heater is off above this outdoor temperature, in degC
    pub supplemental_heater_max_outdoor_temperature: f64,
    /// Power of controls and other auxiliaries while the compressor runs, in W
    pub aux_on_cycle_power: f64,
    /// Power of controls and other auxiliaries while the compressor is off, in W
    pub aux_off_cycle_power: f64,
    pub heat_recovery: Option<HeatRecoveryConfig>,
    /// Interpolate between speed boundaries instead of iterating
    pub direct_solution: bool,
}

/// Water entering the heat recovery exchanger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatRecoveryInlet {
    /// in kg/s
    pub mass_flow_rate: f64,
    /// in degC
    pub temperature: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeatRecoveryResult {
    /// Heat recovered to water, in W
    pub rate: f64,
    pub outlet_temperature: f64,
}

/// Conditions of one timestep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MshpConditions {
    /// Hour the timestep starts at
    pub time: f64,
    pub timestep_seconds: f64,
    /// Air entering the unit, with the flow available to it
    pub inlet: AirNode,
    /// Air in the controlled zone
    pub zone: AirNode,
    /// Sensible load to the zone setpoint, in W (negative for cooling)
    pub load: f64,
    pub in_deadband: bool,
    pub outdoor: OutdoorConditions,
    pub available: bool,
    pub thermostat: ThermostatMode,
    pub economizer_active: bool,
    /// Speed to run at, overriding the load search; the fractional part is the cycling
    /// fraction at speed 1 or the speed ratio above it
    pub speed_override: Option<f64>,
    pub heat_recovery_inlet: Option<HeatRecoveryInlet>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MshpStepOutput {
    pub trial: TrialOperatingPoint,
    /// Reported cycling fraction of the compressor
    pub part_load_fraction: f64,
    pub fan_part_load_ratio: f64,
    pub supplemental: SupplementalHeaterState,
    pub outlet: AirNode,
    pub heat_recovery: HeatRecoveryResult,
    pub aux_power: f64,
    pub row: UnitReportRow,
}

/// State carried between timesteps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MshpState {
    /// Last heating or cooling mode the unit ran in
    pub last_mode: HeatCoolMode,
    pub saved_compressor_plr: f64,
    pub on_off_air_flow_ratio: f64,
}

#[derive(Clone, Debug)]
struct MshpComponents {
    fan: Fan,
    cooling_coil: DxCoil,
    heating_coil: HeatingCoil,
    supplemental_heater: Option<HeatingCoil>,
    air_path: AirPath,
    /// Warnings from controlling load-driven heating coils
    coil_diagnostics: Diagnostics,
}

#[derive(Clone, Debug)]
pub struct MultiSpeedHeatPump {
    config: MultiSpeedHeatPumpConfig,
    components: MshpComponents,
    state: MshpState,
    diagnostics: Diagnostics,
}

impl MultiSpeedHeatPump {
    /// Arguments:
    /// * `config` - control settings of the unit
    /// * `fan` - supply fan
    /// * `cooling_coil` - multi-speed DX cooling coil
    /// * `heating_coil` - multi-speed DX, multi-stage, or load-controlled heating coil
    /// * `supplemental_heater` - optional load-controlled heater run after the heat pump
    pub fn new(
        config: MultiSpeedHeatPumpConfig,
        fan: Fan,
        cooling_coil: DxCoil,
        heating_coil: HeatingCoil,
        supplemental_heater: Option<HeatingCoil>,
    ) -> Result<Self, ConfigurationError> {
        let unit = config.name.clone();

        if cooling_coil.service() != DxService::Cooling {
            return Err(ConfigurationError::UnsupportedCoil {
                unit,
                coil: "DX coil without a cooling service",
                role: "cooling coil",
            });
        }
        if let HeatingCoil::DxMultiSpeed(coil) = &heating_coil {
            if coil.service() != DxService::Heating {
                return Err(ConfigurationError::UnsupportedCoil {
                    unit,
                    coil: "DX coil without a heating service",
                    role: "heating coil",
                });
            }
        }
        if config.air_flows.cooling.len() != cooling_coil.number_of_speeds() {
            return Err(ConfigurationError::InconsistentSpeedCount {
                unit,
                service: "cooling",
                expected: cooling_coil.number_of_speeds(),
                found: config.air_flows.cooling.len(),
            });
        }
        if config.air_flows.heating.len() != heating_coil.number_of_speeds() {
            return Err(ConfigurationError::InconsistentSpeedCount {
                unit,
                service: "heating",
                expected: heating_coil.number_of_speeds(),
                found: config.air_flows.heating.len(),
            });
        }
        if let Some(heater) = &supplemental_heater {
            if heater.family() != HeatingCoilFamily::NonDx {
                return Err(ConfigurationError::UnsupportedCoil {
                    unit,
                    coil: heater.kind_name(),
                    role: "supplemental heater",
                });
            }
        }

        let coil_diagnostics = Diagnostics::new(&format!("{} heating coils", config.name));
        let diagnostics = Diagnostics::new(&config.name);
        Ok(Self {
            config,
            components: MshpComponents {
                fan,
                cooling_coil,
                heating_coil,
                supplemental_heater,
                air_path: Default::default(),
                coil_diagnostics,
            },
            state: Default::default(),
            diagnostics,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> &MshpState {
        &self.state
    }

    pub fn fan(&self) -> &Fan {
        &self.components.fan
    }

    pub fn cooling_coil(&self) -> &DxCoil {
        &self.components.cooling_coil
    }

    pub fn heating_coil(&self) -> &HeatingCoil {
        &self.components.heating_coil
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn set_warmup(&mut self, warmup: bool) {
        self.diagnostics.set_warmup(warmup);
        self.components.coil_diagnostics.set_warmup(warmup);
    }

    /// Log the counts of warnings that recurred during the run
    pub fn summarise_warnings(&self) {
        self.diagnostics.summarise();
        self.components.coil_diagnostics.summarise();
    }

    /// Control the unit for one timestep.
    ///
    /// Arguments:
    /// * `conditions` - loads and air states for the timestep
    /// * `first_iteration` - whether this is the first call of the timestep
    pub fn simulate(
        &mut self,
        conditions: &MshpConditions,
        first_iteration: bool,
    ) -> anyhow::Result<MshpStepOutput> {
        let fan_operation = self.config.air_flows.fan_operation;
        let load = conditions.load;

        if !conditions.available && load.abs() > SMALL_LOAD {
            self.diagnostics.warn(
                WarningKind::UnavailableDuringCall,
                format!("Unit is scheduled off during a call for {load:.1} W; output is zero"),
            );
        }
        let unit_on = conditions.available
            && conditions.inlet.has_flow()
            && match fan_operation {
                FanOperation::Cycling => load.abs() >= SMALL_LOAD && !conditions.in_deadband,
                FanOperation::Continuous => true,
            };
        let mode = if unit_on {
            HeatCoolMode::from_load(load)
        } else {
            HeatCoolMode::Off
        };
        if mode.is_active() {
            self.state.last_mode = mode;
        }

        let max_speed = match mode {
            HeatCoolMode::Cooling => self.components.cooling_coil.number_of_speeds(),
            HeatCoolMode::Heating => self.components.heating_coil.number_of_speeds(),
            HeatCoolMode::Off => 0,
        };
        let override_trial = match conditions.speed_override {
            Some(value) if mode.is_active() => Some(self.override_trial(value, max_speed)),
            _ => None,
        };
        let request = SpeedSolveRequest::new(load, mode, max_speed)
            .with_thermostat(conditions.thermostat)
            .with_direct_solution(self.config.direct_solution);

        // with an economizer running, first see whether outdoor air alone can meet the load
        let economizer_check = !first_iteration
            && fan_operation == FanOperation::Cycling
            && load < 0.
            && conditions.economizer_active;

        let mut device = MshpDevice::new(
            &self.config,
            &mut self.components,
            conditions,
            mode,
            self.state.last_mode,
            !economizer_check,
        );
        let mut solver = SpeedSolver::new(&mut self.diagnostics);

        let mut solution = search(&mut solver, &mut device, &request, override_trial)?;
        if economizer_check
            && solution.trial.speed_number() == max_speed
            && solution.trial.is_full_at_speed()
        {
            device.compressor_enabled = true;
            solution = search(&mut solver, &mut device, &request, override_trial)?;
        }

        let mut supplemental = SupplementalHeaterState::default();
        if mode == HeatCoolMode::Heating && device.has_supplemental_heater() {
            supplemental.load = trim_load(
                load,
                solution.full_output,
                conditions.outdoor.temperature,
                self.config.supplemental_heater_max_outdoor_temperature,
            );
            if supplemental.load > 0. {
                let outlet = device.simulate_with_supplemental_load(supplemental.load)?;
                let clamped = clamp_supply_temperature(
                    &mut device,
                    supplemental.load,
                    &outlet,
                    self.config.max_supply_air_temperature,
                )?;
                if clamped != supplemental.load {
                    supplemental.load = clamped;
                    device.simulate_with_supplemental_load(clamped)?;
                }
            }
            supplemental.actual_delivered_load = device.supplemental_heater_output();
        }

        let achieved = device.evaluation();
        let trial = device.trial;
        let flow = device.flow;
        let compressor_power = device.compressor_power();
        let outlet = device.air_path.outlet;
        let dx_heating = device.heating_coil.family() == HeatingCoilFamily::DxMultiSpeed;
        let active_runtime = device.active_coil_runtime_fraction();

        let mut part_load_fraction = trial.part_load_fraction();
        let saved_compressor_plr = if !dx_heating {
            part_load_fraction
        } else if trial.speed_number() > 1 {
            1.
        } else {
            active_runtime
        };
        let staged = matches!(conditions.thermostat, ThermostatMode::Staged(_));
        if dx_heating && part_load_fraction == 1. && saved_compressor_plr < 1. && !staged {
            part_load_fraction = saved_compressor_plr;
        }
        self.state.saved_compressor_plr = saved_compressor_plr;
        self.state.on_off_air_flow_ratio = flow.on_off_ratio;

        let fan_part_load_ratio =
            fan_part_load_ratio(fan_operation, unit_on, trial, supplemental.load);
        let aux_power = self.config.aux_on_cycle_power * saved_compressor_plr
            + self.config.aux_off_cycle_power * (1. - saved_compressor_plr);
        let electric_power = achieved.electrical_power + aux_power;

        let heat_recovery = match (self.config.heat_recovery, conditions.heat_recovery_inlet) {
            (Some(config), Some(inlet)) => recover_heat(
                &config,
                &inlet,
                config.compressor_heat_rejection_fraction * compressor_power,
            ),
            (_, Some(inlet)) => HeatRecoveryResult {
                rate: 0.,
                outlet_temperature: inlet.temperature,
            },
            _ => Default::default(),
        };

        let row = report_row(
            conditions,
            mode,
            trial,
            part_load_fraction,
            &achieved,
            &flow,
            &outlet,
            electric_power,
            supplemental.load,
            heat_recovery.rate,
        );

        Ok(MshpStepOutput {
            trial,
            part_load_fraction,
            fan_part_load_ratio,
            supplemental,
            outlet,
            heat_recovery,
            aux_power,
            row,
        })
    }

    /// Operating point commanded by a speed override
    fn override_trial(&mut self, value: f64, max_speed: usize) -> TrialOperatingPoint {
        if value > max_speed as f64 {
            self.diagnostics.warn(
                WarningKind::SpeedOverrideAboveMaximum,
                format!("Speed override {value} is above the maximum speed {max_speed}; the maximum is used"),
            );
        }
        let value = value.clamp(0., max_speed as f64);
        let speed = value.ceil() as usize;
        match speed {
            0 => TrialOperatingPoint::Off,
            1 => TrialOperatingPoint::cycling(value),
            _ => TrialOperatingPoint::interpolating(speed, value - (speed - 1) as f64),
        }
    }
}

/// Solve for the operating point, or run the overridden one
fn search(
    solver: &mut SpeedSolver,
    device: &mut MshpDevice,
    request: &SpeedSolveRequest,
    override_trial: Option<TrialOperatingPoint>,
) -> anyhow::Result<SpeedSolution> {
    match override_trial {
        Some(trial) => {
            let achieved = device.simulate(trial)?;
            Ok(SpeedSolution {
                trial,
                no_comp_output: achieved.sensible,
                full_output: achieved.sensible,
                achieved,
                supplemental_shortfall: 0.,
            })
        }
        None => solver.solve(device, request),
    }
}

/// Fraction of the timestep the supply fan runs
fn fan_part_load_ratio(
    fan_operation: FanOperation,
    unit_on: bool,
    trial: TrialOperatingPoint,
    supplemental_load: f64,
) -> f64 {
    let cycling_ratio = if trial.speed_number() < 2 {
        trial.part_load_fraction()
    } else {
        1.
    };
    match fan_operation {
        FanOperation::Cycling if supplemental_load > 0. => 1.,
        FanOperation::Continuous if unit_on => 1.,
        _ => cycling_ratio,
    }
}

/// Heat recovered to water from the compressor
fn recover_heat(
    config: &HeatRecoveryConfig,
    inlet: &HeatRecoveryInlet,
    waste_heat: f64,
) -> HeatRecoveryResult {
    if inlet.mass_flow_rate <= 0. {
        return HeatRecoveryResult {
            rate: 0.,
            outlet_temperature: inlet.temperature,
        };
    }
    let capacity_rate = WATER.capacity_rate(inlet.mass_flow_rate);
    let outlet_temperature = waste_heat / capacity_rate + inlet.temperature;
    if outlet_temperature > config.max_outlet_temperature {
        let outlet_temperature = max_of_2(inlet.temperature, config.max_outlet_temperature);
        HeatRecoveryResult {
            rate: capacity_rate * (outlet_temperature - inlet.temperature),
            outlet_temperature,
        }
    } else {
        HeatRecoveryResult {
            rate: waste_heat,
            outlet_temperature,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn report_row(
    conditions: &MshpConditions,
    mode: HeatCoolMode,
    trial: TrialOperatingPoint,
    part_load_fraction: f64,
    achieved: &DeviceEvaluationResult,
    flow: &AverageAirFlow,
    outlet: &AirNode,
    electric_power: f64,
    supplemental_load: f64,
    recovered_heat_rate: f64,
) -> UnitReportRow {
    let latent = achieved.total - achieved.sensible;
    let (total_heating, total_cooling) = split_by_sign(achieved.total);
    let (sensible_heating, sensible_cooling) = split_by_sign(achieved.sensible);
    let (latent_heating, latent_cooling) = split_by_sign(latent);

    let mut row = UnitReportRow {
        time: conditions.time,
        mode: mode.to_string(),
        speed: trial.speed_number(),
        speed_ratio: trial.speed_ratio(),
        part_load_fraction,
        electric_power,
        supplemental_heater_load: supplemental_load,
        recovered_heat_rate,
        air_mass_flow_rate: flow.average,
        water_mass_flow_rate: conditions
            .heat_recovery_inlet
            .map_or(0., |inlet| inlet.mass_flow_rate),
        outlet_temperature: outlet.temperature,
        ..Default::default()
    };
    match mode {
        HeatCoolMode::Heating => {
            row.total_heating_rate = total_heating;
            row.sensible_heating_rate = sensible_heating;
            row.latent_heating_rate = latent_heating;
        }
        HeatCoolMode::Cooling => {
            row.total_cooling_rate = total_cooling;
            row.sensible_cooling_rate = sensible_cooling;
            row.latent_cooling_rate = latent_cooling;
        }
        HeatCoolMode::Off => {}
    }
    row.combined_efficiency_ratio = combined_efficiency_ratio(
        row.total_cooling_rate,
        row.total_heating_rate,
        0.,
        electric_power,
    );
    row.with_energies(conditions.timestep_seconds)
}

/// The heat pump's components set up for the trials of one timestep.
struct MshpDevice<'a> {
    placement: FanPlacement,
    air_flows: &'a AirFlowRates,
    fan: &'a mut Fan,
    cooling_coil: &'a mut DxCoil,
    heating_coil: &'a mut HeatingCoil,
    supplemental_heater: Option<&'a mut HeatingCoil>,
    air_path: &'a mut AirPath,
    coil_diagnostics: &'a mut Diagnostics,
    inlet: AirNode,
    zone: AirNode,
    outdoor: OutdoorConditions,
    load: f64,
    mode: HeatCoolMode,
    last_mode: HeatCoolMode,
    available: bool,
    compressor_enabled: bool,
    trial: TrialOperatingPoint,
    supplemental_load: f64,
    flow: AverageAirFlow,
}

impl<'a> MshpDevice<'a> {
    fn new(
        config: &'a MultiSpeedHeatPumpConfig,
        components: &'a mut MshpComponents,
        conditions: &MshpConditions,
        mode: HeatCoolMode,
        last_mode: HeatCoolMode,
        compressor_enabled: bool,
    ) -> Self {
        Self {
            placement: config.fan_placement,
            air_flows: &config.air_flows,
            fan: &mut components.fan,
            cooling_coil: &mut components.cooling_coil,
            heating_coil: &mut components.heating_coil,
            supplemental_heater: components.supplemental_heater.as_mut(),
            air_path: &mut components.air_path,
            coil_diagnostics: &mut components.coil_diagnostics,
            inlet: conditions.inlet,
            zone: conditions.zone,
            outdoor: conditions.outdoor,
            load: conditions.load,
            mode,
            last_mode,
            available: conditions.available,
            compressor_enabled,
            trial: TrialOperatingPoint::Off,
            supplemental_load: 0.,
            flow: Default::default(),
        }
    }

    fn fan_runtime_fraction(&self) -> f64 {
        match self.air_flows.fan_operation {
            FanOperation::Continuous => 1.,
            FanOperation::Cycling => fan_part_load_ratio(
                FanOperation::Cycling,
                true,
                self.trial,
                self.supplemental_load,
            ),
        }
    }

    fn simulate_heating_coil(&mut self, inlet: &AirNode) -> anyhow::Result<CoilOutput> {
        let heating = self.mode == HeatCoolMode::Heating;
        match self.heating_coil.family() {
            HeatingCoilFamily::NonDx => {
                let load = if heating && self.trial.compressor_on() {
                    self.load
                } else {
                    0.
                };
                control_non_dx_coil(
                    &mut *self.heating_coil,
                    inlet,
                    load,
                    &self.outdoor,
                    Some(self.trial.part_load_fraction()),
                    &mut *self.coil_diagnostics,
                )
            }
            HeatingCoilFamily::DxMultiSpeed | HeatingCoilFamily::MultiStageFuel => {
                let request = if heating && compressor_allowed(&*self.heating_coil, &self.outdoor)
                {
                    CoilRequest::from_trial(self.trial, CoilMode::Normal)
                } else {
                    CoilRequest::Off
                };
                self.heating_coil.simulate(inlet, request, &self.outdoor)
            }
        }
    }

    fn supplemental_heater_output(&self) -> f64 {
        self.supplemental_heater
            .as_ref()
            .map_or(0., |heater| heater.last_output().heating_delivered())
    }

    /// Power drawn by the compressor of the coil running in the current mode, in W
    fn compressor_power(&self) -> f64 {
        match (self.mode, &*self.heating_coil) {
            (HeatCoolMode::Cooling, _) => self.cooling_coil.last_output().electrical_power,
            (HeatCoolMode::Heating, HeatingCoil::DxMultiSpeed(coil)) => {
                coil.last_output().electrical_power
            }
            _ => 0.,
        }
    }

    fn active_coil_runtime_fraction(&self) -> f64 {
        match self.mode {
            HeatCoolMode::Cooling => self.cooling_coil.last_output().runtime_fraction,
            HeatCoolMode::Heating => self.heating_coil.last_output().runtime_fraction,
            HeatCoolMode::Off => 0.,
        }
    }

    fn electrical_power(&self) -> f64 {
        self.fan.power()
            + self.cooling_coil.last_output().total_electrical_power()
            + self.heating_coil.last_output().total_electrical_power()
            + self
                .supplemental_heater
                .as_ref()
                .map_or(0., |heater| heater.last_output().total_electrical_power())
    }

    fn evaluation(&self) -> DeviceEvaluationResult {
        let outlet = self.air_path.outlet;
        DeviceEvaluationResult {
            sensible: sensible_output(self.flow.average, &outlet, &self.zone, 0.),
            total: total_output(self.flow.average, &outlet, &self.zone),
            electrical_power: self.electrical_power(),
        }
    }
}

impl ComponentStack for MshpDevice<'_> {
    fn simulate_stage(&mut self, stage: StackStage) -> anyhow::Result<()> {
        let inlet = self.air_path.stage_inlet(stage, self.placement);
        let outlet = match stage {
            StackStage::Fan => {
                let runtime_fraction = self.fan_runtime_fraction();
                self.fan.simulate(&inlet, runtime_fraction)
            }
            StackStage::CoolingCoil => {
                let request = if self.mode == HeatCoolMode::Cooling
                    && self.compressor_enabled
                    && compressor_allowed(&*self.cooling_coil, &self.outdoor)
                {
                    CoilRequest::from_trial(self.trial, CoilMode::Normal)
                } else {
                    CoilRequest::Off
                };
                self.cooling_coil.simulate(&inlet, request, &self.outdoor)?.outlet
            }
            StackStage::HeatingCoil => self.simulate_heating_coil(&inlet)?.outlet,
            StackStage::SupplementalHeater => match self.supplemental_heater.as_deref_mut() {
                Some(heater) => {
                    control_non_dx_coil(
                        heater,
                        &inlet,
                        self.supplemental_load,
                        &self.outdoor,
                        None,
                        &mut *self.coil_diagnostics,
                    )?
                    .outlet
                }
                None => inlet,
            },
        };
        self.air_path.set_stage_outlet(stage, self.placement, outlet);
        Ok(())
    }

    fn has_supplemental_heater(&self) -> bool {
        self.supplemental_heater.is_some()
    }
}

impl DeviceSimulation for MshpDevice<'_> {
    fn simulate(&mut self, trial: TrialOperatingPoint) -> anyhow::Result<DeviceEvaluationResult> {
        self.trial = trial;
        // a cycling fan runs all timestep while the supplemental heater is on
        let flow_trial = if self.air_flows.fan_operation == FanOperation::Cycling
            && self.supplemental_load > 0.
            && trial.speed_number() <= 1
        {
            TrialOperatingPoint::cycling(1.)
        } else {
            trial
        };
        self.flow = self
            .air_flows
            .average(self.mode, self.last_mode, flow_trial, self.available);
        *self.air_path = AirPath::new(self.inlet.with_mass_flow_rate(self.flow.average));

        let placement = self.placement;
        run_stack(self, placement)?;
        Ok(self.evaluation())
    }
}

impl TrimmableDevice for MshpDevice<'_> {
    fn simulate_with_supplemental_load(&mut self, load: f64) -> anyhow::Result<AirNode> {
        self.supplemental_load = load;
        self.simulate(self.trial)?;
        Ok(self.air_path.outlet)
    }
}
