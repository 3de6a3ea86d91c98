use crate::compare_floats::{clamp_fraction, max_of_2, min_of_2};
use crate::core::hvac::coils::{
    Coil, CoilMode, CoilOutput, CoilRequest, DxCoil, DxService, HeatingCoil, HeatingCoilFamily,
};
use crate::core::hvac::device::{
    sensible_load_met, DeviceEvaluationResult, DeviceSimulation, TrialOperatingPoint,
};
use crate::core::hvac::diagnostics::{Diagnostics, WarningKind};
use crate::core::hvac::fan::Fan;
use crate::core::hvac::operating_mode::ModeStateMachine;
use crate::core::hvac::report::{combined_efficiency_ratio, split_by_sign, UnitReportRow};
use crate::core::hvac::speed_solver::{SpeedSolveRequest, SpeedSolver};
use crate::core::hvac::supplemental_heater::control_non_dx_coil;
use crate::core::hvac::zone_load::{resolve_zone_loads, PriorityControl, ZoneDemand, ZoneLoadSummary};
use crate::core::hvac::{
    AirNode, FanOperation, FanPlacement, HeatCoolMode, OutdoorConditions, SMALL_MASS_FLOW,
    SMALL_TEMP_DIFF,
};
use crate::core::psychrometrics::{cp_air, dew_point, enthalpy};
use crate::core::solvers::{
    solve_root, BracketFailurePolicy, RootSolution, RootStatus, MAX_ITERATIONS,
};
use crate::errors::ConfigurationError;
use serde::Deserialize;

/// This module provides the control of a changeover-bypass VAV system: a single-zone
/// style unit serving several VAV boxes, running in one of heating or cooling at a time
/// and bypassing the supply air the boxes do not take back to its inlet. The coils are
/// controlled to an outlet temperature that drives the neediest box fully open.

/// Mismatch (W) between coil output and the request treated as a match for coils with
/// discrete speeds
const LOAD_ACCURACY: f64 = 0.001;

const NO_COOLING_TARGET: f64 = 99999.;
const NO_HEATING_TARGET: f64 = -99999.;

/// How the unit reacts when its supply air is wetter than the maximum humidity setpoint.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum DehumidificationControl {
    #[default]
    None,
    /// Switch the cooling coil to its enhanced dehumidification mode
    Multimode,
    /// Overcool to the dew point matching the humidity setpoint
    CoolReheat,
}

/// A VAV box fed by the unit.
#[derive(Clone, Debug, PartialEq)]
pub struct TerminalBox {
    pub zone: String,
    /// in kg/s
    pub max_mass_flow_rate: f64,
    /// in kg/s
    pub min_mass_flow_rate: f64,
}

#[derive(Clone, Debug)]
pub struct BypassVavConfig {
    pub name: String,
    pub fan_placement: FanPlacement,
    pub fan_operation: FanOperation,
    pub priority: PriorityControl,
    /// Minimum time a heating or cooling mode is held once chosen, in hours
    pub min_mode_change_time: f64,
    /// Unit air flows while cooling, heating and neither, in kg/s
    pub cooling_air_flow: f64,
    pub heating_air_flow: f64,
    pub no_load_air_flow: f64,
    /// Lowest supply air temperature while cooling, in degC
    pub min_outlet_temperature: f64,
    /// Highest supply air temperature while heating, in degC
    pub max_outlet_temperature: f64,
    /// The compressor is off below this outdoor temperature, in degC
    pub min_outdoor_temperature_for_compressor: f64,
    pub dehumidification: DehumidificationControl,
    pub boxes: Vec<TerminalBox>,
}

/// Conditions in one served zone for one timestep.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZoneConditions {
    pub demand: ZoneDemand,
    pub air: AirNode,
    /// Flow through the zone's box, in kg/s; estimated from the zone load when not known
    pub box_mass_flow_rate: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BypassVavConditions<'a> {
    /// Hours since the start of the run
    pub time: f64,
    pub day: u32,
    pub warmup: bool,
    pub first_iteration: bool,
    pub timestep_seconds: f64,
    /// Return air entering the unit
    pub inlet: AirNode,
    /// One entry per terminal box, in configuration order
    pub zones: &'a [ZoneConditions],
    pub outdoor: OutdoorConditions,
    pub available: bool,
    /// Humidity setpoint at the unit outlet, in kg/kg
    pub max_outlet_humidity_ratio: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BypassVavStepOutput {
    pub mode: HeatCoolMode,
    pub zone_loads: ZoneLoadSummary,
    pub trial: TrialOperatingPoint,
    /// Runtime fraction of the active compressor
    pub part_load_fraction: f64,
    pub bypass_fraction: f64,
    pub outlet_temperature_setpoint: f64,
    pub outlet: AirNode,
    pub bypass_mass_flow_rate: f64,
    /// Sensible heat delivered to the zones, in W
    pub load_met: f64,
    pub dehumidification_mode: CoilMode,
    pub row: UnitReportRow,
}

#[derive(Clone, Debug, Default)]
struct BypassVavState {
    /// Air leaving the unit in the last calculation, mixed back in through the bypass
    outlet: Option<AirNode>,
    outlet_temperature_setpoint: f64,
}

#[derive(Clone, Debug)]
struct BypassVavComponents {
    fan: Fan,
    cooling_coil: DxCoil,
    heating_coil: HeatingCoil,
    diagnostics: Diagnostics,
}

#[derive(Clone, Debug)]
pub struct BypassVav {
    config: BypassVavConfig,
    components: BypassVavComponents,
    mode: ModeStateMachine<HeatCoolMode>,
    state: BypassVavState,
}

/// Setpoint and inlet conditions of one calculation of the unit.
#[derive(Clone, Copy, Debug)]
struct CalcContext {
    mode: HeatCoolMode,
    /// Return air at the unit flow
    inlet: AirNode,
    bypass_fraction: f64,
    outdoor: OutdoorConditions,
    coil_setpoint: f64,
    max_outlet_humidity_ratio: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct CalcResult {
    trial: TrialOperatingPoint,
    outlet: AirNode,
    mixer_inlet: AirNode,
    compressor_runtime_fraction: f64,
    dehumidification_mode: CoilMode,
}

impl BypassVav {
    pub fn new(
        config: BypassVavConfig,
        fan: Fan,
        cooling_coil: DxCoil,
        heating_coil: HeatingCoil,
    ) -> Result<Self, ConfigurationError> {
        let unit = config.name.clone();

        if cooling_coil.service() != DxService::Cooling {
            return Err(ConfigurationError::UnsupportedCoil {
                unit,
                coil: "DX coil without a cooling service",
                role: "cooling coil",
            });
        }
        match &heating_coil {
            HeatingCoil::MultiStage(_) => {
                return Err(ConfigurationError::UnsupportedCoil {
                    unit,
                    coil: heating_coil.kind_name(),
                    role: "heating coil",
                })
            }
            HeatingCoil::DxMultiSpeed(coil) if coil.service() != DxService::Heating => {
                return Err(ConfigurationError::UnsupportedCoil {
                    unit,
                    coil: "DX coil without a heating service",
                    role: "heating coil",
                })
            }
            _ => {}
        }
        if config.dehumidification == DehumidificationControl::Multimode
            && !cooling_coil.has_enhanced_mode()
        {
            return Err(ConfigurationError::Invalid {
                unit,
                message: "multimode dehumidification needs a cooling coil with enhanced speeds"
                    .to_string(),
            });
        }
        if config.boxes.is_empty() {
            return Err(ConfigurationError::Invalid {
                unit,
                message: "no terminal boxes are served".to_string(),
            });
        }

        let diagnostics = Diagnostics::new(&config.name);
        let mode = ModeStateMachine::new(HeatCoolMode::Off, config.min_mode_change_time);
        Ok(Self {
            config,
            components: BypassVavComponents {
                fan,
                cooling_coil,
                heating_coil,
                diagnostics,
            },
            mode,
            state: Default::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn mode(&self) -> HeatCoolMode {
        self.mode.current()
    }

    pub fn cooling_coil(&self) -> &DxCoil {
        &self.components.cooling_coil
    }

    pub fn heating_coil(&self) -> &HeatingCoil {
        &self.components.heating_coil
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.components.diagnostics
    }

    pub fn summarise_warnings(&self) {
        self.components.diagnostics.summarise();
    }

    /// Control the unit for one timestep.
    pub fn simulate(
        &mut self,
        conditions: &BypassVavConditions,
    ) -> anyhow::Result<BypassVavStepOutput> {
        if conditions.zones.len() != self.config.boxes.len() {
            anyhow::bail!(
                "Unit '{}' serves {} boxes but conditions were given for {} zones",
                self.config.name,
                self.config.boxes.len(),
                conditions.zones.len()
            );
        }
        self.components.diagnostics.set_warmup(conditions.warmup);
        self.mode
            .timer_mut()
            .reset_on_new_warmup_day(conditions.warmup, conditions.day);

        let zone_loads = resolve_zone_loads(
            conditions.zones.iter().map(|zone| (&zone.demand, 1.)),
            self.config.priority,
        );
        let mode_before = self.mode.current();
        let mode = self.mode.update(conditions.time, || zone_loads.direction);
        let mode_changed = mode != mode_before;

        let previous_outlet = self.state.outlet.unwrap_or(conditions.inlet);
        let (unit_flow, bypass_fraction) =
            self.set_average_air_flow(mode, conditions, &previous_outlet);
        let inlet = conditions.inlet.with_mass_flow_rate(unit_flow);

        let unit_on = unit_flow >= SMALL_MASS_FLOW
            && match self.config.fan_operation {
                FanOperation::Cycling => mode.is_active(),
                FanOperation::Continuous => true,
            };

        if !conditions.available {
            self.state.outlet_temperature_setpoint = conditions.inlet.temperature;
        } else if conditions.first_iteration || mode_changed {
            let coil_inlet = inlet.blend(&previous_outlet, bypass_fraction);
            self.state.outlet_temperature_setpoint = calc_setpoint_temp_target(
                &SetpointInputs {
                    mode,
                    fan_operation: self.config.fan_operation,
                    coil_inlet_temperature: coil_inlet.temperature,
                    outlet: previous_outlet,
                    unit_inlet_temperature: conditions.inlet.temperature,
                    min_outlet_temperature: self.config.min_outlet_temperature,
                    max_outlet_temperature: self.config.max_outlet_temperature,
                },
                conditions.zones.iter().zip(&self.config.boxes),
            );
        }
        let outlet_setpoint = self.state.outlet_temperature_setpoint;

        // draw-through fan heat is added after the coils, so the coils aim below the outlet
        let coil_setpoint = match self.config.fan_placement {
            FanPlacement::BlowThrough => outlet_setpoint,
            FanPlacement::DrawThrough => {
                outlet_setpoint - self.components.fan.temperature_rise(&inlet)
            }
        };

        let context = CalcContext {
            mode,
            inlet,
            bypass_fraction,
            outdoor: conditions.outdoor,
            coil_setpoint,
            max_outlet_humidity_ratio: conditions.max_outlet_humidity_ratio,
        };
        let result = if unit_on {
            self.control_output(&context, previous_outlet, outlet_setpoint)?
        } else {
            self.components
                .calc(&self.config, &context, &previous_outlet, 0.)?
        };

        let mixer_flow = result.mixer_inlet.mass_flow_rate;
        let outlet = result
            .outlet
            .with_mass_flow_rate((1. - bypass_fraction) * mixer_flow);
        let bypass_mass_flow_rate = bypass_fraction * mixer_flow;
        self.state.outlet = Some(outlet);

        let load_met = sensible_load_met(outlet.mass_flow_rate, &conditions.inlet, &outlet);
        let total = outlet.mass_flow_rate * (outlet.enthalpy() - conditions.inlet.enthalpy());
        let electric_power = self.components.fan.power()
            + self
                .components
                .cooling_coil
                .last_output()
                .total_electrical_power()
            + self
                .components
                .heating_coil
                .last_output()
                .total_electrical_power();

        let (total_heating, total_cooling) = split_by_sign(total);
        let (sensible_heating, sensible_cooling) = split_by_sign(load_met);
        let (latent_heating, latent_cooling) = split_by_sign(total - load_met);
        let mut row = UnitReportRow {
            time: conditions.time,
            mode: mode.to_string(),
            speed: result.trial.speed_number(),
            speed_ratio: result.trial.speed_ratio(),
            part_load_fraction: result.compressor_runtime_fraction,
            total_heating_rate: total_heating,
            total_cooling_rate: total_cooling,
            sensible_heating_rate: sensible_heating,
            sensible_cooling_rate: sensible_cooling,
            latent_heating_rate: latent_heating,
            latent_cooling_rate: latent_cooling,
            electric_power,
            air_mass_flow_rate: outlet.mass_flow_rate,
            bypass_air_mass_flow_rate: bypass_mass_flow_rate,
            outlet_temperature: outlet.temperature,
            ..Default::default()
        };
        row.combined_efficiency_ratio =
            combined_efficiency_ratio(total_cooling, total_heating, 0., electric_power);

        Ok(BypassVavStepOutput {
            mode,
            zone_loads,
            trial: result.trial,
            part_load_fraction: result.compressor_runtime_fraction,
            bypass_fraction,
            outlet_temperature_setpoint: outlet_setpoint,
            outlet,
            bypass_mass_flow_rate,
            load_met,
            dehumidification_mode: result.dehumidification_mode,
            row: row.with_energies(conditions.timestep_seconds),
        })
    }

    /// Unit air flow while the compressor runs, and the fraction of it bypassed around
    /// the boxes
    fn set_average_air_flow(
        &self,
        mode: HeatCoolMode,
        conditions: &BypassVavConditions,
        previous_outlet: &AirNode,
    ) -> (f64, f64) {
        let unit_flow = match (mode, self.config.fan_operation) {
            _ if !conditions.available => 0.,
            (HeatCoolMode::Heating, _) => self.config.heating_air_flow,
            (HeatCoolMode::Cooling, _) => self.config.cooling_air_flow,
            (HeatCoolMode::Off, FanOperation::Continuous) => self.config.no_load_air_flow,
            (HeatCoolMode::Off, FanOperation::Cycling) => 0.,
        };
        if unit_flow <= 0. {
            return (0., 0.);
        }

        let box_flow: f64 = conditions
            .zones
            .iter()
            .zip(&self.config.boxes)
            .map(|(zone, terminal)| terminal_flow(zone, terminal, previous_outlet))
            .sum();
        (unit_flow, max_of_2(0., 1. - box_flow / unit_flow))
    }

    /// Run the unit at full part load, then once more if the outlet is still too warm with
    /// the bypass air recirculated at the new outlet state
    fn control_output(
        &mut self,
        context: &CalcContext,
        previous_outlet: AirNode,
        outlet_setpoint: f64,
    ) -> anyhow::Result<CalcResult> {
        let first = self
            .components
            .calc(&self.config, context, &previous_outlet, 1.)?;
        let part_load_fraction = first.trial.part_load_fraction();

        if first.outlet.temperature - outlet_setpoint > SMALL_TEMP_DIFF
            && context.mode.is_active()
            && part_load_fraction < 1.
        {
            return self
                .components
                .calc(&self.config, context, &first.outlet, part_load_fraction);
        }
        Ok(first)
    }
}

/// Flow through a box: the supplied flow, or the flow meeting the zone load at the unit's
/// outlet state, within the box limits
fn terminal_flow(zone: &ZoneConditions, terminal: &TerminalBox, outlet: &AirNode) -> f64 {
    let flow = zone.box_mass_flow_rate.unwrap_or_else(|| {
        let delta = cp_air(outlet.humidity_ratio) * outlet.temperature
            - cp_air(zone.air.humidity_ratio) * zone.air.temperature;
        if delta != 0. {
            zone.demand.load() / delta
        } else {
            0.
        }
    });
    max_of_2(
        terminal.min_mass_flow_rate,
        min_of_2(flow, terminal.max_mass_flow_rate),
    )
}

pub struct SetpointInputs {
    pub mode: HeatCoolMode,
    pub fan_operation: FanOperation,
    /// Air entering the cooling coil, after bypass mixing, in degC
    pub coil_inlet_temperature: f64,
    /// Air leaving the unit in its last calculation
    pub outlet: AirNode,
    pub unit_inlet_temperature: f64,
    pub min_outlet_temperature: f64,
    pub max_outlet_temperature: f64,
}

/// Outlet temperature that opens one box fully while the others modulate.
///
/// Each zone needs the supply temperature at which its box, at maximum flow, meets its
/// load. Cooling aims for the lowest of these and heating for the highest, never past the
/// coil inlet temperature. With no call the unit floats between the temperatures that
/// would hold the zones at their setpoints. The result is kept within the outlet
/// temperature limits.
pub fn calc_setpoint_temp_target<'a>(
    inputs: &SetpointInputs,
    zones: impl IntoIterator<Item = (&'a ZoneConditions, &'a TerminalBox)>,
) -> f64 {
    let cp_supply = cp_air(inputs.outlet.humidity_ratio);
    let supply_temperature = |zone: &ZoneConditions, terminal: &TerminalBox, load: f64| {
        if terminal.max_mass_flow_rate == 0. {
            zone.air.temperature
        } else {
            zone.air.temperature + load / (cp_supply * terminal.max_mass_flow_rate)
        }
    };

    let mut target = match inputs.mode {
        HeatCoolMode::Heating => NO_HEATING_TARGET,
        _ => NO_COOLING_TARGET,
    };
    let mut to_heating_setpoint_max = NO_HEATING_TARGET;
    let mut to_cooling_setpoint_min = NO_COOLING_TARGET;

    for (zone, terminal) in zones {
        match inputs.mode {
            HeatCoolMode::Cooling => {
                target = min_of_2(
                    target,
                    supply_temperature(zone, terminal, zone.demand.load()),
                )
            }
            HeatCoolMode::Heating => {
                target = max_of_2(
                    target,
                    supply_temperature(zone, terminal, zone.demand.load()),
                )
            }
            HeatCoolMode::Off => {
                to_heating_setpoint_max = max_of_2(
                    to_heating_setpoint_max,
                    supply_temperature(zone, terminal, zone.demand.to_heating_setpoint),
                );
                to_cooling_setpoint_min = min_of_2(
                    to_cooling_setpoint_min,
                    supply_temperature(zone, terminal, zone.demand.to_cooling_setpoint),
                );
            }
        }
    }

    target = match inputs.mode {
        HeatCoolMode::Off => match inputs.fan_operation {
            FanOperation::Continuous => {
                let outlet_temperature = inputs.outlet.temperature;
                if outlet_temperature > to_cooling_setpoint_min {
                    to_cooling_setpoint_min
                } else if outlet_temperature < to_heating_setpoint_max {
                    to_heating_setpoint_max
                } else {
                    outlet_temperature
                }
            }
            FanOperation::Cycling => inputs.unit_inlet_temperature,
        },
        HeatCoolMode::Cooling => min_of_2(target, inputs.coil_inlet_temperature),
        HeatCoolMode::Heating => max_of_2(target, inputs.coil_inlet_temperature),
    };

    target
        .max(inputs.min_outlet_temperature)
        .min(inputs.max_outlet_temperature)
}

/// A DX coil run on its own at fixed inlet conditions. Its output is the enthalpy change
/// at the outlet humidity ratio.
struct CoilTrial<'a> {
    coil: &'a mut DxCoil,
    inlet: AirNode,
    outdoor: OutdoorConditions,
    last: CoilOutput,
}

/// Enthalpy-based output of a coil, at the outlet humidity ratio, in W
fn coil_output(inlet: &AirNode, outlet: &AirNode) -> f64 {
    inlet.mass_flow_rate
        * (enthalpy(outlet.temperature, outlet.humidity_ratio)
            - enthalpy(inlet.temperature, outlet.humidity_ratio))
}

impl DeviceSimulation for CoilTrial<'_> {
    fn simulate(&mut self, trial: TrialOperatingPoint) -> anyhow::Result<DeviceEvaluationResult> {
        self.last = self.coil.simulate(
            &self.inlet,
            CoilRequest::from_trial(trial, CoilMode::Normal),
            &self.outdoor,
        )?;
        Ok(DeviceEvaluationResult {
            sensible: coil_output(&self.inlet, &self.last.outlet),
            total: self.inlet.mass_flow_rate * (self.last.outlet.enthalpy() - self.inlet.enthalpy()),
            electrical_power: self.last.total_electrical_power(),
        })
    }
}

impl BypassVavComponents {
    /// Simulate the unit's components in air flow order at a part-load fraction
    fn calc(
        &mut self,
        config: &BypassVavConfig,
        context: &CalcContext,
        previous_outlet: &AirNode,
        part_load_fraction: f64,
    ) -> anyhow::Result<CalcResult> {
        let mixer_inlet = context
            .inlet
            .blend(previous_outlet, context.bypass_fraction);
        let mut air = mixer_inlet;

        if config.fan_placement == FanPlacement::BlowThrough {
            air = self.fan.simulate(&air, 1.);
        }

        let compressor_allowed =
            context.outdoor.temperature >= config.min_outdoor_temperature_for_compressor;
        let mut result = CalcResult {
            trial: TrialOperatingPoint::Off,
            outlet: air,
            mixer_inlet,
            compressor_runtime_fraction: 0.,
            dehumidification_mode: CoilMode::Normal,
        };

        let cooling = if context.mode == HeatCoolMode::Cooling && compressor_allowed && air.has_flow()
        {
            let (trial, output, dehumidification_mode) =
                self.control_cooling_coil(config, context, &air, part_load_fraction)?;
            result.trial = trial;
            result.dehumidification_mode = dehumidification_mode;
            result.compressor_runtime_fraction = output.runtime_fraction;
            output
        } else {
            self.cooling_coil
                .simulate(&air, CoilRequest::Off, &context.outdoor)?
        };
        air = cooling.outlet;

        let heating = match self.heating_coil.family() {
            HeatingCoilFamily::NonDx => {
                let load = if context.mode == HeatCoolMode::Heating {
                    air.mass_flow_rate
                        * air.specific_heat()
                        * (context.coil_setpoint - air.temperature)
                } else {
                    0.
                };
                control_non_dx_coil(
                    &mut self.heating_coil,
                    &air,
                    load,
                    &context.outdoor,
                    None,
                    &mut self.diagnostics,
                )?
            }
            _ if context.mode == HeatCoolMode::Heating
                && context.outdoor.temperature > config.min_outdoor_temperature_for_compressor
                && air.has_flow() =>
            {
                let (trial, output) =
                    self.control_dx_heating_coil(config, context, &air, part_load_fraction)?;
                result.trial = trial;
                result.compressor_runtime_fraction = output.runtime_fraction;
                output
            }
            _ => self
                .heating_coil
                .simulate(&air, CoilRequest::Off, &context.outdoor)?,
        };
        air = heating.outlet;

        if config.fan_placement == FanPlacement::DrawThrough {
            air = self.fan.simulate(&air, 1.);
        }
        result.outlet = air;
        Ok(result)
    }

    fn control_cooling_coil(
        &mut self,
        config: &BypassVavConfig,
        context: &CalcContext,
        inlet: &AirNode,
        part_load_fraction: f64,
    ) -> anyhow::Result<(TrialOperatingPoint, CoilOutput, CoilMode)> {
        let mut setpoint = context.coil_setpoint;

        if self.cooling_coil.number_of_speeds() > 1 {
            let (trial, output) = solve_variable_speed(
                &mut self.cooling_coil,
                &mut self.diagnostics,
                inlet,
                &context.outdoor,
                setpoint,
                HeatCoolMode::Cooling,
            )?;
            return Ok((trial, output, CoilMode::Normal));
        }

        let mut mode = CoilMode::Normal;
        let mut fraction = self.cooling_part_load(inlet, &context.outdoor, setpoint, mode, part_load_fraction)?;
        let mut output = self.simulate_cooling_coil(inlet, &context.outdoor, fraction, mode)?;

        if let Some(max_humidity_ratio) = context
            .max_outlet_humidity_ratio
            .filter(|max_humidity_ratio| {
                *max_humidity_ratio > 0.
                    && output.outlet.humidity_ratio > *max_humidity_ratio
                    && inlet.humidity_ratio > *max_humidity_ratio
            })
        {
            match config.dehumidification {
                DehumidificationControl::None => {}
                DehumidificationControl::Multimode => {
                    mode = CoilMode::Enhanced;
                    fraction = self.cooling_part_load(inlet, &context.outdoor, setpoint, mode, 1.)?;
                    output = self.simulate_cooling_coil(inlet, &context.outdoor, fraction, mode)?;
                }
                DehumidificationControl::CoolReheat => {
                    let pressure = context.outdoor.barometric_pressure;
                    let approach = output.outlet.temperature
                        - dew_point(output.outlet.humidity_ratio, pressure);
                    setpoint = min_of_2(setpoint, dew_point(max_humidity_ratio, pressure) + approach);
                    fraction = self.cooling_part_load(inlet, &context.outdoor, setpoint, mode, 1.)?;
                    output = self.simulate_cooling_coil(inlet, &context.outdoor, fraction, mode)?;
                }
            }
        }

        Ok((TrialOperatingPoint::cycling(fraction), output, mode))
    }

    fn simulate_cooling_coil(
        &mut self,
        inlet: &AirNode,
        outdoor: &OutdoorConditions,
        part_load_fraction: f64,
        mode: CoilMode,
    ) -> anyhow::Result<CoilOutput> {
        let request = CoilRequest::from_trial(TrialOperatingPoint::cycling(part_load_fraction), mode);
        self.cooling_coil.simulate(inlet, request, outdoor)
    }

    /// Part-load fraction of a single-speed cooling coil bringing its outlet down to
    /// `setpoint`, starting from `part_load_fraction`
    fn cooling_part_load(
        &mut self,
        inlet: &AirNode,
        outdoor: &OutdoorConditions,
        setpoint: f64,
        mode: CoilMode,
        part_load_fraction: f64,
    ) -> anyhow::Result<f64> {
        if inlet.temperature <= setpoint {
            return Ok(0.);
        }
        let start = self.simulate_cooling_coil(inlet, outdoor, part_load_fraction, mode)?;
        if start.outlet.temperature >= setpoint {
            return Ok(part_load_fraction);
        }

        let coil = &mut self.cooling_coil;
        let result = solve_root(
            SMALL_TEMP_DIFF,
            MAX_ITERATIONS,
            |fraction| {
                let request = CoilRequest::from_trial(TrialOperatingPoint::cycling(fraction), mode);
                Ok(setpoint - coil.simulate(inlet, request, outdoor)?.outlet.temperature)
            },
            0.,
            1.,
            BracketFailurePolicy::Extrapolate,
        );
        accept_outlet_temperature_solution(&mut self.diagnostics, result, "cooling coil")
    }

    fn control_dx_heating_coil(
        &mut self,
        config: &BypassVavConfig,
        context: &CalcContext,
        inlet: &AirNode,
        part_load_fraction: f64,
    ) -> anyhow::Result<(TrialOperatingPoint, CoilOutput)> {
        let HeatingCoil::DxMultiSpeed(coil) = &mut self.heating_coil else {
            anyhow::bail!("Heating coil of the bypass unit is not a DX coil");
        };
        let setpoint = min_of_2(context.coil_setpoint, config.max_outlet_temperature);

        if coil.number_of_speeds() > 1 {
            return solve_variable_speed(
                coil,
                &mut self.diagnostics,
                inlet,
                &context.outdoor,
                setpoint,
                HeatCoolMode::Heating,
            );
        }

        let outdoor = context.outdoor;
        let request = |fraction: f64| {
            CoilRequest::from_trial(TrialOperatingPoint::cycling(fraction), CoilMode::Normal)
        };
        let start = coil.simulate(inlet, request(part_load_fraction), &outdoor)?;
        if !(start.outlet.temperature > context.coil_setpoint
            && inlet.temperature < context.coil_setpoint)
        {
            return Ok((TrialOperatingPoint::cycling(part_load_fraction), start));
        }

        let result = solve_root(
            SMALL_TEMP_DIFF,
            MAX_ITERATIONS,
            |fraction| Ok(setpoint - coil.simulate(inlet, request(fraction), &outdoor)?.outlet.temperature),
            0.,
            1.,
            BracketFailurePolicy::Extrapolate,
        );
        let fraction =
            accept_outlet_temperature_solution(&mut self.diagnostics, result, "heating coil")?;
        let output = coil.simulate(inlet, request(fraction), &outdoor)?;
        Ok((TrialOperatingPoint::cycling(fraction), output))
    }
}

/// Record warnings for an inexact part-load solution on outlet temperature
fn accept_outlet_temperature_solution(
    diagnostics: &mut Diagnostics,
    result: anyhow::Result<RootSolution>,
    coil: &str,
) -> anyhow::Result<f64> {
    let solution = result?;
    match solution.status {
        RootStatus::Converged => {}
        RootStatus::IterationLimitExceeded => diagnostics.warn(
            WarningKind::OutletTemperatureIterationLimit,
            format!(
                "Iteration limit exceeded calculating the {coil} part-load ratio; the calculated value {:.3} is used",
                solution.value
            ),
        ),
        RootStatus::BracketFailure => diagnostics.warn(
            WarningKind::OutletTemperatureBracketFailure,
            format!(
                "{coil} part-load ratio calculation failed: limits exceeded; an estimated value of {:.3} is used",
                solution.value
            ),
        ),
    }
    Ok(clamp_fraction(solution.value))
}

/// Control a DX coil with several speeds to an outlet temperature, searching the speeds
/// on the enthalpy change the setpoint asks for.
fn solve_variable_speed(
    coil: &mut DxCoil,
    diagnostics: &mut Diagnostics,
    inlet: &AirNode,
    outdoor: &OutdoorConditions,
    setpoint: f64,
    mode: HeatCoolMode,
) -> anyhow::Result<(TrialOperatingPoint, CoilOutput)> {
    let max_speed = coil.number_of_speeds();
    let mut device = CoilTrial {
        coil,
        inlet: *inlet,
        outdoor: *outdoor,
        last: Default::default(),
    };

    let no_output = device.simulate(TrialOperatingPoint::Off)?.sensible;
    let full_trial = TrialOperatingPoint::full_at_speed(max_speed);
    let full_output = device.simulate(full_trial)?.sensible;
    let full_outlet = device.last.outlet;
    let required = inlet.mass_flow_rate
        * (enthalpy(setpoint, full_outlet.humidity_ratio)
            - enthalpy(inlet.temperature, full_outlet.humidity_ratio));

    let (no_run, run_full) = match mode {
        HeatCoolMode::Cooling => (
            no_output - required < LOAD_ACCURACY,
            full_output - required > LOAD_ACCURACY,
        ),
        _ => (
            required - no_output < LOAD_ACCURACY,
            required - full_output > LOAD_ACCURACY,
        ),
    };
    let trial = if no_run {
        TrialOperatingPoint::Off
    } else if run_full {
        full_trial
    } else {
        let request = SpeedSolveRequest::new(required, mode, max_speed)
            .with_policy(BracketFailurePolicy::Extrapolate);
        SpeedSolver::new(diagnostics).scan_and_solve(&mut device, &request, 1)?
    };

    device.simulate(trial)?;
    Ok((trial, device.last))
}
