use crate::core::hvac::air_flow::AirFlowRates;
use crate::core::hvac::bypass_vav::{
    BypassVav, BypassVavConditions, BypassVavConfig, TerminalBox, ZoneConditions,
};
use crate::core::hvac::coils::{
    CapacityModifier, CrankcaseHeater, Defrost, DxCoil, DxService, DxSpeed, FuelCoil, FuelStage,
    HeatingCoil, HotWaterCoil, MultiStageFuelCoil, SteamCoil,
};
use crate::core::hvac::device::ThermostatMode;
use crate::core::hvac::fan::Fan;
use crate::core::hvac::integrated_heat_pump::{
    IhpCoils, IhpConditions, IntegratedHeatPump, IntegratedHeatPumpConfig,
};
use crate::core::hvac::multispeed_heat_pump::{
    HeatRecoveryConfig, HeatRecoveryInlet, MshpConditions, MultiSpeedHeatPump,
    MultiSpeedHeatPumpConfig,
};
use crate::core::hvac::operating_mode::IhpModeThresholds;
use crate::core::hvac::report::UnitReportRow;
use crate::core::hvac::zone_load::{single_zone_load, ZoneDemand};
use crate::core::hvac::{AirNode, OutdoorConditions, SMALL_AIR_VOL_FLOW};
use crate::core::material_properties::STANDARD_AIR;
use crate::errors::ConfigurationError;
use crate::input::{
    BypassVavInput, DxCoilInput, DxSpeedInput, FanInput, HeatingCoilInput, Input, IntegratedHeatPumpInput,
    MultiSpeedHeatPumpInput, StepConditionsInput, UnitInput, UnitStepInput, ZoneConditionsInput,
};
use crate::simulation_time::{SimulationTime, SimulationTimeIteration};
use anyhow::anyhow;
use indexmap::IndexMap;
use tracing::{debug, info};

/// Timestep results per unit, keyed by unit name, in input order
pub type RunResults = IndexMap<String, Vec<UnitReportRow>>;

/// A configured unit together with the zones it reads each timestep.
#[derive(Clone, Debug)]
pub enum Unit {
    MultiSpeedHeatPump {
        unit: MultiSpeedHeatPump,
        zone: String,
    },
    BypassVav {
        unit: BypassVav,
        /// Zone of each terminal box, with the box's maximum flow in kg/s
        boxes: Vec<(String, f64)>,
        /// Return air flow offered to the unit, in kg/s
        air_mass_flow_rate: f64,
    },
    IntegratedHeatPump {
        unit: IntegratedHeatPump,
        zone: String,
        air_mass_flow_rate: f64,
    },
}

/// What a unit is called with for one timestep, shared by all unit families.
struct StepContext<'a> {
    step: &'a SimulationTimeIteration,
    day: u32,
    warmup: bool,
    first_iteration: bool,
    outdoor: OutdoorConditions,
    zones: &'a IndexMap<String, ZoneConditionsInput>,
    signals: &'a UnitStepInput,
}

impl Unit {
    pub fn name(&self) -> &str {
        match self {
            Self::MultiSpeedHeatPump { unit, .. } => unit.name(),
            Self::BypassVav { unit, .. } => unit.name(),
            Self::IntegratedHeatPump { unit, .. } => unit.name(),
        }
    }

    pub fn summarise_warnings(&self) {
        match self {
            Self::MultiSpeedHeatPump { unit, .. } => unit.summarise_warnings(),
            Self::BypassVav { unit, .. } => unit.summarise_warnings(),
            Self::IntegratedHeatPump { unit, .. } => unit.summarise_warnings(),
        }
    }

    fn simulate(&mut self, context: &StepContext) -> anyhow::Result<UnitReportRow> {
        let StepContext {
            step,
            day,
            warmup,
            first_iteration,
            outdoor,
            zones,
            signals,
        } = *context;
        let zone = |name: &str| {
            zones
                .get(name)
                .ok_or_else(|| anyhow!("No conditions supplied for zone '{name}'"))
        };

        match self {
            Self::MultiSpeedHeatPump { unit, zone: name } => {
                let zone = zone(name)?;
                let demand = zone_demand(zone);
                let air = AirNode::new(
                    zone.temperature,
                    zone.humidity_ratio,
                    unit.fan().max_mass_flow_rate(),
                );
                unit.set_warmup(warmup);
                let conditions = MshpConditions {
                    time: step.time,
                    timestep_seconds: step.timestep_seconds(),
                    inlet: air,
                    zone: air,
                    load: single_zone_load(&demand),
                    in_deadband: zone.deadband,
                    outdoor,
                    available: signals.available,
                    thermostat: signals
                        .staged_speed
                        .map_or(ThermostatMode::Continuous, ThermostatMode::Staged),
                    economizer_active: signals.economizer_active,
                    speed_override: signals.speed_override,
                    heat_recovery_inlet: signals.heat_recovery_inlet.map(|inlet| {
                        HeatRecoveryInlet {
                            mass_flow_rate: inlet.mass_flow_rate,
                            temperature: inlet.temperature,
                        }
                    }),
                };
                Ok(unit.simulate(&conditions, first_iteration)?.row)
            }
            Self::BypassVav {
                unit,
                boxes,
                air_mass_flow_rate,
            } => {
                let mut zone_conditions = Vec::with_capacity(boxes.len());
                let mut weighted = (0., 0., 0.);
                for (name, max_flow) in boxes.iter() {
                    let zone = zone(name)?;
                    weighted.0 += max_flow * zone.temperature;
                    weighted.1 += max_flow * zone.humidity_ratio;
                    weighted.2 += max_flow;
                    zone_conditions.push(ZoneConditions {
                        demand: zone_demand(zone),
                        air: AirNode::new(zone.temperature, zone.humidity_ratio, 0.),
                        box_mass_flow_rate: signals.box_air_mass_flow_rates.get(name).copied(),
                    });
                }
                let (temperature, humidity_ratio, total_flow) = weighted;
                // return air is the mix of the boxes' zones
                let inlet = if total_flow > 0. {
                    AirNode::new(
                        temperature / total_flow,
                        humidity_ratio / total_flow,
                        *air_mass_flow_rate,
                    )
                } else {
                    let count = zone_conditions.len().max(1) as f64;
                    AirNode::new(
                        zone_conditions.iter().map(|z| z.air.temperature).sum::<f64>() / count,
                        zone_conditions.iter().map(|z| z.air.humidity_ratio).sum::<f64>() / count,
                        *air_mass_flow_rate,
                    )
                };
                let conditions = BypassVavConditions {
                    time: step.time,
                    day,
                    warmup,
                    first_iteration,
                    timestep_seconds: step.timestep_seconds(),
                    inlet,
                    zones: &zone_conditions,
                    outdoor,
                    available: signals.available,
                    max_outlet_humidity_ratio: signals.max_outlet_humidity_ratio,
                };
                Ok(unit.simulate(&conditions)?.row)
            }
            Self::IntegratedHeatPump {
                unit,
                zone: name,
                air_mass_flow_rate,
            } => {
                let zone = zone(name)?;
                // an unavailable unit sees no calls
                let (sensible_load, latent_load, water_heating_call, water_heating_load) =
                    if signals.available {
                        (
                            single_zone_load(&zone_demand(zone)),
                            zone.latent_load,
                            signals.water_heating_call,
                            signals.water_heating_load,
                        )
                    } else {
                        (0., 0., false, 0.)
                    };
                let conditions = IhpConditions {
                    time: step.time,
                    day,
                    warmup,
                    first_iteration,
                    timestep_seconds: step.timestep_seconds(),
                    inlet: AirNode::new(
                        zone.temperature,
                        zone.humidity_ratio,
                        *air_mass_flow_rate,
                    ),
                    sensible_load,
                    latent_load,
                    water_heating_call,
                    water_heating_load,
                    indoor_temperature: zone.temperature,
                    outdoor,
                };
                Ok(unit.simulate(&conditions)?.row)
            }
        }
    }
}

fn zone_demand(zone: &ZoneConditionsInput) -> ZoneDemand {
    ZoneDemand::new(
        zone.load_to_cooling_setpoint,
        zone.load_to_heating_setpoint,
        zone.deadband,
    )
}

#[derive(Debug)]
pub struct Corpus {
    simulation_time: SimulationTime,
    warmup_days: u32,
    iterations_per_step: usize,
    barometric_pressure: f64,
    units: Vec<Unit>,
    conditions: Vec<StepConditionsInput>,
}

impl Corpus {
    pub fn from_inputs(input: Input) -> Result<Self, ConfigurationError> {
        let units = input
            .units
            .iter()
            .map(|(name, unit)| unit_from_input(name, unit))
            .collect::<Result<Vec<_>, _>>()?;

        for (name, unit) in &input.units {
            for zone in unit.zones() {
                if input
                    .conditions
                    .iter()
                    .any(|step| !step.zones.contains_key(zone))
                {
                    return Err(ConfigurationError::MissingZone {
                        unit: name.clone(),
                        zone: zone.to_owned(),
                    });
                }
            }
        }

        Ok(Self {
            simulation_time: input.simulation_time,
            warmup_days: input.warmup_days,
            iterations_per_step: input.iterations_per_step,
            barometric_pressure: input.barometric_pressure,
            units,
            conditions: input.conditions,
        })
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Warm up on the first day, then run every timestep, calling each unit
    /// `iterations_per_step` times and keeping the results of the last call.
    pub fn run(&mut self) -> anyhow::Result<RunResults> {
        let mut results: RunResults = self
            .units
            .iter()
            .map(|unit| {
                (
                    unit.name().to_owned(),
                    Vec::with_capacity(self.simulation_time.total_steps()),
                )
            })
            .collect();

        if self.warmup_days > 0 {
            info!(days = self.warmup_days, "warming up");
        }
        for (day, step) in self.simulation_time.warmup_iter(self.warmup_days) {
            self.run_step(&step, day, true)?;
        }

        for step in self.simulation_time.iter() {
            let rows = self.run_step(&step, step.current_day(), false)?;
            for (unit_results, row) in results.values_mut().zip(rows) {
                unit_results.push(row);
            }
        }

        for unit in &self.units {
            unit.summarise_warnings();
        }

        Ok(results)
    }

    fn run_step(
        &mut self,
        step: &SimulationTimeIteration,
        day: u32,
        warmup: bool,
    ) -> anyhow::Result<Vec<UnitReportRow>> {
        let conditions = self
            .conditions
            .get(step.index)
            .ok_or_else(|| anyhow!("No conditions supplied for timestep {}", step.index))?;
        let outdoor = OutdoorConditions {
            barometric_pressure: self.barometric_pressure,
            ..OutdoorConditions::new(
                conditions.outdoor_temperature,
                conditions.outdoor_humidity_ratio,
            )
        };
        let default_signals = UnitStepInput::default();

        let mut rows = Vec::with_capacity(self.units.len());
        for unit in self.units.iter_mut() {
            let signals = conditions.units.get(unit.name()).unwrap_or(&default_signals);
            let mut row = UnitReportRow::default();
            for iteration in 0..self.iterations_per_step {
                let context = StepContext {
                    step,
                    day,
                    warmup,
                    first_iteration: iteration == 0,
                    outdoor,
                    zones: &conditions.zones,
                    signals,
                };
                row = unit.simulate(&context).map_err(|err| {
                    err.context(format!("Unit '{}' failed at hour {}", unit.name(), step.time))
                })?;
            }
            debug!(unit = unit.name(), time = step.time, mode = %row.mode, "timestep complete");
            rows.push(row);
        }

        Ok(rows)
    }
}

fn unit_from_input(name: &str, input: &UnitInput) -> Result<Unit, ConfigurationError> {
    match input {
        UnitInput::MultiSpeedHeatPump(input) => mshp_from_input(name, input),
        UnitInput::ChangeoverBypassVav(input) => bypass_vav_from_input(name, input),
        UnitInput::IntegratedHeatPump(input) => ihp_from_input(name, input),
    }
}

fn invalid(unit: &str, error: anyhow::Error) -> ConfigurationError {
    ConfigurationError::Invalid {
        unit: unit.to_owned(),
        message: error.to_string(),
    }
}

/// Mass flows of standard air for rated volume flows, rejecting flows too small to run on
fn air_mass_flow_rates(
    unit: &str,
    service: &'static str,
    volume_flow_rates: &[f64],
) -> Result<Vec<f64>, ConfigurationError> {
    if volume_flow_rates.is_empty() {
        return Err(ConfigurationError::NoSpeeds {
            unit: unit.to_owned(),
            service,
        });
    }
    if let Some(flow) = volume_flow_rates
        .iter()
        .find(|flow| **flow < SMALL_AIR_VOL_FLOW)
    {
        return Err(ConfigurationError::Invalid {
            unit: unit.to_owned(),
            message: format!("{service} air flow of {flow} m3/s is too small to run on"),
        });
    }
    Ok(volume_flow_rates
        .iter()
        .map(|flow| STANDARD_AIR.mass_flow_rate(*flow))
        .collect())
}

fn fan_from_input(input: &FanInput) -> Fan {
    Fan::new(
        input.rated_power,
        STANDARD_AIR.mass_flow_rate(input.max_air_volume_flow_rate),
    )
}

fn dx_speeds(speeds: &[DxSpeedInput]) -> Vec<DxSpeed> {
    speeds
        .iter()
        .map(|speed| DxSpeed {
            capacity: speed.capacity,
            cop: speed.cop,
            sensible_heat_ratio: speed.sensible_heat_ratio,
            air_volume_flow_rate: speed.air_volume_flow_rate,
            water_volume_flow_rate: speed.water_volume_flow_rate,
        })
        .collect()
}

fn dx_coil_from_input(
    unit: &str,
    coil_name: &str,
    service: DxService,
    service_name: &'static str,
    input: &DxCoilInput,
) -> Result<DxCoil, ConfigurationError> {
    if input.speeds.is_empty() {
        return Err(ConfigurationError::NoSpeeds {
            unit: unit.to_owned(),
            service: service_name,
        });
    }
    let mut coil = DxCoil::new(coil_name, service, dx_speeds(&input.speeds))
        .map_err(|err| invalid(unit, err))?
        .with_min_outdoor_temperature(input.min_outdoor_temperature)
        .with_defrost(input.defrost.map(|defrost| Defrost {
            max_outdoor_temperature: defrost.max_outdoor_temperature,
            capacity_penalty: defrost.capacity_penalty,
            heater_power: defrost.heater_power,
        }))
        .with_crankcase_heater(input.crankcase_heater.map(|heater| CrankcaseHeater {
            power: heater.power,
            max_outdoor_temperature: heater.max_outdoor_temperature,
        }));
    if let Some(enhanced) = &input.enhanced_speeds {
        if enhanced.len() != input.speeds.len() {
            return Err(ConfigurationError::InconsistentSpeedCount {
                unit: unit.to_owned(),
                service: "enhanced dehumidification",
                expected: input.speeds.len(),
                found: enhanced.len(),
            });
        }
        coil = coil.with_enhanced_speeds(dx_speeds(enhanced));
    }
    if let Some(modifier) = &input.capacity_modifier {
        coil = coil.with_capacity_modifier(
            CapacityModifier::new(
                modifier.outdoor_temperatures.clone(),
                modifier.multipliers.clone(),
            )
            .map_err(|err| invalid(unit, err))?,
        );
    }
    Ok(coil)
}

fn heating_coil_from_input(
    unit: &str,
    coil_name: &str,
    input: &HeatingCoilInput,
) -> Result<HeatingCoil, ConfigurationError> {
    let coil = match input {
        HeatingCoilInput::DxMultiSpeed(coil) => HeatingCoil::DxMultiSpeed(dx_coil_from_input(
            unit,
            coil_name,
            DxService::Heating,
            "heating",
            coil,
        )?),
        HeatingCoilInput::MultiStage(coil) => HeatingCoil::MultiStage(
            MultiStageFuelCoil::new(
                coil_name,
                coil.fuel,
                coil.stages
                    .iter()
                    .map(|stage| FuelStage {
                        capacity: stage.capacity,
                        efficiency: stage.efficiency,
                        parasitic_electric_load: stage.parasitic_electric_load,
                    })
                    .collect(),
            )
            .map_err(|err| invalid(unit, err))?,
        ),
        HeatingCoilInput::Fuel(coil) => HeatingCoil::Fuel(
            FuelCoil::new(
                coil_name,
                coil.fuel,
                FuelStage {
                    capacity: coil.stage.capacity,
                    efficiency: coil.stage.efficiency,
                    parasitic_electric_load: coil.stage.parasitic_electric_load,
                },
            )
            .map_err(|err| invalid(unit, err))?,
        ),
        HeatingCoilInput::HotWater(coil) => HeatingCoil::HotWater(HotWaterCoil::new(
            coil_name,
            coil.max_water_mass_flow_rate,
            coil.inlet_water_temperature,
            coil.effectiveness,
        )),
        HeatingCoilInput::Steam(coil) => {
            HeatingCoil::Steam(SteamCoil::new(coil_name, coil.max_steam_mass_flow_rate))
        }
    };
    Ok(coil)
}

fn mshp_from_input(name: &str, input: &MultiSpeedHeatPumpInput) -> Result<Unit, ConfigurationError> {
    let config = MultiSpeedHeatPumpConfig {
        name: name.to_owned(),
        fan_placement: input.fan_placement,
        air_flows: AirFlowRates {
            cooling: air_mass_flow_rates(name, "cooling", &input.cooling_air_volume_flow_rates)?,
            heating: air_mass_flow_rates(name, "heating", &input.heating_air_volume_flow_rates)?,
            idle: STANDARD_AIR.mass_flow_rate(input.no_load_air_volume_flow_rate),
            off_cycle_flow: input.off_cycle_flow,
            fan_operation: input.fan_operation,
        },
        max_supply_air_temperature: input.max_supply_air_temperature,
        supplemental_heater_max_outdoor_temperature: input
            .supplemental_heater_max_outdoor_temperature,
        aux_on_cycle_power: input.aux_on_cycle_power,
        aux_off_cycle_power: input.aux_off_cycle_power,
        heat_recovery: input.heat_recovery.map(|recovery| HeatRecoveryConfig {
            max_outlet_temperature: recovery.max_outlet_temperature,
            compressor_heat_rejection_fraction: recovery.compressor_heat_rejection_fraction,
        }),
        direct_solution: input.direct_solution,
    };
    let cooling_coil = dx_coil_from_input(
        name,
        &format!("{name} cooling coil"),
        DxService::Cooling,
        "cooling",
        &input.cooling_coil,
    )?;
    let heating_coil =
        heating_coil_from_input(name, &format!("{name} heating coil"), &input.heating_coil)?;
    let supplemental_heater = input
        .supplemental_heater
        .as_ref()
        .map(|heater| heating_coil_from_input(name, &format!("{name} supplemental heater"), heater))
        .transpose()?;

    let unit = MultiSpeedHeatPump::new(
        config,
        fan_from_input(&input.fan),
        cooling_coil,
        heating_coil,
        supplemental_heater,
    )?;
    Ok(Unit::MultiSpeedHeatPump {
        unit,
        zone: input.zone.clone(),
    })
}

fn bypass_vav_from_input(name: &str, input: &BypassVavInput) -> Result<Unit, ConfigurationError> {
    let boxes: Vec<TerminalBox> = input
        .boxes
        .iter()
        .map(|terminal| TerminalBox {
            zone: terminal.zone.clone(),
            max_mass_flow_rate: STANDARD_AIR.mass_flow_rate(terminal.max_air_volume_flow_rate),
            min_mass_flow_rate: STANDARD_AIR.mass_flow_rate(terminal.min_air_volume_flow_rate),
        })
        .collect();
    let box_flows = boxes
        .iter()
        .map(|terminal| (terminal.zone.clone(), terminal.max_mass_flow_rate))
        .collect();
    let config = BypassVavConfig {
        name: name.to_owned(),
        fan_placement: input.fan_placement,
        fan_operation: input.fan_operation,
        priority: input.priority_control,
        min_mode_change_time: input.min_mode_change_time,
        cooling_air_flow: STANDARD_AIR.mass_flow_rate(input.cooling_air_volume_flow_rate),
        heating_air_flow: STANDARD_AIR.mass_flow_rate(input.heating_air_volume_flow_rate),
        no_load_air_flow: STANDARD_AIR.mass_flow_rate(input.no_load_air_volume_flow_rate),
        min_outlet_temperature: input.min_outlet_temperature,
        max_outlet_temperature: input.max_outlet_temperature,
        min_outdoor_temperature_for_compressor: input.min_outdoor_temperature_for_compressor,
        dehumidification: input.dehumidification_control,
        boxes,
    };
    let air_mass_flow_rate = config
        .cooling_air_flow
        .max(config.heating_air_flow)
        .max(config.no_load_air_flow);
    let cooling_coil = dx_coil_from_input(
        name,
        &format!("{name} cooling coil"),
        DxService::Cooling,
        "cooling",
        &input.cooling_coil,
    )?;
    let heating_coil =
        heating_coil_from_input(name, &format!("{name} heating coil"), &input.heating_coil)?;

    let unit = BypassVav::new(config, fan_from_input(&input.fan), cooling_coil, heating_coil)?;
    Ok(Unit::BypassVav {
        unit,
        boxes: box_flows,
        air_mass_flow_rate,
    })
}

fn ihp_from_input(name: &str, input: &IntegratedHeatPumpInput) -> Result<Unit, ConfigurationError> {
    let coil = |slot: &str, service: DxService, service_name: &'static str, coil: &DxCoilInput| {
        dx_coil_from_input(name, &format!("{name} {slot} coil"), service, service_name, coil)
    };
    let coils_input = &input.coils;
    let coils = IhpCoils {
        space_cooling: coil(
            "space cooling",
            DxService::Cooling,
            "space cooling",
            &coils_input.space_cooling,
        )?,
        space_heating: coil(
            "space heating",
            DxService::Heating,
            "space heating",
            &coils_input.space_heating,
        )?,
        dedicated_water_heating: coil(
            "dedicated water heating",
            DxService::WaterHeating,
            "dedicated water heating",
            &coils_input.dedicated_water_heating,
        )?,
        cooling_with_water_heating: coil(
            "cooling with water heating",
            DxService::CoolingWithWaterHeating,
            "cooling with water heating",
            &coils_input.cooling_with_water_heating,
        )?,
        scdwh_cooling: coil(
            "SCDWH cooling",
            DxService::Cooling,
            "cooling with small water heating",
            &coils_input.scdwh_cooling,
        )?,
        scdwh_water_heating: coil(
            "SCDWH water heating",
            DxService::WaterHeating,
            "cooling with small water heating",
            &coils_input.scdwh_water_heating,
        )?,
        shdwh_heating: coil(
            "SHDWH heating",
            DxService::Heating,
            "space and water heating",
            &coils_input.shdwh_heating,
        )?,
        shdwh_water_heating: coil(
            "SHDWH water heating",
            DxService::WaterHeating,
            "space and water heating",
            &coils_input.shdwh_water_heating,
        )?,
    };
    let config = IntegratedHeatPumpConfig {
        name: name.to_owned(),
        thresholds: IhpModeThresholds {
            indoor_over_cool_allow: input.indoor_over_cool_allow,
            ambient_over_cool_allow: input.ambient_over_cool_allow,
            indoor_water_heating_high_priority: input.indoor_water_heating_high_priority,
            ambient_water_heating_high_priority: input.ambient_water_heating_high_priority,
            water_volume_scdwh: input.water_volume_scdwh,
            time_limit_shdwh: input.time_limit_shdwh,
            match_scwh: input.match_scwh,
        },
        min_mode_change_time: input.min_mode_change_time,
        min_speed_scwh: input.min_speed_scwh,
        min_speed_scdwh: input.min_speed_scdwh,
        min_speed_shdwh: input.min_speed_shdwh,
        cooling_volume_flow_scale: input.cooling_volume_flow_scale,
        heating_volume_flow_scale: input.heating_volume_flow_scale,
        max_cooling_air_mass_flow_rate: STANDARD_AIR
            .mass_flow_rate(input.max_cooling_air_volume_flow_rate),
        max_heating_air_mass_flow_rate: STANDARD_AIR
            .mass_flow_rate(input.max_heating_air_volume_flow_rate),
        aux_water_heater_capacity: input.aux_water_heater_capacity,
    };
    let air_mass_flow_rate = config
        .max_cooling_air_mass_flow_rate
        .max(config.max_heating_air_mass_flow_rate);

    let unit = IntegratedHeatPump::new(config, coils)?;
    Ok(Unit::IntegratedHeatPump {
        unit,
        zone: input.zone.clone(),
        air_mass_flow_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn coil_input() -> DxCoilInput {
        serde_json::from_value(json!({
            "Speeds": [
                {"Capacity": 3000, "Cop": 3.2, "SensibleHeatRatio": 0.8},
                {"Capacity": 6000, "Cop": 3.0, "SensibleHeatRatio": 0.75}
            ]
        }))
        .unwrap()
    }

    #[rstest]
    fn should_convert_volume_flows_with_standard_air() {
        assert_eq!(
            air_mass_flow_rates("unit", "cooling", &[0.25, 0.5]).unwrap(),
            vec![0.3, 0.6]
        );
    }

    #[rstest]
    fn should_reject_missing_or_tiny_air_flows() {
        assert_eq!(
            air_mass_flow_rates("unit", "heating", &[]).unwrap_err(),
            ConfigurationError::NoSpeeds {
                unit: "unit".to_string(),
                service: "heating"
            }
        );
        assert!(matches!(
            air_mass_flow_rates("unit", "heating", &[0.3, 0.0001]),
            Err(ConfigurationError::Invalid { .. })
        ));
    }

    #[rstest]
    fn should_build_coil_with_its_options(mut coil_input: DxCoilInput) {
        coil_input.enhanced_speeds = Some(coil_input.speeds.clone());
        let coil = dx_coil_from_input(
            "unit",
            "unit cooling coil",
            DxService::Cooling,
            "cooling",
            &coil_input,
        )
        .unwrap();

        assert_eq!(coil.name(), "unit cooling coil");
        assert_eq!(coil.number_of_speeds(), 2);
        assert!(coil.has_enhanced_mode());
    }

    #[rstest]
    fn should_reject_enhanced_speeds_of_different_count(mut coil_input: DxCoilInput) {
        coil_input.enhanced_speeds = Some(coil_input.speeds[..1].to_vec());
        let result = dx_coil_from_input(
            "unit",
            "unit cooling coil",
            DxService::Cooling,
            "cooling",
            &coil_input,
        );

        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::InconsistentSpeedCount {
                unit: "unit".to_string(),
                service: "enhanced dehumidification",
                expected: 2,
                found: 1,
            }
        );
    }

    #[rstest]
    fn should_reject_coil_without_speeds(mut coil_input: DxCoilInput) {
        coil_input.speeds.clear();
        let result = dx_coil_from_input(
            "unit",
            "unit cooling coil",
            DxService::Cooling,
            "cooling",
            &coil_input,
        );

        assert!(matches!(result, Err(ConfigurationError::NoSpeeds { .. })));
    }
}
