use crate::compare_floats::{clamp_fraction, max_of_2, min_of_2};
use crate::core::hvac::device::TrialOperatingPoint;
use crate::core::hvac::{AirNode, OutdoorConditions};
use crate::core::material_properties::{HOT_WATER, STEAM_LATENT_HEAT};
use crate::core::psychrometrics::{
    temperature_from_enthalpy, LATENT_HEAT_AT_ZERO_C, MIN_HUMIDITY_RATIO,
};
use anyhow::bail;
use interp::{interp, InterpMode};
use serde::Deserialize;
use serde_enum_str::Deserialize_enum_str;

/// This module provides reference models of the coils a unit drives: direct-expansion
/// coils with discrete speeds, staged and single-stage fuel-fired or electric heaters, and
/// hot water and steam coils. They are deliberately simple; the controllers only rely on
/// the contract of the `Coil` trait.

macro_rules! per_heating_coil {
    ($val:expr, $pattern:pat => { $res:expr }) => {
        match $val {
            HeatingCoil::DxMultiSpeed($pattern) => $res,
            HeatingCoil::MultiStage($pattern) => $res,
            HeatingCoil::Fuel($pattern) => $res,
            HeatingCoil::HotWater($pattern) => $res,
            HeatingCoil::Steam($pattern) => $res,
        }
    };
}

/// Dehumidification mode of a coil that has one
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum CoilMode {
    #[default]
    Normal,
    Enhanced,
}

/// What a coil is asked to do for one simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CoilRequest {
    Off,
    /// Run at a speed (or stage), cycling at speed 1 or interpolating above it
    Staged {
        speed: usize,
        speed_ratio: f64,
        part_load_fraction: f64,
        mode: CoilMode,
    },
    /// Meet a heating load, in W
    Load(f64),
    /// Run with the given heating fluid flow, in kg/s, optionally limited to a load in W
    Fluid {
        mass_flow_rate: f64,
        load: Option<f64>,
    },
}

impl CoilRequest {
    pub fn from_trial(trial: TrialOperatingPoint, mode: CoilMode) -> Self {
        match trial {
            TrialOperatingPoint::Off => Self::Off,
            _ => Self::Staged {
                speed: trial.speed_number(),
                speed_ratio: trial.speed_ratio(),
                part_load_fraction: trial.part_load_fraction(),
                mode,
            },
        }
    }
}

/// Result of one coil simulation. Heat flows are signed from the point of view of the air:
/// negative capacities are heat removed from it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CoilOutput {
    pub outlet: AirNode,
    pub total_capacity: f64,
    pub sensible_capacity: f64,
    pub latent_capacity: f64,
    /// Heat delivered to water, in W
    pub water_heating: f64,
    /// Compressor or heater electrical power, in W
    pub electrical_power: f64,
    /// Fuel burnt, in W
    pub fuel_rate: f64,
    pub defrost_power: f64,
    pub crankcase_heater_power: f64,
    pub runtime_fraction: f64,
    /// Heating fluid flow through the coil, in kg/s
    pub fluid_mass_flow_rate: f64,
}

impl CoilOutput {
    fn idle(inlet: &AirNode) -> Self {
        Self {
            outlet: *inlet,
            ..Default::default()
        }
    }

    /// All electrical power drawn by the coil, in W
    pub fn total_electrical_power(&self) -> f64 {
        self.electrical_power + self.defrost_power + self.crankcase_heater_power
    }

    /// Heat delivered to the air, in W; zero when the coil removes heat
    pub fn heating_delivered(&self) -> f64 {
        max_of_2(self.total_capacity, 0.)
    }
}

/// Behaviour shared by every coil a unit drives.
pub trait Coil {
    fn simulate(
        &mut self,
        inlet: &AirNode,
        request: CoilRequest,
        outdoor: &OutdoorConditions,
    ) -> anyhow::Result<CoilOutput>;

    /// Outdoor temperature at or below which the compressor cannot run, if the coil has one
    fn minimum_outdoor_temperature_for_compressor(&self) -> Option<f64> {
        None
    }

    fn last_output(&self) -> &CoilOutput;
}

/// Whether a coil's compressor can run at the given outdoor temperature
pub fn compressor_allowed(coil: &impl Coil, outdoor: &OutdoorConditions) -> bool {
    coil.minimum_outdoor_temperature_for_compressor()
        .map_or(true, |minimum| outdoor.temperature > minimum)
}

/// Apply heat and moisture changes to the air passing through a coil
fn condition_air(inlet: &AirNode, total_heat: f64, moisture_removed: f64) -> AirNode {
    if !inlet.has_flow() {
        return *inlet;
    }
    let enthalpy_out = inlet.enthalpy() + total_heat / inlet.mass_flow_rate;
    let humidity_ratio_out = max_of_2(
        inlet.humidity_ratio - moisture_removed / inlet.mass_flow_rate,
        MIN_HUMIDITY_RATIO,
    );
    AirNode {
        temperature: temperature_from_enthalpy(enthalpy_out, humidity_ratio_out),
        humidity_ratio: humidity_ratio_out,
        ..*inlet
    }
}

/// Interpolate a per-speed quantity at a speed, cycling at speed 1 and blending with the
/// speed below above it.
fn staged_value(values: &[f64], speed: usize, speed_ratio: f64, part_load_fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    let speed = speed.clamp(1, values.len());
    if speed == 1 {
        part_load_fraction * values[0]
    } else {
        speed_ratio * values[speed - 1] + (1. - speed_ratio) * values[speed - 2]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DxSpeed {
    /// Gross rated capacity, in W
    pub capacity: f64,
    pub cop: f64,
    pub sensible_heat_ratio: f64,
    /// Rated air flow, in m3/s
    pub air_volume_flow_rate: f64,
    /// Rated water flow for water heating services, in m3/s
    pub water_volume_flow_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DxService {
    Cooling,
    Heating,
    /// Condenser heat to water, evaporator heat from the air
    WaterHeating,
    /// Cooling the air with the condenser heat going to water
    CoolingWithWaterHeating,
}

/// Capacity multiplier interpolated against outdoor temperature
#[derive(Clone, Debug, PartialEq)]
pub struct CapacityModifier {
    outdoor_temperatures: Vec<f64>,
    multipliers: Vec<f64>,
}

impl CapacityModifier {
    pub fn new(outdoor_temperatures: Vec<f64>, multipliers: Vec<f64>) -> anyhow::Result<Self> {
        if outdoor_temperatures.is_empty() || outdoor_temperatures.len() != multipliers.len() {
            bail!("Capacity modifier needs one multiplier per outdoor temperature");
        }
        if outdoor_temperatures.windows(2).any(|pair| pair[1] <= pair[0]) {
            bail!("Capacity modifier outdoor temperatures must be increasing");
        }
        Ok(Self {
            outdoor_temperatures,
            multipliers,
        })
    }

    pub fn at(&self, outdoor_temperature: f64) -> f64 {
        let lowest = self.outdoor_temperatures[0];
        let highest = self.outdoor_temperatures[self.outdoor_temperatures.len() - 1];
        interp(
            &self.outdoor_temperatures,
            &self.multipliers,
            max_of_2(lowest, min_of_2(outdoor_temperature, highest)),
            &InterpMode::default(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Defrost {
    /// Defrost runs below this outdoor temperature, in degC
    pub max_outdoor_temperature: f64,
    /// Fraction of heating capacity lost to defrost
    pub capacity_penalty: f64,
    /// Resistive defrost heater power, in W
    pub heater_power: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrankcaseHeater {
    pub power: f64,
    /// The heater runs below this outdoor temperature while the compressor is off, in degC
    pub max_outdoor_temperature: f64,
}

/// Direct-expansion coil with one or more discrete speeds.
#[derive(Clone, Debug)]
pub struct DxCoil {
    name: String,
    service: DxService,
    speeds: Vec<DxSpeed>,
    enhanced_speeds: Option<Vec<DxSpeed>>,
    capacity_modifier: Option<CapacityModifier>,
    min_outdoor_temperature: Option<f64>,
    defrost: Option<Defrost>,
    crankcase_heater: Option<CrankcaseHeater>,
    last: CoilOutput,
}

impl DxCoil {
    /// Arguments:
    /// * `name` - used in messages
    /// * `service` - what the coil does with the heat it moves
    /// * `speeds` - rated performance per speed, lowest first
    pub fn new(name: &str, service: DxService, speeds: Vec<DxSpeed>) -> anyhow::Result<Self> {
        if speeds.is_empty() {
            bail!("DX coil '{name}' has no speeds");
        }
        if speeds.iter().any(|speed| speed.cop <= 0.) {
            bail!("DX coil '{name}' has a speed with a non-positive COP");
        }
        Ok(Self {
            name: name.to_owned(),
            service,
            speeds,
            enhanced_speeds: None,
            capacity_modifier: None,
            min_outdoor_temperature: None,
            defrost: None,
            crankcase_heater: None,
            last: Default::default(),
        })
    }

    pub fn with_enhanced_speeds(mut self, speeds: Vec<DxSpeed>) -> Self {
        self.enhanced_speeds = Some(speeds);
        self
    }

    pub fn with_capacity_modifier(mut self, modifier: CapacityModifier) -> Self {
        self.capacity_modifier = Some(modifier);
        self
    }

    pub fn with_min_outdoor_temperature(mut self, temperature: Option<f64>) -> Self {
        self.min_outdoor_temperature = temperature;
        self
    }

    pub fn with_defrost(mut self, defrost: Option<Defrost>) -> Self {
        self.defrost = defrost;
        self
    }

    pub fn with_crankcase_heater(mut self, heater: Option<CrankcaseHeater>) -> Self {
        self.crankcase_heater = heater;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> DxService {
        self.service
    }

    pub fn number_of_speeds(&self) -> usize {
        self.speeds.len()
    }

    pub fn speeds(&self) -> &[DxSpeed] {
        &self.speeds
    }

    pub fn has_enhanced_mode(&self) -> bool {
        self.enhanced_speeds.is_some()
    }

    fn speeds_for(&self, mode: CoilMode) -> &[DxSpeed] {
        match (mode, &self.enhanced_speeds) {
            (CoilMode::Enhanced, Some(speeds)) => speeds,
            _ => &self.speeds,
        }
    }

    fn crankcase_power(&self, outdoor: &OutdoorConditions, runtime_fraction: f64) -> f64 {
        self.crankcase_heater
            .filter(|heater| outdoor.temperature < heater.max_outdoor_temperature)
            .map_or(0., |heater| heater.power * (1. - runtime_fraction))
    }
}

impl Coil for DxCoil {
    fn simulate(
        &mut self,
        inlet: &AirNode,
        request: CoilRequest,
        outdoor: &OutdoorConditions,
    ) -> anyhow::Result<CoilOutput> {
        let mut output = CoilOutput::idle(inlet);

        match request {
            CoilRequest::Off => {}
            CoilRequest::Staged {
                speed,
                speed_ratio,
                part_load_fraction,
                mode,
            } if inlet.has_flow() && part_load_fraction > 0. => {
                let speeds = self.speeds_for(mode);
                let capacities: Vec<f64> = speeds.iter().map(|s| s.capacity).collect();
                let powers: Vec<f64> = speeds.iter().map(|s| s.capacity / s.cop).collect();
                let sensible_heat_ratios: Vec<f64> =
                    speeds.iter().map(|s| s.sensible_heat_ratio).collect();

                let modifier = self
                    .capacity_modifier
                    .as_ref()
                    .map_or(1., |modifier| modifier.at(outdoor.temperature));
                let mut capacity =
                    modifier * staged_value(&capacities, speed, speed_ratio, part_load_fraction);
                let power = modifier * staged_value(&powers, speed, speed_ratio, part_load_fraction);
                let sensible_heat_ratio = if speed <= 1 {
                    sensible_heat_ratios[0]
                } else {
                    staged_value(&sensible_heat_ratios, speed, speed_ratio, 1.)
                };
                let runtime_fraction = if speed <= 1 { part_load_fraction } else { 1. };

                if self.service == DxService::Heating {
                    if let Some(defrost) = self
                        .defrost
                        .filter(|defrost| outdoor.temperature < defrost.max_outdoor_temperature)
                    {
                        capacity *= 1. - defrost.capacity_penalty;
                        output.defrost_power = defrost.heater_power * runtime_fraction;
                    }
                }

                let (total_heat, latent_heat, water_heating) = match self.service {
                    DxService::Cooling => (
                        -capacity,
                        -capacity * (1. - sensible_heat_ratio),
                        0.,
                    ),
                    DxService::Heating => (capacity, 0., 0.),
                    DxService::WaterHeating => (-(capacity - power), 0., capacity),
                    DxService::CoolingWithWaterHeating => (
                        -capacity,
                        -capacity * (1. - sensible_heat_ratio),
                        capacity + power,
                    ),
                };

                output.outlet =
                    condition_air(inlet, total_heat, -latent_heat / LATENT_HEAT_AT_ZERO_C);
                output.total_capacity = total_heat;
                output.latent_capacity = latent_heat;
                output.sensible_capacity = total_heat - latent_heat;
                output.water_heating = water_heating;
                output.electrical_power = power;
                output.runtime_fraction = runtime_fraction;
            }
            CoilRequest::Staged { .. } => {}
            CoilRequest::Load(_) | CoilRequest::Fluid { .. } => {
                bail!("DX coil '{}' is controlled by speed, not by load", self.name)
            }
        }

        output.crankcase_heater_power = self.crankcase_power(outdoor, output.runtime_fraction);
        self.last = output;
        Ok(output)
    }

    fn minimum_outdoor_temperature_for_compressor(&self) -> Option<f64> {
        self.min_outdoor_temperature
    }

    fn last_output(&self) -> &CoilOutput {
        &self.last
    }
}

#[derive(Clone, Copy, Debug, Deserialize_enum_str, PartialEq, Eq)]
pub enum FuelType {
    #[serde(rename = "mains elec")]
    Electricity,
    #[serde(rename = "mains gas")]
    Gas,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FuelStage {
    /// in W
    pub capacity: f64,
    pub efficiency: f64,
    /// Electrical power of fans and controls of a gas stage, in W
    pub parasitic_electric_load: f64,
}

fn fuel_output(fuel: FuelType, heat_input: f64, parasitic: f64, output: &mut CoilOutput) {
    match fuel {
        FuelType::Electricity => output.electrical_power = heat_input,
        FuelType::Gas => {
            output.fuel_rate = heat_input;
            output.electrical_power = parasitic;
        }
    }
}

/// Electric or gas heater with several stages.
#[derive(Clone, Debug)]
pub struct MultiStageFuelCoil {
    name: String,
    fuel: FuelType,
    stages: Vec<FuelStage>,
    last: CoilOutput,
}

impl MultiStageFuelCoil {
    pub fn new(name: &str, fuel: FuelType, stages: Vec<FuelStage>) -> anyhow::Result<Self> {
        if stages.is_empty() {
            bail!("Heating coil '{name}' has no stages");
        }
        if stages.iter().any(|stage| stage.efficiency <= 0.) {
            bail!("Heating coil '{name}' has a stage with a non-positive efficiency");
        }
        Ok(Self {
            name: name.to_owned(),
            fuel,
            stages,
            last: Default::default(),
        })
    }

    pub fn number_of_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Coil for MultiStageFuelCoil {
    fn simulate(
        &mut self,
        inlet: &AirNode,
        request: CoilRequest,
        _outdoor: &OutdoorConditions,
    ) -> anyhow::Result<CoilOutput> {
        let mut output = CoilOutput::idle(inlet);

        let (heat, heat_input, runtime_fraction) = match request {
            CoilRequest::Off => (0., 0., 0.),
            CoilRequest::Staged {
                speed,
                speed_ratio,
                part_load_fraction,
                ..
            } => {
                let capacities: Vec<f64> = self.stages.iter().map(|s| s.capacity).collect();
                let inputs: Vec<f64> = self
                    .stages
                    .iter()
                    .map(|s| s.capacity / s.efficiency)
                    .collect();
                (
                    staged_value(&capacities, speed, speed_ratio, part_load_fraction),
                    staged_value(&inputs, speed, speed_ratio, part_load_fraction),
                    if speed <= 1 { part_load_fraction } else { 1. },
                )
            }
            CoilRequest::Load(load) => {
                let top = self.stages[self.stages.len() - 1];
                let heat = max_of_2(0., min_of_2(load, top.capacity));
                let runtime_fraction = if top.capacity > 0. {
                    heat / top.capacity
                } else {
                    0.
                };
                (heat, heat / top.efficiency, runtime_fraction)
            }
            CoilRequest::Fluid { .. } => {
                bail!("Heating coil '{}' does not take a heating fluid", self.name)
            }
        };

        if inlet.has_flow() && heat > 0. {
            output.outlet = condition_air(inlet, heat, 0.);
            output.total_capacity = heat;
            output.sensible_capacity = heat;
            output.runtime_fraction = runtime_fraction;
            let parasitic = self.stages[0].parasitic_electric_load * runtime_fraction;
            fuel_output(self.fuel, heat_input, parasitic, &mut output);
        }

        self.last = output;
        Ok(output)
    }

    fn last_output(&self) -> &CoilOutput {
        &self.last
    }
}

/// Single-stage electric or gas heater, modulating to meet a load.
#[derive(Clone, Debug)]
pub struct FuelCoil {
    name: String,
    fuel: FuelType,
    stage: FuelStage,
    last: CoilOutput,
}

impl FuelCoil {
    pub fn new(name: &str, fuel: FuelType, stage: FuelStage) -> anyhow::Result<Self> {
        if stage.efficiency <= 0. {
            bail!("Heating coil '{name}' has a non-positive efficiency");
        }
        Ok(Self {
            name: name.to_owned(),
            fuel,
            stage,
            last: Default::default(),
        })
    }

    pub fn capacity(&self) -> f64 {
        self.stage.capacity
    }
}

impl Coil for FuelCoil {
    fn simulate(
        &mut self,
        inlet: &AirNode,
        request: CoilRequest,
        _outdoor: &OutdoorConditions,
    ) -> anyhow::Result<CoilOutput> {
        let mut output = CoilOutput::idle(inlet);

        let heat = match request {
            CoilRequest::Off => 0.,
            CoilRequest::Load(load) => max_of_2(0., min_of_2(load, self.stage.capacity)),
            CoilRequest::Staged {
                part_load_fraction, ..
            } => clamp_fraction(part_load_fraction) * self.stage.capacity,
            CoilRequest::Fluid { .. } => {
                bail!("Heating coil '{}' does not take a heating fluid", self.name)
            }
        };

        if inlet.has_flow() && heat > 0. {
            let runtime_fraction = heat / self.stage.capacity;
            output.outlet = condition_air(inlet, heat, 0.);
            output.total_capacity = heat;
            output.sensible_capacity = heat;
            output.runtime_fraction = runtime_fraction;
            fuel_output(
                self.fuel,
                heat / self.stage.efficiency,
                self.stage.parasitic_electric_load * runtime_fraction,
                &mut output,
            );
        }

        self.last = output;
        Ok(output)
    }

    fn last_output(&self) -> &CoilOutput {
        &self.last
    }
}

/// Hot water coil modelled with a constant effectiveness.
#[derive(Clone, Debug)]
pub struct HotWaterCoil {
    name: String,
    max_water_mass_flow_rate: f64,
    inlet_water_temperature: f64,
    effectiveness: f64,
    last: CoilOutput,
}

impl HotWaterCoil {
    /// Arguments:
    /// * `max_water_mass_flow_rate` - in kg/s
    /// * `inlet_water_temperature` - supply water temperature, in degC
    /// * `effectiveness` - heat exchanger effectiveness, between 0 and 1
    pub fn new(
        name: &str,
        max_water_mass_flow_rate: f64,
        inlet_water_temperature: f64,
        effectiveness: f64,
    ) -> Self {
        Self {
            name: name.to_owned(),
            max_water_mass_flow_rate,
            inlet_water_temperature,
            effectiveness: clamp_fraction(effectiveness),
            last: Default::default(),
        }
    }

    pub fn max_water_mass_flow_rate(&self) -> f64 {
        self.max_water_mass_flow_rate
    }
}

impl Coil for HotWaterCoil {
    fn simulate(
        &mut self,
        inlet: &AirNode,
        request: CoilRequest,
        _outdoor: &OutdoorConditions,
    ) -> anyhow::Result<CoilOutput> {
        let mut output = CoilOutput::idle(inlet);

        let (water_flow, load) = match request {
            CoilRequest::Off => (0., None),
            CoilRequest::Staged {
                part_load_fraction, ..
            } => (
                self.max_water_mass_flow_rate * clamp_fraction(part_load_fraction),
                None,
            ),
            CoilRequest::Fluid {
                mass_flow_rate,
                load,
            } => (
                max_of_2(0., min_of_2(mass_flow_rate, self.max_water_mass_flow_rate)),
                load,
            ),
            CoilRequest::Load(_) => {
                bail!("Hot water coil '{}' is controlled by its water flow", self.name)
            }
        };

        if inlet.has_flow() && water_flow > 0. {
            let water_capacity_rate = HOT_WATER.capacity_rate(water_flow);
            let air_capacity_rate = inlet.mass_flow_rate * inlet.specific_heat();
            let mut heat = max_of_2(
                0.,
                self.effectiveness
                    * min_of_2(water_capacity_rate, air_capacity_rate)
                    * (self.inlet_water_temperature - inlet.temperature),
            );
            if let Some(load) = load {
                heat = max_of_2(0., min_of_2(heat, load));
            }
            output.outlet = condition_air(inlet, heat, 0.);
            output.total_capacity = heat;
            output.sensible_capacity = heat;
            output.fluid_mass_flow_rate = water_flow;
            output.runtime_fraction = 1.;
        }

        self.last = output;
        Ok(output)
    }

    fn last_output(&self) -> &CoilOutput {
        &self.last
    }
}

/// Steam coil condensing all the steam supplied to it.
#[derive(Clone, Debug)]
pub struct SteamCoil {
    name: String,
    max_steam_mass_flow_rate: f64,
    last: CoilOutput,
}

impl SteamCoil {
    pub fn new(name: &str, max_steam_mass_flow_rate: f64) -> Self {
        Self {
            name: name.to_owned(),
            max_steam_mass_flow_rate,
            last: Default::default(),
        }
    }

    pub fn max_steam_mass_flow_rate(&self) -> f64 {
        self.max_steam_mass_flow_rate
    }
}

impl Coil for SteamCoil {
    fn simulate(
        &mut self,
        inlet: &AirNode,
        request: CoilRequest,
        _outdoor: &OutdoorConditions,
    ) -> anyhow::Result<CoilOutput> {
        let mut output = CoilOutput::idle(inlet);

        let (steam_flow, load) = match request {
            CoilRequest::Off => (0., None),
            CoilRequest::Staged {
                part_load_fraction, ..
            } => (
                self.max_steam_mass_flow_rate * clamp_fraction(part_load_fraction),
                None,
            ),
            CoilRequest::Fluid {
                mass_flow_rate,
                load,
            } => (
                max_of_2(0., min_of_2(mass_flow_rate, self.max_steam_mass_flow_rate)),
                load,
            ),
            CoilRequest::Load(_) => {
                bail!("Steam coil '{}' is controlled by its steam flow", self.name)
            }
        };

        if inlet.has_flow() && steam_flow > 0. {
            let mut heat = steam_flow * STEAM_LATENT_HEAT;
            if let Some(load) = load {
                heat = max_of_2(0., min_of_2(heat, load));
            }
            output.outlet = condition_air(inlet, heat, 0.);
            output.total_capacity = heat;
            output.sensible_capacity = heat;
            output.fluid_mass_flow_rate = steam_flow;
            output.runtime_fraction = 1.;
        }

        self.last = output;
        Ok(output)
    }

    fn last_output(&self) -> &CoilOutput {
        &self.last
    }
}

/// How a heating coil is dispatched by a unit controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeatingCoilFamily {
    DxMultiSpeed,
    MultiStageFuel,
    /// Water, steam or single-stage fuel coils, controlled by load or fluid flow
    NonDx,
}

/// A heating coil, resolved to its concrete kind when the unit is configured.
#[derive(Clone, Debug)]
pub enum HeatingCoil {
    DxMultiSpeed(DxCoil),
    MultiStage(MultiStageFuelCoil),
    Fuel(FuelCoil),
    HotWater(HotWaterCoil),
    Steam(SteamCoil),
}

impl HeatingCoil {
    pub fn family(&self) -> HeatingCoilFamily {
        match self {
            Self::DxMultiSpeed(_) => HeatingCoilFamily::DxMultiSpeed,
            Self::MultiStage(_) => HeatingCoilFamily::MultiStageFuel,
            Self::Fuel(_) | Self::HotWater(_) | Self::Steam(_) => HeatingCoilFamily::NonDx,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::DxMultiSpeed(_) => "multi-speed DX heating coil",
            Self::MultiStage(_) => "multi-stage heating coil",
            Self::Fuel(_) => "fuel heating coil",
            Self::HotWater(_) => "hot water coil",
            Self::Steam(_) => "steam coil",
        }
    }

    /// Number of speeds or stages the coil is controlled over
    pub fn number_of_speeds(&self) -> usize {
        match self {
            Self::DxMultiSpeed(coil) => coil.number_of_speeds(),
            Self::MultiStage(coil) => coil.number_of_stages(),
            Self::Fuel(_) | Self::HotWater(_) | Self::Steam(_) => 1,
        }
    }

    /// Maximum heating fluid flow of water and steam coils, in kg/s
    pub fn max_fluid_mass_flow_rate(&self) -> Option<f64> {
        match self {
            Self::HotWater(coil) => Some(coil.max_water_mass_flow_rate()),
            Self::Steam(coil) => Some(coil.max_steam_mass_flow_rate()),
            _ => None,
        }
    }
}

impl Coil for HeatingCoil {
    fn simulate(
        &mut self,
        inlet: &AirNode,
        request: CoilRequest,
        outdoor: &OutdoorConditions,
    ) -> anyhow::Result<CoilOutput> {
        per_heating_coil!(self, coil => { coil.simulate(inlet, request, outdoor) })
    }

    fn minimum_outdoor_temperature_for_compressor(&self) -> Option<f64> {
        per_heating_coil!(self, coil => { coil.minimum_outdoor_temperature_for_compressor() })
    }

    fn last_output(&self) -> &CoilOutput {
        per_heating_coil!(self, coil => { coil.last_output() })
    }
}
