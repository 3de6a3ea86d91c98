use crate::core::hvac::air_flow::OffCycleFlow;
use crate::core::hvac::bypass_vav::DehumidificationControl;
use crate::core::hvac::coils::FuelType;
use crate::core::hvac::operating_mode::WaterHeatingMatch;
use crate::core::hvac::zone_load::PriorityControl;
use crate::core::hvac::{FanOperation, FanPlacement};
use crate::core::psychrometrics::STANDARD_BAROMETRIC_PRESSURE;
use crate::simulation_time::SimulationTime;
use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_valid::Validate;
use std::io::{BufReader, Read};

pub fn ingest_for_processing(json: impl Read) -> Result<InputForProcessing, anyhow::Error> {
    InputForProcessing::init_with_json(json)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Input {
    #[validate]
    pub simulation_time: SimulationTime,
    /// in Pa
    #[serde(default = "default_barometric_pressure")]
    #[validate(exclusive_minimum = 0.)]
    pub barometric_pressure: f64,
    /// Number of times the first day is simulated before the reported run
    #[serde(default)]
    pub warmup_days: u32,
    /// Number of times each unit is called per timestep; the last call is reported
    #[serde(default = "default_iterations_per_step")]
    #[validate(minimum = 1)]
    pub iterations_per_step: usize,
    pub units: IndexMap<String, UnitInput>,
    /// One entry per timestep
    #[validate]
    pub conditions: Vec<StepConditionsInput>,
}

fn default_barometric_pressure() -> f64 {
    STANDARD_BAROMETRIC_PRESSURE
}

fn default_iterations_per_step() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.
}

fn default_min_speed() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum UnitInput {
    MultiSpeedHeatPump(MultiSpeedHeatPumpInput),
    ChangeoverBypassVav(BypassVavInput),
    IntegratedHeatPump(IntegratedHeatPumpInput),
}

impl UnitInput {
    fn validate_fields(&self) -> Result<(), serde_valid::validation::Errors> {
        match self {
            Self::MultiSpeedHeatPump(unit) => unit.validate(),
            Self::ChangeoverBypassVav(unit) => unit.validate(),
            Self::IntegratedHeatPump(unit) => unit.validate(),
        }
    }

    /// Zones whose conditions the unit reads each timestep
    pub fn zones(&self) -> Vec<&str> {
        match self {
            Self::MultiSpeedHeatPump(unit) => vec![unit.zone.as_str()],
            Self::ChangeoverBypassVav(unit) => {
                unit.boxes.iter().map(|terminal| terminal.zone.as_str()).collect()
            }
            Self::IntegratedHeatPump(unit) => vec![unit.zone.as_str()],
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct FanInput {
    /// Electrical power at the maximum flow, in W
    #[validate(minimum = 0.)]
    pub rated_power: f64,
    /// in m3/s
    #[validate(minimum = 0.)]
    pub max_air_volume_flow_rate: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DxSpeedInput {
    /// Gross rated capacity, in W
    #[validate(minimum = 0.)]
    pub capacity: f64,
    #[validate(exclusive_minimum = 0.)]
    pub cop: f64,
    #[serde(default = "default_one")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub sensible_heat_ratio: f64,
    /// in m3/s
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub air_volume_flow_rate: f64,
    /// in m3/s
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub water_volume_flow_rate: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CapacityModifierInput {
    pub outdoor_temperatures: Vec<f64>,
    pub multipliers: Vec<f64>,
}

#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DefrostInput {
    pub max_outdoor_temperature: f64,
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub capacity_penalty: f64,
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub heater_power: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CrankcaseHeaterInput {
    #[validate(minimum = 0.)]
    pub power: f64,
    pub max_outdoor_temperature: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DxCoilInput {
    #[validate]
    pub speeds: Vec<DxSpeedInput>,
    /// Speeds of the enhanced dehumidification mode, where the coil has one
    #[validate]
    pub enhanced_speeds: Option<Vec<DxSpeedInput>>,
    pub capacity_modifier: Option<CapacityModifierInput>,
    /// The compressor is off below this outdoor temperature, in degC
    pub min_outdoor_temperature: Option<f64>,
    #[validate]
    pub defrost: Option<DefrostInput>,
    #[validate]
    pub crankcase_heater: Option<CrankcaseHeaterInput>,
}

#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct FuelStageInput {
    /// in W
    #[validate(minimum = 0.)]
    pub capacity: f64,
    #[validate(exclusive_minimum = 0.)]
    pub efficiency: f64,
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub parasitic_electric_load: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct MultiStageCoilInput {
    pub fuel: FuelType,
    #[validate]
    pub stages: Vec<FuelStageInput>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct FuelCoilInput {
    pub fuel: FuelType,
    #[validate]
    pub stage: FuelStageInput,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct HotWaterCoilInput {
    /// in kg/s
    #[validate(minimum = 0.)]
    pub max_water_mass_flow_rate: f64,
    /// in degC
    pub inlet_water_temperature: f64,
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub effectiveness: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SteamCoilInput {
    /// in kg/s
    #[validate(minimum = 0.)]
    pub max_steam_mass_flow_rate: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum HeatingCoilInput {
    DxMultiSpeed(DxCoilInput),
    MultiStage(MultiStageCoilInput),
    Fuel(FuelCoilInput),
    HotWater(HotWaterCoilInput),
    Steam(SteamCoilInput),
}

impl HeatingCoilInput {
    fn validate_fields(&self) -> Result<(), serde_valid::validation::Errors> {
        match self {
            Self::DxMultiSpeed(coil) => coil.validate(),
            Self::MultiStage(coil) => coil.validate(),
            Self::Fuel(coil) => coil.validate(),
            Self::HotWater(coil) => coil.validate(),
            Self::Steam(coil) => coil.validate(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct HeatRecoveryInput {
    /// in degC
    pub max_outlet_temperature: f64,
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub compressor_heat_rejection_fraction: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct MultiSpeedHeatPumpInput {
    /// Zone the unit's thermostat is in
    pub zone: String,
    #[serde(default)]
    pub fan_placement: FanPlacement,
    #[serde(default)]
    pub fan_operation: FanOperation,
    #[serde(default)]
    pub off_cycle_flow: OffCycleFlow,
    #[validate]
    pub fan: FanInput,
    /// Supply air flow per cooling speed, lowest first, in m3/s
    pub cooling_air_volume_flow_rates: Vec<f64>,
    /// Supply air flow per heating speed, lowest first, in m3/s
    pub heating_air_volume_flow_rates: Vec<f64>,
    /// Supply air flow while neither heating nor cooling, in m3/s
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub no_load_air_volume_flow_rate: f64,
    #[validate]
    pub cooling_coil: DxCoilInput,
    pub heating_coil: HeatingCoilInput,
    pub supplemental_heater: Option<HeatingCoilInput>,
    /// in degC
    pub max_supply_air_temperature: f64,
    /// in degC
    pub supplemental_heater_max_outdoor_temperature: f64,
    /// in W
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub aux_on_cycle_power: f64,
    /// in W
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub aux_off_cycle_power: f64,
    #[validate]
    pub heat_recovery: Option<HeatRecoveryInput>,
    #[serde(default)]
    pub direct_solution: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct TerminalBoxInput {
    pub zone: String,
    /// in m3/s
    #[validate(minimum = 0.)]
    pub max_air_volume_flow_rate: f64,
    /// in m3/s
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub min_air_volume_flow_rate: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct BypassVavInput {
    #[serde(default)]
    pub fan_placement: FanPlacement,
    #[serde(default)]
    pub fan_operation: FanOperation,
    #[serde(default)]
    pub priority_control: PriorityControl,
    /// in hours
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub min_mode_change_time: f64,
    #[validate]
    pub fan: FanInput,
    /// in m3/s
    #[validate(minimum = 0.)]
    pub cooling_air_volume_flow_rate: f64,
    /// in m3/s
    #[validate(minimum = 0.)]
    pub heating_air_volume_flow_rate: f64,
    /// in m3/s
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub no_load_air_volume_flow_rate: f64,
    /// in degC
    pub min_outlet_temperature: f64,
    /// in degC
    pub max_outlet_temperature: f64,
    /// in degC
    pub min_outdoor_temperature_for_compressor: f64,
    #[serde(default)]
    pub dehumidification_control: DehumidificationControl,
    #[validate]
    pub cooling_coil: DxCoilInput,
    pub heating_coil: HeatingCoilInput,
    #[validate]
    pub boxes: Vec<TerminalBoxInput>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct IhpCoilsInput {
    #[validate]
    pub space_cooling: DxCoilInput,
    #[validate]
    pub space_heating: DxCoilInput,
    #[validate]
    pub dedicated_water_heating: DxCoilInput,
    #[validate]
    pub cooling_with_water_heating: DxCoilInput,
    #[validate]
    pub scdwh_cooling: DxCoilInput,
    #[validate]
    pub scdwh_water_heating: DxCoilInput,
    #[validate]
    pub shdwh_heating: DxCoilInput,
    #[validate]
    pub shdwh_water_heating: DxCoilInput,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct IntegratedHeatPumpInput {
    pub zone: String,
    #[validate]
    pub coils: IhpCoilsInput,
    /// in degC
    pub indoor_over_cool_allow: f64,
    /// in degC
    pub ambient_over_cool_allow: f64,
    /// in degC
    pub indoor_water_heating_high_priority: f64,
    /// in degC
    pub ambient_water_heating_high_priority: f64,
    /// in m3
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub water_volume_scdwh: f64,
    /// in seconds
    #[validate(minimum = 0.)]
    pub time_limit_shdwh: f64,
    #[serde(default)]
    pub match_scwh: WaterHeatingMatch,
    /// in hours
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub min_mode_change_time: f64,
    #[serde(default = "default_min_speed")]
    pub min_speed_scwh: usize,
    #[serde(default = "default_min_speed")]
    pub min_speed_scdwh: usize,
    #[serde(default = "default_min_speed")]
    pub min_speed_shdwh: usize,
    #[serde(default = "default_one")]
    #[validate(minimum = 0.)]
    pub cooling_volume_flow_scale: f64,
    #[serde(default = "default_one")]
    #[validate(minimum = 0.)]
    pub heating_volume_flow_scale: f64,
    /// in m3/s
    #[validate(minimum = 0.)]
    pub max_cooling_air_volume_flow_rate: f64,
    /// in m3/s
    #[validate(minimum = 0.)]
    pub max_heating_air_volume_flow_rate: f64,
    /// Electric water heater brought in by combined space and water heating, in W
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub aux_water_heater_capacity: f64,
}

/// Conditions supplied for one timestep.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct StepConditionsInput {
    /// in degC
    pub outdoor_temperature: f64,
    /// in kg/kg
    #[validate(minimum = 0.)]
    pub outdoor_humidity_ratio: f64,
    #[serde(default)]
    pub zones: IndexMap<String, ZoneConditionsInput>,
    /// Per-unit signals, keyed by unit name; units without an entry take the defaults
    #[serde(default)]
    pub units: IndexMap<String, UnitStepInput>,
}

/// State of, and demand from, one zone.
#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ZoneConditionsInput {
    /// in degC
    pub temperature: f64,
    /// in kg/kg
    #[validate(minimum = 0.)]
    pub humidity_ratio: f64,
    /// in W, negative for cooling
    pub load_to_cooling_setpoint: f64,
    /// in W, negative for cooling
    pub load_to_heating_setpoint: f64,
    /// in W, negative for dehumidification
    #[serde(default)]
    pub latent_load: f64,
    #[serde(default)]
    pub deadband: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct HeatRecoveryInletInput {
    /// in kg/s
    #[validate(minimum = 0.)]
    pub mass_flow_rate: f64,
    /// in degC
    pub temperature: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct UnitStepInput {
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub economizer_active: bool,
    /// Speed to run at in place of the load search
    #[validate(minimum = 0.)]
    pub speed_override: Option<f64>,
    /// Stage commanded by a staged thermostat; negative for cooling
    pub staged_speed: Option<i32>,
    #[serde(default)]
    pub water_heating_call: bool,
    /// in W
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub water_heating_load: f64,
    #[validate]
    pub heat_recovery_inlet: Option<HeatRecoveryInletInput>,
    /// Humidity setpoint at the unit outlet, in kg/kg
    pub max_outlet_humidity_ratio: Option<f64>,
    /// Known flow through each terminal box, keyed by zone, in kg/s
    #[serde(default)]
    pub box_air_mass_flow_rates: IndexMap<String, f64>,
}

impl Default for UnitStepInput {
    fn default() -> Self {
        Self {
            available: true,
            economizer_active: false,
            speed_override: None,
            staged_speed: None,
            water_heating_call: false,
            water_heating_load: 0.,
            heat_recovery_inlet: None,
            max_outlet_humidity_ratio: None,
            box_air_mass_flow_rates: Default::default(),
        }
    }
}

#[derive(Debug)]
pub struct InputForProcessing {
    input: Input,
}

impl InputForProcessing {
    pub fn init_with_json(json: impl Read) -> Result<Self, anyhow::Error> {
        let reader = BufReader::new(json);

        let input: Input = serde_json::from_reader(reader)?;
        check_fields(&input)?;

        Ok(Self { input })
    }

    pub fn finalize(self) -> Input {
        self.input
    }

    pub fn set_warmup_days(&mut self, days: u32) -> &Self {
        self.input.warmup_days = days;
        self
    }

    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.input.units.keys().map(String::as_str)
    }
}

fn check_fields(input: &Input) -> anyhow::Result<()> {
    input
        .validate()
        .map_err(|errors| anyhow!("Input failed validation: {errors}"))?;
    for (name, unit) in &input.units {
        unit.validate_fields()
            .map_err(|errors| anyhow!("Unit '{name}' failed validation: {errors}"))?;
        let heating_coils = match unit {
            UnitInput::MultiSpeedHeatPump(unit) => {
                vec![Some(&unit.heating_coil), unit.supplemental_heater.as_ref()]
            }
            UnitInput::ChangeoverBypassVav(unit) => vec![Some(&unit.heating_coil)],
            UnitInput::IntegratedHeatPump(_) => vec![],
        };
        for coil in heating_coils.into_iter().flatten() {
            coil.validate_fields()
                .map_err(|errors| anyhow!("Unit '{name}' has an invalid heating coil: {errors}"))?;
        }
    }

    let simulation_time = &input.simulation_time;
    if simulation_time.end_time() <= simulation_time.start_time() {
        bail!("Simulation must end after it starts");
    }
    if input.conditions.len() < simulation_time.total_steps() {
        bail!(
            "Conditions cover {} timesteps but the simulation has {}",
            input.conditions.len(),
            simulation_time.total_steps()
        );
    }
    for (index, step) in input.conditions.iter().enumerate() {
        if let Some(name) = step.units.keys().find(|name| !input.units.contains_key(*name)) {
            bail!("Conditions for timestep {index} refer to unknown unit '{name}'");
        }
        for (name, zone) in &step.zones {
            zone.validate().map_err(|errors| {
                anyhow!("Zone '{name}' at timestep {index} failed validation: {errors}")
            })?;
        }
        for (name, signals) in &step.units {
            signals.validate().map_err(|errors| {
                anyhow!("Signals for unit '{name}' at timestep {index} failed validation: {errors}")
            })?;
        }
    }

    Ok(())
}
