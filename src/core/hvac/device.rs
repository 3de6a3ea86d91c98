use crate::compare_floats::{clamp_fraction, min_of_2};
use crate::core::hvac::{AirNode, FanPlacement};
use crate::core::psychrometrics::enthalpy;

/// This module provides the contract between the speed solver and the unit being solved:
/// the trial operating point, the result of simulating one trial, and the fixed order in
/// which a unit's fan and coils are simulated for a trial.

/// The operating point a unit is asked to realise for one trial.
///
/// Cycling at the lowest speed and interpolating between two speeds are mutually exclusive,
/// so each is its own variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrialOperatingPoint {
    Off,
    /// Speed 1, on for `part_load_fraction` of the timestep
    Cycling { part_load_fraction: f64 },
    /// Running continuously between `speed - 1` and `speed` (speed >= 2), weighted by
    /// `speed_ratio` towards `speed`
    Interpolating { speed: usize, speed_ratio: f64 },
}

impl TrialOperatingPoint {
    pub fn cycling(part_load_fraction: f64) -> Self {
        Self::Cycling {
            part_load_fraction: clamp_fraction(part_load_fraction),
        }
    }

    /// Interpolation between `speed - 1` and `speed`; speeds below 2 fall back to running
    /// at speed 1 for the whole timestep.
    pub fn interpolating(speed: usize, speed_ratio: f64) -> Self {
        match speed {
            0 => Self::Off,
            1 => Self::cycling(1.),
            _ => Self::Interpolating {
                speed,
                speed_ratio: clamp_fraction(speed_ratio),
            },
        }
    }

    /// Full output at `speed`
    pub fn full_at_speed(speed: usize) -> Self {
        Self::interpolating(speed, 1.)
    }

    pub fn speed_number(&self) -> usize {
        match self {
            Self::Off => 0,
            Self::Cycling { .. } => 1,
            Self::Interpolating { speed, .. } => *speed,
        }
    }

    pub fn speed_ratio(&self) -> f64 {
        match self {
            Self::Interpolating { speed_ratio, .. } => *speed_ratio,
            _ => 0.,
        }
    }

    pub fn part_load_fraction(&self) -> f64 {
        match self {
            Self::Off => 0.,
            Self::Cycling { part_load_fraction } => *part_load_fraction,
            Self::Interpolating { .. } => 1.,
        }
    }

    pub fn compressor_on(&self) -> bool {
        self.part_load_fraction() > 0.
    }

    /// Whether this point runs its speed at full output
    pub fn is_full_at_speed(&self) -> bool {
        match self {
            Self::Off => false,
            Self::Cycling { part_load_fraction } => *part_load_fraction >= 1.,
            Self::Interpolating { speed_ratio, .. } => *speed_ratio >= 1.,
        }
    }
}

/// What one trial delivered. Signed: negative outputs are net cooling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeviceEvaluationResult {
    pub sensible: f64,
    pub total: f64,
    pub electrical_power: f64,
}

/// A unit whose delivered output can be evaluated at a trial operating point.
///
/// Each call simulates the unit's components in order and overwrites the state of the air
/// path; nothing from an earlier trial is rolled back.
pub trait DeviceSimulation {
    fn simulate(&mut self, trial: TrialOperatingPoint) -> anyhow::Result<DeviceEvaluationResult>;
}

impl<T: DeviceSimulation + ?Sized> DeviceSimulation for &mut T {
    fn simulate(&mut self, trial: TrialOperatingPoint) -> anyhow::Result<DeviceEvaluationResult> {
        (**self).simulate(trial)
    }
}

/// How the thermostat commands the unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThermostatMode {
    /// A continuous load is supplied and the speed is searched for
    #[default]
    Continuous,
    /// The stage is commanded directly; the magnitude is the speed and the sign the
    /// direction (negative for cooling)
    Staged(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackStage {
    Fan,
    CoolingCoil,
    HeatingCoil,
    SupplementalHeater,
}

// The fan is simulated twice when it blows through the coils: its outlet state depends on
// the coil state it sees, which is only settled after the first pass.
const BLOW_THROUGH_SEQUENCE: [StackStage; 6] = [
    StackStage::Fan,
    StackStage::CoolingCoil,
    StackStage::HeatingCoil,
    StackStage::Fan,
    StackStage::CoolingCoil,
    StackStage::HeatingCoil,
];

const DRAW_THROUGH_SEQUENCE: [StackStage; 3] = [
    StackStage::CoolingCoil,
    StackStage::HeatingCoil,
    StackStage::Fan,
];

/// Order in which the fan and primary coils are simulated for one trial
pub fn stage_sequence(placement: FanPlacement) -> &'static [StackStage] {
    match placement {
        FanPlacement::BlowThrough => &BLOW_THROUGH_SEQUENCE,
        FanPlacement::DrawThrough => &DRAW_THROUGH_SEQUENCE,
    }
}

/// The components of a unit, simulated one stage at a time.
pub trait ComponentStack {
    fn simulate_stage(&mut self, stage: StackStage) -> anyhow::Result<()>;
    fn has_supplemental_heater(&self) -> bool;
}

/// Simulate every stage of a unit for one trial, supplemental heater last.
pub fn run_stack(stack: &mut impl ComponentStack, placement: FanPlacement) -> anyhow::Result<()> {
    for stage in stage_sequence(placement) {
        stack.simulate_stage(*stage)?;
    }
    if stack.has_supplemental_heater() {
        stack.simulate_stage(StackStage::SupplementalHeater)?;
    }
    Ok(())
}

/// Air states along a unit's air path.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AirPath {
    pub inlet: AirNode,
    pub fan_outlet: AirNode,
    pub cooling_coil_outlet: AirNode,
    pub heating_coil_outlet: AirNode,
    pub supplemental_heater_outlet: AirNode,
    pub outlet: AirNode,
}

impl AirPath {
    pub fn new(inlet: AirNode) -> Self {
        Self {
            inlet,
            fan_outlet: inlet,
            cooling_coil_outlet: inlet,
            heating_coil_outlet: inlet,
            supplemental_heater_outlet: inlet,
            outlet: inlet,
        }
    }

    /// Air entering a stage
    pub fn stage_inlet(&self, stage: StackStage, placement: FanPlacement) -> AirNode {
        match (placement, stage) {
            (FanPlacement::BlowThrough, StackStage::Fan) => self.inlet,
            (FanPlacement::BlowThrough, StackStage::CoolingCoil) => self.fan_outlet,
            (FanPlacement::DrawThrough, StackStage::CoolingCoil) => self.inlet,
            (_, StackStage::HeatingCoil) => self.cooling_coil_outlet,
            (FanPlacement::DrawThrough, StackStage::Fan) => self.heating_coil_outlet,
            (FanPlacement::BlowThrough, StackStage::SupplementalHeater) => {
                self.heating_coil_outlet
            }
            (FanPlacement::DrawThrough, StackStage::SupplementalHeater) => self.fan_outlet,
        }
    }

    /// Record the air leaving a stage. The last primary stage and the supplemental heater
    /// also set the unit outlet.
    pub fn set_stage_outlet(&mut self, stage: StackStage, placement: FanPlacement, node: AirNode) {
        match stage {
            StackStage::Fan => self.fan_outlet = node,
            StackStage::CoolingCoil => self.cooling_coil_outlet = node,
            StackStage::HeatingCoil => self.heating_coil_outlet = node,
            StackStage::SupplementalHeater => self.supplemental_heater_outlet = node,
        }
        let sets_outlet = matches!(
            (placement, stage),
            (_, StackStage::SupplementalHeater)
                | (FanPlacement::BlowThrough, StackStage::HeatingCoil)
                | (FanPlacement::DrawThrough, StackStage::Fan)
        );
        if sets_outlet {
            self.outlet = node;
        }
    }

    /// Change the flow through the whole path, keeping each node's state
    pub fn set_mass_flow_rate(&mut self, mass_flow_rate: f64) {
        for node in [
            &mut self.inlet,
            &mut self.fan_outlet,
            &mut self.cooling_coil_outlet,
            &mut self.heating_coil_outlet,
            &mut self.supplemental_heater_outlet,
            &mut self.outlet,
        ] {
            node.mass_flow_rate = mass_flow_rate;
        }
    }
}

/// Sensible output of supply air to a zone, in W
///
/// Evaluated at the zone humidity ratio, or at the supply humidity ratio when the supply air
/// is colder than the zone, so that condensation is not counted as sensible output.
///
/// Arguments:
/// * `mass_flow_rate` - supply air mass flow rate, in kg/s
/// * `supply` - state of the supply air
/// * `zone` - state of the zone air
/// * `duct_loss` - heat lost from the supply duct, in W
pub fn sensible_output(mass_flow_rate: f64, supply: &AirNode, zone: &AirNode, duct_loss: f64) -> f64 {
    let humidity_ratio = if supply.temperature < zone.temperature {
        supply.humidity_ratio
    } else {
        zone.humidity_ratio
    };
    mass_flow_rate
        * (enthalpy(supply.temperature, humidity_ratio) - enthalpy(zone.temperature, humidity_ratio))
        - duct_loss
}

/// Sensible heat added across a component, at the lower of the inlet and outlet humidity
/// ratios, in W
pub fn sensible_load_met(mass_flow_rate: f64, inlet: &AirNode, outlet: &AirNode) -> f64 {
    let humidity_ratio = min_of_2(inlet.humidity_ratio, outlet.humidity_ratio);
    mass_flow_rate
        * (enthalpy(outlet.temperature, humidity_ratio) - enthalpy(inlet.temperature, humidity_ratio))
}

/// Total (sensible and latent) heat added to the air, in W
pub fn total_output(mass_flow_rate: f64, supply: &AirNode, zone: &AirNode) -> f64 {
    mass_flow_rate * (supply.enthalpy() - zone.enthalpy())
}
