pub mod air_flow;
pub mod bypass_vav;
pub mod coils;
pub mod device;
pub mod diagnostics;
pub mod fan;
pub mod integrated_heat_pump;
pub mod multispeed_heat_pump;
pub mod operating_mode;
pub mod report;
pub mod speed_solver;
pub mod supplemental_heater;
pub mod zone_load;

use crate::core::psychrometrics::{cp_air, enthalpy, STANDARD_BAROMETRIC_PRESSURE};
use serde::Deserialize;
use strum::Display as StrumDisplay;

/// Loads at or below this magnitude (W) are treated as no load
pub const SMALL_LOAD: f64 = 1.0;
/// Temperature match tolerance, in K
pub const SMALL_TEMP_DIFF: f64 = 1.0e-5;
/// Air mass flow (kg/s) below which a unit is treated as having no flow
pub const SMALL_MASS_FLOW: f64 = 0.001;
/// Air volume flow (m3/s) below which a unit is treated as having no flow
pub const SMALL_AIR_VOL_FLOW: f64 = 0.001;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum HeatCoolMode {
    #[default]
    Off,
    Heating,
    Cooling,
}

impl HeatCoolMode {
    /// Mode implied by the sign of a load, with anything within `SMALL_LOAD` of zero as off
    pub fn from_load(load: f64) -> Self {
        if load > SMALL_LOAD {
            Self::Heating
        } else if load < -SMALL_LOAD {
            Self::Cooling
        } else {
            Self::Off
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Position of the supply fan relative to the coil stack.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum FanPlacement {
    #[default]
    BlowThrough,
    DrawThrough,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum FanOperation {
    /// Fan cycles on and off with the compressor
    #[default]
    Cycling,
    /// Fan runs for the whole timestep whenever the unit is available
    Continuous,
}

/// State of the air at a point in the unit's air path.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AirNode {
    pub temperature: f64,              // degC
    pub humidity_ratio: f64,           // kg/kg
    pub mass_flow_rate: f64,           // kg/s
    pub mass_flow_rate_max_avail: f64, // kg/s
}

impl AirNode {
    pub fn new(temperature: f64, humidity_ratio: f64, mass_flow_rate: f64) -> Self {
        Self {
            temperature,
            humidity_ratio,
            mass_flow_rate,
            mass_flow_rate_max_avail: mass_flow_rate,
        }
    }

    pub fn enthalpy(&self) -> f64 {
        enthalpy(self.temperature, self.humidity_ratio)
    }

    pub fn specific_heat(&self) -> f64 {
        cp_air(self.humidity_ratio)
    }

    /// Same air, moving at a different mass flow rate
    pub fn with_mass_flow_rate(&self, mass_flow_rate: f64) -> Self {
        Self {
            mass_flow_rate,
            ..*self
        }
    }

    pub fn has_flow(&self) -> bool {
        self.mass_flow_rate >= SMALL_MASS_FLOW
    }

    /// Fully-mixed blend of two air streams; `fraction_of_other` is the share of `other`
    pub fn blend(&self, other: &AirNode, fraction_of_other: f64) -> Self {
        let own = 1. - fraction_of_other;
        Self {
            temperature: own * self.temperature + fraction_of_other * other.temperature,
            humidity_ratio: own * self.humidity_ratio + fraction_of_other * other.humidity_ratio,
            ..*self
        }
    }
}

/// Conditions at the outdoor (condenser) side of a unit for one timestep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutdoorConditions {
    pub temperature: f64,
    pub humidity_ratio: f64,
    pub barometric_pressure: f64,
}

impl OutdoorConditions {
    pub fn new(temperature: f64, humidity_ratio: f64) -> Self {
        Self {
            temperature,
            humidity_ratio,
            barometric_pressure: STANDARD_BAROMETRIC_PRESSURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(-2000., HeatCoolMode::Cooling)]
    #[case(0.5, HeatCoolMode::Off)]
    #[case(-1., HeatCoolMode::Off)]
    #[case(3000., HeatCoolMode::Heating)]
    fn should_derive_mode_from_load(#[case] load: f64, #[case] expected: HeatCoolMode) {
        assert_eq!(HeatCoolMode::from_load(load), expected);
    }

    #[rstest]
    fn should_blend_air_streams() {
        let return_air = AirNode::new(24., 0.009, 1.);
        let supply_air = AirNode::new(14., 0.007, 1.);
        let mixed = return_air.blend(&supply_air, 0.25);

        assert_relative_eq!(mixed.temperature, 21.5);
        assert_relative_eq!(mixed.humidity_ratio, 0.0085);
        assert_eq!(mixed.mass_flow_rate, 1.);
    }
}
