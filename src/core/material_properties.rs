use crate::core::units::LITRES_PER_CUBIC_METRE;
use std::sync::LazyLock;

/// This module contains properties of the working fluids used by the coil models, and of
/// the standard air used to convert rated volume flows into mass flows.

#[derive(Clone, Copy, Debug)]
pub struct MaterialProperties {
    density: f64,                // kg/m3
    specific_heat_capacity: f64, // J/(kg.K)
}

impl MaterialProperties {
    pub fn new(density: f64, specific_heat_capacity: f64) -> Self {
        Self {
            density,
            specific_heat_capacity,
        }
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn density_kg_per_litre(&self) -> f64 {
        self.density / LITRES_PER_CUBIC_METRE as f64
    }

    pub fn specific_heat_capacity(&self) -> f64 {
        self.specific_heat_capacity
    }

    /// Mass flow rate equivalent of a volume flow rate, in kg/s
    ///
    /// Arguments:
    /// * `volume_flow_rate` - in m3/s
    pub fn mass_flow_rate(&self, volume_flow_rate: f64) -> f64 {
        volume_flow_rate * self.density
    }

    /// Volume flow rate equivalent of a mass flow rate, in m3/s
    pub fn volume_flow_rate(&self, mass_flow_rate: f64) -> f64 {
        mass_flow_rate / self.density
    }

    /// Heat capacity rate of a flowing stream, in W/K
    pub fn capacity_rate(&self, mass_flow_rate: f64) -> f64 {
        mass_flow_rate * self.specific_heat_capacity
    }
}

pub static WATER: LazyLock<MaterialProperties> =
    LazyLock::new(|| MaterialProperties::new(1000.0, 4184.0));

/// Water at tank supply temperature (60 degC), used for heat pump water-side flows
pub static HOT_WATER: LazyLock<MaterialProperties> =
    LazyLock::new(|| MaterialProperties::new(986.0, 4184.0));

/// Dry air at standard conditions, used to convert rated air volume flows into mass flows
pub static STANDARD_AIR: LazyLock<MaterialProperties> =
    LazyLock::new(|| MaterialProperties::new(1.2, 1004.84));

/// Latent heat of condensation of steam at atmospheric pressure, in J/kg
pub const STEAM_LATENT_HEAT: f64 = 2_257_000.0;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    pub fn matprop() -> MaterialProperties {
        MaterialProperties::new(986.0, 4184.0)
    }

    #[rstest]
    pub fn should_have_correct_density(matprop: MaterialProperties) {
        assert_eq!(matprop.density(), 986.0, "incorrect density returned");
        assert_relative_eq!(matprop.density_kg_per_litre(), 0.986);
    }

    #[rstest]
    pub fn should_convert_between_volume_and_mass_flow(matprop: MaterialProperties) {
        assert_relative_eq!(matprop.mass_flow_rate(0.0002), 0.1972);
        assert_relative_eq!(matprop.volume_flow_rate(0.1972), 0.0002);
    }

    #[rstest]
    pub fn should_give_capacity_rate(matprop: MaterialProperties) {
        assert_relative_eq!(matprop.capacity_rate(0.5), 2092.0);
    }

    #[rstest]
    pub fn should_use_standard_air_for_rated_flows() {
        assert_relative_eq!(STANDARD_AIR.mass_flow_rate(0.5), 0.6);
        assert_relative_eq!(WATER.specific_heat_capacity(), 4184.0);
    }
}
