//! Moist air property relations used by the air-side calculations.
//!
//! All temperatures are in degC, humidity ratios in kg water / kg dry air, enthalpies in
//! J/kg dry air and pressures in Pa.

use crate::compare_floats::max_of_2;

pub const CP_DRY_AIR: f64 = 1.00484e3;
pub const CP_WATER_VAPOUR: f64 = 1.85895e3;
pub const LATENT_HEAT_AT_ZERO_C: f64 = 2.50094e6;
pub const MIN_HUMIDITY_RATIO: f64 = 1.0e-5;
pub const STANDARD_BAROMETRIC_PRESSURE: f64 = 101_325.0;
const MOLECULAR_WEIGHT_RATIO: f64 = 0.621945;

// Magnus form coefficients for saturation pressure over water
const MAGNUS_A: f64 = 610.94;
const MAGNUS_B: f64 = 17.625;
const MAGNUS_C: f64 = 243.04;

/// Specific heat of moist air, in J/(kg.K)
pub fn cp_air(humidity_ratio: f64) -> f64 {
    CP_DRY_AIR + CP_WATER_VAPOUR * humidity_ratio
}

pub fn enthalpy(temperature: f64, humidity_ratio: f64) -> f64 {
    CP_DRY_AIR * temperature
        + max_of_2(humidity_ratio, MIN_HUMIDITY_RATIO)
            * (LATENT_HEAT_AT_ZERO_C + CP_WATER_VAPOUR * temperature)
}

/// Dry-bulb temperature from enthalpy and humidity ratio
pub fn temperature_from_enthalpy(enthalpy: f64, humidity_ratio: f64) -> f64 {
    let w = max_of_2(humidity_ratio, MIN_HUMIDITY_RATIO);
    (enthalpy - LATENT_HEAT_AT_ZERO_C * w) / (CP_DRY_AIR + CP_WATER_VAPOUR * w)
}

pub fn saturation_pressure(temperature: f64) -> f64 {
    MAGNUS_A * (MAGNUS_B * temperature / (temperature + MAGNUS_C)).exp()
}

pub fn vapour_pressure(humidity_ratio: f64, barometric_pressure: f64) -> f64 {
    let w = max_of_2(humidity_ratio, MIN_HUMIDITY_RATIO);
    barometric_pressure * w / (MOLECULAR_WEIGHT_RATIO + w)
}

pub fn saturation_humidity_ratio(temperature: f64, barometric_pressure: f64) -> f64 {
    let p_ws = saturation_pressure(temperature);
    MOLECULAR_WEIGHT_RATIO * p_ws / (barometric_pressure - p_ws)
}

/// Dew-point temperature of air with the given humidity ratio
pub fn dew_point(humidity_ratio: f64, barometric_pressure: f64) -> f64 {
    let gamma = (vapour_pressure(humidity_ratio, barometric_pressure) / MAGNUS_A).ln();
    MAGNUS_C * gamma / (MAGNUS_B - gamma)
}
