use thiserror::Error;

pub const JOULES_PER_KILOWATT_HOUR: u32 = 3_600_000;
pub const WATTS_PER_KILOWATT: u32 = 1_000;
pub const LITRES_PER_CUBIC_METRE: u32 = 1_000;
pub const MINUTES_PER_HOUR: u32 = 60;
pub const SECONDS_PER_MINUTE: u32 = 60;
pub const SECONDS_PER_HOUR: u32 = 3_600;
pub const HOURS_PER_DAY: u32 = 24;
pub(crate) const KELVIN_OFFSET: f64 = 273.15;

pub(crate) fn celsius_to_kelvin(temp_c: f64) -> Result<f64, BelowAbsoluteZeroError> {
    if temp_c < -KELVIN_OFFSET {
        Err(BelowAbsoluteZeroError::from_c(temp_c))
    } else {
        Ok(temp_c + KELVIN_OFFSET)
    }
}

pub(crate) fn kelvin_to_celsius(temp_k: f64) -> Result<f64, BelowAbsoluteZeroError> {
    if temp_k < 0.0 {
        Err(BelowAbsoluteZeroError::from_k(temp_k))
    } else {
        Ok(temp_k - KELVIN_OFFSET)
    }
}

/// Length of a timestep in seconds
///
/// Arguments:
/// * `timestep` - length of the timestep, in hours
pub fn timestep_seconds(timestep: f64) -> f64 {
    timestep * SECONDS_PER_HOUR as f64
}

/// Energy accumulated at a constant rate over one timestep, in J
///
/// Arguments:
/// * `rate` - rate, in W
/// * `timestep` - length of the timestep, in hours
pub fn energy_from_rate(rate: f64, timestep: f64) -> f64 {
    rate * timestep_seconds(timestep)
}

pub fn joules_to_kwh(energy: f64) -> f64 {
    energy / JOULES_PER_KILOWATT_HOUR as f64
}

#[derive(Debug, Error)]
#[error("A temperature of {k}ºK/{}ºC was encountered, which is less than absolute zero", k - KELVIN_OFFSET)]
pub(crate) struct BelowAbsoluteZeroError {
    k: f64,
}

impl BelowAbsoluteZeroError {
    fn from_k(k: f64) -> Self {
        Self { k }
    }

    fn from_c(c: f64) -> Self {
        Self { k: c + KELVIN_OFFSET }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_convert_celsius_to_kelvin() {
        assert_relative_eq!(celsius_to_kelvin(20.).unwrap(), 293.15);
        assert!(celsius_to_kelvin(-300.).is_err());
    }

    #[rstest]
    fn should_convert_kelvin_to_celsius() {
        assert_relative_eq!(kelvin_to_celsius(273.15).unwrap(), 0.);
        assert!(kelvin_to_celsius(-1.).is_err());
    }

    #[rstest]
    #[case(1.0, 3600.)]
    #[case(0.25, 900.)]
    fn should_give_timestep_in_seconds(#[case] timestep: f64, #[case] expected: f64) {
        assert_eq!(timestep_seconds(timestep), expected);
    }

    #[rstest]
    fn should_accumulate_energy_over_timestep() {
        assert_eq!(energy_from_rate(1000., 0.5), 1_800_000.);
        assert_relative_eq!(joules_to_kwh(energy_from_rate(1000., 0.5)), 0.5);
    }

    #[rstest]
    fn should_report_temperature_below_absolute_zero() {
        let error = celsius_to_kelvin(-280.).unwrap_err();
        assert!(error.to_string().contains("less than absolute zero"));
    }
}
