use crate::core::units::joules_to_kwh;
use crate::output::Output;
use csv::WriterBuilder;
use indexmap::IndexMap;
use std::sync::LazyLock;

/// Timestep results of one unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitReportRow {
    /// Hour the timestep starts at
    pub time: f64,
    pub mode: String,
    pub speed: usize,
    pub speed_ratio: f64,
    pub part_load_fraction: f64,
    /// All rates in W
    pub total_heating_rate: f64,
    pub total_cooling_rate: f64,
    pub sensible_heating_rate: f64,
    pub sensible_cooling_rate: f64,
    pub latent_heating_rate: f64,
    pub latent_cooling_rate: f64,
    pub water_heating_rate: f64,
    pub electric_power: f64,
    pub supplemental_heater_load: f64,
    pub recovered_heat_rate: f64,
    /// Flows in kg/s
    pub air_mass_flow_rate: f64,
    pub bypass_air_mass_flow_rate: f64,
    pub water_mass_flow_rate: f64,
    pub outlet_temperature: f64,
    pub combined_efficiency_ratio: f64,
    /// Energies over the timestep, in kWh
    pub cooling_energy: f64,
    pub heating_energy: f64,
    pub water_heating_energy: f64,
    pub electric_energy: f64,
}

impl UnitReportRow {
    /// Fill in the timestep energies from the rates
    pub fn with_energies(mut self, timestep_seconds: f64) -> Self {
        self.cooling_energy = energy_in_kwh(self.total_cooling_rate, timestep_seconds);
        self.heating_energy = energy_in_kwh(self.total_heating_rate, timestep_seconds);
        self.water_heating_energy = energy_in_kwh(self.water_heating_rate, timestep_seconds);
        self.electric_energy = energy_in_kwh(self.electric_power, timestep_seconds);
        self
    }

    fn values(&self) -> Vec<String> {
        vec![
            self.time.to_string(),
            self.mode.clone(),
            self.speed.to_string(),
            self.speed_ratio.to_string(),
            self.part_load_fraction.to_string(),
            self.total_heating_rate.to_string(),
            self.total_cooling_rate.to_string(),
            self.sensible_heating_rate.to_string(),
            self.sensible_cooling_rate.to_string(),
            self.latent_heating_rate.to_string(),
            self.latent_cooling_rate.to_string(),
            self.water_heating_rate.to_string(),
            self.electric_power.to_string(),
            self.supplemental_heater_load.to_string(),
            self.recovered_heat_rate.to_string(),
            self.air_mass_flow_rate.to_string(),
            self.bypass_air_mass_flow_rate.to_string(),
            self.water_mass_flow_rate.to_string(),
            self.outlet_temperature.to_string(),
            self.combined_efficiency_ratio.to_string(),
            self.cooling_energy.to_string(),
            self.heating_energy.to_string(),
            self.water_heating_energy.to_string(),
            self.electric_energy.to_string(),
        ]
    }
}

/// Column headings of the unit report, with their units
pub static UNITS_MAP: LazyLock<IndexMap<&'static str, &'static str>> = LazyLock::new(|| {
    IndexMap::from([
        ("Time", "[hours]"),
        ("Mode", "[-]"),
        ("Speed", "[count]"),
        ("Speed ratio", "[ratio]"),
        ("Part load fraction", "[ratio]"),
        ("Total heating rate", "[W]"),
        ("Total cooling rate", "[W]"),
        ("Sensible heating rate", "[W]"),
        ("Sensible cooling rate", "[W]"),
        ("Latent heating rate", "[W]"),
        ("Latent cooling rate", "[W]"),
        ("Water heating rate", "[W]"),
        ("Electric power", "[W]"),
        ("Supplemental heater load", "[W]"),
        ("Recovered heat rate", "[W]"),
        ("Air mass flow rate", "[kg/s]"),
        ("Bypass air mass flow rate", "[kg/s]"),
        ("Water mass flow rate", "[kg/s]"),
        ("Outlet temperature", "[deg C]"),
        ("Combined efficiency ratio", "[ratio]"),
        ("Cooling energy", "[kWh]"),
        ("Heating energy", "[kWh]"),
        ("Water heating energy", "[kWh]"),
        ("Electric energy", "[kWh]"),
    ])
});

/// A signed rate split into its heating (positive) and cooling (negative) parts, both
/// returned as magnitudes
pub fn split_by_sign(rate: f64) -> (f64, f64) {
    if rate >= 0. {
        (rate, 0.)
    } else {
        (0., -rate)
    }
}

/// Heat delivered per unit of electrical power; zero when no power is drawn
pub fn combined_efficiency_ratio(
    cooling_rate: f64,
    space_heating_rate: f64,
    water_heating_rate: f64,
    electric_power: f64,
) -> f64 {
    if electric_power > 0. {
        (cooling_rate + space_heating_rate + water_heating_rate) / electric_power
    } else {
        0.
    }
}

pub fn energy_in_kwh(rate: f64, timestep_seconds: f64) -> f64 {
    joules_to_kwh(rate * timestep_seconds)
}

/// Write a unit's results, one row per timestep, under the unit's name.
pub fn write_unit_report(
    output: &impl Output,
    unit_name: &str,
    rows: &[UnitReportRow],
) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }
    let writer = output.writer_for_location_key(unit_name)?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    writer.write_record(UNITS_MAP.keys())?;
    writer.write_record(UNITS_MAP.values())?;
    for row in rows {
        writer.write_record(row.values())?;
    }
    writer.flush()?;

    Ok(())
}
