use crate::errors::{ConfigurationError, HvacError};
use crate::output::{FileOutput, SinkOutput};
use crate::{run_project, RunResults, UNITS_MAP};
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::Value;
use std::fs;

const MULTISPEED_HEAT_PUMP: &str = include_str!("../../demos/input/multispeed_heat_pump.json");
const BYPASS_VAV: &str = include_str!("../../demos/input/bypass_vav.json");
const INTEGRATED_HEAT_PUMP: &str = include_str!("../../demos/input/integrated_heat_pump.json");

fn run(input: &str) -> RunResults {
    run_project(input.as_bytes(), SinkOutput).unwrap()
}

#[rstest]
#[case::multispeed_heat_pump(MULTISPEED_HEAT_PUMP, "heat pump", 4)]
#[case::bypass_vav(BYPASS_VAV, "rooftop unit", 3)]
#[case::integrated_heat_pump(INTEGRATED_HEAT_PUMP, "integrated heat pump", 4)]
fn should_report_every_timestep(
    #[case] input: &str,
    #[case] unit_name: &str,
    #[case] expected_rows: usize,
) {
    let results = run(input);

    assert_eq!(results.keys().collect::<Vec<_>>(), vec![unit_name]);
    let rows = &results[unit_name];
    assert_eq!(rows.len(), expected_rows);
    for row in rows {
        assert!(row.electric_power >= 0.);
        assert!(row.electric_energy >= 0.);
        assert!(row.outlet_temperature.is_finite());
    }
}

#[rstest]
fn should_heat_cool_and_idle_with_multispeed_heat_pump() {
    let rows = &run(MULTISPEED_HEAT_PUMP)["heat pump"];

    let modes = rows.iter().map(|row| row.mode.as_str()).collect::<Vec<_>>();
    assert_eq!(modes, vec!["heating", "heating", "cooling", "off"]);
    // cold enough for the supplemental heater to pick up what the compressor cannot
    assert!(rows[0].supplemental_heater_load > 0.);
    assert_eq!(rows[1].supplemental_heater_load, 0.);
    // staged thermostat holds the unit at its second speed
    assert!(rows[2].speed <= 2);
    assert_eq!(rows[3].total_cooling_rate, 0.);
    assert_eq!(rows[3].total_heating_rate, 0.);
}

#[rstest]
fn should_follow_zone_majority_and_hold_mode_in_bypass_vav() {
    let rows = &run(BYPASS_VAV)["rooftop unit"];

    // two zones call for heating and one for cooling
    assert_eq!(rows[0].mode, "heating");
    // every zone now calls for cooling, but the mode is held for an hour after a change
    assert_eq!(rows[1].mode, "heating");
    assert_eq!(rows[2].mode, "cooling");
    assert!(rows[2].total_cooling_rate > 0.);
    assert!(rows[2].bypass_air_mass_flow_rate >= 0.);
}

#[rstest]
fn should_serve_space_and_water_with_integrated_heat_pump() {
    let rows = &run(INTEGRATED_HEAT_PUMP)["integrated heat pump"];

    assert!(rows[0].total_cooling_rate > 0.);
    assert!(rows[0].water_heating_rate > 0.);
    assert!(rows[2].total_heating_rate > 0. || rows[2].water_heating_rate > 0.);
}

#[rstest]
fn should_reject_unit_whose_zone_has_no_conditions() {
    let mut input: Value = serde_json::from_str(MULTISPEED_HEAT_PUMP).unwrap();
    input["Units"]["heat pump"]["Zone"] = Value::from("kitchen");

    let result = run_project(input.to_string().as_bytes(), SinkOutput);

    assert!(matches!(
        result,
        Err(HvacError::InvalidConfiguration(ConfigurationError::MissingZone { ref unit, ref zone }))
            if unit == "heat pump" && zone == "kitchen"
    ));
}

#[rstest]
fn should_reject_malformed_input() {
    let result = run_project("{\"Units\": {}}".as_bytes(), SinkOutput);

    assert!(matches!(result, Err(HvacError::InvalidRequest(_))));
}

#[rstest]
fn should_write_one_results_file_per_unit() {
    let directory = std::env::temp_dir().join("hvac_unitary_run_project_test");
    fs::create_dir_all(&directory).unwrap();
    let output = FileOutput::new(directory.clone(), "demo_{}_results.csv".to_string());

    run_project(BYPASS_VAV.as_bytes(), &output).unwrap();

    let contents = fs::read_to_string(directory.join("demo_rooftop unit_results.csv")).unwrap();
    let lines = contents.lines().collect::<Vec<_>>();
    // headings, units, then one line per timestep
    assert_eq!(lines.len(), 2 + 3);
    assert_eq!(
        lines[0].split(',').count(),
        UNITS_MAP.len(),
        "expected one column per reported quantity"
    );
}
