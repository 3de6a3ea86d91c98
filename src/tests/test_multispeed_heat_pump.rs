use crate::core::hvac::air_flow::{AirFlowRates, OffCycleFlow};
use crate::core::hvac::coils::{
    Coil, CoilMode, CoilRequest, DxCoil, DxService, DxSpeed, FuelCoil, FuelStage, FuelType,
    HeatingCoil,
};
use crate::core::hvac::device::{ThermostatMode, TrialOperatingPoint};
use crate::core::hvac::fan::Fan;
use crate::core::hvac::multispeed_heat_pump::{
    MshpConditions, MshpStepOutput, MultiSpeedHeatPump, MultiSpeedHeatPumpConfig,
};
use crate::core::hvac::{AirNode, FanOperation, FanPlacement, HeatCoolMode, OutdoorConditions};
use approx::assert_relative_eq;
use itertools::Itertools;
use pretty_assertions::assert_eq;
use rstest::*;

// A heat pump with no fan heat and dry coils, so that its output is exactly the coil
// capacity at the operating point.

const SUPPLEMENTAL_HEATER_CUTOFF: f64 = 5.;

fn dry_speed(capacity: f64) -> DxSpeed {
    DxSpeed {
        capacity,
        cop: 3.,
        sensible_heat_ratio: 1.,
        air_volume_flow_rate: 0.,
        water_volume_flow_rate: 0.,
    }
}

fn heat_pump(cooling_capacities: &[f64], heating_capacities: &[f64]) -> MultiSpeedHeatPump {
    let flows = |count: usize| {
        (1..=count)
            .map(|speed| 0.5 * speed as f64 / count as f64)
            .collect_vec()
    };
    let config = MultiSpeedHeatPumpConfig {
        name: "test heat pump".to_string(),
        fan_placement: FanPlacement::BlowThrough,
        air_flows: AirFlowRates {
            cooling: flows(cooling_capacities.len()),
            heating: flows(heating_capacities.len()),
            idle: 0.1,
            off_cycle_flow: OffCycleFlow::UseCompressorOffFlow,
            fan_operation: FanOperation::Cycling,
        },
        max_supply_air_temperature: 50.,
        supplemental_heater_max_outdoor_temperature: SUPPLEMENTAL_HEATER_CUTOFF,
        aux_on_cycle_power: 0.,
        aux_off_cycle_power: 0.,
        heat_recovery: None,
        direct_solution: false,
    };
    let cooling_coil = DxCoil::new(
        "cooling coil",
        DxService::Cooling,
        cooling_capacities.iter().map(|&c| dry_speed(c)).collect(),
    )
    .unwrap();
    let heating_coil = HeatingCoil::DxMultiSpeed(
        DxCoil::new(
            "heating coil",
            DxService::Heating,
            heating_capacities.iter().map(|&c| dry_speed(c)).collect(),
        )
        .unwrap(),
    );
    let supplemental_heater = HeatingCoil::Fuel(
        FuelCoil::new(
            "supplemental heater",
            FuelType::Electricity,
            FuelStage {
                capacity: 10000.,
                efficiency: 1.,
                parasitic_electric_load: 0.,
            },
        )
        .unwrap(),
    );
    MultiSpeedHeatPump::new(
        config,
        Fan::new(0., 0.5),
        cooling_coil,
        heating_coil,
        Some(supplemental_heater),
    )
    .unwrap()
}

#[fixture]
fn two_speed() -> MultiSpeedHeatPump {
    heat_pump(&[2500., 5000.], &[1500., 2500.])
}

fn conditions(load: f64, outdoor_temperature: f64) -> MshpConditions {
    let zone = AirNode::new(22., 0.008, 0.5);
    MshpConditions {
        time: 0.,
        timestep_seconds: 3600.,
        inlet: zone,
        zone,
        load,
        in_deadband: false,
        outdoor: OutdoorConditions::new(outdoor_temperature, 0.006),
        available: true,
        thermostat: ThermostatMode::Continuous,
        economizer_active: false,
        speed_override: None,
        heat_recovery_inlet: None,
    }
}

fn delivered(output: &MshpStepOutput) -> f64 {
    output.row.sensible_heating_rate - output.row.sensible_cooling_rate
}

#[rstest]
fn should_cycle_lowest_speed_for_small_cooling_load(mut two_speed: MultiSpeedHeatPump) {
    let output = two_speed.simulate(&conditions(-2000., 30.), true).unwrap();

    assert_eq!(output.trial.speed_number(), 1);
    assert_eq!(output.trial.speed_ratio(), 0.);
    assert_relative_eq!(output.trial.part_load_fraction(), 0.8, max_relative = 2e-3);
    assert!((delivered(&output) - -2000.).abs() <= 2.);
    assert_eq!(output.row.mode, "cooling");
}

#[rstest]
fn should_run_flat_out_when_cooling_load_exceeds_capacity(mut two_speed: MultiSpeedHeatPump) {
    let output = two_speed.simulate(&conditions(-6000., 30.), true).unwrap();

    assert_eq!(output.trial, TrialOperatingPoint::full_at_speed(2));
    assert_relative_eq!(delivered(&output), -5000., max_relative = 1e-6);
    assert_eq!(output.supplemental.load, 0.);
}

#[rstest]
#[case::cold_enough_for_supplemental_heat(0., 500.)]
#[case::too_warm_for_supplemental_heat(10., 0.)]
fn should_hand_heating_shortfall_to_supplemental_heater(
    mut two_speed: MultiSpeedHeatPump,
    #[case] outdoor_temperature: f64,
    #[case] expected_supplemental_load: f64,
) {
    let output = two_speed
        .simulate(&conditions(3000., outdoor_temperature), true)
        .unwrap();

    assert_eq!(output.trial, TrialOperatingPoint::full_at_speed(2));
    assert_relative_eq!(
        output.supplemental.load,
        expected_supplemental_load,
        epsilon = 1e-6
    );
    assert_relative_eq!(
        delivered(&output),
        2500. + expected_supplemental_load,
        max_relative = 1e-6
    );
}

#[rstest]
#[case(-20000.)]
#[case(-7000.)]
fn should_never_search_above_commanded_stage(#[case] load: f64) {
    let mut unit = heat_pump(&[2000., 4000., 6000., 8000.], &[2000., 4000.]);
    let mut conditions = conditions(load, 30.);
    conditions.thermostat = ThermostatMode::Staged(-2);
    let output = unit.simulate(&conditions, true).unwrap();

    assert_eq!(output.trial, TrialOperatingPoint::full_at_speed(2));
    assert_relative_eq!(delivered(&output), -4000., max_relative = 1e-6);
}

#[rstest]
fn should_meet_every_load_within_capacity() {
    let mut unit = heat_pump(&[2000., 4000., 6000.], &[2000., 4000.]);
    let mut last_speed = 0;

    for load in (1..12).map(|step| -500. * step as f64) {
        let output = unit.simulate(&conditions(load, 30.), true).unwrap();

        assert_relative_eq!(delivered(&output), load, max_relative = 2e-3);
        assert!(output.trial.speed_number() >= last_speed);
        last_speed = output.trial.speed_number();
    }
    assert_eq!(last_speed, 3);
}

#[rstest]
#[case::cooling_just_under_threshold(-0.5)]
#[case::heating_just_under_threshold(0.9)]
fn should_stay_off_for_negligible_loads(mut two_speed: MultiSpeedHeatPump, #[case] load: f64) {
    let output = two_speed.simulate(&conditions(load, 15.), true).unwrap();

    assert_eq!(output.trial, TrialOperatingPoint::Off);
    assert_eq!(output.row.mode, HeatCoolMode::Off.to_string());
    assert_eq!(output.row.electric_power, 0.);
}

#[rstest]
fn should_grow_coil_output_monotonically_with_operating_point() {
    let mut coil = DxCoil::new(
        "cooling coil",
        DxService::Cooling,
        vec![dry_speed(2000.), dry_speed(4000.), dry_speed(6000.)],
    )
    .unwrap();
    let inlet = AirNode::new(26., 0.01, 0.5);
    let outdoor = OutdoorConditions::new(32., 0.012);

    let cycling = (0..=10).map(|step| TrialOperatingPoint::cycling(step as f64 / 10.));
    let interpolating = (2..=3).flat_map(|speed| {
        (1..=10).map(move |step| TrialOperatingPoint::interpolating(speed, step as f64 / 10.))
    });
    let capacities = cycling
        .chain(interpolating)
        .map(|trial| {
            coil.simulate(&inlet, CoilRequest::from_trial(trial, CoilMode::Normal), &outdoor)
                .unwrap()
                .total_capacity
        })
        .collect_vec();

    assert_eq!(capacities.first(), Some(&0.));
    assert_relative_eq!(capacities[capacities.len() - 1], -6000.);
    for (before, after) in capacities.iter().tuple_windows() {
        assert!(after <= before, "cooling output fell from {before} to {after}");
    }
}
