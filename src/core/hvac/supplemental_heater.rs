use crate::compare_floats::{max_of_2, min_of_2};
use crate::core::hvac::coils::{Coil, CoilOutput, CoilRequest, HeatingCoil};
use crate::core::hvac::diagnostics::{Diagnostics, WarningKind};
use crate::core::hvac::{AirNode, OutdoorConditions, SMALL_LOAD, SMALL_TEMP_DIFF};
use crate::core::solvers::{solve_root, BracketFailurePolicy, RootStatus};
use anyhow::bail;

/// Relative residual accepted when matching a hot water coil's output to its load
pub const HOT_WATER_TOLERANCE: f64 = 0.001;
pub const HOT_WATER_MAX_ITERATIONS: usize = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SupplementalHeaterState {
    /// Load requested of the heater, in W
    pub load: f64,
    /// Heat the heater actually delivered, in W
    pub actual_delivered_load: f64,
}

/// Heating the supplemental heater is asked for after the primary coil has run.
///
/// Arguments:
/// * `load` - heating requested of the unit, in W
/// * `achieved` - heating the unit delivered without the supplemental heater, in W
/// * `outdoor_temperature` - in degC
/// * `max_outdoor_temperature` - the heater is off above this outdoor temperature, in degC
pub fn trim_load(
    load: f64,
    achieved: f64,
    outdoor_temperature: f64,
    max_outdoor_temperature: f64,
) -> f64 {
    if load > SMALL_LOAD && load > achieved && outdoor_temperature <= max_outdoor_temperature {
        load - achieved
    } else {
        0.
    }
}

/// A unit that can be re-run with a given supplemental heater load.
pub trait TrimmableDevice {
    /// Simulate the unit with the supplemental heater asked for `load` W, returning the
    /// air leaving the unit.
    fn simulate_with_supplemental_load(&mut self, load: f64) -> anyhow::Result<AirNode>;
}

/// Limit the supplemental heater load so that the supply air does not exceed
/// `max_supply_temperature`.
///
/// When the outlet is too hot the unit is re-run with the heater off; the heater is then
/// allowed just enough to raise that outlet to the maximum, or nothing if the outlet is
/// already there. The clamp is applied once, without iterating.
pub fn clamp_supply_temperature(
    device: &mut impl TrimmableDevice,
    load: f64,
    outlet: &AirNode,
    max_supply_temperature: f64,
) -> anyhow::Result<f64> {
    if load <= 0.
        || outlet.temperature <= max_supply_temperature
        || is_close!(
            outlet.temperature,
            max_supply_temperature,
            rel_tol = 1e-9,
            abs_tol = SMALL_TEMP_DIFF
        )
    {
        return Ok(load);
    }

    let heater_off_outlet = device.simulate_with_supplemental_load(0.)?;
    if heater_off_outlet.temperature < max_supply_temperature {
        Ok(heater_off_outlet.mass_flow_rate
            * heater_off_outlet.specific_heat()
            * (max_supply_temperature - heater_off_outlet.temperature))
    } else {
        Ok(0.)
    }
}

/// Run a heating coil that is controlled by its load or its fluid flow.
///
/// Fuel coils take the load directly, up to their capacity times the part-load fraction
/// when they are a unit's main coil. Hot water coils run at their maximum water flow and,
/// when that overshoots the load, the water flow meeting the load is searched for. Steam
/// coils run at their maximum steam flow, limited to the load.
///
/// Arguments:
/// * `coil` - the coil to run
/// * `inlet` - air entering the coil
/// * `load` - heating requested of the coil, in W
/// * `outdoor` - outdoor conditions
/// * `part_load_fraction` - for a unit's main heating coil, the fraction of the maximum
///   fluid flow available; `None` for a supplemental heater
/// * `diagnostics` - warnings of the unit the coil belongs to
pub fn control_non_dx_coil(
    coil: &mut HeatingCoil,
    inlet: &AirNode,
    load: f64,
    outdoor: &OutdoorConditions,
    part_load_fraction: Option<f64>,
    diagnostics: &mut Diagnostics,
) -> anyhow::Result<CoilOutput> {
    let flow_fraction = part_load_fraction.unwrap_or(1.);

    match coil {
        HeatingCoil::Fuel(fuel_coil) => {
            let load = match part_load_fraction {
                Some(fraction) => min_of_2(load, fuel_coil.capacity() * fraction),
                None => load,
            };
            let request = if load > SMALL_LOAD {
                CoilRequest::Load(load)
            } else {
                CoilRequest::Off
            };
            fuel_coil.simulate(inlet, request, outdoor)
        }
        HeatingCoil::HotWater(hot_water_coil) => {
            if load <= SMALL_LOAD {
                return hot_water_coil.simulate(inlet, CoilRequest::Off, outdoor);
            }
            let max_flow = hot_water_coil.max_water_mass_flow_rate() * flow_fraction;
            let at_max_flow = hot_water_coil.simulate(
                inlet,
                CoilRequest::Fluid {
                    mass_flow_rate: max_flow,
                    load: None,
                },
                outdoor,
            )?;
            if at_max_flow.total_capacity <= load + SMALL_LOAD {
                return Ok(at_max_flow);
            }

            let solution = solve_root(
                HOT_WATER_TOLERANCE,
                HOT_WATER_MAX_ITERATIONS,
                |mass_flow_rate| {
                    let output = hot_water_coil.simulate(
                        inlet,
                        CoilRequest::Fluid {
                            mass_flow_rate,
                            load: None,
                        },
                        outdoor,
                    )?;
                    Ok((output.total_capacity - load) / load)
                },
                0.,
                max_flow,
                BracketFailurePolicy::Extrapolate,
            )?;
            match solution.status {
                RootStatus::Converged => {}
                RootStatus::IterationLimitExceeded => diagnostics.warn(
                    WarningKind::HotWaterFlowIterationLimit,
                    format!(
                        "Iteration limit exceeded calculating hot water flow for a load of {load:.1} W; the closest flow {:.4} kg/s is used",
                        solution.value
                    ),
                ),
                RootStatus::BracketFailure => diagnostics.warn(
                    WarningKind::HotWaterFlowBracketFailure,
                    format!(
                        "Hot water flow calculation failed for a load of {load:.1} W: limits exceeded; the estimate {:.4} kg/s is used",
                        solution.value
                    ),
                ),
            }

            hot_water_coil.simulate(
                inlet,
                CoilRequest::Fluid {
                    mass_flow_rate: max_of_2(solution.value, 0.),
                    load: None,
                },
                outdoor,
            )
        }
        HeatingCoil::Steam(steam_coil) => {
            let request = if load > SMALL_LOAD {
                CoilRequest::Fluid {
                    mass_flow_rate: steam_coil.max_steam_mass_flow_rate() * flow_fraction,
                    load: Some(load),
                }
            } else {
                CoilRequest::Off
            };
            steam_coil.simulate(inlet, request, outdoor)
        }
        HeatingCoil::DxMultiSpeed(_) | HeatingCoil::MultiStage(_) => {
            bail!(
                "A {} is controlled by speed, not by load or fluid flow",
                coil.kind_name()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hvac::coils::{FuelCoil, FuelStage, FuelType, HotWaterCoil, SteamCoil};
    use crate::core::material_properties::STEAM_LATENT_HEAT;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn inlet() -> AirNode {
        AirNode::new(20., 0.007, 0.5)
    }

    #[fixture]
    fn outdoor() -> OutdoorConditions {
        OutdoorConditions::new(-2., 0.003)
    }

    #[rstest]
    #[case(3000., 2500., -2., 5., 500.)]
    #[case(3000., 2500., 8., 5., 0.)]
    #[case(3000., 3200., -2., 5., 0.)]
    #[case(0.5, 0., -2., 5., 0.)]
    #[case(-2000., 0., -2., 5., 0.)]
    fn should_trim_unmet_heating_load(
        #[case] load: f64,
        #[case] achieved: f64,
        #[case] outdoor_temperature: f64,
        #[case] cutoff: f64,
        #[case] expected: f64,
    ) {
        assert_eq!(trim_load(load, achieved, outdoor_temperature, cutoff), expected);
    }

    /// Outlet at the heater-off temperature plus the heater's temperature rise
    struct FixedDevice {
        heater_off_temperature: f64,
        reruns: usize,
    }

    impl TrimmableDevice for FixedDevice {
        fn simulate_with_supplemental_load(&mut self, load: f64) -> anyhow::Result<AirNode> {
            self.reruns += 1;
            let node = AirNode::new(self.heater_off_temperature, 0.007, 0.5);
            Ok(AirNode::new(
                self.heater_off_temperature + load / (0.5 * node.specific_heat()),
                0.007,
                0.5,
            ))
        }
    }

    #[rstest]
    fn should_clamp_load_to_max_supply_temperature() {
        let mut device = FixedDevice {
            heater_off_temperature: 40.,
            reruns: 0,
        };
        let outlet = AirNode::new(60., 0.007, 0.5);
        let load = clamp_supply_temperature(&mut device, 20000., &outlet, 50.).unwrap();

        let expected = 0.5 * AirNode::new(40., 0.007, 0.5).specific_heat() * 10.;
        assert_relative_eq!(load, expected);
        assert_eq!(device.reruns, 1);
    }

    #[rstest]
    fn should_drop_load_when_unit_alone_exceeds_max_supply_temperature() {
        let mut device = FixedDevice {
            heater_off_temperature: 52.,
            reruns: 0,
        };
        let outlet = AirNode::new(60., 0.007, 0.5);

        assert_eq!(
            clamp_supply_temperature(&mut device, 5000., &outlet, 50.).unwrap(),
            0.
        );
    }

    #[rstest]
    fn should_leave_load_alone_below_max_supply_temperature() {
        let mut device = FixedDevice {
            heater_off_temperature: 30.,
            reruns: 0,
        };
        let outlet = AirNode::new(45., 0.007, 0.5);

        assert_eq!(
            clamp_supply_temperature(&mut device, 5000., &outlet, 50.).unwrap(),
            5000.
        );
        assert_eq!(device.reruns, 0);
    }

    #[rstest]
    fn should_run_fuel_coil_at_load(inlet: AirNode, outdoor: OutdoorConditions) {
        let mut coil = HeatingCoil::Fuel(
            FuelCoil::new(
                "heater",
                FuelType::Electricity,
                FuelStage {
                    capacity: 10000.,
                    efficiency: 1.,
                    parasitic_electric_load: 0.,
                },
            )
            .unwrap(),
        );
        let mut diagnostics = Diagnostics::new("unit");
        let output =
            control_non_dx_coil(&mut coil, &inlet, 3000., &outdoor, None, &mut diagnostics)
                .unwrap();

        assert_relative_eq!(output.total_capacity, 3000.);
    }

    #[rstest]
    #[case(50.)]
    #[case(500.)]
    #[case(5000.)]
    #[case(20000.)]
    fn should_solve_hot_water_flow_for_load(
        #[case] load: f64,
        inlet: AirNode,
        outdoor: OutdoorConditions,
    ) {
        let mut coil = HeatingCoil::HotWater(HotWaterCoil::new("hot water coil", 0.5, 80., 0.7));
        let mut diagnostics = Diagnostics::new("unit");
        let output =
            control_non_dx_coil(&mut coil, &inlet, load, &outdoor, None, &mut diagnostics)
                .unwrap();

        assert!(
            ((output.total_capacity - load) / load).abs() <= HOT_WATER_TOLERANCE,
            "delivered {} W for a load of {load} W",
            output.total_capacity
        );
        assert!(output.fluid_mass_flow_rate > 0.);
        assert!(output.fluid_mass_flow_rate < 0.5);
        assert_eq!(diagnostics.total_occurrences(), 0);
    }

    #[rstest]
    fn should_run_hot_water_coil_flat_out_when_load_exceeds_capacity(
        inlet: AirNode,
        outdoor: OutdoorConditions,
    ) {
        let mut coil = HeatingCoil::HotWater(HotWaterCoil::new("hot water coil", 0.5, 80., 0.7));
        let mut diagnostics = Diagnostics::new("unit");
        let output =
            control_non_dx_coil(&mut coil, &inlet, 1e6, &outdoor, None, &mut diagnostics)
                .unwrap();

        assert_eq!(output.fluid_mass_flow_rate, 0.5);
        assert!(output.total_capacity > 20000.);
        assert!(output.total_capacity < 1e6);
        assert_eq!(diagnostics.total_occurrences(), 0);
    }

    #[rstest]
    fn should_saturate_hot_water_flow_at_part_load_limit(
        inlet: AirNode,
        outdoor: OutdoorConditions,
    ) {
        let mut coil = HeatingCoil::HotWater(HotWaterCoil::new("hot water coil", 0.5, 80., 0.7));
        let mut diagnostics = Diagnostics::new("unit");
        let output = control_non_dx_coil(
            &mut coil,
            &inlet,
            20000.,
            &outdoor,
            Some(0.1),
            &mut diagnostics,
        )
        .unwrap();

        assert_relative_eq!(output.fluid_mass_flow_rate, 0.05);
        assert!(output.total_capacity < 20000.);
    }

    #[rstest]
    fn should_limit_steam_coil_to_load_and_part_load_flow(
        inlet: AirNode,
        outdoor: OutdoorConditions,
    ) {
        let mut coil = HeatingCoil::Steam(SteamCoil::new("steam coil", 0.01));
        let mut diagnostics = Diagnostics::new("unit");

        let output =
            control_non_dx_coil(&mut coil, &inlet, 4000., &outdoor, Some(0.5), &mut diagnostics)
                .unwrap();
        assert_relative_eq!(output.total_capacity, 4000.);
        assert_relative_eq!(output.fluid_mass_flow_rate, 0.005);

        let output = control_non_dx_coil(&mut coil, &inlet, 1e6, &outdoor, Some(0.5), &mut diagnostics)
            .unwrap();
        assert_relative_eq!(output.total_capacity, 0.005 * STEAM_LATENT_HEAT);
    }

    #[rstest]
    fn should_leave_coil_off_without_load(inlet: AirNode, outdoor: OutdoorConditions) {
        let mut coil = HeatingCoil::Steam(SteamCoil::new("steam coil", 0.01));
        let mut diagnostics = Diagnostics::new("unit");
        let output =
            control_non_dx_coil(&mut coil, &inlet, 0., &outdoor, None, &mut diagnostics).unwrap();

        assert_eq!(output.total_capacity, 0.);
        assert_eq!(output.outlet, inlet);
    }
}
