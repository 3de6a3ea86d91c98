use crate::core::hvac::{HeatCoolMode, SMALL_LOAD};
use serde::Deserialize;

/// How a unit serving several zones picks one direction when the zones disagree.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum PriorityControl {
    #[default]
    CoolingPriority,
    HeatingPriority,
    ZonePriority,
    LoadPriority,
}

/// Remaining output each zone needs this iteration, as supplied by the zone demand provider.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZoneDemand {
    /// Remaining output required to reach the cooling setpoint, in W
    pub to_cooling_setpoint: f64,
    /// Remaining output required to reach the heating setpoint, in W
    pub to_heating_setpoint: f64,
    pub deadband: bool,
}

impl ZoneDemand {
    pub fn new(to_cooling_setpoint: f64, to_heating_setpoint: f64, deadband: bool) -> Self {
        Self {
            to_cooling_setpoint,
            to_heating_setpoint,
            deadband,
        }
    }

    /// Signed load on the zone: the heating requirement when both setpoints call for heat,
    /// the cooling requirement when both call for cooling, and zero between the setpoints
    /// or in the deadband.
    pub fn load(&self) -> f64 {
        if self.deadband {
            return 0.;
        }
        if self.to_heating_setpoint > 0. && self.to_cooling_setpoint > 0. {
            self.to_heating_setpoint
        } else if self.to_heating_setpoint < 0. && self.to_cooling_setpoint < 0. {
            self.to_cooling_setpoint
        } else {
            0.
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZoneLoadSummary {
    /// Sum of the cooling (negative) zone loads, in W
    pub q_cool: f64,
    /// Sum of the heating (positive) zone loads, in W
    pub q_heat: f64,
    pub n_cooled: usize,
    pub n_heated: usize,
    pub direction: HeatCoolMode,
    /// The aggregate for the chosen direction, zero when off
    pub net_load: f64,
}

/// Load for a unit serving one zone.
pub fn single_zone_load(demand: &ZoneDemand) -> f64 {
    let load = demand.load();
    if load.abs() > SMALL_LOAD {
        load
    } else {
        0.
    }
}

/// Aggregate the loads of the zones a unit serves and pick one direction for the unit.
///
/// Arguments:
/// * `zones` - each zone's demand paired with the weight its load carries (1 when the whole
///             of the zone's load falls on this unit)
/// * `priority` - policy for choosing between zones calling for heating and for cooling
pub fn resolve_zone_loads<'a>(
    zones: impl IntoIterator<Item = (&'a ZoneDemand, f64)>,
    priority: PriorityControl,
) -> ZoneLoadSummary {
    let mut summary = ZoneLoadSummary::default();

    for (demand, weight) in zones {
        let load = demand.load() * weight;
        if load > SMALL_LOAD {
            summary.q_heat += load;
            summary.n_heated += 1;
        } else if load < -SMALL_LOAD {
            summary.q_cool += load;
            summary.n_cooled += 1;
        }
    }

    summary.direction = decide_direction(
        summary.q_cool,
        summary.q_heat,
        summary.n_cooled,
        summary.n_heated,
        priority,
    );
    summary.net_load = match summary.direction {
        HeatCoolMode::Cooling => summary.q_cool,
        HeatCoolMode::Heating => summary.q_heat,
        HeatCoolMode::Off => 0.,
    };

    summary
}

/// Direction chosen from the aggregated zone loads; depends on nothing but its arguments.
pub fn decide_direction(
    q_cool: f64,
    q_heat: f64,
    n_cooled: usize,
    n_heated: usize,
    priority: PriorityControl,
) -> HeatCoolMode {
    let cooling_called = q_cool < 0.;
    let heating_called = q_heat > 0.;

    // the preferred direction, or the other one if the preferred side has no call
    let prefer = |cooling_first: bool| match (cooling_first, cooling_called, heating_called) {
        (true, true, _) | (false, true, false) => HeatCoolMode::Cooling,
        (false, _, true) | (true, false, true) => HeatCoolMode::Heating,
        _ => HeatCoolMode::Off,
    };

    match priority {
        PriorityControl::CoolingPriority => prefer(true),
        PriorityControl::HeatingPriority => prefer(false),
        PriorityControl::ZonePriority => {
            if n_heated > n_cooled {
                prefer(false)
            } else if n_cooled > n_heated {
                prefer(true)
            } else {
                prefer(q_heat.abs() <= q_cool.abs())
            }
        }
        PriorityControl::LoadPriority => {
            if q_heat.abs() > q_cool.abs() {
                prefer(false)
            } else if q_cool.abs() > q_heat.abs() {
                prefer(true)
            } else {
                prefer(n_heated <= n_cooled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn mixed_zones() -> Vec<ZoneDemand> {
        vec![
            ZoneDemand::new(1500., 400., false),
            ZoneDemand::new(1200., 600., false),
            ZoneDemand::new(-3000., -4500., false),
        ]
    }

    #[rstest]
    #[case(ZoneDemand::new(2500., 1000., false), 1000.)]
    #[case(ZoneDemand::new(-2000., -3500., false), -2000.)]
    #[case(ZoneDemand::new(800., -600., false), 0.)]
    #[case(ZoneDemand::new(-2000., -3500., true), 0.)]
    #[case(ZoneDemand::new(0.5, 0.5, false), 0.)]
    fn should_take_single_zone_load(#[case] demand: ZoneDemand, #[case] expected: f64) {
        assert_eq!(single_zone_load(&demand), expected);
    }

    #[rstest]
    fn should_aggregate_zone_loads(mixed_zones: Vec<ZoneDemand>) {
        let summary = resolve_zone_loads(
            mixed_zones.iter().map(|zone| (zone, 1.)),
            PriorityControl::ZonePriority,
        );

        assert_eq!(summary.q_heat, 1000.);
        assert_eq!(summary.q_cool, -3000.);
        assert_eq!(summary.n_heated, 2);
        assert_eq!(summary.n_cooled, 1);
    }

    #[rstest]
    #[case(PriorityControl::ZonePriority, HeatCoolMode::Heating, 1000.)]
    #[case(PriorityControl::LoadPriority, HeatCoolMode::Cooling, -3000.)]
    #[case(PriorityControl::CoolingPriority, HeatCoolMode::Cooling, -3000.)]
    #[case(PriorityControl::HeatingPriority, HeatCoolMode::Heating, 1000.)]
    fn should_choose_direction_by_priority(
        mixed_zones: Vec<ZoneDemand>,
        #[case] priority: PriorityControl,
        #[case] expected_direction: HeatCoolMode,
        #[case] expected_load: f64,
    ) {
        let summary = resolve_zone_loads(mixed_zones.iter().map(|zone| (zone, 1.)), priority);

        assert_eq!(summary.direction, expected_direction);
        assert_eq!(summary.net_load, expected_load);
    }

    #[rstest]
    fn should_ignore_zones_in_deadband() {
        let zones = [
            ZoneDemand::new(-2000., -3000., true),
            ZoneDemand::new(900., 300., false),
        ];
        let summary = resolve_zone_loads(
            zones.iter().map(|zone| (zone, 1.)),
            PriorityControl::CoolingPriority,
        );

        assert_eq!(summary.n_cooled, 0);
        assert_eq!(summary.direction, HeatCoolMode::Heating);
    }

    #[rstest]
    fn should_weight_zone_loads() {
        let zones = [ZoneDemand::new(-2000., -3000., false)];
        let summary = resolve_zone_loads(
            zones.iter().map(|zone| (zone, 0.5)),
            PriorityControl::LoadPriority,
        );

        assert_eq!(summary.q_cool, -1000.);
    }

    #[rstest]
    #[case(PriorityControl::ZonePriority)]
    #[case(PriorityControl::LoadPriority)]
    fn should_prefer_cooling_on_full_tie(#[case] priority: PriorityControl) {
        assert_eq!(
            decide_direction(-1000., 1000., 1, 1, priority),
            HeatCoolMode::Cooling
        );
    }

    #[rstest]
    fn should_break_zone_count_tie_by_magnitude() {
        assert_eq!(
            decide_direction(-500., 1500., 1, 1, PriorityControl::ZonePriority),
            HeatCoolMode::Heating
        );
    }

    #[rstest]
    fn should_break_load_tie_by_zone_count() {
        assert_eq!(
            decide_direction(-1000., 1000., 1, 2, PriorityControl::LoadPriority),
            HeatCoolMode::Heating
        );
    }

    #[rstest]
    fn should_stay_off_without_calls() {
        for priority in [
            PriorityControl::CoolingPriority,
            PriorityControl::HeatingPriority,
            PriorityControl::ZonePriority,
            PriorityControl::LoadPriority,
        ] {
            assert_eq!(decide_direction(0., 0., 0, 0, priority), HeatCoolMode::Off);
        }
    }

    #[rstest]
    fn should_give_same_direction_for_same_aggregates() {
        let first = decide_direction(-1800., 700., 1, 3, PriorityControl::ZonePriority);
        let second = decide_direction(-1800., 700., 1, 3, PriorityControl::ZonePriority);
        assert_eq!(first, second);
    }
}
