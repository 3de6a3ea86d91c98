use crate::compare_floats::{clamp_fraction, max_of_2};
use crate::core::hvac::AirNode;

/// Supply fan of a unit. All of the fan's power ends up as heat in the air stream.
#[derive(Clone, Debug)]
pub struct Fan {
    rated_power: f64,        // W
    max_mass_flow_rate: f64, // kg/s
    motor_in_airstream_fraction: f64,
    power: f64,
    simulations: usize,
}

impl Fan {
    /// Arguments:
    /// * `rated_power` - electrical power at the maximum flow rate, in W
    /// * `max_mass_flow_rate` - in kg/s
    pub fn new(rated_power: f64, max_mass_flow_rate: f64) -> Self {
        Self {
            rated_power,
            max_mass_flow_rate,
            motor_in_airstream_fraction: 1.,
            power: 0.,
            simulations: 0,
        }
    }

    pub fn max_mass_flow_rate(&self) -> f64 {
        self.max_mass_flow_rate
    }

    /// Electrical power drawn in the last simulation, in W
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Number of times the fan has been simulated
    pub fn simulations(&self) -> usize {
        self.simulations
    }

    /// Air leaving the fan.
    ///
    /// Arguments:
    /// * `inlet` - air entering the fan, at the average flow over the timestep
    /// * `runtime_fraction` - fraction of the timestep the fan runs
    pub fn simulate(&mut self, inlet: &AirNode, runtime_fraction: f64) -> AirNode {
        self.simulations += 1;
        let runtime_fraction = clamp_fraction(runtime_fraction);

        if !inlet.has_flow() || runtime_fraction <= 0. || self.max_mass_flow_rate <= 0. {
            self.power = 0.;
            return *inlet;
        }

        // power follows the cube of the flow while the fan is running
        let on_cycle_flow = inlet.mass_flow_rate / runtime_fraction;
        let flow_fraction = clamp_fraction(on_cycle_flow / self.max_mass_flow_rate);
        self.power = self.rated_power * flow_fraction.powi(3) * runtime_fraction;

        let heat_to_air = self.power * self.motor_in_airstream_fraction;
        let temperature_rise =
            heat_to_air / max_of_2(inlet.mass_flow_rate * inlet.specific_heat(), f64::EPSILON);

        AirNode {
            temperature: inlet.temperature + temperature_rise,
            ..*inlet
        }
    }

    /// Temperature rise across the fan running all timestep at the inlet flow, in K
    pub fn temperature_rise(&self, inlet: &AirNode) -> f64 {
        if !inlet.has_flow() || self.max_mass_flow_rate <= 0. {
            return 0.;
        }
        let flow_fraction = clamp_fraction(inlet.mass_flow_rate / self.max_mass_flow_rate);
        self.rated_power * flow_fraction.powi(3) * self.motor_in_airstream_fraction
            / (inlet.mass_flow_rate * inlet.specific_heat())
    }
}
