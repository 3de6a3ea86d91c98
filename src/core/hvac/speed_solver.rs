use crate::compare_floats::{is_between, min_of_2};
use crate::core::hvac::device::{
    DeviceEvaluationResult, DeviceSimulation, ThermostatMode, TrialOperatingPoint,
};
use crate::core::hvac::diagnostics::{Diagnostics, WarningKind};
use crate::core::hvac::{HeatCoolMode, SMALL_LOAD};
use crate::core::solvers::{
    solve_root, BracketFailurePolicy, RootSolution, RootStatus, DEFAULT_TOLERANCE,
    MAX_ITERATIONS,
};
use crate::errors::{SolverError, SpeedSolverError};

/// This module provides the search for the operating point of a multi-speed unit: the speed
/// and the cycling or inter-speed fraction at which the unit's delivered output matches a
/// requested load.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedSolveRequest {
    /// Requested output, in W (negative for cooling)
    pub load: f64,
    pub mode: HeatCoolMode,
    /// Highest speed available in this mode
    pub max_speed: usize,
    pub thermostat: ThermostatMode,
    /// Interpolate between speed boundaries instead of iterating
    pub direct_solution: bool,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub policy: BracketFailurePolicy,
}

impl SpeedSolveRequest {
    pub fn new(load: f64, mode: HeatCoolMode, max_speed: usize) -> Self {
        Self {
            load,
            mode,
            max_speed,
            thermostat: ThermostatMode::Continuous,
            direct_solution: false,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: MAX_ITERATIONS,
            policy: BracketFailurePolicy::Fatal,
        }
    }

    pub fn with_thermostat(mut self, thermostat: ThermostatMode) -> Self {
        self.thermostat = thermostat;
        self
    }

    pub fn with_direct_solution(mut self, direct_solution: bool) -> Self {
        self.direct_solution = direct_solution;
        self
    }

    pub fn with_policy(mut self, policy: BracketFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64, max_iterations: usize) -> Self {
        self.tolerance = tolerance;
        self.max_iterations = max_iterations;
        self
    }

    fn is_cooling(&self) -> bool {
        self.mode == HeatCoolMode::Cooling
    }

    /// Whether `output` meets or exceeds the load in the demanded direction
    fn is_reached_by(&self, output: f64) -> bool {
        if self.is_cooling() {
            output <= self.load
        } else {
            output >= self.load
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedSolution {
    pub trial: TrialOperatingPoint,
    /// Output with the compressor off, in W
    pub no_comp_output: f64,
    /// Output at full capacity of the highest speed the search may use, in W
    pub full_output: f64,
    /// Result of the final simulation at `trial`
    pub achieved: DeviceEvaluationResult,
    /// Heating still needed when the unit runs flat out, in W
    pub supplemental_shortfall: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlVariable {
    CyclingRatio,
    SpeedRatio,
}

impl ControlVariable {
    fn name(&self) -> &'static str {
        match self {
            Self::CyclingRatio => "cycling ratio",
            Self::SpeedRatio => "speed ratio",
        }
    }

    fn warning_kinds(&self) -> (WarningKind, WarningKind) {
        match self {
            Self::CyclingRatio => (
                WarningKind::CyclingIterationLimit,
                WarningKind::CyclingBracketFailure,
            ),
            Self::SpeedRatio => (
                WarningKind::SpeedRatioIterationLimit,
                WarningKind::SpeedRatioBracketFailure,
            ),
        }
    }
}

fn sensible_at(
    device: &mut impl DeviceSimulation,
    trial: TrialOperatingPoint,
) -> anyhow::Result<f64> {
    Ok(device.simulate(trial)?.sensible)
}

pub struct SpeedSolver<'a> {
    diagnostics: &'a mut Diagnostics,
}

impl<'a> SpeedSolver<'a> {
    pub fn new(diagnostics: &'a mut Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Find the operating point at which `device` delivers the requested load.
    ///
    /// The device is left in the state of the returned operating point. Loads the unit
    /// cannot reach are met as far as possible: the search returns full output at the
    /// highest speed it may use, with any heating still needed reported as the
    /// supplemental shortfall.
    pub fn solve(
        &mut self,
        device: &mut impl DeviceSimulation,
        request: &SpeedSolveRequest,
    ) -> anyhow::Result<SpeedSolution> {
        let load = request.load;
        let no_comp_output = sensible_at(device, TrialOperatingPoint::Off)?;

        let no_run_needed = load.abs() <= SMALL_LOAD
            || (load < -SMALL_LOAD && no_comp_output < load)
            || (load > SMALL_LOAD && no_comp_output > load);
        if no_run_needed {
            return self.finish(
                device,
                request,
                TrialOperatingPoint::Off,
                no_comp_output,
                no_comp_output,
            );
        }

        let full_speed = match request.thermostat {
            ThermostatMode::Staged(stage) => {
                min_of_2(stage.unsigned_abs() as usize, request.max_speed)
            }
            ThermostatMode::Continuous => request.max_speed,
        };
        if full_speed == 0 {
            return self.finish(
                device,
                request,
                TrialOperatingPoint::Off,
                no_comp_output,
                no_comp_output,
            );
        }

        let full_trial = TrialOperatingPoint::full_at_speed(full_speed);
        let full_output = sensible_at(device, full_trial)?;

        if request.is_cooling() && (full_output >= 0. || full_output >= no_comp_output) {
            return self.finish(
                device,
                request,
                TrialOperatingPoint::Off,
                no_comp_output,
                full_output,
            );
        }
        if !request.is_reached_by(full_output) || load == full_output {
            return self.finish(device, request, full_trial, no_comp_output, full_output);
        }

        let trial = match request.thermostat {
            ThermostatMode::Staged(_) => {
                self.solve_staged(device, request, full_speed, no_comp_output)?
            }
            ThermostatMode::Continuous if request.direct_solution => {
                self.solve_direct(device, request, no_comp_output)?
            }
            ThermostatMode::Continuous => self.scan_and_solve(device, request, 1)?,
        };

        self.finish(device, request, trial, no_comp_output, full_output)
    }

    /// Step up through the speeds from `lowest_speed` until the full output of a speed
    /// reaches the load, then solve for the fraction at that speed. Cycling is only
    /// possible from speed 1; a higher lowest speed that already exceeds the load is run
    /// at full output.
    pub fn scan_and_solve(
        &mut self,
        device: &mut impl DeviceSimulation,
        request: &SpeedSolveRequest,
        lowest_speed: usize,
    ) -> anyhow::Result<TrialOperatingPoint> {
        if request.load.abs() <= SMALL_LOAD || request.max_speed == 0 {
            return Ok(TrialOperatingPoint::Off);
        }
        let lowest_speed = lowest_speed.clamp(1, request.max_speed);

        let low_output = sensible_at(device, TrialOperatingPoint::full_at_speed(lowest_speed))?;
        if request.is_reached_by(low_output) {
            return if lowest_speed == 1 {
                self.solve_cycling(device, request)
            } else {
                Ok(TrialOperatingPoint::full_at_speed(lowest_speed))
            };
        }

        for speed in (lowest_speed + 1)..=request.max_speed {
            let full_output = sensible_at(device, TrialOperatingPoint::full_at_speed(speed))?;
            if request.is_reached_by(full_output) {
                return self.solve_speed_ratio(device, request, speed);
            }
        }

        Ok(TrialOperatingPoint::full_at_speed(request.max_speed))
    }

    fn solve_staged(
        &mut self,
        device: &mut impl DeviceSimulation,
        request: &SpeedSolveRequest,
        speed: usize,
        no_comp_output: f64,
    ) -> anyhow::Result<TrialOperatingPoint> {
        let load = request.load;

        if speed == 1 {
            let low_output = sensible_at(device, TrialOperatingPoint::cycling(1.))?;
            return if is_between(load, no_comp_output, low_output) {
                self.solve_cycling(device, request)
            } else {
                Ok(TrialOperatingPoint::cycling(1.))
            };
        }

        let low_output = sensible_at(device, TrialOperatingPoint::interpolating(speed, 0.))?;
        let beyond_low = if request.is_cooling() {
            load < low_output
        } else {
            load > low_output
        };
        if !beyond_low {
            return Ok(TrialOperatingPoint::interpolating(speed, 0.));
        }

        let full_output = sensible_at(device, TrialOperatingPoint::interpolating(speed, 1.))?;
        if is_between(load, low_output, full_output) {
            self.solve_speed_ratio(device, request, speed)
        } else {
            Ok(TrialOperatingPoint::interpolating(speed, 1.))
        }
    }

    /// Interpolate linearly between the outputs at each speed boundary, without iterating
    fn solve_direct(
        &mut self,
        device: &mut impl DeviceSimulation,
        request: &SpeedSolveRequest,
        no_comp_output: f64,
    ) -> anyhow::Result<TrialOperatingPoint> {
        let load = request.load;
        let mut previous_output = no_comp_output;

        for speed in 1..=request.max_speed {
            let full_output = sensible_at(device, TrialOperatingPoint::full_at_speed(speed))?;
            if is_between(load, previous_output, full_output) {
                let span = full_output - previous_output;
                let fraction = if span.abs() > f64::EPSILON {
                    (load - previous_output) / span
                } else {
                    1.
                };
                return Ok(if speed == 1 {
                    TrialOperatingPoint::cycling(fraction)
                } else {
                    TrialOperatingPoint::interpolating(speed, fraction)
                });
            }
            previous_output = full_output;
        }

        Ok(TrialOperatingPoint::full_at_speed(request.max_speed))
    }

    fn solve_cycling(
        &mut self,
        device: &mut impl DeviceSimulation,
        request: &SpeedSolveRequest,
    ) -> anyhow::Result<TrialOperatingPoint> {
        let load = request.load;
        let result = solve_root(
            request.tolerance,
            request.max_iterations,
            |part_load_fraction| {
                let output =
                    sensible_at(&mut *device, TrialOperatingPoint::cycling(part_load_fraction))?;
                Ok((output - load) / load)
            },
            0.,
            1.,
            request.policy,
        );
        let part_load_fraction =
            self.accept(result, ControlVariable::CyclingRatio, 1, load)?;
        Ok(TrialOperatingPoint::cycling(part_load_fraction))
    }

    fn solve_speed_ratio(
        &mut self,
        device: &mut impl DeviceSimulation,
        request: &SpeedSolveRequest,
        speed: usize,
    ) -> anyhow::Result<TrialOperatingPoint> {
        let load = request.load;
        let result = solve_root(
            request.tolerance,
            request.max_iterations,
            |speed_ratio| {
                let output = sensible_at(
                    &mut *device,
                    TrialOperatingPoint::interpolating(speed, speed_ratio),
                )?;
                Ok((output - load) / load)
            },
            0.,
            1.,
            request.policy,
        );
        let speed_ratio = self.accept(result, ControlVariable::SpeedRatio, speed, load)?;
        Ok(TrialOperatingPoint::interpolating(speed, speed_ratio))
    }

    /// Turn a root-finder result into the value to use, warning about inexact solutions
    fn accept(
        &mut self,
        result: anyhow::Result<RootSolution>,
        control: ControlVariable,
        speed: usize,
        load: f64,
    ) -> anyhow::Result<f64> {
        let solution = result.map_err(|error| match error.downcast::<SolverError>() {
            Ok(source) => SpeedSolverError::BracketFailure {
                unit: self.diagnostics.unit().to_owned(),
                control: control.name(),
                speed,
                load,
                source,
            }
            .into(),
            Err(error) => error,
        })?;

        let (iteration_limit, bracket_failure) = control.warning_kinds();
        match solution.status {
            RootStatus::Converged => {}
            RootStatus::IterationLimitExceeded => self.diagnostics.warn(
                iteration_limit,
                format!(
                    "Iteration limit exceeded calculating {} at speed {speed} for a load of {load:.1} W; the closest value {:.3} is used",
                    control.name(),
                    solution.value
                ),
            ),
            RootStatus::BracketFailure => self.diagnostics.warn(
                bracket_failure,
                format!(
                    "{} calculation failed at speed {speed} for a load of {load:.1} W: limits exceeded; the estimate {:.3} is used",
                    control.name(),
                    solution.value
                ),
            ),
        }
        Ok(solution.value)
    }

    /// Simulate the chosen point so that the device is left in its state
    fn finish(
        &mut self,
        device: &mut impl DeviceSimulation,
        request: &SpeedSolveRequest,
        trial: TrialOperatingPoint,
        no_comp_output: f64,
        full_output: f64,
    ) -> anyhow::Result<SpeedSolution> {
        let achieved = device.simulate(trial)?;
        let supplemental_shortfall = if !request.is_cooling()
            && request.load > SMALL_LOAD
            && (trial.is_full_at_speed() || trial == TrialOperatingPoint::Off)
            && request.load > achieved.sensible
        {
            request.load - achieved.sensible
        } else {
            0.
        };
        Ok(SpeedSolution {
            trial,
            no_comp_output,
            full_output,
            achieved,
            supplemental_shortfall,
        })
    }
}
