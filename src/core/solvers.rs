use crate::compare_floats::{max_of_2, min_of_2};
use crate::errors::SolverError;
use roots::{find_root_brent, Convergency, SearchError};
use serde::Deserialize;
use std::cell::{Cell, RefCell};

/// Relative residual accepted as a match between delivered and requested output
pub const DEFAULT_TOLERANCE: f64 = 0.001;
pub const MAX_ITERATIONS: usize = 500;
/// Width of the search interval, relative to the span of the bounds, below which the
/// bracketed search stops refining
const INTERVAL_COLLAPSE_FRACTION: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootStatus {
    Converged,
    /// The iteration cap was reached, or the interval collapsed with the residual still
    /// outside the tolerance; the iterate with the smallest residual is reported.
    IterationLimitExceeded,
    /// The residuals at the bounds share a sign, so the bounds do not bracket a root.
    BracketFailure,
}

/// What a caller does when the bounds do not bracket a root.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum BracketFailurePolicy {
    /// Abort the run.
    #[default]
    Fatal,
    /// Continue with a linear estimate between the two bound evaluations.
    Extrapolate,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootSolution {
    pub value: f64,
    pub status: RootStatus,
    pub evaluations: usize,
}

/// Only the residual decides that a root has been found. The interval check of the
/// bracketed search is kept far below any useful resolution of the free variable so a
/// steep objective cannot end the search early.
struct ResidualConvergency {
    tolerance: f64,
    interval: f64,
    max_iterations: usize,
}

impl Convergency<f64> for ResidualConvergency {
    fn is_root_found(&mut self, y: f64) -> bool {
        y.abs() < self.tolerance
    }

    fn is_converged(&mut self, x1: f64, x2: f64) -> bool {
        (x1 - x2).abs() < self.interval
    }

    fn is_iteration_limit_reached(&mut self, iter: usize) -> bool {
        iter >= self.max_iterations
    }
}

/// Find the value in `[lower, upper]` at which `objective` is zero.
///
/// The objective is evaluated at both bounds before the bracketed search starts, and
/// each further evaluation happens strictly one after another. An error from the
/// objective stops the search and is returned as is.
///
/// Arguments:
/// * `tolerance` - absolute residual treated as converged
/// * `max_iterations` - iteration cap for the bracketed search
/// * `objective` - residual function of the free variable
/// * `lower`, `upper` - bounds of the free variable
/// * `policy` - handling of bounds that do not bracket a root
pub(crate) fn solve_root(
    tolerance: f64,
    max_iterations: usize,
    objective: impl FnMut(f64) -> anyhow::Result<f64>,
    lower: f64,
    upper: f64,
    policy: BracketFailurePolicy,
) -> anyhow::Result<RootSolution> {
    let objective = RefCell::new(objective);
    let evaluations = Cell::new(0usize);
    // free variable and absolute residual of the closest evaluation so far
    let best = Cell::new((lower, f64::INFINITY));
    let failure: RefCell<Option<anyhow::Error>> = RefCell::new(None);

    let evaluate = |x: f64| -> f64 {
        if failure.borrow().is_some() {
            // a zero residual ends the search straight away
            return 0.;
        }
        evaluations.set(evaluations.get() + 1);
        let mut objective = objective.borrow_mut();
        let objective = &mut *objective;
        match objective(x) {
            Ok(residual) => {
                if residual.abs() < best.get().1 {
                    best.set((x, residual.abs()));
                }
                residual
            }
            Err(error) => {
                *failure.borrow_mut() = Some(error);
                0.
            }
        }
    };

    let lower_residual = evaluate(lower);
    let upper_residual = evaluate(upper);
    if let Some(error) = failure.take() {
        return Err(error);
    }

    if lower_residual.abs() < tolerance {
        return Ok(RootSolution {
            value: lower,
            status: RootStatus::Converged,
            evaluations: evaluations.get(),
        });
    }
    if upper_residual.abs() < tolerance {
        return Ok(RootSolution {
            value: upper,
            status: RootStatus::Converged,
            evaluations: evaluations.get(),
        });
    }
    if lower_residual * upper_residual > 0. {
        return bracket_failure(
            lower,
            upper,
            lower_residual,
            upper_residual,
            policy,
            evaluations.get(),
        );
    }

    let mut convergency = ResidualConvergency {
        tolerance,
        interval: INTERVAL_COLLAPSE_FRACTION * (upper - lower).abs(),
        max_iterations,
    };
    let result = find_root_brent::<f64, _>(lower, upper, &evaluate, &mut convergency);

    if let Some(error) = failure.take() {
        return Err(error);
    }

    let (best_value, best_residual) = best.get();
    match result {
        Ok(_) if best_residual < tolerance => Ok(RootSolution {
            value: best_value,
            status: RootStatus::Converged,
            evaluations: evaluations.get(),
        }),
        Err(SearchError::NoBracketing) => bracket_failure(
            lower,
            upper,
            lower_residual,
            upper_residual,
            policy,
            evaluations.get(),
        ),
        _ => Ok(RootSolution {
            value: best_value,
            status: RootStatus::IterationLimitExceeded,
            evaluations: evaluations.get(),
        }),
    }
}

fn bracket_failure(
    lower: f64,
    upper: f64,
    lower_residual: f64,
    upper_residual: f64,
    policy: BracketFailurePolicy,
    evaluations: usize,
) -> anyhow::Result<RootSolution> {
    match policy {
        BracketFailurePolicy::Fatal => Err(SolverError::BracketFailure {
            lower,
            upper,
            lower_residual,
            upper_residual,
        }
        .into()),
        BracketFailurePolicy::Extrapolate => Ok(RootSolution {
            value: extrapolate_root(lower, upper, lower_residual, upper_residual),
            status: RootStatus::BracketFailure,
            evaluations,
        }),
    }
}

/// Root of the straight line through the two bound evaluations, kept within the bounds.
/// Equal residuals give no slope to follow, so the lower bound is used.
pub(crate) fn extrapolate_root(
    lower: f64,
    upper: f64,
    lower_residual: f64,
    upper_residual: f64,
) -> f64 {
    let slope = upper_residual - lower_residual;
    if slope == 0. {
        return lower;
    }
    let estimate = lower - lower_residual * (upper - lower) / slope;
    max_of_2(lower, min_of_2(estimate, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_find_cycling_fraction() {
        // delivered output of -2500 W at full cycling against a -2000 W request
        let solution = solve_root(
            DEFAULT_TOLERANCE,
            MAX_ITERATIONS,
            |plf| Ok((-2500. * plf - -2000.) / -2000.),
            0.,
            1.,
            BracketFailurePolicy::Fatal,
        )
        .unwrap();

        assert_eq!(solution.status, RootStatus::Converged);
        assert_relative_eq!(solution.value, 0.8, max_relative = 1e-3);
        assert!(solution.evaluations >= 2);
    }

    #[rstest]
    #[case(-300.)]
    #[case(-100.)]
    #[case(-50.)]
    #[case(-2400.)]
    fn should_meet_residual_tolerance_on_steep_output_curve(#[case] load: f64) {
        // output rises steeply from zero cycling, so a narrow interval alone is no match
        let output = |plf: f64| -2500. * plf.powf(0.3);
        let solution = solve_root(
            DEFAULT_TOLERANCE,
            MAX_ITERATIONS,
            |plf| Ok((output(plf) - load) / load),
            0.,
            1.,
            BracketFailurePolicy::Fatal,
        )
        .unwrap();

        assert_eq!(solution.status, RootStatus::Converged);
        assert!(solution.value > 0.);
        assert!(((output(solution.value) - load) / load).abs() <= DEFAULT_TOLERANCE);
    }

    #[rstest]
    fn should_not_report_convergence_across_a_step() {
        // no value of the free variable gives a residual inside the tolerance
        let solution = solve_root(
            DEFAULT_TOLERANCE,
            MAX_ITERATIONS,
            |x| Ok(if x < 0.4 { -1. } else { 1. }),
            0.,
            1.,
            BracketFailurePolicy::Fatal,
        )
        .unwrap();

        assert_eq!(solution.status, RootStatus::IterationLimitExceeded);
        assert!((0. ..=1.).contains(&solution.value));
    }

    #[rstest]
    fn should_accept_bound_that_already_matches() {
        let solution = solve_root(
            DEFAULT_TOLERANCE,
            MAX_ITERATIONS,
            |x| Ok(x),
            0.,
            1.,
            BracketFailurePolicy::Fatal,
        )
        .unwrap();

        assert_eq!(solution.value, 0.);
        assert_eq!(solution.status, RootStatus::Converged);
        assert_eq!(solution.evaluations, 2);
    }

    #[rstest]
    fn should_report_closest_iterate_when_iteration_limit_reached() {
        let solution = solve_root(
            1e-15,
            1,
            |x| Ok(x.powi(3) - 0.3),
            0.,
            1.,
            BracketFailurePolicy::Fatal,
        )
        .unwrap();

        assert_eq!(solution.status, RootStatus::IterationLimitExceeded);
        assert!((0. ..=1.).contains(&solution.value));
    }

    #[rstest]
    fn should_fail_on_unbracketed_root_with_fatal_policy() {
        let result = solve_root(
            DEFAULT_TOLERANCE,
            MAX_ITERATIONS,
            |x| Ok(x + 1.),
            0.,
            1.,
            BracketFailurePolicy::Fatal,
        );

        let error = result.unwrap_err();
        assert_eq!(
            error.downcast_ref::<SolverError>(),
            Some(&SolverError::BracketFailure {
                lower: 0.,
                upper: 1.,
                lower_residual: 1.,
                upper_residual: 2.,
            })
        );
    }

    #[rstest]
    #[case(|x: f64| Ok(x + 1.), 0.)]
    #[case(|x: f64| Ok(0.5 - 0.25 * x), 1.)]
    #[case(|_x: f64| Ok(0.4), 0.)]
    fn should_extrapolate_unbracketed_root_within_bounds(
        #[case] objective: fn(f64) -> anyhow::Result<f64>,
        #[case] expected: f64,
    ) {
        let solution = solve_root(
            DEFAULT_TOLERANCE,
            MAX_ITERATIONS,
            objective,
            0.,
            1.,
            BracketFailurePolicy::Extrapolate,
        )
        .unwrap();

        assert_eq!(solution.status, RootStatus::BracketFailure);
        assert_eq!(solution.value, expected);
    }

    #[rstest]
    fn should_extrapolate_linear_estimate() {
        // inlet 26C, setpoint 14C, outlet at full output 16C
        assert_relative_eq!(extrapolate_root(0., 1., 14. - 26., 14. - 16.), 1.);
        assert_relative_eq!(extrapolate_root(0., 1., -12., 3.), 0.8);
    }

    #[rstest]
    fn should_propagate_objective_failure() {
        let mut calls = 0;
        let result = solve_root(
            DEFAULT_TOLERANCE,
            MAX_ITERATIONS,
            |x| {
                calls += 1;
                if calls > 1 {
                    Err(anyhow!("coil model failed"))
                } else {
                    Ok(x - 0.5)
                }
            },
            0.,
            1.,
            BracketFailurePolicy::Fatal,
        );

        assert_eq!(result.unwrap_err().to_string(), "coil model failed");
    }
}
