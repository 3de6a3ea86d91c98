#![allow(clippy::too_many_arguments)]

#[macro_use]
extern crate is_close;

mod compare_floats;
pub mod core;
pub mod corpus;
pub mod errors;
pub mod input;
pub mod output;
mod simulation_time;

#[cfg(test)]
mod tests;

pub use crate::core::hvac::report::UNITS_MAP;
pub use crate::corpus::RunResults;
use crate::core::hvac::report::write_unit_report;
use crate::corpus::Corpus;
use crate::errors::{HvacCoreError, HvacError, OutputError};
use crate::input::ingest_for_processing;
use crate::output::Output;
use std::io::Read;
use tracing::info;

/// Run every unit described in the input over the simulation period and write one results
/// file per unit.
pub fn run_project(input: impl Read, output: impl Output) -> Result<RunResults, HvacError> {
    let input = ingest_for_processing(input)?.finalize();

    let mut corpus = Corpus::from_inputs(input)?;
    info!(units = corpus.units().len(), "starting run");

    let results = corpus
        .run()
        .map_err(|err| HvacError::FailureInCalculation(HvacCoreError::new(err)))?;

    for (unit_name, rows) in &results {
        write_unit_report(&output, unit_name, rows)
            .map_err(|err| HvacError::ErrorInOutput(OutputError::new(err)))?;
    }

    Ok(results)
}
