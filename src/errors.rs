use thiserror::Error;

#[derive(Debug, Error)]
pub enum HvacError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Unit configuration was rejected: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),
    #[error("Error identified during unit calculation: {0}")]
    FailureInCalculation(#[from] HvacCoreError),
    #[error("Error while writing results: {0}")]
    ErrorInOutput(OutputError),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct HvacCoreError {
    error: anyhow::Error,
}

impl HvacCoreError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct OutputError {
    error: anyhow::Error,
}

impl OutputError {
    pub fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

/// Setup-time problems with a unit description. Any of these stops the run before the
/// first timestep.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("Unit '{unit}' lists {found} rated air flows for {expected} {service} speeds")]
    InconsistentSpeedCount {
        unit: String,
        service: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Unit '{unit}' has no {service} speeds")]
    NoSpeeds { unit: String, service: &'static str },
    #[error("Unit '{unit}' serves zone '{zone}', which has no conditions supplied")]
    MissingZone { unit: String, zone: String },
    #[error("Unit '{unit}' cannot use a {coil} as its {role}")]
    UnsupportedCoil {
        unit: String,
        coil: &'static str,
        role: &'static str,
    },
    #[error("Unit '{unit}': {message}")]
    Invalid { unit: String, message: String },
}

/// Failures reported by the shared root finder.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverError {
    #[error("Root is not bracketed: residual {lower_residual} at {lower} and {upper_residual} at {upper} share a sign")]
    BracketFailure {
        lower: f64,
        upper: f64,
        lower_residual: f64,
        upper_residual: f64,
    },
}

/// Failures of the speed and part-load search of a unit.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SpeedSolverError {
    #[error("Unit '{unit}' could not find a {control} at speed {speed} meeting a load of {load} W: {source}")]
    BracketFailure {
        unit: String,
        control: &'static str,
        speed: usize,
        load: f64,
        source: SolverError,
    },
}
