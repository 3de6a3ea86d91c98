pub mod hvac;
pub mod material_properties;
pub mod psychrometrics;
pub(crate) mod solvers;
pub mod units;
