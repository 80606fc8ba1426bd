pub mod aggregate;
pub mod fleet;
pub mod outliers;
pub mod redistribute;
pub mod types;
pub(crate) mod utility;
