//! Console tables and file exports for each report.

pub mod fleet;
pub mod fuel;
pub mod keys;
pub mod personnel;
mod render;

pub use render::{money, preview_table, render_table, thousands};

/// Rows shown per console table unless overridden.
pub const DEFAULT_MAX_ROWS: usize = 20;
