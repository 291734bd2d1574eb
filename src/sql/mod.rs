//! SQL for catalog-described tables: identifiers come from the catalog, values are bound as text parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
