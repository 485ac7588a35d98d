//! Instance records and their renderer-facing projections
//!
//! Every backend produces [`Instance`] records collected into a [`Printable`];
//! renderers consume the flattened form through [`FlattenData::filter`].

mod container;
mod flatten;
mod types;

pub use container::ResultContainer;
pub use flatten::FlattenData;
pub use types::*;
