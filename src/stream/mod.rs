//! Stream combinators for draft updates

mod coalesce;

pub use coalesce::{Coalesce, CoalesceExt};
