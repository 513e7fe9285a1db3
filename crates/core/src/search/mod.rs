//! Allocation search.
//!
//! Partitions are enumerated fresh on every call, ranked by row and then by
//! distance from the centre axis, and probed one by one until a unit can be
//! held or the list runs out.

mod allocation;
mod error;
mod types;

pub use allocation::AllocationSearch;
pub use error::SearchError;
pub use types::{rank_partitions, Availability, HeldUnit, Partition, RankKey, SearchReport};
