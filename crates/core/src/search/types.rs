//! Types for the search module.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Preference key of a partition: closer rows first, then closer to the centre axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankKey {
    /// Vertical position of the partition centre.
    pub row: f64,
    /// Horizontal distance of the partition centre from the centre axis.
    pub offset: f64,
}

impl RankKey {
    pub fn new(x: f64, y: f64, center_x: f64) -> Self {
        Self {
            row: y,
            offset: (x - center_x).abs(),
        }
    }

    /// Total order: `row` ascending, then `offset` ascending.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.row
            .total_cmp(&other.row)
            .then(self.offset.total_cmp(&other.offset))
    }
}

/// What a probe found in a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "units")]
pub enum Availability {
    Unknown,
    Available(u32),
    Empty,
}

/// A selectable region of the allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub rank: RankKey,
    pub availability: Availability,
}

impl Partition {
    pub fn new(id: impl Into<String>, x: f64, y: f64, center_x: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            rank: RankKey::new(x, y, center_x),
            availability: Availability::Unknown,
        }
    }
}

/// Sorts partitions by rank. Ties keep their enumeration order.
pub fn rank_partitions(mut partitions: Vec<Partition>) -> Vec<Partition> {
    partitions.sort_by(|a, b| a.rank.compare(&b.rank));
    partitions
}

/// The unit that was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldUnit {
    /// Partition the unit belongs to.
    pub partition: String,
    /// How many units were available there when it was taken.
    pub available: u32,
}

/// Result of one search over the allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    /// Whether a unit is now selected.
    pub held: bool,
    /// Partitions probed, in the order they were visited.
    pub visited: Vec<Partition>,
    pub unit: Option<HeldUnit>,
}

/// Shape returned by the partition enumeration script.
#[derive(Debug, Deserialize)]
pub(crate) struct PartitionLayout {
    pub center_x: f64,
    pub partitions: Vec<RawPartition>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPartition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl PartitionLayout {
    pub fn into_partitions(self) -> Vec<Partition> {
        let center_x = self.center_x;
        self.partitions
            .into_iter()
            .map(|p| Partition::new(p.id, p.x, p.y, center_x))
            .collect()
    }
}
