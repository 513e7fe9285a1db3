//! Ranked, backtracking search over the allocation's partitions.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::metrics;
use crate::surface::{cancellable, script, Selector, Surface, SurfaceError};

use super::error::SearchError;
use super::types::{
    rank_partitions, Availability, HeldUnit, Partition, PartitionLayout, SearchReport,
};

/// Walks partitions best-first and takes the first available unit.
///
/// At most one partition is selected at a time: every probe that comes up
/// empty returns to the partition view before the next candidate is tried.
/// Nothing is remembered between calls.
#[derive(Debug, Clone)]
pub struct AllocationSearch {
    partition_shapes: String,
    partition_canvas: String,
    unit_shapes: String,
    unit_canvas: Selector,
    unavailable_fills: Vec<String>,
    back_to_partitions: Selector,
    unit_probe: Duration,
}

impl AllocationSearch {
    pub fn new(config: &Config) -> Self {
        let selectors = &config.selectors;
        Self {
            partition_shapes: selectors.partition_shapes.clone(),
            partition_canvas: selectors.partition_canvas.clone(),
            unit_shapes: selectors.unit_shapes.clone(),
            unit_canvas: Selector::from(&selectors.unit_canvas),
            unavailable_fills: selectors.unavailable_fills.clone(),
            back_to_partitions: Selector::from(&selectors.back_to_partitions),
            unit_probe: Duration::from_secs(config.timeouts.unit_probe_secs),
        }
    }

    /// Enumerates the interactive partitions on `surface`, unranked.
    pub async fn enumerate(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<Vec<Partition>, SearchError> {
        let enumerate =
            script::enumerate_partitions(&self.partition_shapes, &self.partition_canvas);
        let value = cancellable(cancel, surface.evaluate(&enumerate)).await?;
        let layout: PartitionLayout = serde_json::from_value(value)
            .map_err(|e| SurfaceError::script(enumerate.name(), e.to_string()))?;
        Ok(layout.into_partitions())
    }

    /// Finds the best partition with an available unit and selects that unit.
    ///
    /// `held == false` means every partition was probed and none had a unit.
    pub async fn find_and_hold(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<SearchReport, SearchError> {
        let partitions = self.enumerate(surface, cancel).await?;
        if partitions.is_empty() {
            warn!(surface = surface.id(), "No interactive partitions found");
            return Err(SearchError::NoPartitions);
        }

        let ranked = rank_partitions(partitions);
        let last = ranked.len() - 1;
        info!(count = ranked.len(), "Searching partitions");

        let mut visited = Vec::with_capacity(ranked.len());
        for (index, mut partition) in ranked.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }

            let selected = self.select(surface, &partition, cancel).await?;
            if !selected {
                debug!(partition = %partition.id, "Partition vanished before it could be selected");
                visited.push(partition);
                continue;
            }

            metrics::PARTITIONS_PROBED.inc();
            let probed = self.probe(surface, cancel).await?;
            let available = probed.unwrap_or(0);
            debug!(partition = %partition.id, available, "Probed partition");

            if available > 0 && self.take_first_unit(surface, cancel).await? {
                partition.availability = Availability::Available(available);
                info!(partition = %partition.id, available, "Unit held");
                let unit = HeldUnit {
                    partition: partition.id.clone(),
                    available,
                };
                visited.push(partition);
                return Ok(SearchReport {
                    held: true,
                    visited,
                    unit: Some(unit),
                });
            }

            partition.availability = Availability::Empty;
            visited.push(partition);
            if index < last {
                self.backtrack(surface, cancel, probed.is_some()).await?;
            }
        }

        info!(visited = visited.len(), "No partition had an available unit");
        Ok(SearchReport {
            held: false,
            visited,
            unit: None,
        })
    }

    async fn select(
        &self,
        surface: &dyn Surface,
        partition: &Partition,
        cancel: &CancellationToken,
    ) -> Result<bool, SearchError> {
        let select = script::select_partition(&partition.id);
        let value = cancellable(cancel, surface.evaluate(&select)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Counts available units once the unit view has loaded. `None` means the
    /// view never loaded.
    async fn probe(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<Option<u32>, SearchError> {
        let loaded = cancellable(
            cancel,
            surface.wait_for_control(&self.unit_canvas, self.unit_probe),
        )
        .await;
        match loaded {
            Ok(_) => {}
            Err(SurfaceError::Timeout { .. }) => {
                debug!("Unit view did not load within {:?}", self.unit_probe);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let count = script::count_available_units(&self.unit_shapes, &self.unavailable_fills);
        let value = cancellable(cancel, surface.evaluate(&count)).await?;
        match value.as_u64() {
            Some(n) => Ok(Some(n.min(u32::MAX as u64) as u32)),
            None => Err(SurfaceError::script(
                count.name(),
                format!("expected a count, got {}", value),
            )
            .into()),
        }
    }

    async fn take_first_unit(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<bool, SearchError> {
        let select = script::select_first_unit(&self.unit_shapes, &self.unavailable_fills);
        let value = cancellable(cancel, surface.evaluate(&select)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Returns to the partition view. When the unit view never loaded the
    /// back control is clicked only if it is already showing; otherwise the
    /// partition view is still current.
    async fn backtrack(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
        view_loaded: bool,
    ) -> Result<(), SearchError> {
        let wait = if view_loaded {
            self.unit_probe
        } else {
            Duration::ZERO
        };
        let back = cancellable(
            cancel,
            surface.wait_for_control(&self.back_to_partitions, wait),
        )
        .await;
        match back {
            Ok(back) => cancellable(cancel, surface.click(&back)).await?,
            Err(SurfaceError::Timeout { .. }) if !view_loaded => {
                debug!("No back control after an unloaded unit view");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockVenue};

    fn search() -> AllocationSearch {
        AllocationSearch::new(&fixtures::config())
    }

    fn visited_ids(report: &SearchReport) -> Vec<String> {
        report.visited.iter().map(|p| p.id.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_holds_unit_in_best_available_partition() {
        let venue = MockVenue::builder()
            .center_x(500.0)
            .partition("back", 500.0, 300.0, 4)
            .partition("front-left", 100.0, 100.0, 0)
            .partition("front-center", 520.0, 100.0, 0)
            .partition("middle", 480.0, 200.0, 2)
            .build();

        let report = search()
            .find_and_hold(venue.frame.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.held);
        assert_eq!(visited_ids(&report), vec!["front-center", "front-left", "middle"]);
        assert_eq!(
            report.unit,
            Some(HeldUnit {
                partition: "middle".to_string(),
                available: 2
            })
        );
        assert_eq!(venue.held_unit(), Some("middle".to_string()));
        assert_eq!(venue.selection_violations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_empty_is_sold_out() {
        let venue = MockVenue::builder()
            .center_x(500.0)
            .partition("a", 500.0, 100.0, 0)
            .partition("b", 500.0, 200.0, 0)
            .partition("c", 500.0, 300.0, 0)
            .build();

        let report = search()
            .find_and_hold(venue.frame.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.held);
        assert!(report.unit.is_none());
        assert_eq!(visited_ids(&report), vec!["a", "b", "c"]);
        assert!(report
            .visited
            .iter()
            .all(|p| p.availability == Availability::Empty));
        assert_eq!(venue.visits(), vec!["a", "b", "c"]);
        assert_eq!(venue.selection_violations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_partitions() {
        let venue = MockVenue::builder().build();

        let result = search()
            .find_and_hold(venue.frame.as_ref(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SearchError::NoPartitions)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unit_view_that_never_loads_counts_as_empty() {
        let venue = MockVenue::builder()
            .partition("slow", 0.0, 100.0, 3)
            .partition("fast", 0.0, 200.0, 1)
            .slow_units("slow")
            .build();
        let started = tokio::time::Instant::now();

        let report = search()
            .find_and_hold(venue.frame.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.unit.unwrap().partition, "fast");
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unloaded_unit_view_without_back_control_moves_on() {
        let venue = MockVenue::builder()
            .partition("slow", 0.0, 100.0, 3)
            .partition("fast", 0.0, 200.0, 1)
            .slow_units("slow")
            .without_control(fixtures::selectors::BACK_TO_PARTITIONS)
            .build();

        let report = search()
            .find_and_hold(venue.frame.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.held);
        assert_eq!(visited_ids(&report), vec!["slow", "fast"]);
        assert_eq!(venue.held_unit(), Some("fast".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_empty_partition_is_not_backtracked() {
        let venue = MockVenue::builder()
            .partition("only", 0.0, 100.0, 0)
            .without_control(fixtures::selectors::BACK_TO_PARTITIONS)
            .build();

        let report = search()
            .find_and_hold(venue.frame.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.held);
        assert_eq!(visited_ids(&report), vec!["only"]);
        assert_eq!(venue.frame.clicks(), Vec::<String>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_back_control_after_loaded_view_is_an_error() {
        let venue = MockVenue::builder()
            .partition("a", 0.0, 100.0, 0)
            .partition("b", 0.0, 200.0, 1)
            .without_control(fixtures::selectors::BACK_TO_PARTITIONS)
            .build();

        let result = search()
            .find_and_hold(venue.frame.as_ref(), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(SearchError::Surface(SurfaceError::Timeout { .. }))
        ));
        assert_eq!(venue.visits(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_search() {
        let venue = MockVenue::builder().partition("a", 0.0, 0.0, 1).build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = search().find_and_hold(venue.frame.as_ref(), &cancel).await;
        assert!(matches!(result, Err(SearchError::Cancelled)));
    }
}
