//! Pointer-position to drop-target resolution with a lazily measured geometry cache.

use crate::models::{DropTarget, DropZoneRect, Point};
use indexmap::IndexMap;
use std::time::Duration;
use tokio::time::Instant;

/// Resize bursts shorter than this collapse into a single invalidation.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(150);

/// Measures the on-screen bounds of a drop target.
///
/// Implemented by the front end; `None` means the target is not currently laid out.
#[cfg_attr(test, mockall::automock)]
pub trait LayoutProbe {
    fn measure(&self, target: DropTarget) -> Option<DropZoneRect>;
}

/// Resolves drop positions to targets.
///
/// The cache holds at most one rectangle per target and is filled for all targets in
/// one pass on the first hit test after creation or invalidation. Resize notifications
/// only arm a deadline; the cache is dropped once the deadline has passed, at the next
/// hit test, so a burst of resizes costs exactly one re-measurement.
pub struct DropZoneClassifier<P: LayoutProbe> {
    probe: P,
    cache: Option<IndexMap<DropTarget, DropZoneRect>>,
    invalidate_at: Option<Instant>,
    debounce: Duration,
    measurements: usize,
}

impl<P: LayoutProbe> DropZoneClassifier<P> {
    pub fn new(probe: P) -> Self {
        Self::with_debounce(probe, RESIZE_DEBOUNCE)
    }

    pub fn with_debounce(probe: P, debounce: Duration) -> Self {
        Self {
            probe,
            cache: None,
            invalidate_at: None,
            debounce,
            measurements: 0,
        }
    }

    /// Record a viewport resize. Each call pushes the invalidation deadline back.
    pub fn notify_resize(&mut self) {
        self.invalidate_at = Some(Instant::now() + self.debounce);
    }

    /// Target under `position`, checking targets in [`DropTarget::PRIORITY`] order.
    pub fn resolve_target(&mut self, position: Option<Point>) -> Option<DropTarget> {
        let position = position?;
        self.apply_pending_invalidation();

        let probe = &self.probe;
        let measurements = &mut self.measurements;
        let cache = self.cache.get_or_insert_with(|| {
            *measurements += 1;
            tracing::debug!("Measuring drop zones");
            DropTarget::PRIORITY
                .iter()
                .filter_map(|target| probe.measure(*target).map(|rect| (*target, rect)))
                .collect()
        });

        cache
            .iter()
            .find(|(_, rect)| rect.contains(position))
            .map(|(target, _)| *target)
    }

    /// Number of times the cache has been populated.
    pub fn measurements(&self) -> usize {
        self.measurements
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    fn apply_pending_invalidation(&mut self) {
        if let Some(deadline) = self.invalidate_at {
            if Instant::now() >= deadline {
                self.invalidate_at = None;
                self.cache = None;
            }
        }
    }
}
