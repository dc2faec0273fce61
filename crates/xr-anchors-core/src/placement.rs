//! Placement of content relative to a reference anchor.
//!
//! The content carries a base point (for a building model, a surveyed corner
//! for instance). Placing it moves the whole content so the base point lands
//! on the first reference anchor that localized, keeping its orientation.

use tracing::{info, warn};

use crate::spatial::{Point3D, Pose};

#[derive(Debug, Clone)]
pub struct ContentPlacer {
    base_point: Point3D,
    content: Pose,
    armed: bool,
    references: Vec<Point3D>,
    placements: Vec<Pose>,
}

impl ContentPlacer {
    /// `base_point` is in world space at the content's unplaced `content` pose.
    pub fn new(base_point: Point3D, content: Pose) -> Self {
        Self {
            base_point,
            content,
            armed: false,
            references: Vec::new(),
            placements: Vec::new(),
        }
    }

    /// Allow the next [`try_place`](Self::try_place) to place content.
    ///
    /// Only anchors observed after arming count as references.
    pub fn arm(&mut self) {
        self.references.clear();
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Queue the position of a localized reference anchor.
    ///
    /// Positions seen while disarmed are dropped; returns whether it was queued.
    pub fn observe(&mut self, position: Point3D) -> bool {
        if !self.armed {
            return false;
        }
        self.references.push(position);
        true
    }

    pub fn pending_references(&self) -> usize {
        self.references.len()
    }

    /// Place the content against the first queued reference.
    ///
    /// Only acts when armed. Consumes the whole reference queue and disarms.
    pub fn try_place(&mut self) -> Option<Pose> {
        if !self.armed {
            return None;
        }
        let Some(reference) = self.references.first().copied() else {
            warn!("Not enough anchors to place content: 1 reference anchor needed");
            return None;
        };

        let placed = self.content.translated(reference - self.base_point);
        self.references.clear();
        self.armed = false;
        self.placements.push(placed);
        info!("Placed content at {}", placed.position);
        Some(placed)
    }

    /// Everything placed so far, oldest first
    pub fn placements(&self) -> &[Pose] {
        &self.placements
    }

    pub fn clear(&mut self) {
        self.placements.clear();
        self.references.clear();
    }
}
