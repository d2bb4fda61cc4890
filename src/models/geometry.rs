use std::fmt;

/// Pointer position in layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounds of a drop zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropZoneRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl DropZoneRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }
}

/// The logical targets a file drop can land on, in hit-test priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropTarget {
    Compress,
    Decompress,
}

impl DropTarget {
    pub const PRIORITY: [DropTarget; 2] = [DropTarget::Compress, DropTarget::Decompress];
}

impl fmt::Display for DropTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropTarget::Compress => f.write_str("compress"),
            DropTarget::Decompress => f.write_str("decompress"),
        }
    }
}

impl From<DropTarget> for crate::models::OperationMode {
    fn from(target: DropTarget) -> Self {
        match target {
            DropTarget::Compress => crate::models::OperationMode::Compress,
            DropTarget::Decompress => crate::models::OperationMode::Decompress,
        }
    }
}
