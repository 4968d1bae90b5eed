//! Conversions between the host application's coordinate space and the native one.
//!
//! The host application works in a top-left-origin, y-down space. Native geometry (screen,
//! window and view frames) is bottom-left-origin, y-up. Every point crosses the boundary through
//! [`to_channel`] (native to host) or [`from_channel`] / [`region_from_channel`] (host to
//! native), so the flip happens exactly once in each direction.

use dpi::{LogicalPosition, LogicalSize};

/// An axis-aligned rectangle in logical units.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct LogicalRect {
    pub origin: LogicalPosition<f64>,
    pub size: LogicalSize<f64>,
}

impl LogicalRect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        LogicalRect {
            origin: LogicalPosition::new(x, y),
            size: LogicalSize::new(width, height),
        }
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    /// Whether `point` lies inside the rectangle.
    ///
    /// The minimum edges are inclusive and the maximum edges exclusive, so adjacent rectangles
    /// never both contain a point on their shared edge.
    pub fn contains(&self, point: LogicalPosition<f64>) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }
}

/// Mirror `point` vertically inside `frame`.
///
/// Applying it twice with the same frame yields the original point.
#[inline]
pub fn flip(point: LogicalPosition<f64>, frame: &LogicalRect) -> LogicalPosition<f64> {
    LogicalPosition::new(point.x, frame.size.height - point.y)
}

/// Encode a point as the `[x, y]` list sent over the channel.
#[inline]
pub fn to_list(point: LogicalPosition<f64>) -> [f64; 2] {
    [point.x, point.y]
}

/// Convert a native point to the host's encoded form.
#[inline]
pub fn to_channel(point: LogicalPosition<f64>, frame: &LogicalRect) -> [f64; 2] {
    to_list(flip(point, frame))
}

/// Convert a point received from the host to native coordinates.
#[inline]
pub fn from_channel(x: f64, y: f64, frame: &LogicalRect) -> LogicalPosition<f64> {
    flip(LogicalPosition::new(x, y), frame)
}

/// Convert a rectangle received from the host to a native frame inside `bounds`.
///
/// The host describes rectangles by their top-left corner; natively a frame is anchored at its
/// bottom-left corner, which is the host's `y + height`.
pub fn region_from_channel(x: f64, y: f64, width: f64, height: f64, bounds: &LogicalRect) -> LogicalRect {
    LogicalRect { origin: from_channel(x, y + height, bounds), size: LogicalSize::new(width, height) }
}
