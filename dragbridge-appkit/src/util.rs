use dpi::{LogicalPosition, LogicalSize};
use dragbridge_core::coords::LogicalRect;
use objc2_foundation::{NSPoint, NSRect, NSSize};

pub(crate) fn position(point: NSPoint) -> LogicalPosition<f64> {
    LogicalPosition::new(point.x as f64, point.y as f64)
}

pub(crate) fn rect(rect: NSRect) -> LogicalRect {
    LogicalRect::new(
        rect.origin.x as f64,
        rect.origin.y as f64,
        rect.size.width as f64,
        rect.size.height as f64,
    )
}

pub(crate) fn ns_point(position: LogicalPosition<f64>) -> NSPoint {
    NSPoint::new(position.x as _, position.y as _)
}

pub(crate) fn ns_size(size: LogicalSize<f64>) -> NSSize {
    NSSize::new(size.width as _, size.height as _)
}

pub(crate) fn ns_rect(rect: LogicalRect) -> NSRect {
    NSRect::new(ns_point(rect.origin), ns_size(rect.size))
}
