//! The view hierarchy the bridge attaches to.

use std::sync::Arc;

use crate::coords::LogicalRect;
use crate::source::DragSource;
use crate::target::DropTarget;

/// A window's content view, as seen by [`DragDropBridge`](crate::bridge::DragDropBridge).
///
/// Backends wrap the native content view; every method is called on the UI thread.
pub trait ViewHost {
    /// Bounds of the content view, or `None` when there is no view to attach to.
    fn content_bounds(&self) -> Option<LogicalRect>;

    /// The pasteboard types under which incoming file promises can be received.
    fn promise_receiver_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Add a native view covering `source.frame()` that forwards its mouse events to `source`.
    fn insert_draggable(&mut self, source: Arc<DragSource>);

    /// Remove the view inserted for region `id`. Unknown ids are ignored.
    fn remove_draggable(&mut self, id: &str);

    /// Add the drop region, covering the content view and resizing with it.
    fn install_drop_target(&mut self, target: Arc<DropTarget>);

    fn remove_drop_target(&mut self);
}
